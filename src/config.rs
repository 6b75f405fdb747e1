use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// 开发环境下未设置 JWT_SECRET 时使用的密钥
const DEV_JWT_SECRET: &str = "milestone-tracker-dev-secret";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub log_level: String,
    pub request_timeout_secs: u64,

    // Database configuration
    pub database_url: String,
    pub database_namespace: String,
    pub database_name: String,
    pub database_username: String,
    pub database_password: String,

    // Authentication configuration
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,

    // CORS configuration
    pub cors_allowed_origins: String,

    // Reminder scheduler
    pub reminder_sweep_interval_secs: u64,
    pub reminder_sweep_timeout_secs: u64,
    pub reminder_catch_up_days: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) => secret,
            Err(_) if environment != "production" => DEV_JWT_SECRET.to_string(),
            Err(_) => anyhow::bail!("JWT_SECRET must be set in production"),
        };

        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment,
            log_level: env::var("LOG_LEVEL")
                .unwrap_or_else(|_| "milestone_tracker=debug,tower_http=debug".to_string()),
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,

            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "memory".to_string()),
            database_namespace: env::var("DATABASE_NAMESPACE")
                .unwrap_or_else(|_| "academic".to_string()),
            database_name: env::var("DATABASE_NAME")
                .unwrap_or_else(|_| "milestones".to_string()),
            database_username: env::var("DATABASE_USERNAME")
                .unwrap_or_else(|_| "root".to_string()),
            database_password: env::var("DATABASE_PASSWORD")
                .unwrap_or_else(|_| "root".to_string()),

            jwt_secret,
            jwt_expiry_hours: env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3001".to_string()),

            reminder_sweep_interval_secs: env::var("REMINDER_SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()?,
            reminder_sweep_timeout_secs: env::var("REMINDER_SWEEP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()?,
            reminder_catch_up_days: env::var("REMINDER_CATCH_UP_DAYS")
                .unwrap_or_else(|_| "1".to_string())
                .parse()?,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// `DATABASE_URL=memory` 时使用进程内存储
    pub fn uses_memory_storage(&self) -> bool {
        self.database_url == "memory"
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn reminder_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.reminder_sweep_interval_secs.max(1))
    }

    pub fn reminder_sweep_timeout(&self) -> Duration {
        Duration::from_secs(self.reminder_sweep_timeout_secs.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 3000,
            environment: "development".to_string(),
            log_level: "milestone_tracker=debug".to_string(),
            request_timeout_secs: 30,
            database_url: "memory".to_string(),
            database_namespace: "academic".to_string(),
            database_name: "milestones".to_string(),
            database_username: "root".to_string(),
            database_password: "root".to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_expiry_hours: 24,
            cors_allowed_origins: "http://localhost:3001".to_string(),
            reminder_sweep_interval_secs: 86400,
            reminder_sweep_timeout_secs: 300,
            reminder_catch_up_days: 1,
        }
    }
}
