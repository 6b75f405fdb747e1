use crate::config::Config;
use crate::error::{AppError, Result};
use serde::Serialize;
use surrealdb::engine::remote::http::{Client, Http};
use surrealdb::opt::auth::Root;
use surrealdb::{Response, Surreal};
use tracing::{debug, error, info};

/// 数据库服务
#[derive(Clone)]
pub struct Database {
    pub client: Surreal<Client>,
    pub config: Config,
}

impl Database {
    /// 创建新的数据库实例
    pub async fn new(config: &Config) -> Result<Self> {
        info!("Initializing database connection to {}", config.database_url);

        let address = config
            .database_url
            .trim_start_matches("http://")
            .trim_end_matches('/');

        let client = Surreal::new::<Http>(address).await?;

        client
            .signin(Root {
                username: &config.database_username,
                password: &config.database_password,
            })
            .await?;

        client
            .use_ns(config.database_namespace.as_str())
            .use_db(config.database_name.as_str())
            .await?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// 验证数据库连接
    pub async fn verify_connection(&self) -> Result<()> {
        match self.client.query("INFO FOR DB").await {
            Ok(_) => {
                info!("Database connection verified successfully");
                Ok(())
            }
            Err(e) => {
                error!("Failed to verify database connection: {}", e);
                Err(AppError::from(e))
            }
        }
    }

    /// 初始化表结构与索引
    pub async fn apply_schema(&self) -> Result<()> {
        let schema = r#"
            DEFINE TABLE milestone SCHEMALESS;
            DEFINE INDEX milestone_student ON TABLE milestone COLUMNS studentId;
            DEFINE INDEX milestone_status ON TABLE milestone COLUMNS status;
            DEFINE INDEX milestone_reminder ON TABLE milestone COLUMNS reminderDate;
            DEFINE TABLE student SCHEMALESS;
            DEFINE INDEX student_advisor ON TABLE student COLUMNS advisorId;
            DEFINE TABLE notification SCHEMALESS;
            DEFINE INDEX notification_recipient ON TABLE notification COLUMNS recipientId;
        "#;

        self.query(schema).await?;
        debug!("Database schema applied");
        Ok(())
    }

    /// 执行原始查询
    pub async fn query(&self, sql: &str) -> Result<Response> {
        let response = self.client.query(sql.to_string()).await?;
        Ok(response.check()?)
    }

    /// 执行带参数的查询
    pub async fn query_with_params<P>(&self, sql: &str, params: P) -> Result<Response>
    where
        P: Serialize + 'static,
    {
        debug!("Executing query: {}", sql.trim());

        let response = self.client.query(sql.to_string()).bind(params).await?;
        Ok(response.check()?)
    }
}
