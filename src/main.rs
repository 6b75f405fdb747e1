use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use milestone_tracker::{
    build_router,
    config::Config,
    services::{
        store::{MemoryStorage, SurrealStorage},
        Database,
    },
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置
    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    // 初始化日志
    // 生产环境输出 JSON 日志
    let json_logs = config.is_production();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.clone()))
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    info!("Starting milestone tracker ({})...", config.environment);

    // 初始化存储
    let app_state = if config.uses_memory_storage() {
        info!("Using in-memory storage");
        Arc::new(AppState::new(config.clone(), Arc::new(MemoryStorage::new())))
    } else {
        let db = match Database::new(&config).await {
            Ok(db) => db,
            Err(e) => {
                error!("Failed to create database connection: {}", e);
                return Err(anyhow::anyhow!("Database initialization failed"));
            }
        };
        db.verify_connection().await?;
        db.apply_schema().await?;
        info!("Database connection established successfully");

        let storage = SurrealStorage::new(Arc::new(db));
        Arc::new(AppState::new(config.clone(), Arc::new(storage)))
    };

    // 启动后台任务
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reminder_handle = app_state.reminder_scheduler.clone().spawn(shutdown_rx);

    let app = build_router(app_state);

    // 启动主服务器
    let addr = format!("{}:{}", config.server_host, config.server_port);
    info!("Starting server on http://{}", addr);

    axum::Server::bind(&addr.parse()?)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, waiting for background tasks...");
    let _ = shutdown_tx.send(true);
    if let Err(e) = reminder_handle.await {
        error!("Reminder scheduler terminated abnormally: {}", e);
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
