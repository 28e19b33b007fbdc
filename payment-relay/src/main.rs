use payment_relay::{config::AppConfig, infrastructure::init_logging, server};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化配置
    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;

    // 初始化日志
    let _guard = init_logging(&config)?;

    info!(
        service = %config.service_name,
        environment = %config.environment,
        "Starting payment relay..."
    );

    server::run(config).await
}
