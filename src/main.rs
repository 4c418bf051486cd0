use benefits_recon::{api, create_pool, AppConfig, PgStore, RateService, ReconciliationService};
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::from_env();
    info!("Starting server with config: {:?}", config);

    // 创建数据库连接池
    let pool = create_pool(&config.database).await?;
    info!("Database pool created");

    let store = Arc::new(PgStore::new(pool));
    let reconciliation = Arc::new(
        ReconciliationService::new(store.clone())
            .with_sort_by_name(config.reconciliation.sort_by_name),
    );
    let rates = Arc::new(RateService::new(store));

    let app = api::routes(reconciliation, rates).layer(ServiceBuilder::new());

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  GET  /api/reconciliation?month=YYYY-MM");
    info!("  GET  /api/reconciliation/export?month=YYYY-MM");
    info!("  POST /api/reconciliation/review");
    info!("  GET  /api/benefits");
    info!("  GET  /api/benefits/:id/rate");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
