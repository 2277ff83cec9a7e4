use invoice_validator::config::StorageBackend;
use invoice_validator::{
    create_pool, init_schema, router, AppConfig, DocumentStore, GeminiExtractor, MemoryStore,
    PgStore, ValidatorService,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // 加载配置
    let config = AppConfig::from_env()?;

    // 初始化日志 - 本地时间格式, RUST_LOG 优先于配置中的 log.level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .init();

    info!("Starting server with config: {:?}", config);

    let store: Arc<dyn DocumentStore> = match config.storage.backend {
        StorageBackend::Postgres => {
            let pool = create_pool(&config.database).await?;
            init_schema(&pool).await?;
            info!("Database pool created");
            Arc::new(PgStore::new(pool))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage, data will be lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let extractor = Arc::new(GeminiExtractor::new(&config.extraction)?);

    let service = Arc::new(ValidatorService::new(store, extractor, config.clone()));
    let app = router(service, &config);

    // 启动服务器
    let addr = config.bind_addr();
    info!("Server listening on {}", addr);
    info!("API prefix: {}", config.server.api_prefix);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
