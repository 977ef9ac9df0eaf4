use std::sync::Arc;

use payment_orchestrator::api::{self, AppState};
use payment_orchestrator::config::Config;
use payment_orchestrator::gateway::MidtransGateway;
use payment_orchestrator::service::PaymentService;
use payment_orchestrator::storage::{self, PgPaymentStore, PoolConfig};
use payment_orchestrator::webhook::{SignatureVerifier, WebhookProcessor};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    tracing::info!("starting payment orchestrator");
    tracing::info!("environment: {}", config.server.environment);
    tracing::info!(
        "gateway: midtrans ({})",
        if config.midtrans.production {
            "production"
        } else {
            "sandbox"
        }
    );

    let pool = storage::init_pool(
        &config.database.url,
        PoolConfig {
            max_connections: config.database.max_connections,
            ..PoolConfig::default()
        },
    )
    .await?;
    sqlx::migrate!().run(&pool).await?;

    let gateway = Arc::new(MidtransGateway::new(config.midtrans.clone())?);
    let store = Arc::new(PgPaymentStore::new(pool.clone()));
    let service = Arc::new(PaymentService::new(gateway, store));
    let webhook = Arc::new(WebhookProcessor::new(
        service.clone(),
        SignatureVerifier::new(&config.midtrans.server_key),
    ));

    let app = api::router(AppState {
        service,
        webhook,
        pool,
    });

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
