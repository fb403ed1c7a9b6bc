pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

pub use api::handlers;
pub use api::routes;

pub use error::{PricingError, ServiceError};

pub use logic::{
    derive_price, AllocatedCode, CatalogService, CodeAllocator, SequenceCursor, TaxTable,
};

// Export all model types
pub use model::*;

pub use seed::*;

pub use store::{MemoryStore, PostgresStore, Store};

use crate::api::handlers::AppState;
use crate::config::{AppConfig, StorageBackend};
use std::sync::Arc;

/// Initialize env_logger at INFO, keeping sqlx quiet unless RUST_LOG says otherwise
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info,sqlx=warn"),
    )
    .try_init();
}

/// Build the router for a store and serve it until shutdown
pub async fn serve<S: Store + 'static>(store: Arc<S>, config: &AppConfig) -> anyhow::Result<()> {
    use tokio::net::TcpListener;

    if std::env::var("LOAD_SEED_DATA").unwrap_or_default() == "true" {
        log::info!("Loading seed data...");
        seed::load_seed_data(&*store).await?;
    }

    let tax_table = TaxTable::new(&config.pricing.tax_rates);
    log::info!(
        "Pricing tax table has {} billing entities",
        tax_table.rates().len()
    );
    let app = routes::create_router().with_state(AppState::new(store, tax_table));

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("Liftworks ERP server running on http://{}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Start the server with the configured storage backend
pub async fn run_server(config: &AppConfig) -> anyhow::Result<()> {
    match config.storage.backend {
        StorageBackend::Postgres => {
            let database_url = config.database_url()?;
            log::info!("Connecting to PostgreSQL...");
            let postgres_store =
                PostgresStore::new(&database_url, config.max_connections()).await?;

            log::info!("Running database migrations...");
            postgres_store.migrate().await?;

            serve(Arc::new(postgres_store), config).await
        }
        StorageBackend::Memory => {
            log::warn!("Using in-memory storage; data is lost on restart");
            serve(Arc::new(MemoryStore::new()), config).await
        }
    }
}
