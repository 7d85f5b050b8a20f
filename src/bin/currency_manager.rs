use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use currency_bot::config::ServiceConfig;
use currency_bot::db;
use currency_bot::service::{self, currency_manager};
use currency_bot::store::PgCurrencyStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    currency_bot::init_tracing();

    let config = ServiceConfig::from_env("CURRENCY_MANAGER_PORT", currency_manager::DEFAULT_PORT)?;
    info!(address = %config.bind_addr, "Starting currency-manager");

    let pool = db::connect_pool(&config.database_url, config.max_connections).await?;
    db::init_database_schema(&pool).await?;

    let app = currency_manager::router(Arc::new(PgCurrencyStore::new(pool)));
    service::serve("currency-manager", config.bind_addr, app).await
}
