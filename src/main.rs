use anyhow::{Context, Result};
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use tracing::info;

use currency_bot::bot::{self, ConversationController};
use currency_bot::config::{BotConfig, StoreBackend};
use currency_bot::db;
use currency_bot::dialogue::ChatState;
use currency_bot::http_client::HttpCurrencyStore;
use currency_bot::localization::init_localization;
use currency_bot::store::{
    AdminGate, CurrencyStore, MemoryAdminGate, MemoryCurrencyStore, PgAdminGate, PgCurrencyStore,
};

/// Build the currency store and admin gate for the configured back-end
async fn build_stores(
    config: &BotConfig,
) -> Result<(Arc<dyn CurrencyStore>, Arc<dyn AdminGate>)> {
    if config.backend == StoreBackend::Memory {
        info!("Using in-memory store, data will not survive a restart");
        let currencies: Arc<dyn CurrencyStore> = Arc::new(MemoryCurrencyStore::new());
        let admins: Arc<dyn AdminGate> = Arc::new(MemoryAdminGate::new());
        return Ok((currencies, admins));
    }

    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set")?;
    let pool = db::connect_pool(database_url, config.max_connections).await?;
    db::init_database_schema(&pool).await?;
    let admins: Arc<dyn AdminGate> = Arc::new(PgAdminGate::new(pool.clone()));

    let currencies: Arc<dyn CurrencyStore> = match config.backend {
        StoreBackend::Http => {
            info!(
                currency_manager = %config.currency_manager_url,
                data_manager = %config.data_manager_url,
                "Using currency services"
            );
            Arc::new(HttpCurrencyStore::new(
                &config.currency_manager_url,
                &config.data_manager_url,
                config.http_timeout,
            )?)
        }
        _ => Arc::new(PgCurrencyStore::new(pool)),
    };

    Ok((currencies, admins))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    currency_bot::init_tracing();

    info!("Starting Currency Telegram Bot");

    let config = BotConfig::from_env()?;

    init_localization(&config.default_language)?;

    let (currencies, admins) = build_stores(&config).await?;
    if config.admin_command.is_none() {
        info!("ADMIN_COMMAND is not set, nobody can become an administrator");
    }
    let controller = Arc::new(ConversationController::new(
        currencies,
        admins,
        config.admin_command.clone(),
    ));

    // Initialize the bot
    let bot = Bot::new(config.bot_token);

    info!(backend = ?config.backend, "Bot initialized, starting dispatcher");

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .enter_dialogue::<Message, InMemStorage<ChatState>, ChatState>()
                .endpoint(bot::message_handler),
        )
        .branch(
            Update::filter_callback_query()
                .enter_dialogue::<CallbackQuery, InMemStorage<ChatState>, ChatState>()
                .endpoint(bot::callback_handler),
        );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![InMemStorage::<ChatState>::new(), controller])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
