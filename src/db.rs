use anyhow::{Context, Result};
use log::{debug, info};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::currency_model::{Currency, CurrencyCode};

/// Open a connection pool to Postgres
pub async fn connect_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    info!("Connecting to database with up to {} connections", max_connections);

    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .context("Failed to connect to database")
}

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS admins (
            id SERIAL PRIMARY KEY,
            chat_id VARCHAR NOT NULL UNIQUE
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create admins table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS currencies (
            id SERIAL PRIMARY KEY,
            currency_name VARCHAR(3) NOT NULL UNIQUE,
            rate NUMERIC NOT NULL CHECK (rate > 0)
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create currencies table")?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Insert a currency; returns `false` when the code is already stored
pub async fn insert_currency(
    pool: &PgPool,
    code: &CurrencyCode,
    rate: Decimal,
) -> Result<bool, sqlx::Error> {
    info!("Inserting currency {} with rate {}", code, rate);

    // ON CONFLICT keeps concurrent duplicate adds from surfacing as a unique violation
    let result = sqlx::query(
        "INSERT INTO currencies (currency_name, rate) VALUES ($1, $2)
         ON CONFLICT (currency_name) DO NOTHING",
    )
    .bind(code.as_str())
    .bind(rate)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Overwrite the rate of a currency; returns `false` when the code is unknown
pub async fn update_currency_rate(
    pool: &PgPool,
    code: &CurrencyCode,
    rate: Decimal,
) -> Result<bool, sqlx::Error> {
    info!("Updating currency {} to rate {}", code, rate);

    let result = sqlx::query("UPDATE currencies SET rate = $1 WHERE currency_name = $2")
        .bind(rate)
        .bind(code.as_str())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a currency; returns `false` when the code is unknown
pub async fn delete_currency(pool: &PgPool, code: &CurrencyCode) -> Result<bool, sqlx::Error> {
    info!("Deleting currency {}", code);

    let result = sqlx::query("DELETE FROM currencies WHERE currency_name = $1")
        .bind(code.as_str())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Read the rate of a single currency
pub async fn read_currency_rate(
    pool: &PgPool,
    code: &CurrencyCode,
) -> Result<Option<Decimal>, sqlx::Error> {
    debug!("Reading rate for currency {}", code);

    sqlx::query_scalar::<_, Decimal>("SELECT rate FROM currencies WHERE currency_name = $1")
        .bind(code.as_str())
        .fetch_optional(pool)
        .await
}

/// List every currency ordered by code
pub async fn list_currencies(pool: &PgPool) -> Result<Vec<Currency>, sqlx::Error> {
    debug!("Listing currencies");

    let rows = sqlx::query_as::<_, (String, Decimal)>(
        "SELECT currency_name, rate FROM currencies ORDER BY currency_name",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(name, rate)| -> Result<Currency, sqlx::Error> {
            let code = CurrencyCode::parse(&name).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
            Ok(Currency { code, rate })
        })
        .collect()
}

/// Add a chat to the admin allow-list; returns `false` when it was already there
pub async fn insert_admin(pool: &PgPool, chat_id: &str) -> Result<bool, sqlx::Error> {
    info!("Granting admin rights to chat {}", chat_id);

    let result =
        sqlx::query("INSERT INTO admins (chat_id) VALUES ($1) ON CONFLICT (chat_id) DO NOTHING")
            .bind(chat_id)
            .execute(pool)
            .await?;

    Ok(result.rows_affected() > 0)
}

/// Remove a chat from the admin allow-list
pub async fn delete_admin(pool: &PgPool, chat_id: &str) -> Result<bool, sqlx::Error> {
    info!("Revoking admin rights of chat {}", chat_id);

    let result = sqlx::query("DELETE FROM admins WHERE chat_id = $1")
        .bind(chat_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Whether the chat is on the admin allow-list
pub async fn is_admin(pool: &PgPool, chat_id: &str) -> Result<bool, sqlx::Error> {
    let exists = sqlx::query_scalar::<_, i32>("SELECT 1 FROM admins WHERE chat_id = $1")
        .bind(chat_id)
        .fetch_optional(pool)
        .await?;

    Ok(exists.is_some())
}
