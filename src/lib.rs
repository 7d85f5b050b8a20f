//! # Currency Telegram Bot
//!
//! A Telegram bot that converts foreign currency amounts into rubles using a
//! table of admin-maintained rates, plus the two HTTP services
//! (currency-manager and data-manager) that can own that table.

pub mod bot;
pub mod config;
pub mod currency_model;
pub mod db;
pub mod dialogue;
pub mod errors;
pub mod http_client;
pub mod localization;
pub mod service;
pub mod store;

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber; `RUST_LOG_FORMAT=json` switches to JSON lines
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info,sqlx=warn"));
    let builder = fmt().with_env_filter(env_filter).with_target(false);

    if std::env::var("RUST_LOG_FORMAT").is_ok_and(|format| format == "json") {
        builder.json().init();
    } else {
        builder.init();
    }
}
