//! currency-manager: mutating surface on the currency table.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{
    health, ApiError, ApiJson, CurrencyPayload, DeletePayload, SharedStore, StatusResponse,
};
use crate::currency_model::{CurrencyCode, PositiveDecimal};

pub const DEFAULT_PORT: u16 = 5001;

pub fn router(store: SharedStore) -> Router {
    Router::new()
        .route("/load", post(load_currency))
        .route("/update_currency", post(update_currency))
        .route("/delete", post(delete_currency))
        .route("/health", get(health))
        .with_state(store)
        .layer(TraceLayer::new_for_http())
}

/// POST /load - add a currency, 400 if it exists
async fn load_currency(
    State(store): State<SharedStore>,
    ApiJson(payload): ApiJson<CurrencyPayload>,
) -> Result<Json<StatusResponse>, ApiError> {
    let code = CurrencyCode::parse(&payload.currency_name)?;
    let rate = PositiveDecimal::new(payload.rate)?;

    store.add(&code, rate).await?;
    info!(currency = %code, rate = %rate, "Currency loaded");

    Ok(StatusResponse::ok())
}

/// POST /update_currency - overwrite a rate, 404 if unknown
async fn update_currency(
    State(store): State<SharedStore>,
    ApiJson(payload): ApiJson<CurrencyPayload>,
) -> Result<Json<StatusResponse>, ApiError> {
    let code = CurrencyCode::parse(&payload.currency_name)?;
    let rate = PositiveDecimal::new(payload.rate)?;

    store.update_rate(&code, rate).await?;
    info!(currency = %code, rate = %rate, "Currency rate updated");

    Ok(StatusResponse::ok())
}

/// POST /delete - remove a currency, 404 if unknown
async fn delete_currency(
    State(store): State<SharedStore>,
    ApiJson(payload): ApiJson<DeletePayload>,
) -> Result<Json<StatusResponse>, ApiError> {
    let code = CurrencyCode::parse(&payload.currency_name)?;

    store.remove(&code).await?;
    info!(currency = %code, "Currency deleted");

    Ok(StatusResponse::ok())
}
