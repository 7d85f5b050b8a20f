//! data-manager: read and conversion surface on the currency table.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use tracing::debug;

use super::{
    health, ApiError, ApiQuery, ConvertQuery, ConvertResponse, CurrencyEntry, SharedStore,
};
use crate::currency_model::{CurrencyCode, PositiveDecimal};

pub const DEFAULT_PORT: u16 = 5002;

pub fn router(store: SharedStore) -> Router {
    Router::new()
        .route("/currencies", get(list_currencies))
        .route("/convert", get(convert_currency))
        .route("/health", get(health))
        .with_state(store)
        .layer(TraceLayer::new_for_http())
}

/// GET /currencies - every currency ordered by code
async fn list_currencies(
    State(store): State<SharedStore>,
) -> Result<Json<Vec<CurrencyEntry>>, ApiError> {
    let currencies = store.list().await?;
    debug!(count = currencies.len(), "Listing currencies");

    Ok(Json(
        currencies
            .into_iter()
            .map(|c| CurrencyEntry {
                currency_name: c.code.to_string(),
                rate: c.rate,
            })
            .collect(),
    ))
}

/// GET /convert?currency_name&amount - amount × rate, 404 if unknown
async fn convert_currency(
    State(store): State<SharedStore>,
    ApiQuery(query): ApiQuery<ConvertQuery>,
) -> Result<Json<ConvertResponse>, ApiError> {
    let code = CurrencyCode::parse(&query.currency_name)?;
    let amount = PositiveDecimal::new(query.amount)?;

    let conversion = store.convert(&code, amount).await?;
    debug!(
        currency = %code,
        amount = %amount,
        result = %conversion.converted_amount,
        "Converted"
    );

    Ok(Json(ConvertResponse {
        converted_amount: conversion.converted_amount,
        rate: conversion.rate,
    }))
}
