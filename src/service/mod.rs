//! HTTP microservices over the currency table.
//!
//! - `currency_manager`: `POST /load`, `POST /update_currency`, `POST /delete`
//! - `data_manager`: `GET /currencies`, `GET /convert`
//!
//! Both are thin axum routers over any [`CurrencyStore`]; the wire types here
//! are shared with [`crate::http_client::HttpCurrencyStore`].

pub mod currency_manager;
pub mod data_manager;

use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::errors::StoreError;
use crate::store::CurrencyStore;

/// Store shared by the handlers of one service
pub type SharedStore = Arc<dyn CurrencyStore>;

/// Decimals as plain JSON numbers, digit for digit.
///
/// Going through `f64` would round rates past 15 significant digits, so the
/// decimal's own text is written as a raw JSON number and parsed back the
/// same way. JSON strings are rejected.
pub mod json_decimal {
    use rust_decimal::Decimal;
    use serde::de::Error as _;
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::value::RawValue;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
        RawValue::from_string(value.to_string())
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        parse(raw.get()).ok_or_else(|| {
            D::Error::custom(format!("expected a decimal number, got {}", raw.get()))
        })
    }

    /// Parse the text of a JSON number; anything else is `None`
    pub fn parse(text: &str) -> Option<Decimal> {
        let text = text.trim();
        if !text.starts_with(|c: char| c == '-' || c.is_ascii_digit()) {
            return None;
        }
        Decimal::from_str(text)
            .or_else(|_| Decimal::from_scientific(text))
            .ok()
    }
}

/// Body of `POST /load` and `POST /update_currency`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyPayload {
    pub currency_name: String,
    #[serde(with = "json_decimal")]
    pub rate: Decimal,
}

/// Body of `POST /delete`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletePayload {
    pub currency_name: String,
}

/// Element of `GET /currencies`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyEntry {
    pub currency_name: String,
    #[serde(with = "json_decimal")]
    pub rate: Decimal,
}

/// Query string of `GET /convert`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertQuery {
    pub currency_name: String,
    pub amount: Decimal,
}

/// Body of a successful `GET /convert`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertResponse {
    #[serde(with = "json_decimal")]
    pub converted_amount: Decimal,
    #[serde(with = "json_decimal")]
    pub rate: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Json<Self> {
        Json(Self {
            status: "OK".to_string(),
        })
    }
}

/// Error body, `{"detail": "..."}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// Failure of a handler, rendered as `(status, {"detail"})`
#[derive(Debug)]
pub enum ApiError {
    Store(StoreError),
    /// Body or query string that could not be decoded
    Malformed(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<crate::errors::InputError> for ApiError {
    fn from(err: crate::errors::InputError) -> Self {
        Self::Store(StoreError::Invalid(err))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(StoreError::AlreadyExists(_)) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::Invalid(_)) | ApiError::Malformed(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Store(
                StoreError::Database(_) | StoreError::Http(_) | StoreError::Service { .. },
            ) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> String {
        match self {
            ApiError::Store(err) => err.to_string(),
            ApiError::Malformed(detail) => detail.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.detail();
        if status.is_server_error() {
            error!(error = %detail, "Request failed");
        }
        (status, Json(ErrorBody { detail })).into_response()
    }
}

/// JSON body extractor whose rejections use the `{"detail"}` envelope
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::Malformed(rejection.body_text()))?;
        serde_json::from_slice(&bytes).map(ApiJson).map_err(|e| {
            debug!(error = %e, "Rejected request body");
            ApiError::Malformed(format!("Invalid request body: {}", e))
        })
    }
}

/// Query string extractor whose rejections use the `{"detail"}` envelope
#[derive(Debug, Clone)]
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                debug!(error = %rejection.body_text(), "Rejected query string");
                ApiError::Malformed(rejection.body_text())
            })?;
        Ok(ApiQuery(value))
    }
}


/// `GET /health`
pub async fn health() -> Json<StatusResponse> {
    StatusResponse::ok()
}

/// Bind and serve a router until ctrl-c
pub async fn serve(name: &str, addr: SocketAddr, app: axum::Router) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(service = name, address = %addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!(service = name, "Shut down");
    Ok(())
}
