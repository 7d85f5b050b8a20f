//! Currency store backed by the currency-manager and data-manager services.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use crate::currency_model::{Conversion, Currency, CurrencyCode, PositiveDecimal};
use crate::errors::StoreError;
use crate::service::{
    ConvertQuery, ConvertResponse, CurrencyEntry, CurrencyPayload, DeletePayload, ErrorBody,
};
use crate::store::CurrencyStore;

/// HTTP client for the two currency microservices
#[derive(Debug, Clone)]
pub struct HttpCurrencyStore {
    client: Client,
    currency_manager_url: String,
    data_manager_url: String,
}

impl HttpCurrencyStore {
    pub fn new(
        currency_manager_url: &str,
        data_manager_url: &str,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            currency_manager_url: currency_manager_url.trim_end_matches('/').to_string(),
            data_manager_url: data_manager_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Response, StoreError> {
        let url = format!("{}{}", self.currency_manager_url, path);
        debug!(url = %url, "POST");
        Ok(self.client.post(url).json(body).send().await?)
    }
}

/// Pull the `detail` out of an error response
async fn error_detail(response: Response) -> (StatusCode, String) {
    let status = response.status();
    let detail = match response.json::<ErrorBody>().await {
        Ok(body) => body.detail,
        Err(_) => status.canonical_reason().unwrap_or_default().to_string(),
    };
    (status, detail)
}

fn unexpected(status: StatusCode, detail: String) -> StoreError {
    warn!(status = %status, detail = %detail, "Currency service returned an error");
    StoreError::Service { status, detail }
}

#[async_trait]
impl CurrencyStore for HttpCurrencyStore {
    async fn add(&self, code: &CurrencyCode, rate: PositiveDecimal) -> Result<(), StoreError> {
        let payload = CurrencyPayload {
            currency_name: code.to_string(),
            rate: rate.get(),
        };
        let response = self.post("/load", &payload).await?;
        if response.status().is_success() {
            return Ok(());
        }
        match error_detail(response).await {
            (StatusCode::BAD_REQUEST, _) => Err(StoreError::AlreadyExists(code.clone())),
            (status, detail) => Err(unexpected(status, detail)),
        }
    }

    async fn update_rate(
        &self,
        code: &CurrencyCode,
        rate: PositiveDecimal,
    ) -> Result<(), StoreError> {
        let payload = CurrencyPayload {
            currency_name: code.to_string(),
            rate: rate.get(),
        };
        let response = self.post("/update_currency", &payload).await?;
        if response.status().is_success() {
            return Ok(());
        }
        match error_detail(response).await {
            (StatusCode::NOT_FOUND, _) => Err(StoreError::NotFound(code.clone())),
            (status, detail) => Err(unexpected(status, detail)),
        }
    }

    async fn remove(&self, code: &CurrencyCode) -> Result<(), StoreError> {
        let payload = DeletePayload {
            currency_name: code.to_string(),
        };
        let response = self.post("/delete", &payload).await?;
        if response.status().is_success() {
            return Ok(());
        }
        match error_detail(response).await {
            (StatusCode::NOT_FOUND, _) => Err(StoreError::NotFound(code.clone())),
            (status, detail) => Err(unexpected(status, detail)),
        }
    }

    async fn list(&self) -> Result<Vec<Currency>, StoreError> {
        let url = format!("{}/currencies", self.data_manager_url);
        debug!(url = %url, "GET");
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            let (status, detail) = error_detail(response).await;
            return Err(unexpected(status, detail));
        }

        let entries: Vec<CurrencyEntry> = response.json().await?;
        entries
            .into_iter()
            .map(|entry| -> Result<Currency, StoreError> {
                Ok(Currency {
                    code: CurrencyCode::parse(&entry.currency_name)?,
                    rate: entry.rate,
                })
            })
            .collect()
    }

    async fn convert(
        &self,
        code: &CurrencyCode,
        amount: PositiveDecimal,
    ) -> Result<Conversion, StoreError> {
        let url = format!("{}/convert", self.data_manager_url);
        let query = ConvertQuery {
            currency_name: code.to_string(),
            amount: amount.get(),
        };
        debug!(url = %url, currency = %code, "GET");
        let response = self.client.get(url).query(&query).send().await?;
        if !response.status().is_success() {
            return match error_detail(response).await {
                (StatusCode::NOT_FOUND, _) => Err(StoreError::NotFound(code.clone())),
                (status, detail) => Err(unexpected(status, detail)),
            };
        }

        let body: ConvertResponse = response.json().await?;
        Ok(Conversion {
            code: code.clone(),
            amount: amount.get(),
            rate: body.rate,
            converted_amount: body.converted_amount,
        })
    }
}
