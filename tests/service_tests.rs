//! # Service Tests
//!
//! Both HTTP services run on ephemeral ports over one in-memory store and are
//! exercised through the bot's HTTP client back-end.

use anyhow::Result;
use rust_decimal::Decimal;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use currency_bot::currency_model::{CurrencyCode, PositiveDecimal};
use currency_bot::errors::StoreError;
use currency_bot::http_client::HttpCurrencyStore;
use currency_bot::service::{currency_manager, data_manager, SharedStore};
use currency_bot::store::{CurrencyStore, MemoryCurrencyStore};

async fn spawn(app: axum::Router) -> Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok(addr)
}

struct Services {
    store: SharedStore,
    client: HttpCurrencyStore,
    currency_manager: SocketAddr,
    data_manager: SocketAddr,
}

async fn setup() -> Result<Services> {
    let store: SharedStore = Arc::new(MemoryCurrencyStore::new());
    let currency_manager = spawn(currency_manager::router(store.clone())).await?;
    let data_manager = spawn(data_manager::router(store.clone())).await?;

    let client = HttpCurrencyStore::new(
        &format!("http://{}", currency_manager),
        &format!("http://{}/", data_manager),
        Duration::from_secs(5),
    )?;

    Ok(Services {
        store,
        client,
        currency_manager,
        data_manager,
    })
}

fn code(s: &str) -> CurrencyCode {
    CurrencyCode::parse(s).unwrap()
}

fn rate(s: &str) -> PositiveDecimal {
    PositiveDecimal::parse(s).unwrap()
}

#[tokio::test]
async fn test_crud_through_services() -> Result<()> {
    let services = setup().await?;
    let client = &services.client;

    client.add(&code("USD"), rate("90.5")).await?;
    client.add(&code("EUR"), rate("100")).await?;

    let listed = client.list().await?;
    let codes: Vec<&str> = listed.iter().map(|c| c.code.as_str()).collect();
    assert_eq!(codes, vec!["EUR", "USD"]);
    assert_eq!(listed[1].rate, Decimal::new(905, 1));

    client.update_rate(&code("USD"), rate("95")).await?;
    assert_eq!(client.rate_of(&code("USD")).await?, Decimal::from(95));

    client.remove(&code("USD")).await?;
    assert!(!client.contains(&code("USD")).await?);

    Ok(())
}

#[tokio::test]
async fn test_error_statuses_map_to_store_errors() -> Result<()> {
    let services = setup().await?;
    let client = &services.client;

    client.add(&code("USD"), rate("90")).await?;
    assert!(matches!(
        client.add(&code("USD"), rate("91")).await,
        Err(StoreError::AlreadyExists(_))
    ));
    assert!(matches!(
        client.update_rate(&code("GBP"), rate("1")).await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        client.remove(&code("GBP")).await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        client.convert(&code("GBP"), rate("1")).await,
        Err(StoreError::NotFound(_))
    ));
    assert_eq!(client.rate_of(&code("USD")).await?, Decimal::from(90));

    Ok(())
}

#[tokio::test]
async fn test_convert_through_data_manager() -> Result<()> {
    let services = setup().await?;
    let client = &services.client;

    client.add(&code("EUR"), rate("100")).await?;
    let conversion = client.convert(&code("EUR"), rate("2")).await?;
    assert_eq!(conversion.converted_amount, Decimal::from(200));
    assert_eq!(conversion.rate, Decimal::from(100));

    Ok(())
}

#[tokio::test]
async fn test_long_decimals_cross_the_wire_exactly() -> Result<()> {
    let services = setup().await?;
    let client = &services.client;
    let long_rate = rate("89.123456789012345678");
    let amount = rate("123456789.123456789");

    client.add(&code("USD"), long_rate).await?;
    assert_eq!(client.rate_of(&code("USD")).await?, long_rate.get());
    assert_eq!(
        services.store.rate_of(&code("USD")).await?,
        long_rate.get()
    );

    let over_http = client.convert(&code("USD"), amount).await?;
    let in_process = services.store.convert(&code("USD"), amount).await?;
    assert_eq!(over_http.rate, long_rate.get());
    assert_eq!(over_http.converted_amount, in_process.converted_amount);
    assert!(over_http
        .converted_amount
        .to_string()
        .starts_with("11002895810.7546110120958652"));

    let http = reqwest::Client::new();
    let text = http
        .get(format!(
            "http://{}/convert?currency_name=USD&amount=123456789.123456789",
            services.data_manager
        ))
        .send()
        .await?
        .text()
        .await?;
    assert!(text.contains(r#""rate":89.123456789012345678"#), "{text}");

    Ok(())
}

#[tokio::test]
async fn test_raw_wire_format() -> Result<()> {
    let services = setup().await?;
    let http = reqwest::Client::new();
    let cm = format!("http://{}", services.currency_manager);
    let dm = format!("http://{}", services.data_manager);

    let response = http
        .post(format!("{}/load", cm))
        .json(&serde_json::json!({"currency_name": "usd", "rate": 89.5}))
        .send()
        .await?;
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body, serde_json::json!({"status": "OK"}));

    let response = http
        .post(format!("{}/load", cm))
        .json(&serde_json::json!({"currency_name": "USD", "rate": 1}))
        .send()
        .await?;
    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await?;
    assert!(body["detail"].is_string());

    let response = http
        .post(format!("{}/load", cm))
        .json(&serde_json::json!({"currency_name": "US", "rate": 1}))
        .send()
        .await?;
    assert_eq!(response.status(), 422);

    let response = http
        .post(format!("{}/update_currency", cm))
        .json(&serde_json::json!({"currency_name": "USD", "rate": -1}))
        .send()
        .await?;
    assert_eq!(response.status(), 422);

    let body: serde_json::Value = http
        .get(format!("{}/currencies", dm))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(
        body,
        serde_json::json!([{"currency_name": "USD", "rate": 89.5}])
    );

    let response = http
        .get(format!("{}/convert?currency_name=usd&amount=2", dm))
        .send()
        .await?;
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body, serde_json::json!({"converted_amount": 179.0, "rate": 89.5}));

    let response = http
        .get(format!("{}/convert?currency_name=JPY&amount=2", dm))
        .send()
        .await?;
    assert_eq!(response.status(), 404);

    // Undecodable input gets the same {"detail"} envelope as domain errors
    for url in [
        format!("{}/convert?currency_name=USD&amount=abc", dm),
        format!("{}/convert?currency_name=USD", dm),
    ] {
        let response = http.get(url).send().await?;
        assert_eq!(response.status(), 422);
        let body: serde_json::Value = response.json().await?;
        assert!(body["detail"].is_string(), "{body}");
    }

    for body in [
        serde_json::json!({"currency_name": "USD", "rate": "x"}),
        serde_json::json!({"currency_name": "USD", "rate": "89.5"}),
        serde_json::json!({"currency_name": "USD"}),
    ] {
        let response = http
            .post(format!("{}/update_currency", cm))
            .json(&body)
            .send()
            .await?;
        assert_eq!(response.status(), 422);
        let body: serde_json::Value = response.json().await?;
        assert!(body["detail"].is_string(), "{body}");
    }

    let response = http
        .post(format!("{}/delete", cm))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await?;
    assert_eq!(response.status(), 422);
    let body: serde_json::Value = response.json().await?;
    assert!(body["detail"].is_string(), "{body}");

    for base in [&cm, &dm] {
        let body: serde_json::Value = http
            .get(format!("{}/health", base))
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(body, serde_json::json!({"status": "OK"}));
    }

    Ok(())
}

#[tokio::test]
async fn test_unreachable_service_is_a_transport_error() -> Result<()> {
    // Bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let client = HttpCurrencyStore::new(
        &format!("http://{}", addr),
        &format!("http://{}", addr),
        Duration::from_secs(2),
    )?;

    let err = client.list().await.unwrap_err();
    assert!(err.is_transport(), "unexpected error: {err}");
    let err = client.add(&code("USD"), rate("1")).await.unwrap_err();
    assert!(err.is_transport(), "unexpected error: {err}");

    Ok(())
}
