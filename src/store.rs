//! # Currency Store and Admin Gate
//!
//! The authoritative CRUD boundary on the currency table, plus the admin
//! allow-list consulted before any mutation. Each trait has an in-memory
//! implementation (volatile, no database) and a Postgres implementation; the
//! currency store additionally has an HTTP client implementation in
//! [`crate::http_client`].

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;

use crate::currency_model::{Conversion, Currency, CurrencyCode, PositiveDecimal};
use crate::db;
use crate::errors::StoreError;

/// CRUD and conversion over the currency table
#[async_trait]
pub trait CurrencyStore: Send + Sync {
    /// Fails with `AlreadyExists` when the code is present
    async fn add(&self, code: &CurrencyCode, rate: PositiveDecimal) -> Result<(), StoreError>;

    /// Fails with `NotFound` when the code is absent
    async fn update_rate(
        &self,
        code: &CurrencyCode,
        rate: PositiveDecimal,
    ) -> Result<(), StoreError>;

    /// Fails with `NotFound` when the code is absent
    async fn remove(&self, code: &CurrencyCode) -> Result<(), StoreError>;

    /// All currencies ordered by code
    async fn list(&self) -> Result<Vec<Currency>, StoreError>;

    /// `amount × rate`; fails with `NotFound` when the code is absent
    async fn convert(
        &self,
        code: &CurrencyCode,
        amount: PositiveDecimal,
    ) -> Result<Conversion, StoreError>;

    async fn rate_of(&self, code: &CurrencyCode) -> Result<Decimal, StoreError> {
        Ok(self.convert(code, PositiveDecimal::one()).await?.rate)
    }

    async fn contains(&self, code: &CurrencyCode) -> Result<bool, StoreError> {
        match self.rate_of(code).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Outcome of an admin grant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Granted,
    AlreadyAdmin,
}

/// Binary authorization check for mutating operations
#[async_trait]
pub trait AdminGate: Send + Sync {
    /// Idempotent
    async fn grant(&self, chat_id: &str) -> Result<Grant, StoreError>;

    async fn revoke(&self, chat_id: &str) -> Result<(), StoreError>;

    async fn is_admin(&self, chat_id: &str) -> Result<bool, StoreError>;
}

/// Volatile currency table
#[derive(Debug, Default)]
pub struct MemoryCurrencyStore {
    currencies: RwLock<BTreeMap<CurrencyCode, Decimal>>,
}

impl MemoryCurrencyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CurrencyStore for MemoryCurrencyStore {
    async fn add(&self, code: &CurrencyCode, rate: PositiveDecimal) -> Result<(), StoreError> {
        let mut currencies = self.currencies.write().await;
        if currencies.contains_key(code) {
            return Err(StoreError::AlreadyExists(code.clone()));
        }
        currencies.insert(code.clone(), rate.get());
        Ok(())
    }

    async fn update_rate(
        &self,
        code: &CurrencyCode,
        rate: PositiveDecimal,
    ) -> Result<(), StoreError> {
        match self.currencies.write().await.get_mut(code) {
            Some(stored) => {
                *stored = rate.get();
                Ok(())
            }
            None => Err(StoreError::NotFound(code.clone())),
        }
    }

    async fn remove(&self, code: &CurrencyCode) -> Result<(), StoreError> {
        self.currencies
            .write()
            .await
            .remove(code)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(code.clone()))
    }

    async fn list(&self) -> Result<Vec<Currency>, StoreError> {
        Ok(self
            .currencies
            .read()
            .await
            .iter()
            .map(|(code, rate)| Currency {
                code: code.clone(),
                rate: *rate,
            })
            .collect())
    }

    async fn convert(
        &self,
        code: &CurrencyCode,
        amount: PositiveDecimal,
    ) -> Result<Conversion, StoreError> {
        let rate = self
            .currencies
            .read()
            .await
            .get(code)
            .copied()
            .ok_or_else(|| StoreError::NotFound(code.clone()))?;
        Ok(Conversion::compute(code.clone(), amount, rate)?)
    }
}

/// Volatile admin allow-list
#[derive(Debug, Default)]
pub struct MemoryAdminGate {
    admins: RwLock<HashSet<String>>,
}

impl MemoryAdminGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn admin_count(&self) -> usize {
        self.admins.read().await.len()
    }
}

#[async_trait]
impl AdminGate for MemoryAdminGate {
    async fn grant(&self, chat_id: &str) -> Result<Grant, StoreError> {
        if self.admins.write().await.insert(chat_id.to_string()) {
            Ok(Grant::Granted)
        } else {
            Ok(Grant::AlreadyAdmin)
        }
    }

    async fn revoke(&self, chat_id: &str) -> Result<(), StoreError> {
        self.admins.write().await.remove(chat_id);
        Ok(())
    }

    async fn is_admin(&self, chat_id: &str) -> Result<bool, StoreError> {
        Ok(self.admins.read().await.contains(chat_id))
    }
}

/// Currency table in Postgres, one statement per operation
#[derive(Debug, Clone)]
pub struct PgCurrencyStore {
    pool: PgPool,
}

impl PgCurrencyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CurrencyStore for PgCurrencyStore {
    async fn add(&self, code: &CurrencyCode, rate: PositiveDecimal) -> Result<(), StoreError> {
        if db::insert_currency(&self.pool, code, rate.get()).await? {
            Ok(())
        } else {
            Err(StoreError::AlreadyExists(code.clone()))
        }
    }

    async fn update_rate(
        &self,
        code: &CurrencyCode,
        rate: PositiveDecimal,
    ) -> Result<(), StoreError> {
        if db::update_currency_rate(&self.pool, code, rate.get()).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound(code.clone()))
        }
    }

    async fn remove(&self, code: &CurrencyCode) -> Result<(), StoreError> {
        if db::delete_currency(&self.pool, code).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound(code.clone()))
        }
    }

    async fn list(&self) -> Result<Vec<Currency>, StoreError> {
        Ok(db::list_currencies(&self.pool).await?)
    }

    async fn convert(
        &self,
        code: &CurrencyCode,
        amount: PositiveDecimal,
    ) -> Result<Conversion, StoreError> {
        let rate = db::read_currency_rate(&self.pool, code)
            .await?
            .ok_or_else(|| StoreError::NotFound(code.clone()))?;
        Ok(Conversion::compute(code.clone(), amount, rate)?)
    }
}

/// Admin allow-list in Postgres
#[derive(Debug, Clone)]
pub struct PgAdminGate {
    pool: PgPool,
}

impl PgAdminGate {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdminGate for PgAdminGate {
    async fn grant(&self, chat_id: &str) -> Result<Grant, StoreError> {
        if db::insert_admin(&self.pool, chat_id).await? {
            Ok(Grant::Granted)
        } else {
            Ok(Grant::AlreadyAdmin)
        }
    }

    async fn revoke(&self, chat_id: &str) -> Result<(), StoreError> {
        db::delete_admin(&self.pool, chat_id).await?;
        Ok(())
    }

    async fn is_admin(&self, chat_id: &str) -> Result<bool, StoreError> {
        Ok(db::is_admin(&self.pool, chat_id).await?)
    }
}
