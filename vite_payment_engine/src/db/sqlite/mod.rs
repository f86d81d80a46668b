//! SQLite backend for the order store.
//!
//! The store holds one row per order, keyed by payment id, and a single-row `gateway_meta` table for the
//! waiting-list snapshot. The schema is created on pool construction, so a fresh database file is usable
//! immediately.
mod orders;

use std::str::FromStr;

use log::debug;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use thiserror::Error;

use crate::{
    db_types::{NewOrder, Order, OrderStatusType, PaymentId, WaitingEntry},
    traits::{PaymentGatewayDatabase, PaymentGatewayError},
};

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database query error: {0}")]
    QueryError(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Connects to the database at `url`, creating the file and the schema if necessary.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
        orders::create_schema(&pool).await?;
        debug!("🗃️ Connected to database at {url}");
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl PaymentGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        &self.url
    }

    async fn insert_order(&self, payment_id: &PaymentId, order: NewOrder) -> Result<Order, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await.map_err(to_backend_error)?;
        orders::insert_order(payment_id, order, &mut conn).await
    }

    async fn fetch_order(&self, payment_id: &PaymentId) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await.map_err(to_backend_error)?;
        orders::fetch_order(payment_id, &mut conn).await
    }

    async fn order_exists(&self, payment_id: &PaymentId) -> Result<bool, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await.map_err(to_backend_error)?;
        orders::order_exists(payment_id, &mut conn).await
    }

    async fn update_order_status(
        &self,
        payment_id: &PaymentId,
        status: OrderStatusType,
    ) -> Result<Order, PaymentGatewayError> {
        let mut tx = self.pool.begin().await.map_err(to_backend_error)?;
        let order = orders::update_order_status(payment_id, status, &mut tx).await?;
        tx.commit().await.map_err(to_backend_error)?;
        Ok(order)
    }

    async fn save_waiting_snapshot(&self, entries: &[WaitingEntry]) -> Result<(), PaymentGatewayError> {
        let json = serde_json::to_string(entries)
            .map_err(|e| PaymentGatewayError::DatabaseError(format!("Could not serialize snapshot: {e}")))?;
        let mut conn = self.pool.acquire().await.map_err(to_backend_error)?;
        orders::save_meta(orders::WAITING_SNAPSHOT_KEY, &json, &mut conn).await
    }

    async fn load_waiting_snapshot(&self) -> Result<Vec<WaitingEntry>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await.map_err(to_backend_error)?;
        let json = orders::fetch_meta(orders::WAITING_SNAPSHOT_KEY, &mut conn).await?;
        match json {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| PaymentGatewayError::DatabaseError(format!("Could not parse snapshot: {e}"))),
            None => Ok(Vec::new()),
        }
    }
}

pub(crate) fn to_backend_error(e: sqlx::Error) -> PaymentGatewayError {
    PaymentGatewayError::DatabaseError(e.to_string())
}
