use chrono::{DateTime, Utc};
use log::trace;
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use crate::{
    db::sqlite::to_backend_error,
    db_types::{NewOrder, Order, OrderStatusType, PaymentId},
    traits::PaymentGatewayError,
};

pub const WAITING_SNAPSHOT_KEY: &str = "waiting_payments";

pub async fn create_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            payment_id       TEXT PRIMARY KEY NOT NULL,
            created_at       TEXT NOT NULL,
            amount           TEXT NOT NULL,
            token_id         TEXT NOT NULL,
            data             TEXT NOT NULL,
            callback_address TEXT NOT NULL,
            status           TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS gateway_meta (
            key   TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Raw row shape. Amounts are stored as decimal strings because they exceed SQLite's integer range.
#[derive(FromRow)]
struct OrderRow {
    payment_id: String,
    created_at: DateTime<Utc>,
    amount: String,
    token_id: String,
    data: String,
    callback_address: String,
    status: String,
}

impl TryFrom<OrderRow> for Order {
    type Error = PaymentGatewayError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let id = PaymentId(row.payment_id);
        let amount = row.amount.parse().map_err(|e| PaymentGatewayError::CorruptRecord {
            id: id.clone(),
            reason: format!("bad amount: {e}"),
        })?;
        Ok(Order {
            payment_id: id,
            created_at: row.created_at,
            amount,
            token_id: row.token_id,
            data: row.data,
            callback_address: row.callback_address,
            status: OrderStatusType::from(row.status),
        })
    }
}

pub async fn insert_order(
    payment_id: &PaymentId,
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentGatewayError> {
    let order = Order {
        payment_id: payment_id.clone(),
        created_at: Utc::now(),
        amount: order.amount,
        token_id: order.token_id,
        data: order.data,
        callback_address: order.callback_address,
        status: OrderStatusType::Pending,
    };
    let result = sqlx::query(
        r#"
        INSERT INTO orders (payment_id, created_at, amount, token_id, data, callback_address, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7);
        "#,
    )
    .bind(order.payment_id.as_str())
    .bind(order.created_at)
    .bind(order.amount.to_string())
    .bind(&order.token_id)
    .bind(&order.data)
    .bind(&order.callback_address)
    .bind(order.status.to_string())
    .execute(conn)
    .await;
    match result {
        Ok(_) => {
            trace!("🗃️ Stored new order {payment_id}");
            Ok(order)
        },
        Err(e) if e.as_database_error().is_some_and(|d| d.is_unique_violation()) => {
            Err(PaymentGatewayError::OrderAlreadyExists { id: payment_id.clone() })
        },
        Err(e) => Err(to_backend_error(e)),
    }
}

pub async fn fetch_order(
    payment_id: &PaymentId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let row = sqlx::query_as::<_, OrderRow>(
        r#"
        SELECT payment_id, created_at, amount, token_id, data, callback_address, status
        FROM orders
        WHERE payment_id = $1;
        "#,
    )
    .bind(payment_id.as_str())
    .fetch_optional(conn)
    .await
    .map_err(to_backend_error)?;
    row.map(Order::try_from).transpose()
}

pub async fn order_exists(payment_id: &PaymentId, conn: &mut SqliteConnection) -> Result<bool, PaymentGatewayError> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM orders WHERE payment_id = $1;")
        .bind(payment_id.as_str())
        .fetch_optional(conn)
        .await
        .map_err(to_backend_error)?;
    Ok(exists.is_some())
}

/// Applies the monotonicity rule inside a transaction: equal status is a no-op, a lower rank is refused.
pub async fn update_order_status(
    payment_id: &PaymentId,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentGatewayError> {
    let current = fetch_order(payment_id, &mut *conn)
        .await?
        .ok_or_else(|| PaymentGatewayError::OrderNotFound(payment_id.clone()))?;
    if status.rank() < current.status.rank() {
        return Err(PaymentGatewayError::StatusRegression { id: payment_id.clone(), from: current.status, to: status });
    }
    if status == current.status {
        return Ok(current);
    }
    sqlx::query("UPDATE orders SET status = $1 WHERE payment_id = $2;")
        .bind(status.to_string())
        .bind(payment_id.as_str())
        .execute(conn)
        .await
        .map_err(to_backend_error)?;
    trace!("🗃️ Order {payment_id} moved from {} to {status}", current.status);
    Ok(Order { status, ..current })
}

pub async fn save_meta(key: &str, value: &str, conn: &mut SqliteConnection) -> Result<(), PaymentGatewayError> {
    sqlx::query(
        r#"
        INSERT INTO gateway_meta (key, value) VALUES ($1, $2)
        ON CONFLICT (key) DO UPDATE SET value = excluded.value;
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(conn)
    .await
    .map_err(to_backend_error)?;
    Ok(())
}

pub async fn fetch_meta(key: &str, conn: &mut SqliteConnection) -> Result<Option<String>, PaymentGatewayError> {
    sqlx::query_scalar("SELECT value FROM gateway_meta WHERE key = $1;")
        .bind(key)
        .fetch_optional(conn)
        .await
        .map_err(to_backend_error)
}
