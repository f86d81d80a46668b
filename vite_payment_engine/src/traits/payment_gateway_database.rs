use thiserror::Error;

use crate::db_types::{NewOrder, Order, OrderStatusType, PaymentId, WaitingEntry};

/// The storage contract backing the payment gateway.
///
/// The store is a plain keyed collection: one record per payment id, plus a single auxiliary slot holding the
/// waiting-list snapshot written at shutdown. Implementations must enforce that order status never moves backwards;
/// everything else about transition ordering is the caller's problem.
#[allow(async_fn_in_trait)]
pub trait PaymentGatewayDatabase: Clone {
    /// The URL of the backing store.
    fn url(&self) -> &str;

    /// Stores a brand-new order under `payment_id`. Fails if the key is already taken.
    async fn insert_order(&self, payment_id: &PaymentId, order: NewOrder) -> Result<Order, PaymentGatewayError>;

    /// Fetches the order stored under `payment_id`, or `None` if the key is unknown.
    async fn fetch_order(&self, payment_id: &PaymentId) -> Result<Option<Order>, PaymentGatewayError>;

    /// Checks whether an order exists for `payment_id` without fetching it.
    async fn order_exists(&self, payment_id: &PaymentId) -> Result<bool, PaymentGatewayError>;

    /// Moves the order to `status` and returns the updated record.
    ///
    /// Setting the status an order already has is a no-op and succeeds (settlement is idempotent). Moving backwards
    /// returns [`PaymentGatewayError::StatusRegression`].
    async fn update_order_status(
        &self,
        payment_id: &PaymentId,
        status: OrderStatusType,
    ) -> Result<Order, PaymentGatewayError>;

    /// Overwrites the waiting-list snapshot. Called once, on shutdown.
    async fn save_waiting_snapshot(&self, entries: &[WaitingEntry]) -> Result<(), PaymentGatewayError>;

    /// Reads back the last waiting-list snapshot, if any was ever written.
    async fn load_waiting_snapshot(&self) -> Result<Vec<WaitingEntry>, PaymentGatewayError>;
}

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(PaymentId),
    #[error("Order {id} already exists")]
    OrderAlreadyExists { id: PaymentId },
    #[error("Refusing to move order {id} backwards from {from} to {to}")]
    StatusRegression { id: PaymentId, from: OrderStatusType, to: OrderStatusType },
    #[error("Stored record for {id} is corrupt: {reason}")]
    CorruptRecord { id: PaymentId, reason: String },
}
