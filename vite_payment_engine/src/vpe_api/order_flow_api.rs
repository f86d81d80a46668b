use std::fmt::Debug;

use log::*;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use vpg_common::AttoVite;

use crate::{
    db_types::{NewOrder, Order, OrderStatusType, PaymentId},
    events::{EventProducers, OrderSettledEvent},
    registries::WaitingList,
    traits::{PaymentGatewayDatabase, PaymentGatewayError},
};

/// `OrderFlowApi` drives every order state transition: creation, the low-confirmation match that parks an order in
/// `WAITING_CONFIRM`, and settlement. It owns the waiting list registration side; the whitelist stays with the
/// reconciliation loop, which is its only writer.
#[derive(Clone)]
pub struct OrderFlowApi<B> {
    db: B,
    waiting: WaitingList,
    producers: EventProducers,
    pay_timeout_millis: i64,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

#[derive(Debug, Error)]
pub enum OrderFlowError {
    #[error("Backend error: {0}")]
    Backend(#[from] PaymentGatewayError),
}

/// Outcome of classifying a discovered (below-threshold) transfer against the order book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    /// Token and amount agreed. The order is now `WAITING_CONFIRM` and the caller should whitelist the hash.
    Matched(Order),
    /// The decoded payment id has no active countdown, so the transfer is ignored. Covers both already-matched
    /// orders and lapsed offers.
    NotWaiting,
    /// The decoded payment id matches no stored order.
    UnknownOrder,
    /// The transfer disagreed with the order on token id or amount. Nothing is persisted.
    Mismatch,
}

/// What `getPaymentStatus` reports: the stored status plus the live countdown, when one is running.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentStatus {
    #[serde(rename = "timeLeft")]
    pub time_left: Option<i64>,
    pub status: OrderStatusType,
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, waiting: WaitingList, producers: EventProducers, pay_timeout_millis: i64) -> Self {
        Self { db, waiting, producers, pay_timeout_millis }
    }

    pub fn waiting_list(&self) -> &WaitingList {
        &self.waiting
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderFlowApi<B>
where B: PaymentGatewayDatabase
{
    /// Registers a new order: picks a payment id that is unique among stored keys, stores the order as `PENDING`
    /// and starts the offer countdown. Returns the stored order and the countdown's starting value.
    pub async fn create_order(&self, order: NewOrder) -> Result<(Order, i64), OrderFlowError> {
        let payment_id = self.generate_payment_id().await?;
        let order = self.db.insert_order(&payment_id, order).await?;
        self.waiting.register(payment_id.clone(), self.pay_timeout_millis);
        debug!("🔄️📦️ Order {payment_id} stored. Offer lapses in {}ms", self.pay_timeout_millis);
        Ok((order, self.pay_timeout_millis))
    }

    /// The live view of an order: stored status plus remaining offer time. `None` for an unknown payment id.
    pub async fn payment_status(&self, payment_id: &PaymentId) -> Result<Option<PaymentStatus>, OrderFlowError> {
        let order = self.db.fetch_order(payment_id).await?;
        Ok(order.map(|o| PaymentStatus { time_left: self.waiting.time_left(payment_id), status: o.status }))
    }

    /// Classifies a transfer seen below the confirmation threshold.
    ///
    /// Only orders with an active countdown are considered. On a token/amount match the countdown is cancelled
    /// first and the status persisted second; a crash between the two leaves the order `PENDING` with no countdown,
    /// which the store cannot distinguish from a lapsed offer. That gap is inherent to the two-store design.
    pub async fn transfer_discovered(
        &self,
        payment_id: &PaymentId,
        token_id: &str,
        amount: AttoVite,
    ) -> Result<DiscoveryOutcome, OrderFlowError> {
        if !self.waiting.contains(payment_id) {
            trace!("🔄️💰️ Transfer for {payment_id} ignored: no active countdown");
            return Ok(DiscoveryOutcome::NotWaiting);
        }
        let Some(order) = self.db.fetch_order(payment_id).await? else {
            trace!("🔄️💰️ Transfer ignored: no order stored under {payment_id}");
            return Ok(DiscoveryOutcome::UnknownOrder);
        };
        if order.token_id != token_id || order.amount != amount {
            warn!(
                "🔄️💰️ Transfer for {payment_id} disagrees with the order (got {amount} of {token_id}, expected {} \
                 of {}). Ignoring it.",
                order.amount, order.token_id
            );
            return Ok(DiscoveryOutcome::Mismatch);
        }
        self.waiting.deregister(payment_id);
        let order = self.db.update_order_status(payment_id, OrderStatusType::WaitingConfirm).await?;
        info!("🔄️💰️ Order {payment_id} matched an inbound transfer and is waiting for confirmations");
        Ok(DiscoveryOutcome::Matched(order))
    }

    /// Finalizes an order once its transfer is sufficiently deep: persists `COMPLETED` and announces the settlement
    /// to subscribers. Returns the settled snapshot, or `None` when no order is stored under the id.
    pub async fn settle_order(&self, payment_id: &PaymentId) -> Result<Option<Order>, OrderFlowError> {
        let Some(order) = self.db.fetch_order(payment_id).await? else {
            warn!("🔄️✅️ A confirmed transfer referenced {payment_id}, but no such order is stored");
            return Ok(None);
        };
        if order.status == OrderStatusType::Completed {
            debug!("🔄️✅️ Order {payment_id} was already settled");
            return Ok(Some(order));
        }
        let order = self.db.update_order_status(payment_id, OrderStatusType::Completed).await?;
        info!("🔄️✅️ Order {payment_id} settled for {:#} of {}", order.amount, order.token_id);
        self.announce_settlement(&order).await;
        Ok(Some(order))
    }

    async fn announce_settlement(&self, order: &Order) {
        for producer in &self.producers.order_settled {
            let event = OrderSettledEvent { order: order.clone() };
            producer.publish_event(event).await;
        }
    }

    /// Random 7-digit ids, re-rolled until one misses every stored key.
    async fn generate_payment_id(&self) -> Result<PaymentId, OrderFlowError> {
        loop {
            let candidate = {
                let mut rng = rand::thread_rng();
                PaymentId(rng.gen_range(1_000_000..10_000_000u32).to_string())
            };
            if !self.db.order_exists(&candidate).await? {
                return Ok(candidate);
            }
            debug!("🔄️📦️ Payment id collision on {candidate}, regenerating");
        }
    }
}

#[cfg(test)]
mod test {
    use vpg_common::{AttoVite, VITE_TOKEN_ID};

    use super::*;
    use crate::SqliteDatabase;

    const PAY_TIMEOUT_MS: i64 = 600_000;

    async fn new_api() -> OrderFlowApi<SqliteDatabase> {
        let _ = env_logger::try_init().ok();
        let db = SqliteDatabase::new_with_url("sqlite::memory:", 1).await.expect("Could not open database");
        OrderFlowApi::new(db, WaitingList::new(), EventProducers::default(), PAY_TIMEOUT_MS)
    }

    fn new_order(amount: u128) -> NewOrder {
        NewOrder::new(AttoVite::from(amount), VITE_TOKEN_ID)
            .with_data("test order")
            .with_callback_address("http://localhost:9000/cb")
    }

    #[tokio::test]
    async fn creation_registers_a_countdown() {
        let api = new_api().await;
        let (order, time_left) = api.create_order(new_order(1_500_000_000_000_000_000)).await.unwrap();
        assert_eq!(order.status, OrderStatusType::Pending);
        assert_eq!(time_left, PAY_TIMEOUT_MS);
        assert_eq!(api.waiting_list().time_left(&order.payment_id), Some(PAY_TIMEOUT_MS));
        let status = api.payment_status(&order.payment_id).await.unwrap().unwrap();
        assert_eq!(status.status, OrderStatusType::Pending);
        assert_eq!(status.time_left, Some(PAY_TIMEOUT_MS));
    }

    #[tokio::test]
    async fn payment_ids_are_seven_digit_strings() {
        let api = new_api().await;
        let (order, _) = api.create_order(new_order(10)).await.unwrap();
        assert_eq!(order.payment_id.as_str().len(), 7);
        assert!(order.payment_id.as_str().chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn matching_transfer_parks_the_order() {
        let api = new_api().await;
        let (order, _) = api.create_order(new_order(500)).await.unwrap();
        let outcome = api.transfer_discovered(&order.payment_id, VITE_TOKEN_ID, AttoVite::from(500u128)).await.unwrap();
        let DiscoveryOutcome::Matched(updated) = outcome else {
            panic!("expected a match, got {outcome:?}");
        };
        assert_eq!(updated.status, OrderStatusType::WaitingConfirm);
        assert!(!api.waiting_list().contains(&order.payment_id));
        // reprocessing the same transfer is a no-op: the countdown is gone
        let outcome = api.transfer_discovered(&order.payment_id, VITE_TOKEN_ID, AttoVite::from(500u128)).await.unwrap();
        assert_eq!(outcome, DiscoveryOutcome::NotWaiting);
    }

    #[tokio::test]
    async fn mismatched_transfers_change_nothing() {
        let api = new_api().await;
        let (order, _) = api.create_order(new_order(500)).await.unwrap();
        let outcome = api.transfer_discovered(&order.payment_id, VITE_TOKEN_ID, AttoVite::from(499u128)).await.unwrap();
        assert_eq!(outcome, DiscoveryOutcome::Mismatch);
        let outcome = api.transfer_discovered(&order.payment_id, "tti_000000000000000000000000", AttoVite::from(500u128)).await.unwrap();
        assert_eq!(outcome, DiscoveryOutcome::Mismatch);
        // the order stays pending and keeps its countdown
        let status = api.payment_status(&order.payment_id).await.unwrap().unwrap();
        assert_eq!(status.status, OrderStatusType::Pending);
        assert!(api.waiting_list().contains(&order.payment_id));
    }

    #[tokio::test]
    async fn transfers_for_unknown_ids_are_ignored() {
        let api = new_api().await;
        let ghost = PaymentId("7654321".to_string());
        let outcome = api.transfer_discovered(&ghost, VITE_TOKEN_ID, AttoVite::from(1u128)).await.unwrap();
        assert_eq!(outcome, DiscoveryOutcome::NotWaiting);
        // even with a countdown present, a missing order record is ignored
        api.waiting_list().register(ghost.clone(), 1000);
        let outcome = api.transfer_discovered(&ghost, VITE_TOKEN_ID, AttoVite::from(1u128)).await.unwrap();
        assert_eq!(outcome, DiscoveryOutcome::UnknownOrder);
    }

    #[tokio::test]
    async fn settlement_is_idempotent_and_announced_once() {
        let _ = env_logger::try_init().ok();
        let db = SqliteDatabase::new_with_url("sqlite::memory:", 1).await.unwrap();
        let handler: crate::events::Handler<OrderSettledEvent> = std::sync::Arc::new(|_ev| Box::pin(async {}));
        let events = crate::events::EventHandler::new(8, handler);
        let producer = events.subscribe();
        let api = OrderFlowApi::new(
            db,
            WaitingList::new(),
            EventProducers::default().with_settled_producer(producer),
            PAY_TIMEOUT_MS,
        );

        let (order, _) = api.create_order(new_order(42)).await.unwrap();
        api.transfer_discovered(&order.payment_id, VITE_TOKEN_ID, AttoVite::from(42u128)).await.unwrap();
        let settled = api.settle_order(&order.payment_id).await.unwrap().unwrap();
        assert_eq!(settled.status, OrderStatusType::Completed);
        // repeated settlement returns the same snapshot and does not fail
        let again = api.settle_order(&order.payment_id).await.unwrap().unwrap();
        assert_eq!(again.status, OrderStatusType::Completed);
        // repeated status reads are stable
        for _ in 0..3 {
            let status = api.payment_status(&order.payment_id).await.unwrap().unwrap();
            assert_eq!(status.status, OrderStatusType::Completed);
            assert_eq!(status.time_left, None);
        }
    }

    #[tokio::test]
    async fn settling_an_unknown_order_is_harmless() {
        let api = new_api().await;
        let settled = api.settle_order(&PaymentId("1111111".to_string())).await.unwrap();
        assert!(settled.is_none());
    }
}
