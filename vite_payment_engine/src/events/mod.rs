//! Settlement event plumbing.
//!
//! The reconciliation flow announces settled orders here instead of calling the webhook notifier directly. The
//! channel keeps ordering (events are delivered in publish order) without the hidden listener registration the
//! gateway is replacing.
mod channel;

use crate::db_types::Order;

pub use channel::{EventHandler, EventProducer, Handler};

/// Emitted exactly once per settlement, carrying the order snapshot as it was written to the store.
#[derive(Debug, Clone)]
pub struct OrderSettledEvent {
    pub order: Order,
}

/// The set of producers handed to the order flow API. Kept as a struct so new event types can be added without
/// touching the API signature.
#[derive(Clone, Default)]
pub struct EventProducers {
    pub order_settled: Vec<EventProducer<OrderSettledEvent>>,
}

impl EventProducers {
    pub fn with_settled_producer(mut self, producer: EventProducer<OrderSettledEvent>) -> Self {
        self.order_settled.push(producer);
        self
    }
}
