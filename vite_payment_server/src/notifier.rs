//! Settlement webhooks.
//!
//! Subscribes to order-settled events and POSTs a JSON notice to the order's callback address. Delivery is fire and
//! forget: a dead endpoint is logged and the event dropped, never retried. Merchants that need certainty poll
//! `getPaymentStatus` instead.
use log::*;
use reqwest::Client;
use serde::Serialize;
use vite_payment_engine::{
    db_types::{Order, OrderStatusType},
    events::{Handler, OrderSettledEvent},
};
use vpg_common::AttoVite;

/// The webhook body. Field names match what storefront plugins already parse.
#[derive(Debug, Clone, Serialize)]
pub struct SettlementNotice {
    /// Order creation time, in epoch milliseconds.
    pub timestamp: i64,
    pub amount: AttoVite,
    #[serde(rename = "tokenId")]
    pub token_id: String,
    pub data: String,
    pub status: OrderStatusType,
}

impl From<&Order> for SettlementNotice {
    fn from(order: &Order) -> Self {
        Self {
            timestamp: order.created_at.timestamp_millis(),
            amount: order.amount,
            token_id: order.token_id.clone(),
            data: order.data.clone(),
            status: order.status,
        }
    }
}

/// Builds the event handler the settlement channel dispatches to.
pub fn webhook_handler(client: Client) -> Handler<OrderSettledEvent> {
    std::sync::Arc::new(move |event: OrderSettledEvent| {
        let client = client.clone();
        Box::pin(async move {
            deliver(&client, &event.order).await;
        })
    })
}

async fn deliver(client: &Client, order: &Order) {
    let url = order.callback_address.trim();
    if url.is_empty() {
        warn!("📬️ Order {} settled but has no callback address. Dropping the notice.", order.payment_id);
        return;
    }
    let notice = SettlementNotice::from(order);
    match client.post(url).json(&notice).send().await {
        Ok(response) if response.status().is_success() => {
            info!("📬️ Settlement notice for order {} delivered to {url}", order.payment_id);
        },
        Ok(response) => {
            warn!(
                "📬️ The callback endpoint {url} answered {} to the notice for order {}",
                response.status(),
                order.payment_id
            );
        },
        Err(e) => warn!("📬️ Could not deliver the settlement notice for order {}: {e}", order.payment_id),
    }
}

#[cfg(test)]
mod test {
    use chrono::{TimeZone, Utc};
    use vite_payment_engine::db_types::PaymentId;

    use super::*;

    #[test]
    fn notices_serialize_in_storefront_shape() {
        let order = Order {
            payment_id: PaymentId("4812345".to_string()),
            created_at: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
            amount: AttoVite::from(1_500_000_000_000_000_000u128),
            token_id: vpg_common::VITE_TOKEN_ID.to_string(),
            data: "invoice-77".to_string(),
            callback_address: "http://shop.local/hook".to_string(),
            status: OrderStatusType::Completed,
        };
        let notice = SettlementNotice::from(&order);
        let json = serde_json::to_value(&notice).unwrap();
        assert_eq!(json["timestamp"], 1_700_000_000_000i64);
        assert_eq!(json["amount"], "1500000000000000000");
        assert_eq!(json["tokenId"], vpg_common::VITE_TOKEN_ID);
        assert_eq!(json["data"], "invoice-77");
        assert_eq!(json["status"], "COMPLETED");
    }
}
