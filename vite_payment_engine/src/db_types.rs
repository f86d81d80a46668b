use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vpg_common::AttoVite;

//--------------------------------------      PaymentId       --------------------------------------------------------
/// The opaque key a merchant uses to refer to an order. Generated by the gateway as a random 7-digit numeric string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(pub String);

impl FromStr for PaymentId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for PaymentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl PaymentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   OrderStatusType     -------------------------------------------------------
/// Order lifecycle. Transitions only ever move rightwards: `Pending` → `WaitingConfirm` → `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order has been created and no matching transfer has been seen yet.
    #[serde(rename = "PENDING")]
    Pending,
    /// A matching transfer was observed but is not yet buried deep enough in the ledger.
    #[serde(rename = "WAITING_CONFIRM")]
    WaitingConfirm,
    /// The transfer is final and the order has been settled.
    #[serde(rename = "COMPLETED")]
    Completed,
}

impl OrderStatusType {
    /// Position in the lifecycle. Used to refuse backwards transitions.
    pub fn rank(&self) -> u8 {
        match self {
            OrderStatusType::Pending => 0,
            OrderStatusType::WaitingConfirm => 1,
            OrderStatusType::Completed => 2,
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "PENDING"),
            OrderStatusType::WaitingConfirm => write!(f, "WAITING_CONFIRM"),
            OrderStatusType::Completed => write!(f, "COMPLETED"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct ConversionError(String);

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "WAITING_CONFIRM" => Ok(Self::WaitingConfirm),
            "COMPLETED" => Ok(Self::Completed),
            s => Err(ConversionError(s.to_string())),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

//--------------------------------------        Order       ----------------------------------------------------------
/// A stored purchase order. Never deleted; only its `status` field ever changes, and only forwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub payment_id: PaymentId,
    pub created_at: DateTime<Utc>,
    /// The asking price in the ledger's smallest unit. Always positive.
    pub amount: AttoVite,
    pub token_id: String,
    /// Opaque string supplied by the merchant at creation time. Echoed back in the settlement webhook.
    pub data: String,
    pub callback_address: String,
    pub status: OrderStatusType,
}

//--------------------------------------       NewOrder       --------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub amount: AttoVite,
    pub token_id: String,
    pub data: String,
    pub callback_address: String,
}

impl NewOrder {
    pub fn new<S: Into<String>>(amount: AttoVite, token_id: S) -> Self {
        Self { amount, token_id: token_id.into(), data: "NOT_SET".to_string(), callback_address: String::new() }
    }

    pub fn with_data<S: Into<String>>(mut self, data: S) -> Self {
        self.data = data.into();
        self
    }

    pub fn with_callback_address<S: Into<String>>(mut self, callback_address: S) -> Self {
        self.callback_address = callback_address.into();
        self
    }
}

//--------------------------------------     WaitingEntry      -------------------------------------------------------
/// One row of the waiting-list snapshot that is persisted on shutdown and restored at startup, best effort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitingEntry {
    pub payment_id: PaymentId,
    pub remaining_millis: i64,
}
