use serde::{Deserialize, Serialize};
use vite_payment_engine::db_types::PaymentId;

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentParams {
    /// Decimal VITE amount, e.g. "1.5". Required.
    pub amount: Option<String>,
    #[serde(rename = "tokenId")]
    pub token_id: Option<String>,
    pub data: Option<String>,
    #[serde(rename = "callbackAddress")]
    pub callback_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentStatusParams {
    #[serde(rename = "paymentId")]
    pub payment_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePaymentResponse {
    #[serde(rename = "walletAddress")]
    pub wallet_address: String,
    #[serde(rename = "paymentId")]
    pub payment_id: PaymentId,
    #[serde(rename = "timeLeft")]
    pub time_left: i64,
}
