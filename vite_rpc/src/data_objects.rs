//! Wire types for the node RPC. The node serializes most numbers as strings; the accessors below do the parsing
//! and treat garbage as absent rather than faulting the polling loop.
use log::warn;
use serde::{Deserialize, Serialize};
use vpg_common::AttoVite;

/// Block type code for a receive block in the account chain.
pub const BLOCK_TYPE_RECEIVE: u8 = 4;
/// The previous-hash value for the first block on an account chain.
pub const FIRST_BLOCK_PREVIOUS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

//--------------------------------------      QuotaInfo        -------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaInfo {
    pub current_quota: String,
    #[serde(default)]
    pub max_quota: Option<String>,
}

impl QuotaInfo {
    pub fn current(&self) -> u128 {
        parse_numeric("currentQuota", &self.current_quota)
    }
}

//--------------------------------------    PowDifficulty      -------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowDifficulty {
    pub required_quota: String,
    /// Empty or absent when the account's quota already covers the transaction.
    #[serde(default)]
    pub difficulty: Option<String>,
}

impl PowDifficulty {
    pub fn required(&self) -> u128 {
        parse_numeric("requiredQuota", &self.required_quota)
    }

    pub fn puzzle(&self) -> Option<&str> {
        self.difficulty.as_deref().filter(|d| !d.is_empty())
    }
}

/// The exact transaction shape the difficulty quote is computed for.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PowDifficultyParams {
    pub address: String,
    pub previous_hash: String,
    pub block_type: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

//--------------------------------------   UnreceivedBlock     -------------------------------------------------------
/// An inbound transfer the gateway has not yet acknowledged. Ephemeral: classified on every poll, never stored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreceivedBlock {
    pub hash: String,
    /// The sender's account address.
    pub address: String,
    pub confirmations: String,
    pub amount: String,
    pub token_id: String,
    /// Base64-encoded payload. For gateway payments this carries the payment id.
    #[serde(default)]
    pub data: Option<String>,
}

impl UnreceivedBlock {
    pub fn confirmations(&self) -> u64 {
        parse_numeric("confirmations", &self.confirmations) as u64
    }

    pub fn amount(&self) -> Option<AttoVite> {
        self.amount.parse().ok()
    }

    /// Recovers the payment id embedded in the transfer payload. This is the only correlation between a transfer
    /// and an order; a transfer without a decodable payload cannot be matched.
    pub fn decoded_payment_id(&self) -> Option<String> {
        let data = self.data.as_deref()?;
        let bytes = base64::decode(data).ok()?;
        let id = String::from_utf8(bytes).ok()?;
        let id = id.trim().to_string();
        (!id.is_empty()).then_some(id)
    }
}

//--------------------------------------     BlockSummary      -------------------------------------------------------
/// The tip of an account chain, used to resolve the previous-hash reference for the next block.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSummary {
    pub hash: String,
    pub height: String,
}

impl BlockSummary {
    pub fn height(&self) -> u64 {
        parse_numeric("height", &self.height) as u64
    }
}

//--------------------------------------     AccountBlock      -------------------------------------------------------
/// An outgoing block on the gateway's account chain. Built by the queue, sealed by the wallet, then broadcast.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBlock {
    pub block_type: u8,
    pub address: String,
    pub previous_hash: String,
    pub height: String,
    pub send_block_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl AccountBlock {
    /// A receive block acknowledging the transfer `send_block_hash`. The previous-hash and height are filled in
    /// once the account tip has been resolved.
    pub fn receive<S: Into<String>>(address: S, send_block_hash: S) -> Self {
        Self {
            block_type: BLOCK_TYPE_RECEIVE,
            address: address.into(),
            previous_hash: FIRST_BLOCK_PREVIOUS_HASH.to_string(),
            height: "1".to_string(),
            send_block_hash: send_block_hash.into(),
            difficulty: None,
            nonce: None,
            hash: None,
            public_key: None,
            signature: None,
        }
    }

    pub fn with_previous(mut self, previous_hash: String, height: u64) -> Self {
        self.previous_hash = previous_hash;
        self.height = height.to_string();
        self
    }

    pub fn difficulty_params(&self) -> PowDifficultyParams {
        PowDifficultyParams {
            address: self.address.clone(),
            previous_hash: self.previous_hash.clone(),
            block_type: self.block_type,
            to_address: None,
            data: None,
        }
    }
}

fn parse_numeric(field: &str, value: &str) -> u128 {
    value.trim().parse().unwrap_or_else(|_| {
        warn!("Ledger node sent a non-numeric {field}: '{value}'. Treating it as 0.");
        0
    })
}
