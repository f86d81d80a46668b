use std::sync::Arc;

use async_trait::async_trait;
use blake2::{
    digest::{Update, VariableOutput},
    Blake2bVar,
};
use log::*;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};

use crate::{
    data_objects::{AccountBlock, BlockSummary, PowDifficulty, PowDifficultyParams, QuotaInfo, UnreceivedBlock},
    errors::LedgerRpcError,
    traits::LedgerClient,
    wallet::{address_core_bytes, decode_hash},
};

/// JSON-RPC 2.0 client against a Vite full node.
#[derive(Clone)]
pub struct HttpLedgerClient {
    node_url: String,
    client: Arc<Client>,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorBody>,
}

#[derive(Deserialize)]
struct JsonRpcErrorBody {
    #[serde(default)]
    code: i64,
    message: String,
}

impl HttpLedgerClient {
    pub fn new(node_url: &str) -> Result<Self, LedgerRpcError> {
        let client = Client::builder().build().map_err(|e| LedgerRpcError::Transport(e.to_string()))?;
        Ok(Self { node_url: node_url.to_string(), client: Arc::new(client) })
    }

    async fn rpc_request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, LedgerRpcError> {
        trace!("⛓️ RPC {method}");
        let body = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
        let response: JsonRpcResponse =
            self.client.post(&self.node_url).json(&body).send().await?.json().await?;
        if let Some(err) = response.error {
            return Err(LedgerRpcError::Rpc { code: err.code, message: err.message });
        }
        let result = response.result.unwrap_or(Value::Null);
        serde_json::from_value(result)
            .map_err(|e| LedgerRpcError::InvalidResponse(format!("{method} result did not parse: {e}")))
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn get_quota(&self, address: &str) -> Result<QuotaInfo, LedgerRpcError> {
        self.rpc_request("contract_getQuotaByAccount", json!([address])).await
    }

    async fn get_pow_difficulty(&self, params: &PowDifficultyParams) -> Result<PowDifficulty, LedgerRpcError> {
        self.rpc_request("ledger_getPoWDifficulty", json!([params])).await
    }

    async fn unreceived_transfers(
        &self,
        address: &str,
        index: u32,
        count: u32,
    ) -> Result<Vec<UnreceivedBlock>, LedgerRpcError> {
        // the node reports "no unreceived blocks" as a null result
        let blocks: Option<Vec<UnreceivedBlock>> =
            self.rpc_request("ledger_getUnreceivedBlocksByAddress", json!([address, index, count])).await?;
        Ok(blocks.unwrap_or_default())
    }

    async fn latest_block(&self, address: &str) -> Result<Option<BlockSummary>, LedgerRpcError> {
        self.rpc_request("ledger_getLatestAccountBlock", json!([address])).await
    }

    async fn solve_pow(&self, difficulty: &str, block: &AccountBlock) -> Result<String, LedgerRpcError> {
        let puzzle_hash = pow_puzzle_hash(block)?;
        self.rpc_request("util_getPoWNonce", json!([difficulty, puzzle_hash])).await
    }

    async fn send_block(&self, block: &AccountBlock) -> Result<(), LedgerRpcError> {
        let _: Option<Value> = self.rpc_request("ledger_sendRawTransaction", json!([block])).await?;
        debug!("⛓️ Broadcast block acknowledging {}", block.send_block_hash);
        Ok(())
    }
}

/// The PoW puzzle is keyed to the account and its chain tip: blake2b-32 over the address body and the
/// previous-hash, hex encoded.
fn pow_puzzle_hash(block: &AccountBlock) -> Result<String, LedgerRpcError> {
    let mut hasher =
        Blake2bVar::new(32).map_err(|e| LedgerRpcError::Signing(format!("Could not construct hasher: {e}")))?;
    hasher.update(&address_core_bytes(&block.address)?);
    hasher.update(&decode_hash(&block.previous_hash)?);
    let mut digest = vec![0u8; 32];
    hasher
        .finalize_variable(&mut digest)
        .map_err(|e| LedgerRpcError::Signing(format!("Could not finalize puzzle hash: {e}")))?;
    Ok(hex::encode(digest))
}
