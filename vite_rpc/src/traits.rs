use async_trait::async_trait;

use crate::{
    data_objects::{AccountBlock, BlockSummary, PowDifficulty, PowDifficultyParams, QuotaInfo, UnreceivedBlock},
    errors::LedgerRpcError,
};

/// The ledger operations the gateway consumes. [`crate::HttpLedgerClient`] talks JSON-RPC to a real node; tests
/// substitute scripted implementations.
#[async_trait]
pub trait LedgerClient: Clone + Send + Sync + 'static {
    /// Current quota standing for the account.
    async fn get_quota(&self, address: &str) -> Result<QuotaInfo, LedgerRpcError>;

    /// The PoW difficulty quote for one exact transaction shape. Requires the previous-hash to be resolved already.
    async fn get_pow_difficulty(&self, params: &PowDifficultyParams) -> Result<PowDifficulty, LedgerRpcError>;

    /// Up to `count` inbound transfers to `address` that have not been acknowledged yet, in ledger order.
    async fn unreceived_transfers(
        &self,
        address: &str,
        index: u32,
        count: u32,
    ) -> Result<Vec<UnreceivedBlock>, LedgerRpcError>;

    /// The tip of the account chain, or `None` for a virgin account.
    async fn latest_block(&self, address: &str) -> Result<Option<BlockSummary>, LedgerRpcError>;

    /// Solves the PoW puzzle for the block. CPU-bound on the node side; the caller stalls until it returns.
    async fn solve_pow(&self, difficulty: &str, block: &AccountBlock) -> Result<String, LedgerRpcError>;

    /// Broadcasts a sealed block.
    async fn send_block(&self, block: &AccountBlock) -> Result<(), LedgerRpcError>;
}
