//! Vite ledger plumbing for the payment gateway.
//!
//! Three pieces live here:
//! 1. [`LedgerClient`] — the node operations the gateway consumes (quota, PoW difficulty, unreceived transfers,
//!    PoW solving, broadcast), with [`HttpLedgerClient`] as the JSON-RPC implementation.
//! 2. [`Wallet`] — the gateway's single receiving account and its block-sealing (hash + ed25519 signature) logic.
//! 3. [`BlockQueue`] — the outbound transaction queue. The ledger chains each account's blocks from the previous
//!    block hash, so only one acknowledgement may ever be in flight; the queue serializes them strictly FIFO.
mod block_queue;
mod client;
pub mod data_objects;
mod errors;
mod traits;
mod wallet;

pub use block_queue::{start_block_queue, BlockQueue};
pub use client::HttpLedgerClient;
pub use errors::LedgerRpcError;
pub use traits::LedgerClient;
pub use wallet::Wallet;
