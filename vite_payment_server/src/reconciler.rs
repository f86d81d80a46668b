//! The reconciliation loop.
//!
//! Polls the node for unacknowledged inbound transfers and classifies each against the order book. A transfer below
//! the confirmation threshold can match an order and park it in `WAITING_CONFIRM`; a whitelisted transfer at or
//! above the threshold is acknowledged on-chain and the order settled. Transfers are never stored, so every poll
//! re-derives the full picture from the node and the order book alone.
use std::time::Duration;

use log::*;
use vite_payment_engine::{
    db_types::PaymentId,
    registries::Whitelist,
    traits::PaymentGatewayDatabase,
    DiscoveryOutcome,
    OrderFlowApi,
};
use vite_rpc::{data_objects::UnreceivedBlock, BlockQueue, LedgerClient};

/// A transfer is treated as final once it is buried this deep in the ledger.
pub const CONFIRMATION_THRESHOLD: u64 = 20;
/// How many unreceived transfers are fetched per poll.
pub const POLL_BATCH_SIZE: u32 = 100;
/// Pause between polls, and the backoff after a failed poll.
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

pub struct Reconciler<B, L> {
    api: OrderFlowApi<B>,
    ledger: L,
    queue: BlockQueue,
    whitelist: Whitelist,
    wallet_address: String,
}

impl<B, L> Reconciler<B, L>
where
    B: PaymentGatewayDatabase,
    L: LedgerClient,
{
    pub fn new(api: OrderFlowApi<B>, ledger: L, queue: BlockQueue, whitelist: Whitelist, wallet_address: &str) -> Self {
        Self { api, ledger, queue, whitelist, wallet_address: wallet_address.to_string() }
    }

    pub fn whitelist(&self) -> &Whitelist {
        &self.whitelist
    }

    /// Runs forever. A failed poll logs, backs off one interval and tries again.
    pub async fn run(self) {
        info!("🔍️ Reconciliation loop started for {}", self.wallet_address);
        loop {
            self.poll_cycle().await;
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// One fetch-and-classify cycle. A failed fetch classifies nothing and reports `false`; the caller decides when
    /// to try again. Public so that tests can drive cycles without the timer.
    pub async fn poll_cycle(&self) -> bool {
        match self.ledger.unreceived_transfers(&self.wallet_address, 0, POLL_BATCH_SIZE).await {
            Ok(batch) => {
                self.process_batch(batch).await;
                true
            },
            Err(e) => {
                warn!("🔍️ Could not fetch unreceived transfers: {e}. Retrying in {POLL_INTERVAL:?}");
                false
            },
        }
    }

    /// One pass over a polled batch. Public so that tests can drive the loop body without the timer.
    pub async fn process_batch(&self, batch: Vec<UnreceivedBlock>) {
        trace!("🔍️ Processing a batch of {} unreceived transfers", batch.len());
        for transfer in batch {
            if transfer.confirmations() >= CONFIRMATION_THRESHOLD {
                self.handle_confirmed(&transfer).await;
            } else {
                self.handle_discovered(&transfer).await;
            }
        }
    }

    /// A transfer still too shallow to act on. If it matches an order, the transfer's hash is whitelisted so that
    /// only vetted transfers are ever acknowledged once they mature.
    async fn handle_discovered(&self, transfer: &UnreceivedBlock) {
        let Some(payment_id) = transfer.decoded_payment_id() else {
            trace!("🔍️ Transfer {} carries no readable payment id. Skipping it.", transfer.hash);
            return;
        };
        let payment_id = PaymentId(payment_id);
        let Some(amount) = transfer.amount() else {
            warn!("🔍️ Transfer {} for {payment_id} carries an unparseable amount. Skipping it.", transfer.hash);
            return;
        };
        match self.api.transfer_discovered(&payment_id, &transfer.token_id, amount).await {
            Ok(DiscoveryOutcome::Matched(order)) => {
                self.whitelist.add(&transfer.hash);
                info!(
                    "🔍️ Transfer {} matched order {} ({} confirmations, {} needed)",
                    transfer.hash,
                    order.payment_id,
                    transfer.confirmations(),
                    CONFIRMATION_THRESHOLD
                );
            },
            Ok(_) => {},
            Err(e) => error!("🔍️ Could not reconcile transfer {} against the order book: {e}", transfer.hash),
        }
    }

    /// A mature transfer. Only whitelisted hashes are acted on; everything else stays unreceived at the node and
    /// shows up again on the next poll.
    async fn handle_confirmed(&self, transfer: &UnreceivedBlock) {
        if !self.whitelist.contains(&transfer.hash) {
            trace!("🔍️ Confirmed transfer {} is not whitelisted. Leaving it unreceived.", transfer.hash);
            return;
        }
        let Some(payment_id) = transfer.decoded_payment_id() else {
            warn!("🔍️ Whitelisted transfer {} lost its payment id payload. Leaving it unreceived.", transfer.hash);
            return;
        };
        let payment_id = PaymentId(payment_id);
        let acknowledged = match self.queue.acknowledge(transfer.hash.clone()).await {
            Ok(()) => true,
            Err(e) => {
                // the transfer stays whitelisted and unreceived, so the broadcast is retried on a later poll.
                // The payment itself is final, so the order settles now regardless.
                warn!("🔍️ Could not acknowledge transfer {} for {payment_id}: {e}", transfer.hash);
                false
            },
        };
        match self.api.settle_order(&payment_id).await {
            Ok(Some(order)) => {
                if acknowledged {
                    self.whitelist.remove(&transfer.hash);
                }
                info!("🔍️ Transfer {} accepted and order {} settled", transfer.hash, order.payment_id);
            },
            Ok(None) => {
                // acknowledged on-chain but orphaned in the order book. Drop the whitelist entry so that the
                // loop stops revisiting a transfer that can never settle anything.
                self.whitelist.remove(&transfer.hash);
                warn!("🔍️ Transfer {} was acknowledged but no order is stored under {payment_id}", transfer.hash);
            },
            Err(e) => error!("🔍️ Transfer {} acknowledged, but settling {payment_id} failed: {e}", transfer.hash),
        }
    }
}
