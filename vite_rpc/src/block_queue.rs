//! The outbound transaction queue.
//!
//! Every block on an account chain references the hash of the block before it, so two acknowledgements built
//! concurrently would race for the same previous-hash and one would be orphaned. The queue therefore runs a single
//! worker task over an mpsc channel: strict FIFO, one block in flight, and PoW solving (when quota is short) stalls
//! the whole queue on purpose.
use log::*;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::{
    data_objects::AccountBlock,
    errors::LedgerRpcError,
    traits::LedgerClient,
    wallet::Wallet,
};

struct OutboundTask {
    send_block_hash: String,
    reply: oneshot::Sender<Result<(), LedgerRpcError>>,
}

/// Cloneable handle for submitting acknowledgement requests to the queue worker.
#[derive(Clone)]
pub struct BlockQueue {
    tasks: mpsc::Sender<OutboundTask>,
}

impl BlockQueue {
    /// Queues an acknowledgement for the transfer `send_block_hash` and waits for its outcome. A failure outcome
    /// reports the broadcast error for this task only; the queue itself keeps running.
    pub async fn acknowledge(&self, send_block_hash: String) -> Result<(), LedgerRpcError> {
        let (reply, outcome) = oneshot::channel();
        let task = OutboundTask { send_block_hash, reply };
        self.tasks.send(task).await.map_err(|_| LedgerRpcError::QueueClosed)?;
        outcome.await.map_err(|_| LedgerRpcError::QueueClosed)?
    }
}

/// Starts the queue worker. The worker runs until every handle is dropped; do not await the JoinHandle before then.
pub fn start_block_queue<L: LedgerClient>(ledger: L, wallet: Wallet, buffer: usize) -> (BlockQueue, JoinHandle<()>) {
    let (tasks, mut backlog) = mpsc::channel::<OutboundTask>(buffer);
    let handle = tokio::spawn(async move {
        debug!("⛓️ Outbound transaction queue started");
        while let Some(task) = backlog.recv().await {
            let hash = task.send_block_hash.clone();
            let result = process_block(&ledger, &wallet, &task.send_block_hash).await;
            if let Err(e) = &result {
                warn!("⛓️ Acknowledgement of {hash} failed: {e}");
            }
            if task.reply.send(result).is_err() {
                warn!("⛓️ Originator of the acknowledgement for {hash} went away before the outcome arrived");
            }
        }
        debug!("⛓️ Outbound transaction queue shut down");
    });
    (BlockQueue { tasks }, handle)
}

async fn process_block<L: LedgerClient>(
    ledger: &L,
    wallet: &Wallet,
    send_block_hash: &str,
) -> Result<(), LedgerRpcError> {
    // quota and difficulty are fetched concurrently; the difficulty quote needs the chain tip first
    let quota_fut = ledger.get_quota(wallet.address());
    let difficulty_fut = async {
        let tip = ledger.latest_block(wallet.address()).await?;
        let block = match tip {
            Some(tip) => {
                let height = tip.height() + 1;
                AccountBlock::receive(wallet.address(), send_block_hash).with_previous(tip.hash, height)
            },
            None => AccountBlock::receive(wallet.address(), send_block_hash),
        };
        let difficulty = ledger.get_pow_difficulty(&block.difficulty_params()).await?;
        Ok::<_, LedgerRpcError>((block, difficulty))
    };
    let (quota, (mut block, difficulty)) = tokio::try_join!(quota_fut, difficulty_fut)?;

    if quota.current() < difficulty.required() {
        if let Some(puzzle) = difficulty.puzzle() {
            debug!(
                "⛓️ Quota {} short of {}; solving PoW for the acknowledgement of {send_block_hash}",
                quota.current(),
                difficulty.required()
            );
            let nonce = ledger.solve_pow(puzzle, &block).await?;
            block.difficulty = Some(puzzle.to_string());
            block.nonce = Some(nonce);
        }
    }

    wallet.seal(&mut block)?;
    ledger.send_block(&block).await
}

#[cfg(test)]
mod test {
    use std::{
        collections::HashSet,
        sync::{Arc, Mutex},
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{
        data_objects::{BlockSummary, PowDifficulty, PowDifficultyParams, QuotaInfo, UnreceivedBlock},
        wallet::test::test_wallet,
    };

    #[derive(Default)]
    struct LedgerState {
        sent: Vec<String>,
        pow_solved: Vec<String>,
        failing_hashes: HashSet<String>,
        current_quota: u128,
        required_quota: u128,
    }

    #[derive(Clone, Default)]
    struct ScriptedLedger {
        state: Arc<Mutex<LedgerState>>,
    }

    impl ScriptedLedger {
        fn with_quota(current: u128, required: u128) -> Self {
            let ledger = Self::default();
            {
                let mut state = ledger.state.lock().unwrap();
                state.current_quota = current;
                state.required_quota = required;
            }
            ledger
        }

        fn fail_on(&self, hash: &str) {
            self.state.lock().unwrap().failing_hashes.insert(hash.to_string());
        }

        fn sent(&self) -> Vec<String> {
            self.state.lock().unwrap().sent.clone()
        }

        fn pow_solved(&self) -> Vec<String> {
            self.state.lock().unwrap().pow_solved.clone()
        }
    }

    #[async_trait]
    impl LedgerClient for ScriptedLedger {
        async fn get_quota(&self, _address: &str) -> Result<QuotaInfo, LedgerRpcError> {
            let state = self.state.lock().unwrap();
            Ok(QuotaInfo { current_quota: state.current_quota.to_string(), max_quota: None })
        }

        async fn get_pow_difficulty(&self, _params: &PowDifficultyParams) -> Result<PowDifficulty, LedgerRpcError> {
            let state = self.state.lock().unwrap();
            Ok(PowDifficulty {
                required_quota: state.required_quota.to_string(),
                difficulty: Some("67108863".to_string()),
            })
        }

        async fn unreceived_transfers(
            &self,
            _address: &str,
            _index: u32,
            _count: u32,
        ) -> Result<Vec<UnreceivedBlock>, LedgerRpcError> {
            Ok(Vec::new())
        }

        async fn latest_block(&self, _address: &str) -> Result<Option<BlockSummary>, LedgerRpcError> {
            Ok(Some(BlockSummary { hash: "ee".repeat(32), height: "41".to_string() }))
        }

        async fn solve_pow(&self, _difficulty: &str, block: &AccountBlock) -> Result<String, LedgerRpcError> {
            self.state.lock().unwrap().pow_solved.push(block.send_block_hash.clone());
            Ok("AAAAAAAAAAE=".to_string())
        }

        async fn send_block(&self, block: &AccountBlock) -> Result<(), LedgerRpcError> {
            let mut state = self.state.lock().unwrap();
            if state.failing_hashes.contains(&block.send_block_hash) {
                return Err(LedgerRpcError::Rpc { code: -36001, message: "insufficient balance".to_string() });
            }
            assert!(block.signature.is_some(), "blocks must be sealed before broadcast");
            state.sent.push(block.send_block_hash.clone());
            Ok(())
        }
    }

    fn hash(n: u8) -> String {
        format!("{n:02x}").repeat(32)
    }

    #[tokio::test]
    async fn tasks_complete_in_fifo_order() {
        let _ = env_logger::try_init().ok();
        let ledger = ScriptedLedger::with_quota(100_000, 21_000);
        let (queue, _worker) = start_block_queue(ledger.clone(), test_wallet(), 16);
        for n in 1..=5 {
            queue.acknowledge(hash(n)).await.unwrap();
        }
        assert_eq!(ledger.sent(), (1..=5).map(hash).collect::<Vec<_>>());
        // quota covered everything, so no puzzle was ever solved
        assert!(ledger.pow_solved().is_empty());
    }

    #[tokio::test]
    async fn pow_is_solved_when_quota_is_short() {
        let _ = env_logger::try_init().ok();
        let ledger = ScriptedLedger::with_quota(0, 21_000);
        let (queue, _worker) = start_block_queue(ledger.clone(), test_wallet(), 16);
        queue.acknowledge(hash(7)).await.unwrap();
        assert_eq!(ledger.pow_solved(), vec![hash(7)]);
        assert_eq!(ledger.sent(), vec![hash(7)]);
    }

    #[tokio::test]
    async fn a_failed_task_does_not_halt_the_queue() {
        let _ = env_logger::try_init().ok();
        let ledger = ScriptedLedger::with_quota(100_000, 21_000);
        ledger.fail_on(&hash(2));
        let (queue, _worker) = start_block_queue(ledger.clone(), test_wallet(), 16);
        queue.acknowledge(hash(1)).await.unwrap();
        let err = queue.acknowledge(hash(2)).await.unwrap_err();
        assert!(matches!(err, LedgerRpcError::Rpc { .. }));
        // the queue keeps going, and the failed task is not retried
        queue.acknowledge(hash(3)).await.unwrap();
        assert_eq!(ledger.sent(), vec![hash(1), hash(3)]);
    }

    #[tokio::test]
    async fn dropping_the_last_handle_stops_the_worker() {
        let _ = env_logger::try_init().ok();
        let ledger = ScriptedLedger::with_quota(100_000, 21_000);
        let (queue, worker) = start_block_queue(ledger, test_wallet(), 4);
        drop(queue);
        worker.await.expect("worker should shut down cleanly");
    }
}
