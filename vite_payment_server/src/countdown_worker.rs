//! The offer countdown.
//!
//! A single task ticks every 100ms and walks the remaining time of every open payment offer down by the tick size.
//! An offer that reaches zero is dropped from the waiting list, which is what makes later transfers for that order
//! fall on deaf ears. The stored order itself is left alone: it stays `PENDING` forever, and the merchant sees the
//! lapse as a status with no `timeLeft`.
use std::time::Duration;

use log::*;
use tokio::task::JoinHandle;
use vite_payment_engine::registries::WaitingList;

pub const TICK: Duration = Duration::from_millis(100);

pub fn start_countdown_worker(waiting: WaitingList) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!("🕰️ Offer countdown started ({TICK:?} tick)");
        let mut timer = tokio::time::interval(TICK);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            timer.tick().await;
            for payment_id in waiting.tick(TICK.as_millis() as i64) {
                warn!("🕰️ The payment offer for order {payment_id} lapsed unpaid. The order stays PENDING.");
            }
        }
    })
}
