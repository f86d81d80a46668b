//! Vite Payment Engine
//!
//! Core logic for the Vite payment gateway: the durable order store, the order state machine, and the in-memory
//! registries that the reconciliation loop and the countdown worker share.
//!
//! The library is divided into three main sections:
//! 1. Database management ([`mod@db`]). SQLite is the supported backend. Access goes through the
//!    [`traits::PaymentGatewayDatabase`] trait rather than raw queries, so that tests and alternative backends can
//!    slot in. The data types stored in the database live in [`db_types`] and are public.
//! 2. The order flow API ([`OrderFlowApi`]). This drives every order state transition: creation, the
//!    low-confirmation match that moves an order to `WAITING_CONFIRM`, and settlement. Order status is monotonic;
//!    the API refuses regressions.
//! 3. The shared registries ([`registries`]): the waiting list (the countdown on unpaid offers) and the whitelist of
//!    transfer hashes approved for acknowledgement. Both are explicit owning objects with interior locking, passed
//!    by handle to whoever needs them.
//!
//! Settlements are announced on a small pub/sub channel ([`events`]) so that the webhook notifier does not have to
//! be wired into the settlement path directly.
mod db;

pub mod db_types;
pub mod events;
pub mod registries;
mod vpe_api;

pub mod traits;

pub use db::sqlite::SqliteDatabase;
pub use vpe_api::order_flow_api::{DiscoveryOutcome, OrderFlowApi, OrderFlowError, PaymentStatus};
