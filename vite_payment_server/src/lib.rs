pub mod config;
pub mod countdown_worker;
pub mod data_objects;
pub mod errors;
pub mod notifier;
pub mod reconciler;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
