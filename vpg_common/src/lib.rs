mod amount;

pub mod op;

mod helpers;
mod secret;

pub use amount::{AmountConversionError, AttoVite, VITE_DECIMALS, VITE_TOKEN_ID};
pub use helpers::parse_boolean_flag;
pub use secret::Secret;
