use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum LedgerRpcError {
    #[error("Could not reach the ledger node: {0}")]
    Transport(String),
    #[error("Ledger node returned an error ({code}): {message}")]
    Rpc { code: i64, message: String },
    #[error("Unexpected response from the ledger node: {0}")]
    InvalidResponse(String),
    #[error("Could not sign the account block: {0}")]
    Signing(String),
    #[error("The outbound transaction queue has shut down")]
    QueueClosed,
}

impl From<reqwest::Error> for LedgerRpcError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}
