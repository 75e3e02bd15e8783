use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredexError {
    #[error("vault error: {0}")]
    Vault(String),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("proof engine error: {0}")]
    Engine(String),

    #[error("credential error: {0}")]
    Credential(String),

    #[error("proof error: {0}")]
    Proof(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// A collaborator (ledger, store, proof engine) could not be reached.
    /// The only error class a caller may retry.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CredexError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CredexError::Unavailable(_))
    }
}

impl From<serde_json::Error> for CredexError {
    fn from(e: serde_json::Error) -> Self {
        CredexError::Serialization(e.to_string())
    }
}

pub type CredexResult<T> = Result<T, CredexError>;
