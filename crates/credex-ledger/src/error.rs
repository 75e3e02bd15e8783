use credex_core::CredexError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// An immutable object id was re-published with a different payload.
    #[error("conflicting payload for {object_type} {id}")]
    Conflict { object_type: String, id: String },

    /// The transaction references an object the ledger has not seen yet.
    #[error("{object_type} {id} references unknown {missing}")]
    UnknownReference {
        object_type: String,
        id: String,
        missing: String,
    },

    #[error("malformed transaction: {0}")]
    Malformed(String),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<LedgerError> for CredexError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Conflict { .. } => CredexError::AlreadyExists(e.to_string()),
            LedgerError::UnknownReference { .. } => CredexError::NotFound(e.to_string()),
            LedgerError::Malformed(msg) => CredexError::InvalidInput(msg),
            LedgerError::Unavailable(msg) => CredexError::Unavailable(msg),
            LedgerError::Internal(msg) => CredexError::Ledger(msg),
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
