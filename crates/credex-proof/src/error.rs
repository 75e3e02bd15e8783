use credex_cred::CredErrorDetail;
use thiserror::Error;

/// Error type for the credex-proof crate.
///
/// Verification never returns these for a bad proof; it answers `false`.
/// They are for malformed requests and for provers that cannot satisfy one.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProofError {
    #[error("invalid proof request: {0}")]
    InvalidRequest(String),

    #[error("credential not found: {0}")]
    CredentialNotFound(String),

    #[error("missing ledger object: {0}")]
    MissingObject(String),

    #[error("credential does not satisfy request: {0}")]
    CredentialRequestMismatch(String),

    #[error("missing non-revocation state: {0}")]
    MissingNonRevocationState(String),

    #[error("predicate not satisfied: {0}")]
    PredicateNotSatisfied(String),

    #[error("attribute encoding mismatch: {0}")]
    EncodingMismatch(String),

    #[error("serialization failed")]
    Serialization,

    #[error(transparent)]
    Credential(#[from] CredErrorDetail),
}

impl From<serde_json::Error> for ProofError {
    fn from(_err: serde_json::Error) -> Self {
        ProofError::Serialization
    }
}

impl ProofError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProofError::Credential(detail) if detail.is_transient())
    }
}

pub type ProofResult<T> = Result<T, ProofError>;
