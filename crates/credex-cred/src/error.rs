use credex_core::CredexError;
use std::fmt;
use thiserror::Error;

/// Oracle-safe error type for definitions, issuance and revocation.
/// Display never includes key material, master secrets or blinding data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredError {
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("credential values do not match schema: {0}")]
    CredentialValuesMismatch(String),

    #[error("revocation registry is full")]
    RegistryFull,

    #[error("index {0} already revoked")]
    AlreadyRevoked(u32),

    #[error("index {0} was never issued")]
    IndexNotIssued(u32),

    #[error("invalid delta composition: {0}")]
    InvalidDeltaComposition(String),

    #[error("incomplete delta chain: {0}")]
    IncompleteDeltaChain(String),

    #[error("timestamp out of range: {0}")]
    InvalidTimestamp(String),

    #[error("revocation not supported: {0}")]
    RevocationNotSupported(String),

    #[error("invalid credential request: {0}")]
    InvalidRequest(String),

    #[error("offer already used")]
    OfferReplayed,

    #[error("status transition denied: {0}")]
    StatusTransitionDenied(String),

    #[error("signing failed")]
    SigningFailed,

    #[error("signature verification failed")]
    InvalidSignature,

    #[error("proof engine failure")]
    EngineFailure,

    #[error("vault error")]
    VaultError,

    #[error("ledger error")]
    LedgerError,

    #[error("collaborator unavailable")]
    Unavailable,

    #[error("internal error")]
    InternalError,
}

/// Structured error with a CredError variant and a safe (non-secret-leaking) message.
#[derive(Debug, Clone)]
pub struct CredErrorDetail {
    pub kind: CredError,
    pub message: String,
    pub credential_id: Option<String>,
}

impl fmt::Display for CredErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(ref id) = self.credential_id {
            write!(f, " (credential: {})", id)?;
        }
        Ok(())
    }
}

impl std::error::Error for CredErrorDetail {}

impl CredErrorDetail {
    pub fn new(kind: CredError, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            credential_id: None,
        }
    }

    pub fn with_credential_id(mut self, id: impl Into<String>) -> Self {
        self.credential_id = Some(id.into());
        self
    }

    /// Collaborator outages are the only errors worth retrying.
    pub fn is_transient(&self) -> bool {
        self.kind == CredError::Unavailable
    }
}

impl From<CredError> for CredErrorDetail {
    fn from(kind: CredError) -> Self {
        let message = kind.to_string();
        Self {
            kind,
            message,
            credential_id: None,
        }
    }
}

impl From<CredexError> for CredErrorDetail {
    fn from(err: CredexError) -> Self {
        // Named conditions keep their identity; everything else is collapsed
        // so collaborator internals never reach the caller.
        match err {
            CredexError::Unavailable(_) => CredError::Unavailable.into(),
            CredexError::AlreadyExists(msg) => {
                CredErrorDetail::new(CredError::AlreadyExists(msg.clone()), msg)
            }
            CredexError::NotFound(msg) => CredErrorDetail::new(CredError::NotFound(msg.clone()), msg),
            CredexError::Ledger(_) | CredexError::InvalidInput(_) => CredErrorDetail::new(
                CredError::LedgerError,
                "ledger operation failed",
            ),
            CredexError::Serialization(_) => {
                CredErrorDetail::new(CredError::InternalError, "serialization failed")
            }
            _ => CredErrorDetail::new(CredError::VaultError, "vault operation failed"),
        }
    }
}

impl From<credex_vault::VaultError> for CredErrorDetail {
    fn from(err: credex_vault::VaultError) -> Self {
        CredexError::from(err).into()
    }
}

impl From<serde_json::Error> for CredErrorDetail {
    fn from(_err: serde_json::Error) -> Self {
        CredErrorDetail::new(CredError::InternalError, "serialization failed")
    }
}

impl From<CredErrorDetail> for CredexError {
    fn from(err: CredErrorDetail) -> Self {
        match err.kind {
            CredError::Unavailable => CredexError::Unavailable(err.message),
            CredError::AlreadyExists(msg) => CredexError::AlreadyExists(msg),
            CredError::NotFound(msg) => CredexError::NotFound(msg),
            kind => CredexError::Credential(kind.to_string()),
        }
    }
}

pub type CredResult<T> = Result<T, CredErrorDetail>;
