use thiserror::Error;

/// Error type for the credex root crate, aggregating the errors of every
/// layer underneath it.
#[derive(Debug, Error)]
pub enum RootError {
    #[error("collaborator error: {0}")]
    Core(#[from] credex_core::CredexError),

    #[error("store error: {0}")]
    Vault(#[from] credex_vault::VaultError),

    #[error("credential error: {0}")]
    Credential(#[from] credex_cred::CredErrorDetail),

    #[error("proof error: {0}")]
    Proof(#[from] credex_proof::ProofError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl RootError {
    /// A collaborator was unavailable; the same call may succeed later.
    pub fn is_transient(&self) -> bool {
        match self {
            RootError::Core(e) => e.is_transient(),
            RootError::Vault(credex_vault::VaultError::Unavailable(_)) => true,
            RootError::Credential(e) => e.is_transient(),
            RootError::Proof(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for RootError {
    fn from(e: serde_json::Error) -> Self {
        RootError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for RootError {
    fn from(e: toml::de::Error) -> Self {
        RootError::Config(format!("TOML parse error: {}", e))
    }
}

pub type RootResult<T> = Result<T, RootError>;
