use credex_core::CredexError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("record already exists: {0}")]
    AlreadyExists(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CredexError> for VaultError {
    fn from(e: CredexError) -> Self {
        match e {
            CredexError::Unavailable(msg) => VaultError::Unavailable(msg),
            CredexError::Serialization(msg) => VaultError::Serialization(msg),
            other => VaultError::Storage(other.to_string()),
        }
    }
}

impl From<VaultError> for CredexError {
    fn from(e: VaultError) -> Self {
        match e {
            VaultError::Unavailable(msg) => CredexError::Unavailable(msg),
            VaultError::NotFound(msg) => CredexError::NotFound(msg),
            VaultError::AlreadyExists(msg) => CredexError::AlreadyExists(msg),
            other => CredexError::Vault(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::Serialization(e.to_string())
    }
}

pub type VaultResult<T> = Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_survives_round_trip() {
        let err: VaultError = CredexError::Unavailable("disk".into()).into();
        let back: CredexError = err.into();
        assert!(back.is_transient());
    }

    #[test]
    fn test_not_found_maps_to_core() {
        let err: CredexError = VaultError::NotFound("credential::abc".into()).into();
        assert!(matches!(err, CredexError::NotFound(_)));
    }
}
