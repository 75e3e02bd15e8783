pub mod error;
pub mod in_memory_backend;
pub mod signer;
pub mod wallet;

#[cfg(feature = "sqlite")]
pub mod storage;

pub use error::*;
pub use in_memory_backend::InMemoryStore;
pub use signer::{PartyKey, PartyKeyRecord};
pub use wallet::Wallet;

#[cfg(feature = "sqlite")]
pub use storage::SqliteStore;
