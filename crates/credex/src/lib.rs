//! Credex Root Library
//!
//! Party agents for the credential exchange: an issuer that publishes
//! definitions and issues or revokes credentials, a prover that stores
//! credentials and answers proof requests, and a verifier that checks
//! proofs against the shared ledger.
//!
//! # Architecture
//!
//! Every agent owns one [`credex_vault::Wallet`] and holds a handle to the
//! same [`credex_core::LedgerClient`]. Only protocol messages (offers,
//! requests, credentials, proof requests and proofs) pass between them;
//! everything else each party reads from the ledger on its own.

pub mod agent;
pub mod config;
pub mod error;
pub mod scenario;

pub use agent::{IssuerAgent, ProverAgent, VerifierAgent};
pub use config::{CredexConfig, LogConfig, RegistryConfig, SchemaConfig, StoreBackend, StoreConfig};
pub use error::{RootError, RootResult};
pub use scenario::{run_scenario, ScenarioReport};
