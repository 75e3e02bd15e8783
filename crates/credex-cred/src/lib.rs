//! Credex credential layer
//!
//! Issuer and prover sides of credential exchange over a shared ledger:
//! schema and credential definition management, offer/request/credential
//! issuance with replay protection, issuer-side revocation registry handles,
//! and the revocation state engine that rebuilds point-in-time
//! non-revocation witnesses from published deltas.
//!
//! All signature, accumulator and proof arithmetic sits behind the
//! [`ProofEngine`] trait. [`SimulatedProofEngine`] implements it with Ed25519
//! signatures and a hash-based accumulator; it is not zero-knowledge.

pub mod definition;
pub mod engine;
pub mod error;
pub mod filter;
pub mod holder;
pub mod issuance;
pub mod ledger;
pub mod registry;
pub mod revocation;
pub mod schema;
pub mod simulated;
pub mod status;
pub mod types;

pub use definition::DefinitionManager;
pub use engine::{PredicateSpec, ProofEngine, ProvingItem, SubProofRequest, VerifyingItem};
pub use error::{CredError, CredErrorDetail, CredResult};
pub use filter::{matches, matches_any};
pub use holder::Holder;
pub use issuance::IssuanceCoordinator;
pub use registry::IssuerRegistryState;
pub use revocation::{build_witness, compose, merge_deltas, update_witness};
pub use schema::{validate_schema, validate_schema_strict, DEFAULT_MAX_ATTRIBUTES};
pub use simulated::SimulatedProofEngine;
pub use status::{is_valid_transition, IssuanceStatus};
pub use types::*;
