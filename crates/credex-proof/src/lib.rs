//! Credex presentation layer
//!
//! Proof requests, the prover's side of answering them and the verifier's
//! side of checking the answer.
//!
//! ```text
//! ProofRequest -> find_credentials -> RequestedCredentials -> create_proof -> Proof -> verify
//! ```
//!
//! - `request`: builder, wire parsing and structural validation
//! - `plan`: per-referent credential search over a prover's wallet
//! - `bundle`: selection checks, revocation state lookup, sub-proof grouping
//! - `verify`: fail-closed verification against independently resolved objects

pub mod bundle;
pub mod error;
pub mod plan;
pub mod request;
pub mod types;
pub mod verify;

pub use bundle::create_proof;
pub use error::{ProofError, ProofResult};
pub use plan::find_credentials;
pub use request::{parse_proof_request, validate_proof_request, ProofRequestBuilder};
pub use types::{
    AttributeInfo, CredentialMatch, CredentialsForRequest, Identifier, NonRevokedInterval,
    PredicateInfo, Proof, ProofRequest, ProverObjects, RequestedAttribute, RequestedCredentials,
    RequestedPredicate, RequestedProof, RevealedAttributeInfo, SubProofReferent, VerifierObjects,
};
pub use verify::verify;
