//! ProofRequest construction and validation.
//!
//! Requests arrive from verifiers as JSON; [`parse_proof_request`] decodes
//! and validates one. [`ProofRequestBuilder`] is the verifier-side way to
//! build one.

use std::collections::BTreeMap;

use credex_core::{Nonce, Timestamp};

use crate::error::{ProofError, ProofResult};
use crate::types::{AttributeInfo, NonRevokedInterval, PredicateInfo, ProofRequest};

/// Builder for constructing a ProofRequest with validation.
pub struct ProofRequestBuilder {
    nonce: Option<Nonce>,
    name: String,
    version: String,
    requested_attributes: BTreeMap<String, AttributeInfo>,
    requested_predicates: BTreeMap<String, PredicateInfo>,
    non_revoked: Option<NonRevokedInterval>,
}

impl ProofRequestBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            nonce: None,
            name: name.into(),
            version: "1.0".to_string(),
            requested_attributes: BTreeMap::new(),
            requested_predicates: BTreeMap::new(),
            non_revoked: None,
        }
    }

    /// Defaults to a fresh random nonce.
    pub fn nonce(mut self, nonce: Nonce) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn attribute(mut self, referent: impl Into<String>, info: AttributeInfo) -> Self {
        self.requested_attributes.insert(referent.into(), info);
        self
    }

    pub fn predicate(mut self, referent: impl Into<String>, info: PredicateInfo) -> Self {
        self.requested_predicates.insert(referent.into(), info);
        self
    }

    pub fn non_revoked(mut self, interval: NonRevokedInterval) -> Self {
        self.non_revoked = Some(interval);
        self
    }

    pub fn non_revoked_to(self, to: Timestamp) -> Self {
        self.non_revoked(NonRevokedInterval::to(to))
    }

    /// Build the ProofRequest, performing validation.
    pub fn build(self) -> ProofResult<ProofRequest> {
        let request = ProofRequest {
            nonce: self.nonce.unwrap_or_else(Nonce::generate),
            name: self.name,
            version: self.version,
            requested_attributes: self.requested_attributes,
            requested_predicates: self.requested_predicates,
            non_revoked: self.non_revoked,
        };
        validate_proof_request(&request)?;
        Ok(request)
    }
}

fn validate_interval(interval: &NonRevokedInterval, at: &str) -> ProofResult<()> {
    match (interval.from, interval.to) {
        (None, None) => Err(ProofError::InvalidRequest(format!(
            "{}: non_revoked interval has no bound",
            at
        ))),
        (Some(from), Some(to)) if from > to => Err(ProofError::InvalidRequest(format!(
            "{}: non_revoked from {} is after to {}",
            at, from, to
        ))),
        _ => Ok(()),
    }
}

/// Structural checks a request must pass before anyone answers or checks it.
pub fn validate_proof_request(request: &ProofRequest) -> ProofResult<()> {
    if !request.nonce.is_well_formed() {
        return Err(ProofError::InvalidRequest(
            "nonce must be a decimal string".into(),
        ));
    }
    if request.requested_attributes.is_empty() && request.requested_predicates.is_empty() {
        return Err(ProofError::InvalidRequest(
            "at least one attribute or predicate must be requested".into(),
        ));
    }
    if let Some(interval) = &request.non_revoked {
        validate_interval(interval, "request")?;
    }

    for (referent, info) in &request.requested_attributes {
        if referent.trim().is_empty() || info.name.trim().is_empty() {
            return Err(ProofError::InvalidRequest(format!(
                "attribute referent {:?} needs a name",
                referent
            )));
        }
        if let Some(interval) = &info.non_revoked {
            validate_interval(interval, referent)?;
        }
    }
    for (referent, info) in &request.requested_predicates {
        if referent.trim().is_empty() || info.name.trim().is_empty() {
            return Err(ProofError::InvalidRequest(format!(
                "predicate referent {:?} needs a name",
                referent
            )));
        }
        if request.requested_attributes.contains_key(referent) {
            return Err(ProofError::InvalidRequest(format!(
                "referent {} is both an attribute and a predicate",
                referent
            )));
        }
        if let Some(interval) = &info.non_revoked {
            validate_interval(interval, referent)?;
        }
    }
    Ok(())
}

/// Decode a request received on the wire and validate it.
pub fn parse_proof_request(json: &str) -> ProofResult<ProofRequest> {
    let request: ProofRequest = serde_json::from_str(json)
        .map_err(|e| ProofError::InvalidRequest(format!("malformed proof request: {}", e)))?;
    validate_proof_request(&request)?;
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use credex_cred::PredicateType;

    fn base() -> ProofRequestBuilder {
        ProofRequestBuilder::new("proof").nonce(Nonce("123432421212".into()))
    }

    #[test]
    fn test_builder_success() {
        let req = base()
            .attribute("attr1_referent", AttributeInfo::new("name"))
            .predicate(
                "predicate1_referent",
                PredicateInfo::new("age", PredicateType::GE, 18),
            )
            .non_revoked_to(Timestamp(100))
            .build()
            .unwrap();
        assert_eq!(req.version, "1.0");
        assert_eq!(req.requested_attributes.len(), 1);
        assert_eq!(req.requested_predicates.len(), 1);
        assert_eq!(req.non_revoked.unwrap().to, Some(Timestamp(100)));
    }

    #[test]
    fn test_builder_generates_nonce() {
        let req = ProofRequestBuilder::new("proof")
            .attribute("a", AttributeInfo::new("name"))
            .build()
            .unwrap();
        assert!(req.nonce.is_well_formed());
    }

    #[test]
    fn test_builder_no_referents() {
        let result = base().build();
        assert!(matches!(result.unwrap_err(), ProofError::InvalidRequest(_)));
    }

    #[test]
    fn test_malformed_nonce() {
        let result = ProofRequestBuilder::new("proof")
            .nonce(Nonce("not-a-number".into()))
            .attribute("a", AttributeInfo::new("name"))
            .build();
        assert!(matches!(result.unwrap_err(), ProofError::InvalidRequest(_)));
    }

    #[test]
    fn test_blank_attribute_name() {
        let result = base().attribute("a", AttributeInfo::new("  ")).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_inverted_interval() {
        let result = base()
            .attribute("a", AttributeInfo::new("name"))
            .non_revoked(NonRevokedInterval::new(Some(Timestamp(10)), Some(Timestamp(5))))
            .build();
        assert!(result.is_err());

        let result = base()
            .attribute(
                "a",
                AttributeInfo::new("name").non_revoked(NonRevokedInterval::default()),
            )
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_referent_collision() {
        let result = base()
            .attribute("r", AttributeInfo::new("name"))
            .predicate("r", PredicateInfo::new("age", PredicateType::GT, 1))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_wire_request() {
        let json = r#"{
            "nonce": "1234",
            "name": "proof_req_1",
            "version": "0.1",
            "requested_attributes": {"attr1_referent": {"name": "name"}},
            "requested_predicates": {},
            "non_revoked": {"from": 10, "to": 20}
        }"#;
        let req = parse_proof_request(json).unwrap();
        assert_eq!(req.name, "proof_req_1");
        assert_eq!(req.attribute_interval("attr1_referent").unwrap().from, Some(Timestamp(10)));

        assert!(parse_proof_request("{").is_err());
        assert!(parse_proof_request(r#"{"nonce": "1", "name": "x", "version": "1"}"#).is_err());
    }
}
