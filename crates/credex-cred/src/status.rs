//! Four-state issuance status machine.
//!
//! States: OfferCreated, RequestReceived, Issued, Stored
//!
//! Valid transitions:
//!   OfferCreated -> RequestReceived
//!   RequestReceived -> Issued
//!   Issued -> Stored

use crate::error::{CredError, CredErrorDetail, CredResult};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuanceStatus {
    OfferCreated,
    RequestReceived,
    Issued,
    Stored,
}

impl fmt::Display for IssuanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssuanceStatus::OfferCreated => write!(f, "OfferCreated"),
            IssuanceStatus::RequestReceived => write!(f, "RequestReceived"),
            IssuanceStatus::Issued => write!(f, "Issued"),
            IssuanceStatus::Stored => write!(f, "Stored"),
        }
    }
}

/// Check whether a status transition is valid.
pub fn is_valid_transition(from: IssuanceStatus, to: IssuanceStatus) -> bool {
    matches!(
        (from, to),
        (IssuanceStatus::OfferCreated, IssuanceStatus::RequestReceived)
            | (IssuanceStatus::RequestReceived, IssuanceStatus::Issued)
            | (IssuanceStatus::Issued, IssuanceStatus::Stored)
    )
}

/// Attempt a status transition, returning the new status or an error.
pub fn transition(from: IssuanceStatus, to: IssuanceStatus) -> CredResult<IssuanceStatus> {
    if is_valid_transition(from, to) {
        Ok(to)
    } else {
        Err(CredErrorDetail::new(
            CredError::StatusTransitionDenied(format!("{} -> {}", from, to)),
            format!("transition from {} to {} is not allowed", from, to),
        ))
    }
}

/// Terminal for the party that holds the record.
pub fn is_terminal(status: IssuanceStatus) -> bool {
    matches!(status, IssuanceStatus::Stored)
}
