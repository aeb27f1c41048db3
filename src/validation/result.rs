//! Validation outcome types

use std::fmt;

/// Why a response was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    TooShort { length: usize, min: usize },
    TooLong { length: usize, max: usize },
    MissingRequiredPattern(String),
    ForbiddenPattern(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::TooShort { .. } => write!(f, "too short"),
            RejectReason::TooLong { .. } => write!(f, "too long"),
            RejectReason::MissingRequiredPattern(p) => write!(f, "missing required pattern: {}", p),
            RejectReason::ForbiddenPattern(p) => write!(f, "contains forbidden pattern: {}", p),
        }
    }
}

/// Result of validating one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(RejectReason),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accept)
    }

    /// The rejection reason, if rejected
    pub fn reason(&self) -> Option<&RejectReason> {
        match self {
            Verdict::Accept => None,
            Verdict::Reject(reason) => Some(reason),
        }
    }
}
