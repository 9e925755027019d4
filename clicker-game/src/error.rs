//! Error taxonomy for the economy engine.
//!
//! No variant is fatal: purchases decline without mutating state, malformed
//! saves fall back to defaults, and invalid numbers are clamped where they
//! enter the ledger (see [`crate::numbers::finite_or_zero`]).

use thiserror::Error;

/// Reasons a purchase request is declined.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PurchaseError {
    #[error("cannot afford {id}: costs {cost:.0}, balance is {balance:.0}")]
    InsufficientFunds { id: String, cost: f64, balance: f64 },
    #[error("unknown purchasable id `{0}`")]
    UnknownPurchasableId(String),
}

/// Failures while decoding a save document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SaveError {
    #[error("malformed save document: {0}")]
    MalformedSaveDocument(String),
}

impl From<serde_json::Error> for SaveError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedSaveDocument(err.to_string())
    }
}

/// Errors raised when tunables or data definitions violate invariants.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be at least {min:.2} (got {value:.2})")]
    MinViolation {
        field: &'static str,
        min: f64,
        value: f64,
    },
    #[error("{field} must be between {min:.2} and {max:.2} (got {value:.2})")]
    RangeViolation {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("{field} minimum {min:.2} exceeds maximum {max:.2}")]
    MinExceedsMax {
        field: &'static str,
        min: f64,
        max: f64,
    },
    #[error("cost growth for `{id}` must exceed 1.0 (got {growth:.3})")]
    CostGrowth { id: String, growth: f64 },
    #[error("duplicate definition id `{0}`")]
    DuplicateId(String),
    #[error("definition data could not be parsed: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purchase_errors_render_context() {
        let err = PurchaseError::InsufficientFunds {
            id: "cursor".to_string(),
            cost: 60.0,
            balance: 59.0,
        };
        assert_eq!(err.to_string(), "cannot afford cursor: costs 60, balance is 59");
        assert_eq!(
            PurchaseError::UnknownPurchasableId("nope".into()).to_string(),
            "unknown purchasable id `nope`"
        );
    }

    #[test]
    fn json_errors_map_to_malformed_documents() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(matches!(
            SaveError::from(parse),
            SaveError::MalformedSaveDocument(_)
        ));
    }
}
