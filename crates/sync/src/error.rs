//! Error types for CRM synchronization.

use std::sync::Arc;

use fulfillment_core::CrmProductId;
use thiserror::Error;

/// Errors returned by a CRM backend.
#[derive(Debug, Error)]
pub enum CrmError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Record-level rejection (the request succeeded, the record did not).
    #[error("CRM rejected record: {code} - {message}")]
    Rejected { code: String, message: String },

    /// A record with the same unique key already exists.
    #[error("Duplicate record (existing id: {})", .existing_id.as_ref().map_or("unknown", CrmProductId::as_str))]
    Duplicate { existing_id: Option<CrmProductId> },

    /// Rate limited by the CRM.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The CRM failed on its side (HTTP 5xx).
    #[error("Server error: {status}")]
    Server { status: u16 },

    /// Access token rejected and could not be refreshed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Simulated transient failure (in-memory CRM only).
    #[error("Unavailable: {0}")]
    Unavailable(String),
}

impl CrmError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited(_) | Self::Server { .. } | Self::Unavailable(_) => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Api { .. }
            | Self::Rejected { .. }
            | Self::Duplicate { .. }
            | Self::Unauthorized(_)
            | Self::Parse(_) => false,
        }
    }

    /// Server-requested wait before the next attempt, in seconds.
    #[must_use]
    pub const fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimited(secs) => Some(*secs),
            _ => None,
        }
    }
}

/// A SKU could not be resolved to a CRM product after retries.
#[derive(Debug, Clone, Error)]
#[error("failed to resolve product {sku}: {source}")]
pub struct ProductResolutionError {
    pub sku: String,
    #[source]
    pub source: Arc<CrmError>,
}

/// A deal could not be created for one shipping outcome.
#[derive(Debug, Error)]
pub enum DealCreationError {
    /// The CRM call failed after retries.
    #[error("deal {deal_name} was not created: {source}")]
    Crm {
        deal_name: String,
        #[source]
        source: CrmError,
    },

    /// Some SKUs of the outcome have no resolved product.
    #[error("deal {deal_name} skipped, unresolved products: {}", .skus.join(", "))]
    UnresolvedProducts { deal_name: String, skus: Vec<String> },
}

/// Another writer created the same product first.
///
/// Not returned to callers: the resolver logs it and adopts the existing
/// record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("product {sku} was created concurrently, adopting existing record {existing_id}")]
pub struct ConcurrencyConflict {
    pub sku: String,
    pub existing_id: CrmProductId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(CrmError::RateLimited(5).is_transient());
        assert!(CrmError::Server { status: 503 }.is_transient());
        assert!(!CrmError::Unauthorized("bad token".to_string()).is_transient());
        assert!(
            !CrmError::Api {
                status: 400,
                message: "INVALID_DATA".to_string()
            }
            .is_transient()
        );
        assert!(!CrmError::Duplicate { existing_id: None }.is_transient());
    }

    #[test]
    fn test_retry_after() {
        assert_eq!(CrmError::RateLimited(7).retry_after(), Some(7));
        assert_eq!(CrmError::Server { status: 500 }.retry_after(), None);
    }

    #[test]
    fn test_unresolved_products_display() {
        let err = DealCreationError::UnresolvedProducts {
            deal_name: "0001234BZ".to_string(),
            skus: vec!["MAG571".to_string(), "SLING".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "deal 0001234BZ skipped, unresolved products: MAG571, SLING"
        );
    }

    #[test]
    fn test_duplicate_display() {
        let err = CrmError::Duplicate {
            existing_id: Some(CrmProductId::new("42")),
        };
        assert_eq!(err.to_string(), "Duplicate record (existing id: 42)");
    }
}
