//! Validation errors for order input.

use thiserror::Error;

/// Input that cannot be partitioned or numbered.
///
/// Fatal for the order being processed: the caller has to fix the input and
/// run the whole operation again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The order has no line items.
    #[error("order has no line items")]
    EmptyOrder,

    /// A line item has an empty SKU.
    #[error("line item {index} has an empty SKU")]
    EmptySku { index: usize },

    /// A line item has a zero quantity.
    #[error("line item {sku} has zero quantity")]
    ZeroQuantity { sku: String },

    /// A line item has a negative unit price.
    #[error("line item {sku} has negative unit price {price}")]
    NegativePrice { sku: String, price: String },

    /// A text field exceeds the CRM field limit.
    #[error("line item {sku}: {field} exceeds {limit} characters")]
    FieldTooLong {
        sku: String,
        field: &'static str,
        limit: usize,
    },

    /// A line item could not be read (missing fulfillment flag, bad type).
    #[error("line item is malformed: {0}")]
    MalformedItem(String),

    /// The base sequence is not a non-empty run of ASCII digits.
    #[error("invalid base sequence {0:?}: expected ASCII digits")]
    InvalidBaseSequence(String),

    /// Partitioning a non-empty order produced no outcomes.
    #[error("partitioning {items} line items produced no shipping outcomes")]
    NoOutcomes { items: usize },

    /// An order number was requested for zero outcomes.
    #[error("cannot allocate order numbers for zero shipping outcomes")]
    ZeroOutcomes,

    /// The single-letter suffix alphabet is exhausted.
    #[error("{count} shipping outcomes exceed the {max} letter suffixes available")]
    SuffixExhausted { count: usize, max: usize },

    /// Outcomes and order numbers are not positionally aligned.
    #[error("{outcomes} shipping outcomes but {numbers} order numbers")]
    Misaligned { outcomes: usize, numbers: usize },
}
