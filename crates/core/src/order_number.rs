//! Order number allocation for shipping outcomes.
//!
//! An order that ships as one outcome gets a single number ending in `0`.
//! An order split into several outcomes gets one number per outcome with a
//! two-character suffix `AZ`, `BZ`, `CZ`, ... in outcome order:
//!
//! | Outcomes | Numbers |
//! |----------|---------|
//! | 1 | `00012340` |
//! | 3 | `0001234AZ`, `0001234BZ`, `0001234CZ` |
//!
//! The suffix alphabet is a single letter, so at most 26 outcomes can be
//! numbered. Wrapping back to `A` would reuse `AZ` for a different shipment,
//! so allocation fails instead.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Width the base sequence is zero-padded to.
pub const BASE_SEQUENCE_WIDTH: usize = 7;

/// Largest number of outcomes the letter suffix can distinguish.
pub const MAX_OUTCOMES: usize = 26;

/// Zero-padded numeric order sequence assigned by the order source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BaseSequence(String);

impl BaseSequence {
    /// Parse a sequence that is already formatted.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidBaseSequence` unless `value` is a
    /// non-empty run of ASCII digits.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidBaseSequence(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    /// Format a raw sequence number, zero-padded to seven digits.
    #[must_use]
    pub fn from_number(sequence: u32) -> Self {
        Self(format!("{sequence:0BASE_SEQUENCE_WIDTH$}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BaseSequence {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<BaseSequence> for String {
    fn from(value: BaseSequence) -> Self {
        value.0
    }
}

impl std::fmt::Display for BaseSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome suffix appended to the base sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Suffix {
    /// The order ships as a single outcome.
    Single,
    /// Position of the outcome in a split order, `0` is `AZ`.
    Split(u8),
}

impl Suffix {
    fn letter(index: u8) -> char {
        char::from(b'A' + index)
    }
}

impl std::fmt::Display for Suffix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => f.write_str("0"),
            Self::Split(index) => write!(f, "{}Z", Self::letter(*index)),
        }
    }
}

impl Serialize for Suffix {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Externally visible identifier of one shipping outcome.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OrderNumber {
    pub base: BaseSequence,
    pub suffix: Suffix,
}

impl OrderNumber {
    /// The full identifier, `base` followed by `suffix`.
    #[must_use]
    pub fn full(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.base, self.suffix)
    }
}

/// Allocate one order number per shipping outcome, in outcome order.
///
/// Pure function of its arguments: calling it twice with the same input
/// yields the same numbers.
///
/// # Errors
///
/// Returns `ValidationError::ZeroOutcomes` for a count of zero and
/// `ValidationError::SuffixExhausted` above [`MAX_OUTCOMES`].
pub fn allocate(
    base: &BaseSequence,
    outcome_count: usize,
) -> Result<Vec<OrderNumber>, ValidationError> {
    match outcome_count {
        0 => Err(ValidationError::ZeroOutcomes),
        1 => Ok(vec![OrderNumber {
            base: base.clone(),
            suffix: Suffix::Single,
        }]),
        n if n > MAX_OUTCOMES => Err(ValidationError::SuffixExhausted {
            count: n,
            max: MAX_OUTCOMES,
        }),
        n => Ok((0..n)
            .filter_map(|i| u8::try_from(i).ok())
            .map(|i| OrderNumber {
                base: base.clone(),
                suffix: Suffix::Split(i),
            })
            .collect()),
    }
}
