//! Fulfillment Core - Order types, partitioning and order numbering.
//!
//! This crate provides the pure half of the order fulfillment pipeline:
//! - [`types`] - Line items, orders, fulfillment enums, CRM ids and prices
//! - [`partition`] - Splits an order into shipping outcomes
//! - [`order_number`] - Derives one order number per shipping outcome
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no clocks. Everything here is deterministic given its input and
//! configuration, which keeps it testable in isolation from the CRM.
//!
//! ```rust
//! use fulfillment_core::{BaseSequence, allocate};
//!
//! let base = BaseSequence::parse("0001234").unwrap();
//! let numbers = allocate(&base, 3).unwrap();
//! let names: Vec<String> = numbers.iter().map(ToString::to_string).collect();
//! assert_eq!(names, ["0001234AZ", "0001234BZ", "0001234CZ"]);
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod error;
pub mod order_number;
pub mod partition;
pub mod types;

pub use error::ValidationError;
pub use order_number::{BaseSequence, OrderNumber, Suffix, allocate};
pub use partition::{AccountTable, FirearmRouting, PartitionConfig, Partitioner, ShippingOutcome};
pub use types::*;
