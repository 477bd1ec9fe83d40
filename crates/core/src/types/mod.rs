//! Core types for order fulfillment.
//!
//! This module provides type-safe wrappers for the domain concepts shared by
//! the partitioner, the allocator and the CRM synchronizer.

pub mod fulfillment;
pub mod id;
pub mod line_item;
pub mod price;

pub use fulfillment::{Consignee, DealStage, FulfillmentType, HoldType, OrderStatus};
pub use id::*;
pub use line_item::{FflDealer, MAX_FIELD_LENGTH, Order, OrderLineItem};
pub use price::{CURRENCY_SCALE, line_total, sum_amounts};
