//! Integration tests for the fulfillment sync pipeline.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p fulfillment-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `scenarios` - Whole orders through `OrderSyncEngine`
//! - `resolution` - Product find-or-create against a shared CRM
//! - `deals` - Deal assembly, merging, holds and partial failure
//!
//! Every test runs against [`InMemoryCrm`] with zero-delay retries, so no
//! network access or credentials are needed.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use fulfillment_core::{
    BaseSequence, ContactRef, FflDealer, FirearmRouting, Order, OrderLineItem, OrderStatus,
};
use fulfillment_sync::{EngineConfig, InMemoryCrm, OrderSyncEngine, RetryPolicy};
use rust_decimal::Decimal;

/// Base sequence used by every fixture order.
pub const BASE: &str = "0001234";

/// Engine type used throughout the tests.
pub type TestEngine = OrderSyncEngine<Arc<InMemoryCrm>>;

/// Engine settings with immediate retries.
#[must_use]
pub fn test_config() -> EngineConfig {
    EngineConfig {
        retry: RetryPolicy::immediate(2),
        ..EngineConfig::default()
    }
}

/// A fresh in-memory CRM and an engine bound to it.
#[must_use]
pub fn engine_with(crm: InMemoryCrm, config: EngineConfig) -> (Arc<InMemoryCrm>, TestEngine) {
    let crm = Arc::new(crm);
    let engine = OrderSyncEngine::new(Arc::clone(&crm), config);
    (crm, engine)
}

/// A fresh in-memory CRM and an engine with [`test_config`].
#[must_use]
pub fn engine() -> (Arc<InMemoryCrm>, TestEngine) {
    engine_with(InMemoryCrm::new(), test_config())
}

/// Engine settings routing firearms through the retailer's warehouse.
#[must_use]
pub fn in_house_firearms_config() -> EngineConfig {
    let mut config = test_config();
    config.partition.firearm_routing = FirearmRouting::InHouse;
    config
}

/// Parse a price like `"25.00"`.
///
/// # Panics
///
/// Panics on a malformed literal.
#[must_use]
pub fn price(value: &str) -> Decimal {
    value
        .parse()
        .unwrap_or_else(|e| panic!("bad price literal {value}: {e}"))
}

/// An item that can be drop-shipped straight to the customer.
#[must_use]
pub fn accessory(sku: &str, quantity: u32, unit_price: &str) -> OrderLineItem {
    OrderLineItem {
        sku: sku.to_string(),
        quantity,
        unit_price: price(unit_price),
        ffl_required: false,
        drop_ship_eligible: true,
        in_house_only: false,
        manufacturer: "Magpul".to_string(),
        category: "Accessories".to_string(),
        product_name: format!("Accessory {sku}"),
        distributor_part_number: format!("RSR-{sku}"),
        upc: None,
    }
}

/// An item that must ship through an FFL dealer.
#[must_use]
pub fn firearm(sku: &str, unit_price: &str) -> OrderLineItem {
    OrderLineItem {
        sku: sku.to_string(),
        quantity: 1,
        unit_price: price(unit_price),
        ffl_required: true,
        drop_ship_eligible: true,
        in_house_only: false,
        manufacturer: "Glock".to_string(),
        category: "Handguns".to_string(),
        product_name: format!("Firearm {sku}"),
        distributor_part_number: format!("RSR-{sku}"),
        upc: None,
    }
}

/// An item fulfilled from the retailer's own stock only.
#[must_use]
pub fn in_house_only(sku: &str, quantity: u32, unit_price: &str) -> OrderLineItem {
    OrderLineItem {
        in_house_only: true,
        drop_ship_eligible: false,
        ..accessory(sku, quantity, unit_price)
    }
}

#[must_use]
pub fn dealer() -> FflDealer {
    FflDealer {
        name: "Lone Star Arms".to_string(),
        license: "5-74-000-00-0A-00000".to_string(),
    }
}

/// An order with [`BASE`] as base sequence and no FFL dealer.
///
/// # Panics
///
/// Never, [`BASE`] is a valid sequence.
#[must_use]
pub fn order(items: Vec<OrderLineItem>) -> Order {
    Order {
        base_sequence: BaseSequence::parse(BASE)
            .unwrap_or_else(|e| panic!("fixture base sequence: {e}")),
        items,
        contact: ContactRef::new("5843259000000100001"),
        ffl_dealer: None,
        status: OrderStatus::Pending,
        hold: None,
    }
}

/// An order carrying [`dealer`].
#[must_use]
pub fn order_with_dealer(items: Vec<OrderLineItem>) -> Order {
    Order {
        ffl_dealer: Some(dealer()),
        ..order(items)
    }
}
