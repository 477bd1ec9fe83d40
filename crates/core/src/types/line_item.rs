//! Order line items and the orders that carry them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::fulfillment::{HoldType, OrderStatus};
use super::id::ContactRef;
use super::price::line_total;
use crate::error::ValidationError;
use crate::order_number::BaseSequence;

/// CRM text field limit for names, manufacturers and part numbers.
pub const MAX_FIELD_LENGTH: usize = 100;

/// One purchasable unit within an order.
///
/// The three fulfillment flags have no serde default: an item that arrives
/// without one of them cannot be routed and is rejected at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
    /// Catalog SKU (manufacturer part number). May repeat within an order.
    pub sku: String,
    /// Units ordered.
    pub quantity: u32,
    /// Price per unit.
    pub unit_price: Decimal,
    /// Legally requires transfer through an FFL dealer.
    pub ffl_required: bool,
    /// The distributor can ship this SKU directly to the end destination.
    pub drop_ship_eligible: bool,
    /// Must be fulfilled from the retailer's own stock.
    pub in_house_only: bool,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub category: String,
    pub product_name: String,
    /// Distributor stock number (RSR stock number).
    #[serde(default)]
    pub distributor_part_number: String,
    #[serde(default)]
    pub upc: Option<String>,
}

impl OrderLineItem {
    /// `unit_price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        line_total(self.unit_price, self.quantity)
    }

    /// Check the item is routable and fits the CRM field limits.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` naming the first problem found.
    pub fn validate(&self, index: usize) -> Result<(), ValidationError> {
        let sku = self.sku.trim();
        if sku.is_empty() {
            return Err(ValidationError::EmptySku { index });
        }
        if self.quantity == 0 {
            return Err(ValidationError::ZeroQuantity {
                sku: sku.to_string(),
            });
        }
        if self.unit_price.is_sign_negative() && !self.unit_price.is_zero() {
            return Err(ValidationError::NegativePrice {
                sku: sku.to_string(),
                price: self.unit_price.to_string(),
            });
        }

        let fields = [
            ("sku", sku),
            ("product_name", self.product_name.as_str()),
            ("manufacturer", self.manufacturer.as_str()),
        ];
        for (field, value) in fields {
            if value.chars().count() > MAX_FIELD_LENGTH {
                return Err(ValidationError::FieldTooLong {
                    sku: sku.to_string(),
                    field,
                    limit: MAX_FIELD_LENGTH,
                });
            }
        }

        Ok(())
    }
}

/// FFL dealer selected by the customer for firearm transfer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FflDealer {
    pub name: String,
    pub license: String,
}

/// A finalized order handed over by the order source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Base order sequence assigned upstream.
    pub base_sequence: BaseSequence,
    pub items: Vec<OrderLineItem>,
    /// CRM contact the deals are attached to.
    pub contact: ContactRef,
    #[serde(default)]
    pub ffl_dealer: Option<FflDealer>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub hold: Option<HoldType>,
}

impl Order {
    /// Whether any line item requires an FFL transfer.
    #[must_use]
    pub fn requires_ffl(&self) -> bool {
        self.items.iter().any(|item| item.ffl_required)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(sku: &str) -> OrderLineItem {
        OrderLineItem {
            sku: sku.to_string(),
            quantity: 2,
            unit_price: Decimal::new(1000, 2),
            ffl_required: false,
            drop_ship_eligible: true,
            in_house_only: false,
            manufacturer: "Magpul".to_string(),
            category: "Accessories".to_string(),
            product_name: "PMAG 30".to_string(),
            distributor_part_number: "MPIMAG571BLK".to_string(),
            upc: None,
        }
    }

    #[test]
    fn test_line_total() {
        assert_eq!(item("MAG571").line_total(), Decimal::new(2000, 2));
    }

    #[test]
    fn test_validate_accepts_well_formed_item() {
        assert!(item("MAG571").validate(0).is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_sku() {
        let err = item("   ").validate(3).unwrap_err();
        assert_eq!(err, ValidationError::EmptySku { index: 3 });
    }

    #[test]
    fn test_validate_rejects_zero_quantity() {
        let mut bad = item("MAG571");
        bad.quantity = 0;
        assert!(matches!(
            bad.validate(0),
            Err(ValidationError::ZeroQuantity { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_negative_price() {
        let mut bad = item("MAG571");
        bad.unit_price = Decimal::new(-1, 2);
        assert!(matches!(
            bad.validate(0),
            Err(ValidationError::NegativePrice { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_long_product_name() {
        let mut bad = item("MAG571");
        bad.product_name = "x".repeat(101);
        assert!(matches!(
            bad.validate(0),
            Err(ValidationError::FieldTooLong {
                field: "product_name",
                ..
            })
        ));
    }

    #[test]
    fn test_missing_flag_fails_deserialization() {
        let json = r#"{
            "sku": "MAG571",
            "quantity": 1,
            "unitPrice": "14.95",
            "fflRequired": false,
            "inHouseOnly": false,
            "productName": "PMAG 30"
        }"#;
        let parsed: Result<OrderLineItem, _> = serde_json::from_str(json);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_order_deserializes_with_defaults() {
        let json = r#"{
            "baseSequence": "0001234",
            "contact": "5843259000000100001",
            "items": [{
                "sku": "MAG571",
                "quantity": 1,
                "unitPrice": "14.95",
                "fflRequired": false,
                "dropShipEligible": true,
                "inHouseOnly": false,
                "productName": "PMAG 30"
            }]
        }"#;
        let order: Order = serde_json::from_str(json).unwrap();
        assert_eq!(order.base_sequence.as_str(), "0001234");
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.ffl_dealer.is_none());
        assert!(!order.requires_ffl());
    }
}
