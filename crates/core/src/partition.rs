//! Fulfillment partitioning.
//!
//! Splits the line items of one order into shipping outcomes. Every item is
//! routed to exactly one fulfillment type; items sharing a route are grouped
//! into one outcome. Groups and the items inside them keep the order in which
//! they were first seen, so the same input always yields the same outcomes in
//! the same positions (order numbers depend on that).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::{Consignee, FflDealer, FulfillmentType, OrderLineItem, sum_amounts};

/// Where firearms are shipped by the distributor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirearmRouting {
    /// Firearms go to the retailer's warehouse and are transferred from there.
    InHouse,
    /// Firearms go straight to the customer's FFL dealer.
    #[default]
    #[serde(rename = "drop_ship_ffl")]
    DropShipToFfl,
}

impl std::str::FromStr for FirearmRouting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in_house" | "in-house" => Ok(Self::InHouse),
            "drop_ship_ffl" | "drop-ship-ffl" => Ok(Self::DropShipToFfl),
            other => Err(format!(
                "unknown firearm routing {other:?} (expected in_house or drop_ship_ffl)"
            )),
        }
    }
}

/// Distributor ordering account per fulfillment type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountTable {
    pub in_house: String,
    pub drop_ship_customer: String,
    pub drop_ship_ffl: String,
}

impl AccountTable {
    /// Sandbox distributor accounts.
    #[must_use]
    pub fn test_accounts() -> Self {
        Self::with_codes("99901", "99902")
    }

    /// Live distributor accounts.
    #[must_use]
    pub fn production_accounts() -> Self {
        Self::with_codes("60742", "63824")
    }

    /// One account for in-house orders, one shared by both drop-ship routes.
    #[must_use]
    pub fn with_codes(in_house: &str, drop_ship: &str) -> Self {
        Self {
            in_house: in_house.to_string(),
            drop_ship_customer: drop_ship.to_string(),
            drop_ship_ffl: drop_ship.to_string(),
        }
    }

    #[must_use]
    pub fn account_for(&self, fulfillment_type: FulfillmentType) -> &str {
        match fulfillment_type {
            FulfillmentType::InHouse => &self.in_house,
            FulfillmentType::DropShipCustomer => &self.drop_ship_customer,
            FulfillmentType::DropShipFfl => &self.drop_ship_ffl,
        }
    }
}

impl Default for AccountTable {
    fn default() -> Self {
        Self::test_accounts()
    }
}

/// Static routing configuration for the partitioner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionConfig {
    pub firearm_routing: FirearmRouting,
    pub accounts: AccountTable,
}

/// One group of line items sharing a fulfillment path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShippingOutcome {
    pub fulfillment_type: FulfillmentType,
    pub consignee: Consignee,
    pub ordering_account: String,
    pub items: Vec<OrderLineItem>,
    /// Set for FFL drop-ships, and for in-house outcomes carrying firearms
    /// when the order has a dealer.
    pub ffl_dealer: Option<FflDealer>,
}

impl ShippingOutcome {
    /// Sum of the line totals of this outcome.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        sum_amounts(self.items.iter().map(OrderLineItem::line_total))
    }

    #[must_use]
    pub fn requires_ffl(&self) -> bool {
        self.items.iter().any(|item| item.ffl_required)
    }

    /// Distinct SKUs in first-seen order.
    #[must_use]
    pub fn skus(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for item in &self.items {
            let sku = item.sku.trim();
            if !seen.contains(&sku) {
                seen.push(sku);
            }
        }
        seen
    }
}

/// Groups order line items into shipping outcomes.
#[derive(Debug, Clone, Default)]
pub struct Partitioner {
    config: PartitionConfig,
}

impl Partitioner {
    #[must_use]
    pub const fn new(config: PartitionConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &PartitionConfig {
        &self.config
    }

    /// Route a single item.
    ///
    /// `in_house_only` wins over everything else: such an item is never
    /// drop-shipped, firearm or not.
    #[must_use]
    pub const fn classify(&self, item: &OrderLineItem) -> FulfillmentType {
        if item.in_house_only {
            return FulfillmentType::InHouse;
        }
        if item.ffl_required {
            return match self.config.firearm_routing {
                FirearmRouting::InHouse => FulfillmentType::InHouse,
                FirearmRouting::DropShipToFfl => FulfillmentType::DropShipFfl,
            };
        }
        if item.drop_ship_eligible {
            FulfillmentType::DropShipCustomer
        } else {
            FulfillmentType::InHouse
        }
    }

    /// Partition `items` into shipping outcomes.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if `items` is empty, if any item fails
    /// validation, or if a non-empty input produced no outcomes.
    pub fn partition(
        &self,
        items: &[OrderLineItem],
        ffl_dealer: Option<&FflDealer>,
    ) -> Result<Vec<ShippingOutcome>, ValidationError> {
        if items.is_empty() {
            return Err(ValidationError::EmptyOrder);
        }
        for (index, item) in items.iter().enumerate() {
            item.validate(index)?;
        }

        // (fulfillment type, consignee, dealer name) -> group position
        let mut keys: Vec<(FulfillmentType, Consignee, Option<&str>)> = Vec::new();
        let mut groups: Vec<Vec<OrderLineItem>> = Vec::new();

        for item in items {
            let fulfillment_type = self.classify(item);
            let dealer_name = match fulfillment_type {
                FulfillmentType::DropShipFfl => ffl_dealer.map(|d| d.name.as_str()),
                FulfillmentType::InHouse | FulfillmentType::DropShipCustomer => None,
            };
            let key = (fulfillment_type, fulfillment_type.consignee(), dealer_name);

            if let Some(position) = keys.iter().position(|k| *k == key) {
                if let Some(group) = groups.get_mut(position) {
                    group.push(item.clone());
                }
            } else {
                keys.push(key);
                groups.push(vec![item.clone()]);
            }
        }

        let outcomes: Vec<ShippingOutcome> = keys
            .into_iter()
            .zip(groups)
            .map(|((fulfillment_type, consignee, _), items)| {
                self.build_outcome(fulfillment_type, consignee, items, ffl_dealer)
            })
            .collect();

        if outcomes.is_empty() {
            return Err(ValidationError::NoOutcomes { items: items.len() });
        }
        Ok(outcomes)
    }

    fn build_outcome(
        &self,
        fulfillment_type: FulfillmentType,
        consignee: Consignee,
        items: Vec<OrderLineItem>,
        ffl_dealer: Option<&FflDealer>,
    ) -> ShippingOutcome {
        let carries_firearms = items.iter().any(|item| item.ffl_required);
        let ffl_dealer = match fulfillment_type {
            FulfillmentType::DropShipFfl => ffl_dealer.cloned(),
            FulfillmentType::InHouse if carries_firearms => ffl_dealer.cloned(),
            FulfillmentType::InHouse | FulfillmentType::DropShipCustomer => None,
        };

        ShippingOutcome {
            fulfillment_type,
            consignee,
            ordering_account: self.config.accounts.account_for(fulfillment_type).to_string(),
            items,
            ffl_dealer,
        }
    }
}
