//! Fulfillment and order status enums.

use serde::{Deserialize, Serialize};

/// How a shipping outcome leaves the distributor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FulfillmentType {
    /// Shipped to the retailer's own warehouse first.
    #[serde(rename = "In-House")]
    InHouse,
    /// Shipped by the distributor straight to the customer's FFL dealer.
    #[serde(rename = "Drop-Ship-FFL")]
    DropShipFfl,
    /// Shipped by the distributor straight to the customer.
    #[serde(rename = "Drop-Ship-Customer")]
    DropShipCustomer,
}

impl FulfillmentType {
    /// The consignee implied by this fulfillment type.
    #[must_use]
    pub const fn consignee(self) -> Consignee {
        match self {
            Self::InHouse => Consignee::RetailerWarehouse,
            Self::DropShipFfl => Consignee::FflDealer,
            Self::DropShipCustomer => Consignee::Customer,
        }
    }

    /// Whether the distributor ships directly to the end destination.
    #[must_use]
    pub const fn is_drop_ship(self) -> bool {
        matches!(self, Self::DropShipFfl | Self::DropShipCustomer)
    }

    /// Label used in logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InHouse => "In-House",
            Self::DropShipFfl => "Drop-Ship-FFL",
            Self::DropShipCustomer => "Drop-Ship-Customer",
        }
    }
}

impl std::fmt::Display for FulfillmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named recipient of a shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Consignee {
    Customer,
    #[serde(rename = "FFL-Dealer")]
    FflDealer,
    #[serde(rename = "Retailer-Warehouse")]
    RetailerWarehouse,
}

impl Consignee {
    /// Label used in logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "Customer",
            Self::FflDealer => "FFL-Dealer",
            Self::RetailerWarehouse => "Retailer-Warehouse",
        }
    }
}

impl std::fmt::Display for Consignee {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storefront order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    PaymentPending,
    PaymentConfirmed,
    Preparing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// CRM deal stage for this status.
    #[must_use]
    pub const fn deal_stage(self) -> DealStage {
        match self {
            Self::Pending => DealStage::Qualification,
            Self::Processing => DealStage::NeedsAnalysis,
            Self::PaymentPending => DealStage::ProposalQuote,
            Self::PaymentConfirmed => DealStage::NegotiationReview,
            Self::Preparing | Self::Shipped | Self::Delivered => DealStage::ClosedWon,
            Self::Cancelled | Self::Refunded => DealStage::ClosedLost,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::PaymentPending => "payment_pending",
            Self::PaymentConfirmed => "payment_confirmed",
            Self::Preparing => "preparing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        };
        f.write_str(s)
    }
}

/// CRM deal pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DealStage {
    Qualification,
    #[serde(rename = "Needs Analysis")]
    NeedsAnalysis,
    #[serde(rename = "Proposal/Quote")]
    ProposalQuote,
    #[serde(rename = "Negotiation/Review")]
    NegotiationReview,
    #[serde(rename = "Closed Won")]
    ClosedWon,
    #[serde(rename = "Closed Lost")]
    ClosedLost,
}

impl DealStage {
    /// Picklist value in the CRM.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Qualification => "Qualification",
            Self::NeedsAnalysis => "Needs Analysis",
            Self::ProposalQuote => "Proposal/Quote",
            Self::NegotiationReview => "Negotiation/Review",
            Self::ClosedWon => "Closed Won",
            Self::ClosedLost => "Closed Lost",
        }
    }
}

/// Reason an outcome is held before submission to the distributor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HoldType {
    /// The customer has not selected an FFL dealer we have on file.
    #[serde(rename = "FFL not on file")]
    FflNotOnFile,
    /// The customer exceeded the firearm purchase limit.
    #[serde(rename = "Gun Count Rule")]
    GunCountRule,
}

impl HoldType {
    /// Picklist value in the CRM.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FflNotOnFile => "FFL not on file",
            Self::GunCountRule => "Gun Count Rule",
        }
    }
}
