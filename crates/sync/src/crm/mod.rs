//! CRM backend abstraction.
//!
//! The synchronizer talks to the CRM only through [`CrmClient`]. Two
//! implementations ship with the crate:
//!
//! - [`crate::zoho::ZohoClient`] - Zoho CRM over HTTPS
//! - [`InMemoryCrm`] - deterministic in-process CRM for dry runs and tests

mod memory;

pub use memory::{CallCounts, InMemoryCrm};

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fulfillment_core::{
    Consignee, ContactRef, CrmDealId, CrmProductId, DealStage, FflDealer, FulfillmentType,
    HoldType, OrderLineItem, OrderStatus,
};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::CrmError;

/// A product record as stored in the CRM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrmProduct {
    pub id: CrmProductId,
    pub sku: String,
    pub name: String,
}

/// Fields written when a product is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub manufacturer: String,
    pub category: String,
    pub distributor_part_number: String,
    pub upc: Option<String>,
    pub ffl_required: bool,
    pub drop_ship_eligible: bool,
    pub in_house_only: bool,
}

impl From<&OrderLineItem> for NewProduct {
    fn from(item: &OrderLineItem) -> Self {
        Self {
            sku: item.sku.trim().to_string(),
            name: item.product_name.clone(),
            manufacturer: item.manufacturer.clone(),
            category: item.category.clone(),
            distributor_part_number: item.distributor_part_number.clone(),
            upc: item.upc.clone(),
            ffl_required: item.ffl_required,
            drop_ship_eligible: item.drop_ship_eligible,
            in_house_only: item.in_house_only,
        }
    }
}

/// One subform row of a deal, after merging same-SKU lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DealLine {
    pub product_id: CrmProductId,
    pub sku: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub ffl_required: bool,
    pub manufacturer: String,
    pub category: String,
}

/// Fields written when a deal is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewDeal {
    pub deal_name: String,
    pub amount: Decimal,
    pub stage: DealStage,
    pub contact: ContactRef,
    pub fulfillment_type: FulfillmentType,
    pub consignee: Consignee,
    pub ordering_account: String,
    pub ffl_dealer: Option<FflDealer>,
    pub order_status: OrderStatus,
    pub hold: Option<HoldType>,
    pub submitted_at: DateTime<Utc>,
    pub lines: Vec<DealLine>,
}

impl NewDeal {
    /// Name of the FFL dealer, if any.
    #[must_use]
    pub fn ffl_dealer_name(&self) -> Option<&str> {
        self.ffl_dealer.as_ref().map(|dealer| dealer.name.as_str())
    }
}

/// Operations the synchronizer needs from a CRM.
pub trait CrmClient: Send + Sync {
    /// Look up a product by exact SKU match. `Ok(None)` when absent.
    fn find_product_by_sku(
        &self,
        sku: &str,
    ) -> impl Future<Output = Result<Option<CrmProduct>, CrmError>> + Send;

    /// Create a product record.
    ///
    /// Returns `CrmError::Duplicate` if the SKU already exists.
    fn create_product(
        &self,
        product: &NewProduct,
    ) -> impl Future<Output = Result<CrmProduct, CrmError>> + Send;

    /// Create a deal with its line-item subform.
    fn create_deal(
        &self,
        deal: &NewDeal,
    ) -> impl Future<Output = Result<CrmDealId, CrmError>> + Send;

    /// Verify credentials and reachability.
    fn check_connection(&self) -> impl Future<Output = Result<(), CrmError>> + Send;
}

impl<C: CrmClient> CrmClient for Arc<C> {
    fn find_product_by_sku(
        &self,
        sku: &str,
    ) -> impl Future<Output = Result<Option<CrmProduct>, CrmError>> + Send {
        (**self).find_product_by_sku(sku)
    }

    fn create_product(
        &self,
        product: &NewProduct,
    ) -> impl Future<Output = Result<CrmProduct, CrmError>> + Send {
        (**self).create_product(product)
    }

    fn create_deal(
        &self,
        deal: &NewDeal,
    ) -> impl Future<Output = Result<CrmDealId, CrmError>> + Send {
        (**self).create_deal(deal)
    }

    fn check_connection(&self) -> impl Future<Output = Result<(), CrmError>> + Send {
        (**self).check_connection()
    }
}
