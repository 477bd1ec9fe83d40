//! In-process CRM used by `fsync simulate` and the test suites.
//!
//! Behaves like the Zoho backend where it matters to the synchronizer:
//! SKU lookups are exact, creating an existing SKU is rejected as a
//! duplicate, and every record gets a fresh numeric id. Failures and a slow
//! network can be injected per SKU or per deal name.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use fulfillment_core::{CrmDealId, CrmProductId};
use tracing::debug;

use super::{CrmClient, CrmProduct, NewDeal, NewProduct};
use crate::error::CrmError;

const PRODUCT_ID_BASE: u64 = 5_843_259_000_001_000_000;
const DEAL_ID_BASE: u64 = 5_843_259_000_002_000_000;

#[derive(Debug, Clone, Copy)]
enum Failure {
    Transient { remaining: u32 },
    Permanent,
}

/// Number of CRM calls made, per SKU where applicable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub lookups: BTreeMap<String, usize>,
    pub creates: BTreeMap<String, usize>,
    pub deals: usize,
}

impl CallCounts {
    #[must_use]
    pub fn lookups_for(&self, sku: &str) -> usize {
        self.lookups.get(sku).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn creates_for(&self, sku: &str) -> usize {
        self.creates.get(sku).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total_lookups(&self) -> usize {
        self.lookups.values().sum()
    }

    #[must_use]
    pub fn total_creates(&self) -> usize {
        self.creates.values().sum()
    }
}

#[derive(Debug, Default)]
struct State {
    products: BTreeMap<String, CrmProduct>,
    deals: Vec<(CrmDealId, NewDeal)>,
    calls: CallCounts,
    lookup_failures: HashMap<String, Failure>,
    deal_failures: HashMap<String, Failure>,
    races: HashSet<String>,
    disconnected: bool,
}

/// Deterministic in-memory CRM.
#[derive(Debug, Default)]
pub struct InMemoryCrm {
    state: Mutex<State>,
    next_id: AtomicU64,
    latency: Duration,
}

impl InMemoryCrm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` to widen race windows.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Seed a product that already exists in the CRM.
    #[must_use]
    pub fn with_existing_product(self, sku: &str, name: &str) -> Self {
        let id = self.product_id();
        self.lock().products.insert(
            sku.to_string(),
            CrmProduct {
                id,
                sku: sku.to_string(),
                name: name.to_string(),
            },
        );
        self
    }

    /// Every `create_deal` for `deal_name` fails with a non-transient error.
    pub fn fail_deal(&self, deal_name: &str) {
        self.lock()
            .deal_failures
            .insert(deal_name.to_string(), Failure::Permanent);
    }

    /// The next `times` calls of `create_deal` for `deal_name` fail transiently.
    pub fn fail_deal_transiently(&self, deal_name: &str, times: u32) {
        self.lock()
            .deal_failures
            .insert(deal_name.to_string(), Failure::Transient { remaining: times });
    }

    /// Every lookup of `sku` fails with a non-transient error.
    pub fn fail_lookup(&self, sku: &str) {
        self.lock()
            .lookup_failures
            .insert(sku.to_string(), Failure::Permanent);
    }

    /// The next `times` lookups of `sku` fail transiently.
    pub fn fail_lookup_transiently(&self, sku: &str, times: u32) {
        self.lock()
            .lookup_failures
            .insert(sku.to_string(), Failure::Transient { remaining: times });
    }

    /// Another writer creates `sku` between our lookup and our create.
    pub fn race_on_create(&self, sku: &str) {
        self.lock().races.insert(sku.to_string());
    }

    /// Make `check_connection` fail.
    pub fn disconnect(&self) {
        self.lock().disconnected = true;
    }

    #[must_use]
    pub fn calls(&self) -> CallCounts {
        self.lock().calls.clone()
    }

    #[must_use]
    pub fn products(&self) -> Vec<CrmProduct> {
        self.lock().products.values().cloned().collect()
    }

    #[must_use]
    pub fn product(&self, sku: &str) -> Option<CrmProduct> {
        self.lock().products.get(sku).cloned()
    }

    #[must_use]
    pub fn deals(&self) -> Vec<(CrmDealId, NewDeal)> {
        self.lock().deals.clone()
    }

    #[must_use]
    pub fn deal_named(&self, deal_name: &str) -> Option<NewDeal> {
        self.lock()
            .deals
            .iter()
            .find(|(_, deal)| deal.deal_name == deal_name)
            .map(|(_, deal)| deal.clone())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn product_id(&self) -> CrmProductId {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        CrmProductId::new((PRODUCT_ID_BASE + n).to_string())
    }

    fn deal_id(&self) -> CrmDealId {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        CrmDealId::new((DEAL_ID_BASE + n).to_string())
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

fn take_failure(failures: &mut HashMap<String, Failure>, key: &str) -> Option<CrmError> {
    match *failures.get(key)? {
        Failure::Permanent => Some(CrmError::Api {
            status: 400,
            message: format!("INVALID_DATA: injected failure for {key}"),
        }),
        Failure::Transient { remaining: 0 } => {
            failures.remove(key);
            None
        }
        Failure::Transient { remaining } => {
            failures.insert(
                key.to_string(),
                Failure::Transient {
                    remaining: remaining - 1,
                },
            );
            Some(CrmError::Unavailable(format!(
                "injected transient failure for {key}"
            )))
        }
    }
}

impl CrmClient for InMemoryCrm {
    async fn find_product_by_sku(&self, sku: &str) -> Result<Option<CrmProduct>, CrmError> {
        self.simulate_latency().await;
        let mut state = self.lock();
        *state.calls.lookups.entry(sku.to_string()).or_default() += 1;
        if let Some(err) = take_failure(&mut state.lookup_failures, sku) {
            return Err(err);
        }
        Ok(state.products.get(sku).cloned())
    }

    async fn create_product(&self, product: &NewProduct) -> Result<CrmProduct, CrmError> {
        self.simulate_latency().await;
        let mut state = self.lock();
        *state.calls.creates.entry(product.sku.clone()).or_default() += 1;

        if state.races.remove(&product.sku) {
            let winner = CrmProduct {
                id: self.product_id(),
                sku: product.sku.clone(),
                name: product.name.clone(),
            };
            state.products.insert(product.sku.clone(), winner);
        }

        if let Some(existing) = state.products.get(&product.sku) {
            return Err(CrmError::Duplicate {
                existing_id: Some(existing.id.clone()),
            });
        }

        let created = CrmProduct {
            id: self.product_id(),
            sku: product.sku.clone(),
            name: product.name.clone(),
        };
        debug!(sku = %product.sku, id = %created.id, "In-memory product created");
        state.products.insert(product.sku.clone(), created.clone());
        Ok(created)
    }

    async fn create_deal(&self, deal: &NewDeal) -> Result<CrmDealId, CrmError> {
        self.simulate_latency().await;
        let mut state = self.lock();
        state.calls.deals += 1;
        if let Some(err) = take_failure(&mut state.deal_failures, &deal.deal_name) {
            return Err(err);
        }
        let id = self.deal_id();
        debug!(deal_name = %deal.deal_name, id = %id, "In-memory deal created");
        state.deals.push((id.clone(), deal.clone()));
        Ok(id)
    }

    async fn check_connection(&self) -> Result<(), CrmError> {
        if self.lock().disconnected {
            return Err(CrmError::Unavailable("in-memory CRM disconnected".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn new_product(sku: &str) -> NewProduct {
        NewProduct {
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            manufacturer: String::new(),
            category: String::new(),
            distributor_part_number: String::new(),
            upc: None,
            ffl_required: false,
            drop_ship_eligible: true,
            in_house_only: false,
        }
    }

    #[tokio::test]
    async fn test_create_then_find() {
        let crm = InMemoryCrm::new();
        assert!(crm.find_product_by_sku("MAG571").await.unwrap().is_none());

        let created = crm.create_product(&new_product("MAG571")).await.unwrap();
        let found = crm.find_product_by_sku("MAG571").await.unwrap().unwrap();
        assert_eq!(created, found);
        assert_eq!(crm.calls().lookups_for("MAG571"), 2);
        assert_eq!(crm.calls().creates_for("MAG571"), 1);
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let crm = InMemoryCrm::new().with_existing_product("MAG571", "PMAG 30");
        let existing = crm.product("MAG571").unwrap();

        let err = crm.create_product(&new_product("MAG571")).await.unwrap_err();
        assert!(matches!(
            err,
            CrmError::Duplicate { existing_id: Some(ref id) } if *id == existing.id
        ));
    }

    #[tokio::test]
    async fn test_race_on_create_inserts_winner() {
        let crm = InMemoryCrm::new();
        crm.race_on_create("MAG571");

        let err = crm.create_product(&new_product("MAG571")).await.unwrap_err();
        assert!(matches!(err, CrmError::Duplicate { existing_id: Some(_) }));
        assert_eq!(crm.products().len(), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_run_out() {
        let crm = InMemoryCrm::new();
        crm.fail_lookup_transiently("MAG571", 2);

        assert!(crm.find_product_by_sku("MAG571").await.is_err());
        assert!(crm.find_product_by_sku("MAG571").await.is_err());
        assert!(crm.find_product_by_sku("MAG571").await.is_ok());
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let crm = InMemoryCrm::new();
        let a = crm.create_product(&new_product("A")).await.unwrap();
        let b = crm.create_product(&new_product("B")).await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_disconnect() {
        let crm = InMemoryCrm::new();
        assert!(crm.check_connection().await.is_ok());
        crm.disconnect();
        assert!(crm.check_connection().await.is_err());
    }
}
