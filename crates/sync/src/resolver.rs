//! Product resolution: map every SKU of an order to a CRM product record.
//!
//! Each distinct SKU is looked up once and created if missing. Lookups for
//! the same SKU are coalesced through a [`moka`] cache, so concurrent
//! callers wait on a single in-flight resolution instead of racing to create
//! duplicate products.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use fulfillment_core::{CrmProductId, OrderLineItem};
use futures::stream::{self, StreamExt};
use moka::future::Cache;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::crm::{CrmClient, NewProduct};
use crate::error::{ConcurrencyConflict, CrmError, ProductResolutionError};
use crate::retry::{RetryPolicy, with_retry};

/// Upper bound on SKUs held by a long-lived context.
const SHARED_CACHE_CAPACITY: u64 = 50_000;
/// Upper bound on SKUs held by a per-order context.
const PER_ORDER_CACHE_CAPACITY: u64 = 1_000;

/// A SKU mapped to its CRM product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedProduct {
    pub sku: String,
    pub external_product_id: CrmProductId,
    /// Whether this call created the product in the CRM.
    pub created: bool,
}

/// Outcome of resolving every SKU of an order.
#[derive(Debug, Default)]
pub struct ResolutionReport {
    pub resolved: BTreeMap<String, ResolvedProduct>,
    /// Failures in first-seen SKU order.
    pub failed: Vec<ProductResolutionError>,
}

impl ResolutionReport {
    /// CRM id for `sku`, if it was resolved.
    #[must_use]
    pub fn product_id(&self, sku: &str) -> Option<&CrmProductId> {
        self.resolved
            .get(sku.trim())
            .map(|product| &product.external_product_id)
    }

    /// Whether every SKU was resolved.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of products this run created.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.resolved.values().filter(|p| p.created).count()
    }
}

/// SKU cache plus the CRM handle used to fill it.
///
/// Build one per order with [`ResolutionContext::per_order`], or keep one
/// alive across orders with [`ResolutionContext::shared`].
pub struct ResolutionContext<C> {
    crm: C,
    retry: RetryPolicy,
    concurrency: usize,
    cache: Cache<String, ResolvedProduct>,
}

impl<C: CrmClient> ResolutionContext<C> {
    /// A context whose cache lives as long as one order.
    #[must_use]
    pub fn per_order(crm: C, retry: RetryPolicy, concurrency: usize) -> Self {
        Self {
            crm,
            retry,
            concurrency: concurrency.max(1),
            cache: Cache::new(PER_ORDER_CACHE_CAPACITY),
        }
    }

    /// A context shared across orders. Entries expire after `ttl`.
    #[must_use]
    pub fn shared(crm: C, retry: RetryPolicy, concurrency: usize, ttl: Duration) -> Self {
        Self {
            crm,
            retry,
            concurrency: concurrency.max(1),
            cache: Cache::builder()
                .max_capacity(SHARED_CACHE_CAPACITY)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Cached resolution for `sku`, without calling the CRM.
    pub async fn cached(&self, sku: &str) -> Option<ResolvedProduct> {
        self.cache.get(sku.trim()).await
    }

    /// Resolve the product for one line item.
    ///
    /// Only the call that ran the lookup can report `created = true`. A
    /// cache hit, or waiting on another caller's in-flight resolution,
    /// reports `created = false`.
    ///
    /// # Errors
    ///
    /// Returns `ProductResolutionError` if the lookup or creation fails
    /// after retries.
    #[instrument(skip(self, item), fields(sku = %item.sku.trim()))]
    pub async fn resolve(
        &self,
        item: &OrderLineItem,
    ) -> Result<ResolvedProduct, ProductResolutionError> {
        let product = NewProduct::from(item);
        let sku = product.sku.clone();

        let ran = AtomicBool::new(false);
        let init = async {
            ran.store(true, Ordering::Relaxed);
            self.find_or_create(product).await
        };

        let mut resolved = self
            .cache
            .try_get_with(sku.clone(), init)
            .await
            .map_err(|source| ProductResolutionError { sku, source })?;
        if !ran.load(Ordering::Relaxed) {
            resolved.created = false;
        }
        Ok(resolved)
    }

    /// Resolve every distinct SKU in `items`.
    ///
    /// Metadata of the first item carrying a SKU is used if the product has
    /// to be created. One SKU failing does not stop the others.
    #[instrument(skip_all, fields(items = items.len()))]
    pub async fn resolve_all(&self, items: &[OrderLineItem]) -> ResolutionReport {
        let mut seen = HashSet::new();
        let distinct: Vec<&OrderLineItem> = items
            .iter()
            .filter(|item| seen.insert(item.sku.trim()))
            .collect();

        let mut results: Vec<_> = stream::iter(distinct.into_iter().enumerate())
            .map(|(position, item)| async move { (position, self.resolve(item).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        results.sort_by_key(|(position, _)| *position);

        let mut report = ResolutionReport::default();
        for (_, result) in results {
            match result {
                Ok(product) => {
                    report.resolved.insert(product.sku.clone(), product);
                }
                Err(err) => {
                    warn!(sku = %err.sku, error = %err.source, "Product resolution failed");
                    report.failed.push(err);
                }
            }
        }

        info!(
            resolved = report.resolved.len(),
            created = report.created_count(),
            failed = report.failed.len(),
            "Products resolved"
        );
        report
    }

    async fn find_or_create(&self, product: NewProduct) -> Result<ResolvedProduct, CrmError> {
        let sku = product.sku.as_str();

        if let Some(existing) = self.find(sku).await? {
            return Ok(ResolvedProduct {
                sku: product.sku.clone(),
                external_product_id: existing,
                created: false,
            });
        }

        let product_ref = &product;
        let created = with_retry(&self.retry, "create_product", move || {
            self.crm.create_product(product_ref)
        })
        .await;

        match created {
            Ok(created) => {
                info!(sku, id = %created.id, "Product created");
                Ok(ResolvedProduct {
                    sku: product.sku.clone(),
                    external_product_id: created.id,
                    created: true,
                })
            }
            Err(CrmError::Duplicate { existing_id }) => {
                let existing_id = match existing_id {
                    Some(id) => id,
                    None => self
                        .find(sku)
                        .await?
                        .ok_or(CrmError::Duplicate { existing_id: None })?,
                };
                let conflict = ConcurrencyConflict {
                    sku: product.sku.clone(),
                    existing_id,
                };
                warn!(sku, existing_id = %conflict.existing_id, "{conflict}");
                Ok(ResolvedProduct {
                    sku: conflict.sku,
                    external_product_id: conflict.existing_id,
                    created: false,
                })
            }
            Err(err) => Err(err),
        }
    }

    async fn find(&self, sku: &str) -> Result<Option<CrmProductId>, CrmError> {
        let found = with_retry(&self.retry, "find_product_by_sku", move || {
            self.crm.find_product_by_sku(sku)
        })
        .await?;
        Ok(found.map(|product| product.id))
    }
}

impl<C> std::fmt::Debug for ResolutionContext<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionContext")
            .field("retry", &self.retry)
            .field("concurrency", &self.concurrency)
            .field("cached_skus", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}
