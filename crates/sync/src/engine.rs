//! Order synchronization: partition, number, resolve, create deals.

use std::collections::BTreeMap;

use chrono::Utc;
use fulfillment_core::{
    Order, OrderNumber, Partitioner, ShippingOutcome, ValidationError, allocate,
};
use serde::Serialize;
use tracing::{Instrument, info, info_span, instrument, warn};
use uuid::Uuid;

use crate::config::{EngineConfig, ProductCacheScope};
use crate::crm::CrmClient;
use crate::deals::{DealAssembler, DealContext, DealReport};
use crate::error::ProductResolutionError;
use crate::resolver::{ResolutionContext, ResolvedProduct};

/// The pure part of processing an order: outcomes and their numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderPlan {
    pub outcomes: Vec<ShippingOutcome>,
    /// One per outcome, same order.
    pub order_numbers: Vec<OrderNumber>,
}

impl OrderPlan {
    /// Outcomes paired with their order numbers.
    pub fn entries(&self) -> impl Iterator<Item = (&OrderNumber, &ShippingOutcome)> {
        self.order_numbers.iter().zip(&self.outcomes)
    }
}

/// Everything that happened while syncing one order.
#[derive(Debug)]
pub struct SyncReport {
    /// Correlates log lines of one run.
    pub sync_id: Uuid,
    pub order_numbers: Vec<OrderNumber>,
    pub outcomes: Vec<ShippingOutcome>,
    pub resolved_products: BTreeMap<String, ResolvedProduct>,
    pub product_failures: Vec<ProductResolutionError>,
    pub deals: DealReport,
}

impl SyncReport {
    /// Every product resolved and every deal created.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.product_failures.is_empty() && self.deals.is_complete()
    }

    /// Someone has to look at this order before it ships.
    #[must_use]
    pub fn needs_manual_review(&self) -> bool {
        !self.is_complete()
    }
}

/// Drives one order through partitioning, numbering, product resolution and
/// deal creation.
pub struct OrderSyncEngine<C> {
    crm: C,
    config: EngineConfig,
    partitioner: Partitioner,
    shared: Option<ResolutionContext<C>>,
}

impl<C: CrmClient + Clone> OrderSyncEngine<C> {
    #[must_use]
    pub fn new(crm: C, config: EngineConfig) -> Self {
        let shared = match config.cache_scope {
            ProductCacheScope::PerOrder => None,
            ProductCacheScope::Service { ttl } => Some(ResolutionContext::shared(
                crm.clone(),
                config.retry,
                config.product_concurrency,
                ttl,
            )),
        };

        Self {
            partitioner: Partitioner::new(config.partition.clone()),
            crm,
            config,
            shared,
        }
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Partition the order and allocate order numbers, without touching
    /// the CRM.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for an empty order, an invalid line item,
    /// or more outcomes than there are suffixes.
    pub fn plan(&self, order: &Order) -> Result<OrderPlan, ValidationError> {
        let outcomes = self
            .partitioner
            .partition(&order.items, order.ffl_dealer.as_ref())?;
        let order_numbers = allocate(&order.base_sequence, outcomes.len())?;
        Ok(OrderPlan {
            outcomes,
            order_numbers,
        })
    }

    /// Sync one order to the CRM.
    ///
    /// Product and deal failures are collected in the report. Only invalid
    /// input fails the call.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the order cannot be planned.
    pub async fn process(&self, order: &Order) -> Result<SyncReport, ValidationError> {
        let sync_id = Uuid::new_v4();
        let span = info_span!(
            "sync_order",
            %sync_id,
            base_sequence = %order.base_sequence
        );
        self.process_inner(order, sync_id).instrument(span).await
    }

    async fn process_inner(&self, order: &Order, sync_id: Uuid) -> Result<SyncReport, ValidationError> {
        let plan = self.plan(order)?;
        info!(
            outcomes = plan.outcomes.len(),
            items = order.items.len(),
            "Order partitioned"
        );

        let resolution = match &self.shared {
            Some(shared) => shared.resolve_all(&order.items).await,
            None => {
                ResolutionContext::per_order(
                    self.crm.clone(),
                    self.config.retry,
                    self.config.product_concurrency,
                )
                .resolve_all(&order.items)
                .await
            }
        };

        let context = DealContext::for_order(order, Utc::now());
        let deals = DealAssembler::new(
            self.crm.clone(),
            self.config.retry,
            self.config.deal_concurrency,
        )
        .create_deals(&plan.outcomes, &plan.order_numbers, &resolution, &context)
        .await?;

        let report = SyncReport {
            sync_id,
            order_numbers: plan.order_numbers,
            outcomes: plan.outcomes,
            resolved_products: resolution.resolved,
            product_failures: resolution.failed,
            deals,
        };

        if report.needs_manual_review() {
            warn!(
                product_failures = report.product_failures.len(),
                deal_failures = report.deals.failed.len(),
                "Order needs manual review"
            );
        } else {
            info!(deals = report.deals.succeeded.len(), "Order synced");
        }
        Ok(report)
    }

    /// Verify the CRM is reachable with the configured credentials.
    ///
    /// # Errors
    ///
    /// Returns the CRM error if the check fails.
    #[instrument(skip(self))]
    pub async fn check_connection(&self) -> Result<(), crate::error::CrmError> {
        self.crm.check_connection().await
    }
}

impl<C> std::fmt::Debug for OrderSyncEngine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderSyncEngine")
            .field("config", &self.config)
            .field("shared_cache", &self.shared.is_some())
            .finish_non_exhaustive()
    }
}
