//! Deal assembly: one CRM deal per shipping outcome.

use chrono::{DateTime, Utc};
use fulfillment_core::{
    Consignee, ContactRef, CrmDealId, DealStage, FulfillmentType, HoldType, Order, OrderNumber,
    OrderStatus, ShippingOutcome, ValidationError, CURRENCY_SCALE, line_total, sum_amounts,
};
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::crm::{CrmClient, DealLine, NewDeal};
use crate::error::DealCreationError;
use crate::resolver::ResolutionReport;
use crate::retry::{RetryPolicy, with_retry};

/// Order-level fields shared by every deal of an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealContext {
    pub contact: ContactRef,
    pub status: OrderStatus,
    /// Hold placed on the whole order, if any.
    pub hold: Option<HoldType>,
    pub submitted_at: DateTime<Utc>,
}

impl DealContext {
    #[must_use]
    pub fn for_order(order: &Order, submitted_at: DateTime<Utc>) -> Self {
        Self {
            contact: order.contact.clone(),
            status: order.status,
            hold: order.hold,
            submitted_at,
        }
    }

    /// Hold for one outcome.
    ///
    /// An FFL drop-ship with no dealer on the order cannot be submitted to
    /// the distributor, so it is held as `FFL not on file`.
    #[must_use]
    pub fn hold_for(&self, outcome: &ShippingOutcome) -> Option<HoldType> {
        self.hold.or_else(|| {
            (outcome.fulfillment_type == FulfillmentType::DropShipFfl
                && outcome.ffl_dealer.is_none())
            .then_some(HoldType::FflNotOnFile)
        })
    }

    /// Pipeline stage for a deal. Held deals stay in qualification.
    #[must_use]
    pub const fn stage_for(&self, hold: Option<HoldType>) -> DealStage {
        match hold {
            Some(_) => DealStage::Qualification,
            None => self.status.deal_stage(),
        }
    }
}

/// A deal the CRM accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deal {
    pub id: CrmDealId,
    pub deal_name: String,
    pub amount: Decimal,
    pub line_items: Vec<DealLine>,
    pub fulfillment_type: FulfillmentType,
    pub consignee: Consignee,
    pub ordering_account: String,
    pub ffl_dealer_name: Option<String>,
    pub stage: DealStage,
    pub order_status: OrderStatus,
    pub hold: Option<HoldType>,
}

/// An outcome whose deal was not created.
#[derive(Debug)]
pub struct FailedOutcome {
    /// Position of the outcome in the partition.
    pub index: usize,
    pub order_number: OrderNumber,
    pub fulfillment_type: FulfillmentType,
    pub error: DealCreationError,
}

/// Per-outcome results, both lists in outcome order.
#[derive(Debug, Default)]
pub struct DealReport {
    pub succeeded: Vec<Deal>,
    pub failed: Vec<FailedOutcome>,
}

impl DealReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Deal created for `order_number`, if any.
    #[must_use]
    pub fn deal(&self, order_number: &str) -> Option<&Deal> {
        self.succeeded.iter().find(|deal| deal.deal_name == order_number)
    }
}

/// Merge same-SKU lines of an outcome into one subform row per SKU.
///
/// Quantities are summed. When the merged lines disagree on price, the row
/// carries the quantity-weighted unit price rounded to cents, and the line
/// total is always `unit_price × quantity`. Rows keep first-seen SKU order.
///
/// # Errors
///
/// Returns the SKUs that have no resolved product.
pub fn merge_lines(
    outcome: &ShippingOutcome,
    resolved: &ResolutionReport,
) -> Result<Vec<DealLine>, Vec<String>> {
    let mut lines: Vec<DealLine> = Vec::new();
    let mut missing: Vec<String> = Vec::new();

    for item in &outcome.items {
        let sku = item.sku.trim();
        let Some(product_id) = resolved.product_id(sku) else {
            if !missing.iter().any(|m| m == sku) {
                missing.push(sku.to_string());
            }
            continue;
        };

        if let Some(line) = lines.iter_mut().find(|line| line.sku == sku) {
            let gross = sum_amounts([line.line_total, item.line_total()]);
            line.quantity += item.quantity;
            if item.unit_price != line.unit_price {
                line.unit_price =
                    (gross / Decimal::from(line.quantity)).round_dp(CURRENCY_SCALE);
            }
            line.line_total = line_total(line.unit_price, line.quantity);
        } else {
            lines.push(DealLine {
                product_id: product_id.clone(),
                sku: sku.to_string(),
                product_name: item.product_name.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_total: item.line_total(),
                ffl_required: item.ffl_required,
                manufacturer: item.manufacturer.clone(),
                category: item.category.clone(),
            });
        }
    }

    if missing.is_empty() {
        Ok(lines)
    } else {
        Err(missing)
    }
}

/// Creates the deals of one order with bounded concurrency.
#[derive(Debug, Clone)]
pub struct DealAssembler<C> {
    crm: C,
    retry: RetryPolicy,
    concurrency: usize,
}

impl<C: CrmClient> DealAssembler<C> {
    #[must_use]
    pub fn new(crm: C, retry: RetryPolicy, concurrency: usize) -> Self {
        Self {
            crm,
            retry,
            concurrency: concurrency.max(1),
        }
    }

    /// Build the deal payload for one outcome without sending it.
    ///
    /// # Errors
    ///
    /// Returns `DealCreationError::UnresolvedProducts` if any SKU of the
    /// outcome has no CRM product.
    pub fn build_deal(
        outcome: &ShippingOutcome,
        order_number: &OrderNumber,
        resolved: &ResolutionReport,
        context: &DealContext,
    ) -> Result<NewDeal, DealCreationError> {
        let deal_name = order_number.full();
        let lines = merge_lines(outcome, resolved).map_err(|skus| {
            DealCreationError::UnresolvedProducts {
                deal_name: deal_name.clone(),
                skus,
            }
        })?;

        let hold = context.hold_for(outcome);
        Ok(NewDeal {
            amount: sum_amounts(lines.iter().map(|line| line.line_total)),
            deal_name,
            stage: context.stage_for(hold),
            contact: context.contact.clone(),
            fulfillment_type: outcome.fulfillment_type,
            consignee: outcome.consignee,
            ordering_account: outcome.ordering_account.clone(),
            ffl_dealer: outcome.ffl_dealer.clone(),
            order_status: context.status,
            hold,
            submitted_at: context.submitted_at,
            lines,
        })
    }

    /// Create one deal per outcome.
    ///
    /// `outcomes` and `order_numbers` are matched by position. A failure on
    /// one outcome is recorded and does not affect the others.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Misaligned` if the two slices differ in
    /// length. No deal is created in that case.
    #[instrument(skip_all, fields(outcomes = outcomes.len()))]
    pub async fn create_deals(
        &self,
        outcomes: &[ShippingOutcome],
        order_numbers: &[OrderNumber],
        resolved: &ResolutionReport,
        context: &DealContext,
    ) -> Result<DealReport, ValidationError> {
        if outcomes.len() != order_numbers.len() {
            return Err(ValidationError::Misaligned {
                outcomes: outcomes.len(),
                numbers: order_numbers.len(),
            });
        }

        let mut results: Vec<_> = stream::iter(outcomes.iter().zip(order_numbers).enumerate())
            .map(|(index, (outcome, number))| async move {
                (
                    index,
                    self.create_deal(outcome, number, resolved, context).await,
                )
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        results.sort_by_key(|(index, _)| *index);

        let mut report = DealReport::default();
        for (index, result) in results {
            match result {
                Ok(deal) => report.succeeded.push(deal),
                Err(error) => {
                    let (Some(outcome), Some(number)) =
                        (outcomes.get(index), order_numbers.get(index))
                    else {
                        continue;
                    };
                    report.failed.push(FailedOutcome {
                        index,
                        order_number: number.clone(),
                        fulfillment_type: outcome.fulfillment_type,
                        error,
                    });
                }
            }
        }

        info!(
            created = report.succeeded.len(),
            failed = report.failed.len(),
            "Deals created"
        );
        Ok(report)
    }

    #[instrument(skip_all, fields(deal_name = %order_number))]
    async fn create_deal(
        &self,
        outcome: &ShippingOutcome,
        order_number: &OrderNumber,
        resolved: &ResolutionReport,
        context: &DealContext,
    ) -> Result<Deal, DealCreationError> {
        let deal = Self::build_deal(outcome, order_number, resolved, context).inspect_err(|err| {
            warn!(error = %err, "Skipping deal");
        })?;

        let payload = &deal;
        let id = with_retry(&self.retry, "create_deal", move || {
            self.crm.create_deal(payload)
        })
        .await
        .map_err(|source| {
            warn!(error = %source, "Deal creation failed");
            DealCreationError::Crm {
                deal_name: deal.deal_name.clone(),
                source,
            }
        })?;

        info!(
            id = %id,
            amount = %deal.amount,
            fulfillment_type = %deal.fulfillment_type,
            hold = deal.hold.map(HoldType::as_str),
            "Deal created"
        );

        Ok(Deal {
            id,
            ffl_dealer_name: deal.ffl_dealer_name().map(str::to_string),
            deal_name: deal.deal_name,
            amount: deal.amount,
            line_items: deal.lines,
            fulfillment_type: deal.fulfillment_type,
            consignee: deal.consignee,
            ordering_account: deal.ordering_account,
            stage: deal.stage,
            order_status: deal.order_status,
            hold: deal.hold,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;
    use fulfillment_core::{BaseSequence, FflDealer, OrderLineItem, allocate};

    use super::*;
    use crate::crm::InMemoryCrm;
    use crate::resolver::ResolvedProduct;

    fn item(sku: &str, quantity: u32, cents: i64) -> OrderLineItem {
        OrderLineItem {
            sku: sku.to_string(),
            quantity,
            unit_price: Decimal::new(cents, 2),
            ffl_required: false,
            drop_ship_eligible: true,
            in_house_only: false,
            manufacturer: "Magpul".to_string(),
            category: "Magazines".to_string(),
            product_name: format!("Product {sku}"),
            distributor_part_number: String::new(),
            upc: None,
        }
    }

    fn outcome(fulfillment_type: FulfillmentType, items: Vec<OrderLineItem>) -> ShippingOutcome {
        ShippingOutcome {
            fulfillment_type,
            consignee: fulfillment_type.consignee(),
            ordering_account: "99902".to_string(),
            items,
            ffl_dealer: None,
        }
    }

    fn resolved(skus: &[&str]) -> ResolutionReport {
        let mut report = ResolutionReport::default();
        for (n, sku) in skus.iter().enumerate() {
            report.resolved.insert(
                (*sku).to_string(),
                ResolvedProduct {
                    sku: (*sku).to_string(),
                    external_product_id: fulfillment_core::CrmProductId::new(format!("p{n}")),
                    created: false,
                },
            );
        }
        report
    }

    fn context() -> DealContext {
        DealContext {
            contact: ContactRef::new("c1"),
            status: OrderStatus::Processing,
            hold: None,
            submitted_at: Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap(),
        }
    }

    fn numbers(count: usize) -> Vec<OrderNumber> {
        allocate(&BaseSequence::parse("0001234").unwrap(), count).unwrap()
    }

    fn assembler(crm: &Arc<InMemoryCrm>) -> DealAssembler<Arc<InMemoryCrm>> {
        DealAssembler::new(Arc::clone(crm), RetryPolicy::immediate(2), 3)
    }

    #[test]
    fn test_merge_lines_sums_quantities() {
        let outcome = outcome(
            FulfillmentType::DropShipCustomer,
            vec![item("A", 2, 1000), item("B", 1, 500), item("A", 3, 1000)],
        );

        let lines = merge_lines(&outcome, &resolved(&["A", "B"])).unwrap();

        assert_eq!(lines.len(), 2);
        let a = lines.first().unwrap();
        assert_eq!(a.sku, "A");
        assert_eq!(a.quantity, 5);
        assert_eq!(a.line_total, Decimal::new(5000, 2));
    }

    #[test]
    fn test_merge_lines_mixed_prices_stay_consistent() {
        let outcome = outcome(
            FulfillmentType::DropShipCustomer,
            vec![item("A", 1, 1000), item("A", 1, 2000)],
        );

        let lines = merge_lines(&outcome, &resolved(&["A"])).unwrap();

        assert_eq!(lines.len(), 1);
        let a = lines.first().unwrap();
        assert_eq!(a.quantity, 2);
        assert_eq!(a.unit_price, Decimal::new(1500, 2));
        assert_eq!(a.line_total, Decimal::new(3000, 2));
    }

    #[test]
    fn test_merge_lines_rounds_weighted_price_to_cents() {
        let outcome = outcome(
            FulfillmentType::DropShipCustomer,
            vec![item("A", 2, 1000), item("A", 1, 1001)],
        );

        let a = merge_lines(&outcome, &resolved(&["A"])).unwrap().remove(0);

        assert_eq!(a.quantity, 3);
        assert_eq!(a.unit_price, Decimal::new(1000, 2));
        assert_eq!(a.line_total, a.unit_price * Decimal::from(a.quantity));
    }

    #[test]
    fn test_merge_lines_reports_missing() {
        let outcome = outcome(
            FulfillmentType::DropShipCustomer,
            vec![item("A", 1, 1000), item("X", 1, 500), item("X", 1, 500)],
        );
        assert_eq!(
            merge_lines(&outcome, &resolved(&["A"])).unwrap_err(),
            vec!["X".to_string()]
        );
    }

    #[test]
    fn test_missing_dealer_holds_ffl_drop_ship() {
        let ctx = context();
        let held = outcome(FulfillmentType::DropShipFfl, vec![item("G", 1, 50000)]);
        assert_eq!(ctx.hold_for(&held), Some(HoldType::FflNotOnFile));
        assert_eq!(ctx.stage_for(ctx.hold_for(&held)), DealStage::Qualification);

        let mut with_dealer = held;
        with_dealer.ffl_dealer = Some(FflDealer {
            name: "Lone Star Arms".to_string(),
            license: "5-74-000-00-0A-00000".to_string(),
        });
        assert_eq!(ctx.hold_for(&with_dealer), None);
        assert_eq!(ctx.stage_for(None), DealStage::NeedsAnalysis);
    }

    #[tokio::test]
    async fn test_misaligned_inputs_rejected() {
        let crm = Arc::new(InMemoryCrm::new());
        let outcomes = vec![outcome(FulfillmentType::InHouse, vec![item("A", 1, 100)])];

        let err = assembler(&crm)
            .create_deals(&outcomes, &numbers(2), &resolved(&["A"]), &context())
            .await
            .unwrap_err();

        assert_eq!(err, ValidationError::Misaligned { outcomes: 1, numbers: 2 });
        assert_eq!(crm.calls().deals, 0);
    }

    #[tokio::test]
    async fn test_deals_in_outcome_order() {
        let crm = Arc::new(InMemoryCrm::new());
        let outcomes = vec![
            outcome(FulfillmentType::InHouse, vec![item("A", 1, 100)]),
            outcome(FulfillmentType::DropShipCustomer, vec![item("B", 2, 250)]),
        ];

        let report = assembler(&crm)
            .create_deals(&outcomes, &numbers(2), &resolved(&["A", "B"]), &context())
            .await
            .unwrap();

        let names: Vec<&str> = report.succeeded.iter().map(|d| d.deal_name.as_str()).collect();
        assert_eq!(names, ["0001234AZ", "0001234BZ"]);
        assert_eq!(
            report.deal("0001234BZ").unwrap().amount,
            Decimal::new(500, 2)
        );
    }

    #[tokio::test]
    async fn test_unresolved_outcome_skipped_without_crm_call() {
        let crm = Arc::new(InMemoryCrm::new());
        let outcomes = vec![
            outcome(FulfillmentType::InHouse, vec![item("A", 1, 100)]),
            outcome(FulfillmentType::DropShipCustomer, vec![item("X", 1, 100)]),
        ];

        let report = assembler(&crm)
            .create_deals(&outcomes, &numbers(2), &resolved(&["A"]), &context())
            .await
            .unwrap();

        assert_eq!(report.succeeded.len(), 1);
        let failed = report.failed.first().unwrap();
        assert_eq!(failed.index, 1);
        assert!(matches!(
            failed.error,
            DealCreationError::UnresolvedProducts { ref skus, .. } if skus == &["X"]
        ));
        assert_eq!(crm.calls().deals, 1);
    }
}
