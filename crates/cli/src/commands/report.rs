//! Rendering plans and sync reports for the terminal.

use clap::ValueEnum;
use fulfillment_core::{Consignee, FulfillmentType, HoldType};
use fulfillment_sync::{OrderPlan, SyncReport};
use rust_decimal::Decimal;
use serde::Serialize;

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// One JSON document
    Json,
}

#[derive(Debug, Serialize)]
struct PlanEntry {
    order_number: String,
    fulfillment_type: FulfillmentType,
    consignee: Consignee,
    ordering_account: String,
    ffl_dealer: Option<String>,
    amount: Decimal,
    skus: Vec<String>,
}

#[derive(Debug, Serialize)]
struct DealSummary {
    order_number: String,
    deal_id: String,
    fulfillment_type: FulfillmentType,
    amount: Decimal,
    lines: usize,
    stage: &'static str,
    hold: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct FailureSummary {
    subject: String,
    error: String,
}

#[derive(Debug, Serialize)]
struct SyncSummary {
    sync_id: String,
    complete: bool,
    needs_manual_review: bool,
    products_resolved: usize,
    products_created: usize,
    product_failures: Vec<FailureSummary>,
    deals: Vec<DealSummary>,
    deal_failures: Vec<FailureSummary>,
}

fn plan_entries(plan: &OrderPlan) -> Vec<PlanEntry> {
    plan.entries()
        .map(|(number, outcome)| PlanEntry {
            order_number: number.full(),
            fulfillment_type: outcome.fulfillment_type,
            consignee: outcome.consignee,
            ordering_account: outcome.ordering_account.clone(),
            ffl_dealer: outcome.ffl_dealer.as_ref().map(|d| d.name.clone()),
            amount: outcome.amount(),
            skus: outcome.skus().into_iter().map(str::to_string).collect(),
        })
        .collect()
}

fn sync_summary(report: &SyncReport) -> SyncSummary {
    SyncSummary {
        sync_id: report.sync_id.to_string(),
        complete: report.is_complete(),
        needs_manual_review: report.needs_manual_review(),
        products_resolved: report.resolved_products.len(),
        products_created: report
            .resolved_products
            .values()
            .filter(|p| p.created)
            .count(),
        product_failures: report
            .product_failures
            .iter()
            .map(|f| FailureSummary {
                subject: f.sku.clone(),
                error: f.source.to_string(),
            })
            .collect(),
        deals: report
            .deals
            .succeeded
            .iter()
            .map(|deal| DealSummary {
                order_number: deal.deal_name.clone(),
                deal_id: deal.id.to_string(),
                fulfillment_type: deal.fulfillment_type,
                amount: deal.amount,
                lines: deal.line_items.len(),
                stage: deal.stage.as_str(),
                hold: deal.hold.map(HoldType::as_str),
            })
            .collect(),
        deal_failures: report
            .deals
            .failed
            .iter()
            .map(|f| FailureSummary {
                subject: f.order_number.full(),
                error: f.error.to_string(),
            })
            .collect(),
    }
}

/// Render an order plan.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render_plan(plan: &OrderPlan, format: OutputFormat) -> Result<String, serde_json::Error> {
    let entries = plan_entries(plan);
    if format == OutputFormat::Json {
        return serde_json::to_string_pretty(&entries);
    }

    let mut out = String::new();
    for entry in &entries {
        out.push_str(&format!(
            "{}  {:<18} account {}  ${}  {}\n",
            entry.order_number,
            entry.fulfillment_type.as_str(),
            entry.ordering_account,
            entry.amount,
            entry.skus.join(", ")
        ));
        if let Some(dealer) = &entry.ffl_dealer {
            out.push_str(&format!("    FFL dealer: {dealer}\n"));
        }
    }
    Ok(out)
}

/// Render the result of a sync run.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render_sync(report: &SyncReport, format: OutputFormat) -> Result<String, serde_json::Error> {
    let summary = sync_summary(report);
    if format == OutputFormat::Json {
        return serde_json::to_string_pretty(&summary);
    }

    let mut out = format!(
        "sync {}: {} products ({} created), {} deals\n",
        summary.sync_id,
        summary.products_resolved,
        summary.products_created,
        summary.deals.len()
    );
    for deal in &summary.deals {
        out.push_str(&format!(
            "  {}  deal {}  {:<18} ${}  {} lines  {}{}\n",
            deal.order_number,
            deal.deal_id,
            deal.fulfillment_type.as_str(),
            deal.amount,
            deal.lines,
            deal.stage,
            deal.hold.map(|h| format!(" (hold: {h})")).unwrap_or_default()
        ));
    }
    for failure in &summary.product_failures {
        out.push_str(&format!("  FAILED product {}: {}\n", failure.subject, failure.error));
    }
    for failure in &summary.deal_failures {
        out.push_str(&format!("  FAILED deal {}: {}\n", failure.subject, failure.error));
    }
    if summary.needs_manual_review {
        out.push_str("order needs manual review\n");
    }
    Ok(out)
}
