//! `fsync sync` and `fsync simulate` - push an order to a CRM.

use std::path::Path;
use std::sync::Arc;

use fulfillment_sync::{
    CrmClient, EngineConfig, InMemoryCrm, OrderSyncEngine, ZohoClient, ZohoConfig,
};
use tracing::info;

use super::order_file;
use super::report::{OutputFormat, render_sync};

/// Failure injection for a simulated run.
#[derive(Debug, Default)]
pub struct SimulationOptions {
    /// SKUs that already exist in the simulated CRM.
    pub existing_skus: Vec<String>,
    /// Order numbers whose deal creation fails.
    pub failing_deals: Vec<String>,
    /// SKUs whose lookup fails.
    pub failing_skus: Vec<String>,
}

/// Sync an order file to Zoho CRM.
///
/// # Errors
///
/// Returns an error if configuration or the order is invalid, or if the
/// order needs manual review.
pub async fn sync(path: &Path, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::from_env()?;
    let client = ZohoClient::new(ZohoConfig::from_env()?)?;
    info!(environment = ?config.environment, "Syncing order to Zoho CRM");

    process(client, config, path, format).await
}

/// Run an order file against an in-memory CRM.
///
/// # Errors
///
/// Returns an error if configuration or the order is invalid, or if the
/// order needs manual review.
pub async fn simulate(
    path: &Path,
    format: OutputFormat,
    options: SimulationOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::from_env()?;

    let crm = options
        .existing_skus
        .iter()
        .fold(InMemoryCrm::new(), |crm, sku| {
            crm.with_existing_product(sku, &format!("Existing {sku}"))
        });
    for deal_name in &options.failing_deals {
        crm.fail_deal(deal_name);
    }
    for sku in &options.failing_skus {
        crm.fail_lookup(sku);
    }

    process(Arc::new(crm), config, path, format).await
}

async fn process<C: CrmClient + Clone>(
    crm: C,
    config: EngineConfig,
    path: &Path,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let order = order_file::load(path).await?;
    let engine = OrderSyncEngine::new(crm, config);
    let report = engine.process(&order).await?;

    #[allow(clippy::print_stdout)]
    {
        print!("{}", render_sync(&report, format)?);
    }

    if report.needs_manual_review() {
        return Err(format!("order {} needs manual review", order.base_sequence).into());
    }
    Ok(())
}
