//! `fsync plan` - show how an order would be split, without a CRM.

use std::path::Path;

use fulfillment_core::{Partitioner, allocate};
use fulfillment_sync::{EngineConfig, OrderPlan};
use tracing::info;

use super::order_file;
use super::report::{OutputFormat, render_plan};

/// Partition an order file and print the outcomes with their numbers.
///
/// # Errors
///
/// Returns an error if configuration or the order file is invalid.
pub async fn run(path: &Path, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::from_env()?;
    let order = order_file::load(path).await?;

    let outcomes = Partitioner::new(config.partition)
        .partition(&order.items, order.ffl_dealer.as_ref())?;
    let order_numbers = allocate(&order.base_sequence, outcomes.len())?;
    let plan = OrderPlan {
        outcomes,
        order_numbers,
    };
    info!(outcomes = plan.outcomes.len(), "Order planned");

    #[allow(clippy::print_stdout)]
    {
        print!("{}", render_plan(&plan, format)?);
    }
    Ok(())
}
