//! `fsync check` - verify Zoho credentials.

use fulfillment_sync::{CrmClient, ZohoClient, ZohoConfig};
use tracing::info;

/// Refresh a token if needed and call the Zoho `org` endpoint.
///
/// # Errors
///
/// Returns an error if credentials are missing or Zoho rejects them.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ZohoConfig::from_env()?;
    let client = ZohoClient::new(config)?;

    client.check_connection().await?;
    info!(base_url = %client.base_url(), "Zoho CRM connection OK");
    Ok(())
}
