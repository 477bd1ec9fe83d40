//! Reading orders from disk.
//!
//! Files ending in `.json` are parsed as JSON, everything else as YAML.
//!
//! ```yaml
//! baseSequence: "0001234"
//! contact: "5843259000000100001"
//! fflDealer:
//!   name: Lone Star Arms
//!   license: 5-74-000-00-0A-00000
//! items:
//!   - sku: GLOCK19
//!     quantity: 1
//!     unitPrice: "499.99"
//!     fflRequired: true
//!     dropShipEligible: true
//!     inHouseOnly: false
//!     productName: Glock 19 Gen5
//! ```

use std::path::Path;

use fulfillment_core::{Order, ValidationError};
use thiserror::Error;
use tracing::info;

/// Errors that can occur while loading an order file.
#[derive(Debug, Error)]
pub enum OrderFileError {
    /// The file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file does not describe a valid order.
    #[error("Invalid order in {path}: {source}")]
    Invalid {
        path: String,
        #[source]
        source: ValidationError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

impl Format {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// Load an order from a YAML or JSON file.
///
/// # Errors
///
/// Returns `OrderFileError` if the file cannot be read or parsed. A line
/// item missing a fulfillment flag is reported as
/// `ValidationError::MalformedItem`.
pub async fn load(path: &Path) -> Result<Order, OrderFileError> {
    let shown = path.display().to_string();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| OrderFileError::Io {
            path: shown.clone(),
            source,
        })?;

    let order = parse(&content, Format::for_path(path)).map_err(|source| {
        OrderFileError::Invalid {
            path: shown.clone(),
            source,
        }
    })?;

    info!(
        path = %shown,
        base_sequence = %order.base_sequence,
        items = order.items.len(),
        "Loaded order"
    );
    Ok(order)
}

fn parse(content: &str, format: Format) -> Result<Order, ValidationError> {
    match format {
        Format::Json => serde_json::from_str(content)
            .map_err(|e| ValidationError::MalformedItem(e.to_string())),
        Format::Yaml => serde_yaml::from_str(content)
            .map_err(|e| ValidationError::MalformedItem(e.to_string())),
    }
}
