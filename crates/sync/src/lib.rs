//! Fulfillment Sync - Product resolution and deal creation in the CRM.
//!
//! Takes a finalized order, splits it with [`fulfillment_core`], and writes
//! the result to the CRM:
//! - [`resolver`] - Find-or-create a CRM product for every SKU
//! - [`deals`] - One deal per shipping outcome, with merged line items
//! - [`engine`] - Runs the whole pipeline and reports per-outcome results
//! - [`crm`] - The CRM seam, plus an in-memory backend
//! - [`zoho`] - Zoho CRM backend
//! - [`retry`] - Backoff for transient CRM failures
//! - [`config`] - Environment-based configuration
//!
//! # Failure model
//!
//! Invalid input fails the whole order with a `ValidationError` before any
//! CRM call. After that, nothing aborts the order: a SKU that cannot be
//! resolved only fails the outcomes that contain it, and a deal that cannot
//! be created only fails its own outcome. [`engine::SyncReport`] lists every
//! failure so the order can be reviewed by hand.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod crm;
pub mod deals;
pub mod engine;
pub mod error;
pub mod resolver;
pub mod retry;
pub mod zoho;

pub use config::{ConfigError, EngineConfig, ProductCacheScope, SyncEnvironment, ZohoConfig};
pub use crm::{CrmClient, InMemoryCrm};
pub use deals::{Deal, DealAssembler, DealContext, DealReport, FailedOutcome};
pub use engine::{OrderPlan, OrderSyncEngine, SyncReport};
pub use error::{ConcurrencyConflict, CrmError, DealCreationError, ProductResolutionError};
pub use resolver::{ResolutionContext, ResolutionReport, ResolvedProduct};
pub use retry::RetryPolicy;
pub use zoho::ZohoClient;
