//! Zoho CRM backend.
//!
//! # API Reference
//!
//! - Base URL: `{ZOHO_API_HOST}/crm/v2`
//! - Authentication: OAuth access token via `Authorization: Zoho-oauthtoken <token>`
//! - Token refresh: `POST {ZOHO_ACCOUNTS_HOST}/oauth/v2/token` with a refresh token
//!
//! Products are matched on `Mfg_Part_Number`, which holds the SKU. Deals
//! carry their line items in the `Subform_1` subform.

mod auth;
mod client;
mod payload;

pub use auth::{ZohoToken, refresh_access_token, token_endpoint};
pub use client::ZohoClient;
pub use payload::{consignee_picklist, fulfillment_picklist};

/// Path of the CRM v2 API relative to the API host.
const API_VERSION_PATH: &str = "crm/v2/";
