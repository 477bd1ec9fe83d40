//! Zoho CRM REST client.

use std::sync::Arc;
use std::time::Duration;

use fulfillment_core::{CrmDealId, CrmProductId};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use url::Url;

use super::API_VERSION_PATH;
use super::auth::{ZohoToken, refresh_access_token};
use super::payload::{
    ApiErrorBody, DealRecord, ProductRecord, WriteRequest, parse_search_response,
    parse_write_response,
};
use crate::config::ZohoConfig;
use crate::crm::{CrmClient, CrmProduct, NewDeal, NewProduct};
use crate::error::CrmError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Wait used when a 429 carries no `Retry-After` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Zoho CRM API client.
///
/// Holds one access token for all concurrent calls. The token is refreshed
/// when it nears expiry, and once more if Zoho rejects it mid-flight.
#[derive(Clone)]
pub struct ZohoClient {
    inner: Arc<ZohoClientInner>,
}

struct ZohoClientInner {
    client: reqwest::Client,
    config: ZohoConfig,
    base_url: Url,
    token: RwLock<Option<ZohoToken>>,
}

/// Status, headers of interest and body of a Zoho response.
#[derive(Debug)]
struct Reply {
    status: StatusCode,
    retry_after: Option<u64>,
    body: String,
}

impl Reply {
    fn is_auth_failure(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
            || ApiErrorBody::parse(&self.body).is_invalid_token()
    }

    /// Map non-success statuses onto `CrmError`.
    fn into_success(self) -> Result<Self, CrmError> {
        let status = self.status.as_u16();
        if self.status.is_success() {
            return Ok(self);
        }
        if self.status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CrmError::RateLimited(
                self.retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
            ));
        }
        if self.status.is_server_error() {
            return Err(CrmError::Server { status });
        }
        if self.status == StatusCode::UNAUTHORIZED || self.status == StatusCode::FORBIDDEN {
            return Err(CrmError::Unauthorized(self.body));
        }

        let error = ApiErrorBody::parse(&self.body);
        let message = if error.code.is_empty() {
            self.body
        } else {
            format!("{}: {}", error.code, error.message)
        };
        Err(CrmError::Api { status, message })
    }
}

impl ZohoClient {
    /// Create a new Zoho CRM client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build or the API host is
    /// not a valid base URL.
    pub fn new(config: ZohoConfig) -> Result<Self, CrmError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let base_url = config
            .api_host
            .join(API_VERSION_PATH)
            .map_err(|e| CrmError::Parse(format!("invalid API host: {e}")))?;

        let token = config.access_token.clone().map(ZohoToken::preissued);

        Ok(Self {
            inner: Arc::new(ZohoClientInner {
                client,
                config,
                base_url,
                token: RwLock::new(token),
            }),
        })
    }

    /// Base URL of the CRM API, e.g. `https://www.zohoapis.com/crm/v2/`.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, CrmError> {
        self.inner
            .base_url
            .join(path)
            .map_err(|e| CrmError::Parse(format!("invalid endpoint {path}: {e}")))
    }

    /// A usable access token, refreshing if none is held or it is expiring.
    async fn access_token(&self) -> Result<SecretString, CrmError> {
        if let Some(token) = self.inner.token.read().await.as_ref()
            && !token.is_expired()
        {
            return Ok(token.access_token.clone());
        }
        self.refresh_token(None).await
    }

    /// Refresh the shared token.
    ///
    /// When `rejected` is given and another task has already replaced that
    /// token, the newer one is returned without calling Zoho again.
    #[instrument(skip_all)]
    async fn refresh_token(&self, rejected: Option<&SecretString>) -> Result<SecretString, CrmError> {
        let mut guard = self.inner.token.write().await;

        if let Some(current) = guard.as_ref()
            && !current.is_expired()
        {
            let stale = rejected
                .is_some_and(|old| old.expose_secret() == current.access_token.expose_secret());
            if !stale {
                return Ok(current.access_token.clone());
            }
        }

        debug!("Refreshing Zoho access token");
        let token = refresh_access_token(&self.inner.client, &self.inner.config).await?;
        let access_token = token.access_token.clone();
        *guard = Some(token);
        Ok(access_token)
    }

    async fn send_once<F>(&self, build: &F, token: &SecretString) -> Result<Reply, CrmError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder + Send + Sync,
    {
        let response = build(&self.inner.client)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Zoho-oauthtoken {}", token.expose_secret()),
            )
            .send()
            .await?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok());
        let body = response.text().await?;

        Ok(Reply {
            status,
            retry_after,
            body,
        })
    }

    /// Send a request, refreshing the token and resending once if Zoho
    /// rejects it.
    async fn execute<F>(&self, build: F) -> Result<Reply, CrmError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder + Send + Sync,
    {
        let token = self.access_token().await?;
        let reply = self.send_once(&build, &token).await?;
        if !reply.is_auth_failure() {
            return Ok(reply);
        }

        warn!(status = reply.status.as_u16(), "Zoho rejected access token, refreshing");
        let token = self.refresh_token(Some(&token)).await?;
        let reply = self.send_once(&build, &token).await?;
        if reply.is_auth_failure() {
            return Err(CrmError::Unauthorized(reply.body));
        }
        Ok(reply)
    }

    /// Insert one record into `module` and return its id.
    async fn insert<T: Serialize + Send + Sync>(&self, module: &str, record: T) -> Result<String, CrmError> {
        let url = self.endpoint(module)?;
        let body = WriteRequest::single(record);
        let reply = self
            .execute(|client| client.post(url.clone()).json(&body))
            .await?;

        // Record-level failures arrive as HTTP 400 with the usual data array
        if reply.status == StatusCode::BAD_REQUEST
            && let Err(err @ (CrmError::Duplicate { .. } | CrmError::Rejected { .. })) =
                parse_write_response(&reply.body)
        {
            return Err(err);
        }

        let reply = reply.into_success()?;
        parse_write_response(&reply.body)
    }
}

/// Escape characters with meaning inside a Zoho search criteria value.
fn escape_criteria(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '(' | ')' | ',' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl CrmClient for ZohoClient {
    #[instrument(skip(self))]
    async fn find_product_by_sku(&self, sku: &str) -> Result<Option<CrmProduct>, CrmError> {
        let mut url = self.endpoint("Products/search")?;
        url.query_pairs_mut().append_pair(
            "criteria",
            &format!("(Mfg_Part_Number:equals:{})", escape_criteria(sku)),
        );

        let reply = self
            .execute(|client| client.get(url.clone()))
            .await?
            .into_success()?;

        if reply.status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        parse_search_response(&reply.body, sku)
    }

    #[instrument(skip(self, product), fields(sku = %product.sku))]
    async fn create_product(&self, product: &NewProduct) -> Result<CrmProduct, CrmError> {
        let id = self.insert("Products", ProductRecord::from(product)).await?;
        debug!(id = %id, "Zoho product created");
        Ok(CrmProduct {
            id: CrmProductId::new(id),
            sku: product.sku.clone(),
            name: product.name.clone(),
        })
    }

    #[instrument(skip(self, deal), fields(deal_name = %deal.deal_name))]
    async fn create_deal(&self, deal: &NewDeal) -> Result<CrmDealId, CrmError> {
        let id = self.insert("Deals", DealRecord::from(deal)).await?;
        debug!(id = %id, "Zoho deal created");
        Ok(CrmDealId::new(id))
    }

    #[instrument(skip(self))]
    async fn check_connection(&self) -> Result<(), CrmError> {
        let url = self.endpoint("org")?;
        self.execute(|client| client.get(url.clone()))
            .await?
            .into_success()
            .map(|_| ())
    }
}

impl std::fmt::Debug for ZohoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZohoClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("client_id", &self.inner.config.client_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> ZohoConfig {
        ZohoConfig {
            client_id: "1000.CLIENT".to_string(),
            client_secret: SecretString::from("s3cr3t"),
            refresh_token: SecretString::from("1000.refresh"),
            access_token: Some(SecretString::from("1000.access")),
            api_host: Url::parse("https://www.zohoapis.com").unwrap(),
            accounts_host: Url::parse("https://accounts.zoho.com").unwrap(),
        }
    }

    fn reply(status: u16, body: &str) -> Reply {
        Reply {
            status: StatusCode::from_u16(status).unwrap(),
            retry_after: None,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_endpoints() {
        let client = ZohoClient::new(config()).unwrap();
        assert_eq!(
            client.base_url().as_str(),
            "https://www.zohoapis.com/crm/v2/"
        );
        assert_eq!(
            client.endpoint("Products/search").unwrap().as_str(),
            "https://www.zohoapis.com/crm/v2/Products/search"
        );
    }

    #[test]
    fn test_escape_criteria() {
        assert_eq!(escape_criteria("MAG571"), "MAG571");
        assert_eq!(escape_criteria("AB(1),2"), "AB\\(1\\)\\,2");
    }

    #[test]
    fn test_reply_status_mapping() {
        let mut limited = reply(429, "");
        limited.retry_after = Some(7);
        assert!(matches!(limited.into_success(), Err(CrmError::RateLimited(7))));
        assert!(matches!(
            reply(429, "").into_success(),
            Err(CrmError::RateLimited(DEFAULT_RETRY_AFTER_SECS))
        ));
        assert!(matches!(
            reply(502, "").into_success(),
            Err(CrmError::Server { status: 502 })
        ));
        assert!(matches!(
            reply(400, r#"{"code":"INVALID_QUERY","message":"invalid query formed"}"#)
                .into_success(),
            Err(CrmError::Api { status: 400, ref message }) if message.starts_with("INVALID_QUERY")
        ));
        assert!(reply(204, "").into_success().is_ok());
    }

    #[test]
    fn test_auth_failure_detection() {
        assert!(reply(401, "").is_auth_failure());
        assert!(
            reply(200, r#"{"code":"INVALID_TOKEN","message":"invalid oauth token"}"#)
                .is_auth_failure()
        );
        assert!(!reply(200, r#"{"data":[]}"#).is_auth_failure());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let client = ZohoClient::new(config()).unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("s3cr3t"));
        assert!(!debug.contains("1000.access"));
    }
}
