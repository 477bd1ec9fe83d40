//! Zoho OAuth token handling.
//!
//! The synchronizer holds a long-lived refresh token and exchanges it for
//! short-lived access tokens on demand.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;
use url::Url;

use crate::config::ZohoConfig;
use crate::error::CrmError;

/// Lifetime assumed for an access token supplied through the environment.
const ASSUMED_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Access token obtained from the Zoho accounts server.
#[derive(Debug, Clone)]
pub struct ZohoToken {
    pub access_token: SecretString,
    /// Unix timestamp when the access token expires.
    pub expires_at: i64,
}

impl ZohoToken {
    /// Wrap a token that was issued outside this process.
    #[must_use]
    pub fn preissued(access_token: SecretString) -> Self {
        Self {
            access_token,
            expires_at: chrono::Utc::now().timestamp() + ASSUMED_TOKEN_LIFETIME_SECS,
        }
    }

    /// Check if the access token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        // Less than 60 seconds left counts as expired
        now >= self.expires_at - 60
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    /// Zoho reports grant failures with HTTP 200 and this field set.
    #[serde(default)]
    error: Option<String>,
}

/// Token endpoint on the given accounts host.
///
/// # Errors
///
/// Returns `CrmError::Parse` if the host cannot be joined with the path.
pub fn token_endpoint(accounts_host: &Url) -> Result<Url, CrmError> {
    accounts_host
        .join("oauth/v2/token")
        .map_err(|e| CrmError::Parse(format!("invalid accounts host: {e}")))
}

/// Exchange the configured refresh token for a new access token.
///
/// # Errors
///
/// Returns `CrmError::Unauthorized` if Zoho rejects the grant, or an HTTP
/// error if the accounts server cannot be reached.
#[instrument(skip(client, config), fields(client_id = %config.client_id))]
pub async fn refresh_access_token(
    client: &reqwest::Client,
    config: &ZohoConfig,
) -> Result<ZohoToken, CrmError> {
    let now = chrono::Utc::now().timestamp();

    let response = client
        .post(token_endpoint(&config.accounts_host)?)
        .form(&[
            ("grant_type", "refresh_token"),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.expose_secret()),
            ("refresh_token", config.refresh_token.expose_secret()),
        ])
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(CrmError::Unauthorized(format!(
            "Token refresh failed: HTTP {status}: {body}"
        )));
    }

    parse_token_response(&body, now)
}

fn parse_token_response(body: &str, now: i64) -> Result<ZohoToken, CrmError> {
    let response: TokenResponse =
        serde_json::from_str(body).map_err(|e| CrmError::Parse(e.to_string()))?;

    if let Some(error) = response.error {
        return Err(CrmError::Unauthorized(format!("Token refresh failed: {error}")));
    }

    let access_token = response
        .access_token
        .ok_or_else(|| CrmError::Parse("token response has no access_token".to_string()))?;

    Ok(ZohoToken {
        access_token: SecretString::from(access_token),
        expires_at: now + response.expires_in.unwrap_or(ASSUMED_TOKEN_LIFETIME_SECS),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_expired() {
        let now = chrono::Utc::now().timestamp();

        let expired = ZohoToken {
            access_token: SecretString::from("test"),
            expires_at: now - 3600,
        };
        assert!(expired.is_expired());

        let valid = ZohoToken {
            access_token: SecretString::from("test"),
            expires_at: now + 3600,
        };
        assert!(!valid.is_expired());

        // Inside the 60s buffer
        let almost = ZohoToken {
            access_token: SecretString::from("test"),
            expires_at: now + 30,
        };
        assert!(almost.is_expired());
    }

    #[test]
    fn test_preissued_token_is_fresh() {
        assert!(!ZohoToken::preissued(SecretString::from("test")).is_expired());
    }

    #[test]
    fn test_parse_token_response() {
        let token = parse_token_response(
            r#"{"access_token":"1000.abc","api_domain":"https://www.zohoapis.com","token_type":"Bearer","expires_in":3600}"#,
            1_000,
        )
        .unwrap();
        assert_eq!(token.access_token.expose_secret(), "1000.abc");
        assert_eq!(token.expires_at, 4_600);
    }

    #[test]
    fn test_grant_error_in_ok_body() {
        let err = parse_token_response(r#"{"error":"invalid_code"}"#, 0).unwrap_err();
        assert!(matches!(err, CrmError::Unauthorized(ref msg) if msg.contains("invalid_code")));
    }

    #[test]
    fn test_token_endpoint() {
        let host = Url::parse("https://accounts.zoho.com").unwrap();
        assert_eq!(
            token_endpoint(&host).unwrap().as_str(),
            "https://accounts.zoho.com/oauth/v2/token"
        );
    }
}
