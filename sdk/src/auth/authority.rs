//! The identity authority boundary.
//!
//! [`Authority`] is the seam between the authentication selector and the
//! OAuth2 token service. Each method is a single grant exchange; polling
//! loops, prompting, and session bookkeeping all live above this trait so
//! they stay testable without a network.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use tokio::sync::RwLock;

use super::errors::AuthError;
use super::jwt;
use super::types::Secret;

/// The result of a successful grant exchange.
#[derive(Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds, as stated by the authority
    pub expires_in: u64,
    pub refresh_token: Option<String>,
    /// Claims surfaced by the authority, when the token carries them
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    pub user_display: Option<String>,
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"***")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "***"))
            .field("tenant_id", &self.tenant_id)
            .field("user_id", &self.user_id)
            .field("user_display", &self.user_display)
            .finish()
    }
}

/// A started device code grant, including the user-facing instructions.
#[derive(Clone, Debug)]
pub struct DeviceCodeTicket {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    /// Seconds until the code expires
    pub expires_in: u64,
    /// Seconds the client must wait between polls
    pub interval: u64,
    pub message: String,
}

/// Outcome of a single device code poll round-trip.
#[derive(Clone, Debug)]
pub enum DevicePoll {
    Granted(TokenGrant),
    /// The user has not completed sign-in yet
    Pending,
    /// The authority asked the client to slow its polling down
    SlowDown,
    /// The device code lifetime elapsed on the authority side
    Expired,
    /// The user or the authority declined the sign-in
    Denied(String),
}

/// An OAuth2/OIDC identity authority.
///
/// Implemented over HTTP by [`AadAuthority`] and by in-memory fakes in
/// tests. Every method performs exactly one grant exchange and maps
/// authority rejections into the [`AuthError`] taxonomy.
#[async_trait]
pub trait Authority: Send + Sync {
    /// Client-credentials grant for a confidential client.
    async fn acquire_token_by_client_secret(
        &self,
        authority_url: &str,
        resource: &str,
        client_id: &str,
        secret: &Secret,
    ) -> Result<TokenGrant, AuthError>;

    /// Starts a device code grant.
    async fn begin_device_code(
        &self,
        authority_url: &str,
        resource: &str,
        client_id: &str,
    ) -> Result<DeviceCodeTicket, AuthError>;

    /// Performs one poll of a pending device code grant.
    async fn poll_device_code(
        &self,
        authority_url: &str,
        client_id: &str,
        device_code: &str,
        secret: Option<&Secret>,
    ) -> Result<DevicePoll, AuthError>;

    /// Redeems an authorization code obtained from a browser sign-in.
    async fn acquire_token_by_authorization_code(
        &self,
        authority_url: &str,
        resource: &str,
        redirect_uri: &str,
        code: &str,
        client_id: &str,
        secret: Option<&Secret>,
    ) -> Result<TokenGrant, AuthError>;

    /// Refresh-token grant.
    async fn acquire_token_by_refresh_token(
        &self,
        authority_url: &str,
        resource: &str,
        refresh_token: &Secret,
        client_id: &str,
        secret: Option<&Secret>,
    ) -> Result<TokenGrant, AuthError>;

    /// Non-interactive reacquisition for a previously signed-in user.
    async fn acquire_token_silent(
        &self,
        authority_url: &str,
        resource: &str,
        client_id: &str,
        user_id: &str,
    ) -> Result<TokenGrant, AuthError>;
}

// AAD v1 token endpoints return numeric fields as JSON strings.
fn number_like<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberLike {
        Number(u64),
        Text(String),
    }

    match NumberLike::deserialize(deserializer)? {
        NumberLike::Number(n) => Ok(n),
        NumberLike::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
    #[serde(deserialize_with = "number_like")]
    expires_in: u64,
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    #[serde(deserialize_with = "number_like")]
    expires_in: u64,
    #[serde(deserialize_with = "number_like")]
    interval: u64,
    message: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
    error_description: Option<String>,
}

/// An OAuth error body returned with a non-success status.
struct OAuthFailure {
    error: String,
    description: Option<String>,
}

impl OAuthFailure {
    fn friendly_message(&self) -> String {
        match self.error.as_str() {
            "invalid_client" => {
                "Invalid client configuration. Please check the Azure AD app registration and ensure 'Allow public client flows' is enabled."
            }
            "invalid_request" => {
                "Invalid authentication request. Please check the client ID and tenant ID."
            }
            "unauthorized_client" => {
                "This application is not authorized for the requested flow. Please check the Azure AD configuration."
            }
            "access_denied" => "Access denied. Please ensure you have the necessary permissions.",
            "expired_token" => "Authentication expired. Please try again.",
            _ => self.description.as_deref().unwrap_or(&self.error),
        }
        .to_string()
    }
}

/// Azure AD implementation of [`Authority`] over the v1 OAuth2 endpoints.
///
/// Silent reacquisition is backed by the refresh tokens returned from
/// earlier grants, keyed by user object id. The map is the explicit
/// stand-in for the vendor library's internal token cache.
pub struct AadAuthority {
    http_client: reqwest::Client,
    refresh_tokens: RwLock<HashMap<String, String>>,
}

impl AadAuthority {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            refresh_tokens: RwLock::new(HashMap::new()),
        }
    }

    fn token_endpoint(authority_url: &str) -> String {
        format!("{}/oauth2/token", authority_url.trim_end_matches('/'))
    }

    fn device_code_endpoint(authority_url: &str) -> String {
        format!("{}/oauth2/devicecode", authority_url.trim_end_matches('/'))
    }

    /// Posts a form-encoded grant request. The outer error is a transport
    /// failure; the inner `Err` is an OAuth rejection body.
    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<Result<T, OAuthFailure>, AuthError> {
        let response = self
            .http_client
            .post(url)
            .form(params)
            .send()
            .await
            .map_err(|e| AuthError::RequestFailed {
                reason: format!("failed to reach the authority at {url}: {e}"),
            })?;

        if response.status().is_success() {
            let body = response.json::<T>().await.map_err(|e| AuthError::RequestFailed {
                reason: format!("failed to parse the authority response: {e}"),
            })?;
            return Ok(Ok(body));
        }

        let failure = response
            .json::<ErrorResponse>()
            .await
            .map(|e| OAuthFailure {
                error: e.error,
                description: e.error_description,
            })
            .unwrap_or(OAuthFailure {
                error: "unknown_error".to_string(),
                description: Some("Failed to parse error response".to_string()),
            });

        Ok(Err(failure))
    }

    /// Enriches a raw token response with the claims the SDK needs and
    /// records the refresh token for later silent reacquisition.
    async fn finish_grant(&self, response: TokenResponse) -> TokenGrant {
        let claims = jwt::read_claims(&response.access_token).ok();

        let grant = TokenGrant {
            tenant_id: claims.as_ref().and_then(|c| c.tenant_id.clone()),
            user_id: claims.as_ref().and_then(|c| c.user_id.clone()),
            user_display: claims.as_ref().and_then(|c| c.user_display.clone()),
            access_token: response.access_token,
            token_type: response.token_type,
            expires_in: response.expires_in,
            refresh_token: response.refresh_token,
        };

        if let (Some(user_id), Some(refresh_token)) = (&grant.user_id, &grant.refresh_token) {
            let mut cache = self.refresh_tokens.write().await;
            cache.insert(user_id.clone(), refresh_token.clone());
        }

        grant
    }
}

#[async_trait]
impl Authority for AadAuthority {
    async fn acquire_token_by_client_secret(
        &self,
        authority_url: &str,
        resource: &str,
        client_id: &str,
        secret: &Secret,
    ) -> Result<TokenGrant, AuthError> {
        let token_url = Self::token_endpoint(authority_url);
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", secret.expose()),
            ("resource", resource),
        ];

        match self.post_form::<TokenResponse>(&token_url, &params).await? {
            Ok(response) => Ok(self.finish_grant(response).await),
            Err(failure) => Err(AuthError::AuthenticationDenied {
                reason: failure.friendly_message(),
            }),
        }
    }

    async fn begin_device_code(
        &self,
        authority_url: &str,
        resource: &str,
        client_id: &str,
    ) -> Result<DeviceCodeTicket, AuthError> {
        let device_code_url = Self::device_code_endpoint(authority_url);
        let params = [("client_id", client_id), ("resource", resource)];

        match self
            .post_form::<DeviceCodeResponse>(&device_code_url, &params)
            .await?
        {
            Ok(response) => Ok(DeviceCodeTicket {
                device_code: response.device_code,
                user_code: response.user_code,
                verification_uri: response.verification_uri,
                expires_in: response.expires_in,
                interval: response.interval,
                message: response.message,
            }),
            Err(failure) => Err(AuthError::AuthenticationDenied {
                reason: failure.friendly_message(),
            }),
        }
    }

    async fn poll_device_code(
        &self,
        authority_url: &str,
        client_id: &str,
        device_code: &str,
        secret: Option<&Secret>,
    ) -> Result<DevicePoll, AuthError> {
        let token_url = Self::token_endpoint(authority_url);
        let mut params = vec![
            ("grant_type", "device_code"),
            ("client_id", client_id),
            ("code", device_code),
        ];
        // Confidential clients include their secret when redeeming.
        if let Some(secret) = secret {
            params.push(("client_secret", secret.expose()));
        }

        match self.post_form::<TokenResponse>(&token_url, &params).await? {
            Ok(response) => Ok(DevicePoll::Granted(self.finish_grant(response).await)),
            Err(failure) => match failure.error.as_str() {
                "authorization_pending" => Ok(DevicePoll::Pending),
                "slow_down" => Ok(DevicePoll::SlowDown),
                "expired_token" | "code_expired" => Ok(DevicePoll::Expired),
                "access_denied" | "authorization_declined" => {
                    Ok(DevicePoll::Denied(failure.friendly_message()))
                }
                _ => Err(AuthError::AuthenticationDenied {
                    reason: failure.friendly_message(),
                }),
            },
        }
    }

    async fn acquire_token_by_authorization_code(
        &self,
        authority_url: &str,
        resource: &str,
        redirect_uri: &str,
        code: &str,
        client_id: &str,
        secret: Option<&Secret>,
    ) -> Result<TokenGrant, AuthError> {
        let token_url = Self::token_endpoint(authority_url);
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", client_id),
            ("resource", resource),
        ];
        if let Some(secret) = secret {
            params.push(("client_secret", secret.expose()));
        }

        match self.post_form::<TokenResponse>(&token_url, &params).await? {
            Ok(response) => Ok(self.finish_grant(response).await),
            Err(failure) => Err(AuthError::AuthenticationDenied {
                reason: failure.friendly_message(),
            }),
        }
    }

    async fn acquire_token_by_refresh_token(
        &self,
        authority_url: &str,
        resource: &str,
        refresh_token: &Secret,
        client_id: &str,
        secret: Option<&Secret>,
    ) -> Result<TokenGrant, AuthError> {
        let token_url = Self::token_endpoint(authority_url);
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.expose()),
            ("client_id", client_id),
            ("resource", resource),
        ];
        if let Some(secret) = secret {
            params.push(("client_secret", secret.expose()));
        }

        match self.post_form::<TokenResponse>(&token_url, &params).await? {
            Ok(response) => Ok(self.finish_grant(response).await),
            Err(failure) => Err(AuthError::RefreshTokenInvalid {
                reason: failure.friendly_message(),
            }),
        }
    }

    async fn acquire_token_silent(
        &self,
        authority_url: &str,
        resource: &str,
        client_id: &str,
        user_id: &str,
    ) -> Result<TokenGrant, AuthError> {
        let stored = {
            let cache = self.refresh_tokens.read().await;
            cache.get(user_id).cloned()
        };

        let Some(stored) = stored else {
            return Err(AuthError::SilentAuthenticationFailed {
                reason: "no cached credentials for the requested user; interactive sign-in is required"
                    .to_string(),
            });
        };

        log::debug!("Attempting silent token reacquisition for user {user_id}");

        let refresh_token = Secret::new(stored);
        match self
            .acquire_token_by_refresh_token(authority_url, resource, &refresh_token, client_id, None)
            .await
        {
            Ok(grant) => Ok(grant),
            Err(AuthError::RefreshTokenInvalid { reason }) => {
                // The stored credential is dead; drop it so the next attempt
                // goes interactive instead of failing the same way again.
                let mut cache = self.refresh_tokens.write().await;
                cache.remove(user_id);
                Err(AuthError::SilentAuthenticationFailed { reason })
            }
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_tolerate_trailing_slash() {
        assert_eq!(
            AadAuthority::token_endpoint("https://login.microsoftonline.com/contoso/"),
            "https://login.microsoftonline.com/contoso/oauth2/token"
        );
        assert_eq!(
            AadAuthority::device_code_endpoint("https://login.microsoftonline.com/contoso"),
            "https://login.microsoftonline.com/contoso/oauth2/devicecode"
        );
    }

    #[test]
    fn token_response_accepts_string_numbers() {
        let body = r#"{
            "access_token": "token",
            "token_type": "Bearer",
            "expires_in": "3599",
            "refresh_token": "refresh"
        }"#;
        let parsed: TokenResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.expires_in, 3599);
    }

    #[test]
    fn friendly_messages_cover_known_error_codes() {
        let failure = OAuthFailure {
            error: "invalid_client".to_string(),
            description: None,
        };
        assert!(failure.friendly_message().contains("Allow public client flows"));

        let unknown = OAuthFailure {
            error: "interaction_required".to_string(),
            description: Some("AADSTS50079: user must enroll".to_string()),
        };
        assert_eq!(unknown.friendly_message(), "AADSTS50079: user must enroll");
    }
}
