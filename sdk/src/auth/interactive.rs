//! Interactive sign-in flows.
//!
//! The device code and browser variants are runtime implementations of one
//! [`InteractiveFlow`] capability; the host picks a variant at startup via
//! [`detect_interactive_flow`] based on what it can actually show the user.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;

use super::authority::{Authority, DevicePoll, TokenGrant};
use super::clock::Clock;
use super::errors::AuthError;
use super::types::{PromptSink, Secret};

/// OAuth2 out-of-band redirect URI used by the browser flow.
pub const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Extra wait added to the polling interval when the authority answers
/// `slow_down`, per the device code grant contract.
const SLOW_DOWN_BACKOFF: Duration = Duration::from_secs(5);

/// A first-use interactive token acquisition.
///
/// This is the only capability in the SDK allowed to block on human input.
#[async_trait]
pub trait InteractiveFlow: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn acquire(
        &self,
        authority: &dyn Authority,
        authority_url: &str,
        resource: &str,
        client_id: &str,
        secret: Option<&Secret>,
        clock: &dyn Clock,
        prompt: Option<&PromptSink>,
    ) -> Result<TokenGrant, AuthError>;

    /// Short name used in selector trace output.
    fn kind(&self) -> &'static str;
}

/// Host-provided surface that completes a browser sign-in and returns the
/// authorization code from the redirect.
///
/// Returning `Ok(None)` means the user cancelled the sign-in (closed the
/// dialog or navigated away).
#[async_trait]
pub trait BrowserSurface: Send + Sync {
    async fn authorize(&self, authorize_url: &str) -> Result<Option<String>, AuthError>;
}

/// Capabilities of the hosting process, detected at startup.
#[derive(Clone, Default)]
pub struct HostCapabilities {
    /// A browser/dialog surface, when the host can show one
    pub browser: Option<Arc<dyn BrowserSurface>>,
}

/// Picks the interactive flow variant the host can actually drive.
pub fn detect_interactive_flow(capabilities: &HostCapabilities) -> Arc<dyn InteractiveFlow> {
    match &capabilities.browser {
        Some(surface) => {
            log::debug!("Host provides a browser surface; using the browser sign-in flow");
            Arc::new(BrowserFlow::new(surface.clone()))
        }
        None => {
            log::debug!("No browser surface available; using the device code flow");
            Arc::new(DeviceCodeFlow)
        }
    }
}

/// Device code grant: display the verification instructions, then poll the
/// authority until the user completes sign-in or the code expires.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeviceCodeFlow;

#[async_trait]
impl InteractiveFlow for DeviceCodeFlow {
    async fn acquire(
        &self,
        authority: &dyn Authority,
        authority_url: &str,
        resource: &str,
        client_id: &str,
        secret: Option<&Secret>,
        clock: &dyn Clock,
        prompt: Option<&PromptSink>,
    ) -> Result<TokenGrant, AuthError> {
        let prompt = prompt.ok_or_else(|| AuthError::UserInteractionRequired {
            reason: "a prompt callback is required to display the device code instructions"
                .to_string(),
        })?;

        let ticket = authority
            .begin_device_code(authority_url, resource, client_id)
            .await?;

        log::info!("Device code authentication initiated - awaiting user action");
        prompt(&ticket.message);

        let mut interval = Duration::from_secs(ticket.interval);
        let deadline = clock.now() + ChronoDuration::seconds(ticket.expires_in as i64);

        loop {
            if clock.now() >= deadline {
                return Err(AuthError::DeviceCodeExpired);
            }

            clock.sleep(interval).await;

            match authority
                .poll_device_code(authority_url, client_id, &ticket.device_code, secret)
                .await?
            {
                DevicePoll::Granted(grant) => return Ok(grant),
                DevicePoll::Pending => {
                    log::debug!("Waiting for user to complete authentication");
                }
                DevicePoll::SlowDown => {
                    log::debug!("Polling too frequently, increasing interval");
                    interval += SLOW_DOWN_BACKOFF;
                }
                DevicePoll::Expired => return Err(AuthError::DeviceCodeExpired),
                DevicePoll::Denied(reason) => {
                    return Err(AuthError::AuthenticationDenied { reason });
                }
            }
        }
    }

    fn kind(&self) -> &'static str {
        "device_code"
    }
}

/// Browser grant: hand the authorize URL to the host's browser surface and
/// redeem the authorization code it returns.
pub struct BrowserFlow {
    surface: Arc<dyn BrowserSurface>,
}

impl BrowserFlow {
    pub fn new(surface: Arc<dyn BrowserSurface>) -> Self {
        Self { surface }
    }

    fn authorize_url(authority_url: &str, resource: &str, client_id: &str) -> String {
        format!(
            "{}/oauth2/authorize?resource={}&client_id={}&response_type=code&redirect_uri={}&prompt=login",
            authority_url.trim_end_matches('/'),
            urlencoding::encode(resource),
            client_id,
            urlencoding::encode(OOB_REDIRECT_URI),
        )
    }
}

#[async_trait]
impl InteractiveFlow for BrowserFlow {
    async fn acquire(
        &self,
        authority: &dyn Authority,
        authority_url: &str,
        resource: &str,
        client_id: &str,
        secret: Option<&Secret>,
        _clock: &dyn Clock,
        _prompt: Option<&PromptSink>,
    ) -> Result<TokenGrant, AuthError> {
        let authorize_url = Self::authorize_url(authority_url, resource, client_id);

        let code = self
            .surface
            .authorize(&authorize_url)
            .await?
            .ok_or_else(|| AuthError::UserInteractionRequired {
                reason: "the interactive sign-in was cancelled before completion".to_string(),
            })?;

        authority
            .acquire_token_by_authorization_code(
                authority_url,
                resource,
                OOB_REDIRECT_URI,
                &code,
                client_id,
                secret,
            )
            .await
    }

    fn kind(&self) -> &'static str {
        "browser"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_percent_encodes_query_values() {
        let url = BrowserFlow::authorize_url(
            "https://login.microsoftonline.com/common",
            "https://api.partnercenter.microsoft.com",
            "client-id",
        );
        assert!(url.starts_with("https://login.microsoftonline.com/common/oauth2/authorize?"));
        assert!(url.contains("resource=https%3A%2F%2Fapi.partnercenter.microsoft.com"));
        assert!(url.contains("redirect_uri=urn%3Aietf%3Awg%3Aoauth%3A2.0%3Aoob"));
        assert!(url.contains("prompt=login"));
    }
}
