use std::fmt;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

use super::errors::AuthError;
use crate::environment::EnvironmentName;

/// Sentinel tenant used when a credential context does not pin a tenant.
///
/// Azure AD resolves the `common` endpoint to the caller's home tenant
/// during authentication, which is why the session records the actual
/// tenant only after a successful exchange.
pub const COMMON_TENANT: &str = "common";

/// Sink for the human-readable trace lines the selector emits while an
/// authentication strategy runs.
pub type DebugSink = dyn Fn(&str) + Send + Sync;

/// Sink for user-facing prompts, such as device code sign-in instructions.
pub type PromptSink = dyn Fn(&str) + Send + Sync;

/// Account types supported when authenticating against Partner Center.
///
/// Exactly one account type drives an authentication attempt, and the
/// meaning of [`CredentialContext::secret`] depends on it: a service
/// principal secret, a raw bearer token, or a refresh token.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Interactive or silent user authentication
    User,
    /// Confidential client using a client secret
    ServicePrincipal,
    /// A caller-supplied bearer token, parsed locally
    AccessToken,
    /// A caller-supplied refresh token, redeemed non-interactively
    RefreshToken,
}

/// An opaque credential value that is zeroized on drop and redacted from
/// all diagnostic output.
#[derive(Clone, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrows the underlying credential for use in a grant exchange.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Everything needed to describe a single authentication attempt.
///
/// A context is supplied by the caller per attempt; the selector treats it
/// as immutable input and writes the account identifiers learned from the
/// authority (tenant, user id, display name) into the copy stored on the
/// session.
///
/// # Examples
///
/// ```no_run
/// use sdk::auth::{AccountType, CredentialContext, Secret};
/// use sdk::environment::EnvironmentName;
///
/// let mut context =
///     CredentialContext::new(AccountType::ServicePrincipal, EnvironmentName::GlobalCloud);
/// context.tenant_id = Some("contoso.onmicrosoft.com".to_string());
/// context.application_id = Some("00000000-0000-0000-0000-000000000000".to_string());
/// context.secret = Some(Secret::new("client-secret"));
/// ```
#[derive(Clone, Debug)]
pub struct CredentialContext {
    /// The account type driving this attempt
    pub account_type: AccountType,
    /// Target cloud environment
    pub environment: EnvironmentName,
    /// Azure AD tenant; [`COMMON_TENANT`] is used when absent
    pub tenant_id: Option<String>,
    /// Application (client) ID; required for interactive and device flows,
    /// and the client id of the principal for service principal attempts
    pub application_id: Option<String>,
    /// Credential material; semantics depend on [`AccountType`]
    pub secret: Option<Secret>,
    /// Object id of the signed-in user, learned from the authority
    pub user_id: Option<String>,
    /// Displayable name of the signed-in user, learned from the authority
    pub user_display: Option<String>,
}

impl CredentialContext {
    pub fn new(account_type: AccountType, environment: EnvironmentName) -> Self {
        Self {
            account_type,
            environment,
            tenant_id: None,
            application_id: None,
            secret: None,
            user_id: None,
            user_display: None,
        }
    }

    /// The tenant to authenticate against, defaulting to the common
    /// endpoint when no tenant is pinned.
    pub fn tenant(&self) -> &str {
        self.tenant_id.as_deref().unwrap_or(COMMON_TENANT)
    }

    pub(crate) fn application_id(&self) -> Result<&str, AuthError> {
        self.application_id.as_deref().ok_or_else(|| {
            AuthError::ConfigurationError(
                "an application (client) ID is required for this account type".to_string(),
            )
        })
    }

    pub(crate) fn secret(&self) -> Result<&Secret, AuthError> {
        self.secret.as_ref().ok_or_else(|| {
            AuthError::ConfigurationError(
                "a credential secret is required for this account type".to_string(),
            )
        })
    }
}

/// A bearer token returned by a successful authentication attempt.
///
/// Tokens are never mutated once issued; a refreshed token replaces the
/// previous one wholesale on the session.
#[derive(Clone)]
pub struct AuthenticationToken {
    /// The opaque bearer string presented to the Partner Center API
    pub value: String,
    /// Absolute expiration instant reported by the authority
    pub expires_on: DateTime<Utc>,
    /// Tenant the token was issued for, when known
    pub tenant_id: Option<String>,
    /// Object id of the authenticated user, when known
    pub user_id: Option<String>,
}

impl AuthenticationToken {
    pub fn new(value: impl Into<String>, expires_on: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_on,
            tenant_id: None,
            user_id: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_on
    }

    /// Whether the token is inside the 5-minute window where it should be
    /// replaced before it actually expires.
    pub fn needs_refresh(&self) -> bool {
        Utc::now() + ChronoDuration::seconds(300) >= self.expires_on
    }
}

impl fmt::Debug for AuthenticationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationToken")
            .field("value", &"***")
            .field("expires_on", &self.expires_on)
            .field("tenant_id", &self.tenant_id)
            .field("user_id", &self.user_id)
            .finish()
    }
}
