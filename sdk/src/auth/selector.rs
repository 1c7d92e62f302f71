//! The authentication selector.
//!
//! [`Authenticator::authenticate`] inspects a [`CredentialContext`] and the
//! session state, picks one of the supported token-acquisition strategies,
//! and drives the corresponding grant against the identity authority.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::Mutex;

use super::authority::{Authority, TokenGrant};
use super::clock::Clock;
use super::errors::AuthError;
use super::interactive::InteractiveFlow;
use super::jwt;
use super::session::SessionManager;
use super::types::{
    AccountType, AuthenticationToken, CredentialContext, DebugSink, PromptSink, Secret,
};
use crate::environment::PartnerEnvironment;

/// Builds an [`AuthenticationToken`] from a grant, anchoring the relative
/// lifetime the authority stated to an absolute instant.
fn token_from_grant(grant: &TokenGrant, now: DateTime<Utc>) -> AuthenticationToken {
    AuthenticationToken {
        value: grant.access_token.clone(),
        expires_on: now + ChronoDuration::seconds(grant.expires_in as i64),
        tenant_id: grant.tenant_id.clone(),
        user_id: grant.user_id.clone(),
    }
}

/// Selects and runs the token-acquisition strategy for a credential
/// context.
///
/// The authority, the interactive flow variant, the clock, and the session
/// handle are all injected by the host; the selector owns no ambient
/// state. Whole authentication attempts are serialized through an internal
/// gate, so two concurrent callers never race their writes to the session.
pub struct Authenticator {
    authority: Arc<dyn Authority>,
    interactive: Arc<dyn InteractiveFlow>,
    clock: Arc<dyn Clock>,
    session: Arc<SessionManager>,
    attempt_gate: Mutex<()>,
}

impl Authenticator {
    pub fn new(
        authority: Arc<dyn Authority>,
        interactive: Arc<dyn InteractiveFlow>,
        clock: Arc<dyn Clock>,
        session: Arc<SessionManager>,
    ) -> Self {
        Self {
            authority,
            interactive,
            clock,
            session,
            attempt_gate: Mutex::new(()),
        }
    }

    /// The session handle this authenticator was built with.
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Acquires a Partner Center token for the supplied context.
    ///
    /// Strategy selection is ordered, first match wins:
    ///
    /// 1. [`AccountType::AccessToken`] - the supplied token is parsed
    ///    locally; no authority call is made and the session is untouched.
    /// 2. [`AccountType::ServicePrincipal`] - client-credentials exchange
    ///    against the tenant authority. A service principal always
    ///    re-exchanges: an existing session is deliberately never consulted
    ///    for silent reuse.
    /// 3. [`AccountType::RefreshToken`] - the supplied refresh token is
    ///    redeemed non-interactively.
    /// 4. [`AccountType::User`] with no active session - first use; the
    ///    injected interactive flow prompts the user through `prompt`.
    /// 5. [`AccountType::User`] with an active session - silent
    ///    reacquisition with the cached user identifier. On
    ///    [`AuthError::SilentAuthenticationFailed`] the caller may clear
    ///    the session and retry to fall back to the interactive flow.
    ///
    /// Every branch reports the chosen strategy through `debug`; credential
    /// material never appears in the trace.
    pub async fn authenticate(
        &self,
        context: &CredentialContext,
        debug: &DebugSink,
        prompt: Option<&PromptSink>,
    ) -> Result<AuthenticationToken, AuthError> {
        let _attempt = self.attempt_gate.lock().await;

        let environment = PartnerEnvironment::lookup(context.environment)?;
        let authority_url = environment.authority_url(context.tenant());

        match context.account_type {
            AccountType::AccessToken => self.with_access_token(context, debug),
            AccountType::ServicePrincipal => {
                self.with_service_principal(context, environment, &authority_url, debug)
                    .await
            }
            AccountType::RefreshToken => {
                self.with_refresh_token(context, environment, &authority_url, debug)
                    .await
            }
            AccountType::User => {
                if self.session.is_active().await {
                    self.silently(context, environment, &authority_url, debug).await
                } else {
                    self.interactively(context, environment, &authority_url, debug, prompt)
                        .await
                }
            }
        }
    }

    fn with_access_token(
        &self,
        context: &CredentialContext,
        debug: &DebugSink,
    ) -> Result<AuthenticationToken, AuthError> {
        debug("Attempting to authenticate using an access token.");
        log::debug!("Authentication strategy: caller-supplied access token");

        let raw = context.secret()?.expose();
        let claims = jwt::read_claims(raw)?;

        if let Some(user_id) = &claims.user_id {
            debug(&format!(
                "The object identifier {user_id} was found in the claims associated with the token."
            ));
        }
        if let Some(tenant_id) = &claims.tenant_id {
            debug(&format!(
                "The tenant identifier {tenant_id} was found in the claims associated with the token."
            ));
        }
        debug(&format!(
            "The specified access token expires on {}.",
            claims.expires_on
        ));

        Ok(AuthenticationToken {
            value: raw.to_string(),
            expires_on: claims.expires_on,
            tenant_id: claims.tenant_id,
            user_id: claims.user_id,
        })
    }

    async fn with_service_principal(
        &self,
        context: &CredentialContext,
        environment: &PartnerEnvironment,
        authority_url: &str,
        debug: &DebugSink,
    ) -> Result<AuthenticationToken, AuthError> {
        debug(
            "Attempting to authenticate using a service principal. Please note not all operations support this type of authentication.",
        );
        log::debug!("Authentication strategy: service principal client-credentials exchange");

        let grant = self
            .authority
            .acquire_token_by_client_secret(
                authority_url,
                environment.graph_endpoint,
                context.application_id()?,
                context.secret()?,
            )
            .await?;

        self.complete_grant(context, grant).await
    }

    async fn with_refresh_token(
        &self,
        context: &CredentialContext,
        environment: &PartnerEnvironment,
        authority_url: &str,
        debug: &DebugSink,
    ) -> Result<AuthenticationToken, AuthError> {
        debug("Attempting to authenticate using a refresh token.");
        log::debug!("Authentication strategy: refresh token exchange");

        let grant = self
            .authority
            .acquire_token_by_refresh_token(
                authority_url,
                environment.partner_center_endpoint,
                context.secret()?,
                context.application_id()?,
                None,
            )
            .await?;

        self.complete_grant(context, grant).await
    }

    async fn interactively(
        &self,
        context: &CredentialContext,
        environment: &PartnerEnvironment,
        authority_url: &str,
        debug: &DebugSink,
        prompt: Option<&PromptSink>,
    ) -> Result<AuthenticationToken, AuthError> {
        match self.interactive.kind() {
            "browser" => debug("Attempting to authenticate by prompting for credentials."),
            _ => debug("Attempting to authenticate using the device code flow."),
        }
        log::debug!(
            "Authentication strategy: interactive first use via the {} flow",
            self.interactive.kind()
        );

        let grant = self
            .interactive
            .acquire(
                self.authority.as_ref(),
                authority_url,
                environment.partner_center_endpoint,
                context.application_id()?,
                context.secret.as_ref(),
                self.clock.as_ref(),
                prompt,
            )
            .await?;

        self.complete_grant(context, grant).await
    }

    async fn silently(
        &self,
        context: &CredentialContext,
        environment: &PartnerEnvironment,
        authority_url: &str,
        debug: &DebugSink,
    ) -> Result<AuthenticationToken, AuthError> {
        debug("Attempting to acquire a token silently using the cached account.");
        log::debug!("Authentication strategy: silent reacquisition from the active session");

        let session = self.session.get_active().await.ok_or_else(|| {
            AuthError::SilentAuthenticationFailed {
                reason: "the active session ended before the attempt started".to_string(),
            }
        })?;

        let user_id = session
            .context
            .user_id
            .as_deref()
            .or(session.token.user_id.as_deref())
            .ok_or_else(|| AuthError::SilentAuthenticationFailed {
                reason: "the active session does not identify a user".to_string(),
            })?
            .to_string();

        let grant = self
            .authority
            .acquire_token_silent(
                authority_url,
                environment.partner_center_endpoint,
                context.application_id()?,
                &user_id,
            )
            .await?;

        self.complete_grant(context, grant).await
    }

    /// Records the identifiers the authority resolved during the exchange
    /// and installs the new session. The tenant in particular may only
    /// become known here, when the common endpoint resolves to the
    /// caller's actual tenant.
    async fn complete_grant(
        &self,
        context: &CredentialContext,
        grant: TokenGrant,
    ) -> Result<AuthenticationToken, AuthError> {
        let token = token_from_grant(&grant, self.clock.now());

        let mut resolved = context.clone();
        if let Some(tenant_id) = &grant.tenant_id {
            resolved.tenant_id = Some(tenant_id.clone());
        }
        if let Some(user_id) = &grant.user_id {
            resolved.user_id = Some(user_id.clone());
        }
        if let Some(user_display) = &grant.user_display {
            resolved.user_display = Some(user_display.clone());
        }

        self.session.set_active(resolved, token.clone()).await;

        Ok(token)
    }
}

/// A refreshed access token together with the rotated refresh token, when
/// the authority returned one.
#[derive(Debug)]
pub struct RefreshedToken {
    pub token: AuthenticationToken,
    pub refresh_token: Option<Secret>,
}

/// Exchanges a refresh token for a new access token.
///
/// Separate entry point from [`Authenticator::authenticate`]: a single
/// non-interactive grant with no session involvement, usable by hosts that
/// manage refresh tokens themselves.
///
/// # Errors
///
/// Returns [`AuthError::RefreshTokenInvalid`] when the authority rejects
/// the token (expired or revoked), or [`AuthError::RequestFailed`] when the
/// authority cannot be reached.
pub async fn refresh_access_token(
    authority: &dyn Authority,
    authority_url: &str,
    resource: &str,
    refresh_token: &Secret,
    client_id: &str,
    secret: Option<&Secret>,
) -> Result<RefreshedToken, AuthError> {
    log::debug!("Exchanging a refresh token against {authority_url}");

    let grant = authority
        .acquire_token_by_refresh_token(authority_url, resource, refresh_token, client_id, secret)
        .await?;

    Ok(RefreshedToken {
        token: token_from_grant(&grant, Utc::now()),
        refresh_token: grant.refresh_token.clone().map(Secret::new),
    })
}
