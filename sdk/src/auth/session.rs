use tokio::sync::RwLock;

use super::types::{AuthenticationToken, CredentialContext};

/// The active authenticated context and its most recent token.
///
/// A session is only ever replaced wholesale, so the pair is always
/// internally consistent: the token was issued for exactly the context it
/// is stored with.
#[derive(Clone, Debug)]
pub struct Session {
    pub context: CredentialContext,
    pub token: AuthenticationToken,
}

/// Holder of the at-most-one active session per process.
///
/// The top-level host owns one `SessionManager` (typically behind an
/// `Arc`) and injects it into the [`Authenticator`](super::Authenticator);
/// nothing in the SDK reaches for ambient global state. Reads return a
/// cloned snapshot; writes replace the whole `(context, token)` pair under
/// a single write lock so concurrent readers never observe a torn pair.
pub struct SessionManager {
    inner: RwLock<Option<Session>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    /// Returns a consistent snapshot of the active session, if any.
    pub async fn get_active(&self) -> Option<Session> {
        self.inner.read().await.clone()
    }

    /// Installs a new active session, replacing any previous one.
    pub async fn set_active(&self, context: CredentialContext, token: AuthenticationToken) {
        let mut active = self.inner.write().await;
        if active.is_some() {
            log::debug!("Replacing the active Partner Center session");
        }
        *active = Some(Session { context, token });
    }

    /// Clears the active session (logout).
    pub async fn clear(&self) {
        let mut active = self.inner.write().await;
        if active.take().is_some() {
            log::info!("Partner Center session cleared");
        }
    }

    pub async fn is_active(&self) -> bool {
        self.inner.read().await.is_some()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
