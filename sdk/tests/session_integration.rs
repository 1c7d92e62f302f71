use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use claims::{assert_none, assert_some};
use sdk::auth::{AccountType, AuthenticationToken, CredentialContext, SessionManager};
use sdk::environment::EnvironmentName;

mod session_helpers {
    use super::*;

    /// Context and token stamped with the same marker, so a reader can
    /// tell whether a snapshot mixes two writers.
    pub fn tagged_pair(tag: &str) -> (CredentialContext, AuthenticationToken) {
        let mut context = CredentialContext::new(AccountType::User, EnvironmentName::GlobalCloud);
        context.tenant_id = Some(tag.to_string());

        let mut token =
            AuthenticationToken::new(format!("token-{tag}"), Utc::now() + ChronoDuration::hours(1));
        token.tenant_id = Some(tag.to_string());

        (context, token)
    }
}

use session_helpers::*;

#[tokio::test]
async fn set_clear_and_snapshot_round_trip() {
    let manager = SessionManager::new();
    assert_none!(manager.get_active().await);
    assert!(!manager.is_active().await);

    let (context, token) = tagged_pair("contoso");
    manager.set_active(context, token).await;

    let session = assert_some!(manager.get_active().await);
    assert_eq!(session.context.tenant_id.as_deref(), Some("contoso"));
    assert_eq!(session.token.tenant_id.as_deref(), Some("contoso"));

    manager.clear().await;
    assert_none!(manager.get_active().await);
}

#[tokio::test]
async fn replacing_the_session_swaps_the_whole_pair() {
    let manager = SessionManager::new();

    let (context, token) = tagged_pair("first");
    manager.set_active(context, token).await;
    let (context, token) = tagged_pair("second");
    manager.set_active(context, token).await;

    let session = assert_some!(manager.get_active().await);
    assert_eq!(session.context.tenant_id.as_deref(), Some("second"));
    assert_eq!(session.token.value, "token-second");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_never_produce_a_torn_session() {
    let manager = Arc::new(SessionManager::new());

    let writers: Vec<_> = ["attempt-a", "attempt-b"]
        .into_iter()
        .map(|tag| {
            let manager = manager.clone();
            tokio::spawn(async move {
                for _ in 0..250 {
                    let (context, token) = tagged_pair(tag);
                    manager.set_active(context, token).await;
                }
            })
        })
        .collect();

    let reader = {
        let manager = manager.clone();
        tokio::spawn(async move {
            for _ in 0..500 {
                if let Some(session) = manager.get_active().await {
                    // Token and context must come from the same attempt.
                    assert_eq!(
                        session.context.tenant_id, session.token.tenant_id,
                        "observed a session mixing two attempts"
                    );
                }
                tokio::task::yield_now().await;
            }
        })
    };

    for writer in writers {
        writer.await.unwrap();
    }
    reader.await.unwrap();
}
