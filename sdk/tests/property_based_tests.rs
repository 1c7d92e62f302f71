use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration as ChronoDuration, Utc};
use proptest::prelude::*;
use sdk::auth::{AuthError, AuthenticationToken, Secret, jwt};
use sdk::environment::{EnvironmentName, PartnerEnvironment};

fn synthesize_jwt(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
    format!("{header}.{body}.signature")
}

proptest! {
    /// Claims embedded in a well-formed compact JWS always survive the
    /// local read unchanged.
    #[test]
    fn jwt_claims_round_trip(
        oid in "[a-zA-Z0-9-]{1,64}",
        tid in "[a-zA-Z0-9-]{1,64}",
        exp in 1i64..4_000_000_000i64,
    ) {
        let token = synthesize_jwt(&serde_json::json!({
            "oid": oid,
            "tid": tid,
            "exp": exp,
        }));

        let claims = jwt::read_claims(&token).unwrap();
        prop_assert_eq!(claims.user_id.as_deref(), Some(oid.as_str()));
        prop_assert_eq!(claims.tenant_id.as_deref(), Some(tid.as_str()));
        prop_assert_eq!(claims.expires_on.timestamp(), exp);
    }

    /// Tokens missing the exp claim are rejected for every oid/tid shape.
    #[test]
    fn jwt_without_exp_is_always_malformed(
        oid in "[a-zA-Z0-9-]{1,64}",
        tid in "[a-zA-Z0-9-]{1,64}",
    ) {
        let token = synthesize_jwt(&serde_json::json!({ "oid": oid, "tid": tid }));
        prop_assert!(
            matches!(
                jwt::read_claims(&token),
                Err(AuthError::MalformedToken { .. })
            ),
            "token without exp claim should be rejected as malformed"
        );
    }

    /// Arbitrary junk never panics the claim reader.
    #[test]
    fn jwt_reader_never_panics(raw in ".{0,256}") {
        let _ = jwt::read_claims(&raw);
    }

    /// Environment lookup fails cleanly for every unregistered name.
    #[test]
    fn environment_lookup_never_panics(name in ".{0,64}") {
        let known = [
            "global_cloud",
            "china_cloud",
            "german_cloud",
            "us_government",
        ];
        let result = PartnerEnvironment::lookup_by_name(&name);
        prop_assert_eq!(result.is_ok(), known.contains(&name.as_str()));
    }

    /// Secrets are redacted from debug output no matter their content.
    #[test]
    fn secret_debug_is_always_redacted(value in ".{1,128}") {
        let secret = Secret::new(value);
        prop_assert_eq!(format!("{:?}", secret), "Secret(***)");
    }

    /// The refresh buffer flags tokens inside the 5-minute window and
    /// leaves comfortably fresh tokens alone.
    #[test]
    fn refresh_buffer_respects_the_five_minute_window(lifetime_secs in 400i64..86_400i64) {
        let fresh = AuthenticationToken::new(
            "token",
            Utc::now() + ChronoDuration::seconds(lifetime_secs),
        );
        prop_assert!(!fresh.needs_refresh());

        let stale = AuthenticationToken::new(
            "token",
            Utc::now() + ChronoDuration::seconds(200),
        );
        prop_assert!(stale.needs_refresh());
    }
}

#[test]
fn every_environment_name_round_trips_through_display() {
    for name in [
        EnvironmentName::GlobalCloud,
        EnvironmentName::ChinaCloud,
        EnvironmentName::GermanCloud,
        EnvironmentName::UsGovernment,
    ] {
        let parsed: EnvironmentName = name.to_string().parse().unwrap();
        assert_eq!(parsed, name);
    }
}
