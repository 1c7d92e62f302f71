//! Local reading of compact JWS claims.
//!
//! Access token branches never call the network; the claims needed by the
//! SDK (`oid`, `tid`, `exp`, `upn`) are read straight out of the token
//! payload. No signature verification happens here — the token is either
//! caller-supplied or was just issued by the authority over TLS.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeZone, Utc};

use super::errors::AuthError;

/// Claims extracted from a bearer token payload.
#[derive(Clone, Debug)]
pub struct TokenClaims {
    /// `oid` — object id of the authenticated user
    pub user_id: Option<String>,
    /// `tid` — tenant the token was issued for
    pub tenant_id: Option<String>,
    /// `exp` — absolute expiration instant
    pub expires_on: DateTime<Utc>,
    /// `upn` or `unique_name` — displayable account name
    pub user_display: Option<String>,
}

/// Reads the claims of a compact-serialized JWS.
///
/// # Errors
///
/// Returns [`AuthError::MalformedToken`] when the token is not a
/// three-segment compact JWS, the payload is not base64url JSON, or the
/// required `exp` claim is missing.
pub fn read_claims(raw: &str) -> Result<TokenClaims, AuthError> {
    let mut segments = raw.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_header), Some(payload), Some(_signature), None) => payload,
        _ => {
            return Err(AuthError::MalformedToken {
                reason: "expected a three-segment compact JWS".to_string(),
            });
        }
    };

    let decoded = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| AuthError::MalformedToken {
            reason: format!("token payload is not valid base64url: {e}"),
        })?;

    let claims: serde_json::Value =
        serde_json::from_slice(&decoded).map_err(|e| AuthError::MalformedToken {
            reason: format!("token payload is not valid JSON: {e}"),
        })?;

    let exp = claims
        .get("exp")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| AuthError::MalformedToken {
            reason: "the exp claim is missing".to_string(),
        })?;

    let expires_on = Utc
        .timestamp_opt(exp, 0)
        .single()
        .ok_or_else(|| AuthError::MalformedToken {
            reason: format!("the exp claim {exp} is out of range"),
        })?;

    let string_claim = |name: &str| {
        claims
            .get(name)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    };

    Ok(TokenClaims {
        user_id: string_claim("oid"),
        tenant_id: string_claim("tid"),
        expires_on,
        user_display: string_claim("upn").or_else(|| string_claim("unique_name")),
    })
}
