use async_trait::async_trait;
use claims::{assert_matches, assert_ok, assert_some};
use sdk::auth::{
    AuthError, Authority, DeviceCodeTicket, DevicePoll, Secret, TokenGrant, refresh_access_token,
};

mod refresh_helpers {
    use super::*;

    /// Authority double covering only the refresh grant; the selector is
    /// not involved in these tests so every other grant is out of reach.
    pub struct RefreshOnlyAuthority {
        pub reject: bool,
        pub rotate_to: Option<&'static str>,
    }

    #[async_trait]
    impl Authority for RefreshOnlyAuthority {
        async fn acquire_token_by_refresh_token(
            &self,
            _authority_url: &str,
            _resource: &str,
            refresh_token: &Secret,
            _client_id: &str,
            _secret: Option<&Secret>,
        ) -> Result<TokenGrant, AuthError> {
            if self.reject {
                return Err(AuthError::RefreshTokenInvalid {
                    reason: "AADSTS70002: the refresh token has expired".to_string(),
                });
            }
            assert_eq!(refresh_token.expose(), "current-refresh-token");
            Ok(TokenGrant {
                access_token: "refreshed-access-token".to_string(),
                token_type: "Bearer".to_string(),
                expires_in: 3600,
                refresh_token: self.rotate_to.map(|t| t.to_string()),
                tenant_id: Some("tenant".to_string()),
                user_id: Some("user".to_string()),
                user_display: None,
            })
        }

        async fn acquire_token_by_client_secret(
            &self,
            _authority_url: &str,
            _resource: &str,
            _client_id: &str,
            _secret: &Secret,
        ) -> Result<TokenGrant, AuthError> {
            unreachable!("not exercised by the refresh path")
        }

        async fn begin_device_code(
            &self,
            _authority_url: &str,
            _resource: &str,
            _client_id: &str,
        ) -> Result<DeviceCodeTicket, AuthError> {
            unreachable!("not exercised by the refresh path")
        }

        async fn poll_device_code(
            &self,
            _authority_url: &str,
            _client_id: &str,
            _device_code: &str,
            _secret: Option<&Secret>,
        ) -> Result<DevicePoll, AuthError> {
            unreachable!("not exercised by the refresh path")
        }

        async fn acquire_token_by_authorization_code(
            &self,
            _authority_url: &str,
            _resource: &str,
            _redirect_uri: &str,
            _code: &str,
            _client_id: &str,
            _secret: Option<&Secret>,
        ) -> Result<TokenGrant, AuthError> {
            unreachable!("not exercised by the refresh path")
        }

        async fn acquire_token_silent(
            &self,
            _authority_url: &str,
            _resource: &str,
            _client_id: &str,
            _user_id: &str,
        ) -> Result<TokenGrant, AuthError> {
            unreachable!("not exercised by the refresh path")
        }
    }
}

use refresh_helpers::*;

#[tokio::test]
async fn refresh_exchange_returns_token_and_rotated_refresh_token() {
    let authority = RefreshOnlyAuthority {
        reject: false,
        rotate_to: Some("rotated-refresh-token"),
    };

    let refreshed = assert_ok!(
        refresh_access_token(
            &authority,
            "https://login.microsoftonline.com/contoso",
            "https://api.partnercenter.microsoft.com",
            &Secret::new("current-refresh-token"),
            "client-id",
            None,
        )
        .await
    );

    assert_eq!(refreshed.token.value, "refreshed-access-token");
    assert_eq!(refreshed.token.tenant_id.as_deref(), Some("tenant"));
    let rotated = assert_some!(refreshed.refresh_token);
    assert_eq!(rotated.expose(), "rotated-refresh-token");
}

#[tokio::test]
async fn refresh_without_rotation_yields_no_new_refresh_token() {
    let authority = RefreshOnlyAuthority {
        reject: false,
        rotate_to: None,
    };

    let refreshed = assert_ok!(
        refresh_access_token(
            &authority,
            "https://login.microsoftonline.com/contoso",
            "https://api.partnercenter.microsoft.com",
            &Secret::new("current-refresh-token"),
            "client-id",
            Some(&Secret::new("confidential-client-secret")),
        )
        .await
    );

    assert!(refreshed.refresh_token.is_none());
}

#[tokio::test]
async fn rejected_refresh_token_maps_to_refresh_token_invalid() {
    let authority = RefreshOnlyAuthority {
        reject: true,
        rotate_to: None,
    };

    let err = refresh_access_token(
        &authority,
        "https://login.microsoftonline.com/contoso",
        "https://api.partnercenter.microsoft.com",
        &Secret::new("current-refresh-token"),
        "client-id",
        None,
    )
    .await
    .unwrap_err();

    assert_matches!(err, AuthError::RefreshTokenInvalid { .. });
}
