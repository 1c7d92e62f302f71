use thiserror::Error;

/// Errors that can occur while acquiring a Partner Center token.
///
/// Every variant is terminal for the current authentication attempt; no
/// retries happen inside this layer. Authority rejections keep the
/// original reason text, with credentials stripped, so the host can show
/// the failure to the end user and decide whether to retry with a
/// different account type or a cleared session.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Unknown Partner Center environment: {name}")]
    UnknownEnvironment { name: String },

    #[error("Malformed access token: {reason}")]
    MalformedToken { reason: String },

    #[error("Authentication was denied by the authority: {reason}")]
    AuthenticationDenied { reason: String },

    #[error("User interaction is required: {reason}")]
    UserInteractionRequired { reason: String },

    #[error("The device code has expired. Please restart the authentication process.")]
    DeviceCodeExpired,

    #[error("Silent authentication failed: {reason}")]
    SilentAuthenticationFailed { reason: String },

    #[error("The refresh token was rejected by the authority: {reason}")]
    RefreshTokenInvalid { reason: String },

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Request failed: {reason}")]
    RequestFailed { reason: String },
}
