pub mod authority;
pub mod clock;
pub mod errors;
pub mod interactive;
pub mod jwt;
pub mod selector;
pub mod session;
pub mod types;

pub use authority::{AadAuthority, Authority, DeviceCodeTicket, DevicePoll, TokenGrant};
pub use clock::{Clock, SystemClock};
pub use errors::AuthError;
pub use interactive::{
    BrowserFlow, BrowserSurface, DeviceCodeFlow, HostCapabilities, InteractiveFlow,
    OOB_REDIRECT_URI, detect_interactive_flow,
};
pub use selector::{Authenticator, RefreshedToken, refresh_access_token};
pub use session::{Session, SessionManager};
pub use types::{
    AccountType, AuthenticationToken, COMMON_TENANT, CredentialContext, DebugSink, PromptSink,
    Secret,
};
