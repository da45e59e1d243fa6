pub mod domain;
pub mod frameworks;
pub mod interface_adapters;
pub mod use_cases;

pub use domain::{
    AuthBackend, AuthorizationArtifact, ExternalResult, Identity, IdentityProvider,
    PendingAuthorization, SessionError, SessionPhase, SignInError, SignInState,
};
pub use frameworks::server::run;
pub use use_cases::{SessionSettings, SignInSession};
