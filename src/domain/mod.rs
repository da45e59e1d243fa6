pub mod entities;
pub mod errors;
pub mod ports;

// Re-export the domain boundary types and ports.
pub use entities::{
    AuthorizationArtifact, AuthorizationOptions, AuthorizationRequest, ExternalResult, Identity,
    PendingAuthorization, SessionPhase, SignInState,
};
pub use errors::{SessionError, SignInError};
pub use ports::{AuthBackend, AuthBackendDyn, IdentityProvider, IdentityProviderDyn};
