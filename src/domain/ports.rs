use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::entities::{
    AuthorizationArtifact, AuthorizationRequest, Identity, PendingAuthorization,
};

// Port for the external identity provider (Google sign-in in production).
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn request_authorization(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<PendingAuthorization, String>;

    // Pulls the identity token out of a completed provider result, if any.
    fn extract_token(&self, artifact: &AuthorizationArtifact) -> Option<String>;
}

// Port for the backend that turns an identity token into a user record.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn exchange_token(&self, token: &str) -> Result<Identity, String>;
    async fn revoke_session(&self) -> Result<(), String>;
}

pub type IdentityProviderDyn = Arc<dyn IdentityProvider>;
pub type AuthBackendDyn = Arc<dyn AuthBackend>;
