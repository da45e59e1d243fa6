use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::domain::entities::{
    AuthorizationArtifact, AuthorizationOptions, AuthorizationRequest, Identity,
    PendingAuthorization,
};
use crate::domain::ports::{AuthBackend, IdentityProvider};
use crate::use_cases::sign_in_session::{SessionSettings, SignInSession};

pub(crate) const TEST_CLIENT_ID: &str = "abc123";

pub(crate) fn identity(id: &str, display_name: Option<&str>) -> Identity {
    Identity {
        id: id.to_string(),
        display_name: display_name.map(str::to_string),
        avatar_url: None,
    }
}

pub(crate) fn settings(exchange_timeout: Duration) -> SessionSettings {
    SessionSettings {
        client_id: TEST_CLIENT_ID.to_string(),
        options: AuthorizationOptions::default(),
        exchange_timeout,
    }
}

pub(crate) fn build_session(
    provider: Arc<FakeProvider>,
    backend: Arc<FakeBackend>,
) -> SignInSession {
    SignInSession::new(provider, backend, settings(Duration::from_secs(5)))
}

// Provider fake that records calls and issues handles keyed by attempt id.
#[derive(Default)]
pub(crate) struct FakeProvider {
    pub(crate) calls: AtomicUsize,
    pub(crate) last_request: Mutex<Option<AuthorizationRequest>>,
    failure: Option<String>,
    gate: Option<Arc<Notify>>,
}

impl FakeProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    // Holds every authorization request open until the gate is notified.
    pub(crate) fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn request_authorization(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<PendingAuthorization, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().expect("request mutex poisoned") = Some(request.clone());

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        if let Some(message) = &self.failure {
            return Err(message.clone());
        }

        Ok(PendingAuthorization {
            id: request.attempt_id.clone(),
            launch_url: format!(
                "https://provider.test/authorize?client_id={}&state={}",
                request.client_id, request.attempt_id
            ),
        })
    }

    fn extract_token(&self, artifact: &AuthorizationArtifact) -> Option<String> {
        artifact
            .field_str("id_token")
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    }
}

// Backend fake mapping tokens to identities, with optional per-token failures
// and a gate that holds exchanges open until released.
#[derive(Default)]
pub(crate) struct FakeBackend {
    identities: HashMap<String, Identity>,
    failures: HashMap<String, String>,
    gate: Option<Arc<Notify>>,
    revoke_failure: bool,
    pub(crate) exchange_calls: AtomicUsize,
    pub(crate) revoke_calls: AtomicUsize,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_identity(mut self, token: &str, identity: Identity) -> Self {
        self.identities.insert(token.to_string(), identity);
        self
    }

    pub(crate) fn with_failure(mut self, token: &str, message: &str) -> Self {
        self.failures.insert(token.to_string(), message.to_string());
        self
    }

    pub(crate) fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub(crate) fn with_failing_revoke(mut self) -> Self {
        self.revoke_failure = true;
        self
    }

    pub(crate) fn exchange_count(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn revoke_count(&self) -> usize {
        self.revoke_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthBackend for FakeBackend {
    async fn exchange_token(&self, token: &str) -> Result<Identity, String> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(message) = self.failures.get(token) {
            return Err(message.clone());
        }

        self.identities
            .get(token)
            .cloned()
            .ok_or_else(|| format!("INVALID_IDP_RESPONSE: unknown token {token}"))
    }

    async fn revoke_session(&self) -> Result<(), String> {
        self.revoke_calls.fetch_add(1, Ordering::SeqCst);
        if self.revoke_failure {
            return Err("revoke failed".to_string());
        }
        Ok(())
    }
}

// Polls until the backend has seen `expected` exchanges.
pub(crate) async fn wait_for_exchanges(backend: &FakeBackend, expected: usize) {
    for _ in 0..500 {
        if backend.exchange_count() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("backend never received {expected} exchange call(s)");
}
