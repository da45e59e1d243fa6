use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::entities::{
    AuthorizationArtifact, AuthorizationOptions, AuthorizationRequest, ExternalResult, Identity,
    PendingAuthorization, SessionPhase, SignInState,
};
use crate::domain::errors::{SessionError, SignInError};
use crate::domain::ports::{AuthBackendDyn, IdentityProviderDyn};

// Upper bound on a single token exchange when the host does not configure one.
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(15);

// Settings fixed for the lifetime of a session.
#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub client_id: String,
    pub options: AuthorizationOptions,
    pub exchange_timeout: Duration,
}

struct Attempt {
    id: String,
    // Set once the provider has issued a handle.
    handle: Option<PendingAuthorization>,
    // Set while a token exchange is outstanding; blocks a second completion.
    exchanging: bool,
    cancel: CancellationToken,
}

enum Phase {
    SignedOut,
    Awaiting(Attempt),
    SignedIn,
}

struct Inner {
    phase: Phase,
    identity: Option<Identity>,
    last_error: Option<SignInError>,
}

impl Inner {
    fn snapshot(&self) -> SignInState {
        let phase = match self.phase {
            Phase::SignedOut => SessionPhase::SignedOut,
            Phase::Awaiting(_) => SessionPhase::AwaitingExternalAuthorization,
            Phase::SignedIn => SessionPhase::SignedIn,
        };
        SignInState {
            phase,
            identity: self.identity.clone(),
            last_error: self.last_error.clone(),
        }
    }

    fn is_current(&self, attempt_id: &str) -> bool {
        matches!(&self.phase, Phase::Awaiting(attempt) if attempt.id == attempt_id)
    }
}

/// Mediates one external sign-in attempt at a time and holds the current identity.
///
/// Every transition is applied under a single lock and published to
/// subscribers as a [`SignInState`] snapshot. The lock is never held across
/// provider or backend I/O; attempts are instead identified by id so that a
/// result arriving for a canceled attempt is discarded.
pub struct SignInSession {
    provider: IdentityProviderDyn,
    backend: AuthBackendDyn,
    settings: SessionSettings,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<SignInState>,
}

impl SignInSession {
    pub fn new(
        provider: IdentityProviderDyn,
        backend: AuthBackendDyn,
        settings: SessionSettings,
    ) -> Self {
        let (state_tx, _) = watch::channel(SignInState::default());
        Self {
            provider,
            backend,
            settings,
            inner: Mutex::new(Inner {
                phase: Phase::SignedOut,
                identity: None,
                last_error: None,
            }),
            state_tx,
        }
    }

    pub fn state(&self) -> SignInState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SignInState> {
        self.state_tx.subscribe()
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.lock().identity.clone()
    }

    /// Opens an attempt and asks the provider for a pending authorization.
    ///
    /// Rejected while another attempt is open or a user is signed in. A
    /// provider failure closes the attempt with `ProviderUnavailable`.
    pub async fn begin_sign_in(&self) -> Result<PendingAuthorization, SessionError> {
        let (attempt_id, cancel) = self.open_attempt()?;
        let mut guard = AttemptGuard::new(self, &attempt_id);
        info!(attempt_id = %attempt_id, "sign-in attempt started");

        let request = AuthorizationRequest {
            attempt_id: attempt_id.clone(),
            client_id: self.settings.client_id.clone(),
            options: self.settings.options,
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SignInError::Canceled.into()),
            result = self.provider.request_authorization(&request) => result,
        };

        match outcome {
            Ok(handle) => {
                let mut inner = self.lock();
                match &mut inner.phase {
                    Phase::Awaiting(attempt) if attempt.id == attempt_id => {
                        attempt.handle = Some(handle.clone());
                        guard.disarm();
                        debug!(attempt_id = %attempt_id, "pending authorization issued");
                        Ok(handle)
                    }
                    _ => Err(SignInError::Canceled.into()),
                }
            }
            Err(message) => {
                warn!(
                    attempt_id = %attempt_id,
                    error = %message,
                    "identity provider could not issue authorization"
                );
                let err = self.fail_attempt(&attempt_id, SignInError::ProviderUnavailable(message));
                Err(err.into())
            }
        }
    }

    /// Resolves the open attempt with the artifact the provider UI produced.
    ///
    /// Exactly one outcome is published: `SignedIn` with the exchanged identity,
    /// or `SignedOut` with the failure recorded as `last_error`.
    pub async fn complete_sign_in(
        &self,
        artifact: AuthorizationArtifact,
    ) -> Result<Identity, SessionError> {
        let (attempt_id, cancel) = self.claim_exchange(&artifact)?;
        let _guard = AttemptGuard::new(self, &attempt_id);

        let Some(token) = self.provider.extract_token(&artifact) else {
            warn!(attempt_id = %attempt_id, "authorization result carried no identity token");
            return Err(self.fail_attempt(&attempt_id, SignInError::NoCredential).into());
        };

        debug!(attempt_id = %attempt_id, "exchanging identity token");
        let exchange_timeout = self.settings.exchange_timeout;
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SignInError::Canceled),
            result = timeout(exchange_timeout, self.backend.exchange_token(&token)) => match result {
                Ok(Ok(identity)) => Ok(identity),
                Ok(Err(message)) => Err(SignInError::ExchangeFailed(message)),
                Err(_) => Err(SignInError::ExchangeFailed(format!(
                    "token exchange timed out after {}ms",
                    exchange_timeout.as_millis()
                ))),
            },
        };

        match outcome {
            Ok(identity) => self.finish_signed_in(&attempt_id, identity),
            Err(err) => {
                warn!(attempt_id = %attempt_id, error = %err, "sign-in attempt failed");
                Err(self.fail_attempt(&attempt_id, err).into())
            }
        }
    }

    // Single inbound hook for whatever the provider UI handed back.
    pub async fn on_external_result(
        &self,
        result: ExternalResult,
    ) -> Result<Identity, SessionError> {
        match result {
            ExternalResult::Completed(artifact) => self.complete_sign_in(artifact).await,
            ExternalResult::Canceled => {
                if self.cancel() {
                    Err(SignInError::Canceled.into())
                } else {
                    Err(SessionError::NoPendingAttempt)
                }
            }
        }
    }

    /// Abandons the open attempt, if any. Returns whether one was open.
    pub fn cancel(&self) -> bool {
        let mut inner = self.lock();
        let attempt = match std::mem::replace(&mut inner.phase, Phase::SignedOut) {
            Phase::Awaiting(attempt) => attempt,
            other => {
                inner.phase = other;
                return false;
            }
        };

        attempt.cancel.cancel();
        inner.identity = None;
        inner.last_error = Some(SignInError::Canceled);
        self.publish(&inner);
        info!(attempt_id = %attempt.id, "sign-in attempt canceled");
        true
    }

    /// Clears the local identity. Backend revocation runs in the background.
    pub fn sign_out(&self) {
        let mut inner = self.lock();
        let previous = std::mem::replace(&mut inner.phase, Phase::SignedOut);
        let was_signed_in = matches!(previous, Phase::SignedIn);
        if let Phase::Awaiting(attempt) = previous {
            attempt.cancel.cancel();
        }
        inner.identity = None;
        inner.last_error = None;
        self.publish(&inner);
        drop(inner);

        if was_signed_in {
            info!("signed out");
            self.spawn_revoke();
        }
    }

    // Host teardown: never leave an attempt awaiting a result that will not come.
    pub fn shutdown(&self) {
        if self.cancel() {
            debug!("pending sign-in attempt canceled at shutdown");
        }
    }

    fn open_attempt(&self) -> Result<(String, CancellationToken), SessionError> {
        let mut inner = self.lock();
        match inner.phase {
            Phase::Awaiting(_) => return Err(SessionError::AttemptInProgress),
            Phase::SignedIn => return Err(SessionError::AlreadySignedIn),
            Phase::SignedOut => {}
        }

        let attempt_id = Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();
        inner.phase = Phase::Awaiting(Attempt {
            id: attempt_id.clone(),
            handle: None,
            exchanging: false,
            cancel: cancel.clone(),
        });
        inner.last_error = None;
        self.publish(&inner);
        Ok((attempt_id, cancel))
    }

    // A `state` echoed back by the provider must name the open attempt.
    fn claim_exchange(
        &self,
        artifact: &AuthorizationArtifact,
    ) -> Result<(String, CancellationToken), SessionError> {
        let mut inner = self.lock();
        let Phase::Awaiting(attempt) = &mut inner.phase else {
            return Err(SessionError::NoPendingAttempt);
        };
        let Some(handle) = &attempt.handle else {
            return Err(SessionError::NoPendingAttempt);
        };
        if attempt.exchanging {
            return Err(SessionError::NoPendingAttempt);
        }
        if let Some(state) = artifact.field_str("state") {
            if state != handle.id {
                warn!(
                    attempt_id = %attempt.id,
                    result_state = %state,
                    "authorization result belongs to another attempt"
                );
                return Err(SessionError::NoPendingAttempt);
            }
        }

        attempt.exchanging = true;
        Ok((attempt.id.clone(), attempt.cancel.clone()))
    }

    fn finish_signed_in(
        &self,
        attempt_id: &str,
        identity: Identity,
    ) -> Result<Identity, SessionError> {
        let mut inner = self.lock();
        if !inner.is_current(attempt_id) {
            debug!(attempt_id = %attempt_id, "discarding exchange result for a closed attempt");
            return Err(SignInError::Canceled.into());
        }

        inner.phase = Phase::SignedIn;
        inner.identity = Some(identity.clone());
        inner.last_error = None;
        self.publish(&inner);
        info!(attempt_id = %attempt_id, user_id = %identity.id, "signed in");
        Ok(identity)
    }

    // Closes the attempt with `err` unless it was already closed elsewhere, in
    // which case the caller observes `Canceled`.
    fn fail_attempt(&self, attempt_id: &str, err: SignInError) -> SignInError {
        let mut inner = self.lock();
        if !inner.is_current(attempt_id) {
            return SignInError::Canceled;
        }

        inner.phase = Phase::SignedOut;
        inner.identity = None;
        inner.last_error = Some(err.clone());
        self.publish(&inner);
        err
    }

    fn spawn_revoke(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("no async runtime; skipping backend session revoke");
            return;
        };

        let backend = Arc::clone(&self.backend);
        runtime.spawn(async move {
            if let Err(err) = backend.revoke_session().await {
                warn!(error = %err, "failed to revoke backend session");
            }
        });
    }

    fn publish(&self, inner: &Inner) {
        self.state_tx.send_replace(inner.snapshot());
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// Closes an attempt whose driving future was dropped before it settled,
// e.g. when the HTTP client disconnects mid-exchange.
struct AttemptGuard<'a> {
    session: &'a SignInSession,
    attempt_id: &'a str,
    armed: bool,
}

impl<'a> AttemptGuard<'a> {
    fn new(session: &'a SignInSession, attempt_id: &'a str) -> Self {
        Self {
            session,
            attempt_id,
            armed: true,
        }
    }

    // The attempt legitimately stays open (awaiting the external result).
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if !self.armed || !self.session.lock().is_current(self.attempt_id) {
            return;
        }
        debug!(attempt_id = %self.attempt_id, "sign-in attempt abandoned by its caller");
        self.session.fail_attempt(self.attempt_id, SignInError::Canceled);
    }
}

impl Drop for SignInSession {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Phase::Awaiting(attempt) = &inner.phase {
            attempt.cancel.cancel();
        }
    }
}
