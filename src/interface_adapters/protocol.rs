use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{
    AuthorizationArtifact, ExternalResult, Identity, PendingAuthorization, SessionPhase,
    SignInError, SignInState,
};

// Response payload for a sign-in click: what the shell opens for the user.
#[derive(Debug, Serialize)]
pub struct BeginSignInResponse {
    pub id: String,
    pub launch_url: String,
}

impl From<PendingAuthorization> for BeginSignInResponse {
    fn from(handle: PendingAuthorization) -> Self {
        Self {
            id: handle.id,
            launch_url: handle.launch_url,
        }
    }
}

// Request payload delivering the provider UI outcome.
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExternalResultRequest {
    Completed { artifact: Value },
    Canceled,
}

impl From<ExternalResultRequest> for ExternalResult {
    fn from(request: ExternalResultRequest) -> Self {
        match request {
            ExternalResultRequest::Completed { artifact } => {
                ExternalResult::Completed(AuthorizationArtifact(artifact))
            }
            ExternalResultRequest::Canceled => ExternalResult::Canceled,
        }
    }
}

// Response payload after a successful sign-in.
#[derive(Debug, Serialize)]
pub struct CompleteSignInResponse {
    pub identity: Identity,
}

// Response payload for sign-out.
#[derive(Debug, Serialize)]
pub struct SignOutResponse {
    pub signed_out: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorInfo {
    pub kind: &'static str,
    pub message: String,
}

impl From<&SignInError> for ErrorInfo {
    fn from(err: &SignInError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

// Snapshot the shell renders.
#[derive(Debug, Serialize)]
pub struct SignInStateResponse {
    pub phase: SessionPhase,
    pub identity: Option<Identity>,
    pub last_error: Option<ErrorInfo>,
}

impl From<SignInState> for SignInStateResponse {
    fn from(state: SignInState) -> Self {
        Self {
            phase: state.phase,
            last_error: state.last_error.as_ref().map(ErrorInfo::from),
            identity: state.identity,
        }
    }
}

// Simple error envelope for JSON responses.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}
