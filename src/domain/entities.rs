use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::errors::SignInError;

// Minimal authenticated-user record returned by the auth backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

// Coarse lifecycle position of a sign-in session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    SignedOut,
    AwaitingExternalAuthorization,
    SignedIn,
}

// Immutable snapshot published to the UI shell after every transition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignInState {
    pub phase: SessionPhase,
    pub identity: Option<Identity>,
    pub last_error: Option<SignInError>,
}

impl SignInState {
    pub fn is_signed_in(&self) -> bool {
        self.identity.is_some()
    }
}

// Provider options mirrored from the Google ID token request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuthorizationOptions {
    pub require_email: bool,
    pub filter_by_authorized_accounts: bool,
}

impl Default for AuthorizationOptions {
    fn default() -> Self {
        Self {
            require_email: true,
            filter_by_authorized_accounts: true,
        }
    }
}

// Request handed to the identity provider when an attempt opens.
#[derive(Clone, Debug)]
pub struct AuthorizationRequest {
    // Correlates the provider round-trip with the attempt that issued it.
    pub attempt_id: String,
    pub client_id: String,
    pub options: AuthorizationOptions,
}

// Provider-issued handle the UI shell presents to the user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PendingAuthorization {
    pub id: String,
    pub launch_url: String,
}

// Uninterpreted outcome of the user's interaction with the provider UI.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct AuthorizationArtifact(pub Value);

impl AuthorizationArtifact {
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

// What the shell delivers back once the provider UI closes.
#[derive(Clone, Debug, PartialEq)]
pub enum ExternalResult {
    Completed(AuthorizationArtifact),
    Canceled,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn when_state_is_default_then_it_is_signed_out_without_error() {
        let state = SignInState::default();

        assert_eq!(state.phase, SessionPhase::SignedOut);
        assert!(!state.is_signed_in());
        assert!(state.last_error.is_none());
    }

    #[test]
    fn when_options_are_missing_from_toml_then_defaults_apply() {
        let options: AuthorizationOptions =
            toml::from_str("require_email = false").expect("expected options to parse");

        assert!(!options.require_email);
        assert!(options.filter_by_authorized_accounts);
    }

    #[test]
    fn when_artifact_field_is_not_a_string_then_field_str_returns_none() {
        let artifact = AuthorizationArtifact(json!({ "id_token": 7, "state": "abc" }));

        assert_eq!(artifact.field_str("id_token"), None);
        assert_eq!(artifact.field_str("state"), Some("abc"));
        assert_eq!(artifact.field_str("missing"), None);
    }
}
