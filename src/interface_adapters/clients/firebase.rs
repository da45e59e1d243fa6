use crate::domain::{AuthBackend, Identity};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

pub const FIREBASE_IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com";

// The provider the exchanged ID token was issued by.
const GOOGLE_PROVIDER_ID: &str = "google.com";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInWithIdpRequest<'a> {
    post_body: String,
    request_uri: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInWithIdpResponse {
    local_id: String,
    display_name: Option<String>,
    photo_url: Option<String>,
    id_token: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FirebaseErrorEnvelope {
    error: FirebaseErrorBody,
}

#[derive(Debug, Deserialize)]
struct FirebaseErrorBody {
    message: String,
}

#[derive(Debug)]
pub enum FirebaseClientError {
    Transport(reqwest::Error),
    Upstream {
        status: StatusCode,
        message: Option<String>,
    },
    Decode(reqwest::Error),
}

impl fmt::Display for FirebaseClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FirebaseClientError::Transport(err) => write!(f, "firebase transport error: {err}"),
            FirebaseClientError::Upstream { status, message } => {
                if let Some(message) = message {
                    write!(f, "firebase upstream error {status}: {message}")
                } else {
                    write!(f, "firebase upstream error {status}")
                }
            }
            FirebaseClientError::Decode(err) => write!(f, "firebase response decode error: {err}"),
        }
    }
}

impl std::error::Error for FirebaseClientError {}

// Tokens Firebase issued for the signed-in user; dropped on revoke.
#[derive(Debug, Clone, Default)]
struct FirebaseCredential {
    id_token: Option<String>,
    refresh_token: Option<String>,
}

// Thin reqwest client for the Identity Toolkit `accounts:signInWithIdp` exchange.
pub struct FirebaseAuthBackend {
    http: Client,
    base_url: String,
    api_key: String,
    request_uri: String,
    credential: Mutex<Option<FirebaseCredential>>,
}

impl FirebaseAuthBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        request_uri: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            request_uri: request_uri.into(),
            credential: Mutex::new(None),
        })
    }

    pub fn has_credential(&self) -> bool {
        self.credential
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    async fn sign_in_with_idp(&self, token: &str) -> Result<Identity, FirebaseClientError> {
        let url = format!("{}/v1/accounts:signInWithIdp", self.base_url);
        let post_body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("id_token", token)
            .append_pair("providerId", GOOGLE_PROVIDER_ID)
            .finish();
        let res = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&SignInWithIdpRequest {
                post_body,
                request_uri: &self.request_uri,
                return_secure_token: true,
            })
            .send()
            .await
            .map_err(FirebaseClientError::Transport)?;
        let status = res.status();

        // Firebase reports rejections as {"error": {"message": "..."}}.
        if !status.is_success() {
            let message = res
                .json::<FirebaseErrorEnvelope>()
                .await
                .ok()
                .map(|payload| payload.error.message);
            return Err(FirebaseClientError::Upstream { status, message });
        }

        let payload = res
            .json::<SignInWithIdpResponse>()
            .await
            .map_err(FirebaseClientError::Decode)?;

        *self.credential.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(FirebaseCredential {
                id_token: payload.id_token,
                refresh_token: payload.refresh_token,
            });

        Ok(Identity {
            id: payload.local_id,
            display_name: payload.display_name,
            avatar_url: payload.photo_url,
        })
    }
}

#[async_trait]
impl AuthBackend for FirebaseAuthBackend {
    async fn exchange_token(&self, token: &str) -> Result<Identity, String> {
        self.sign_in_with_idp(token)
            .await
            .map_err(|err| err.to_string())
    }

    async fn revoke_session(&self) -> Result<(), String> {
        // Firebase has no client-side revoke call; forgetting the tokens ends the session here.
        let previous = self
            .credential
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(credential) = previous {
            debug!(
                had_refresh_token = credential.refresh_token.is_some(),
                had_id_token = credential.id_token.is_some(),
                "dropped firebase credential"
            );
        }
        Ok(())
    }
}
