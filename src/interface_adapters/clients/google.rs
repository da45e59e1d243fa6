use crate::domain::{
    AuthorizationArtifact, AuthorizationRequest, IdentityProvider, PendingAuthorization,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

pub const GOOGLE_DISCOVERY_URL: &str =
    "https://accounts.google.com/.well-known/openid-configuration";

// Subset of the OpenID discovery document we rely on.
#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    authorization_endpoint: Option<String>,
}

#[derive(Debug)]
pub enum GoogleClientError {
    MissingClientId,
    Transport(reqwest::Error),
    Upstream { status: StatusCode },
    Decode(reqwest::Error),
    MissingAuthorizationEndpoint,
    InvalidEndpoint(url::ParseError),
}

impl fmt::Display for GoogleClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoogleClientError::MissingClientId => write!(f, "google client id is not configured"),
            GoogleClientError::Transport(err) => write!(f, "discovery transport error: {err}"),
            GoogleClientError::Upstream { status } => write!(f, "discovery upstream error {status}"),
            GoogleClientError::Decode(err) => write!(f, "discovery document decode error: {err}"),
            GoogleClientError::MissingAuthorizationEndpoint => {
                write!(f, "discovery document has no authorization_endpoint")
            }
            GoogleClientError::InvalidEndpoint(err) => {
                write!(f, "invalid authorization endpoint: {err}")
            }
        }
    }
}

impl std::error::Error for GoogleClientError {}

// Google sign-in via the OpenID Connect implicit ID token flow.
#[derive(Clone)]
pub struct GoogleIdentityProvider {
    http: Client,
    discovery_url: String,
    redirect_uri: String,
}

impl GoogleIdentityProvider {
    pub fn new(
        discovery_url: impl Into<String>,
        redirect_uri: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            discovery_url: discovery_url.into(),
            redirect_uri: redirect_uri.into(),
        })
    }

    async fn authorization_endpoint(&self) -> Result<Url, GoogleClientError> {
        let res = self
            .http
            .get(&self.discovery_url)
            .send()
            .await
            .map_err(GoogleClientError::Transport)?;
        let status = res.status();
        if !status.is_success() {
            return Err(GoogleClientError::Upstream { status });
        }

        let document = res
            .json::<DiscoveryDocument>()
            .await
            .map_err(GoogleClientError::Decode)?;
        let endpoint = document
            .authorization_endpoint
            .ok_or(GoogleClientError::MissingAuthorizationEndpoint)?;
        Url::parse(&endpoint).map_err(GoogleClientError::InvalidEndpoint)
    }

    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<PendingAuthorization, GoogleClientError> {
        let client_id = request.client_id.trim();
        if client_id.is_empty() {
            return Err(GoogleClientError::MissingClientId);
        }

        let mut launch_url = self.authorization_endpoint().await?;
        let scope = if request.options.require_email {
            "openid profile email"
        } else {
            "openid profile"
        };
        let nonce = Uuid::new_v4().to_string();
        {
            let mut query = launch_url.query_pairs_mut();
            query
                .append_pair("client_id", client_id)
                .append_pair("response_type", "id_token")
                .append_pair("scope", scope)
                .append_pair("redirect_uri", &self.redirect_uri)
                .append_pair("nonce", &nonce)
                .append_pair("state", &request.attempt_id);
            // Without the filter the user is always offered the account chooser.
            if !request.options.filter_by_authorized_accounts {
                query.append_pair("prompt", "select_account");
            }
        }

        Ok(PendingAuthorization {
            id: request.attempt_id.clone(),
            launch_url: launch_url.into(),
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    async fn request_authorization(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<PendingAuthorization, String> {
        self.authorize(request).await.map_err(|err| err.to_string())
    }

    fn extract_token(&self, artifact: &AuthorizationArtifact) -> Option<String> {
        // Redirect callbacks carry `id_token`; One Tap responses carry `credential`.
        ["id_token", "credential"]
            .into_iter()
            .filter_map(|key| artifact.field_str(key))
            .map(str::trim)
            .find(|token| !token.is_empty())
            .map(str::to_string)
    }
}
