// Framework bootstrap for the sign-in shell service.

use crate::frameworks::config::Config;
use crate::interface_adapters::clients::{FirebaseAuthBackend, GoogleIdentityProvider};
use crate::interface_adapters::routes;
use crate::interface_adapters::state::AppState;
use crate::use_cases::SignInSession;
use std::future::Future;
use std::io::Result;
use std::net::SocketAddr;
use std::sync::Arc;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

// Wire the Google provider and Firebase backend into one session.
pub fn build_state(config: &Config) -> Result<AppState> {
    let provider = GoogleIdentityProvider::new(
        config.discovery_url.clone(),
        config.redirect_uri.clone(),
        config.provider_timeout(),
    )
    .map_err(|e| std::io::Error::other(format!("failed to initialize google client: {e}")))?;
    let backend = FirebaseAuthBackend::new(
        config.firebase_base_url.clone(),
        config.firebase_api_key.clone(),
        config.redirect_uri.clone(),
        config.exchange_timeout(),
    )
    .map_err(|e| std::io::Error::other(format!("failed to initialize firebase client: {e}")))?;
    tracing::debug!(
        discovery_url = %config.discovery_url,
        firebase_base_url = %config.firebase_base_url,
        exchange_timeout_ms = config.exchange_timeout_ms,
        "identity clients configured"
    );

    let session = SignInSession::new(
        Arc::new(provider),
        Arc::new(backend),
        config.session_settings(),
    );
    Ok(AppState::new(Arc::new(session)))
}

pub async fn run(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let address = listener.local_addr()?;
    let session = state.session.clone();
    let streams = state.shutdown.clone();
    let app = routes::app(state);

    tracing::info!(%address, "listening");

    // Graceful shutdown waits on in-flight requests, so the open attempt and
    // the event streams are closed before it starts draining.
    let shutdown = async move {
        shutdown.await;
        session.shutdown();
        streams.cancel();
    };

    // Serve app and report errors rather than panicking
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .inspect_err(|e| {
            tracing::error!(error = %e, "server error");
        })?;

    Ok(())
}

pub async fn run_with_config() {
    // Load .env locally; safe to ignore when not present.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            return;
        }
    };
    if config.client_id.trim().is_empty() {
        tracing::warn!("GOOGLE_CLIENT_ID is not set; sign-in attempts will report provider_unavailable");
    }
    if config.firebase_api_key.trim().is_empty() {
        tracing::warn!("FIREBASE_API_KEY is not set; token exchanges will be rejected");
    }

    let state = match build_state(&config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "failed to build application state");
            return;
        }
    };

    let addr = SocketAddr::from(([127, 0, 0, 1], config.http_port));

    // Bind TCP listener with error handling.
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%addr, error = %e, "failed to bind");
            return; // Abort startup on bind failure.
        }
    };

    if let Err(e) = run(listener, state, shutdown_signal()).await {
        tracing::error!(error = %e, "server stopped with error");
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        // Keep serving rather than shutting down on a broken signal handler.
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
