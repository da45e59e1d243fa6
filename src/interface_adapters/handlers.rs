use crate::domain::{SessionError, SignInError};
use crate::interface_adapters::protocol::{
    BeginSignInResponse, CompleteSignInResponse, ErrorResponse, ExternalResultRequest,
    SignInStateResponse, SignOutResponse,
};
use crate::interface_adapters::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::Stream;
use tracing::debug;

// Handler for the shell's "sign in" button.
pub async fn sign_in_clicked(
    State(state): State<AppState>,
) -> Result<Json<BeginSignInResponse>, (StatusCode, Json<ErrorResponse>)> {
    let handle = state
        .session
        .begin_sign_in()
        .await
        .map_err(map_session_error)?;

    Ok(Json(BeginSignInResponse::from(handle)))
}

// Handler for the provider UI outcome (completed artifact or cancel).
// A cancel settles the attempt as `Canceled`, so it answers 409 like any other
// attempt that ends without an identity.
pub async fn external_result(
    State(state): State<AppState>,
    Json(payload): Json<ExternalResultRequest>,
) -> Result<Json<CompleteSignInResponse>, (StatusCode, Json<ErrorResponse>)> {
    let identity = state
        .session
        .on_external_result(payload.into())
        .await
        .map_err(map_session_error)?;

    Ok(Json(CompleteSignInResponse { identity }))
}

// Handler for the shell's "sign out" button. Always succeeds.
pub async fn sign_out_clicked(State(state): State<AppState>) -> Json<SignOutResponse> {
    state.session.sign_out();
    Json(SignOutResponse { signed_out: true })
}

// Handler returning the current state snapshot.
pub async fn session_state(State(state): State<AppState>) -> Json<SignInStateResponse> {
    Json(SignInStateResponse::from(state.session.state()))
}

// Server-sent event stream: the current snapshot, then one event per transition,
// until the session is gone or the server shuts down.
pub async fn session_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    debug!("state stream subscriber connected");
    let rx = state.session.subscribe();
    let stop = state.shutdown.clone();
    let stream = futures::stream::unfold((rx, stop, true), |(mut rx, stop, first)| async move {
        if !first {
            tokio::select! {
                biased;
                _ = stop.cancelled() => return None,
                changed = rx.changed() => if changed.is_err() {
                    return None;
                },
            }
        }
        let snapshot = SignInStateResponse::from(rx.borrow_and_update().clone());
        let event = Event::default().event("state").json_data(snapshot);
        Some((event, (rx, stop, false)))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

// Helper to build a JSON error response.
fn error_response(status: StatusCode, message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            message: message.to_string(),
        }),
    )
}

fn map_session_error(err: SessionError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        SessionError::AttemptInProgress
        | SessionError::AlreadySignedIn
        | SessionError::NoPendingAttempt
        | SessionError::SignIn(SignInError::Canceled) => StatusCode::CONFLICT,
        SessionError::SignIn(SignInError::ProviderUnavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        SessionError::SignIn(SignInError::NoCredential) => StatusCode::UNAUTHORIZED,
        SessionError::SignIn(SignInError::ExchangeFailed(_)) => StatusCode::BAD_GATEWAY,
    };
    error_response(status, &err.to_string())
}
