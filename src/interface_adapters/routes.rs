use crate::interface_adapters::handlers::{
    external_result, session_events, session_state, sign_in_clicked, sign_out_clicked,
};
use crate::interface_adapters::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/session", get(session_state))
        .route("/session/events", get(session_events))
        .route("/session/sign-in", post(sign_in_clicked))
        .route("/session/result", post(external_result))
        .route("/session/sign-out", post(sign_out_clicked))
        .with_state(state)
}
