use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::use_cases::SignInSession;

// Application state shared by the shell-facing handlers.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SignInSession>,
    // Fired when the server begins shutting down; ends long-lived event streams.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(session: Arc<SignInSession>) -> Self {
        Self {
            session,
            shutdown: CancellationToken::new(),
        }
    }
}
