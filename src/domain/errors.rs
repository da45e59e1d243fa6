use std::fmt;

// Terminal outcome of a failed sign-in attempt, surfaced through SignInState.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignInError {
    // The provider could not issue a pending authorization.
    ProviderUnavailable(String),
    // The user dismissed the provider UI, or the attempt was torn down.
    Canceled,
    // The provider reported success without a usable identity token.
    NoCredential,
    // The backend rejected the token or could not be reached.
    ExchangeFailed(String),
}

impl SignInError {
    // Stable machine-readable code for shells and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SignInError::ProviderUnavailable(_) => "provider_unavailable",
            SignInError::Canceled => "canceled",
            SignInError::NoCredential => "no_credential",
            SignInError::ExchangeFailed(_) => "exchange_failed",
        }
    }
}

impl fmt::Display for SignInError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignInError::ProviderUnavailable(message) => {
                write!(f, "identity provider unavailable: {message}")
            }
            SignInError::Canceled => write!(f, "sign-in canceled"),
            SignInError::NoCredential => write!(f, "no credential in authorization result"),
            SignInError::ExchangeFailed(message) => write!(f, "token exchange failed: {message}"),
        }
    }
}

impl std::error::Error for SignInError {}

// Errors returned by session operations. Rejections leave state untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionError {
    AttemptInProgress,
    AlreadySignedIn,
    NoPendingAttempt,
    SignIn(SignInError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::AttemptInProgress => write!(f, "a sign-in attempt is already in progress"),
            SessionError::AlreadySignedIn => write!(f, "already signed in"),
            SessionError::NoPendingAttempt => write!(f, "no sign-in attempt is awaiting a result"),
            SessionError::SignIn(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::SignIn(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SignInError> for SessionError {
    fn from(err: SignInError) -> Self {
        SessionError::SignIn(err)
    }
}
