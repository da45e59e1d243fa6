pub mod sign_in_session;
#[cfg(test)]
pub(crate) mod test_support;

pub use sign_in_session::{SessionSettings, SignInSession, DEFAULT_EXCHANGE_TIMEOUT};
