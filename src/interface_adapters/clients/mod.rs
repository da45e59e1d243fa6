// Reqwest clients for the external identity provider and auth backend.
pub mod firebase;
pub mod google;

pub use firebase::{FirebaseAuthBackend, FIREBASE_IDENTITY_TOOLKIT_URL};
pub use google::{GoogleIdentityProvider, GOOGLE_DISCOVERY_URL};
