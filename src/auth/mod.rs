//! Authentication: password hashing and signed bearer tokens.

pub mod extract;
pub mod gate;
pub mod password;
pub mod routes;
pub mod token;

pub use extract::CurrentPrincipal;
pub use gate::{AuthGate, normalize_email};
pub use password::CredentialVerifier;
pub use routes::auth_routes;
pub use token::{Claims, IssuedToken, TokenCodec};
