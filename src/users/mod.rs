//! Principal records and their administration endpoints.

pub mod model;
pub mod routes;

pub use model::{Principal, PrincipalUpdate, StoredUpdate};
