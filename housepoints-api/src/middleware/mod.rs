/// Middleware for the API server
///
/// Authentication lives in `housepoints_shared::auth::middleware`; this
/// module only hardens responses.

pub mod security;
