/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing
/// - [`credentials`]: username/password checks against stored users
/// - [`token`]: signed, expiring session tokens
/// - [`guard`]: role checks over verified identities
/// - [`middleware`]: Axum layer that enforces a role set per route group
///
/// # Example
///
/// ```no_run
/// use housepoints_shared::auth::{credentials::authenticate, guard::authorize, token::TokenService};
/// use housepoints_shared::models::user::Role;
/// use housepoints_shared::store::memory::MemoryStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new();
/// let tokens = TokenService::new("a-secret-of-at-least-thirty-two-bytes");
///
/// let user = authenticate(&store, "snape", "always").await?;
/// let session = tokens.issue(&user)?;
/// let claims = authorize(&tokens, &session.token, &[Role::Teacher, Role::Admin])?;
/// # Ok(())
/// # }
/// ```

pub mod credentials;
pub mod guard;
pub mod middleware;
pub mod password;
pub mod token;

use crate::store::StoreError;
use password::PasswordError;

/// Error type for authentication and access checks
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No credentials were presented
    #[error("Missing credentials")]
    MissingCredentials,

    /// Unknown username or wrong password; the two are not distinguished
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Token or authorization header could not be parsed
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// Token signature does not match
    #[error("Invalid token signature")]
    InvalidSignature,

    /// Token is past its expiration time
    #[error("Token expired")]
    Expired,

    /// Identity is valid but its role is not allowed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Token could not be signed
    #[error("Token signing failed: {0}")]
    Signing(String),

    /// Credential lookup failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Stored password hash is unusable
    #[error(transparent)]
    Password(#[from] PasswordError),
}

impl AuthError {
    /// True for failures that mean "not authenticated" rather than a server fault
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            AuthError::MissingCredentials
                | AuthError::InvalidCredentials
                | AuthError::Malformed(_)
                | AuthError::InvalidSignature
                | AuthError::Expired
        )
    }
}
