/// Username/password authentication against stored users

use std::sync::OnceLock;
use tracing::debug;

use super::{
    password::{hash_password, verify_password},
    AuthError,
};
use crate::models::user::User;
use crate::store::SchoolStore;

/// Hash checked when the username is unknown, so both rejections cost one
/// full Argon2id verification
fn decoy_hash() -> Option<&'static str> {
    static DECOY: OnceLock<Option<String>> = OnceLock::new();
    DECOY
        .get_or_init(|| hash_password("housepoints-decoy-password").ok())
        .as_deref()
}

/// Looks up `username` and checks `password` against its stored hash
///
/// # Errors
///
/// - `InvalidCredentials` for an unknown username or a wrong password
/// - `Store` if the lookup itself fails
/// - `Password` if the stored hash cannot be parsed
pub async fn authenticate(
    store: &dyn SchoolStore,
    username: &str,
    password: &str,
) -> Result<User, AuthError> {
    let Some(user) = store.find_user_by_username(username).await? else {
        if let Some(decoy) = decoy_hash() {
            let _ = verify_password(password, decoy);
        }
        debug!(username, "login rejected: unknown user");
        return Err(AuthError::InvalidCredentials);
    };

    if !verify_password(password, &user.password_hash)? {
        debug!(username, "login rejected: wrong password");
        return Err(AuthError::InvalidCredentials);
    }

    Ok(user)
}
