/// Role-based access checks
///
/// Every protected operation states the set of roles it admits. An empty set
/// admits any authenticated identity.
///
/// # Example
///
/// ```no_run
/// use housepoints_shared::auth::guard::{require_owner_or_admin, require_role, STAFF};
/// use housepoints_shared::auth::token::Claims;
/// use uuid::Uuid;
///
/// fn can_edit(claims: &Claims, recorded_by: Uuid) -> bool {
///     require_role(claims, STAFF).is_ok() && require_owner_or_admin(claims, recorded_by).is_ok()
/// }
/// ```

use uuid::Uuid;

use super::{token::{Claims, TokenService}, AuthError};
use crate::models::user::Role;

/// Any authenticated identity
pub const ANY_ROLE: &[Role] = &[];

/// Teachers and administrators
pub const STAFF: &[Role] = &[Role::Teacher, Role::Admin];

pub const STUDENTS: &[Role] = &[Role::Student];

pub const ADMINS: &[Role] = &[Role::Admin];

/// Verifies `token` and checks its role against `allowed`
///
/// # Errors
///
/// Token failures (`Malformed`, `InvalidSignature`, `Expired`) pass through
/// unchanged; a valid identity outside `allowed` fails with `Forbidden`.
pub fn authorize(tokens: &TokenService, token: &str, allowed: &[Role]) -> Result<Claims, AuthError> {
    let claims = tokens.verify(token)?;
    require_role(&claims, allowed)?;
    Ok(claims)
}

/// Checks an already verified identity against `allowed`
pub fn require_role(claims: &Claims, allowed: &[Role]) -> Result<(), AuthError> {
    if allowed.is_empty() || allowed.contains(&claims.role) {
        Ok(())
    } else {
        Err(AuthError::Forbidden(format!(
            "role {} may not perform this action",
            claims.role
        )))
    }
}

/// Admits the recorder of a resource, or any administrator
pub fn require_owner_or_admin(claims: &Claims, owner_id: Uuid) -> Result<(), AuthError> {
    if claims.role == Role::Admin || claims.id == owner_id {
        Ok(())
    } else {
        Err(AuthError::Forbidden(
            "only the recording teacher or an admin may change this result".to_string(),
        ))
    }
}
