/// Axum authentication middleware
///
/// [`role_guard`] reads `Authorization: Bearer <token>`, verifies it, checks
/// the route group's role set and stores the resulting [`Claims`] in the
/// request extensions.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use axum::{middleware, routing::get, Extension, Router};
/// use housepoints_shared::auth::guard::STAFF;
/// use housepoints_shared::auth::middleware::{role_guard, RouteGuard};
/// use housepoints_shared::auth::token::{Claims, TokenService};
///
/// async fn handler(Extension(claims): Extension<Claims>) -> String {
///     format!("Hello, {}!", claims.username)
/// }
///
/// let tokens = Arc::new(TokenService::new("a-secret-of-at-least-thirty-two-bytes"));
/// let app: Router = Router::new()
///     .route("/teacher/dashboard", get(handler))
///     .layer(middleware::from_fn_with_state(RouteGuard::new(tokens, STAFF), role_guard));
/// ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::{guard::authorize, token::TokenService, AuthError};
use crate::models::user::Role;

/// Middleware state: the token service and the roles admitted by a route group
#[derive(Debug, Clone)]
pub struct RouteGuard {
    tokens: Arc<TokenService>,
    allowed: &'static [Role],
}

impl RouteGuard {
    pub fn new(tokens: Arc<TokenService>, allowed: &'static [Role]) -> Self {
        Self { tokens, allowed }
    }
}

impl AuthError {
    /// HTTP status for this failure
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
            AuthError::Signing(_) | AuthError::Store(_) | AuthError::Password(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self.status_code() {
            StatusCode::FORBIDDEN => "forbidden",
            StatusCode::UNAUTHORIZED => "unauthorized",
            _ => "internal_error",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "authentication failed internally");
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = json!({
            "error": self.error_code(),
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}

/// Extracts the bearer token from request headers
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::Malformed("expected Bearer token".to_string()))
}

/// Rejects requests without a valid token for one of the guard's roles
pub async fn role_guard(
    State(guard): State<RouteGuard>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    // Validate token
    let claims = {
        let token = bearer_token(req.headers())?;
        authorize(&guard.tokens, token, guard.allowed).map_err(|e| {
            tracing::debug!(error = %e, path = %req.uri().path(), "request rejected");
            e
        })?
    };

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            bearer_token(&headers),
            Err(AuthError::MissingCredentials)
        ));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(bearer_token(&headers), Err(AuthError::Malformed(_))));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(matches!(bearer_token(&headers), Err(AuthError::Malformed(_))));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_auth_error_status_codes() {
        assert_eq!(
            AuthError::MissingCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::Expired.into_response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::InvalidSignature.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::Forbidden("students only".to_string())
                .into_response()
                .status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::Signing("boom".to_string()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
