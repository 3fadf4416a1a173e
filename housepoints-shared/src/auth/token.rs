/// Session token service
///
/// Issues and verifies HS256-signed JWTs carrying `{id, role, username}`.
/// Tokens are stateless: nothing is stored server-side, so there is no
/// revocation. Logging out only discards the token on the client, and a
/// leaked token stays valid until it expires.
///
/// # Verification
///
/// - signature must match the process-wide secret (`InvalidSignature`)
/// - issuer must be `housepoints` (`Malformed`)
/// - `now > exp` fails with `Expired`, even when the signature is valid
/// - anything that does not decode fails with `Malformed`
///
/// Expiry is checked against an explicit clock rather than by the JWT
/// library, with no leeway, so `verify_at` is deterministic.
///
/// # Example
///
/// ```no_run
/// use housepoints_shared::auth::token::TokenService;
/// # use housepoints_shared::models::user::User;
///
/// # fn example(user: &User) -> Result<(), Box<dyn std::error::Error>> {
/// let tokens = TokenService::new("a-secret-of-at-least-thirty-two-bytes");
/// let session = tokens.issue(user)?;
/// let claims = tokens.verify(&session.token)?;
/// assert_eq!(claims.id, user.id);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::AuthError;
use crate::models::user::{Role, User};

/// Issuer written into and required from every token
pub const ISSUER: &str = "housepoints";

/// Default session lifetime
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// Identity recovered from a verified token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub id: Uuid,

    pub username: String,

    pub role: Role,

    /// Issuer
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// True once `now` is past the expiration time
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() > self.exp
    }

    /// Expiration as a timestamp
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// A freshly issued token together with the claims it encodes
#[derive(Debug, Clone)]
pub struct SessionToken {
    /// Encoded JWT
    pub token: String,

    pub claims: Claims,
}

/// Issues and verifies session tokens with one signing secret
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Creates a service with the default 24 hour lifetime
    pub fn new(secret: &str) -> Self {
        Self::with_ttl(secret, Duration::hours(DEFAULT_TTL_HOURS))
    }

    /// Creates a service with a custom token lifetime
    pub fn with_ttl(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Token lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a token for `user`, valid from now for the configured lifetime
    pub fn issue(&self, user: &User) -> Result<SessionToken, AuthError> {
        self.issue_at(user, Utc::now())
    }

    /// Issues a token as if the current time were `now`
    pub fn issue_at(&self, user: &User, now: DateTime<Utc>) -> Result<SessionToken, AuthError> {
        let claims = Claims {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(format!("Token encoding failed: {}", e)))?;

        Ok(SessionToken { token, claims })
    }

    /// Verifies a token against the current time
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, Utc::now())
    }

    /// Verifies a token as if the current time were `now`
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.validate_exp = false;
        validation.validate_nbf = false;

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidIssuer => AuthError::Malformed("unexpected token issuer".to_string()),
                _ => AuthError::Malformed(e.to_string()),
            }
        })?;

        if data.claims.is_expired_at(now) {
            return Err(AuthError::Expired);
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            username: "hermione".to_string(),
            password_hash: String::new(),
            role,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_issue_then_verify_returns_identity() {
        let tokens = TokenService::new(SECRET);

        for role in [Role::Student, Role::Teacher, Role::Admin] {
            let user = user(role);
            let session = tokens.issue(&user).unwrap();
            let claims = tokens.verify(&session.token).unwrap();

            assert_eq!(claims.id, user.id);
            assert_eq!(claims.username, user.username);
            assert_eq!(claims.role, role);
            assert_eq!(claims.iss, ISSUER);
            assert_eq!(claims, session.claims);
        }
    }

    #[test]
    fn test_default_ttl_is_24_hours() {
        let tokens = TokenService::new(SECRET);
        let now = Utc::now();
        let session = tokens.issue_at(&user(Role::Teacher), now).unwrap();

        assert_eq!(tokens.ttl(), Duration::hours(24));
        assert_eq!(session.claims.exp - session.claims.iat, 24 * 3600);
        assert_eq!(session.claims.expires_at().timestamp(), session.claims.exp);
    }

    #[test]
    fn test_valid_until_expiry_then_expired() {
        let tokens = TokenService::with_ttl(SECRET, Duration::hours(1));
        let issued = Utc::now();
        let session = tokens.issue_at(&user(Role::Teacher), issued).unwrap();

        let just_before = issued + Duration::minutes(59);
        assert!(tokens.verify_at(&session.token, just_before).is_ok());

        let at_expiry = issued + Duration::hours(1);
        assert!(tokens.verify_at(&session.token, at_expiry).is_ok());

        let after = issued + Duration::hours(1) + Duration::seconds(1);
        assert!(matches!(
            tokens.verify_at(&session.token, after),
            Err(AuthError::Expired)
        ));
    }

    #[test]
    fn test_expired_token_with_valid_signature() {
        let tokens = TokenService::new(SECRET);
        let session = tokens
            .issue_at(&user(Role::Admin), Utc::now() - Duration::hours(25))
            .unwrap();

        assert!(matches!(tokens.verify(&session.token), Err(AuthError::Expired)));
    }

    #[test]
    fn test_wrong_secret_is_invalid_signature() {
        let session = TokenService::new(SECRET).issue(&user(Role::Teacher)).unwrap();
        let other = TokenService::new("another-secret-that-is-also-32-bytes!!");

        assert!(matches!(
            other.verify(&session.token),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let tokens = TokenService::new(SECRET);
        let session = tokens.issue(&user(Role::Student)).unwrap();

        let parts: Vec<&str> = session.token.split('.').collect();
        let forged_claims = Claims {
            role: Role::Admin,
            ..session.claims.clone()
        };
        let forged_payload = {
            let other = TokenService::new("attacker-controlled-secret-32-bytes!!");
            let forged = encode(&Header::new(Algorithm::HS256), &forged_claims, &other.encoding)
                .unwrap();
            forged.split('.').nth(1).unwrap().to_string()
        };
        let tampered = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert!(matches!(
            tokens.verify(&tampered),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let tokens = TokenService::new(SECRET);

        assert!(matches!(tokens.verify("not-a-jwt"), Err(AuthError::Malformed(_))));
        assert!(matches!(tokens.verify(""), Err(AuthError::Malformed(_))));
    }
}
