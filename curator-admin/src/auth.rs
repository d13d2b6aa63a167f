//! HMAC-SHA256 admin JWTs, matching
//! `original_source/backend/app/core/security.py`'s claim shape
//! (`{alg:"HS256",typ:"JWT"}` header, `sub`/`iat`/`exp` payload) but built
//! with the `jsonwebtoken` crate rather than hand-rolled HMAC.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing admin token")]
    Missing,
    #[error("invalid admin token")]
    Invalid,
    #[error("forbidden")]
    Forbidden,
}

pub fn create_jwt(secret_key: &str, subject: &str, ttl_s: i64, now: i64) -> Result<String, AuthError> {
    let claims = AdminClaims {
        sub: subject.to_string(),
        iat: now,
        exp: now + ttl_s,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret_key.as_bytes()),
    )
    .map_err(|_| AuthError::Invalid)
}

pub fn decode_jwt(token: &str, secret_key: &str) -> Result<AdminClaims, AuthError> {
    let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.set_required_spec_claims(&["exp"]);
    decode::<AdminClaims>(token, &DecodingKey::from_secret(secret_key.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|_| AuthError::Invalid)
}

pub fn parse_bearer_token(authorization: Option<&str>) -> Option<&str> {
    let header = authorization?.trim();
    let (scheme, token) = header.split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

pub fn require_admin(
    authorization: Option<&str>,
    secret_key: &str,
    admin_username: &str,
) -> Result<AdminClaims, AuthError> {
    let token = parse_bearer_token(authorization).ok_or(AuthError::Missing)?;
    let claims = decode_jwt(token, secret_key)?;
    if claims.sub != admin_username {
        return Err(AuthError::Forbidden);
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_create_and_decode() {
        let token = create_jwt("secret", "admin", 3600, 1_000).unwrap();
        let claims = decode_jwt(&token, "secret").unwrap();
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.iat, 1_000);
        assert_eq!(claims.exp, 4_600);
    }

    #[test]
    fn decode_with_wrong_secret_fails() {
        let token = create_jwt("secret", "admin", 3600, 1_000).unwrap();
        assert!(decode_jwt(&token, "other").is_err());
    }

    #[test]
    fn parse_bearer_token_rejects_wrong_scheme() {
        assert!(parse_bearer_token(Some("Basic abc")).is_none());
        assert_eq!(parse_bearer_token(Some("Bearer abc")), Some("abc"));
    }

    #[test]
    fn require_admin_rejects_wrong_subject() {
        let token = create_jwt("secret", "someone-else", 3600, 1_000).unwrap();
        let header = format!("Bearer {token}");
        let err = require_admin(Some(&header), "secret", "admin").unwrap_err();
        assert!(matches!(err, AuthError::Forbidden));
    }

    #[test]
    fn require_admin_rejects_missing_header() {
        assert!(matches!(require_admin(None, "secret", "admin"), Err(AuthError::Missing)));
    }
}
