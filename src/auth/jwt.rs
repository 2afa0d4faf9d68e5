// JWT issue and verification over HMAC-SHA2 (HS256 / HS384 / HS512)

use chrono::Utc;
use jsonwebtoken::{
    decode, decode_header, encode, errors::Error as JwtError, Algorithm, DecodingKey, EncodingKey,
    Header, Validation,
};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::errors::Exception;

/// Free-form claim set
pub type Claims = Map<String, Value>;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Sign(#[source] JwtError),

    #[error("unexpected signing method: {0:?}")]
    UnexpectedAlgorithm(Algorithm),

    #[error("invalid token: {0}")]
    Invalid(#[source] JwtError),
}

impl From<TokenError> for Exception {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Sign(_) => Exception::internal("failed to issue token").with_cause(err),
            _ => Exception::unauthenticated("invalid or expired token").with_cause(err),
        }
    }
}

/// Sign `claims` with HS256.
///
/// A `jti` is generated unless the caller supplied one; `iat` and `exp` are
/// always overwritten.
pub fn generate_token(mut claims: Claims, secret: &str, ttl: Duration) -> Result<String, TokenError> {
    claims
        .entry("jti")
        .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));

    let now = Utc::now().timestamp();
    claims.insert("iat".to_string(), now.into());
    claims.insert("exp".to_string(), (now + ttl.as_secs() as i64).into());

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(TokenError::Sign)
}

/// Verify signature and expiry, returning the claim set
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, TokenError> {
    let header = decode_header(token).map_err(TokenError::Invalid)?;
    if !matches!(
        header.alg,
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
    ) {
        return Err(TokenError::UnexpectedAlgorithm(header.alg));
    }

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(header.alg),
    )
    .map(|data| data.claims)
    .map_err(TokenError::Invalid)
}

/// Token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use serde_json::json;

    const TEST_SECRET: &str = "test-secret-key-for-unit-tests";
    const HOUR: Duration = Duration::from_secs(3600);

    fn claims(value: Value) -> Claims {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn generate_and_verify_token() {
        let token = generate_token(claims(json!({"sub": "alice", "role": "admin"})), TEST_SECRET, HOUR)
            .expect("valid token");

        let verified = verify_token(&token, TEST_SECRET).expect("valid verification");
        assert_eq!(verified["sub"], "alice");
        assert_eq!(verified["role"], "admin");
        assert!(verified["jti"].as_str().is_some_and(|jti| !jti.is_empty()));
    }

    #[test]
    fn expiry_and_issued_at_set() {
        let token = generate_token(Claims::new(), TEST_SECRET, HOUR).unwrap();
        let verified = verify_token(&token, TEST_SECRET).unwrap();

        let iat = verified["iat"].as_i64().unwrap();
        let exp = verified["exp"].as_i64().unwrap();
        let now = Utc::now().timestamp();

        assert!(iat <= now && iat > now - 10);
        assert_eq!(exp - iat, 3600);
    }

    #[test]
    fn caller_jti_preserved() {
        let token = generate_token(claims(json!({"jti": "fixed-id"})), TEST_SECRET, HOUR).unwrap();
        let verified = verify_token(&token, TEST_SECRET).unwrap();
        assert_eq!(verified["jti"], "fixed-id");
    }

    #[test]
    fn wrong_secret_fails() {
        let token = generate_token(Claims::new(), TEST_SECRET, HOUR).unwrap();
        assert!(matches!(
            verify_token(&token, "wrong-secret"),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn invalid_token_fails() {
        assert!(verify_token("invalid.token.string", TEST_SECRET).is_err());
    }

    #[test]
    fn expired_token_fails() {
        let past = Utc::now().timestamp() - 3600;
        let token = encode(
            &Header::new(Algorithm::HS256),
            &json!({"sub": "alice", "exp": past}),
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            verify_token(&token, TEST_SECRET),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn other_hmac_variants_accepted() {
        let exp = Utc::now().timestamp() + 600;
        for alg in [Algorithm::HS384, Algorithm::HS512] {
            let token = encode(
                &Header::new(alg),
                &json!({"sub": "bob", "exp": exp}),
                &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
            )
            .unwrap();
            assert_eq!(verify_token(&token, TEST_SECRET).unwrap()["sub"], "bob");
        }
    }

    #[test]
    fn non_hmac_algorithm_rejected() {
        // {"alg":"ES256","typ":"JWT"}.{"sub":"alice","exp":4102444800}.sig
        let token = "eyJhbGciOiJFUzI1NiIsInR5cCI6IkpXVCJ9.eyJzdWIiOiJhbGljZSIsImV4cCI6NDEwMjQ0NDgwMH0.c2ln";
        assert!(matches!(
            verify_token(token, TEST_SECRET),
            Err(TokenError::UnexpectedAlgorithm(Algorithm::ES256))
        ));
    }

    #[test]
    fn token_errors_become_unauthenticated() {
        let err = verify_token("garbage", TEST_SECRET).unwrap_err();
        let exc = Exception::from(err);
        assert_eq!(exc.kind(), ErrorKind::Unauthenticated);
        assert_eq!(exc.message(), "invalid or expired token");
        assert!(exc.cause().is_some());
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("bearer  xyz "), Some("xyz"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(bearer_token(""), None);
    }
}
