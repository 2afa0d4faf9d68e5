use axum::{
    async_trait,
    extract::{FromRef, FromRequest, FromRequestParts, Request},
    http::{header::AUTHORIZATION, request::Parts},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::auth::jwt::{bearer_token, verify_token, Claims};
use crate::errors::Exception;
use crate::validation::{Validate, INVALID_PARAMETERS_MESSAGE};

/// HMAC secret used to verify bearer tokens, provided by the router state
#[derive(Clone)]
pub struct JwtSecret(pub Arc<str>);

impl JwtSecret {
    pub fn new(secret: impl AsRef<str>) -> Self {
        Self(Arc::from(secret.as_ref()))
    }
}

/// Verified claims of the request's bearer token
///
/// ```ignore
/// async fn me(respond: Responder, JwtClaims(claims): JwtClaims) -> Response {
///     respond.data(&claims)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct JwtClaims(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for JwtClaims
where
    JwtSecret: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Exception;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| Exception::unauthenticated("missing authorization header"))?;

        let token = bearer_token(header).ok_or_else(|| {
            Exception::unauthenticated("invalid authorization format, expected: Bearer <token>")
        })?;

        let secret = JwtSecret::from_ref(state);
        let claims = verify_token(token, &secret.0)?;

        Ok(JwtClaims(claims))
    }
}

/// JSON body checked against `T::schema()` before deserialization.
///
/// Malformed JSON is `invalid_data`, rule violations are `invalid_parameter`
/// with one message per field.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = Exception;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|rejection| {
                Exception::invalid_data("invalid request body").with_cause(rejection.body_text())
            })?;

        T::schema()
            .validate(&value)
            .map_err(|errors| Exception::invalid_parameter(INVALID_PARAMETERS_MESSAGE, errors))?;

        serde_json::from_value(value)
            .map(ValidatedJson)
            .map_err(|e| Exception::invalid_data("invalid request body").with_cause(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::generate_token;
    use crate::errors::ErrorKind;
    use crate::validation::{Rule, Schema};
    use axum::{body::Body, http::header::CONTENT_TYPE};
    use serde::Deserialize;
    use std::sync::OnceLock;
    use std::time::Duration;

    const SECRET: &str = "extractor-secret";

    #[derive(Clone)]
    struct State {
        secret: JwtSecret,
    }

    impl FromRef<State> for JwtSecret {
        fn from_ref(state: &State) -> Self {
            state.secret.clone()
        }
    }

    fn state() -> State {
        State {
            secret: JwtSecret::new(SECRET),
        }
    }

    async fn claims_from(authorization: Option<&str>) -> Result<JwtClaims, Exception> {
        let mut builder = axum::http::Request::builder().uri("/");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        JwtClaims::from_request_parts(&mut parts, &state()).await
    }

    #[tokio::test]
    async fn test_valid_bearer_token() {
        let mut claims = Claims::new();
        claims.insert("sub".to_string(), "alice".into());
        let token = generate_token(claims, SECRET, Duration::from_secs(60)).unwrap();

        let JwtClaims(verified) = claims_from(Some(&format!("Bearer {}", token)))
            .await
            .unwrap();
        assert_eq!(verified["sub"], "alice");
    }

    #[tokio::test]
    async fn test_missing_or_malformed_authorization() {
        let missing = claims_from(None).await.unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::Unauthenticated);
        assert_eq!(missing.message(), "missing authorization header");

        let basic = claims_from(Some("Basic Zm9vOmJhcg==")).await.unwrap_err();
        assert_eq!(basic.kind(), ErrorKind::Unauthenticated);

        let forged = claims_from(Some("Bearer not.a.token")).await.unwrap_err();
        assert_eq!(forged.kind(), ErrorKind::Unauthenticated);
        assert_eq!(forged.message(), "invalid or expired token");
    }

    #[derive(Debug, Deserialize)]
    struct Signup {
        email: String,
        age: u8,
    }

    impl Validate for Signup {
        fn schema() -> &'static Schema {
            static SCHEMA: OnceLock<Schema> = OnceLock::new();
            SCHEMA.get_or_init(|| {
                Schema::new()
                    .field("email", &[Rule::Required, Rule::Email])
                    .field("age", &[Rule::Required, Rule::Gte(18.0)])
            })
        }
    }

    async fn signup_from(body: &str) -> Result<ValidatedJson<Signup>, Exception> {
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        ValidatedJson::<Signup>::from_request(request, &()).await
    }

    #[tokio::test]
    async fn test_validated_json_accepts_valid_body() {
        let ValidatedJson(signup) = signup_from(r#"{"email":"a@b.io","age":30}"#)
            .await
            .unwrap();
        assert_eq!(signup.email, "a@b.io");
        assert_eq!(signup.age, 30);
    }

    #[tokio::test]
    async fn test_validated_json_rule_failures() {
        let exc = signup_from(r#"{"email":"nope","age":16}"#).await.unwrap_err();

        assert_eq!(exc.kind(), ErrorKind::InvalidParameter);
        let fields = exc.field_errors().unwrap();
        assert_eq!(fields["email"], "email is not a valid email");
        assert_eq!(fields["age"], "age must be greater than or equal to 18");
    }

    #[tokio::test]
    async fn test_validated_json_malformed_body() {
        let exc = signup_from("{not json").await.unwrap_err();
        assert_eq!(exc.kind(), ErrorKind::InvalidData);
        assert!(exc.cause().is_some());
    }

    #[tokio::test]
    async fn test_validated_json_type_mismatch() {
        // passes the rules, but does not fit in a u8
        let exc = signup_from(r#"{"email":"a@b.io","age":300}"#).await.unwrap_err();
        assert_eq!(exc.kind(), ErrorKind::InvalidData);
    }
}
