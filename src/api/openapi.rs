use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::api::handlers::{HashRequest, TokenRequest, VerifyRequest};
use crate::response::{Envelope, ErrorBlock};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Service Kit",
        version = "0.1.0",
        description = "Reference service built on the kit. Every answer, success or failure, uses the same envelope: status_code, request_id, message, error and data. Send `Accept: application/xml` for XML.",
    ),
    paths(
        crate::api::handlers::health,
        crate::api::handlers::health_live,
        crate::api::handlers::health_ready,
        crate::api::handlers::issue_token,
        crate::api::handlers::me,
        crate::api::handlers::hash,
        crate::api::handlers::verify,
    ),
    components(
        schemas(
            Envelope,
            ErrorBlock,
            TokenRequest,
            HashRequest,
            VerifyRequest,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Token issue and introspection"),
        (name = "passwords", description = "Password hashing"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
