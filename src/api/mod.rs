pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod responder;
pub mod routes;
pub mod server;

pub use extract::{JwtClaims, JwtSecret, ValidatedJson};
pub use responder::Responder;
pub use server::Server;
