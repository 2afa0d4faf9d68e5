pub mod jwt;
pub mod password;

pub use jwt::{bearer_token, generate_token, verify_token, Claims, TokenError};
pub use password::{compare_password, hash_password, verify_password};
