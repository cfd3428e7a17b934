//! `catalog-auth`: bearer token validation boundary.
//!
//! This crate is intentionally decoupled from HTTP and messaging: callers hand
//! it the raw `Authorization` value and get claims or an error back.

pub mod claims;
pub mod validator;

pub use claims::Claims;
pub use validator::{bearer_token, JwtTokenValidator, TokenError, TokenValidator};
