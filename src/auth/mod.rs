//! Registration, log in and the bearer token extractors that guard every other route.

mod log_in;
mod register;
mod token;

pub use log_in::log_in;
pub use register::register_user;
pub use token::{AdminUser, AuthUser, DEFAULT_TOKEN_DURATION, JwtKeys};

#[cfg(test)]
pub use token::encode_token;
