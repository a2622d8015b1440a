pub mod password_reset;

pub use password_reset::{request_password_reset, verify_password_reset_token};
