pub mod password_reset_request;
pub mod user;

pub use password_reset_request::PasswordResetRequest;
pub use user::User;
