pub mod clock;
pub mod email;
pub mod events;
pub mod password_reset;
pub mod token;

pub use clock::{Clock, SystemClock};
pub use email::EmailService;
pub use events::{EventSink, NoopEventSink, PasswordResetIssued};
pub use password_reset::PasswordResetService;
pub use token::{AlphanumericTokenGenerator, TokenGenerator};
