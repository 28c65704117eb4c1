mod cents;
mod helpers;
mod secret;

pub mod op;

pub use cents::{Cents, CentsConversionError, DEFAULT_CURRENCY_CODE};
pub use helpers::{parse_boolean_flag, parse_env_or_default};
pub use secret::Secret;
