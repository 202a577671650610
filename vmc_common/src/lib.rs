mod cents;

pub mod helpers;
pub mod op;
mod secret;

pub use cents::{Cents, CentsConversionError, CURRENCY_SYMBOL};
pub use secret::Secret;
