mod vnd;

pub mod helpers;
pub mod op;
mod secret;

pub use secret::Secret;
pub use vnd::{Vnd, VndConversionError, VND_CURRENCY_CODE};
