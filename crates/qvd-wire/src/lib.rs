#![warn(clippy::pedantic)]

pub mod bits;
pub mod cursor;
pub mod error;

pub use bits::extract_bits;
pub use cursor::{ByteCursor, DEFAULT_CAPACITY};
pub use error::WireError;
