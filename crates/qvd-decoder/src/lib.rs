#![warn(clippy::pedantic)]

pub mod config;
pub mod decoder;
pub mod error;
pub mod header;
pub mod rows;
pub mod streaming;
pub mod symbols;

pub use config::{DecoderConfig, RowErrorPolicy};
pub use decoder::{DecodedTable, QvdDecoder};
pub use error::{DecodeError, HeaderError};
pub use header::{HeaderBoundaryScanner, HeaderParser, HeaderScan, XmlHeaderParser};
pub use rows::RowDecoder;
pub use streaming::{DecoderEvent, StreamingDecoder};
pub use symbols::SymbolTableDecoder;
