#![warn(clippy::pedantic)]

pub mod error;
pub mod row;
pub mod schema;
pub mod symbol;

pub use error::SchemaError;
pub use row::Row;
pub use schema::{FieldDescriptor, TableSchema, HEADER_ROOT, MAX_BIT_WIDTH, MAX_RECORD_BYTE_SIZE};
pub use symbol::{SymbolTable, SymbolTag, SymbolValue};
