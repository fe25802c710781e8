use std::path::PathBuf;

use qvd_types::SchemaError;
use qvd_wire::WireError;

/// Why the textual header could not be turned into a schema.
#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    /// The stream ended before the end marker appeared.
    #[error("end marker {marker:?} not found in {scanned} bytes")]
    MarkerNotFound { marker: String, scanned: u64 },

    /// The header grew past the configured limit without an end marker.
    #[error("header exceeds {limit} bytes")]
    TooLarge { limit: usize },

    /// The header text was found but does not describe a valid table.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Errors that can occur while decoding a table file.
///
/// ```text
///   DecodeError
///   ├── StreamUnavailable        ← file could not be opened
///   ├── MalformedHeader          ← XML or end marker problem (fatal)
///   ├── EmptyPayload             ← header present, no binary section
///   ├── UnknownSymbolTag         ─┐ symbol table lost alignment,
///   ├── TruncatedSymbol           │ the rest of the file is unreliable
///   ├── InvalidUtf8               │
///   ├── SymbolSectionMismatch    ─┘
///   ├── SymbolIndexOutOfRange    ─┐ row-local
///   ├── TruncatedRow             ─┘
///   ├── RowCountMismatch         ← clean end after the wrong row count
///   ├── Wire(WireError)
///   └── Io(std::io::Error)
/// ```
///
/// Every variant carries what is needed to tell corruption apart from a
/// schema mismatch: field name, symbol index, row number, byte offset.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("cannot open {}: {source}", path.display())]
    StreamUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed header: {0}")]
    MalformedHeader(#[from] HeaderError),

    /// A well-formed header with nothing after it. Reported instead of an
    /// empty success so a truncated copy is not mistaken for an empty table.
    #[error("header ({header_len} bytes) is not followed by any data")]
    EmptyPayload { header_len: u64 },

    /// A symbol starts with a tag byte outside the defined set. Nothing
    /// after the tag is consumed, since the payload length is unknown.
    #[error("unknown symbol tag {tag:#04X} for symbol {index} of field {field:?} at offset {offset}")]
    UnknownSymbolTag {
        tag: u8,
        field: String,
        index: u32,
        offset: u64,
    },

    /// The stream ended inside a symbol (numeric payload or missing NUL).
    #[error("symbol {index} of field {field:?} starting at offset {offset} is truncated")]
    TruncatedSymbol {
        field: String,
        index: u32,
        offset: u64,
    },

    #[error("symbol {index} of field {field:?} at offset {offset} is not valid UTF-8")]
    InvalidUtf8 {
        field: String,
        index: u32,
        offset: u64,
    },

    /// A field's symbol table does not sit where its header says.
    #[error("field {field:?} symbol table {what} is {actual}, header declares {declared}")]
    SymbolSectionMismatch {
        field: String,
        what: &'static str,
        declared: u64,
        actual: u64,
    },

    /// A row references a symbol that does not exist.
    #[error("row {row}: field {field:?} index {index} outside 0..{symbols}")]
    SymbolIndexOutOfRange {
        row: u64,
        field: String,
        index: i64,
        symbols: usize,
    },

    /// The stream ended part-way through a row.
    #[error("row {row} at offset {offset} is truncated: {available} of {expected} bytes")]
    TruncatedRow {
        row: u64,
        offset: u64,
        expected: usize,
        available: usize,
    },

    #[error("header declares {declared} rows, stream holds {actual}")]
    RowCountMismatch { declared: u64, actual: u64 },

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    /// True for errors confined to a single row. The row's bytes have
    /// been consumed, so decoding can go on with the next one.
    #[must_use]
    pub fn is_row_local(&self) -> bool {
        matches!(
            self,
            Self::SymbolIndexOutOfRange { .. } | Self::TruncatedRow { .. }
        )
    }
}
