/// Errors raised while turning the header XML into a [`TableSchema`]
/// or while checking that a schema describes a decodable row layout.
///
/// ```text
/// ┌──────────────────────────────────────────────────────┐
/// │ SchemaError                                          │
/// │   ├── InvalidUtf8 / Xml / Incomplete  ← document     │
/// │   ├── UnexpectedRoot / MissingElement ← structure    │
/// │   ├── InvalidNumber                   ← element text │
/// │   └── BitWidthTooLarge / FieldOutOfRecord /          │
/// │       RecordSizeTooSmall / RecordSizeTooLarge        │
/// │                                       ← row layout   │
/// └──────────────────────────────────────────────────────┘
/// ```
///
/// [`TableSchema`]: crate::TableSchema
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
  /// The header bytes are not UTF-8.
  #[error("header is not valid UTF-8 (valid up to byte {valid_up_to})")]
  InvalidUtf8 { valid_up_to: usize },

  /// The XML reader rejected the document.
  #[error("header XML is not well-formed: {0}")]
  Xml(#[from] quick_xml::Error),

  /// The document ended with elements still open.
  #[error("header XML ended inside <{open}>")]
  Incomplete { open: String },

  /// The root element is not `<QvdTableHeader>`.
  #[error("expected <QvdTableHeader> root element, found {found:?}")]
  UnexpectedRoot { found: String },

  /// A required element was absent.
  #[error("missing <{element}> in field #{field}")]
  MissingElement { element: &'static str, field: usize },

  /// A numeric element held text that does not parse.
  #[error("<{element}> holds {value:?}, expected a number")]
  InvalidNumber { element: String, value: String },

  /// A field declares more bits than a symbol index may use.
  #[error("field {field:?} declares bit width {width}, limit is {limit}")]
  BitWidthTooLarge { field: String, width: u32, limit: u32 },

  /// A field's bit range does not fit inside the row.
  #[error("field {field:?} bits [{bit_offset}..{end}) exceed the {record_bits}-bit row")]
  FieldOutOfRecord {
    field: String,
    bit_offset: u32,
    end: u64,
    record_bits: u64,
  },

  /// The declared `RecordByteSize` is smaller than the fields require.
  #[error("RecordByteSize {declared} is smaller than the {required} bytes the fields need")]
  RecordSizeTooSmall { declared: usize, required: usize },

  /// The declared `RecordByteSize` is larger than any row layout needs.
  #[error("RecordByteSize {declared} exceeds the {limit}-byte limit")]
  RecordSizeTooLarge { declared: usize, limit: usize },
}
