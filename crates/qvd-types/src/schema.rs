use std::str::FromStr;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::SchemaError;

/// Name of the header's root element. Its closing tag marks the end of the
/// textual header.
pub const HEADER_ROOT: &str = "QvdTableHeader";

/// Widest symbol index a field may declare.
pub const MAX_BIT_WIDTH: u32 = 32;

/// Largest `RecordByteSize` accepted beyond what the fields themselves need.
/// The row buffer is allocated from this value before any row is read.
pub const MAX_RECORD_BYTE_SIZE: usize = 1 << 20;

/// Layout and dictionary metadata for one column.
///
/// ```text
/// ┌──────────────┬──────────────────┬────────────────────────────────────┐
/// │ Field        │ Header element   │ Meaning                            │
/// ├──────────────┼──────────────────┼────────────────────────────────────┤
/// │ name         │ FieldName        │ column name                        │
/// │ bit_offset   │ BitOffset        │ first bit of the index in the row  │
/// │ bit_width    │ BitWidth         │ index width in bits (0 = constant) │
/// │ bias         │ Bias             │ added to the raw index             │
/// │ symbol_count │ NoOfSymbols      │ entries in the symbol table        │
/// │ symbol_offset│ Offset           │ table start within symbol section  │
/// │ symbol_length│ Length           │ table size in bytes                │
/// │ tags         │ Tags/String      │ free-form tags ($numeric, ...)     │
/// └──────────────┴──────────────────┴────────────────────────────────────┘
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub bit_offset: u32,
    pub bit_width: u32,
    pub bias: i32,
    pub symbol_count: u32,
    pub symbol_offset: Option<u64>,
    pub symbol_length: Option<u64>,
    pub tags: Vec<String>,
}

impl FieldDescriptor {
    /// A field with no bias and no declared symbol byte range.
    pub fn new(name: impl Into<String>, bit_offset: u32, bit_width: u32, symbol_count: u32) -> Self {
        Self {
            name: name.into(),
            bit_offset,
            bit_width,
            symbol_count,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_bias(mut self, bias: i32) -> Self {
        self.bias = bias;
        self
    }

    /// Declare where this field's symbol table sits in the symbol section.
    #[must_use]
    pub fn with_symbol_range(mut self, offset: u64, length: u64) -> Self {
        self.symbol_offset = Some(offset);
        self.symbol_length = Some(length);
        self
    }
}

/// Parsed table header: the ordered field list plus table-level metadata.
///
/// Built once from the header and read-only for the rest of the decode.
/// Construct it with [`TableSchema::from_xml`] for real files or
/// [`TableSchema::new`] when the fields are already known; both validate
/// the row layout.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableSchema {
    pub table_name: String,
    pub build_no: Option<String>,
    pub creator_doc: Option<String>,
    pub create_utc_time: Option<String>,
    pub fields: Vec<FieldDescriptor>,
    /// `RecordByteSize`, if the header declares it.
    pub record_byte_size: Option<usize>,
    /// `NoOfRecords`, if the header declares it.
    pub record_count: Option<u64>,
    /// Table-level `Offset`: byte length of the symbol section.
    pub symbol_section_len: Option<u64>,
    /// Table-level `Length`: byte length of the row section.
    pub row_section_len: Option<u64>,
}

impl TableSchema {
    /// Build and validate a schema from a field list.
    ///
    /// # Errors
    ///
    /// See [`validate`](Self::validate).
    pub fn new(table_name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Result<Self, SchemaError> {
        let schema = Self {
            table_name: table_name.into(),
            fields,
            ..Self::default()
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Parse header bytes (UTF-8, optional BOM).
    ///
    /// # Errors
    ///
    /// [`SchemaError::InvalidUtf8`] plus everything [`from_xml`](Self::from_xml) returns.
    pub fn from_xml_bytes(bytes: &[u8]) -> Result<Self, SchemaError> {
        let text = std::str::from_utf8(bytes).map_err(|e| SchemaError::InvalidUtf8 {
            valid_up_to: e.valid_up_to(),
        })?;
        Self::from_xml(text)
    }

    /// Parse a `<QvdTableHeader>` document.
    ///
    /// Only the elements the decoder needs are read; everything else
    /// (`Lineage`, `NumberFormat`, `Comment`, ...) is skipped.
    ///
    /// # Errors
    ///
    /// Any [`SchemaError`]: malformed XML, wrong root, a field without
    /// `<FieldName>`, non-numeric layout values, or an invalid row layout.
    pub fn from_xml(xml: &str) -> Result<Self, SchemaError> {
        let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut schema = Self::default();
        let mut path: Vec<String> = Vec::new();
        let mut draft: Option<FieldDraft> = None;
        let mut seen_root = false;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    if path.is_empty() {
                        check_root(&name, &mut seen_root)?;
                    }
                    if is_field_header(&path, &name) {
                        draft = Some(FieldDraft::default());
                    }
                    path.push(name);
                }
                Event::Empty(e) => {
                    if path.is_empty() {
                        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                        check_root(&name, &mut seen_root)?;
                    }
                }
                Event::Text(t) => {
                    let text = t.unescape()?;
                    apply_text(&path, &text, &mut schema, draft.as_mut())?;
                }
                Event::End(_) => {
                    let name = path.pop().unwrap_or_default();
                    if is_field_header(&path, &name) {
                        if let Some(done) = draft.take() {
                            let ordinal = schema.fields.len();
                            schema.fields.push(done.finish(ordinal)?);
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = path.pop() {
            return Err(SchemaError::Incomplete { open });
        }
        if !seen_root {
            return Err(SchemaError::UnexpectedRoot { found: String::new() });
        }

        schema.validate()?;
        Ok(schema)
    }

    /// Check that every field fits the row layout.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::BitWidthTooLarge`] for widths over [`MAX_BIT_WIDTH`].
    /// - [`SchemaError::RecordSizeTooSmall`] if `RecordByteSize` cannot hold the fields.
    /// - [`SchemaError::RecordSizeTooLarge`] if `RecordByteSize` exceeds both the
    ///   packed field size and [`MAX_RECORD_BYTE_SIZE`].
    /// - [`SchemaError::FieldOutOfRecord`] if a field's bits run past the row.
    pub fn validate(&self) -> Result<(), SchemaError> {
        for field in &self.fields {
            if field.bit_width > MAX_BIT_WIDTH {
                return Err(SchemaError::BitWidthTooLarge {
                    field: field.name.clone(),
                    width: field.bit_width,
                    limit: MAX_BIT_WIDTH,
                });
            }
        }

        let required = self.packed_row_size();
        if let Some(declared) = self.record_byte_size
            && declared < required
        {
            return Err(SchemaError::RecordSizeTooSmall { declared, required });
        }
        let limit = required.max(MAX_RECORD_BYTE_SIZE);
        if let Some(declared) = self.record_byte_size
            && declared > limit
        {
            return Err(SchemaError::RecordSizeTooLarge { declared, limit });
        }

        let record_bits = self.row_byte_size() as u64 * 8;
        for field in self.fields.iter().filter(|f| f.bit_width > 0) {
            let end = u64::from(field.bit_offset) + u64::from(field.bit_width);
            if end > record_bits {
                return Err(SchemaError::FieldOutOfRecord {
                    field: field.name.clone(),
                    bit_offset: field.bit_offset,
                    end,
                    record_bits,
                });
            }
        }
        Ok(())
    }

    /// Bytes per row: the declared `RecordByteSize`, or the sum of all bit
    /// widths rounded up to a whole byte.
    #[must_use]
    pub fn row_byte_size(&self) -> usize {
        self.record_byte_size.unwrap_or_else(|| self.packed_row_size())
    }

    /// Ordinal of the field called `name`.
    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Total number of symbols across all fields.
    #[must_use]
    pub fn total_symbols(&self) -> u64 {
        self.fields.iter().map(|f| u64::from(f.symbol_count)).sum()
    }

    fn packed_row_size(&self) -> usize {
        let bits: u64 = self.fields.iter().map(|f| u64::from(f.bit_width)).sum();
        usize::try_from(bits.div_ceil(8)).unwrap_or(usize::MAX)
    }
}

/// A `<QvdFieldHeader>` being filled in element by element.
#[derive(Default)]
struct FieldDraft {
    name: Option<String>,
    field: FieldDescriptor,
}

impl FieldDraft {
    fn finish(self, ordinal: usize) -> Result<FieldDescriptor, SchemaError> {
        let name = self.name.ok_or(SchemaError::MissingElement {
            element: "FieldName",
            field: ordinal,
        })?;
        Ok(FieldDescriptor { name, ..self.field })
    }
}

fn check_root(name: &str, seen_root: &mut bool) -> Result<(), SchemaError> {
    if *seen_root || name != HEADER_ROOT {
        return Err(SchemaError::UnexpectedRoot { found: name.to_string() });
    }
    *seen_root = true;
    Ok(())
}

/// True when `name` opens a field header directly under `<Fields>`.
fn is_field_header(parent: &[String], name: &str) -> bool {
    name == "QvdFieldHeader" && parent.len() == 2 && parent[1] == "Fields"
}

fn parse_num<T: FromStr>(element: &str, text: &str) -> Result<T, SchemaError> {
    text.trim().parse().map_err(|_| SchemaError::InvalidNumber {
        element: element.to_string(),
        value: text.to_string(),
    })
}

/// Store element text at the slot its path names.
fn apply_text(
    path: &[String],
    text: &str,
    schema: &mut TableSchema,
    draft: Option<&mut FieldDraft>,
) -> Result<(), SchemaError> {
    let keys: Vec<&str> = path.iter().map(String::as_str).collect();

    match keys.as_slice() {
        ["QvdTableHeader", "TableName"] => schema.table_name = text.to_string(),
        ["QvdTableHeader", "QvBuildNo"] => schema.build_no = Some(text.to_string()),
        ["QvdTableHeader", "CreatorDoc"] => schema.creator_doc = Some(text.to_string()),
        ["QvdTableHeader", "CreateUtcTime"] => schema.create_utc_time = Some(text.to_string()),
        ["QvdTableHeader", leaf @ "RecordByteSize"] => {
            schema.record_byte_size = Some(parse_num(leaf, text)?);
        }
        ["QvdTableHeader", leaf @ "NoOfRecords"] => {
            schema.record_count = Some(parse_num(leaf, text)?);
        }
        ["QvdTableHeader", leaf @ "Offset"] => {
            schema.symbol_section_len = Some(parse_num(leaf, text)?);
        }
        ["QvdTableHeader", leaf @ "Length"] => {
            schema.row_section_len = Some(parse_num(leaf, text)?);
        }
        ["QvdTableHeader", "Fields", "QvdFieldHeader", rest @ ..] => {
            if let Some(draft) = draft {
                apply_field_text(rest, text, draft)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn apply_field_text(rest: &[&str], text: &str, draft: &mut FieldDraft) -> Result<(), SchemaError> {
    let field = &mut draft.field;
    match rest {
        ["FieldName"] => draft.name = Some(text.to_string()),
        [leaf @ "BitOffset"] => field.bit_offset = parse_num(leaf, text)?,
        [leaf @ "BitWidth"] => field.bit_width = parse_num(leaf, text)?,
        [leaf @ "Bias"] => field.bias = parse_num(leaf, text)?,
        [leaf @ "NoOfSymbols"] => field.symbol_count = parse_num(leaf, text)?,
        [leaf @ "Offset"] => field.symbol_offset = Some(parse_num(leaf, text)?),
        [leaf @ "Length"] => field.symbol_length = Some(parse_num(leaf, text)?),
        ["Tags", "String"] => field.tags.push(text.to_string()),
        _ => {}
    }
    Ok(())
}
