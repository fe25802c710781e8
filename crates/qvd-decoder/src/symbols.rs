use std::io::Read;

use qvd_types::{FieldDescriptor, SymbolTable, SymbolTag, SymbolValue, TableSchema};
use qvd_wire::{ByteCursor, WireError};
use tracing::{debug, debug_span};

use crate::error::DecodeError;

/// Upper bound on table slots reserved before any symbol has been read.
const PREALLOC_SYMBOLS: u32 = 4096;

/// Decodes the per-field symbol tables that open the binary section.
///
/// Tables appear back to back in schema order, each holding exactly
/// `NoOfSymbols` tagged entries. `section_start` is the absolute offset of
/// the first table, used to check the header's per-field `Offset` and
/// `Length` when it declares them.
///
/// ```text
///   [field 0: sym 0 | sym 1 | ...][field 1: sym 0 | ...] ... [rows ...]
///    ^ section_start
/// ```
pub struct SymbolTableDecoder<'s> {
  schema: &'s TableSchema,
  section_start: u64,
}

impl<'s> SymbolTableDecoder<'s> {
  #[must_use]
  pub fn new(schema: &'s TableSchema, section_start: u64) -> Self {
    Self {
      schema,
      section_start,
    }
  }

  /// Decode every field's table in schema order.
  ///
  /// # Errors
  ///
  /// The first error from [`decode_field`](Self::decode_field).
  pub fn decode_all<R: Read>(
    &self,
    cursor: &mut ByteCursor<R>,
  ) -> Result<Vec<SymbolTable>, DecodeError> {
    self
      .schema
      .fields
      .iter()
      .map(|field| self.decode_field(cursor, field))
      .collect()
  }

  /// Decode the table of `field`. The cursor must sit on that table's
  /// first byte.
  ///
  /// # Errors
  ///
  /// - [`DecodeError::UnknownSymbolTag`] / [`DecodeError::TruncatedSymbol`] /
  ///   [`DecodeError::InvalidUtf8`] for a bad entry.
  /// - [`DecodeError::SymbolSectionMismatch`] if the table does not start or
  ///   end where the header says.
  pub fn decode_field<R: Read>(
    &self,
    cursor: &mut ByteCursor<R>,
    field: &FieldDescriptor,
  ) -> Result<SymbolTable, DecodeError> {
    let _span = debug_span!("symbol_table", field = %field.name).entered();

    let start = cursor.position() - self.section_start;
    check_range(field, "offset", field.symbol_offset, start)?;

    // NoOfSymbols is untrusted until the symbols are actually read.
    let mut values = Vec::with_capacity(field.symbol_count.min(PREALLOC_SYMBOLS) as usize);
    for index in 0..field.symbol_count {
      values.push(decode_symbol(cursor, &field.name, index)?);
    }

    let length = cursor.position() - self.section_start - start;
    check_range(field, "length", field.symbol_length, length)?;

    debug!(symbols = values.len(), bytes = length, "symbol table decoded");
    Ok(SymbolTable::from(values))
  }
}

/// Decode one tagged symbol.
///
/// The tag byte is always consumed. On an unknown tag nothing further is
/// read: guessing a payload length would misalign every later symbol.
///
/// # Errors
///
/// - [`DecodeError::UnknownSymbolTag`] for a tag outside the defined set.
/// - [`DecodeError::TruncatedSymbol`] if the stream ends inside the symbol.
/// - [`DecodeError::InvalidUtf8`] if a text payload is not UTF-8.
pub fn decode_symbol<R: Read>(
  cursor: &mut ByteCursor<R>,
  field: &str,
  index: u32,
) -> Result<SymbolValue, DecodeError> {
  let offset = cursor.position();
  let truncated = |e: WireError| match e {
    WireError::EndOfStream { .. } => DecodeError::TruncatedSymbol {
      field: field.to_string(),
      index,
      offset,
    },
    other => DecodeError::Wire(other),
  };

  let tag_byte = cursor.next_byte().map_err(truncated)?;
  let tag = SymbolTag::from_wire_id(tag_byte).ok_or_else(|| DecodeError::UnknownSymbolTag {
    tag: tag_byte,
    field: field.to_string(),
    index,
    offset,
  })?;

  let value = match tag {
    SymbolTag::Int => SymbolValue::Int(cursor.read_i32_le().map_err(truncated)?),
    SymbolTag::Double => SymbolValue::Double(cursor.read_f64_le().map_err(truncated)?),
    SymbolTag::Text => SymbolValue::Text(read_text(cursor, field, index, offset)?),
    SymbolTag::DualInt => {
      let number = cursor.read_i32_le().map_err(truncated)?;
      let text = read_text(cursor, field, index, offset)?;
      SymbolValue::DualInt { number, text }
    }
    SymbolTag::DualDouble => {
      let number = cursor.read_f64_le().map_err(truncated)?;
      let text = read_text(cursor, field, index, offset)?;
      SymbolValue::DualDouble { number, text }
    }
  };
  Ok(value)
}

/// Read bytes up to and including a `0x00` terminator; the terminator is
/// consumed but not returned.
fn read_text<R: Read>(
  cursor: &mut ByteCursor<R>,
  field: &str,
  index: u32,
  offset: u64,
) -> Result<String, DecodeError> {
  let mut bytes = Vec::new();
  loop {
    let buffered = cursor.fill_buf()?;
    if buffered.is_empty() {
      return Err(DecodeError::TruncatedSymbol {
        field: field.to_string(),
        index,
        offset,
      });
    }

    if let Some(end) = buffered.iter().position(|&b| b == 0) {
      bytes.extend_from_slice(&buffered[..end]);
      cursor.consume(end + 1);
      break;
    }
    let n = buffered.len();
    bytes.extend_from_slice(buffered);
    cursor.consume(n);
  }

  String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 {
    field: field.to_string(),
    index,
    offset,
  })
}

fn check_range(
  field: &FieldDescriptor,
  what: &'static str,
  declared: Option<u64>,
  actual: u64,
) -> Result<(), DecodeError> {
  match declared {
    Some(declared) if declared != actual => Err(DecodeError::SymbolSectionMismatch {
      field: field.name.clone(),
      what,
      declared,
      actual,
    }),
    _ => Ok(()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use qvd_types::FieldDescriptor;
  use std::io::Cursor;

  fn cursor(bytes: &[u8], capacity: usize) -> ByteCursor<Cursor<Vec<u8>>> {
    ByteCursor::with_capacity(Cursor::new(bytes.to_vec()), capacity)
  }

  #[test]
  fn text_symbol_consumes_tag_payload_and_terminator() {
    let mut c = cursor(b"\x04ACME\x00\xFF", 3);
    let value = decode_symbol(&mut c, "Company", 0).unwrap();
    assert_eq!(value, SymbolValue::Text("ACME".into()));
    // Tag at offset 0, so the cursor now sits 6 bytes past it.
    assert_eq!(c.position(), 1 + 5);
    assert_eq!(c.next_byte().unwrap(), 0xFF);
  }

  #[test]
  fn dual_int_symbol() {
    let mut c = cursor(b"\x05\x2A\x00\x00\x00foo\x00", 2);
    let value = decode_symbol(&mut c, "f", 0).unwrap();
    assert_eq!(
      value,
      SymbolValue::DualInt {
        number: 42,
        text: "foo".into()
      }
    );
    assert!(c.is_exhausted().unwrap());
  }

  #[test]
  fn int_symbol_is_signed_little_endian() {
    let mut bytes = vec![0x01];
    bytes.extend_from_slice(&(-123_456i32).to_le_bytes());
    let value = decode_symbol(&mut cursor(&bytes, 4), "f", 0).unwrap();
    assert_eq!(value, SymbolValue::Int(-123_456));
  }

  #[test]
  fn double_symbols_keep_exact_bits() {
    for bits in [(-0.0f64).to_bits(), 0x7FF8_0000_0000_BEEF, 3.25f64.to_bits()] {
      let mut bytes = vec![0x02];
      bytes.extend_from_slice(&bits.to_le_bytes());
      let mut c = cursor(&bytes, 3);
      match decode_symbol(&mut c, "f", 0).unwrap() {
        SymbolValue::Double(d) => assert_eq!(d.to_bits(), bits),
        other => panic!("expected Double, got {other:?}"),
      }
      assert_eq!(c.position(), 9);
    }
  }

  #[test]
  fn dual_double_symbol() {
    let mut bytes = vec![0x06];
    bytes.extend_from_slice(&1.5f64.to_le_bytes());
    bytes.extend_from_slice(b"1,5\x00");
    let value = decode_symbol(&mut cursor(&bytes, 5), "f", 0).unwrap();
    assert_eq!(
      value,
      SymbolValue::DualDouble {
        number: 1.5,
        text: "1,5".into()
      }
    );
  }

  #[test]
  fn empty_text_symbol() {
    let value = decode_symbol(&mut cursor(b"\x04\x00", 8), "f", 0).unwrap();
    assert_eq!(value, SymbolValue::Text(String::new()));
  }

  #[test]
  fn unknown_tag_halts_without_consuming_payload() {
    let mut c = cursor(b"\x7F\x01\x02\x03\x04", 8);
    let err = decode_symbol(&mut c, "Region", 3).unwrap_err();
    assert!(matches!(
      err,
      DecodeError::UnknownSymbolTag { tag: 0x7F, index: 3, offset: 0, ref field } if field == "Region"
    ));
    assert_eq!(c.position(), 1);
    assert_eq!(c.next_byte().unwrap(), 0x01);
  }

  #[test]
  fn unterminated_text_is_truncated() {
    let err = decode_symbol(&mut cursor(b"\x04abc", 2), "f", 7).unwrap_err();
    assert!(matches!(err, DecodeError::TruncatedSymbol { index: 7, offset: 0, .. }));
  }

  #[test]
  fn short_numeric_payload_is_truncated() {
    let err = decode_symbol(&mut cursor(b"\x02\x00\x00\x00", 8), "f", 0).unwrap_err();
    assert!(matches!(err, DecodeError::TruncatedSymbol { .. }));
  }

  #[test]
  fn missing_tag_is_truncated() {
    let err = decode_symbol(&mut cursor(b"", 8), "f", 0).unwrap_err();
    assert!(matches!(err, DecodeError::TruncatedSymbol { .. }));
  }

  #[test]
  fn invalid_utf8_text_is_rejected() {
    let err = decode_symbol(&mut cursor(b"\x04\xFF\xFE\x00", 8), "f", 0).unwrap_err();
    assert!(matches!(err, DecodeError::InvalidUtf8 { .. }));
  }

  #[test]
  fn decodes_tables_in_schema_order() {
    let schema = TableSchema::new(
      "t",
      vec![
        FieldDescriptor::new("a", 0, 1, 2).with_symbol_range(0, 10),
        FieldDescriptor::new("b", 1, 1, 1).with_symbol_range(10, 3),
      ],
    )
    .unwrap();

    let mut bytes = vec![0x01, 7, 0, 0, 0, 0x01, 8, 0, 0, 0];
    bytes.extend_from_slice(b"\x04x\x00");
    bytes.push(0xAA); // first row byte
    let mut c = cursor(&bytes, 4);

    let tables = SymbolTableDecoder::new(&schema, 0).decode_all(&mut c).unwrap();
    assert_eq!(tables.len(), 2);
    assert_eq!(tables[0].get(1), Some(&SymbolValue::Int(8)));
    assert_eq!(tables[1].get(0), Some(&SymbolValue::Text("x".into())));
    assert_eq!(c.next_byte().unwrap(), 0xAA);
  }

  #[test]
  fn declared_length_mismatch_is_reported() {
    let schema = TableSchema::new(
      "t",
      vec![FieldDescriptor::new("a", 0, 1, 1).with_symbol_range(0, 4)],
    )
    .unwrap();
    let mut c = cursor(&[0x01, 1, 0, 0, 0], 8);
    let err = SymbolTableDecoder::new(&schema, 0)
      .decode_field(&mut c, &schema.fields[0])
      .unwrap_err();
    assert!(matches!(
      err,
      DecodeError::SymbolSectionMismatch { what: "length", declared: 4, actual: 5, .. }
    ));
  }

  #[test]
  fn huge_declared_count_runs_out_of_input() {
    let schema = TableSchema::new("t", vec![FieldDescriptor::new("a", 0, 32, 4_000_000_000)]).unwrap();
    let mut c = cursor(&[0x01, 1, 0, 0, 0], 8);
    let err = SymbolTableDecoder::new(&schema, 0).decode_all(&mut c).unwrap_err();
    assert!(matches!(err, DecodeError::TruncatedSymbol { index: 1, .. }));
  }
}
