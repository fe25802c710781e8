use std::io::Read;
use std::sync::Arc;

use qvd_types::{FieldDescriptor, Row, SymbolTable, SymbolValue, TableSchema};
use qvd_wire::{ByteCursor, extract_bits};

use crate::error::DecodeError;

/// Turns the bit-packed row section into [`Row`] values.
///
/// Every row is `row_byte_size` bytes. Within a row each field owns
/// `bit_width` bits starting at `bit_offset`, numbered LSB-first from the
/// row's first byte. Those bits form an unsigned index; adding the field's
/// bias gives the position in its symbol table, and a negative result is
/// `Null`.
///
/// ```text
///   row bytes:   [ b0 ][ b1 ] ...
///   bit order:    0..7  8..15 ...   (bit 0 = LSB of b0)
///   field k:     bits [bit_offset .. bit_offset + bit_width)
/// ```
///
/// A row is read off the cursor in full before any field is resolved, so
/// a consumer that stops between rows never leaves a half-read record.
pub struct RowDecoder {
  schema: Arc<TableSchema>,
  tables: Vec<Arc<SymbolTable>>,
  row_size: usize,
  buf: Vec<u8>,
  next_row: u64,
}

impl RowDecoder {
  /// Create a decoder over `tables`, one per schema field in order.
  ///
  /// # Panics
  ///
  /// Panics if the number of tables differs from the number of fields.
  #[must_use]
  pub fn new(schema: Arc<TableSchema>, tables: Vec<Arc<SymbolTable>>) -> Self {
    assert_eq!(
      schema.fields.len(),
      tables.len(),
      "one symbol table per field"
    );
    let row_size = schema.row_byte_size();
    Self {
      schema,
      tables,
      row_size,
      buf: vec![0u8; row_size],
      next_row: 0,
    }
  }

  /// Bytes per row.
  #[must_use]
  pub fn row_size(&self) -> usize {
    self.row_size
  }

  /// Rows read so far, including rows that failed to resolve.
  #[must_use]
  pub fn rows_read(&self) -> u64 {
    self.next_row
  }

  /// Read and resolve the next row. `Ok(None)` means the stream ended
  /// cleanly on a row boundary.
  ///
  /// A table whose fields are all zero-width has zero-byte rows; those
  /// consume nothing, so the declared `NoOfRecords` sets how many exist.
  ///
  /// # Errors
  ///
  /// - [`DecodeError::TruncatedRow`] if the stream ends inside a row.
  /// - [`DecodeError::SymbolIndexOutOfRange`] if a field's index has no symbol.
  ///   The row has been fully consumed, so the next call reads the next row.
  pub fn read_row<R: Read>(
    &mut self,
    cursor: &mut ByteCursor<R>,
  ) -> Result<Option<Row>, DecodeError> {
    if self.row_size == 0 {
      let declared = self.schema.record_count.unwrap_or(0);
      if self.next_row >= declared {
        return Ok(None);
      }
      let number = self.take_row_number();
      return self.decode_row(number, &[]).map(Some);
    }

    let offset = cursor.position();
    let got = cursor.read_up_to(&mut self.buf)?;
    if got == 0 {
      return Ok(None);
    }

    let number = self.take_row_number();
    if got < self.row_size {
      return Err(DecodeError::TruncatedRow {
        row: number,
        offset,
        expected: self.row_size,
        available: got,
      });
    }
    self.decode_row(number, &self.buf).map(Some)
  }

  /// Resolve one row from its packed bytes.
  ///
  /// # Errors
  ///
  /// - [`DecodeError::SymbolIndexOutOfRange`] if an index has no symbol.
  /// - [`DecodeError::Wire`] if `bytes` is shorter than the fields need.
  pub fn decode_row(&self, number: u64, bytes: &[u8]) -> Result<Row, DecodeError> {
    let values = self
      .schema
      .fields
      .iter()
      .zip(&self.tables)
      .map(|(field, table)| {
        let raw = extract_bits(bytes, field.bit_offset, field.bit_width)?;
        resolve(field, table, raw, number)
      })
      .collect::<Result<Vec<_>, DecodeError>>()?;

    Ok(Row { number, values })
  }

  fn take_row_number(&mut self) -> u64 {
    let number = self.next_row;
    self.next_row += 1;
    number
  }
}

/// Map a raw bit-field value to the symbol it names.
///
/// A zero-width field with an empty table has no value to name and
/// resolves to `Null`.
///
/// # Errors
///
/// [`DecodeError::SymbolIndexOutOfRange`] if `raw + bias` is past the table.
pub fn resolve(
  field: &FieldDescriptor,
  table: &SymbolTable,
  raw: u64,
  row: u64,
) -> Result<SymbolValue, DecodeError> {
  if field.bit_width == 0 && table.is_empty() {
    return Ok(SymbolValue::Null);
  }

  let index = i64::try_from(raw).unwrap_or(i64::MAX).saturating_add(i64::from(field.bias));
  if index < 0 {
    return Ok(SymbolValue::Null);
  }

  usize::try_from(index)
    .ok()
    .and_then(|i| table.get(i))
    .cloned()
    .ok_or_else(|| DecodeError::SymbolIndexOutOfRange {
      row,
      field: field.name.clone(),
      index,
      symbols: table.len(),
    })
}
