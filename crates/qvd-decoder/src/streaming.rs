use std::io::Read;
use std::mem;
use std::sync::Arc;

use qvd_types::{Row, SymbolTable, TableSchema};
use qvd_wire::ByteCursor;
use tracing::{debug, warn};

use crate::config::{DecoderConfig, RowErrorPolicy};
use crate::error::DecodeError;
use crate::header::{HeaderBoundaryScanner, HeaderParser, XmlHeaderParser};
use crate::rows::RowDecoder;
use crate::symbols::SymbolTableDecoder;

/// Events emitted by the streaming decoder, in stream order.
///
/// ```text
///   Header(schema)
///   SymbolTable { field: 0, .. }
///   SymbolTable { field: 1, .. }
///   ...
///   Row(row 0)
///   Row(row 1)
///   ... (stream ends cleanly on a row boundary)
/// ```
#[derive(Clone, Debug)]
pub enum DecoderEvent {
  /// The header was parsed and the cursor sits on the first symbol byte.
  Header(Arc<TableSchema>),

  /// The symbol table of the field at ordinal `field` is complete.
  SymbolTable {
    field: usize,
    table: Arc<SymbolTable>,
  },

  /// One fully decoded record.
  Row(Row),
}

/// Pull-based decoder over any [`Read`] source.
///
/// Nothing is read until the first call to
/// [`next_event`](Self::next_event). Each call does exactly one stage's
/// worth of work: the whole header, one field's symbol table, or one row.
/// Rows are handed out and forgotten; only the schema and the symbol
/// tables are retained.
///
/// A fatal error ends the stream: the next call returns `None`. Under
/// [`RowErrorPolicy::Skip`] a row-local error is yielded and decoding
/// resumes with the following row.
///
/// # Example
///
/// ```rust,no_run
/// use qvd_decoder::{DecoderEvent, StreamingDecoder};
///
/// let file = std::fs::File::open("sales.qvd").unwrap();
/// for event in StreamingDecoder::new(file) {
///     match event.unwrap() {
///         DecoderEvent::Header(schema) => println!("{} fields", schema.fields.len()),
///         DecoderEvent::SymbolTable { .. } => {}
///         DecoderEvent::Row(row) => println!("{:?}", row.values),
///     }
/// }
/// ```
pub struct StreamingDecoder<R, P = XmlHeaderParser> {
  cursor: ByteCursor<R>,
  config: DecoderConfig,
  state: StreamState<P>,
  schema: Option<Arc<TableSchema>>,
  tables: Vec<Arc<SymbolTable>>,
  section_start: u64,
}

/// Internal state machine for the streaming decoder.
///
/// ```text
///   ReadHeader → ReadSymbols(0) → ... → ReadSymbols(n-1) → ReadRows → Done
/// ```
///
/// A schema with no fields goes straight from `ReadHeader` to `ReadRows`.
/// Any fatal error moves to `Done`.
enum StreamState<P> {
  ReadHeader(P),
  ReadSymbols { schema: Arc<TableSchema>, field: usize },
  ReadRows(RowDecoder),
  Done,
}

impl<R: Read> StreamingDecoder<R> {
  /// Decode `reader` with the default configuration and XML parser.
  #[must_use]
  pub fn new(reader: R) -> Self {
    Self::with_config(reader, DecoderConfig::default())
  }

  #[must_use]
  pub fn with_config(reader: R, config: DecoderConfig) -> Self {
    Self::with_parser(reader, config, XmlHeaderParser::default())
  }
}

impl<R: Read, P: HeaderParser> StreamingDecoder<R, P> {
  /// Decode `reader`, handing the header text to `parser`.
  #[must_use]
  pub fn with_parser(reader: R, config: DecoderConfig, parser: P) -> Self {
    Self {
      cursor: ByteCursor::with_capacity(reader, config.buffer_capacity),
      config,
      state: StreamState::ReadHeader(parser),
      schema: None,
      tables: Vec::new(),
      section_start: 0,
    }
  }

  /// Advance one stage.
  ///
  /// Returns `Some(Ok(event))` for progress, `Some(Err(_))` for a decode
  /// error, and `None` once the stream is finished or has failed.
  pub fn next_event(&mut self) -> Option<Result<DecoderEvent, DecodeError>> {
    match mem::replace(&mut self.state, StreamState::Done) {
      StreamState::ReadHeader(parser) => Some(self.read_header(parser)),
      StreamState::ReadSymbols { schema, field } => Some(self.read_symbols(schema, field)),
      StreamState::ReadRows(rows) => self.read_row(rows),
      StreamState::Done => None,
    }
  }

  /// The schema, once the header event has been produced.
  #[must_use]
  pub fn schema(&self) -> Option<&Arc<TableSchema>> {
    self.schema.as_ref()
  }

  /// Symbol tables decoded so far, in field order.
  #[must_use]
  pub fn symbol_tables(&self) -> &[Arc<SymbolTable>] {
    &self.tables
  }

  /// Absolute stream offset of the next unread byte.
  #[must_use]
  pub fn position(&self) -> u64 {
    self.cursor.position()
  }

  /// True once the stream has ended or failed.
  #[must_use]
  pub fn is_done(&self) -> bool {
    matches!(self.state, StreamState::Done)
  }

  /// Drop the header and symbol table events and yield rows only.
  pub fn into_rows(self) -> impl Iterator<Item = Result<Row, DecodeError>> {
    self.filter_map(|event| match event {
      Ok(DecoderEvent::Row(row)) => Some(Ok(row)),
      Ok(_) => None,
      Err(e) => Some(Err(e)),
    })
  }

  fn read_header(&mut self, parser: P) -> Result<DecoderEvent, DecodeError> {
    let scanner = HeaderBoundaryScanner::new(&self.config.end_marker, self.config.max_header_len);
    let scan = scanner.scan(&mut self.cursor, parser)?;
    let schema = Arc::new(scan.schema);

    self.schema = Some(Arc::clone(&schema));
    self.state = if schema.fields.is_empty() {
      StreamState::ReadRows(RowDecoder::new(Arc::clone(&schema), Vec::new()))
    } else {
      StreamState::ReadSymbols {
        schema: Arc::clone(&schema),
        field: 0,
      }
    };
    Ok(DecoderEvent::Header(schema))
  }

  fn read_symbols(
    &mut self,
    schema: Arc<TableSchema>,
    field: usize,
  ) -> Result<DecoderEvent, DecodeError> {
    // The padding has been skipped, so the section starts where the first
    // table does.
    if field == 0 {
      self.section_start = self.cursor.position();
    }
    let table = SymbolTableDecoder::new(&schema, self.section_start)
      .decode_field(&mut self.cursor, &schema.fields[field])?;
    let table = Arc::new(table);
    self.tables.push(Arc::clone(&table));

    self.state = if field + 1 < schema.fields.len() {
      StreamState::ReadSymbols {
        schema,
        field: field + 1,
      }
    } else {
      debug!(
        bytes = self.cursor.position() - self.section_start,
        "symbol section decoded"
      );
      StreamState::ReadRows(RowDecoder::new(schema, self.tables.clone()))
    };
    Ok(DecoderEvent::SymbolTable { field, table })
  }

  fn read_row(&mut self, mut rows: RowDecoder) -> Option<Result<DecoderEvent, DecodeError>> {
    match rows.read_row(&mut self.cursor) {
      Ok(Some(row)) => {
        self.state = StreamState::ReadRows(rows);
        Some(Ok(DecoderEvent::Row(row)))
      }
      Ok(None) => {
        let actual = rows.rows_read();
        debug!(rows = actual, "row section decoded");
        let declared = self.schema.as_ref().and_then(|s| s.record_count);
        match declared {
          Some(declared) if declared != actual => {
            Some(Err(DecodeError::RowCountMismatch { declared, actual }))
          }
          _ => None,
        }
      }
      Err(e) if e.is_row_local() && self.config.row_error_policy == RowErrorPolicy::Skip => {
        warn!(error = %e, "skipping row");
        self.state = StreamState::ReadRows(rows);
        Some(Err(e))
      }
      Err(e) => Some(Err(e)),
    }
  }
}

impl<R: Read, P: HeaderParser> Iterator for StreamingDecoder<R, P> {
  type Item = Result<DecoderEvent, DecodeError>;

  fn next(&mut self) -> Option<Self::Item> {
    self.next_event()
  }
}
