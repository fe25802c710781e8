use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use qvd_types::{Row, SymbolTable, TableSchema};

use crate::config::DecoderConfig;
use crate::error::DecodeError;
use crate::streaming::{DecoderEvent, StreamingDecoder};

/// A fully materialised table.
///
/// ```text
/// ┌──────────────────────────────────────────────────────────────┐
/// │ DecodedTable                                                 │
/// │   schema:        Arc<TableSchema>       ← parsed header      │
/// │   symbol_tables: Vec<Arc<SymbolTable>>  ← one per field      │
/// │   rows:          Vec<Row>               ← file order         │
/// │   skipped:       Vec<DecodeError>       ← Skip policy only   │
/// └──────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug)]
pub struct DecodedTable {
    pub schema: Arc<TableSchema>,
    pub symbol_tables: Vec<Arc<SymbolTable>>,
    pub rows: Vec<Row>,

    /// Row-local errors passed over under [`RowErrorPolicy::Skip`](crate::RowErrorPolicy::Skip).
    /// Always empty under the default `Abort` policy.
    pub skipped: Vec<DecodeError>,
}

impl DecodedTable {
    /// Symbol table of the field called `name`.
    #[must_use]
    pub fn symbols(&self, name: &str) -> Option<&SymbolTable> {
        self.schema
            .field_index(name)
            .and_then(|i| self.symbol_tables.get(i))
            .map(Arc::as_ref)
    }
}

/// One-shot decoder: runs a [`StreamingDecoder`] to completion and keeps
/// everything it produced.
///
/// Use this when the table fits in memory. For large files, iterate a
/// [`StreamingDecoder`] and drop rows as they are consumed.
///
/// # Example
///
/// ```rust,no_run
/// use qvd_decoder::QvdDecoder;
///
/// let table = QvdDecoder::open("sales.qvd").unwrap();
/// for row in &table.rows {
///     for (name, value) in row.named(&table.schema) {
///         println!("{name} = {value}");
///     }
/// }
/// ```
pub struct QvdDecoder;

impl QvdDecoder {
    /// Decode a complete file held in memory.
    ///
    /// # Errors
    ///
    /// The first [`DecodeError`] the stream reports.
    pub fn decode(bytes: &[u8]) -> Result<DecodedTable, DecodeError> {
        Self::decode_reader(bytes, DecoderConfig::default())
    }

    /// Open and decode the file at `path`.
    ///
    /// # Errors
    ///
    /// [`DecodeError::StreamUnavailable`] if the file cannot be opened,
    /// otherwise as for [`decode`](Self::decode).
    pub fn open(path: impl AsRef<Path>) -> Result<DecodedTable, DecodeError> {
        Self::open_with_config(path, DecoderConfig::default())
    }

    /// Open and decode the file at `path` with an explicit configuration.
    ///
    /// # Errors
    ///
    /// As for [`open`](Self::open).
    pub fn open_with_config(
        path: impl AsRef<Path>,
        config: DecoderConfig,
    ) -> Result<DecodedTable, DecodeError> {
        let stream = Self::stream_file(path, config)?;
        Self::collect(stream)
    }

    /// Open the file at `path` for streaming.
    ///
    /// # Errors
    ///
    /// [`DecodeError::StreamUnavailable`] if the file cannot be opened.
    pub fn stream_file(
        path: impl AsRef<Path>,
        config: DecoderConfig,
    ) -> Result<StreamingDecoder<File>, DecodeError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DecodeError::StreamUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(StreamingDecoder::with_config(file, config))
    }

    /// Decode everything `reader` produces.
    ///
    /// # Errors
    ///
    /// The first fatal [`DecodeError`]. Under the `Skip` policy row-local
    /// errors are collected into [`DecodedTable::skipped`] instead.
    pub fn decode_reader<R: Read>(
        reader: R,
        config: DecoderConfig,
    ) -> Result<DecodedTable, DecodeError> {
        Self::collect(StreamingDecoder::with_config(reader, config))
    }

    fn collect<R: Read>(mut stream: StreamingDecoder<R>) -> Result<DecodedTable, DecodeError> {
        let mut rows = Vec::new();
        let mut skipped = Vec::new();

        while let Some(event) = stream.next_event() {
            match event {
                Ok(DecoderEvent::Row(row)) => rows.push(row),
                Ok(DecoderEvent::Header(_) | DecoderEvent::SymbolTable { .. }) => {}
                // A row-local error only comes back out of a stream that
                // is still running, i.e. under the Skip policy.
                Err(e) if e.is_row_local() && !stream.is_done() => skipped.push(e),
                Err(e) => return Err(e),
            }
        }

        let schema = stream
            .schema()
            .cloned()
            .ok_or(DecodeError::EmptyPayload { header_len: 0 })?;
        Ok(DecodedTable {
            schema,
            symbol_tables: stream.symbol_tables().to_vec(),
            rows,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RowErrorPolicy;
    use qvd_tests::{FieldSpec, QvdBuilder, Symbol, sales_table};
    use qvd_types::SymbolValue;

    #[test]
    fn decodes_in_memory_table() {
        let table = QvdDecoder::decode(&sales_table().build()).unwrap();
        assert_eq!(table.schema.table_name, "Sales");
        assert_eq!(table.symbol_tables.len(), 2);
        assert_eq!(table.rows.len(), 3);
        assert!(table.skipped.is_empty());
        assert_eq!(
            table.symbols("Region").and_then(|t| t.get(3)),
            Some(&SymbolValue::Text("West".into()))
        );
        assert!(table.symbols("Nope").is_none());
    }

    #[test]
    fn missing_file_is_stream_unavailable() {
        let err = QvdDecoder::open("/definitely/not/here.qvd").unwrap_err();
        assert!(matches!(err, DecodeError::StreamUnavailable { .. }));
        assert!(err.to_string().contains("not/here.qvd"));
    }

    #[test]
    fn skipped_rows_are_collected() {
        let bytes = QvdBuilder::new("t")
            .field(FieldSpec::new("a").symbols([Symbol::Int(1), Symbol::Int(2), Symbol::Int(3)]))
            .rows([vec![3], vec![1], vec![3]])
            .build();
        let config = DecoderConfig {
            row_error_policy: RowErrorPolicy::Skip,
            ..DecoderConfig::default()
        };
        let table = QvdDecoder::decode_reader(bytes.as_slice(), config).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].number, 1);
        assert_eq!(table.skipped.len(), 2);
    }

    #[test]
    fn abort_policy_returns_the_row_error() {
        let bytes = QvdBuilder::new("t")
            .field(FieldSpec::new("a").symbols([Symbol::Int(1), Symbol::Int(2), Symbol::Int(3)]))
            .rows([vec![0], vec![3]])
            .build();
        let err = QvdDecoder::decode(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::SymbolIndexOutOfRange { row: 1, .. }));
    }
}
