use std::io::Read;

use qvd_types::{SchemaError, TableSchema, HEADER_ROOT};
use qvd_wire::{ByteCursor, WireError};
use tracing::{debug, debug_span};

use crate::error::{DecodeError, HeaderError};

/// Incremental consumer of the textual header.
///
/// The scanner calls [`feed`](Self::feed) with consecutive chunks, exactly
/// once with `is_final = true` for the chunk that ends at the end marker,
/// then calls [`finish`](Self::finish) for the parsed schema.
pub trait HeaderParser {
    /// Accept the next header chunk.
    ///
    /// # Errors
    ///
    /// [`HeaderError`] if the document is malformed. Implementations may
    /// defer all checks to the final chunk.
    fn feed(&mut self, chunk: &[u8], is_final: bool) -> Result<(), HeaderError>;

    /// Return the schema built from the chunks fed so far.
    ///
    /// # Errors
    ///
    /// [`HeaderError`] if no final chunk was fed or the document was invalid.
    fn finish(self) -> Result<TableSchema, HeaderError>;
}

/// Default [`HeaderParser`]: buffers the chunks and parses the complete
/// document with `quick-xml` when the final chunk arrives.
#[derive(Debug, Default)]
pub struct XmlHeaderParser {
    text: Vec<u8>,
    schema: Option<TableSchema>,
}

impl HeaderParser for XmlHeaderParser {
    fn feed(&mut self, chunk: &[u8], is_final: bool) -> Result<(), HeaderError> {
        self.text.extend_from_slice(chunk);
        if is_final {
            self.schema = Some(TableSchema::from_xml_bytes(&self.text)?);
        }
        Ok(())
    }

    fn finish(self) -> Result<TableSchema, HeaderError> {
        self.schema.ok_or_else(|| {
            HeaderError::Schema(SchemaError::Incomplete {
                open: HEADER_ROOT.to_string(),
            })
        })
    }
}

/// Outcome of a header scan. The cursor is left on the first symbol byte.
#[derive(Clone, Debug)]
pub struct HeaderScan {
    pub schema: TableSchema,
    /// Bytes handed to the header parser, end marker included.
    pub header_len: u64,
    /// `\r`, `\n` and `\0` bytes skipped between the marker and the payload.
    pub padding: u64,
}

/// Finds the end of the textual header inside the cursor's buffer and
/// splits the stream there.
///
/// Bytes up to and including the end marker go to the [`HeaderParser`];
/// the first byte after the marker stays in the cursor for the binary
/// decoders. The marker may straddle any number of refills.
pub struct HeaderBoundaryScanner<'m> {
    marker: &'m [u8],
    max_len: usize,
}

impl<'m> HeaderBoundaryScanner<'m> {
    #[must_use]
    pub fn new(marker: &'m str, max_len: usize) -> Self {
        Self {
            marker: marker.as_bytes(),
            max_len,
        }
    }

    /// Feed the header to `parser` and stop with the cursor right after the
    /// end marker. Returns the number of bytes fed.
    ///
    /// # Errors
    ///
    /// [`DecodeError::MalformedHeader`] if the marker never appears, the
    /// header exceeds the length limit, or the parser rejects a chunk.
    pub fn find_boundary<R: Read, P: HeaderParser>(
        &self,
        cursor: &mut ByteCursor<R>,
        parser: &mut P,
    ) -> Result<u64, DecodeError> {
        let keep = self.marker.len().saturating_sub(1);
        let mut tail: Vec<u8> = Vec::with_capacity(keep);
        let mut fed = 0u64;

        loop {
            let chunk = cursor.fill_buf()?;
            if chunk.is_empty() {
                return Err(HeaderError::MarkerNotFound {
                    marker: String::from_utf8_lossy(self.marker).into_owned(),
                    scanned: fed,
                }
                .into());
            }

            let cut = find_marker_end(&tail, chunk, self.marker);
            let take = cut.unwrap_or(chunk.len());
            if fed + take as u64 > self.max_len as u64 {
                return Err(HeaderError::TooLarge { limit: self.max_len }.into());
            }

            parser.feed(&chunk[..take], cut.is_some())?;
            if cut.is_none() {
                keep_tail(&mut tail, chunk, keep);
            }
            cursor.consume(take);
            fed += take as u64;

            if cut.is_some() {
                return Ok(fed);
            }
        }
    }

    /// Run the full header stage: find the boundary, build the schema, skip
    /// the text-serialisation padding and make sure a payload follows.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::MalformedHeader`] as for [`find_boundary`](Self::find_boundary),
    ///   or if the parser reports an invalid document.
    /// - [`DecodeError::EmptyPayload`] if nothing but padding follows the header.
    pub fn scan<R: Read, P: HeaderParser>(
        &self,
        cursor: &mut ByteCursor<R>,
        mut parser: P,
    ) -> Result<HeaderScan, DecodeError> {
        let _span = debug_span!("header_scan").entered();

        let header_len = self.find_boundary(cursor, &mut parser)?;
        let schema = parser.finish()?;
        let padding = skip_padding(cursor)?;

        if cursor.is_exhausted()? {
            return Err(DecodeError::EmptyPayload { header_len });
        }

        debug!(
            header_len,
            padding,
            fields = schema.fields.len(),
            table = %schema.table_name,
            "header boundary found"
        );
        Ok(HeaderScan {
            schema,
            header_len,
            padding,
        })
    }
}

/// Length of the prefix of `chunk` that ends with the first occurrence of
/// `marker`, given that `tail` holds the bytes fed just before `chunk`.
///
/// An occurrence that starts in `tail` is earlier than any inside `chunk`,
/// so straddling matches are tried first, longest overlap first.
fn find_marker_end(tail: &[u8], chunk: &[u8], marker: &[u8]) -> Option<usize> {
    if marker.is_empty() {
        return Some(0);
    }

    let max_overlap = tail.len().min(marker.len() - 1);
    for overlap in (1..=max_overlap).rev() {
        let rest = &marker[overlap..];
        if tail.ends_with(&marker[..overlap]) && chunk.starts_with(rest) {
            return Some(rest.len());
        }
    }

    chunk
        .windows(marker.len())
        .position(|w| w == marker)
        .map(|start| start + marker.len())
}

/// Keep the last `keep` bytes of `tail ++ chunk`.
fn keep_tail(tail: &mut Vec<u8>, chunk: &[u8], keep: usize) {
    if chunk.len() >= keep {
        tail.clear();
        tail.extend_from_slice(&chunk[chunk.len() - keep..]);
    } else {
        tail.extend_from_slice(chunk);
        let excess = tail.len().saturating_sub(keep);
        tail.drain(..excess);
    }
}

/// Skip `\r`, `\n` and `\0` bytes left between the header text and the
/// first symbol. Returns how many were skipped.
fn skip_padding<R: Read>(cursor: &mut ByteCursor<R>) -> Result<u64, WireError> {
    let mut skipped = 0u64;
    loop {
        let buffered = cursor.fill_buf()?;
        let n = buffered
            .iter()
            .take_while(|&&b| matches!(b, b'\r' | b'\n' | 0))
            .count();
        let more = n > 0 && n == buffered.len();
        cursor.consume(n);
        skipped += n as u64;
        if !more {
            return Ok(skipped);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_END_MARKER;
    use std::io::Cursor;

    const HEADER: &str = "<QvdTableHeader><TableName>t</TableName><Fields>\
        <QvdFieldHeader><FieldName>a</FieldName><BitOffset>0</BitOffset>\
        <BitWidth>1</BitWidth><NoOfSymbols>2</NoOfSymbols></QvdFieldHeader>\
        </Fields></QvdTableHeader>";

    /// Parser that records exactly what it was fed, then delegates.
    #[derive(Default)]
    struct Recording {
        fed: Vec<u8>,
        finals: usize,
        inner: XmlHeaderParser,
    }

    impl HeaderParser for Recording {
        fn feed(&mut self, chunk: &[u8], is_final: bool) -> Result<(), HeaderError> {
            self.fed.extend_from_slice(chunk);
            self.finals += usize::from(is_final);
            self.inner.feed(chunk, is_final)
        }

        fn finish(self) -> Result<TableSchema, HeaderError> {
            self.inner.finish()
        }
    }

    fn scanner() -> HeaderBoundaryScanner<'static> {
        HeaderBoundaryScanner::new(DEFAULT_END_MARKER, 1 << 20)
    }

    fn file(payload: &[u8]) -> Vec<u8> {
        let mut bytes = HEADER.as_bytes().to_vec();
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn header_and_payload_bytes_partition_the_stream() {
        let original = file(b"\r\n\0\x01\x02\x03\x04binary tail");
        for capacity in [1, 2, 3, 5, 16, 17, 18, 64, 4096] {
            let mut cursor = ByteCursor::with_capacity(Cursor::new(original.clone()), capacity);
            let mut parser = Recording::default();
            let fed = scanner().find_boundary(&mut cursor, &mut parser).unwrap();

            let mut rest = Vec::new();
            while let Ok(b) = cursor.next_byte() {
                rest.push(b);
            }

            assert_eq!(fed, HEADER.len() as u64, "capacity {capacity}");
            assert_eq!(parser.finals, 1, "capacity {capacity}");
            let mut joined = parser.fed.clone();
            joined.extend_from_slice(&rest);
            assert_eq!(joined, original, "capacity {capacity}");
        }
    }

    #[test]
    fn scan_skips_padding_and_parses_schema() {
        let bytes = file(b"\r\n\0\x01\x2A\x00\x00\x00");
        let mut cursor = ByteCursor::with_capacity(Cursor::new(bytes), 7);
        let scan = scanner().scan(&mut cursor, XmlHeaderParser::default()).unwrap();

        assert_eq!(scan.schema.table_name, "t");
        assert_eq!(scan.schema.fields[0].symbol_count, 2);
        assert_eq!(scan.padding, 3);
        assert_eq!(cursor.position(), HEADER.len() as u64 + 3);
        assert_eq!(cursor.next_byte().unwrap(), 0x01);
    }

    #[test]
    fn missing_marker_is_malformed() {
        let bytes = b"<QvdTableHeader><TableName>t</TableName>".to_vec();
        let mut cursor = ByteCursor::with_capacity(Cursor::new(bytes), 8);
        let err = scanner().scan(&mut cursor, XmlHeaderParser::default()).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MalformedHeader(HeaderError::MarkerNotFound { scanned: 40, .. })
        ));
    }

    #[test]
    fn invalid_xml_before_marker_is_malformed() {
        let bytes = b"<QvdTableHeader><A></B></QvdTableHeader>\x01".to_vec();
        let mut cursor = ByteCursor::new(Cursor::new(bytes));
        let err = scanner().scan(&mut cursor, XmlHeaderParser::default()).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedHeader(HeaderError::Schema(_))));
    }

    #[test]
    fn header_without_payload_is_empty_payload() {
        for tail in [&b""[..], b"\r\n", b"\r\n\0\0"] {
            let mut cursor = ByteCursor::with_capacity(Cursor::new(file(tail)), 4);
            let err = scanner().scan(&mut cursor, XmlHeaderParser::default()).unwrap_err();
            assert!(
                matches!(err, DecodeError::EmptyPayload { header_len } if header_len == HEADER.len() as u64),
                "tail {tail:?}: {err:?}"
            );
        }
    }

    #[test]
    fn header_over_limit_is_rejected() {
        let mut cursor = ByteCursor::with_capacity(Cursor::new(file(b"\x01")), 16);
        let err = HeaderBoundaryScanner::new(DEFAULT_END_MARKER, 32)
            .scan(&mut cursor, XmlHeaderParser::default())
            .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MalformedHeader(HeaderError::TooLarge { limit: 32 })
        ));
    }

    #[test]
    fn first_occurrence_wins_when_straddling() {
        let marker = b"abcab";
        // "xxabca" + "bcabzz": the match starting in the tail ends 1 byte in,
        // ahead of the later one fully inside the chunk.
        assert_eq!(find_marker_end(b"xxabca", b"bcabzz", marker), Some(1));
        assert_eq!(find_marker_end(b"xxabc", b"abzz", marker), Some(2));
        assert_eq!(find_marker_end(b"zzzz", b"abca", marker), None);
        assert_eq!(find_marker_end(b"zzzz", b"qabcabq", marker), Some(6));
        assert_eq!(find_marker_end(b"abc", b"ab", marker), Some(2));
    }

    #[test]
    fn tail_keeps_last_bytes() {
        let mut tail = b"abc".to_vec();
        keep_tail(&mut tail, b"d", 3);
        assert_eq!(tail, b"bcd");
        keep_tail(&mut tail, b"efghij", 3);
        assert_eq!(tail, b"hij");
    }
}
