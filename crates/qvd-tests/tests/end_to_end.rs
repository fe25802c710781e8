//! End-to-end decoding of synthetic files.
//!
//! Files come from the [`QvdBuilder`] fixture: a real-looking XML header,
//! the `\r\n\0` padding writers leave after it, tagged symbol tables and
//! LSB-first packed rows. Each test drives the public decoder API only.

use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;

use qvd_decoder::{
    DecoderConfig, DecoderEvent, HeaderError, HeaderParser, QvdDecoder, StreamingDecoder,
    XmlHeaderParser,
};
use qvd_tests::{FieldSpec, QvdBuilder, Symbol, sales_table, synthetic_table};
use qvd_types::{SymbolValue, TableSchema};

// ── Minimal file ──────────────────────────────────────────────────────────────

#[test]
fn single_field_row_resolves_to_string_symbol() {
    let bytes = QvdBuilder::new("Minimal")
        .field(FieldSpec::new("Value").symbols([Symbol::Int(7), Symbol::text("seven")]))
        .row(&[1])
        .build();

    let table = QvdDecoder::decode(&bytes).expect("minimal file should decode");

    assert_eq!(table.schema.fields.len(), 1);
    assert_eq!(table.rows.len(), 1);
    assert_eq!(table.rows[0].values, vec![SymbolValue::Text("seven".into())]);
    assert_eq!(table.symbol_tables[0].get(0), Some(&SymbolValue::Int(7)));
}

// ── Mixed symbol types ────────────────────────────────────────────────────────

#[test]
fn sales_table_decodes_every_symbol_kind() {
    let table = QvdDecoder::decode(&sales_table().build()).unwrap();

    let rendered: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| row.values.iter().map(ToString::to_string).collect())
        .collect();
    assert_eq!(
        rendered,
        vec![
            vec!["North", "10"],
            vec!["West", "seven"],
            vec!["South", "1,25"],
        ]
    );

    let amount = table.symbols("Amount").unwrap();
    assert_eq!(amount.get(1), Some(&SymbolValue::Double(2.5)));
    assert_eq!(amount.get(2).and_then(SymbolValue::as_i32), Some(7));
}

#[test]
fn header_metadata_is_exposed() {
    let table = QvdDecoder::decode(&sales_table().build()).unwrap();
    let schema = &table.schema;

    assert_eq!(schema.table_name, "Sales");
    assert_eq!(schema.build_no.as_deref(), Some("50668"));
    assert_eq!(schema.creator_doc.as_deref(), Some("fixture.qvw"));
    assert_eq!(schema.record_count, Some(3));
    assert_eq!(schema.record_byte_size, Some(1));

    let layout: Vec<(&str, u32, u32)> = schema
        .fields
        .iter()
        .map(|f| (f.name.as_str(), f.bit_offset, f.bit_width))
        .collect();
    assert_eq!(layout, vec![("Region", 0, 2), ("Amount", 2, 2)]);
}

#[test]
fn rows_resolve_by_field_name() {
    let table = QvdDecoder::decode(&sales_table().build()).unwrap();
    let second = &table.rows[1];

    assert_eq!(
        second.get_by_name(&table.schema, "Region"),
        Some(&SymbolValue::Text("West".into()))
    );
    let named: Vec<String> = second
        .named(&table.schema)
        .map(|(name, value)| format!("{name}={value}"))
        .collect();
    assert_eq!(named, vec!["Region=West", "Amount=seven"]);
}

// ── Buffer size independence ─────────────────────────────────────────────────

#[test]
fn result_does_not_depend_on_buffer_capacity() {
    let bytes = sales_table().build();
    let reference = QvdDecoder::decode(&bytes).unwrap();

    for capacity in [1, 2, 3, 5, 16, 17, 18, 64, 255, 4096] {
        let config = DecoderConfig {
            buffer_capacity: capacity,
            ..DecoderConfig::default()
        };
        let table = QvdDecoder::decode_reader(bytes.as_slice(), config)
            .unwrap_or_else(|e| panic!("capacity {capacity}: {e}"));
        assert_eq!(table.rows, reference.rows, "capacity {capacity}");
        assert_eq!(table.symbol_tables, reference.symbol_tables, "capacity {capacity}");
    }
}

#[test]
fn long_text_symbols_span_many_refills() {
    let long = "x".repeat(10_000);
    let bytes = QvdBuilder::new("Long")
        .field(FieldSpec::new("Text").symbols([Symbol::text("short"), Symbol::Text(long.clone())]))
        .row(&[1])
        .row(&[0])
        .build();

    let config = DecoderConfig {
        buffer_capacity: 7,
        ..DecoderConfig::default()
    };
    let table = QvdDecoder::decode_reader(bytes.as_slice(), config).unwrap();
    assert_eq!(table.rows[0].values, vec![SymbolValue::Text(long)]);
    assert_eq!(table.rows[1].values, vec![SymbolValue::Text("short".into())]);
}

#[test]
fn wide_synthetic_table() {
    let builder = synthetic_table(12, 300, 500);
    let table = QvdDecoder::decode(&builder.build()).unwrap();

    assert_eq!(table.rows.len(), 500);
    // 12 fields of 9 bits: 108 bits, 14 bytes per row.
    assert_eq!(table.schema.row_byte_size(), 14);
    for (r, row) in table.rows.iter().enumerate() {
        for (f, value) in row.values.iter().enumerate() {
            let expected = ((r * 7 + f) % 300) as i32;
            assert_eq!(value, &SymbolValue::Int(expected), "row {r} field {f}");
        }
    }
}

// ── Header/payload boundary ──────────────────────────────────────────────────

/// Wraps the XML parser and keeps a copy of every byte it is fed.
struct Recording {
    inner: XmlHeaderParser,
    seen: Rc<RefCell<Vec<u8>>>,
}

impl HeaderParser for Recording {
    fn feed(&mut self, chunk: &[u8], is_final: bool) -> Result<(), HeaderError> {
        self.seen.borrow_mut().extend_from_slice(chunk);
        self.inner.feed(chunk, is_final)
    }

    fn finish(self) -> Result<TableSchema, HeaderError> {
        self.inner.finish()
    }
}

#[test]
fn header_bytes_and_payload_bytes_partition_the_stream() {
    let builder = sales_table();
    let bytes = builder.build();

    for capacity in [1, 4, 16, 17, 100, 8192] {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let parser = Recording {
            inner: XmlHeaderParser::default(),
            seen: Rc::clone(&seen),
        };
        let config = DecoderConfig {
            buffer_capacity: capacity,
            ..DecoderConfig::default()
        };
        let mut stream =
            StreamingDecoder::with_parser(Cursor::new(bytes.clone()), config, parser);

        assert!(matches!(stream.next_event(), Some(Ok(DecoderEvent::Header(_)))));

        let header = builder.header_xml().into_bytes();
        assert_eq!(*seen.borrow(), header, "capacity {capacity}");
        // The padding is skipped, so the cursor sits on the first symbol.
        assert_eq!(stream.position(), header.len() as u64 + 3, "capacity {capacity}");

        let rest: Vec<_> = stream.collect::<Result<_, _>>().unwrap();
        assert_eq!(rest.len(), 2 + 3);
    }
}

#[test]
fn any_mix_of_padding_bytes_is_skipped() {
    for padding in [&b""[..], b"\r\n", b"\n", b"\0\0\0\0", b"\r\n\0\r\n\0"] {
        let bytes = sales_table().padding(padding).build();
        let table = QvdDecoder::decode(&bytes)
            .unwrap_or_else(|e| panic!("padding {padding:?}: {e}"));
        assert_eq!(table.rows.len(), 3, "padding {padding:?}");
    }
}

// ── Files on disk ─────────────────────────────────────────────────────────────

#[test]
fn open_reads_from_disk() {
    let path = std::env::temp_dir().join(format!("qvd-tests-open-{}.qvd", std::process::id()));
    std::fs::write(&path, sales_table().build()).unwrap();

    let table = QvdDecoder::open(&path);
    let streamed = QvdDecoder::stream_file(&path, DecoderConfig::default())
        .unwrap()
        .into_rows()
        .count();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(table.unwrap().rows.len(), 3);
    assert_eq!(streamed, 3);
}
