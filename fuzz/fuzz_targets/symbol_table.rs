#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use qvd_decoder::SymbolTableDecoder;
use qvd_types::{FieldDescriptor, TableSchema};
use qvd_wire::ByteCursor;

#[derive(Arbitrary, Debug)]
struct Input {
    symbol_counts: Vec<u8>,
    capacity: u8,
    section: Vec<u8>,
}

// Fuzz target: symbol section decoding against a synthetic schema.
//
// Catches bugs in:
// - Tag dispatch and unknown tags
// - Truncated numeric payloads and unterminated text
// - Invalid UTF-8 in text and dual symbols
fuzz_target!(|input: Input| {
    let fields = input
        .symbol_counts
        .iter()
        .take(8)
        .enumerate()
        .map(|(i, &count)| FieldDescriptor::new(format!("f{i}"), 0, 8, u32::from(count)))
        .collect();
    let Ok(schema) = TableSchema::new("fuzz", fields) else {
        return;
    };
    let mut cursor =
        ByteCursor::with_capacity(input.section.as_slice(), usize::from(input.capacity) + 1);
    let _ = SymbolTableDecoder::new(&schema, 0).decode_all(&mut cursor);
});
