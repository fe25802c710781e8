#![no_main]

use libfuzzer_sys::fuzz_target;

// Fuzz target: TableSchema::from_xml_bytes on arbitrary text.
//
// Catches bugs in:
// - Element nesting and unknown elements
// - Numeric attribute parsing (overflow, signs, whitespace)
// - Layout validation (bit widths, fields past the row, record size bounds)
fuzz_target!(|data: &[u8]| {
    if let Ok(schema) = qvd_types::TableSchema::from_xml_bytes(data) {
        let _ = schema.row_byte_size();
        let _ = schema.total_symbols();
    }
});
