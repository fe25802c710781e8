#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
    row: Vec<u8>,
    bit_offset: u32,
    bit_width: u8,
}

// Fuzz target: qvd_wire::extract_bits with arbitrary ranges.
//
// Out-of-range offsets and widths must come back as errors, and any value
// returned must fit in the requested width.
fuzz_target!(|input: Input| {
    let width = u32::from(input.bit_width);
    if let Ok(value) = qvd_wire::extract_bits(&input.row, input.bit_offset, width) {
        if width < 64 {
            assert!(value < (1u64 << width));
        }
    }
});
