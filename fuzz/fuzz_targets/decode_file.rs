#![no_main]

use libfuzzer_sys::fuzz_target;
use qvd_decoder::{DecoderConfig, QvdDecoder, RowErrorPolicy};

// Fuzz target: whole-file decode from arbitrary bytes.
//
// The first byte picks the read buffer capacity and the row error policy,
// the rest is the file. The header size limit is lowered so that runs
// stay short. Decoding must return a result and never panic.
fuzz_target!(|data: &[u8]| {
    let Some((&knob, file)) = data.split_first() else {
        return;
    };
    let config = DecoderConfig {
        buffer_capacity: usize::from(knob & 0x7F) + 1,
        row_error_policy: if knob & 0x80 == 0 {
            RowErrorPolicy::Abort
        } else {
            RowErrorPolicy::Skip
        },
        max_header_len: 64 * 1024,
        ..DecoderConfig::default()
    };
    let _ = QvdDecoder::decode_reader(file, config);
});
