use qvd_wire::DEFAULT_CAPACITY;

/// Closing tag of the textual header.
pub const DEFAULT_END_MARKER: &str = "</QvdTableHeader>";

/// Upper bound on header bytes scanned for the end marker: 16 MiB.
pub const DEFAULT_MAX_HEADER_LEN: usize = 16 * 1024 * 1024;

/// What the streaming decoder does after a row-local error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RowErrorPolicy {
    /// Report the error and stop. A bad index almost always means the row
    /// layout was computed wrong, so every later row is suspect too.
    #[default]
    Abort,
    /// Report the error and continue with the next row.
    Skip,
}

/// Tuning knobs for a decode.
///
/// ```text
/// ┌──────────────────┬──────────────────────┬──────────────────────────────┐
/// │ Field            │ Default              │ Purpose                      │
/// ├──────────────────┼──────────────────────┼──────────────────────────────┤
/// │ buffer_capacity  │ 8192                 │ cursor read buffer size      │
/// │ max_header_len   │ 16 MiB               │ give up on the end marker    │
/// │ row_error_policy │ Abort                │ stop or skip bad rows        │
/// │ end_marker       │ </QvdTableHeader>    │ header/payload boundary      │
/// └──────────────────┴──────────────────────┴──────────────────────────────┘
/// ```
///
/// `buffer_capacity` only affects how often the cursor refills. Decoding
/// gives identical results for any value, down to 1.
#[derive(Clone, Debug)]
pub struct DecoderConfig {
    pub buffer_capacity: usize,
    pub max_header_len: usize,
    pub row_error_policy: RowErrorPolicy,
    pub end_marker: String,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_CAPACITY,
            max_header_len: DEFAULT_MAX_HEADER_LEN,
            row_error_policy: RowErrorPolicy::default(),
            end_marker: DEFAULT_END_MARKER.to_string(),
        }
    }
}
