/// Errors raised by the byte-level layer: the buffered cursor and the
/// bit extractor.
///
/// Every variant that can be traced back to a position in the input
/// carries the absolute byte offset, counted from the first byte the
/// cursor ever handed out.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The stream ran dry before the requested bytes could be produced.
    ///
    /// `needed` is how many bytes the failed read asked for and
    /// `available` how many of them were actually there.
    #[error("end of stream at offset {offset}: needed {needed} bytes, {available} available")]
    EndOfStream {
        offset: u64,
        needed: usize,
        available: usize,
    },

    /// A bit field wider than the 64-bit extraction register.
    #[error("bit width {width} exceeds the 64-bit limit")]
    BitWidthTooLarge { width: u32 },

    /// A bit field reaches past the end of the row it is extracted from.
    #[error("bits [{offset}..{end}) fall outside a {row_bits}-bit row")]
    BitRangeOutOfBounds { offset: u32, end: u64, row_bits: u64 },

    /// I/O error while refilling from the underlying reader.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
