use std::io::{ErrorKind, Read};

use tracing::trace;

use crate::error::WireError;

/// Default size of the cursor's read buffer.
///
/// Large enough that a symbol or a row rarely straddles a refill, but
/// nothing in the decoder depends on that: every read path handles a
/// boundary at any byte.
pub const DEFAULT_CAPACITY: usize = 8192;

/// Fixed-capacity buffered reader over a byte stream.
///
/// The cursor owns one buffer and hands its bytes out strictly in order.
/// All multi-byte reads go through [`read_up_to`](Self::read_up_to), so
/// there is exactly one path that moves the read position forward by more
/// than one byte.
///
/// ```text
///   buf: [ consumed ... | pos .. len (buffered) | len .. capacity (stale) ]
///          ^ base = absolute offset of buf[0]
/// ```
///
/// Invariant: `pos <= len <= buf.len()`. Once the reader has reported end of
/// stream and the buffered bytes are gone, every read fails with
/// [`WireError::EndOfStream`].
pub struct ByteCursor<R> {
    reader: R,
    buf: Box<[u8]>,
    len: usize,
    pos: usize,
    eof: bool,
    base: u64,
}

impl<R: Read> ByteCursor<R> {
    /// Create a cursor with [`DEFAULT_CAPACITY`].
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self::with_capacity(reader, DEFAULT_CAPACITY)
    }

    /// Create a cursor with the given buffer capacity (clamped to at least 1).
    #[must_use]
    pub fn with_capacity(reader: R, capacity: usize) -> Self {
        Self {
            reader,
            buf: vec![0u8; capacity.max(1)].into_boxed_slice(),
            len: 0,
            pos: 0,
            eof: false,
            base: 0,
        }
    }

    /// Buffer capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Absolute offset of the next byte to be read.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.base + self.pos as u64
    }

    /// Return the buffered-but-unread bytes, refilling first if none are
    /// left. An empty slice means the stream is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Io`] if the refill fails.
    pub fn fill_buf(&mut self) -> Result<&[u8], WireError> {
        self.ensure_buffered()?;
        Ok(&self.buf[self.pos..self.len])
    }

    /// Mark `n` buffered bytes as read.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds the number of buffered bytes returned by the
    /// last [`fill_buf`](Self::fill_buf).
    pub fn consume(&mut self, n: usize) {
        assert!(
            n <= self.len - self.pos,
            "consume({n}) past the {} buffered bytes",
            self.len - self.pos
        );
        self.pos += n;
    }

    /// True once no more bytes can be obtained.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Io`] if the refill fails.
    pub fn is_exhausted(&mut self) -> Result<bool, WireError> {
        Ok(!self.ensure_buffered()?)
    }

    /// Read the next byte.
    ///
    /// # Errors
    ///
    /// [`WireError::EndOfStream`] when the stream is exhausted.
    pub fn next_byte(&mut self) -> Result<u8, WireError> {
        let byte = self.peek_byte()?;
        self.pos += 1;
        Ok(byte)
    }

    /// Return the next byte without consuming it.
    ///
    /// # Errors
    ///
    /// [`WireError::EndOfStream`] when the stream is exhausted.
    pub fn peek_byte(&mut self) -> Result<u8, WireError> {
        if self.ensure_buffered()? {
            Ok(self.buf[self.pos])
        } else {
            Err(WireError::EndOfStream {
                offset: self.position(),
                needed: 1,
                available: 0,
            })
        }
    }

    /// Advance the read position by `n` bytes.
    ///
    /// # Errors
    ///
    /// [`WireError::EndOfStream`] if fewer than `n` bytes remain. The
    /// bytes that did remain are consumed.
    pub fn skip(&mut self, n: u64) -> Result<(), WireError> {
        let start = self.position();
        let mut left = n;
        while left > 0 {
            if !self.ensure_buffered()? {
                #[allow(clippy::cast_possible_truncation)]
                return Err(WireError::EndOfStream {
                    offset: self.position(),
                    needed: n as usize,
                    available: (self.position() - start) as usize,
                });
            }
            let buffered = (self.len - self.pos) as u64;
            #[allow(clippy::cast_possible_truncation)]
            let take = buffered.min(left) as usize;
            self.pos += take;
            left -= take as u64;
        }
        Ok(())
    }

    /// Copy as many bytes as are available, up to `out.len()`, and return
    /// how many were copied. A short count means end of stream.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Io`] if a refill fails.
    pub fn read_up_to(&mut self, out: &mut [u8]) -> Result<usize, WireError> {
        let mut filled = 0;
        while filled < out.len() {
            if !self.ensure_buffered()? {
                break;
            }
            let take = (self.len - self.pos).min(out.len() - filled);
            out[filled..filled + take].copy_from_slice(&self.buf[self.pos..self.pos + take]);
            self.pos += take;
            filled += take;
        }
        Ok(filled)
    }

    /// Fill `out` completely.
    ///
    /// # Errors
    ///
    /// [`WireError::EndOfStream`] if the stream ends first.
    pub fn read_exact(&mut self, out: &mut [u8]) -> Result<(), WireError> {
        let got = self.read_up_to(out)?;
        if got < out.len() {
            return Err(WireError::EndOfStream {
                offset: self.position(),
                needed: out.len(),
                available: got,
            });
        }
        Ok(())
    }

    /// Read exactly `N` bytes into an array.
    ///
    /// # Errors
    ///
    /// [`WireError::EndOfStream`] if the stream ends first.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let mut out = [0u8; N];
        self.read_exact(&mut out)?;
        Ok(out)
    }

    /// Read a little-endian `u32` (least-significant byte first).
    ///
    /// # Errors
    ///
    /// [`WireError::EndOfStream`] if fewer than 4 bytes remain.
    pub fn read_u32_le(&mut self) -> Result<u32, WireError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian two's-complement `i32`.
    ///
    /// # Errors
    ///
    /// [`WireError::EndOfStream`] if fewer than 4 bytes remain.
    pub fn read_i32_le(&mut self) -> Result<i32, WireError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    /// Read 8 raw bytes as a little-endian IEEE-754 double. The bit
    /// pattern is preserved exactly, NaN payloads and `-0.0` included.
    ///
    /// # Errors
    ///
    /// [`WireError::EndOfStream`] if fewer than 8 bytes remain.
    pub fn read_f64_le(&mut self) -> Result<f64, WireError> {
        Ok(f64::from_bits(u64::from_le_bytes(self.read_array()?)))
    }

    /// Give back the underlying reader. Buffered bytes are dropped.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Refill if every buffered byte has been read. Returns whether any
    /// byte is available afterwards.
    fn ensure_buffered(&mut self) -> Result<bool, WireError> {
        if self.pos == self.len && !self.eof {
            self.refill()?;
        }
        Ok(self.pos < self.len)
    }

    /// Replace the buffer contents with the next chunk of the stream.
    ///
    /// Short reads from the reader are retried until the buffer is full or
    /// the reader returns 0, so `eof` is only set on a genuine end of stream.
    fn refill(&mut self) -> Result<(), WireError> {
        self.base += self.len as u64;
        self.pos = 0;
        self.len = 0;

        while self.len < self.buf.len() {
            match self.reader.read(&mut self.buf[self.len..]) {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(n) => self.len += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        trace!(offset = self.base, len = self.len, eof = self.eof, "cursor refill");
        Ok(())
    }
}
