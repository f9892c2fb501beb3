use crate::{Error, Mode, Result, Stream};

enum Backing {
    /// An owned, growable buffer (`sMemOpen`).
    Owned(Vec<u8>),
    /// A fixed-capacity owned buffer that never grows past the capacity
    /// it was created with (`sMemOpen` with an explicit size).
    Fixed(Vec<u8>, usize),
    /// A borrowed, read-only view over caller-owned bytes
    /// (`sMemConnect`/`sMemBufPtr`).
    Borrowed(&'static [u8]),
    /// Discards all writes, only counts them (the "null" stream used for
    /// two-pass size computation).
    Null,
}

/// An in-memory stream.
///
/// Four flavours, matching cryptlib's `sMemOpen` (owned, growable or
/// capacity-bounded), `sMemConnect`/`sMemBufPtr` (a read-only view over
/// caller-supplied bytes) and the "null" variant used to learn an
/// encoding's length before allocating the real buffer.
pub struct MemoryStream {
    backing: Backing,
    pos: usize,
    len: usize,
    mode: Mode,
}

impl MemoryStream {
    /// Opens a new, empty, growable read/write buffer.
    pub fn open() -> Self {
        MemoryStream {
            backing: Backing::Owned(Vec::new()),
            pos: 0,
            len: 0,
            mode: Mode::ReadWrite,
        }
    }

    /// Opens a new read/write buffer that rejects writes once `capacity`
    /// bytes have been written, with `Error::Overflow`.
    pub fn open_with_capacity(capacity: usize) -> Self {
        MemoryStream {
            backing: Backing::Fixed(Vec::with_capacity(capacity), capacity),
            pos: 0,
            len: 0,
            mode: Mode::ReadWrite,
        }
    }

    /// Connects a read-only stream over an existing buffer (`sMemConnect`).
    ///
    /// The buffer must outlive the stream; callers that can't guarantee
    /// `'static` should copy into [`MemoryStream::open`] instead, the
    /// same tradeoff cryptlib's callers make between `sMemConnect` (zero
    /// copy, borrow) and `sMemOpen` (copy, owned).
    pub fn connect(buf: &'static [u8]) -> Self {
        let len = buf.len();
        MemoryStream {
            backing: Backing::Borrowed(buf),
            pos: 0,
            len,
            mode: Mode::ReadOnly,
        }
    }

    /// Opens a "null" stream: writes are counted but never stored. Used
    /// by the certificate writer family's size-computation pass.
    pub fn null() -> Self {
        MemoryStream {
            backing: Backing::Null,
            pos: 0,
            len: 0,
            mode: Mode::ReadWrite,
        }
    }

    /// Returns the bytes written so far, if this is an owned or fixed
    /// stream. Returns `None` for borrowed or null streams.
    pub fn as_slice(&self) -> Option<&[u8]> {
        match &self.backing {
            Backing::Owned(v) => Some(v),
            Backing::Fixed(v, _) => Some(v),
            Backing::Borrowed(b) => Some(b),
            Backing::Null => None,
        }
    }

    /// Total number of bytes written (or, for the null stream, the
    /// count of bytes that *would* have been written).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Stream for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        let src = match &self.backing {
            Backing::Owned(v) => v.as_slice(),
            Backing::Fixed(v, _) => v.as_slice(),
            Backing::Borrowed(b) => b,
            Backing::Null => return Err(Error::Underflow),
        };
        if self.pos + buf.len() > src.len() {
            return Err(Error::Underflow);
        }
        buf.copy_from_slice(&src[self.pos..self.pos + buf.len()]);
        self.pos += buf.len();
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        if self.mode == Mode::ReadOnly {
            return Err(Error::Write);
        }
        match &mut self.backing {
            Backing::Owned(v) => {
                if self.pos < v.len() {
                    let end = (self.pos + buf.len()).min(v.len());
                    v[self.pos..end].copy_from_slice(&buf[..end - self.pos]);
                    if end - self.pos < buf.len() {
                        v.extend_from_slice(&buf[end - self.pos..]);
                    }
                } else {
                    v.extend_from_slice(buf);
                }
            }
            Backing::Fixed(v, cap) => {
                if self.pos + buf.len() > *cap {
                    return Err(Error::Overflow);
                }
                if self.pos < v.len() {
                    let end = (self.pos + buf.len()).min(v.len());
                    v[self.pos..end].copy_from_slice(&buf[..end - self.pos]);
                    if end - self.pos < buf.len() {
                        v.extend_from_slice(&buf[end - self.pos..]);
                    }
                } else {
                    v.extend_from_slice(buf);
                }
            }
            Backing::Borrowed(_) => return Err(Error::Write),
            Backing::Null => {}
        }
        self.pos += buf.len();
        if self.pos > self.len {
            self.len = self.pos;
        }
        Ok(())
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        if !matches!(self.backing, Backing::Null) && self.pos + n > self.len {
            return Err(Error::Underflow);
        }
        self.pos += n;
        if self.pos > self.len {
            self.len = self.pos;
        }
        Ok(())
    }

    fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.len && !matches!(self.backing, Backing::Null) {
            return Err(Error::Underflow);
        }
        self.pos = pos;
        Ok(())
    }

    fn tell(&self) -> usize {
        self.pos
    }

    fn peek(&mut self) -> Result<u8> {
        let src = match &self.backing {
            Backing::Owned(v) => v.as_slice(),
            Backing::Fixed(v, _) => v.as_slice(),
            Backing::Borrowed(b) => b,
            Backing::Null => return Err(Error::Underflow),
        };
        src.get(self.pos).copied().ok_or(Error::Underflow)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_null(&self) -> bool {
        matches!(self.backing, Backing::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owned_round_trip() {
        let mut s = MemoryStream::open();
        s.write(b"hello").unwrap();
        s.seek(0).unwrap();
        let mut buf = [0u8; 5];
        s.read(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn fixed_overflow() {
        let mut s = MemoryStream::open_with_capacity(4);
        assert!(matches!(s.write(b"hello"), Err(Error::Overflow)));
    }

    #[test]
    fn null_counts_without_storing() {
        let mut s = MemoryStream::null();
        s.write(b"hello world").unwrap();
        assert_eq!(s.len(), 11);
        assert!(s.as_slice().is_none());
    }

    #[test]
    fn underflow_on_short_read() {
        let mut s = MemoryStream::open();
        s.write(b"ab").unwrap();
        s.seek(0).unwrap();
        let mut buf = [0u8; 3];
        assert!(matches!(s.read(&mut buf), Err(Error::Underflow)));
    }
}
