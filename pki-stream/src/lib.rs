//! A portable, byte-oriented stream abstraction.
//!
//! Like a `BufferedReader`, a [`Stream`] is a super-powered `Read`/`Write`
//! pair: in addition to the usual operations it exposes `skip`, `seek`,
//! `tell` and `peek_tag`, the primitives the ASN.1 BER/DER layer in
//! `pki-core` needs to do two-pass size computation and tag lookahead
//! without consuming bytes.
//!
//! Two concrete implementations are provided: [`MemoryStream`], a
//! growable or fixed-capacity in-memory buffer (which also serves as the
//! "null" stream used to precompute encoded sizes without materializing
//! them), and [`FileStream`], a thin, lock-aware wrapper around the host
//! filesystem.
//!
//! Every write that would exceed the stream's capacity fails with
//! [`Error::Overflow`]; every read past the end fails with
//! [`Error::Underflow`].

mod mem;
mod file;

pub use mem::MemoryStream;
pub use file::FileStream;

/// Errors produced by the stream layer.
///
/// This is a strict subset of `pki_core::Error`'s status codes — the
/// ones that can originate below the ASN.1 layer. `pki-core` converts
/// these via `#[from]` rather than redefining them.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A write did not fit in the remaining capacity of the stream.
    #[error("stream overflow")]
    Overflow,
    /// A read ran past the end of the available data.
    #[error("stream underflow")]
    Underflow,
    /// The underlying file could not be opened, or failed a portability
    /// check (symlink, device node, named pipe, inode/device/mode
    /// mismatch between `lstat` and the post-open `fstat`).
    #[error("stream open failed")]
    Open,
    /// A read-level I/O failure (other than underflow).
    #[error("stream read failed")]
    Read,
    /// A write-level I/O failure (other than overflow).
    #[error("stream write failed")]
    Write,
}

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// The direction a stream was opened for.
///
/// Memory streams track this so that a read-only connected buffer
/// rejects writes with [`Error::Write`] rather than silently truncating
/// the caller's data, matching the read/write asymmetry `sMemConnect`
/// (read-only, borrowed) has against `sMemOpen` (read/write, owned).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Open for both reading and writing.
    ReadWrite,
    /// Open for reading only (e.g. a connected, borrowed buffer).
    ReadOnly,
}

/// The common operations every stream implementation provides.
///
/// This mirrors cryptlib's `STREAM` interface (`sread`/`swrite`/`sskip`/
/// `sseek`/`sflush`/`sPeek`) rather than `std::io::{Read, Write, Seek}`
/// because the ASN.1 layer needs `peek_tag` — reading the next tag octet
/// without consuming it — which has no equivalent in the standard
/// traits, and because overflow/underflow need to be distinguishable
/// from generic I/O failure for the BER/DER grammar checks in
/// `pki-core::asn1` to report `BAD_DATA` rather than simply propagating
/// `io::Error`.
pub trait Stream {
    /// Reads exactly `buf.len()` bytes, or fails with
    /// [`Error::Underflow`].
    fn read(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Writes all of `buf`, or fails with [`Error::Overflow`].
    fn write(&mut self, buf: &[u8]) -> Result<()>;

    /// Advances the read/write position by `n` bytes without
    /// transferring data. Used to skip over content whose bytes the
    /// caller doesn't need (e.g. an unrecognised extension).
    fn skip(&mut self, n: usize) -> Result<()>;

    /// Repositions to an absolute offset from the start of the stream.
    fn seek(&mut self, pos: usize) -> Result<()>;

    /// Returns the current absolute position.
    fn tell(&self) -> usize;

    /// Returns the next byte without consuming it. Used by the ASN.1
    /// reader's tag lookahead (`peek_tag`) and by the chain reader to
    /// decide between a `SignedData` header and a raw `CertSet`.
    fn peek(&mut self) -> Result<u8>;

    /// Flushes any buffered output to the underlying sink. A no-op for
    /// in-memory streams; for file streams this is a real `fsync`-class
    /// flush.
    fn flush(&mut self) -> Result<()>;

    /// True if this is a "null" stream: writes succeed and advance
    /// `tell()`, but no bytes are actually stored. Used by `pki-core`'s
    /// certificate writer family for the size-computation pass.
    fn is_null(&self) -> bool {
        false
    }
}
