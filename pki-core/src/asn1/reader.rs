//! BER/DER readers over a [`pki_stream::Stream`].

use pki_stream::Stream;

use crate::error::{Error, ErrorKind, Result};

use super::length::Length;
use super::tag::{Class, Tag};

/// Largest `INTEGER` the reader will materialise, in bytes. Guards
/// against a maliciously huge length field turning a single `INTEGER`
/// read into an unbounded allocation; RSA moduli up to 16384 bits
/// (2048 bytes) plus comfortable headroom fit easily.
pub const MAX_INTEGER_BYTES: usize = 4096;

/// Largest OBJECT IDENTIFIER encoding the reader accepts, per §4.1.
pub const MAX_OID_BYTES: usize = 32;

/// An object identifier, stored as its decoded arcs.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Oid(pub Vec<u32>);

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let strs: Vec<String> = self.0.iter().map(u32::to_string).collect();
        write!(f, "{}", strs.join("."))
    }
}

/// A BIT STRING value: the number of unused bits in the final octet,
/// plus the octets themselves.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct BitString {
    pub unused_bits: u8,
    pub bytes: Vec<u8>,
}

/// A reader positioned over a stream, decoding BER/DER grammar.
pub struct Reader<'s> {
    stream: &'s mut dyn Stream,
}

impl<'s> Reader<'s> {
    pub fn new(stream: &'s mut dyn Stream) -> Self {
        Reader { stream }
    }

    /// Returns the next tag's leading octet's class/constructed/number
    /// without consuming any bytes, per §4.1's "peek tag" primitive.
    pub fn peek_tag(&mut self) -> Result<Tag> {
        let save = self.stream.tell();
        let tag = self.read_tag();
        self.stream.seek(save).map_err(Error::from)?;
        tag
    }

    fn read_tag(&mut self) -> Result<Tag> {
        let mut b = [0u8; 1];
        self.stream.read(&mut b).map_err(Error::from)?;
        let first = b[0];
        let class = Class::from_u8(first >> 6);
        let constructed = first & 0x20 != 0;
        let mut number = (first & 0x1f) as u32;
        if number == 0x1f {
            // High-tag-number form: a sequence of base-128 digits.
            number = 0;
            loop {
                self.stream.read(&mut b).map_err(Error::from)?;
                number = number
                    .checked_shl(7)
                    .ok_or(ErrorKind::BadData)?
                    .wrapping_add((b[0] & 0x7f) as u32);
                if b[0] & 0x80 == 0 {
                    break;
                }
            }
        }
        Ok(Tag {
            class,
            constructed,
            number,
        })
    }

    fn read_length(&mut self) -> Result<Length> {
        let mut b = [0u8; 1];
        self.stream.read(&mut b).map_err(Error::from)?;
        if b[0] == 0x80 {
            return Ok(Length::Indefinite);
        }
        if b[0] & 0x80 == 0 {
            return Ok(Length::Definite(b[0] as usize));
        }
        let nbytes = (b[0] & 0x7f) as usize;
        if nbytes > std::mem::size_of::<usize>() {
            return Err(ErrorKind::BadData.into());
        }
        let mut len = 0usize;
        let mut buf = [0u8; 1];
        for _ in 0..nbytes {
            self.stream.read(&mut buf).map_err(Error::from)?;
            len = (len << 8) | buf[0] as usize;
        }
        Ok(Length::Definite(len))
    }

    /// Reads a tag and its length field together.
    pub fn read_tag_length(&mut self) -> Result<(Tag, Length)> {
        let tag = self.read_tag()?;
        let len = self.read_length()?;
        Ok((tag, len))
    }

    /// Asserts the next tag/length matches `expected`, and returns the
    /// definite length (or fails `BadData` if the caller requires a
    /// definite length but got an indefinite one).
    pub fn expect_definite(&mut self, expected: Tag) -> Result<usize> {
        let (tag, len) = self.read_tag_length()?;
        if tag != expected {
            return Err(ErrorKind::BadData.into());
        }
        len.as_definite().ok_or_else(|| ErrorKind::BadData.into())
    }

    /// Reads past an indefinite-length value's two-octet end-of-contents
    /// marker. Callers that opened an indefinite-length constructed
    /// value call this once they've consumed all of its children.
    pub fn read_eoc(&mut self) -> Result<()> {
        let (tag, len) = self.read_tag_length()?;
        if !tag.is_eoc() || len != Length::Definite(0) {
            return Err(ErrorKind::BadData.into());
        }
        Ok(())
    }

    /// Reads a `BOOLEAN`.
    pub fn read_boolean(&mut self) -> Result<bool> {
        let len = self.expect_definite(Tag::BOOLEAN)?;
        if len != 1 {
            return Err(ErrorKind::BadData.into());
        }
        let mut b = [0u8; 1];
        self.stream.read(&mut b).map_err(Error::from)?;
        Ok(b[0] != 0)
    }

    /// Reads an `INTEGER`'s two's-complement big-endian bytes as-is
    /// (callers that need an unsigned bignum strip a leading `0x00`
    /// padding byte themselves — the key codecs do this since ASN.1
    /// `INTEGER` is always signed but RSA/DSA components are always
    /// non-negative).
    pub fn read_integer_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.expect_definite(Tag::INTEGER)?;
        if len == 0 || len > MAX_INTEGER_BYTES {
            return Err(ErrorKind::BadData.into());
        }
        let mut buf = vec![0u8; len];
        self.stream.read(&mut buf).map_err(Error::from)?;
        Ok(buf)
    }

    /// Reads an `INTEGER` small enough to fit a `u64`.
    pub fn read_small_integer(&mut self) -> Result<u64> {
        let bytes = self.read_integer_bytes()?;
        if bytes.len() > 8 {
            return Err(ErrorKind::BadData.into());
        }
        let mut v = 0u64;
        for b in &bytes {
            v = (v << 8) | *b as u64;
        }
        Ok(v)
    }

    /// Reads an `OBJECT IDENTIFIER`.
    pub fn read_oid(&mut self) -> Result<Oid> {
        let len = self.expect_definite(Tag::OID)?;
        if len == 0 || len > MAX_OID_BYTES {
            return Err(ErrorKind::BadData.into());
        }
        let mut buf = vec![0u8; len];
        self.stream.read(&mut buf).map_err(Error::from)?;
        let mut arcs = Vec::new();
        let first = buf[0] as u32;
        arcs.push(first / 40);
        arcs.push(first % 40);
        let mut value = 0u32;
        let mut in_progress = false;
        for &b in &buf[1..] {
            in_progress = true;
            value = value
                .checked_shl(7)
                .ok_or(ErrorKind::BadData)?
                .wrapping_add((b & 0x7f) as u32);
            if b & 0x80 == 0 {
                arcs.push(value);
                value = 0;
                in_progress = false;
            }
        }
        if in_progress {
            return Err(ErrorKind::BadData.into());
        }
        Ok(Oid(arcs))
    }

    /// Reads a primitive `BIT STRING`.
    pub fn read_bit_string(&mut self) -> Result<BitString> {
        let len = self.expect_definite(Tag::BIT_STRING)?;
        if len == 0 {
            return Err(ErrorKind::BadData.into());
        }
        let mut buf = vec![0u8; len];
        self.stream.read(&mut buf).map_err(Error::from)?;
        let unused_bits = buf[0];
        if unused_bits > 7 {
            return Err(ErrorKind::BadData.into());
        }
        Ok(BitString {
            unused_bits,
            bytes: buf[1..].to_vec(),
        })
    }

    /// Reads a primitive `OCTET STRING`.
    pub fn read_octet_string(&mut self) -> Result<Vec<u8>> {
        let len = self.expect_definite(Tag::OCTET_STRING)?;
        let mut buf = vec![0u8; len];
        self.stream.read(&mut buf).map_err(Error::from)?;
        Ok(buf)
    }

    /// Reads a `UTCTime` as its raw `YYMMDDHHMMSSZ`-shaped ASCII bytes;
    /// callers interpret the calendar fields (two-digit year pivot is
    /// a policy decision left to the cert-writer/chain layers).
    pub fn read_utc_time(&mut self) -> Result<String> {
        let len = self.expect_definite(Tag::UTC_TIME)?;
        let mut buf = vec![0u8; len];
        self.stream.read(&mut buf).map_err(Error::from)?;
        String::from_utf8(buf).map_err(|_| ErrorKind::BadData.into())
    }

    /// Reads a `GeneralizedTime`.
    pub fn read_generalized_time(&mut self) -> Result<String> {
        let len = self.expect_definite(Tag::GENERALIZED_TIME)?;
        let mut buf = vec![0u8; len];
        self.stream.read(&mut buf).map_err(Error::from)?;
        String::from_utf8(buf).map_err(|_| ErrorKind::BadData.into())
    }

    /// Reads a tag and length, confirms the body is at least
    /// `min_len` bytes without copying it, and returns `(tag, total
    /// body length)` for the caller to read opaquely with
    /// [`Reader::read_raw`]. This is the "hole" primitive from §4.1,
    /// used when a field's contents are re-serialized verbatim (e.g.
    /// the re-tagged `SET OF Attribute` hashed during CMS signing).
    pub fn read_hole(&mut self, min_len: usize) -> Result<(Tag, usize)> {
        let (tag, len) = self.read_tag_length()?;
        let len = len.as_definite().ok_or(ErrorKind::BadData)?;
        if len < min_len {
            return Err(ErrorKind::BadData.into());
        }
        Ok((tag, len))
    }

    /// Reads exactly `n` opaque bytes.
    pub fn read_raw(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.stream.read(&mut buf).map_err(Error::from)?;
        Ok(buf)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.stream.skip(n).map_err(Error::from)
    }

    pub fn tell(&self) -> usize {
        self.stream.tell()
    }
}
