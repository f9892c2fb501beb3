//! BER/DER writers over a [`pki_stream::Stream`].
//!
//! Every object writer in `pki-core` uses these primitives in a
//! two-pass shape: first against a [`pki_stream::MemoryStream::null`]
//! to learn the encoded length, then for real. [`Writer::sizeof`]
//! packages that pattern.

use pki_stream::{MemoryStream, Stream};

use crate::error::{Error, Result};

use super::length;
use super::reader::{BitString, Oid};
use super::tag::{Class, Tag};

/// A writer positioned over a stream, emitting BER/DER grammar.
pub struct Writer<'s> {
    stream: &'s mut dyn Stream,
}

impl<'s> Writer<'s> {
    pub fn new(stream: &'s mut dyn Stream) -> Self {
        Writer { stream }
    }

    fn write_tag_octets(&mut self, tag: Tag) -> Result<()> {
        let class_bits = (tag.class as u8) << 6;
        let constructed_bit = if tag.constructed { 0x20 } else { 0x00 };
        if tag.number < 0x1f {
            self.stream
                .write(&[class_bits | constructed_bit | tag.number as u8])
                .map_err(Error::from)?;
        } else {
            self.stream
                .write(&[class_bits | constructed_bit | 0x1f])
                .map_err(Error::from)?;
            let mut n = tag.number;
            let mut digits = vec![(n & 0x7f) as u8];
            n >>= 7;
            while n > 0 {
                digits.push((n & 0x7f) as u8 | 0x80);
                n >>= 7;
            }
            digits.reverse();
            self.stream.write(&digits).map_err(Error::from)?;
        }
        Ok(())
    }

    /// Writes a tag followed by a definite-length field.
    pub fn write_tag_length(&mut self, tag: Tag, len: usize) -> Result<()> {
        self.write_tag_octets(tag)?;
        let mut buf = Vec::new();
        length::write_definite(&mut buf, len);
        self.stream.write(&buf).map_err(Error::from)
    }

    /// Writes a tag followed by the indefinite-length sentinel
    /// (`0x80`). The caller must later call [`Writer::write_eoc`].
    pub fn write_tag_indefinite(&mut self, tag: Tag) -> Result<()> {
        self.write_tag_octets(tag)?;
        self.stream.write(&[0x80]).map_err(Error::from)
    }

    /// Writes the two-octet end-of-contents marker that closes an
    /// indefinite-length value.
    pub fn write_eoc(&mut self) -> Result<()> {
        self.stream.write(&[0x00, 0x00]).map_err(Error::from)
    }

    pub fn write_boolean(&mut self, value: bool) -> Result<()> {
        self.write_tag_length(Tag::BOOLEAN, 1)?;
        self.stream
            .write(&[if value { 0xff } else { 0x00 }])
            .map_err(Error::from)
    }

    /// Writes an `INTEGER` from raw big-endian magnitude bytes,
    /// prepending a `0x00` pad byte if the high bit of the first byte
    /// is set (ASN.1 `INTEGER` is signed; RSA/DSA components are
    /// always emitted as non-negative).
    pub fn write_integer_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let mut trimmed = bytes;
        while trimmed.len() > 1 && trimmed[0] == 0 && trimmed[1] & 0x80 == 0 {
            trimmed = &trimmed[1..];
        }
        let needs_pad = trimmed.is_empty() || trimmed[0] & 0x80 != 0;
        let len = trimmed.len() + if needs_pad { 1 } else { 0 };
        self.write_tag_length(Tag::INTEGER, len.max(1))?;
        if needs_pad {
            self.stream.write(&[0x00]).map_err(Error::from)?;
        }
        if trimmed.is_empty() {
            self.stream.write(&[0x00]).map_err(Error::from)?;
        } else {
            self.stream.write(trimmed).map_err(Error::from)?;
        }
        Ok(())
    }

    pub fn write_small_integer(&mut self, value: u64) -> Result<()> {
        let bytes = value.to_be_bytes();
        let first_nonzero = bytes.iter().position(|&b| b != 0).unwrap_or(7);
        self.write_integer_bytes(&bytes[first_nonzero..])
    }

    pub fn write_oid(&mut self, oid: &Oid) -> Result<()> {
        let mut body = Vec::new();
        let arcs = &oid.0;
        body.push((arcs[0] * 40 + arcs[1]) as u8);
        for &arc in &arcs[2..] {
            let mut digits = vec![(arc & 0x7f) as u8];
            let mut n = arc >> 7;
            while n > 0 {
                digits.push((n & 0x7f) as u8 | 0x80);
                n >>= 7;
            }
            digits.reverse();
            body.extend_from_slice(&digits);
        }
        self.write_tag_length(Tag::OID, body.len())?;
        self.stream.write(&body).map_err(Error::from)
    }

    pub fn write_bit_string(&mut self, value: &BitString) -> Result<()> {
        self.write_tag_length(Tag::BIT_STRING, value.bytes.len() + 1)?;
        self.stream
            .write(&[value.unused_bits])
            .map_err(Error::from)?;
        self.stream.write(&value.bytes).map_err(Error::from)
    }

    pub fn write_octet_string(&mut self, value: &[u8]) -> Result<()> {
        self.write_tag_length(Tag::OCTET_STRING, value.len())?;
        self.stream.write(value).map_err(Error::from)
    }

    pub fn write_utc_time(&mut self, value: &str) -> Result<()> {
        self.write_tag_length(Tag::UTC_TIME, value.len())?;
        self.stream.write(value.as_bytes()).map_err(Error::from)
    }

    pub fn write_generalized_time(&mut self, value: &str) -> Result<()> {
        self.write_tag_length(Tag::GENERALIZED_TIME, value.len())?;
        self.stream.write(value.as_bytes()).map_err(Error::from)
    }

    /// Writes a constructed value (`SEQUENCE`, `SET`, or a
    /// context-tagged wrapper) whose body is already encoded, as a
    /// definite-length TLV.
    pub fn write_constructed(&mut self, tag: Tag, body: &[u8]) -> Result<()> {
        self.write_tag_length(tag, body.len())?;
        self.stream.write(body).map_err(Error::from)
    }

    pub fn stream(&mut self) -> &mut dyn Stream {
        self.stream
    }
}

/// Runs `f` against a [`MemoryStream::null`] to learn the byte length
/// of whatever it writes, without materialising the bytes. This is
/// pass one of the certificate writer family's two-pass design (§4.6).
pub fn sizeof(f: impl FnOnce(&mut Writer) -> Result<()>) -> Result<usize> {
    let mut null = MemoryStream::null();
    let mut w = Writer::new(&mut null);
    f(&mut w)?;
    Ok(null.len())
}

/// Helper that assigns tags outside the `Universal` class, matching
/// the `[n] IMPLICIT`/`[n] EXPLICIT` shapes used pervasively in X.509
/// and CMS.
pub fn context_tag(number: u32, constructed: bool) -> Tag {
    Tag {
        class: Class::Context,
        constructed,
        number,
    }
}
