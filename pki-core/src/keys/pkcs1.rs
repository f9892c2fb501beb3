//! PKCS #1 RSA private-key codec (§4.5).
//!
//! ```text
//! RSAPrivateKey ::= SEQUENCE {
//!     version           INTEGER,   -- 0 for the two-prime form used here
//!     modulus           INTEGER,   -- n
//!     publicExponent    INTEGER,   -- e
//!     privateExponent   INTEGER,   -- d
//!     prime1            INTEGER,   -- p
//!     prime2            INTEGER,   -- q
//!     exponent1         INTEGER,   -- d mod (p-1)
//!     exponent2         INTEGER,   -- d mod (q-1)
//!     coefficient       INTEGER    -- (inverse of q) mod p
//! }
//! ```

use pki_stream::{MemoryStream, Stream};

use crate::asn1::{Reader, Tag, Writer};
use crate::error::{Error, ErrorKind, Result};

use super::{bit_length, check_min_size, RsaPrivate};

pub fn encode(key: &RsaPrivate) -> Result<Vec<u8>> {
    check_min_size(bit_length(&key.n))?;
    let mut mem = MemoryStream::open();
    {
        let mut w = Writer::new(&mut mem);
        let mut body_mem = MemoryStream::open();
        {
            let mut bw = Writer::new(&mut body_mem);
            bw.write_small_integer(0)?;
            bw.write_integer_bytes(&key.n)?;
            bw.write_integer_bytes(&key.e)?;
            bw.write_integer_bytes(&key.d)?;
            bw.write_integer_bytes(&key.p)?;
            bw.write_integer_bytes(&key.q)?;
            bw.write_integer_bytes(&key.e1)?;
            bw.write_integer_bytes(&key.e2)?;
            bw.write_integer_bytes(&key.u)?;
        }
        let body = body_mem.as_slice().unwrap();
        w.write_constructed(Tag::SEQUENCE, body)?;
    }
    Ok(mem.as_slice().unwrap().to_vec())
}

pub fn decode(buf: &[u8]) -> Result<RsaPrivate> {
    let mut mem = MemoryStream::open();
    mem.write(buf).map_err(Error::from)?;
    mem.seek(0).map_err(Error::from)?;
    let mut r = Reader::new(&mut mem);

    let _len = r.expect_definite(Tag::SEQUENCE)?;
    let version = r.read_small_integer()?;
    if version != 0 {
        return Err(ErrorKind::BadData.into());
    }
    let n = r.read_integer_bytes()?;
    let e = r.read_integer_bytes()?;
    let d = r.read_integer_bytes()?;
    let p = r.read_integer_bytes()?;
    let q = r.read_integer_bytes()?;
    let e1 = r.read_integer_bytes()?;
    let e2 = r.read_integer_bytes()?;
    let u = r.read_integer_bytes()?;
    check_min_size(bit_length(&n))?;
    Ok(RsaPrivate { n, e, d, p, q, e1, e2, u })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> RsaPrivate {
        RsaPrivate {
            n: vec![0x80u8; 128],
            e: vec![0x01, 0x00, 0x01],
            d: vec![0x7fu8; 128],
            p: vec![0x90u8; 64],
            q: vec![0x91u8; 64],
            e1: vec![0x11u8; 64],
            e2: vec![0x12u8; 64],
            u: vec![0x13u8; 64],
        }
    }

    #[test]
    fn round_trip() {
        let original = key();
        let encoded = encode(&original).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.n, original.n);
        assert_eq!(decoded.d, original.d);
        assert_eq!(decoded.u, original.u);
    }

    #[test]
    fn rejects_other_version() {
        let mut mem = MemoryStream::open();
        {
            let mut w = Writer::new(&mut mem);
            let mut body_mem = MemoryStream::open();
            {
                let mut bw = Writer::new(&mut body_mem);
                bw.write_small_integer(1).unwrap();
                for _ in 0..8 {
                    bw.write_integer_bytes(&[1]).unwrap();
                }
            }
            let body = body_mem.as_slice().unwrap();
            w.write_constructed(Tag::SEQUENCE, body).unwrap();
        }
        let encoded = mem.as_slice().unwrap().to_vec();
        assert!(decode(&encoded).is_err());
    }
}
