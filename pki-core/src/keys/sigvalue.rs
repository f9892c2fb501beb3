//! DLP (DSA) signature value codec (§4.5): the same `(r, s)` pair
//! encoded in three different wire shapes depending on the protocol
//! context.

use pki_stream::{MemoryStream, Stream};

use crate::asn1::{Reader, Tag, Writer};
use crate::error::{Error, ErrorKind, Result};

/// A raw DSA/DLP signature, before dialect-specific encoding.
#[derive(Clone, Debug)]
pub struct DlpSignature {
    pub r: Vec<u8>,
    pub s: Vec<u8>,
}

/// cryptlib/X.509 form: `SEQUENCE { r INTEGER, s INTEGER }`.
pub fn encode_cryptlib(sig: &DlpSignature) -> Result<Vec<u8>> {
    let mut mem = MemoryStream::open();
    {
        let mut w = Writer::new(&mut mem);
        let mut body_mem = MemoryStream::open();
        {
            let mut bw = Writer::new(&mut body_mem);
            bw.write_integer_bytes(&sig.r)?;
            bw.write_integer_bytes(&sig.s)?;
        }
        let body = body_mem.as_slice().unwrap();
        w.write_constructed(Tag::SEQUENCE, body)?;
    }
    Ok(mem.as_slice().unwrap().to_vec())
}

pub fn decode_cryptlib(buf: &[u8]) -> Result<DlpSignature> {
    let mut mem = MemoryStream::open();
    mem.write(buf).map_err(Error::from)?;
    mem.seek(0).map_err(Error::from)?;
    let mut r = Reader::new(&mut mem);
    let _len = r.expect_definite(Tag::SEQUENCE)?;
    let rr = r.read_integer_bytes()?;
    let s = r.read_integer_bytes()?;
    Ok(DlpSignature { r: rr, s })
}

fn write_mpi(out: &mut Vec<u8>, bytes: &[u8]) {
    let mut trimmed = bytes;
    while trimmed.len() > 1 && trimmed[0] == 0 {
        trimmed = &trimmed[1..];
    }
    let bits = super::bit_length(trimmed);
    out.extend_from_slice(&(bits as u16).to_be_bytes());
    if trimmed != [0] {
        out.extend_from_slice(trimmed);
    }
}

fn read_mpi(buf: &[u8], pos: &mut usize) -> Result<Vec<u8>> {
    if *pos + 2 > buf.len() {
        return Err(ErrorKind::Underflow.into());
    }
    let bits = u16::from_be_bytes([buf[*pos], buf[*pos + 1]]) as usize;
    *pos += 2;
    let nbytes = (bits + 7) / 8;
    if *pos + nbytes > buf.len() {
        return Err(ErrorKind::Underflow.into());
    }
    let bytes = buf[*pos..*pos + nbytes].to_vec();
    *pos += nbytes;
    Ok(bytes)
}

/// OpenPGP form: two consecutive MPIs, `r` then `s`.
pub fn encode_pgp(sig: &DlpSignature) -> Vec<u8> {
    let mut out = Vec::new();
    write_mpi(&mut out, &sig.r);
    write_mpi(&mut out, &sig.s);
    out
}

pub fn decode_pgp(buf: &[u8]) -> Result<DlpSignature> {
    let mut pos = 0;
    let r = read_mpi(buf, &mut pos)?;
    let s = read_mpi(buf, &mut pos)?;
    Ok(DlpSignature { r, s })
}

/// SSH form: two fixed 20-byte zero-padded big-endian blocks
/// (SSH DSA signatures carry no length prefix per component — the
/// 160-bit DSA subgroup size fixes both at exactly 20 bytes).
pub fn encode_ssh(sig: &DlpSignature) -> Result<[u8; 40]> {
    let mut out = [0u8; 40];
    pad_into(&mut out[0..20], &sig.r)?;
    pad_into(&mut out[20..40], &sig.s)?;
    Ok(out)
}

fn pad_into(slot: &mut [u8], value: &[u8]) -> Result<()> {
    let mut trimmed = value;
    while trimmed.len() > 1 && trimmed[0] == 0 {
        trimmed = &trimmed[1..];
    }
    if trimmed.len() > slot.len() {
        return Err(ErrorKind::Overflow.into());
    }
    let offset = slot.len() - trimmed.len();
    slot[offset..].copy_from_slice(trimmed);
    Ok(())
}

pub fn decode_ssh(buf: &[u8; 40]) -> DlpSignature {
    DlpSignature {
        r: buf[0..20].to_vec(),
        s: buf[20..40].to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig() -> DlpSignature {
        DlpSignature {
            r: vec![0x7fu8; 20],
            s: vec![0x80u8; 20],
        }
    }

    #[test]
    fn cryptlib_round_trip() {
        let encoded = encode_cryptlib(&sig()).unwrap();
        let decoded = decode_cryptlib(&encoded).unwrap();
        assert_eq!(decoded.r, sig().r);
        assert_eq!(decoded.s, sig().s);
    }

    #[test]
    fn pgp_round_trip() {
        let encoded = encode_pgp(&sig());
        let decoded = decode_pgp(&encoded).unwrap();
        assert_eq!(decoded.r, sig().r);
        assert_eq!(decoded.s, sig().s);
    }

    #[test]
    fn ssh_round_trip_pads_to_20_bytes() {
        let short = DlpSignature {
            r: vec![0x01],
            s: vec![0x02],
        };
        let encoded = encode_ssh(&short).unwrap();
        assert_eq!(encoded[19], 0x01);
        assert_eq!(encoded[0..19], [0u8; 19]);
        let decoded = decode_ssh(&encoded);
        assert_eq!(decoded.r, vec![0u8; 19].into_iter().chain(vec![0x01]).collect::<Vec<u8>>());
    }
}
