//! SSHv1 public-key codec (§4.5).
//!
//! The legacy SSH-1 wire format for an RSA public key is not ASN.1 at
//! all: a 32-bit bit-length of the modulus, then the exponent and
//! modulus as SSH "mpint"s (a 32-bit byte count followed by a
//! two's-complement big-endian magnitude, most-significant bit clear
//! unless the value is negative — RSA components never are).
//!
//! ```text
//! uint32   bits       -- bit length of the modulus
//! mpint    e
//! mpint    n
//! ```

use crate::error::{ErrorKind, Result};

use super::{bit_length, check_min_size, RsaPublic};

fn write_mpint(out: &mut Vec<u8>, bytes: &[u8]) {
    let mut trimmed = bytes;
    while trimmed.len() > 1 && trimmed[0] == 0 && trimmed[1] & 0x80 == 0 {
        trimmed = &trimmed[1..];
    }
    let needs_pad = !trimmed.is_empty() && trimmed[0] & 0x80 != 0;
    let len = trimmed.len() + if needs_pad { 1 } else { 0 };
    out.extend_from_slice(&(len as u32).to_be_bytes());
    if needs_pad {
        out.push(0);
    }
    out.extend_from_slice(trimmed);
}

fn read_mpint(buf: &[u8], pos: &mut usize) -> Result<Vec<u8>> {
    if *pos + 4 > buf.len() {
        return Err(ErrorKind::Underflow.into());
    }
    let len = u32::from_be_bytes([buf[*pos], buf[*pos + 1], buf[*pos + 2], buf[*pos + 3]]) as usize;
    *pos += 4;
    if *pos + len > buf.len() {
        return Err(ErrorKind::Underflow.into());
    }
    let bytes = buf[*pos..*pos + len].to_vec();
    *pos += len;
    Ok(bytes)
}

pub fn encode(key: &RsaPublic) -> Result<Vec<u8>> {
    let bits = bit_length(&key.n);
    check_min_size(bits)?;
    let mut out = Vec::new();
    out.extend_from_slice(&(bits as u32).to_be_bytes());
    write_mpint(&mut out, &key.e);
    write_mpint(&mut out, &key.n);
    Ok(out)
}

pub fn decode(buf: &[u8]) -> Result<RsaPublic> {
    if buf.len() < 4 {
        return Err(ErrorKind::Underflow.into());
    }
    let claimed_bits = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    let mut pos = 4;
    let e = read_mpint(buf, &mut pos)?;
    let n = read_mpint(buf, &mut pos)?;
    let bits = bit_length(&n);
    check_min_size(bits)?;
    if claimed_bits != bits {
        return Err(ErrorKind::BadData.into());
    }
    Ok(RsaPublic { n, e })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let key = RsaPublic {
            n: vec![0x80u8; 128],
            e: vec![0x01, 0x00, 0x01],
        };
        let encoded = encode(&key).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.n, key.n);
        assert_eq!(decoded.e, key.e);
    }

    #[test]
    fn rejects_truncated_input() {
        assert!(decode(&[0, 0, 4, 0]).is_err());
    }
}
