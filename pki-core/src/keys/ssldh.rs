//! SSL/TLS `ServerKeyExchange` Diffie-Hellman parameter codec (§4.5).
//!
//! ```text
//! uint16   plen
//! opaque   p[plen]
//! uint16   glen
//! opaque   g[glen]
//! ```
//! No `q` travels on this wire at all — the classic SSL/TLS DH
//! exchange predates X9.42 and trusts the peer to have picked a safe
//! prime; this dialect is params-only; there's no public value `y`
//! here (that's `dh_Ys`, carried alongside but out of scope for this
//! codec, which only handles the shared domain parameters).

use crate::error::{ErrorKind, Result};

use super::bit_length;

#[derive(Clone, Debug)]
pub struct SslDhParams {
    pub p: Vec<u8>,
    pub g: Vec<u8>,
}

fn write_opaque16(out: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    if bytes.len() > u16::MAX as usize {
        return Err(ErrorKind::Overflow.into());
    }
    out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

fn read_opaque16(buf: &[u8], pos: &mut usize) -> Result<Vec<u8>> {
    if *pos + 2 > buf.len() {
        return Err(ErrorKind::Underflow.into());
    }
    let len = u16::from_be_bytes([buf[*pos], buf[*pos + 1]]) as usize;
    *pos += 2;
    if *pos + len > buf.len() {
        return Err(ErrorKind::Underflow.into());
    }
    let bytes = buf[*pos..*pos + len].to_vec();
    *pos += len;
    Ok(bytes)
}

pub fn encode(params: &SslDhParams) -> Result<Vec<u8>> {
    super::check_min_size(bit_length(&params.p))?;
    let mut out = Vec::new();
    write_opaque16(&mut out, &params.p)?;
    write_opaque16(&mut out, &params.g)?;
    Ok(out)
}

pub fn decode(buf: &[u8]) -> Result<SslDhParams> {
    let mut pos = 0;
    let p = read_opaque16(buf, &mut pos)?;
    let g = read_opaque16(buf, &mut pos)?;
    super::check_min_size(bit_length(&p))?;
    if g.is_empty() {
        return Err(ErrorKind::BadData.into());
    }
    Ok(SslDhParams { p, g })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let params = SslDhParams {
            p: vec![0x80u8; 128],
            g: vec![0x02],
        };
        let encoded = encode(&params).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.p, params.p);
        assert_eq!(decoded.g, params.g);
    }
}
