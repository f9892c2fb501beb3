//! SSHv2 public-key codec (§4.5).
//!
//! ```text
//! string   "ssh-rsa"
//! mpint    e
//! mpint    n
//!
//! string   "ssh-dss"
//! mpint    p
//! mpint    q
//! mpint    g
//! mpint    y
//! ```
//! Diffie-Hellman keys have no standalone SSHv2 public-key blob format
//! (DH is negotiated in-protocol, not stored as a key blob), so only
//! the RSA and DSA dialects are implemented here.

use crate::backend::PublicKeyAlgorithm;
use crate::error::{ErrorKind, Result};

use super::{bit_length, check_min_size, DlpPublic, PublicKey, RsaPublic};

const RSA_NAME: &[u8] = b"ssh-rsa";
const DSA_NAME: &[u8] = b"ssh-dss";

fn write_string(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

fn write_mpint(out: &mut Vec<u8>, bytes: &[u8]) {
    let mut trimmed = bytes;
    while trimmed.len() > 1 && trimmed[0] == 0 && trimmed[1] & 0x80 == 0 {
        trimmed = &trimmed[1..];
    }
    let needs_pad = !trimmed.is_empty() && trimmed[0] & 0x80 != 0;
    let mut body = Vec::with_capacity(trimmed.len() + 1);
    if needs_pad {
        body.push(0);
    }
    body.extend_from_slice(trimmed);
    write_string(out, &body);
}

fn read_string(buf: &[u8], pos: &mut usize) -> Result<Vec<u8>> {
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

pub fn encode(key: &PublicKey) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    match key {
        PublicKey::Rsa(rsa) => {
            check_min_size(bit_length(&rsa.n))?;
            write_string(&mut out, RSA_NAME);
            write_mpint(&mut out, &rsa.e);
            write_mpint(&mut out, &rsa.n);
        }
        PublicKey::Dlp(PublicKeyAlgorithm::Dsa, dlp) => {
            check_min_size(bit_length(&dlp.p))?;
            write_string(&mut out, DSA_NAME);
            write_mpint(&mut out, &dlp.p);
            write_mpint(&mut out, &dlp.q);
            write_mpint(&mut out, &dlp.g);
            write_mpint(&mut out, &dlp.y);
        }
        PublicKey::Dlp(_, _) => return Err(ErrorKind::NotAvail.into()),
    }
    Ok(out)
}

pub fn decode(buf: &[u8]) -> Result<PublicKey> {
    let mut pos = 0;
    let name = read_string(buf, &mut pos)?;
    if name == RSA_NAME {
        let e = read_string(buf, &mut pos)?;
        let n = read_string(buf, &mut pos)?;
        check_min_size(bit_length(&n))?;
        Ok(PublicKey::Rsa(RsaPublic { n, e }))
    } else if name == DSA_NAME {
        let p = read_string(buf, &mut pos)?;
        let q = read_string(buf, &mut pos)?;
        let g = read_string(buf, &mut pos)?;
        let y = read_string(buf, &mut pos)?;
        check_min_size(bit_length(&p))?;
        Ok(PublicKey::Dlp(PublicKeyAlgorithm::Dsa, DlpPublic { p, q, g, y }))
    } else {
        Err(ErrorKind::NotAvail.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsa_round_trip() {
        let key = PublicKey::Rsa(RsaPublic {
            n: vec![0x80u8; 128],
            e: vec![0x01, 0x00, 0x01],
        });
        let encoded = encode(&key).unwrap();
        let decoded = decode(&encoded).unwrap();
        match decoded {
            PublicKey::Rsa(rsa) => assert_eq!(rsa.n, vec![0x80u8; 128]),
            _ => panic!("expected RSA"),
        }
    }

    #[test]
    fn dsa_round_trip() {
        let dlp = DlpPublic {
            p: vec![0x80u8; 128],
            q: vec![0x7fu8; 20],
            g: vec![0x02],
            y: vec![0x5u8; 128],
        };
        let key = PublicKey::Dlp(PublicKeyAlgorithm::Dsa, dlp.clone());
        let encoded = encode(&key).unwrap();
        let decoded = decode(&encoded).unwrap();
        match decoded {
            PublicKey::Dlp(PublicKeyAlgorithm::Dsa, got) => assert_eq!(got.g, dlp.g),
            _ => panic!("expected DSA"),
        }
    }

    #[test]
    fn rejects_dh_blob() {
        let dlp = DlpPublic {
            p: vec![0x80u8; 128],
            q: vec![0x7fu8; 20],
            g: vec![0x02],
            y: vec![0x5u8; 128],
        };
        let key = PublicKey::Dlp(PublicKeyAlgorithm::DiffieHellman, dlp);
        assert!(encode(&key).is_err());
    }
}
