//! OpenPGP public/secret-key packet body codec (§4.5), versions 2, 3
//! and 4.
//!
//! ```text
//! -- v4
//! byte    version (4)
//! uint32  creation time
//! byte    public-key algorithm
//! MPI     ...                 -- algorithm-specific public components
//!
//! -- v2/v3
//! byte    version (2 or 3)
//! uint32  creation time
//! uint16  validity period, in days (0 = never expires)
//! byte    public-key algorithm
//! MPI     ...
//! ```
//! A secret-key packet appends a string-to-key usage octet after the
//! public part. Usage `0` (unencrypted) is followed by the plain
//! secret MPIs and a 16-bit checksum; any other usage byte means the
//! secret components are passphrase-protected, which this codec
//! doesn't decrypt (that's a [`crate::backend::Backend`] concern, not
//! a wire-format one) — such packets decode only as far as their
//! public half.

use crate::backend::PublicKeyAlgorithm;
use crate::error::{ErrorKind, Result};

use super::{bit_length, check_min_size, DlpPrivate, DlpPublic, PublicKey, RsaPrivate, RsaPublic};

const ALG_RSA: u8 = 1;
const ALG_ELGAMAL: u8 = 16;
const ALG_DSA: u8 = 17;
const ALG_ELGAMAL_SIGN: u8 = 20;
const ALG_DH: u8 = 21;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Version {
    V2,
    V3,
    V4,
}

impl Version {
    fn has_validity_field(self) -> bool {
        matches!(self, Version::V2 | Version::V3)
    }

    fn wire_byte(self) -> u8 {
        match self {
            Version::V2 => 2,
            Version::V3 => 3,
            Version::V4 => 4,
        }
    }

    fn from_wire_byte(b: u8) -> Result<Self> {
        match b {
            2 => Ok(Version::V2),
            3 => Ok(Version::V3),
            4 => Ok(Version::V4),
            _ => Err(ErrorKind::BadData.into()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PublicKeyPacket {
    pub version: Version,
    pub creation_time: u32,
    /// Days until expiry; only meaningful for v2/v3, always `0` (never
    /// expires) for v4, which carries expiry as a signature subpacket
    /// instead.
    pub validity_days: u16,
    pub key: PublicKey,
}

fn algorithm_id(alg: PublicKeyAlgorithm) -> u8 {
    match alg {
        PublicKeyAlgorithm::Rsa => ALG_RSA,
        PublicKeyAlgorithm::Dsa => ALG_DSA,
        PublicKeyAlgorithm::Elgamal => ALG_ELGAMAL,
        PublicKeyAlgorithm::DiffieHellman => ALG_DH,
        PublicKeyAlgorithm::Kea => 0,
    }
}

fn algorithm_from_id(id: u8) -> Result<PublicKeyAlgorithm> {
    match id {
        ALG_RSA => Ok(PublicKeyAlgorithm::Rsa),
        ALG_DSA => Ok(PublicKeyAlgorithm::Dsa),
        ALG_ELGAMAL | ALG_ELGAMAL_SIGN => Ok(PublicKeyAlgorithm::Elgamal),
        ALG_DH => Ok(PublicKeyAlgorithm::DiffieHellman),
        _ => Err(ErrorKind::NotAvail.into()),
    }
}

fn write_mpi(out: &mut Vec<u8>, bytes: &[u8]) {
    let mut trimmed = bytes;
    while trimmed.len() > 1 && trimmed[0] == 0 {
        trimmed = &trimmed[1..];
    }
    let bits = bit_length(trimmed);
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

pub fn encode_public(packet: &PublicKeyPacket) -> Result<Vec<u8>> {
    let mut out = vec![packet.version.wire_byte()];
    out.extend_from_slice(&packet.creation_time.to_be_bytes());
    if packet.version.has_validity_field() {
        out.extend_from_slice(&packet.validity_days.to_be_bytes());
    }
    out.push(algorithm_id(packet.key.algorithm()));
    match &packet.key {
        PublicKey::Rsa(rsa) => {
            check_min_size(bit_length(&rsa.n))?;
            write_mpi(&mut out, &rsa.n);
            write_mpi(&mut out, &rsa.e);
        }
        PublicKey::Dlp(PublicKeyAlgorithm::Dsa, dlp) => {
            check_min_size(bit_length(&dlp.p))?;
            write_mpi(&mut out, &dlp.p);
            write_mpi(&mut out, &dlp.q);
            write_mpi(&mut out, &dlp.g);
            write_mpi(&mut out, &dlp.y);
        }
        PublicKey::Dlp(_, dlp) => {
            // DH and Elgamal share the p, g, y ordering (no q).
            check_min_size(bit_length(&dlp.p))?;
            write_mpi(&mut out, &dlp.p);
            write_mpi(&mut out, &dlp.g);
            write_mpi(&mut out, &dlp.y);
        }
    }
    Ok(out)
}

pub fn decode_public(buf: &[u8]) -> Result<PublicKeyPacket> {
    if buf.is_empty() {
        return Err(ErrorKind::Underflow.into());
    }
    let version = Version::from_wire_byte(buf[0])?;
    let mut pos = 1;
    if pos + 4 > buf.len() {
        return Err(ErrorKind::Underflow.into());
    }
    let creation_time = u32::from_be_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]]);
    pos += 4;
    let validity_days = if version.has_validity_field() {
        if pos + 2 > buf.len() {
            return Err(ErrorKind::Underflow.into());
        }
        let v = u16::from_be_bytes([buf[pos], buf[pos + 1]]);
        pos += 2;
        v
    } else {
        0
    };
    if pos >= buf.len() {
        return Err(ErrorKind::Underflow.into());
    }
    let alg = algorithm_from_id(buf[pos])?;
    pos += 1;

    let key = match alg {
        PublicKeyAlgorithm::Rsa => {
            let n = read_mpi(buf, &mut pos)?;
            let e = read_mpi(buf, &mut pos)?;
            check_min_size(bit_length(&n))?;
            PublicKey::Rsa(RsaPublic { n, e })
        }
        PublicKeyAlgorithm::Dsa => {
            let p = read_mpi(buf, &mut pos)?;
            let q = read_mpi(buf, &mut pos)?;
            let g = read_mpi(buf, &mut pos)?;
            let y = read_mpi(buf, &mut pos)?;
            check_min_size(bit_length(&p))?;
            PublicKey::Dlp(PublicKeyAlgorithm::Dsa, DlpPublic { p, q, g, y })
        }
        PublicKeyAlgorithm::DiffieHellman | PublicKeyAlgorithm::Elgamal => {
            let p = read_mpi(buf, &mut pos)?;
            let g = read_mpi(buf, &mut pos)?;
            let y = read_mpi(buf, &mut pos)?;
            check_min_size(bit_length(&p))?;
            PublicKey::Dlp(alg, DlpPublic { p, q: Vec::new(), g, y })
        }
        PublicKeyAlgorithm::Kea => return Err(ErrorKind::NotAvail.into()),
    };

    Ok(PublicKeyPacket {
        version,
        creation_time,
        validity_days,
        key,
    })
}

/// Appends an unencrypted (`s2k_usage == 0`) secret-key portion after
/// an already-encoded public-key body.
pub fn encode_secret_unencrypted(
    public_encoded: &[u8],
    alg: PublicKeyAlgorithm,
    rsa: Option<&RsaPrivate>,
    dlp: Option<&DlpPrivate>,
) -> Result<Vec<u8>> {
    let mut out = public_encoded.to_vec();
    out.push(0); // s2k_usage: unencrypted
    let mut secret = Vec::new();
    match alg {
        PublicKeyAlgorithm::Rsa => {
            let rsa = rsa.ok_or(ErrorKind::BadData)?;
            write_mpi(&mut secret, &rsa.d);
            write_mpi(&mut secret, &rsa.p);
            write_mpi(&mut secret, &rsa.q);
            write_mpi(&mut secret, &rsa.u);
        }
        PublicKeyAlgorithm::Dsa | PublicKeyAlgorithm::DiffieHellman | PublicKeyAlgorithm::Elgamal => {
            let dlp = dlp.ok_or(ErrorKind::BadData)?;
            write_mpi(&mut secret, &dlp.x);
        }
        PublicKeyAlgorithm::Kea => return Err(ErrorKind::NotAvail.into()),
    }
    let checksum: u32 = secret.iter().fold(0u32, |acc, &b| acc + b as u32) & 0xffff;
    out.extend_from_slice(&secret);
    out.extend_from_slice(&(checksum as u16).to_be_bytes());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v4_rsa_round_trip() {
        let packet = PublicKeyPacket {
            version: Version::V4,
            creation_time: 0x5f5e1000,
            validity_days: 0,
            key: PublicKey::Rsa(RsaPublic {
                n: vec![0x80u8; 128],
                e: vec![0x01, 0x00, 0x01],
            }),
        };
        let encoded = encode_public(&packet).unwrap();
        let decoded = decode_public(&encoded).unwrap();
        assert_eq!(decoded.version, Version::V4);
        assert_eq!(decoded.creation_time, packet.creation_time);
        match decoded.key {
            PublicKey::Rsa(rsa) => assert_eq!(rsa.n, vec![0x80u8; 128]),
            _ => panic!("expected RSA"),
        }
    }

    #[test]
    fn v3_has_validity_field() {
        let packet = PublicKeyPacket {
            version: Version::V3,
            creation_time: 1,
            validity_days: 365,
            key: PublicKey::Rsa(RsaPublic {
                n: vec![0x80u8; 128],
                e: vec![0x03],
            }),
        };
        let encoded = encode_public(&packet).unwrap();
        let decoded = decode_public(&encoded).unwrap();
        assert_eq!(decoded.validity_days, 365);
    }

    #[test]
    fn mpi_strips_leading_zero_bytes_from_bit_count() {
        let mut out = Vec::new();
        write_mpi(&mut out, &[0x00, 0x01]);
        assert_eq!(&out[..2], &[0x00, 0x01]); // 1 bit
    }
}
