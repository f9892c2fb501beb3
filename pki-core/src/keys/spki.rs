//! X.509 `SubjectPublicKeyInfo` codec (§4.5).
//!
//! ```text
//! SubjectPublicKeyInfo ::= SEQUENCE {
//!     algorithm   AlgorithmIdentifier,
//!     subjectPublicKey BIT STRING
//! }
//! ```
//! The RSA body inside the BIT STRING is `SEQUENCE { n, e }`. The DLP
//! body is a single `INTEGER y`; DLP algorithm parameters are
//! `SEQUENCE { p, q, g }` for DSA and `SEQUENCE { p, g, q }` for
//! DH/Elgamal — the X9.42 field ordering PKIX inherited for
//! Diffie-Hellman, which differs from DSA's.

use pki_stream::{MemoryStream, Stream};

use crate::asn1::{BitString, Oid, Reader, Tag, Writer};
use crate::backend::PublicKeyAlgorithm;
use crate::error::{ErrorKind, Result};

use super::{bit_length, check_min_size, DlpPublic, PublicKey, RsaPublic};

pub fn oid_for(alg: PublicKeyAlgorithm) -> Oid {
    match alg {
        PublicKeyAlgorithm::Rsa => Oid(vec![1, 2, 840, 113549, 1, 1, 1]),
        PublicKeyAlgorithm::Dsa => Oid(vec![1, 2, 840, 10040, 4, 1]),
        PublicKeyAlgorithm::DiffieHellman => Oid(vec![1, 2, 840, 10046, 2, 1]),
        PublicKeyAlgorithm::Elgamal => Oid(vec![1, 3, 14, 7, 2, 1, 1]),
        PublicKeyAlgorithm::Kea => Oid(vec![2, 16, 840, 1, 101, 2, 1, 1, 22]),
    }
}

fn algorithm_for_oid(oid: &Oid) -> Result<PublicKeyAlgorithm> {
    let rsa = Oid(vec![1, 2, 840, 113549, 1, 1, 1]);
    let dsa = Oid(vec![1, 2, 840, 10040, 4, 1]);
    let dh = Oid(vec![1, 2, 840, 10046, 2, 1]);
    let elgamal = Oid(vec![1, 3, 14, 7, 2, 1, 1]);
    if *oid == rsa {
        Ok(PublicKeyAlgorithm::Rsa)
    } else if *oid == dsa {
        Ok(PublicKeyAlgorithm::Dsa)
    } else if *oid == dh {
        Ok(PublicKeyAlgorithm::DiffieHellman)
    } else if *oid == elgamal {
        Ok(PublicKeyAlgorithm::Elgamal)
    } else {
        Err(ErrorKind::NotAvail.into())
    }
}

/// The wire ordering of DLP domain parameters, which is algorithm
/// dependent: DSA uses `p, q, g`; DH and Elgamal use `p, g, q`
/// (X9.42 ordering).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum DlpParamOrder {
    PQG,
    PGQ,
}

pub fn param_order_for(alg: PublicKeyAlgorithm) -> DlpParamOrder {
    match alg {
        PublicKeyAlgorithm::Dsa => DlpParamOrder::PQG,
        _ => DlpParamOrder::PGQ,
    }
}

fn write_algorithm_identifier(w: &mut Writer, alg: PublicKeyAlgorithm, dlp: Option<&DlpPublic>) -> Result<()> {
    let oid = oid_for(alg);
    let params = if let Some(d) = dlp {
        let order = param_order_for(alg);
        let mut mem = MemoryStream::open();
        {
            let mut inner = Writer::new(&mut mem);
            write_dlp_params(&mut inner, d, order)?;
        }
        Some(mem.as_slice().unwrap().to_vec())
    } else {
        None
    };

    let mut mem = MemoryStream::open();
    {
        let mut inner = Writer::new(&mut mem);
        inner.write_oid(&oid)?;
        if let Some(p) = &params {
            inner.stream().write(p).map_err(crate::error::Error::from)?;
        } else {
            inner.write_tag_length(Tag::NULL, 0)?;
        }
    }
    let body = mem.as_slice().unwrap();
    w.write_constructed(Tag::SEQUENCE, body)
}

fn write_dlp_params(w: &mut Writer, d: &DlpPublic, order: DlpParamOrder) -> Result<()> {
    let mut mem = MemoryStream::open();
    {
        let mut inner = Writer::new(&mut mem);
        match order {
            DlpParamOrder::PQG => {
                inner.write_integer_bytes(&d.p)?;
                inner.write_integer_bytes(&d.q)?;
                inner.write_integer_bytes(&d.g)?;
            }
            DlpParamOrder::PGQ => {
                inner.write_integer_bytes(&d.p)?;
                inner.write_integer_bytes(&d.g)?;
                inner.write_integer_bytes(&d.q)?;
            }
        }
    }
    let body = mem.as_slice().unwrap();
    w.write_constructed(Tag::SEQUENCE, body)
}

/// Encodes a `SubjectPublicKeyInfo`. Enforces §4.5's minimum key size
/// and, for DLP keys, the minimum generator size.
pub fn encode(key: &PublicKey) -> Result<Vec<u8>> {
    match key {
        PublicKey::Rsa(rsa) => {
            check_min_size(bit_length(&rsa.n))?;
            let mut inner_mem = MemoryStream::open();
            {
                let mut inner = Writer::new(&mut inner_mem);
                let mut body_mem = MemoryStream::open();
                {
                    let mut bw = Writer::new(&mut body_mem);
                    bw.write_integer_bytes(&rsa.n)?;
                    bw.write_integer_bytes(&rsa.e)?;
                }
                let body = body_mem.as_slice().unwrap();
                inner.write_constructed(Tag::SEQUENCE, body)?;
            }
            let rsa_body = inner_mem.as_slice().unwrap();
            wrap_spki(PublicKeyAlgorithm::Rsa, None, rsa_body)
        }
        PublicKey::Dlp(alg, dlp) => {
            check_min_size(bit_length(&dlp.p))?;
            if bit_length(&dlp.g) == 0 {
                return Err(ErrorKind::Invalid.into());
            }
            let mut inner_mem = MemoryStream::open();
            {
                let mut inner = Writer::new(&mut inner_mem);
                inner.write_integer_bytes(&dlp.y)?;
            }
            let y_body = inner_mem.as_slice().unwrap();
            wrap_spki(*alg, Some(dlp), y_body)
        }
    }
}

fn wrap_spki(alg: PublicKeyAlgorithm, dlp: Option<&DlpPublic>, key_body: &[u8]) -> Result<Vec<u8>> {
    let mut outer = MemoryStream::open();
    {
        let mut w = Writer::new(&mut outer);
        let mut alg_mem = MemoryStream::open();
        {
            let mut aw = Writer::new(&mut alg_mem);
            write_algorithm_identifier(&mut aw, alg, dlp)?;
        }
        let alg_bytes = alg_mem.as_slice().unwrap();

        let bit_string = BitString {
            unused_bits: 0,
            bytes: key_body.to_vec(),
        };

        let mut seq_mem = MemoryStream::open();
        {
            let mut sw = Writer::new(&mut seq_mem);
            sw.stream().write(alg_bytes).map_err(crate::error::Error::from)?;
            sw.write_bit_string(&bit_string)?;
        }
        let seq_body = seq_mem.as_slice().unwrap();
        w.write_constructed(Tag::SEQUENCE, seq_body)?;
    }
    Ok(outer.as_slice().unwrap().to_vec())
}

/// Decodes a `SubjectPublicKeyInfo`, assigning the algorithm-appropriate
/// [`super::KeyPermissions`] is the caller's job (it depends on whether
/// this came from a certificate or a freshly generated key).
pub fn decode(buf: &[u8]) -> Result<PublicKey> {
    let mut mem = MemoryStream::open();
    mem.write(buf).map_err(crate::error::Error::from)?;
    mem.seek(0).map_err(crate::error::Error::from)?;
    let mut r = Reader::new(&mut mem);

    let _len = r.expect_definite(Tag::SEQUENCE)?;
    let _alg_len = r.expect_definite(Tag::SEQUENCE)?;
    let oid = r.read_oid()?;
    let alg = algorithm_for_oid(&oid)?;

    let dlp_params = match alg {
        PublicKeyAlgorithm::Rsa => {
            // AlgorithmIdentifier parameters is NULL for RSA; skip it.
            let tag = r.peek_tag()?;
            if tag == Tag::NULL {
                let _ = r.expect_definite(Tag::NULL)?;
            }
            None
        }
        _ => {
            let order = param_order_for(alg);
            let _params_len = r.expect_definite(Tag::SEQUENCE)?;
            let (a, b, c) = (r.read_integer_bytes()?, r.read_integer_bytes()?, r.read_integer_bytes()?);
            Some(match order {
                DlpParamOrder::PQG => (a, b, c), // p, q, g
                DlpParamOrder::PGQ => (a, c, b), // p, g, q -> reorder to (p, q, g)
            })
        }
    };

    let bits = r.read_bit_string()?;
    if bits.unused_bits != 0 {
        return Err(ErrorKind::BadData.into());
    }
    let mut kmem = MemoryStream::open();
    kmem.write(&bits.bytes).map_err(crate::error::Error::from)?;
    kmem.seek(0).map_err(crate::error::Error::from)?;
    let mut kr = Reader::new(&mut kmem);

    match alg {
        PublicKeyAlgorithm::Rsa => {
            let _len = kr.expect_definite(Tag::SEQUENCE)?;
            let n = kr.read_integer_bytes()?;
            let e = kr.read_integer_bytes()?;
            check_min_size(bit_length(&n))?;
            Ok(PublicKey::Rsa(RsaPublic { n, e }))
        }
        _ => {
            let (p, q, g) = dlp_params.ok_or(ErrorKind::BadData)?;
            let y = kr.read_integer_bytes()?;
            check_min_size(bit_length(&p))?;
            Ok(PublicKey::Dlp(alg, DlpPublic { p, q, g, y }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rsa_1024() -> RsaPublic {
        RsaPublic {
            n: vec![0x80u8; 128], // 1024-bit modulus, high bit set
            e: vec![0x01, 0x00, 0x01],
        }
    }

    #[test]
    fn rsa_round_trip() {
        let key = PublicKey::Rsa(rsa_1024());
        let encoded = encode(&key).unwrap();
        let decoded = decode(&encoded).unwrap();
        match decoded {
            PublicKey::Rsa(rsa) => {
                assert_eq!(rsa.n, rsa_1024().n);
                assert_eq!(rsa.e, rsa_1024().e);
            }
            _ => panic!("expected RSA"),
        }
    }

    #[test]
    fn rejects_undersized_key() {
        let key = PublicKey::Rsa(RsaPublic {
            n: vec![0x80u8; 32], // 256 bits, below MIN_PKCSIZE_BITS
            e: vec![0x01, 0x00, 0x01],
        });
        assert!(encode(&key).is_err());
    }

    #[test]
    fn dsa_param_order_round_trip() {
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
            PublicKey::Dlp(PublicKeyAlgorithm::Dsa, got) => {
                assert_eq!(got.p, dlp.p);
                assert_eq!(got.q, dlp.q);
                assert_eq!(got.g, dlp.g);
            }
            _ => panic!("expected DSA"),
        }
    }
}
