//! Key-ID computation (§4.5, §9).
//!
//! Three distinct key-ID flavours coexist in this crate, matching the
//! three contexts a key can be looked up in:
//!
//! - The cryptlib key-ID: `SHA-1` over the DER-encoded
//!   `SubjectPublicKeyInfo`. Used for certificate/context lookups that
//!   don't involve OpenPGP at all.
//! - The OpenPGP v4 key-ID: the low 64 bits of `SHA-1` over
//!   `0x99 ‖ u16(packet length) ‖ packet body`, where `packet body` is
//!   the already-encoded public-key packet (version octet, creation
//!   time, algorithm octet, MPIs).
//! - The OpenPGP v3 fallback (§9 open question, resolved in favour of
//!   cryptlib's own behaviour): if a v3 key has no usable creation
//!   time to feed the v4-style computation, the low 64 bits of the
//!   *cryptlib* key-ID stand in instead of a real PGP v3 fingerprint
//!   (which is MD5-based and out of scope here). This is a deliberate
//!   fallback, not a bug — preserved verbatim because changing it would
//!   silently break interoperability with anything that already
//!   expects this quirk.
//! - The classic PGP 2.x RSA key-ID: the low 64 bits of the modulus
//!   `n` itself, no hashing involved. Predates v3/v4 fingerprints
//!   entirely and only ever applied to RSA.

use digest::Digest;
use sha1collisiondetection::Sha1CD;

use crate::error::{ErrorKind, Result};

use super::spki;
use super::{PublicKey, RsaPublic};

/// 20-byte cryptlib key-ID: `SHA-1` over the encoded `SubjectPublicKeyInfo`.
pub fn cryptlib_key_id(key: &PublicKey) -> Result<[u8; 20]> {
    let encoded = spki::encode(key)?;
    Ok(sha1(&encoded))
}

fn sha1(data: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1CD::default();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest);
    out
}

/// The low 64 bits of `SHA-1` over `0x99 ‖ u16(len) ‖ packet`, per
/// RFC 4880's v4 fingerprint construction (the key-ID is just its
/// low-order 8 bytes).
pub fn openpgp_v4_key_id(encoded_public_packet: &[u8]) -> [u8; 8] {
    let len = encoded_public_packet.len() as u16;
    let mut preimage = Vec::with_capacity(3 + encoded_public_packet.len());
    preimage.push(0x99);
    preimage.extend_from_slice(&len.to_be_bytes());
    preimage.extend_from_slice(encoded_public_packet);
    let digest = sha1(&preimage);
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[12..20]);
    out
}

/// The v3 fallback key-ID: the first 8 bytes of the cryptlib key-ID,
/// used only when no creation time is available to drive
/// [`openpgp_v4_key_id`]'s real computation.
pub fn openpgp_v3_fallback_key_id(key: &PublicKey) -> Result<[u8; 8]> {
    let full = cryptlib_key_id(key)?;
    let mut out = [0u8; 8];
    out.copy_from_slice(&full[..8]);
    Ok(out)
}

/// The classic PGP 2.x RSA key-ID: the low 64 bits of the modulus
/// `n`, read as a big-endian integer — no hashing. Requires at least
/// 8 bytes of modulus, which every RSA key this crate accepts has.
pub fn pgp_rsa_key_id(key: &RsaPublic) -> Result<[u8; 8]> {
    let n = &key.n;
    if n.len() < 8 {
        return Err(ErrorKind::BadData.into());
    }
    let mut out = [0u8; 8];
    out.copy_from_slice(&n[n.len() - 8..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::RsaPublic;

    fn key() -> PublicKey {
        PublicKey::Rsa(RsaPublic {
            n: vec![0x80u8; 128],
            e: vec![0x01, 0x00, 0x01],
        })
    }

    #[test]
    fn cryptlib_key_id_is_deterministic() {
        let a = cryptlib_key_id(&key()).unwrap();
        let b = cryptlib_key_id(&key()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn v3_fallback_matches_cryptlib_prefix() {
        let full = cryptlib_key_id(&key()).unwrap();
        let fallback = openpgp_v3_fallback_key_id(&key()).unwrap();
        assert_eq!(&full[..8], &fallback[..]);
    }

    #[test]
    fn pgp_rsa_key_id_is_low_64_bits_of_modulus() {
        let k = RsaPublic {
            n: vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a],
            e: vec![0x01, 0x00, 0x01],
        };
        let id = pgp_rsa_key_id(&k).unwrap();
        assert_eq!(id, [0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a]);
    }

    #[test]
    fn pgp_rsa_key_id_rejects_short_modulus() {
        let k = RsaPublic {
            n: vec![0x01, 0x02, 0x03],
            e: vec![0x01, 0x00, 0x01],
        };
        assert!(pgp_rsa_key_id(&k).is_err());
    }

    #[test]
    fn v4_key_id_is_low_64_bits_of_sha1() {
        let packet = vec![4u8, 0, 0, 0, 1, 1, 0, 1, 0]; // arbitrary fixed packet
        let id_a = openpgp_v4_key_id(&packet);
        let id_b = openpgp_v4_key_id(&packet);
        assert_eq!(id_a, id_b);
        let mut preimage = vec![0x99u8];
        preimage.extend_from_slice(&(packet.len() as u16).to_be_bytes());
        preimage.extend_from_slice(&packet);
        let digest = sha1(&preimage);
        assert_eq!(&digest[12..20], &id_a[..]);
    }
}
