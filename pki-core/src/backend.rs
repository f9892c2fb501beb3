//! The cryptographic capability interface.
//!
//! §1 places "the raw block-cipher, hash and bignum implementations"
//! and "the PKCS #11 / Fortezza / hardware-token device drivers"
//! outside this crate's scope: the core only ever asks a capability
//! trait for an operation rather than calling a concrete crypto
//! library directly, so a software or hardware-token implementation
//! can be swapped in without touching the encoding/protocol layers.
//! `pki-core` ships no production implementation of this trait; an
//! embedding application wires in a software or hardware-token backend.
//! A deterministic, explicitly non-cryptographic implementation is
//! available under the `test-backend` feature for driving the
//! invariants in §8 without pulling in a real PKC implementation.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::Result;

/// Symmetric or asymmetric algorithm identifiers the core needs to
/// name when asking the backend for an operation or emitting an
/// `AlgorithmIdentifier`. This is deliberately smaller than a full
/// OID registry — the core maps these to/from OIDs in `keys::keyid`
/// and `cms`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum PublicKeyAlgorithm {
    Rsa,
    Dsa,
    DiffieHellman,
    Elgamal,
    Kea,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum CipherAlgorithm {
    TripleDes,
    Cast128,
    Idea,
    Aes128,
    Aes192,
    Aes256,
    Rc2,
    Skipjack,
}

/// A symmetric key or other secret buffer that zeroizes on drop,
/// matching §9's "manual memory wiping... compiler cannot elide"
/// design note.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Protected(pub Vec<u8>);

impl Protected {
    pub fn new(bytes: Vec<u8>) -> Self {
        Protected(bytes)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Protected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Protected({} bytes, redacted)", self.0.len())
    }
}

/// An opaque public-key component set (RSA n/e, DSA/DH/Elgamal p/q/g/y,
/// …). Stored as big-endian magnitude byte strings; `keys` interprets
/// them per dialect, the backend interprets them for the actual math.
#[derive(Clone, Debug, Default)]
pub struct PublicComponents(pub Vec<Vec<u8>>);

/// As [`PublicComponents`], for the private half; zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop, Default)]
pub struct PrivateComponents(pub Vec<Vec<u8>>);

/// The cryptographic device interface a context's dependent device
/// (§3 `Context`, §4.3 "dependent objects") must expose.
///
/// The kernel never performs cryptography itself; every `encrypt`,
/// `decrypt`, `hash`, `sign`, `sig_check`, `generate_iv` and
/// `derive_key` kernel message (§4.3) is forwarded to this trait.
pub trait Backend {
    /// Computes a message digest.
    fn hash(&self, alg: HashAlgorithm, data: &[u8]) -> Result<Vec<u8>>;

    /// Produces a detached signature over `digest` (already hashed by
    /// the caller with `alg`) using the private key named by
    /// `key_id`.
    fn sign(
        &self,
        alg: PublicKeyAlgorithm,
        key_id: &[u8],
        hash_alg: HashAlgorithm,
        digest: &[u8],
    ) -> Result<Vec<u8>>;

    /// Verifies a signature produced by [`Backend::sign`]. Returns
    /// `Ok(true)` on a valid signature, `Ok(false)` on a structurally
    /// valid but non-matching one; a malformed signature value is a
    /// `BadData`/`Invalid` error instead.
    fn verify(
        &self,
        alg: PublicKeyAlgorithm,
        key_id: &[u8],
        hash_alg: HashAlgorithm,
        digest: &[u8],
        signature: &[u8],
    ) -> Result<bool>;

    /// Symmetric block/stream encryption in the mode the content
    /// encryption `AlgorithmIdentifier` named, with PKCS #5 padding
    /// already applied by the caller (see `cms::envelope::pkcs5_pad`).
    fn encrypt(&self, alg: CipherAlgorithm, key: &Protected, iv: &[u8], data: &[u8]) -> Result<Vec<u8>>;

    fn decrypt(&self, alg: CipherAlgorithm, key: &Protected, iv: &[u8], data: &[u8]) -> Result<Vec<u8>>;

    /// Fills `iv` with a fresh, algorithm-appropriate initialisation
    /// vector.
    fn generate_iv(&self, alg: CipherAlgorithm, iv: &mut [u8]) -> Result<()>;

    /// Derives a symmetric key from a password, per PKCS #5 (used by
    /// password-based key-exchange `RecipientInfo`s).
    fn derive_key(&self, password: &[u8], salt: &[u8], iterations: u32, key_len: usize) -> Result<Protected>;

    /// Fills `buf` with cryptographically secure random bytes. §1
    /// names entropy gathering an external collaborator; this is the
    /// seam it comes in through.
    fn random(&self, buf: &mut [u8]) -> Result<()>;
}

#[cfg(feature = "test-backend")]
pub mod test_backend {
    //! A deterministic, **not cryptographically secure** [`Backend`]
    //! used only by this crate's own test suite: it lets the
    //! envelope/signer/chain invariants in §8 be exercised without
    //! wiring in a real PKC implementation, which §1 places outside
    //! this crate's scope entirely.
    use super::*;
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    #[derive(Default)]
    pub struct TestBackend;

    fn digest_bytes(alg: HashAlgorithm, data: &[u8]) -> Vec<u8> {
        match alg {
            HashAlgorithm::Sha1 => {
                let mut h = sha1collisiondetection::Sha1CD::default();
                use digest::Digest;
                h.update(data);
                h.finalize().to_vec()
            }
            HashAlgorithm::Sha256 | HashAlgorithm::Sha384 | HashAlgorithm::Sha512 => {
                use digest::Digest;
                let mut h = Sha256::new();
                h.update(data);
                h.finalize().to_vec()
            }
        }
    }

    impl Backend for TestBackend {
        fn hash(&self, alg: HashAlgorithm, data: &[u8]) -> Result<Vec<u8>> {
            Ok(digest_bytes(alg, data))
        }

        fn sign(
            &self,
            _alg: PublicKeyAlgorithm,
            key_id: &[u8],
            _hash_alg: HashAlgorithm,
            digest: &[u8],
        ) -> Result<Vec<u8>> {
            let mut mac = Hmac::<Sha256>::new_from_slice(key_id)
                .map_err(|_| crate::error::ErrorKind::Internal)?;
            mac.update(digest);
            Ok(mac.finalize().into_bytes().to_vec())
        }

        fn verify(
            &self,
            alg: PublicKeyAlgorithm,
            key_id: &[u8],
            hash_alg: HashAlgorithm,
            digest: &[u8],
            signature: &[u8],
        ) -> Result<bool> {
            let expected = self.sign(alg, key_id, hash_alg, digest)?;
            Ok(expected == signature)
        }

        fn encrypt(
            &self,
            _alg: CipherAlgorithm,
            key: &Protected,
            iv: &[u8],
            data: &[u8],
        ) -> Result<Vec<u8>> {
            Ok(xor_stream(key, iv, data))
        }

        fn decrypt(
            &self,
            _alg: CipherAlgorithm,
            key: &Protected,
            iv: &[u8],
            data: &[u8],
        ) -> Result<Vec<u8>> {
            Ok(xor_stream(key, iv, data))
        }

        fn generate_iv(&self, _alg: CipherAlgorithm, iv: &mut [u8]) -> Result<()> {
            self.random(iv)
        }

        fn derive_key(
            &self,
            password: &[u8],
            salt: &[u8],
            _iterations: u32,
            key_len: usize,
        ) -> Result<Protected> {
            let mut mac = Hmac::<Sha256>::new_from_slice(salt)
                .map_err(|_| crate::error::ErrorKind::Internal)?;
            mac.update(password);
            let mut out = mac.finalize().into_bytes().to_vec();
            out.resize(key_len, 0);
            Ok(Protected::new(out))
        }

        fn random(&self, buf: &mut [u8]) -> Result<()> {
            use rand::RngCore;
            rand::rngs::OsRng.fill_bytes(buf);
            Ok(())
        }
    }

    fn xor_stream(key: &Protected, iv: &[u8], data: &[u8]) -> Vec<u8> {
        let mut mac = Hmac::<Sha256>::new_from_slice(key.as_slice())
            .expect("HMAC accepts any key length");
        mac.update(iv);
        let mut keystream = mac.finalize().into_bytes().to_vec();
        while keystream.len() < data.len() {
            let mut mac = Hmac::<Sha256>::new_from_slice(key.as_slice()).unwrap();
            mac.update(&keystream);
            keystream.extend(mac.finalize().into_bytes());
        }
        data.iter().zip(keystream.iter()).map(|(a, b)| a ^ b).collect()
    }
}
