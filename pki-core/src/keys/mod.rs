//! Key codecs (§4.5): read and write public/private key components for
//! RSA, DSA, Diffie-Hellman, Elgamal and KEA in five wire dialects,
//! plus key-ID computation and DL-algorithm signature value codecs.
//!
//! §9's open question on KEA applies here: KEA key-agreement import is
//! not implemented — the type exists in [`crate::backend::PublicKeyAlgorithm`]
//! for completeness of the enumeration, but no codec in this module
//! accepts it, the same gap cryptlib itself leaves as a dummy that
//! always fails rather than a guessed implementation.

pub mod keyid;
pub mod pgp;
pub mod pkcs1;
pub mod sigvalue;
pub mod spki;
pub mod sshv1;
pub mod sshv2;
pub mod ssldh;

use crate::backend::PublicKeyAlgorithm;
use crate::error::{ErrorKind, Result};

/// Minimum accepted public-key size, in bits, for RSA/DSA/DH/Elgamal
/// moduli — implementation-chosen per §4.5, set to cryptlib's default.
pub const MIN_PKCSIZE_BITS: usize = 1024;

/// Diffie-Hellman and Elgamal tolerate a very small generator `g`
/// (2 or 3 are common); this floor only catches `g == 0` and `g == 1`,
/// which can never produce a usable group.
pub const MIN_DH_GENERATOR: u32 = 2;

/// RSA public-key components.
#[derive(Clone, Debug)]
pub struct RsaPublic {
    pub n: Vec<u8>,
    pub e: Vec<u8>,
}

/// RSA private-key components, in the order PKCS #1 emits them.
#[derive(Clone, Debug, zeroize::Zeroize, zeroize::ZeroizeOnDrop)]
pub struct RsaPrivate {
    pub n: Vec<u8>,
    pub e: Vec<u8>,
    pub d: Vec<u8>,
    pub p: Vec<u8>,
    pub q: Vec<u8>,
    pub e1: Vec<u8>,
    pub e2: Vec<u8>,
    pub u: Vec<u8>,
}

/// DLP (DSA/DH/Elgamal) domain parameters plus the public value `y`.
/// The wire order of `p`, `q`, `g` is dialect-specific (see
/// [`spki::DlpParamOrder`]); this struct stores them unordered.
#[derive(Clone, Debug)]
pub struct DlpPublic {
    pub p: Vec<u8>,
    pub q: Vec<u8>,
    pub g: Vec<u8>,
    pub y: Vec<u8>,
}

#[derive(Clone, Debug, zeroize::Zeroize, zeroize::ZeroizeOnDrop)]
pub struct DlpPrivate {
    #[zeroize(skip)]
    pub p: Vec<u8>,
    #[zeroize(skip)]
    pub q: Vec<u8>,
    #[zeroize(skip)]
    pub g: Vec<u8>,
    #[zeroize(skip)]
    pub y: Vec<u8>,
    pub x: Vec<u8>,
}

/// The decoded public-key payload, algorithm-tagged.
#[derive(Clone, Debug)]
pub enum PublicKey {
    Rsa(RsaPublic),
    Dlp(PublicKeyAlgorithm, DlpPublic),
}

impl PublicKey {
    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        match self {
            PublicKey::Rsa(_) => PublicKeyAlgorithm::Rsa,
            PublicKey::Dlp(alg, _) => *alg,
        }
    }
}

/// Action permissions a loaded key is granted, per §4.5's "RSA gets
/// full permissions; DLP gets internal-only" rule and §3's note that
/// "pure public keys from a certificate lose sign/decrypt".
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct KeyPermissions {
    pub encrypt: bool,
    pub decrypt: bool,
    pub sign: bool,
    pub verify: bool,
}

impl KeyPermissions {
    pub const NONE: KeyPermissions = KeyPermissions {
        encrypt: false,
        decrypt: false,
        sign: false,
        verify: false,
    };

    /// Permissions for a key freshly loaded from its own private
    /// components (i.e. not extracted from a certificate).
    pub fn for_loaded_key(alg: PublicKeyAlgorithm, has_private: bool) -> Self {
        match alg {
            PublicKeyAlgorithm::Rsa => KeyPermissions {
                encrypt: true,
                decrypt: has_private,
                sign: has_private,
                verify: true,
            },
            // DLP keys are internal-only: no external encrypt/decrypt,
            // only sign/verify through the kernel's own dispatch.
            PublicKeyAlgorithm::Dsa | PublicKeyAlgorithm::DiffieHellman | PublicKeyAlgorithm::Elgamal => {
                KeyPermissions {
                    encrypt: false,
                    decrypt: false,
                    sign: has_private,
                    verify: true,
                }
            }
            PublicKeyAlgorithm::Kea => KeyPermissions::NONE,
        }
    }

    /// A public key taken out of a certificate loses sign/decrypt
    /// regardless of algorithm — it's a pure verification/encryption
    /// key from the caller's point of view (§3 `Context` invariant).
    pub fn for_certificate_public_key(alg: PublicKeyAlgorithm) -> Self {
        let mut perms = Self::for_loaded_key(alg, false);
        perms.sign = false;
        perms.decrypt = false;
        perms
    }
}

pub(crate) fn check_min_size(bits: usize) -> Result<()> {
    if bits < MIN_PKCSIZE_BITS {
        return Err(ErrorKind::Invalid.into());
    }
    Ok(())
}

pub(crate) fn bit_length(bytes: &[u8]) -> usize {
    let mut skip = 0;
    while skip < bytes.len() && bytes[skip] == 0 {
        skip += 1;
    }
    if skip == bytes.len() {
        return 0;
    }
    let first = bytes[skip];
    (bytes.len() - skip - 1) * 8 + (8 - first.leading_zeros() as usize)
}
