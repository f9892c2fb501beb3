//! The CMS/PKCS #7 envelope engine (§4.8) and signer (§4.9).

pub mod envelope;
pub mod signer;

pub use envelope::{decode_data, Envelope, EnvelopeState};
pub use signer::{SignedAttributes, SignerInfo};
