//! RTCS: real-time certificate status, a cryptlib-local protocol
//! (§4.10). Unlike OCSP it answers yes/no/unknown rather than walking
//! a revocation list, and the request/response bodies are wrapped in
//! CMS rather than plain signed structures.

use crate::backend::{Backend, HashAlgorithm, PublicKeyAlgorithm};
use crate::cert::types::{RtcsRequestData, RtcsRequestEntry, RtcsResponseData, RtcsResponseEntry, RtcsStatus};
use crate::cert::write::{write_rtcs_request, write_rtcs_response};
use crate::cms::signer::{self, SignerInfo};
use crate::error::{ErrorKind, Result};

const MIN_NONCE_LEN: usize = 4;
const NONCE_LEN: usize = 16;

/// Looks a certificate fingerprint up against whatever store backs an
/// RTCS responder. A `CrlInvalid`-shaped answer is the expected,
/// non-error outcome for a revoked certificate — §4.10 is explicit
/// that this is the answer, not a fault.
pub trait CertificateStore {
    fn status(&self, cert_fingerprint: &[u8]) -> RtcsStatus;
}

/// §4.10 "RTCS client": builds the request, generating a fresh nonce
/// if the caller didn't supply one (§3, "Fresh 16-byte nonce on write
/// if not supplied").
pub fn build_request(backend: &dyn Backend, fingerprints: Vec<Vec<u8>>, nonce: Option<Vec<u8>>) -> Result<(RtcsRequestData, Vec<u8>)> {
    let nonce = match nonce {
        Some(n) => n,
        None => {
            let mut buf = vec![0u8; NONCE_LEN];
            backend.random(&mut buf)?;
            buf
        }
    };
    let req = RtcsRequestData {
        entries: fingerprints.into_iter().map(|cert_fingerprint| RtcsRequestEntry { cert_fingerprint }).collect(),
        nonce: Some(nonce),
    };
    let wire = write_rtcs_request(&req)?;
    Ok((req, wire))
}

/// §4.10 "RTCS server": matches every request entry against the
/// configured store, copies the nonce into the signed response
/// attributes, and signs with the responder's key.
pub fn handle_request(
    backend: &dyn Backend,
    store: &dyn CertificateStore,
    req: &RtcsRequestData,
    signer_key_id: &[u8],
    issuer: crate::cert::types::Name,
    serial: Vec<u8>,
    hash_alg: HashAlgorithm,
    sig_alg: PublicKeyAlgorithm,
) -> Result<(RtcsResponseData, SignerInfo)> {
    let entries = req
        .entries
        .iter()
        .map(|e| RtcsResponseEntry {
            cert_fingerprint: e.cert_fingerprint.clone(),
            status: store.status(&e.cert_fingerprint),
        })
        .collect();
    let resp = RtcsResponseData {
        entries,
        nonce: req.nonce.clone(),
    };
    let wire = write_rtcs_response(&resp)?;
    let info = signer::sign_with_nonce(
        backend,
        signer_key_id,
        issuer,
        serial,
        &wire,
        hash_alg,
        sig_alg,
        None,
        false,
        resp.nonce.clone(),
    )?;
    Ok((resp, info))
}

/// §4.10 "RTCS client", response handling: verify the signature,
/// then compare the embedded nonce byte-for-byte against the request
/// nonce. Both nonces must meet the minimum length or the response is
/// rejected outright.
pub fn verify_response(
    backend: &dyn Backend,
    responder_key_id: &[u8],
    resp: &RtcsResponseData,
    info: &SignerInfo,
    request_nonce: &[u8],
) -> Result<()> {
    if request_nonce.len() < MIN_NONCE_LEN {
        return Err(ErrorKind::BadData.into());
    }
    let wire = write_rtcs_response(resp)?;
    signer::verify(backend, info, responder_key_id, &wire)?;

    let response_nonce = info
        .signed_attrs
        .as_ref()
        .and_then(|a| a.nonce.as_ref())
        .ok_or(ErrorKind::Invalid)?;
    if response_nonce.len() < MIN_NONCE_LEN || response_nonce != request_nonce {
        return Err(ErrorKind::Invalid.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::test_backend::TestBackend;
    use crate::cert::types::Name;

    struct FixedStore(RtcsStatus);
    impl CertificateStore for FixedStore {
        fn status(&self, _cert_fingerprint: &[u8]) -> RtcsStatus {
            self.0
        }
    }

    #[test]
    fn lookup_round_trips_nonce_and_reports_revoked_status() {
        let backend = TestBackend;
        let (req, _wire) = build_request(&backend, vec![b"deadbeef".to_vec()], None).unwrap();
        let store = FixedStore(RtcsStatus::NotValid);
        let (resp, info) = handle_request(
            &backend,
            &store,
            &req,
            b"responder-key",
            Name(b"CN=Responder".to_vec()),
            vec![0x01],
            HashAlgorithm::Sha256,
            PublicKeyAlgorithm::Rsa,
        )
        .unwrap();

        assert_eq!(resp.entries[0].status, RtcsStatus::NotValid);
        verify_response(&backend, b"responder-key", &resp, &info, req.nonce.as_ref().unwrap()).unwrap();
    }

    #[test]
    fn mismatched_nonce_is_rejected() {
        let backend = TestBackend;
        let (req, _wire) = build_request(&backend, vec![b"deadbeef".to_vec()], None).unwrap();
        let store = FixedStore(RtcsStatus::Valid);
        let (resp, info) = handle_request(
            &backend,
            &store,
            &req,
            b"responder-key",
            Name(b"CN=Responder".to_vec()),
            vec![0x01],
            HashAlgorithm::Sha256,
            PublicKeyAlgorithm::Rsa,
        )
        .unwrap();

        let wrong_nonce = vec![0u8; 16];
        assert!(verify_response(&backend, b"responder-key", &resp, &info, &wrong_nonce).is_err());
    }
}
