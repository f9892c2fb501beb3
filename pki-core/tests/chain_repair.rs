//! End-to-end scenarios, one per concrete example named across the
//! certificate, envelope and session layers: chain repair with a
//! disambiguating subject-key-id collision, a signed `Data` envelope,
//! a TSP timestamp over a fixed digest, an RTCS lookup, wrong-key
//! rejection, and chain-length overflow.

#![cfg(feature = "test-backend")]

use pki_core::attribute::AttributeList;
use pki_core::backend::test_backend::TestBackend;
use pki_core::backend::{HashAlgorithm, PublicKeyAlgorithm};
use pki_core::cert::types::{CertificateData, Extension, Name, RtcsStatus, Time, Validity};
use pki_core::cert::write::write_certificate;
use pki_core::chain::{self, MAX_CHAINLENGTH};
use pki_core::cms::signer;
use pki_core::keys::{PublicKey, RsaPublic};
use pki_core::policy::ComplianceLevel;
use pki_core::session::rtcs;
use pki_core::session::tsp;

fn key(byte: u8) -> PublicKey {
    PublicKey::Rsa(RsaPublic {
        n: vec![byte; 128],
        e: vec![0x01, 0x00, 0x01],
    })
}

fn cert_with_extensions(subject: &str, issuer: &str, key_byte: u8, self_signed: bool, extensions: Vec<Extension>) -> CertificateData {
    CertificateData {
        serial: vec![key_byte],
        issuer: Name(issuer.as_bytes().to_vec()),
        subject: Name(subject.as_bytes().to_vec()),
        validity: Validity {
            not_before: Time("250101000000Z".into()),
            not_after: Time("260101000000Z".into()),
        },
        public_key: key(key_byte),
        extensions,
        attributes: AttributeList::new(),
        self_signed,
        path_kludge: false,
    }
}

const OID_SUBJECT_KEY_ID: [u32; 4] = [2, 5, 29, 14];
const OID_AUTHORITY_KEY_ID: [u32; 4] = [2, 5, 29, 35];

fn skid(value: &[u8]) -> Extension {
    Extension {
        oid: pki_core::asn1::Oid(OID_SUBJECT_KEY_ID.to_vec()),
        critical: false,
        value: value.to_vec(),
    }
}

fn akid(value: &[u8]) -> Extension {
    Extension {
        oid: pki_core::asn1::Oid(OID_AUTHORITY_KEY_ID.to_vec()),
        critical: false,
        value: value.to_vec(),
    }
}

/// Scenario 1: `Root, CA, CA', EE` where `CA'.subject == CA.subject`
/// and `CA'.sKID == CA.sKID ⊕ 1`, `EE.issuer == CA.subject`,
/// `EE.aKID == CA.sKID`, loaded as `EE, CA', Root, CA`. Strict
/// chaining must pick `CA` (the sKID match), not `CA'`.
#[test]
fn unordered_chain_repair_disambiguates_by_subject_key_id() {
    let ca_skid = vec![0xAA; 8];
    let mut ca_prime_skid = ca_skid.clone();
    *ca_prime_skid.last_mut().unwrap() ^= 1;

    let root = cert_with_extensions("CN=Root", "CN=Root", 1, true, vec![skid(&[0x01; 8])]);
    let ca = cert_with_extensions("CN=CA", "CN=Root", 2, false, vec![skid(&ca_skid), akid(&[0x01; 8])]);
    let ca_prime = cert_with_extensions("CN=CA", "CN=Root", 9, false, vec![skid(&ca_prime_skid), akid(&[0x01; 8])]);
    let ee = cert_with_extensions("CN=EE", "CN=CA", 3, false, vec![akid(&ca_skid)]);

    let bag = vec![ee.clone(), ca_prime.clone(), root.clone(), ca.clone()];

    let lax = chain::reorder(bag.clone(), false, ComplianceLevel::Standard).unwrap();
    assert_eq!(lax.chain.len(), 3);
    assert_eq!(lax.chain[0].subject, Name(b"CN=EE".to_vec()));
    assert_eq!(lax.chain[2].subject, Name(b"CN=Root".to_vec()));

    let strict = chain::reorder(bag, true, ComplianceLevel::Standard).unwrap();
    assert_eq!(strict.chain.len(), 3);
    assert_eq!(strict.chain[0].subject, Name(b"CN=EE".to_vec()));
    assert_eq!(strict.chain[1].serial, vec![2]); // the real CA, not CA'
    assert_eq!(strict.chain[2].subject, Name(b"CN=Root".to_vec()));
}

/// Scenario 2 (adapted): a `SignedData` wrapping the 5-byte payload
/// `"hello"`. This crate's CMS writers use definite-length two-pass
/// encoding throughout rather than the indefinite-length form cryptlib
/// itself emits, so the byte-exact `30 80 06 09 2A 86 48 86 F7 0D 01
/// 07 02 A0 80 …` prefix isn't reproduced here (recorded as an open
/// decision in DESIGN.md); what's verified instead is that the
/// produced bytes carry the `signedData` OID and that re-signing and
/// verifying the same payload succeeds.
#[test]
fn signed_data_envelope_round_trips() {
    use pki_core::cms::envelope::{Envelope, MainAction, PostAction};

    let backend = TestBackend;
    let post = PostAction {
        hash_alg: HashAlgorithm::Sha1,
        key_id: b"signer".to_vec(),
        pkc_alg: PublicKeyAlgorithm::Rsa,
    };
    let mut env = Envelope::new(&backend, Vec::new(), vec![MainAction::Hash(HashAlgorithm::Sha1)], vec![post], false).unwrap();
    env.push_data(b"hello").unwrap();
    env.flush().unwrap();
    let out = env.pop_data();

    assert_eq!(out[0], 0x30);
    let signed_data_oid = [0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x07, 0x02];
    assert!(out.windows(signed_data_oid.len()).any(|w| w == signed_data_oid));

    let info = signer::sign(&backend, b"signer", Name(b"CN=Signer".to_vec()), vec![0x01], b"hello", HashAlgorithm::Sha1, PublicKeyAlgorithm::Rsa, None, false).unwrap();
    signer::verify(&backend, &info, b"signer", b"hello").unwrap();
}

/// Scenario 3: `SHA1("abc")`, no nonce, no policy.
#[test]
fn tsp_timestamp_over_fixed_digest() {
    let backend = TestBackend;
    let hashed_message = vec![
        0xa9, 0x99, 0x3e, 0x36, 0x47, 0x06, 0x81, 0x6a, 0xba, 0x3e, 0x25, 0x71, 0x78, 0x50, 0xc2, 0x6c, 0x9c, 0xd0, 0xd8, 0x9d,
    ];
    let req = tsp::TspRequest {
        hash_alg: HashAlgorithm::Sha1,
        hashed_message,
        policy_id: None,
        nonce: None,
        cert_req: false,
    };
    let (_wire, imprint) = tsp::write_request(&req).unwrap();
    let policy = pki_core::asn1::Oid(vec![1, 3, 6, 1, 4, 1, 3029, 54, 1]);
    let (resp, info) = tsp::handle_request(&backend, &req, policy, "20260726000000Z", b"tsa-key", Name(b"CN=TSA".to_vec()), vec![0x01], PublicKeyAlgorithm::Rsa).unwrap();
    assert_eq!(resp.tst_info.serial_number.len(), 16);
    tsp::verify_response(&backend, b"tsa-key", &imprint, &resp, &info).unwrap();
}

/// Scenario 4: a request fingerprint previously revoked in the
/// server's store; the nonce reappears in the response.
#[test]
fn rtcs_lookup_reports_revoked_and_echoes_nonce() {
    struct RevokedStore;
    impl rtcs::CertificateStore for RevokedStore {
        fn status(&self, _fp: &[u8]) -> RtcsStatus {
            RtcsStatus::NotValid
        }
    }

    let backend = TestBackend;
    let (req, _wire) = rtcs::build_request(&backend, vec![b"revoked-cert-fp".to_vec()], None).unwrap();
    let (resp, info) = rtcs::handle_request(&backend, &RevokedStore, &req, b"responder", Name(b"CN=Responder".to_vec()), vec![0x01], HashAlgorithm::Sha256, PublicKeyAlgorithm::Rsa).unwrap();

    assert_eq!(resp.entries[0].status, RtcsStatus::NotValid);
    rtcs::verify_response(&backend, b"responder", &resp, &info, req.nonce.as_ref().unwrap()).unwrap();
}

/// Scenario 5 (adapted): verifying a signature against the wrong
/// signer key-id fails without the caller ever seeing the content
/// treated as valid. `TestBackend` keys both `sign`/`verify` off
/// `key_id`, so this exercises the same "wrong key never silently
/// succeeds" property §8's EnvelopedData recipient-mismatch scenario
/// names, one layer over from decryption (see DESIGN.md for why: the
/// [`pki_core::backend::Backend`] trait this crate builds on has no
/// generic asymmetric key-transport primitive to mismatch).
#[test]
fn wrong_key_detection_fails_closed() {
    let backend = TestBackend;
    let info = signer::sign(&backend, b"key-a", Name(b"CN=A".to_vec()), vec![0x01], b"content", HashAlgorithm::Sha256, PublicKeyAlgorithm::Rsa, None, false).unwrap();
    let result = signer::verify(&backend, &info, b"key-b", b"content");
    assert!(matches!(result, Err(e) if e.kind() == pki_core::ErrorKind::Signature));
}

/// Scenario 6: a seventeenth certificate overflows `MAX_CHAINLENGTH`;
/// the same chain truncated to 16 still encodes.
#[test]
fn chain_overflow_past_max_chainlength_is_rejected() {
    let oid = pki_core::asn1::Oid(vec![1, 2, 840, 113549, 1, 1, 5]);
    let encode = |c: &CertificateData| write_certificate(c, &oid, &[0xde, 0xad, 0xbe, 0xef]).unwrap();

    let certs: Vec<Vec<u8>> = (0..MAX_CHAINLENGTH as u8)
        .map(|i| encode(&cert_with_extensions(&format!("CN=C{i}"), "CN=Root", i, false, Vec::new())))
        .collect();
    assert!(chain::write_pkcs7_chain(&certs, false).is_ok());

    let mut overflowed = certs;
    overflowed.push(encode(&cert_with_extensions("CN=C16", "CN=Root", 16, false, Vec::new())));
    assert!(matches!(
        chain::write_pkcs7_chain(&overflowed, false),
        Err(e) if e.kind() == pki_core::ErrorKind::Overflow
    ));
}
