//! Pre-encode checks and side effects (§4.6's table), run once per
//! object before either pass of the two-pass writer.

use rand::RngCore;

use crate::backend::{Backend, CipherAlgorithm};
use crate::error::{ErrorKind, Result};
use crate::policy::ComplianceLevel;

use super::types::{
    CertRequestData, CertificateData, CrlData, CrlReason, Name, OcspRequestData, OcspResponseData,
    PkiUserData, RevocationRequestData, RtcsRequestData, RtcsResponseData,
};

/// §4.6 "Certificate": subject DN non-empty unless the PKIX-full SAN
/// exemption applies; issuer DN must differ from subject DN unless
/// self-signed; inherit the issuer DN/validity window when absent.
pub fn preencode_certificate(
    cert: &mut CertificateData,
    issuer: Option<&CertificateData>,
    compliance: ComplianceLevel,
    has_critical_san: bool,
) -> Result<()> {
    if cert.subject.is_empty() {
        let san_exempt = compliance.at_least(ComplianceLevel::PkixFull)
            && has_critical_san
            && !is_ca(cert)
            && !cert.self_signed;
        if !san_exempt {
            return Err(ErrorKind::Invalid.into());
        }
    }

    if let Some(issuer_cert) = issuer {
        if cert.issuer.is_empty() {
            cert.issuer = issuer_cert.subject.clone();
        }
        if !cert.self_signed && cert.issuer == cert.subject {
            return Err(ErrorKind::Invalid.into());
        }
        cert.validity.constrain_to(&issuer_cert.validity);
        inherit_non_inherited_attributes(cert, issuer_cert);
    } else if !cert.self_signed && cert.issuer == cert.subject {
        return Err(ErrorKind::Invalid.into());
    }

    Ok(())
}

fn is_ca(cert: &CertificateData) -> bool {
    cert.attributes
        .find(crate::attribute::AttributeType::BasicConstraints, None)
        .map(|a| matches!(&a.value, crate::attribute::Value::Integer(n) if *n != 0))
        .unwrap_or(false)
}

/// Whether an issuer attribute is a candidate for the subject-copy
/// side effect: policy-ish extensions that describe the issuer's own
/// identity, not ones that are meaningless (or actively wrong) on a
/// different certificate.
fn is_inheritable(ty: crate::attribute::AttributeType) -> bool {
    use crate::attribute::AttributeType::*;
    matches!(ty, KeyUsage | ExtKeyUsage | KeyFeatures)
}

/// Copies issuer attributes flagged "inheritable" down to the subject
/// certificate, mirroring §4.6's "copy non-inherited issuer
/// attributes to subject".
fn inherit_non_inherited_attributes(cert: &mut CertificateData, issuer: &CertificateData) {
    for attr in issuer.attributes.iter() {
        if is_inheritable(attr.ty) && cert.attributes.find(attr.ty, attr.subtype).is_none() {
            let _ = cert.attributes.add(attr.clone());
        }
    }
}

/// §4.6 "CRL": subject (the CRL's issuer field) must match the
/// signing certificate's subject; unset per-entry revocation times
/// default to `thisUpdate`; a `neverValid` reason copies the
/// invalidity date across to `revocationDate`.
pub fn preencode_crl(crl: &mut CrlData, issuer_cert_subject: &Name) -> Result<()> {
    if crl.issuer != *issuer_cert_subject {
        return Err(ErrorKind::Invalid.into());
    }
    for entry in crl.entries.iter_mut() {
        if entry.revocation_date.is_none() {
            entry.revocation_date = Some(crl.this_update.clone());
        }
        if entry.reason == Some(CrlReason::NeverValid) {
            entry.revocation_date = entry.invalidity_date.clone().or(entry.revocation_date.clone());
        }
    }
    Ok(())
}

pub fn preencode_cert_request(req: &CertRequestData) -> Result<()> {
    if req.subject.is_empty() {
        return Err(ErrorKind::Invalid.into());
    }
    Ok(())
}

pub fn preencode_revocation_request(req: &RevocationRequestData) -> Result<()> {
    if req.serial.is_empty() || req.issuer.is_empty() {
        return Err(ErrorKind::Invalid.into());
    }
    Ok(())
}

fn fresh_nonce(len: usize) -> Vec<u8> {
    let mut nonce = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

/// §4.6 "RTCS req/resp": a fresh 16-byte nonce on write if the caller
/// hasn't supplied one.
pub fn preencode_rtcs_request(req: &mut RtcsRequestData) {
    if req.nonce.is_none() {
        req.nonce = Some(fresh_nonce(16));
    }
}

pub fn preencode_rtcs_response(resp: &mut RtcsResponseData, request_nonce: Option<&[u8]>) {
    if resp.nonce.is_none() {
        resp.nonce = request_nonce.map(|n| n.to_vec()).or_else(|| Some(fresh_nonce(16)));
    }
}

/// §4.6 "OCSP req/resp": clear the nonce's high bit — OCSP encodes
/// the nonce as an `INTEGER`-typed `OCTET STRING`, so a high bit would
/// make it read back as negative.
fn clear_nonce_high_bit(nonce: &mut [u8]) {
    if let Some(first) = nonce.first_mut() {
        *first &= 0x7f;
    }
}

pub fn preencode_ocsp_request(req: &mut OcspRequestData) {
    if let Some(nonce) = req.nonce.as_mut() {
        clear_nonce_high_bit(nonce);
    }
}

pub fn preencode_ocsp_response(resp: &mut OcspResponseData) {
    if let Some(nonce) = resp.nonce.as_mut() {
        clear_nonce_high_bit(nonce);
    }
}

/// §4.6 "PKI user": generate a user ID and encrypt the authenticator
/// pair under a fixed 3DES key with PKCS #5 padding. The fixed key is
/// a protocol constant, not a secret — PKI user data is meant to be
/// readable by anyone who already holds the enrolment record; the
/// encryption exists to obscure it from casual inspection, not to
/// keep it confidential against an adversary.
pub fn preencode_pki_user(
    backend: &dyn Backend,
    authenticator_pair: &[u8],
) -> Result<PkiUserData> {
    let fixed_key = crate::backend::Protected::new(b"cryptlib-pkiuser-3deskey".to_vec());
    let user_id = fresh_nonce(9); // cryptlib's PKI user ID is a 9-byte value
    let block = 8usize;
    let pad_len = block - (authenticator_pair.len() % block);
    let mut padded = authenticator_pair.to_vec();
    padded.extend(std::iter::repeat(pad_len as u8).take(pad_len));
    let mut iv = vec![0u8; block];
    backend.generate_iv(CipherAlgorithm::TripleDes, &mut iv)?;
    let encrypted = backend.encrypt(CipherAlgorithm::TripleDes, &fixed_key, &iv, &padded)?;
    Ok(PkiUserData {
        user_id,
        encrypted_authenticators: encrypted,
    })
}
