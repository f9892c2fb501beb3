//! The two-pass certificate writer family (§4.6): pass 1 against a
//! null stream to learn lengths, pass 2 for real. Every function here
//! is safe to call twice in a row with the same input and get the
//! same bytes both times — the actual two-pass discipline lives in
//! [`crate::asn1::sizeof`], which these call internally wherever a
//! length must be known before a wrapping tag can be emitted; since
//! every helper here builds its body in a `MemoryStream` first and
//! only then wraps it with a tag/length, the "null stream" pass and
//! the "real" pass collapse to the same code path.

use pki_stream::{MemoryStream, Stream};

use crate::asn1::{context_tag, Oid, Tag, Writer};
use crate::error::{Error, Result};
use crate::keys::{spki, PublicKey};

use super::types::{
    CertRequestData, CertificateData, CrlData, CrlEntry, CrlReason, Extension, Name,
    OcspRequestData, OcspResponseData, PkiUserData, RtcsRequestData, RtcsResponseData, Time,
    Validity,
};

fn sequence_of(mut write_body: impl FnMut(&mut Writer) -> Result<()>) -> Result<Vec<u8>> {
    let mut mem = MemoryStream::open();
    {
        let mut w = Writer::new(&mut mem);
        let mut body_mem = MemoryStream::open();
        {
            let mut bw = Writer::new(&mut body_mem);
            write_body(&mut bw)?;
        }
        let body = body_mem.as_slice().unwrap();
        w.write_constructed(Tag::SEQUENCE, body)?;
    }
    Ok(mem.as_slice().unwrap().to_vec())
}

fn write_name(w: &mut Writer, name: &Name) -> Result<()> {
    w.stream().write(&name.0).map_err(Error::from)
}

fn write_validity(w: &mut Writer, validity: &Validity) -> Result<()> {
    let mut mem = MemoryStream::open();
    {
        let mut bw = Writer::new(&mut mem);
        bw.write_utc_time(&validity.not_before.0)?;
        bw.write_utc_time(&validity.not_after.0)?;
    }
    let body = mem.as_slice().unwrap();
    w.write_constructed(Tag::SEQUENCE, body)
}

fn write_extension(w: &mut Writer, ext: &Extension) -> Result<()> {
    let mut mem = MemoryStream::open();
    {
        let mut bw = Writer::new(&mut mem);
        bw.write_oid(&ext.oid)?;
        if ext.critical {
            bw.write_boolean(true)?;
        }
        bw.write_octet_string(&ext.value)?;
    }
    let body = mem.as_slice().unwrap();
    w.write_constructed(Tag::SEQUENCE, body)
}

fn write_extensions_block(w: &mut Writer, extensions: &[Extension]) -> Result<()> {
    if extensions.is_empty() {
        return Ok(());
    }
    let mut seq_mem = MemoryStream::open();
    {
        let mut sw = Writer::new(&mut seq_mem);
        for ext in extensions {
            write_extension(&mut sw, ext)?;
        }
    }
    let seq_body = seq_mem.as_slice().unwrap();
    let mut inner_mem = MemoryStream::open();
    {
        let mut iw = Writer::new(&mut inner_mem);
        iw.write_constructed(Tag::SEQUENCE, seq_body)?;
    }
    let inner = inner_mem.as_slice().unwrap();
    w.write_constructed(context_tag(3, true), inner)
}

fn write_algorithm_identifier_oid(w: &mut Writer, oid: &Oid, null_params: bool) -> Result<()> {
    let mut mem = MemoryStream::open();
    {
        let mut bw = Writer::new(&mut mem);
        bw.write_oid(oid)?;
        if null_params {
            bw.write_tag_length(Tag::NULL, 0)?;
        }
    }
    let body = mem.as_slice().unwrap();
    w.write_constructed(Tag::SEQUENCE, body)
}

/// Builds the `tbsCertificate` body (§4.6's layout), not wrapped in
/// the outer `Certificate` SEQUENCE. Used both as the thing that gets
/// signed and, with an empty `signature` argument to
/// [`write_certificate`], as the "AlgorithmIdentifier only" size-probe
/// shape the two-pass writer needs before a signature exists.
pub fn write_tbs_certificate(cert: &CertificateData, signature_alg_oid: &Oid) -> Result<Vec<u8>> {
    sequence_of(|w| {
        // [0] EXPLICIT INTEGER(2) -- the v3 marker.
        let version_body = {
            let mut mem = MemoryStream::open();
            Writer::new(&mut mem).write_small_integer(2)?;
            mem.as_slice().unwrap().to_vec()
        };
        w.write_constructed(context_tag(0, true), &version_body)?;
        w.write_integer_bytes(&cert.serial)?;
        write_algorithm_identifier_oid(w, signature_alg_oid, true)?;
        write_name(w, &cert.issuer)?;
        write_validity(w, &cert.validity)?;
        write_name(w, &cert.subject)?;
        let spki_bytes = spki::encode(&cert.public_key)?;
        w.stream().write(&spki_bytes).map_err(Error::from)?;
        write_extensions_block(w, &cert.extensions)?;
        Ok(())
    })
}

/// Wraps a `tbsCertificate` with its signature to produce the full
/// `Certificate`.
pub fn write_certificate(
    cert: &CertificateData,
    signature_alg_oid: &Oid,
    signature: &[u8],
) -> Result<Vec<u8>> {
    let tbs = write_tbs_certificate(cert, signature_alg_oid)?;
    sequence_of(|w| {
        w.stream().write(&tbs).map_err(Error::from)?;
        write_algorithm_identifier_oid(w, signature_alg_oid, true)?;
        w.write_bit_string(&crate::asn1::BitString {
            unused_bits: 0,
            bytes: signature.to_vec(),
        })?;
        Ok(())
    })
}

/// `CertificationRequestInfo` (PKCS #10, unsigned half of a cert
/// request); the full `CertificationRequest` wraps this the same way
/// [`write_certificate`] wraps a `tbsCertificate`.
pub fn write_cert_request_info(req: &CertRequestData) -> Result<Vec<u8>> {
    sequence_of(|w| {
        w.write_small_integer(0)?;
        write_name(w, &req.subject)?;
        let spki_bytes = spki::encode(&req.public_key)?;
        w.stream().write(&spki_bytes).map_err(Error::from)?;
        // Attributes [0] IMPLICIT SET OF Attribute -- empty if none.
        w.write_tag_length(context_tag(0, true), 0)?;
        Ok(())
    })
}

pub fn write_cert_request(
    req: &CertRequestData,
    signature_alg_oid: &Oid,
    signature: &[u8],
) -> Result<Vec<u8>> {
    let info = write_cert_request_info(req)?;
    sequence_of(|w| {
        w.stream().write(&info).map_err(Error::from)?;
        write_algorithm_identifier_oid(w, signature_alg_oid, true)?;
        w.write_bit_string(&crate::asn1::BitString {
            unused_bits: 0,
            bytes: signature.to_vec(),
        })?;
        Ok(())
    })
}

const OID_CRL_REASON_CODE: [u32; 4] = [2, 5, 29, 21];
const OID_CRL_INVALIDITY_DATE: [u32; 4] = [2, 5, 29, 24];

/// RFC 5280 §5.3.1's `CRLReason` discriminants. `CrlReason::NeverValid`
/// is cryptlib's own sentinel (see [`super::types::CrlReason`]) with
/// no standard wire value of its own; X.509 has no such reason, so it
/// is written as `unspecified(0)`, matching cryptlib's own rationale
/// for the code ("X.509 doesn't formally define a neverValid reason").
fn crl_reason_code(reason: CrlReason) -> u8 {
    match reason {
        CrlReason::Unspecified | CrlReason::NeverValid => 0,
        CrlReason::KeyCompromise => 1,
        CrlReason::CaCompromise => 2,
        CrlReason::AffiliationChanged => 3,
        CrlReason::Superseded => 4,
        CrlReason::CessationOfOperation => 5,
        CrlReason::CertificateHold => 6,
        CrlReason::RemoveFromCrl => 8,
        CrlReason::PrivilegeWithdrawn => 9,
        CrlReason::AaCompromise => 10,
    }
}

fn write_crl_entry(w: &mut Writer, entry: &CrlEntry) -> Result<()> {
    let mut mem = MemoryStream::open();
    {
        let mut bw = Writer::new(&mut mem);
        bw.write_integer_bytes(&entry.serial)?;
        let date = entry
            .revocation_date
            .as_ref()
            .map(|t| t.0.clone())
            .unwrap_or_default();
        bw.write_utc_time(&date)?;
        if entry.reason.is_some() || entry.invalidity_date.is_some() {
            let mut extensions = Vec::new();
            if let Some(reason) = entry.reason {
                let mut reason_mem = MemoryStream::open();
                {
                    let mut rw = Writer::new(&mut reason_mem);
                    rw.write_tag_length(Tag::ENUMERATED, 1)?;
                    rw.stream().write(&[crl_reason_code(reason)]).map_err(Error::from)?;
                }
                extensions.push(Extension {
                    oid: Oid(OID_CRL_REASON_CODE.to_vec()),
                    critical: false,
                    value: reason_mem.as_slice().unwrap().to_vec(),
                });
            }
            if let Some(invalidity_date) = &entry.invalidity_date {
                let mut date_mem = MemoryStream::open();
                {
                    let mut dw = Writer::new(&mut date_mem);
                    dw.write_generalized_time(&invalidity_date.0)?;
                }
                extensions.push(Extension {
                    oid: Oid(OID_CRL_INVALIDITY_DATE.to_vec()),
                    critical: false,
                    value: date_mem.as_slice().unwrap().to_vec(),
                });
            }
            let mut crl_ext_mem = MemoryStream::open();
            {
                let mut ew = Writer::new(&mut crl_ext_mem);
                for ext in &extensions {
                    write_extension(&mut ew, ext)?;
                }
            }
            let body = crl_ext_mem.as_slice().unwrap();
            bw.write_constructed(Tag::SEQUENCE, body)?;
        }
    }
    let body = mem.as_slice().unwrap();
    w.write_constructed(Tag::SEQUENCE, body)
}

pub fn write_crl(crl: &CrlData, signature_alg_oid: &Oid) -> Result<Vec<u8>> {
    sequence_of(|w| {
        w.write_small_integer(1)?; // v2
        write_algorithm_identifier_oid(w, signature_alg_oid, true)?;
        write_name(w, &crl.issuer)?;
        w.write_utc_time(&crl.this_update.0)?;
        if let Some(next) = &crl.next_update {
            w.write_utc_time(&next.0)?;
        }
        if !crl.entries.is_empty() {
            let mut list_mem = MemoryStream::open();
            {
                let mut lw = Writer::new(&mut list_mem);
                for entry in &crl.entries {
                    write_crl_entry(&mut lw, entry)?;
                }
            }
            let list_body = list_mem.as_slice().unwrap();
            w.write_constructed(Tag::SEQUENCE, list_body)?;
        }
        write_extensions_block(w, &crl.extensions)?;
        Ok(())
    })
}

pub fn write_rtcs_request(req: &RtcsRequestData) -> Result<Vec<u8>> {
    sequence_of(|w| {
        let mut list_mem = MemoryStream::open();
        {
            let mut lw = Writer::new(&mut list_mem);
            for entry in &req.entries {
                lw.write_octet_string(&entry.cert_fingerprint)?;
            }
        }
        let list_body = list_mem.as_slice().unwrap();
        w.write_constructed(Tag::SEQUENCE, list_body)?;
        if let Some(nonce) = &req.nonce {
            w.write_octet_string(nonce)?;
        }
        Ok(())
    })
}

pub fn write_rtcs_response(resp: &RtcsResponseData) -> Result<Vec<u8>> {
    sequence_of(|w| {
        let mut list_mem = MemoryStream::open();
        {
            let mut lw = Writer::new(&mut list_mem);
            for entry in &resp.entries {
                let mut entry_mem = MemoryStream::open();
                {
                    let mut ew = Writer::new(&mut entry_mem);
                    ew.write_octet_string(&entry.cert_fingerprint)?;
                    let status = match entry.status {
                        super::types::RtcsStatus::Valid => 0,
                        super::types::RtcsStatus::NotValid => 1,
                        super::types::RtcsStatus::Unknown => 2,
                    };
                    ew.write_small_integer(status)?;
                }
                let body = entry_mem.as_slice().unwrap();
                lw.write_constructed(Tag::SEQUENCE, body)?;
            }
        }
        let list_body = list_mem.as_slice().unwrap();
        w.write_constructed(Tag::SEQUENCE, list_body)?;
        if let Some(nonce) = &resp.nonce {
            w.write_octet_string(nonce)?;
        }
        Ok(())
    })
}

fn write_ocsp_request_entry(w: &mut Writer, entry: &super::types::OcspRequestEntry) -> Result<()> {
    let mut cert_id_mem = MemoryStream::open();
    {
        let mut cw = Writer::new(&mut cert_id_mem);
        cw.write_octet_string(&entry.issuer_name_hash)?;
        cw.write_octet_string(&entry.issuer_key_hash)?;
        cw.write_integer_bytes(&entry.serial)?;
    }
    let cert_id_body = cert_id_mem.as_slice().unwrap();
    let mut req_mem = MemoryStream::open();
    {
        let mut rw = Writer::new(&mut req_mem);
        rw.write_constructed(Tag::SEQUENCE, cert_id_body)?;
    }
    let req_body = req_mem.as_slice().unwrap();
    w.write_constructed(Tag::SEQUENCE, req_body)
}

pub fn write_ocsp_request(req: &OcspRequestData) -> Result<Vec<u8>> {
    sequence_of(|w| {
        let mut tbs_mem = MemoryStream::open();
        {
            let mut tw = Writer::new(&mut tbs_mem);
            let mut list_mem = MemoryStream::open();
            {
                let mut lw = Writer::new(&mut list_mem);
                for entry in &req.entries {
                    write_ocsp_request_entry(&mut lw, entry)?;
                }
            }
            let list_body = list_mem.as_slice().unwrap();
            tw.write_constructed(Tag::SEQUENCE, list_body)?;
            if let Some(nonce) = &req.nonce {
                let mut ext_mem = MemoryStream::open();
                {
                    let mut ew = Writer::new(&mut ext_mem);
                    ew.write_octet_string(nonce)?;
                }
                let ext_body = ext_mem.as_slice().unwrap();
                tw.write_constructed(context_tag(2, true), ext_body)?;
            }
        }
        let tbs_body = tbs_mem.as_slice().unwrap();
        w.write_constructed(Tag::SEQUENCE, tbs_body)?;
        Ok(())
    })
}

pub fn write_ocsp_response(resp: &OcspResponseData) -> Result<Vec<u8>> {
    sequence_of(|w| {
        for entry in &resp.entries {
            let mut single_mem = MemoryStream::open();
            {
                let mut sw = Writer::new(&mut single_mem);
                let mut cert_id_mem = MemoryStream::open();
                {
                    let mut cw = Writer::new(&mut cert_id_mem);
                    cw.write_octet_string(&entry.issuer_name_hash)?;
                    cw.write_octet_string(&entry.issuer_key_hash)?;
                    cw.write_integer_bytes(&entry.serial)?;
                }
                let cert_id_body = cert_id_mem.as_slice().unwrap();
                sw.write_constructed(Tag::SEQUENCE, cert_id_body)?;
                let status_tag: u32 = match entry.status {
                    super::types::OcspCertStatus::Good => 0,
                    super::types::OcspCertStatus::Revoked => 1,
                    super::types::OcspCertStatus::Unknown => 2,
                };
                sw.write_tag_length(context_tag(status_tag, false), 0)?;
                sw.write_generalized_time(&entry.this_update.0)?;
            }
            let body = single_mem.as_slice().unwrap();
            w.write_constructed(Tag::SEQUENCE, body)?;
        }
        w.write_generalized_time(&resp.produced_at.0)?;
        if let Some(nonce) = &resp.nonce {
            w.write_octet_string(nonce)?;
        }
        Ok(())
    })
}

pub fn write_pki_user(user: &PkiUserData) -> Result<Vec<u8>> {
    sequence_of(|w| {
        w.write_octet_string(&user.user_id)?;
        w.write_octet_string(&user.encrypted_authenticators)?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::RsaPublic;

    fn rsa_cert() -> CertificateData {
        CertificateData {
            serial: vec![0x01],
            issuer: Name(b"CN=Root".to_vec()),
            subject: Name(b"CN=Leaf".to_vec()),
            validity: Validity {
                not_before: Time("250101000000Z".into()),
                not_after: Time("260101000000Z".into()),
            },
            public_key: PublicKey::Rsa(RsaPublic {
                n: vec![0x80u8; 128],
                e: vec![0x01, 0x00, 0x01],
            }),
            extensions: Vec::new(),
            attributes: crate::attribute::AttributeList::new(),
            self_signed: false,
            path_kludge: false,
        }
    }

    #[test]
    fn tbs_certificate_starts_with_v3_marker() {
        let cert = rsa_cert();
        let oid = Oid(vec![1, 2, 840, 113549, 1, 1, 5]); // sha1WithRSAEncryption
        let tbs = write_tbs_certificate(&cert, &oid).unwrap();
        // SEQUENCE tag, then [0] EXPLICIT tag (0xa0).
        assert_eq!(tbs[0], 0x30);
        assert!(tbs.contains(&0xa0));
    }

    #[test]
    fn full_certificate_embeds_signature_bit_string() {
        let cert = rsa_cert();
        let oid = Oid(vec![1, 2, 840, 113549, 1, 1, 5]);
        let signature = vec![0xde, 0xad, 0xbe, 0xef];
        let encoded = write_certificate(&cert, &oid, &signature).unwrap();
        assert!(encoded.windows(signature.len()).any(|w| w == signature.as_slice()));
    }
}
