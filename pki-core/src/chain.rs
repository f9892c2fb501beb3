//! The certificate-chain engine (§4.7): reorders an unordered bag of
//! certificates into a leaf-first chain, and reads/writes the three
//! wire shapes a chain travels in (PKCS #7 `SignedData` with empty
//! `signerInfos`, a raw CMS `[0] IMPLICIT` cert set, and the SSL
//! length-prefixed cert-list).

use pki_stream::{MemoryStream, Stream};

use crate::asn1::{context_tag, Oid, Reader, Tag, Writer};
use crate::cert::types::{CertificateData, Extension, Name};
use crate::error::{Error, ErrorKind, Result};
use crate::keys::keyid;
use crate::policy::ComplianceLevel;

/// cryptlib caps a chain at this many certificates; a bag larger than
/// this is rejected outright rather than silently truncated.
pub const MAX_CHAINLENGTH: usize = 16;

const OID_SUBJECT_KEY_IDENTIFIER: [u32; 4] = [2, 5, 29, 14];
const OID_AUTHORITY_KEY_IDENTIFIER: [u32; 4] = [2, 5, 29, 35];

/// A cert's chain-relevant fields, extracted once up front so the
/// reordering algorithm never has to re-walk extension lists.
#[derive(Clone, Debug)]
pub(crate) struct ChainInfo {
    subject: Name,
    issuer: Name,
    serial: Vec<u8>,
    subject_key_id: Option<Vec<u8>>,
    authority_key_id: Option<Vec<u8>>,
}

fn find_extension(extensions: &[Extension], arcs: &[u32]) -> Option<Vec<u8>> {
    extensions
        .iter()
        .find(|e| e.oid.0 == arcs)
        .map(|e| e.value.clone())
}

fn extract(cert: &CertificateData) -> Result<ChainInfo> {
    let subject_key_id = find_extension(&cert.extensions, &OID_SUBJECT_KEY_IDENTIFIER)
        .or_else(|| keyid::cryptlib_key_id(&cert.public_key).ok().map(|id| id.to_vec()));
    let authority_key_id = find_extension(&cert.extensions, &OID_AUTHORITY_KEY_IDENTIFIER);
    Ok(ChainInfo {
        subject: cert.subject.clone(),
        issuer: cert.issuer.clone(),
        serial: cert.serial.clone(),
        subject_key_id,
        authority_key_id,
    })
}

/// Two key-ids "match" once both are known and at least 5 bytes long
/// (§4.7's lax-fallback threshold) — short enough to guard against an
/// accidental empty/near-empty extension masquerading as a match.
fn key_ids_match(a: &Option<Vec<u8>>, b: &Option<Vec<u8>>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => x.len() >= 5 && y.len() >= 5 && x == y,
        _ => false,
    }
}

/// `a` issues `b`: `a`'s subject matches `b`'s issuer by DN, or by
/// key-id as a lax fallback.
fn is_issuer(a: &ChainInfo, b: &ChainInfo) -> bool {
    a.subject == b.issuer || key_ids_match(&a.subject_key_id, &b.authority_key_id)
}

/// `a`'s subject matches `current_issuer`, i.e. `a` could be the next
/// link up the chain from whatever names `current_issuer` as its
/// issuer. `strict` additionally requires the key-ids to agree.
fn subject_matches(a: &ChainInfo, current_subject: &Name, current_authority_key_id: &Option<Vec<u8>>, strict: bool) -> bool {
    let dn_match = a.subject == *current_subject;
    let key_match = key_ids_match(&a.subject_key_id, current_authority_key_id);
    if strict {
        dn_match && key_match
    } else {
        dn_match || key_match
    }
}

/// Finds the leaf: walk forward from index 0, repeatedly advancing to
/// any unused cert the current cert names as its issuer, until no
/// further match exists. Visiting each cert at most once means a
/// path-kludge self-signed cert in the middle of the bag can't loop
/// the walk back on itself.
fn find_leaf(infos: &[ChainInfo]) -> usize {
    let mut used = vec![false; infos.len()];
    let mut current = 0usize;
    used[0] = true;
    loop {
        let next = infos
            .iter()
            .enumerate()
            .find(|(i, info)| !used[*i] && is_issuer(&infos[current], info));
        match next {
            Some((i, _)) => {
                used[i] = true;
                current = i;
            }
            None => return current,
        }
    }
}

/// Looks up the cert in `infos` whose subject key-id (or serial, as a
/// fallback when no key-id is present) exactly matches `id` — the
/// alternative leaf lookup by `issuerAndSerialNumber`/`subjectKeyId`
/// from §4.7.
pub(crate) fn find_by_subject_key_id(infos: &[ChainInfo], id: &[u8]) -> Option<usize> {
    infos
        .iter()
        .position(|info| info.subject_key_id.as_deref() == Some(id))
}

/// Result of reordering: the leaf-first certificate sequence and the
/// indices (into the original input slice) of certificates that
/// turned out unreachable and were dropped.
pub struct Reordered {
    pub chain: Vec<CertificateData>,
    pub dropped: Vec<usize>,
}

/// Reorders `certs` leaf-first per §4.7's ordering algorithm, applying
/// the PKIX-full path-kludge conversion when `compliance >= PkixFull`.
pub fn reorder(
    certs: Vec<CertificateData>,
    use_strict_chaining: bool,
    compliance: ComplianceLevel,
) -> Result<Reordered> {
    if certs.len() > MAX_CHAINLENGTH {
        return Err(ErrorKind::Overflow.into());
    }
    if certs.is_empty() {
        return Ok(Reordered {
            chain: Vec::new(),
            dropped: Vec::new(),
        });
    }

    let infos: Vec<ChainInfo> = certs.iter().map(extract).collect::<Result<_>>()?;
    let leaf_index = find_leaf(&infos);
    log::trace!("chain: leaf at index {} of {}", leaf_index, infos.len());

    let mut used = vec![false; certs.len()];
    used[leaf_index] = true;
    let mut chain = vec![leaf_index];

    let mut current_issuer_subject = infos[leaf_index].issuer.clone();
    let mut current_authority_key_id = infos[leaf_index].authority_key_id.clone();

    loop {
        let mut strict = use_strict_chaining;
        let found = loop {
            let hit = infos.iter().enumerate().find(|(i, info)| {
                !used[*i] && subject_matches(info, &current_issuer_subject, &current_authority_key_id, strict)
            });
            match hit {
                Some((i, _)) => break Some(i),
                None if strict => {
                    log::trace!("chain: no strict match for issuer subject, falling back to lax");
                    strict = false;
                }
                None => break None,
            }
        };
        match found {
            Some(i) => {
                log::trace!("chain: linked index {} (strict={})", i, strict);
                used[i] = true;
                chain.push(i);
                current_issuer_subject = infos[i].issuer.clone();
                current_authority_key_id = infos[i].authority_key_id.clone();
            }
            None => break,
        }
    }

    let dropped: Vec<usize> = (0..certs.len()).filter(|i| !used[*i]).collect();
    if !dropped.is_empty() {
        log::debug!("chain: {} certificate(s) unreachable from the leaf, dropped", dropped.len());
    }

    let mut ordered: Vec<CertificateData> = chain.into_iter().map(|i| certs[i].clone()).collect();

    if compliance.at_least(ComplianceLevel::PkixFull) && ordered.len() > 1 {
        let root_index = ordered.len() - 1;
        for cert in ordered.iter_mut().take(root_index) {
            if cert.self_signed {
                cert.self_signed = false;
                cert.path_kludge = true;
            }
        }
    }

    Ok(Reordered {
        chain: ordered,
        dropped,
    })
}

const OID_PKCS7_DATA: [u32; 6] = [1, 2, 840, 113549, 1, 7, 1];
const OID_PKCS7_SIGNED_DATA: [u32; 6] = [1, 2, 840, 113549, 1, 7, 2];

fn write_content_info_data(w: &mut Writer) -> Result<()> {
    let mut mem = MemoryStream::open();
    {
        let mut bw = Writer::new(&mut mem);
        bw.write_oid(&Oid(OID_PKCS7_DATA.to_vec()))?;
    }
    let body = mem.as_slice().unwrap();
    w.write_constructed(Tag::SEQUENCE, body)
}

/// Writes the chain as a PKCS #7 `SignedData` with an empty
/// `signerInfos` — the canonical "I am just a cert bag" wrapper. Each
/// entry in `chain` is an already-encoded `Certificate` DER blob (the
/// chain engine orders certificates; it never re-signs them). When
/// `as_sequence` is set, the inner cert collection is a `SEQUENCE OF`
/// instead of the `[0] IMPLICIT SET OF` that real signedData uses (the
/// "cert-sequence" variant §4.7 names).
pub fn write_pkcs7_chain(chain: &[Vec<u8>], as_sequence: bool) -> Result<Vec<u8>> {
    if chain.len() > MAX_CHAINLENGTH {
        return Err(ErrorKind::Overflow.into());
    }

    let mut signed_data_mem = MemoryStream::open();
    {
        let mut sw = Writer::new(&mut signed_data_mem);
        sw.write_small_integer(1)?; // version
        sw.write_constructed(Tag::SET, &[])?; // digestAlgorithms: empty
        write_content_info_data(&mut sw)?;

        let mut certs_mem = MemoryStream::open();
        {
            let mut cw = Writer::new(&mut certs_mem);
            for cert in chain {
                cw.stream().write(cert).map_err(Error::from)?;
            }
        }
        let certs_body = certs_mem.as_slice().unwrap();
        let certs_tag = if as_sequence {
            Tag::SEQUENCE
        } else {
            context_tag(0, true)
        };
        sw.write_constructed(certs_tag, certs_body)?;
        sw.write_constructed(Tag::SET, &[])?; // signerInfos: empty
    }
    let signed_data_body = signed_data_mem.as_slice().unwrap();

    let mut explicit_mem = MemoryStream::open();
    {
        let mut ew = Writer::new(&mut explicit_mem);
        ew.write_constructed(Tag::SEQUENCE, signed_data_body)?;
    }
    let explicit_body = explicit_mem.as_slice().unwrap();

    let mut out_mem = MemoryStream::open();
    {
        let mut ow = Writer::new(&mut out_mem);
        ow.write_oid(&Oid(OID_PKCS7_SIGNED_DATA.to_vec()))?;
        ow.write_constructed(context_tag(0, true), explicit_body)?;
    }
    let body = out_mem.as_slice().unwrap();

    let mut mem = MemoryStream::open();
    {
        let mut w = Writer::new(&mut mem);
        w.write_constructed(Tag::SEQUENCE, body)?;
    }
    Ok(mem.as_slice().unwrap().to_vec())
}

/// Writes the chain as the SSL wire format: each already-encoded
/// `Certificate` DER blob prefixed with its own 24-bit network-order
/// length, no outer wrapper. The caller's stream length is the total;
/// there is no length-of-lengths field the way PKCS #7 has one.
pub fn write_ssl_chain(chain: &[Vec<u8>]) -> Result<Vec<u8>> {
    if chain.len() > MAX_CHAINLENGTH {
        return Err(ErrorKind::Overflow.into());
    }
    let mut out = Vec::new();
    for encoded in chain {
        if encoded.len() > 0xff_ffff {
            return Err(ErrorKind::Overflow.into());
        }
        let len = encoded.len() as u32;
        out.push((len >> 16) as u8);
        out.push((len >> 8) as u8);
        out.push(len as u8);
        out.extend_from_slice(encoded);
    }
    Ok(out)
}

/// Reads back an SSL-format chain (see [`write_ssl_chain`]). Each
/// length-prefixed blob is returned opaque — this layer doesn't
/// attempt to parse a `Certificate` back into [`CertificateData`]
/// (that direction isn't exercised by anything in this crate; callers
/// needing to inspect a read-back cert go through the ASN.1 reader
/// directly).
pub fn read_ssl_chain(buf: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut certs = Vec::new();
    let mut pos = 0usize;
    while pos < buf.len() {
        if pos + 3 > buf.len() {
            return Err(ErrorKind::Underflow.into());
        }
        let len = ((buf[pos] as usize) << 16) | ((buf[pos + 1] as usize) << 8) | buf[pos + 2] as usize;
        pos += 3;
        if pos + len > buf.len() {
            return Err(ErrorKind::Underflow.into());
        }
        certs.push(buf[pos..pos + len].to_vec());
        pos += len;
        if certs.len() > MAX_CHAINLENGTH {
            return Err(ErrorKind::Overflow.into());
        }
    }
    Ok(certs)
}

/// Reads a PKCS #7 `signedData` (or a raw `[0] IMPLICIT` cert set) and
/// returns the opaque DER of each embedded certificate, in wire order.
/// Accepts both the `SET OF` and `SEQUENCE OF` cert-collection shapes,
/// and digs through an inner signed-content wrapper when present.
pub fn read_pkcs7_chain(buf: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut mem = MemoryStream::open();
    mem.write(buf).map_err(Error::from)?;
    mem.seek(0).map_err(Error::from)?;
    let mut r = Reader::new(&mut mem);

    // Accept either a bare `[0] IMPLICIT SET OF Certificate` or a full
    // `ContentInfo { contentType, [0] EXPLICIT SignedData }`.
    let tag = r.peek_tag()?;
    let signed_data_len = if tag.number == 16 && tag.class == crate::asn1::Class::Universal {
        // SEQUENCE: ContentInfo wrapper.
        r.expect_definite(Tag::SEQUENCE)?;
        let _content_type = r.read_oid()?;
        let _explicit_len = r.expect_definite(context_tag(0, true))?;
        r.expect_definite(Tag::SEQUENCE)?
    } else {
        r.expect_definite(context_tag(0, true))?
    };
    let _ = signed_data_len;

    let _version = r.read_small_integer()?;
    let digest_algs_len = r.expect_definite(Tag::SET)?;
    r.skip(digest_algs_len)?;

    // Inner ContentInfo: contentType OID, optional `[0] EXPLICIT` content.
    // Whether the content field is present is determined by whether the
    // ContentInfo SEQUENCE has bytes left after the OID, not by tag
    // number alone — the sibling `certificates [0] IMPLICIT SET OF`
    // field that follows ContentInfo uses the very same tag number.
    let content_info_len = r.expect_definite(Tag::SEQUENCE)?;
    let content_info_start = r.tell();
    let _inner_content_type = r.read_oid()?;
    if r.tell() < content_info_start + content_info_len {
        let inner_len = r.expect_definite(context_tag(0, true))?;
        r.skip(inner_len)?;
    }

    let certs_tag = r.peek_tag()?;
    let is_set_like = certs_tag.number == 0 || certs_tag.number == 16;
    if !is_set_like {
        return Err(ErrorKind::BadData.into());
    }
    let certs_len = if certs_tag.number == 0 {
        r.expect_definite(context_tag(0, true))?
    } else {
        r.expect_definite(Tag::SEQUENCE)?
    };

    let mut certs = Vec::new();
    let start = r.tell();
    while r.tell() < start + certs_len {
        let cert_start = r.tell();
        let cert_len = r.expect_definite(Tag::SEQUENCE)?;
        r.skip(cert_len)?;
        let cert_end = r.tell();
        let mut cert_mem = MemoryStream::open();
        cert_mem.write(&buf[cert_start..cert_end]).map_err(Error::from)?;
        certs.push(cert_mem.as_slice().unwrap().to_vec());
        if certs.len() > MAX_CHAINLENGTH {
            return Err(ErrorKind::Overflow.into());
        }
    }
    Ok(certs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeList;
    use crate::cert::types::{Time, Validity};
    use crate::keys::{PublicKey, RsaPublic};

    fn leaf_key(byte: u8) -> PublicKey {
        PublicKey::Rsa(RsaPublic {
            n: vec![byte; 128],
            e: vec![0x01, 0x00, 0x01],
        })
    }

    fn cert(subject: &str, issuer: &str, key_byte: u8, self_signed: bool) -> CertificateData {
        CertificateData {
            serial: vec![key_byte],
            issuer: Name(issuer.as_bytes().to_vec()),
            subject: Name(subject.as_bytes().to_vec()),
            validity: Validity {
                not_before: Time("250101000000Z".into()),
                not_after: Time("260101000000Z".into()),
            },
            public_key: leaf_key(key_byte),
            extensions: Vec::new(),
            attributes: AttributeList::new(),
            self_signed,
            path_kludge: false,
        }
    }

    #[test]
    fn reorders_unordered_bag_leaf_first() {
        let root = cert("CN=Root", "CN=Root", 1, true);
        let leaf = cert("CN=Leaf", "CN=CA", 3, false);
        let ca = cert("CN=CA", "CN=Root", 2, false);
        let result = reorder(vec![root, leaf, ca], false, ComplianceLevel::Standard).unwrap();
        assert_eq!(result.chain.len(), 3);
        assert_eq!(result.chain[0].subject, Name(b"CN=Leaf".to_vec()));
        assert_eq!(result.chain[1].subject, Name(b"CN=CA".to_vec()));
        assert_eq!(result.chain[2].subject, Name(b"CN=Root".to_vec()));
    }

    #[test]
    fn drops_unreachable_certificates() {
        let root = cert("CN=Root", "CN=Root", 1, true);
        let leaf = cert("CN=Leaf", "CN=CA", 3, false);
        let orphan = cert("CN=Orphan", "CN=NoSuchIssuer", 9, false);
        let result = reorder(vec![root, leaf, orphan], false, ComplianceLevel::Standard).unwrap();
        assert_eq!(result.chain.len(), 2);
        assert_eq!(result.dropped.len(), 1);
    }

    #[test]
    fn overflow_past_max_chainlength_is_rejected() {
        let certs: Vec<CertificateData> = (0..(MAX_CHAINLENGTH + 1) as u8)
            .map(|i| cert(&format!("CN=C{i}"), &format!("CN=C{}", i.wrapping_add(1)), i, false))
            .collect();
        assert!(matches!(
            reorder(certs, false, ComplianceLevel::Standard),
            Err(e) if e.kind() == ErrorKind::Overflow
        ));
    }

    fn encode(cert: &CertificateData) -> Vec<u8> {
        let oid = Oid(vec![1, 2, 840, 113549, 1, 1, 5]);
        crate::cert::write::write_certificate(cert, &oid, &[0xde, 0xad, 0xbe, 0xef]).unwrap()
    }

    #[test]
    fn ssl_chain_round_trips_through_length_prefixes() {
        let leaf = encode(&cert("CN=Leaf", "CN=Root", 5, false));
        let root = encode(&cert("CN=Root", "CN=Root", 1, true));
        let encoded = write_ssl_chain(&[leaf, root]).unwrap();
        let certs = read_ssl_chain(&encoded).unwrap();
        assert_eq!(certs.len(), 2);
    }

    #[test]
    fn pkcs7_chain_round_trips() {
        let leaf = encode(&cert("CN=Leaf", "CN=Root", 5, false));
        let root = encode(&cert("CN=Root", "CN=Root", 1, true));
        let encoded = write_pkcs7_chain(&[leaf, root], false).unwrap();
        let certs = read_pkcs7_chain(&encoded).unwrap();
        assert_eq!(certs.len(), 2);
    }
}
