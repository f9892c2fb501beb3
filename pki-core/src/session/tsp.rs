//! TSP: time-stamp protocol, RFC 3161 (§4.10). Request/response
//! grammars are encoded directly here rather than through the
//! certificate writer family, since neither shape is a certificate
//! management object.

use pki_stream::{MemoryStream, Stream};

use crate::asn1::{Oid, Tag, Writer};
use crate::backend::{Backend, HashAlgorithm, PublicKeyAlgorithm};
use crate::cert::types::Name;
use crate::cms::signer::{self, SignerInfo};
use crate::error::{Error, ErrorKind, Result};

/// Smallest and largest message-imprint digest lengths the server
/// will accept: SHA-1 (20 bytes) through a generous margin past the
/// largest digest it might ever see (§4.10, "outside [20…32+maxHash]").
const MIN_IMPRINT_LEN: usize = 20;
const MAX_HASH_LEN: usize = 64;
const MAX_IMPRINT_LEN: usize = 32 + MAX_HASH_LEN;

const SERIAL_LEN: usize = 16;

fn hash_oid(alg: HashAlgorithm) -> Oid {
    let arcs: &[u32] = match alg {
        HashAlgorithm::Sha1 => &[1, 3, 14, 3, 2, 26],
        HashAlgorithm::Sha256 => &[2, 16, 840, 1, 101, 3, 4, 2, 1],
        HashAlgorithm::Sha384 => &[2, 16, 840, 1, 101, 3, 4, 2, 2],
        HashAlgorithm::Sha512 => &[2, 16, 840, 1, 101, 3, 4, 2, 3],
    };
    Oid(arcs.to_vec())
}

#[derive(Clone, Debug)]
pub struct TspRequest {
    pub hash_alg: HashAlgorithm,
    pub hashed_message: Vec<u8>,
    pub policy_id: Option<Oid>,
    pub nonce: Option<Vec<u8>>,
    pub cert_req: bool,
}

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

fn write_message_imprint(w: &mut Writer, hash_alg: HashAlgorithm, hashed_message: &[u8]) -> Result<Vec<u8>> {
    let mut mem = MemoryStream::open();
    {
        let mut iw = Writer::new(&mut mem);
        let mut alg_mem = MemoryStream::open();
        {
            let mut aw = Writer::new(&mut alg_mem);
            aw.write_oid(&hash_oid(hash_alg))?;
        }
        let alg_body = alg_mem.as_slice().unwrap();
        iw.write_constructed(Tag::SEQUENCE, alg_body)?;
        iw.write_octet_string(hashed_message)?;
    }
    let body = mem.as_slice().unwrap().to_vec();
    w.write_constructed(Tag::SEQUENCE, &body)?;
    Ok(body)
}

/// Encodes the request grammar quoted in §4.10, returning both the
/// full request bytes and the standalone `MessageImprint` encoding
/// (the latter is what the server must echo back verbatim).
pub fn write_request(req: &TspRequest) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut imprint_bytes = Vec::new();
    let wire = sequence_of(|w| {
        w.write_small_integer(1)?;
        imprint_bytes = write_message_imprint(w, req.hash_alg, &req.hashed_message)?;
        if let Some(policy) = &req.policy_id {
            w.write_oid(policy)?;
        }
        if let Some(nonce) = &req.nonce {
            w.write_octet_string(nonce)?;
        }
        w.write_boolean(req.cert_req)?;
        Ok(())
    })?;
    Ok((wire, imprint_bytes))
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum PkiStatus {
    Granted = 0,
    GrantedWithMods = 1,
    Rejection = 2,
    Waiting = 3,
    RevocationWarning = 4,
    RevocationNotification = 5,
}

#[derive(Clone, Debug)]
pub struct TstInfo {
    pub policy: Oid,
    pub message_imprint: Vec<u8>,
    pub serial_number: Vec<u8>,
    pub gen_time: String,
}

#[derive(Clone, Debug)]
pub struct TspResponse {
    pub status: PkiStatus,
    pub tst_info: TstInfo,
}

fn write_tst_info(info: &TstInfo) -> Result<Vec<u8>> {
    sequence_of(|w| {
        w.write_small_integer(1)?;
        w.write_oid(&info.policy)?;
        w.stream().write(&info.message_imprint).map_err(Error::from)?;
        w.write_integer_bytes(&info.serial_number)?;
        w.write_generalized_time(&info.gen_time)?;
        Ok(())
    })
}

/// Encodes the full response: `PKIStatusInfo` followed by the signed
/// `TSTInfo`. The signature is carried as a [`SignerInfo`], kept in
/// structured form rather than a byte-level `ContentInfo`/`SignedData`
/// wrapper — see the module doc comment on [`crate::session`].
pub fn write_response(resp: &TspResponse, info: &SignerInfo) -> Result<Vec<u8>> {
    let tst_info_der = write_tst_info(&resp.tst_info)?;
    let signer_info_der = signer::encode(info)?;
    sequence_of(|w| {
        let mut status_mem = MemoryStream::open();
        {
            let mut sw = Writer::new(&mut status_mem);
            sw.write_small_integer(resp.status as u64)?;
        }
        let status_body = status_mem.as_slice().unwrap();
        w.write_constructed(Tag::SEQUENCE, status_body)?;

        w.write_octet_string(&tst_info_der)?;
        w.stream().write(&signer_info_der).map_err(Error::from)?;
        Ok(())
    })
}

/// §4.10 "TSP server": validates the message-imprint length, stamps a
/// fresh random serial, propagates the nonce (absorbed into the
/// request's own encoding — RFC 3161 carries it inside the request,
/// not as a CMS attribute), and signs.
#[allow(clippy::too_many_arguments)]
pub fn handle_request(
    backend: &dyn Backend,
    req: &TspRequest,
    policy: Oid,
    system_time: &str,
    signer_key_id: &[u8],
    issuer: Name,
    serial: Vec<u8>,
    sig_alg: PublicKeyAlgorithm,
) -> Result<(TspResponse, SignerInfo)> {
    if req.hashed_message.len() < MIN_IMPRINT_LEN || req.hashed_message.len() > MAX_IMPRINT_LEN {
        return Err(ErrorKind::BadData.into());
    }
    let mut serial_number = vec![0u8; SERIAL_LEN];
    backend.random(&mut serial_number)?;

    let mut imprint_mem = MemoryStream::open();
    let message_imprint;
    {
        let mut w = Writer::new(&mut imprint_mem);
        message_imprint = write_message_imprint(&mut w, req.hash_alg, &req.hashed_message)?;
    }

    let tst_info = TstInfo {
        policy,
        message_imprint,
        serial_number,
        gen_time: system_time.to_string(),
    };
    let tst_info_der = write_tst_info(&tst_info)?;
    let signer_info = signer::sign(
        backend,
        signer_key_id,
        issuer,
        serial,
        &tst_info_der,
        req.hash_alg,
        sig_alg,
        Some(system_time),
        false,
    )?;
    Ok((TspResponse { status: PkiStatus::Granted, tst_info }, signer_info))
}

/// §4.10 "TSP client": rejects a non-`granted` status, then requires
/// the response `messageImprint` to match the request's byte-for-byte
/// before trusting the signature at all.
pub fn verify_response(backend: &dyn Backend, responder_key_id: &[u8], request_imprint: &[u8], resp: &TspResponse, info: &SignerInfo) -> Result<()> {
    if resp.status != PkiStatus::Granted {
        return Err(ErrorKind::Invalid.into());
    }
    if resp.tst_info.message_imprint != request_imprint {
        return Err(ErrorKind::Signature.into());
    }
    let tst_info_der = write_tst_info(&resp.tst_info)?;
    signer::verify(backend, info, responder_key_id, &tst_info_der)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::test_backend::TestBackend;

    const SHA1_ABC: [u8; 20] = [
        0xa9, 0x99, 0x3e, 0x36, 0x47, 0x06, 0x81, 0x6a, 0xba, 0x3e, 0x25, 0x71, 0x78, 0x50, 0xc2, 0x6c, 0x9c, 0xd0, 0xd8, 0x9d,
    ];

    #[test]
    fn timestamp_round_trip_confirms_message_imprint() {
        let backend = TestBackend;
        let req = TspRequest {
            hash_alg: HashAlgorithm::Sha1,
            hashed_message: SHA1_ABC.to_vec(),
            policy_id: None,
            nonce: None,
            cert_req: false,
        };
        let (_wire, imprint) = write_request(&req).unwrap();

        let policy = Oid(vec![1, 3, 6, 1, 4, 1, 3029, 54, 1]);
        let (resp, info) = handle_request(
            &backend,
            &req,
            policy,
            "20260726000000Z",
            b"tsa-key",
            Name(b"CN=TSA".to_vec()),
            vec![0x01],
            PublicKeyAlgorithm::Rsa,
        )
        .unwrap();

        assert_eq!(resp.tst_info.serial_number.len(), SERIAL_LEN);
        verify_response(&backend, b"tsa-key", &imprint, &resp, &info).unwrap();
    }

    #[test]
    fn imprint_too_short_is_rejected() {
        let backend = TestBackend;
        let req = TspRequest {
            hash_alg: HashAlgorithm::Sha1,
            hashed_message: vec![0u8; 4],
            policy_id: None,
            nonce: None,
            cert_req: false,
        };
        let policy = Oid(vec![1, 3, 6, 1, 4, 1, 3029, 54, 1]);
        let result = handle_request(
            &backend,
            &req,
            policy,
            "20260726000000Z",
            b"tsa-key",
            Name(b"CN=TSA".to_vec()),
            vec![0x01],
            PublicKeyAlgorithm::Rsa,
        );
        assert!(result.is_err());
    }

    #[test]
    fn tampered_message_imprint_fails_client_verification() {
        let backend = TestBackend;
        let req = TspRequest {
            hash_alg: HashAlgorithm::Sha1,
            hashed_message: SHA1_ABC.to_vec(),
            policy_id: None,
            nonce: None,
            cert_req: false,
        };
        let (_wire, imprint) = write_request(&req).unwrap();
        let policy = Oid(vec![1, 3, 6, 1, 4, 1, 3029, 54, 1]);
        let (mut resp, info) = handle_request(
            &backend,
            &req,
            policy,
            "20260726000000Z",
            b"tsa-key",
            Name(b"CN=TSA".to_vec()),
            vec![0x01],
            PublicKeyAlgorithm::Rsa,
        )
        .unwrap();
        resp.tst_info.message_imprint[0] ^= 0xff;
        assert!(verify_response(&backend, b"tsa-key", &imprint, &resp, &info).is_err());
    }
}
