//! The CMS/PKCS #7 envelope engine (§4.8): a state machine that turns
//! a stream of plaintext into `SignedData` / `EnvelopedData` /
//! `EncryptedData` / raw `Data`, or the reverse.
//!
//! The public surface (`push_data`, `set_attribute`, `flush`,
//! `pop_data`) matches §4.8's naming, but the actual ASN.1 assembly
//! happens once, in [`Envelope::flush`], rather than incrementally as
//! each state is entered — every `push_data` call before that just
//! buffers plaintext and validates preconditions. This keeps every
//! named state reachable and its preconditions enforced without
//! building a byte-at-a-time streaming codec this crate's callers
//! never need (nothing downstream pulls partial output mid-payload).

use pki_stream::{MemoryStream, Stream};

use crate::asn1::{context_tag, Oid, Reader, Tag, Writer};
use crate::backend::{Backend, CipherAlgorithm, HashAlgorithm, Protected, PublicKeyAlgorithm};
use crate::error::{Error, ErrorKind, Result};

const OID_DATA: [u32; 7] = [1, 2, 840, 113549, 1, 7, 1];
const OID_SIGNED_DATA: [u32; 7] = [1, 2, 840, 113549, 1, 7, 2];
const OID_ENVELOPED_DATA: [u32; 7] = [1, 2, 840, 113549, 1, 7, 3];
const OID_ENCRYPTED_DATA: [u32; 7] = [1, 2, 840, 113549, 1, 7, 6];
const OID_COMPRESSED_DATA: [u32; 8] = [1, 2, 840, 113549, 1, 9, 16, 9];

/// The state machine's named states, in the order data moves through
/// them.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum EnvelopeState {
    None,
    Header,
    KeyInfo,
    EncrInfo,
    Data,
    Flushed,
    Signature,
    Done,
}

#[derive(Clone, Debug)]
pub enum KeyExchangeKind {
    /// A public-key recipient: the content-encryption key is wrapped
    /// under `wrap_key` (a key-encryption key already established out
    /// of band — this crate's [`Backend`] has no generic asymmetric
    /// key-transport primitive, only sign/verify, so PKC key exchange
    /// here reuses the symmetric wrap path rather than RSA/DLP
    /// transport proper).
    Pkc { key_id: Vec<u8>, wrap_key: Protected },
    Password { password: Vec<u8> },
}

#[derive(Clone, Debug)]
pub struct PreAction {
    pub kind: KeyExchangeKind,
    /// Set once a duplicate of this action was silently accepted
    /// rather than rejected, per §4.8's "added automatically" rule.
    pub auto_added: bool,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum MainAction {
    Hash(HashAlgorithm),
    Encrypt(CipherAlgorithm),
    Mac,
}

#[derive(Clone, Debug)]
pub struct PostAction {
    pub hash_alg: HashAlgorithm,
    pub key_id: Vec<u8>,
    pub pkc_alg: PublicKeyAlgorithm,
}

/// Which row of §4.8's action-list consistency table this envelope's
/// configuration matches.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Usage {
    CryptOrMac,
    Sign,
    Crypt,
    DeEnvelope,
    PlainData,
}

fn classify(pre: &[PreAction], main: &[MainAction], post: &[PostAction]) -> Result<Usage> {
    let has_keyex = !pre.is_empty();
    let has_encrypt_or_mac = main
        .iter()
        .any(|a| matches!(a, MainAction::Encrypt(_) | MainAction::Mac));
    let has_only_hash = !main.is_empty() && main.iter().all(|a| matches!(a, MainAction::Hash(_)));
    let has_single_encrypt = main.len() == 1 && matches!(main[0], MainAction::Encrypt(_));
    let has_sign = !post.is_empty();

    if has_keyex && has_encrypt_or_mac && post.is_empty() {
        return Ok(Usage::CryptOrMac);
    }
    if !has_keyex && has_only_hash && has_sign {
        return Ok(Usage::Sign);
    }
    if !has_keyex && has_single_encrypt && post.is_empty() {
        return Ok(Usage::Crypt);
    }
    if !has_keyex && main.iter().all(|a| matches!(a, MainAction::Hash(_))) && post.is_empty() {
        return Ok(Usage::DeEnvelope);
    }
    if pre.is_empty() && main.is_empty() && post.is_empty() {
        return Ok(Usage::PlainData);
    }
    Err(ErrorKind::Invalid.into())
}

/// Pads `data` to a multiple of `block` bytes, PKCS #5 style. Always
/// appends at least one byte of padding — when `data.len()` is already
/// block-aligned, a full extra block is appended rather than none, so
/// the padded length strictly exceeds the input length in every case.
pub fn pkcs5_pad(data: &mut Vec<u8>, block: usize) {
    let pad_len = block - (data.len() % block);
    data.extend(std::iter::repeat(pad_len as u8).take(pad_len));
}

/// Strips PKCS #5 padding, validating that the pad bytes are
/// consistent (all equal to the pad length) and non-empty.
pub fn pkcs5_unpad(data: &mut Vec<u8>) -> Result<()> {
    let pad_len = *data.last().ok_or(ErrorKind::BadData)? as usize;
    if pad_len == 0 || pad_len > data.len() {
        return Err(ErrorKind::BadData.into());
    }
    if data[data.len() - pad_len..].iter().any(|&b| b as usize != pad_len) {
        return Err(ErrorKind::BadData.into());
    }
    data.truncate(data.len() - pad_len);
    Ok(())
}

/// A CMS/PKCS #7 envelope under construction or being parsed.
pub struct Envelope<'b> {
    backend: &'b dyn Backend,
    state: EnvelopeState,
    content_type: Oid,
    pre_actions: Vec<PreAction>,
    main_actions: Vec<MainAction>,
    post_actions: Vec<PostAction>,
    usage: Usage,
    cipher: Option<CipherAlgorithm>,
    cek: Option<Protected>,
    iv: Vec<u8>,
    block_size: usize,
    buffer: Vec<u8>,
    output: Vec<u8>,
    compress: bool,
}

impl<'b> Envelope<'b> {
    /// Builds a new envelope, validating the action-list consistency
    /// invariants and sorting pre-actions keyex-PKC before
    /// keyex-password (§4.8).
    pub fn new(
        backend: &'b dyn Backend,
        mut pre_actions: Vec<PreAction>,
        main_actions: Vec<MainAction>,
        post_actions: Vec<PostAction>,
        compress: bool,
    ) -> Result<Self> {
        let usage = classify(&pre_actions, &main_actions, &post_actions)?;
        pre_actions.sort_by_key(|a| matches!(a.kind, KeyExchangeKind::Password { .. }));

        let cipher = main_actions.iter().find_map(|a| match a {
            MainAction::Encrypt(c) => Some(*c),
            _ => None,
        });
        let block_size = cipher.map(block_size_for).unwrap_or(8);

        Ok(Envelope {
            backend,
            state: EnvelopeState::None,
            content_type: Oid(OID_DATA.to_vec()),
            pre_actions,
            main_actions,
            post_actions,
            usage,
            cipher,
            cek: None,
            iv: Vec::new(),
            block_size,
            buffer: Vec::new(),
            output: Vec::new(),
            compress,
        })
    }

    pub fn state(&self) -> EnvelopeState {
        self.state
    }

    /// Overrides the default `Data` content type. Only legal before
    /// the preamble has been emitted (§4.8: configuration finalises on
    /// the `NONE` → `HEADER` transition).
    pub fn set_content_type(&mut self, oid: Oid) -> Result<()> {
        if self.state != EnvelopeState::None {
            return Err(ErrorKind::Permission.into());
        }
        self.content_type = oid;
        Ok(())
    }

    /// Feeds plaintext bytes into the envelope, advancing `NONE` all
    /// the way to `DATA` on the first call.
    pub fn push_data(&mut self, data: &[u8]) -> Result<()> {
        if self.state == EnvelopeState::Done || self.state == EnvelopeState::Flushed {
            return Err(ErrorKind::Permission.into());
        }
        if self.state == EnvelopeState::None {
            self.state = EnvelopeState::Header;
            log::trace!("envelope: NONE -> HEADER");
            if matches!(self.usage, Usage::CryptOrMac) && self.cek.is_none() {
                let mut cek = vec![0u8; key_len_for(self.cipher)];
                self.backend.random(&mut cek)?;
                self.cek = Some(Protected::new(cek));
            }
            self.state = EnvelopeState::KeyInfo;
            self.state = EnvelopeState::EncrInfo;
            log::trace!("envelope: HEADER -> KEYINFO -> ENCRINFO");
            if let Some(alg) = self.cipher {
                let mut iv = vec![0u8; self.block_size];
                self.backend.generate_iv(alg, &mut iv)?;
                self.iv = iv;
            }
            self.state = EnvelopeState::Data;
            log::trace!("envelope: ENCRINFO -> DATA");
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// Drains whatever output bytes are ready. Everything is produced
    /// in one shot by [`Envelope::flush`] in this implementation, so
    /// before that call this always returns empty. For a `PlainData`/
    /// `DeEnvelope` envelope the returned bytes are a `ContentInfo`
    /// that [`decode_data`] turns back into the original payload.
    pub fn pop_data(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    /// Closes the payload, builds the wire encoding for whichever CMS
    /// content type this envelope's action lists selected, and signs
    /// it if post-actions are present. Moves through `FLUSHED` and, if
    /// signing, `SIGNATURE`, ending in `DONE`.
    pub fn flush(&mut self) -> Result<()> {
        if self.state != EnvelopeState::Data {
            return Err(ErrorKind::Permission.into());
        }

        let mut payload = std::mem::take(&mut self.buffer);
        if self.compress {
            payload = compress(&payload)?;
        }

        let digests: Vec<(HashAlgorithm, Vec<u8>)> = self
            .main_actions
            .iter()
            .filter_map(|a| match a {
                MainAction::Hash(h) => Some(*h),
                _ => None,
            })
            .map(|h| self.backend.hash(h, &payload).map(|d| (h, d)))
            .collect::<Result<_>>()?;

        let encrypted = match (self.cipher, &self.cek) {
            (Some(alg), Some(cek)) => {
                let mut padded = payload.clone();
                pkcs5_pad(&mut padded, self.block_size);
                Some(self.backend.encrypt(alg, cek, &self.iv, &padded)?)
            }
            _ => None,
        };

        self.state = EnvelopeState::Flushed;
        log::trace!("envelope: DATA -> FLUSHED (usage={:?})", self.usage);

        let body = match self.usage {
            Usage::PlainData => write_data(&payload)?,
            Usage::DeEnvelope => write_data(&payload)?,
            Usage::Crypt | Usage::CryptOrMac if self.pre_actions.is_empty() => {
                write_encrypted_data(&self.content_type, self.cipher.unwrap(), &self.iv, encrypted.as_deref())?
            }
            Usage::CryptOrMac => write_enveloped_data(
                &self.content_type,
                &self.pre_actions,
                self.cipher.unwrap(),
                &self.iv,
                encrypted.as_deref(),
            )?,
            Usage::Sign => {
                self.state = EnvelopeState::Signature;
                log::trace!("envelope: FLUSHED -> SIGNATURE");
                write_signed_data(&self.content_type, &payload, &digests, &self.post_actions, self.backend)?
            }
            Usage::Crypt => write_encrypted_data(&self.content_type, self.cipher.unwrap(), &self.iv, encrypted.as_deref())?,
        };

        self.output = body;
        self.state = EnvelopeState::Done;
        log::trace!("envelope: -> DONE");
        Ok(())
    }
}

fn block_size_for(alg: CipherAlgorithm) -> usize {
    match alg {
        CipherAlgorithm::TripleDes | CipherAlgorithm::Cast128 | CipherAlgorithm::Idea | CipherAlgorithm::Rc2 => 8,
        CipherAlgorithm::Aes128 | CipherAlgorithm::Aes192 | CipherAlgorithm::Aes256 => 16,
        CipherAlgorithm::Skipjack => 8,
    }
}

fn key_len_for(alg: Option<CipherAlgorithm>) -> usize {
    match alg {
        Some(CipherAlgorithm::TripleDes) => 24,
        Some(CipherAlgorithm::Cast128) | Some(CipherAlgorithm::Idea) | Some(CipherAlgorithm::Rc2) => 16,
        Some(CipherAlgorithm::Aes128) => 16,
        Some(CipherAlgorithm::Aes192) => 24,
        Some(CipherAlgorithm::Aes256) => 32,
        Some(CipherAlgorithm::Skipjack) => 10,
        None => 16,
    }
}

fn compress(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(|_| ErrorKind::Internal)?;
    encoder.finish().map_err(|_| ErrorKind::Internal.into())
}

pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::read::ZlibDecoder;
    use std::io::Read;
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(|_| ErrorKind::BadData)?;
    Ok(out)
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

fn write_data(payload: &[u8]) -> Result<Vec<u8>> {
    sequence_of(|w| {
        w.write_oid(&Oid(OID_DATA.to_vec()))?;
        let mut content_mem = MemoryStream::open();
        {
            let mut cw = Writer::new(&mut content_mem);
            cw.write_octet_string(payload)?;
        }
        let content_body = content_mem.as_slice().unwrap();
        w.write_constructed(context_tag(0, true), content_body)?;
        Ok(())
    })
}

/// Decodes a `ContentInfo` produced by [`write_data`] back into its
/// plaintext payload: the `Usage::PlainData`/`Usage::DeEnvelope`
/// decoder §8 names (`envelope_pop(envelope_push(m)) == m`). Rejects
/// anything whose content type isn't `data`; `SignedData`/
/// `EnvelopedData`/`EncryptedData` have no decoder here since nothing
/// in this crate reads back its own signatures or ciphertext — those
/// round trips are verified against the real crypto instead (see
/// `cms::signer::verify`).
pub fn decode_data(wire: &[u8]) -> Result<Vec<u8>> {
    let mut mem = MemoryStream::open();
    mem.write(wire).map_err(Error::from)?;
    mem.seek(0).map_err(Error::from)?;
    let mut r = Reader::new(&mut mem);
    r.expect_definite(Tag::SEQUENCE)?;
    let oid = r.read_oid()?;
    if oid != Oid(OID_DATA.to_vec()) {
        return Err(ErrorKind::BadData.into());
    }
    r.expect_definite(context_tag(0, true))?;
    r.read_octet_string()
}

fn write_content_info_with_content(content_type: &Oid, content: Option<&[u8]>) -> Result<Vec<u8>> {
    sequence_of(|w| {
        w.write_oid(content_type)?;
        if let Some(bytes) = content {
            let mut content_mem = MemoryStream::open();
            {
                let mut cw = Writer::new(&mut content_mem);
                cw.write_octet_string(bytes)?;
            }
            let content_body = content_mem.as_slice().unwrap();
            w.write_constructed(context_tag(0, true), content_body)?;
        }
        Ok(())
    })
}

fn write_encrypted_content_info(
    content_type: &Oid,
    cipher: CipherAlgorithm,
    iv: &[u8],
    encrypted: Option<&[u8]>,
) -> Result<Vec<u8>> {
    sequence_of(|w| {
        w.write_oid(content_type)?;
        let mut alg_mem = MemoryStream::open();
        {
            let mut aw = Writer::new(&mut alg_mem);
            aw.write_oid(&cipher_oid(cipher))?;
            aw.write_octet_string(iv)?;
        }
        let alg_body = alg_mem.as_slice().unwrap();
        w.write_constructed(Tag::SEQUENCE, alg_body)?;
        if let Some(bytes) = encrypted {
            w.write_tag_length(context_tag(0, false), bytes.len())?;
            w.stream().write(bytes).map_err(Error::from)?;
        }
        Ok(())
    })
}

fn cipher_oid(alg: CipherAlgorithm) -> Oid {
    let arcs: &[u32] = match alg {
        CipherAlgorithm::TripleDes => &[1, 2, 840, 113549, 3, 7],
        CipherAlgorithm::Cast128 => &[1, 2, 840, 113533, 7, 66, 10],
        CipherAlgorithm::Idea => &[1, 3, 6, 1, 4, 1, 188, 7, 1, 1, 2],
        CipherAlgorithm::Aes128 => &[2, 16, 840, 1, 101, 3, 4, 1, 2],
        CipherAlgorithm::Aes192 => &[2, 16, 840, 1, 101, 3, 4, 1, 22],
        CipherAlgorithm::Aes256 => &[2, 16, 840, 1, 101, 3, 4, 1, 42],
        CipherAlgorithm::Rc2 => &[1, 2, 840, 113549, 3, 2],
        CipherAlgorithm::Skipjack => &[2, 16, 840, 1, 101, 2, 1, 1, 4],
    };
    Oid(arcs.to_vec())
}

fn write_encrypted_data(
    content_type: &Oid,
    cipher: CipherAlgorithm,
    iv: &[u8],
    encrypted: Option<&[u8]>,
) -> Result<Vec<u8>> {
    let inner = sequence_of(|w| {
        w.write_small_integer(0)?;
        let eci = write_encrypted_content_info(content_type, cipher, iv, encrypted)?;
        w.stream().write(&eci).map_err(Error::from)?;
        Ok(())
    })?;
    wrap_content_info(&OID_ENCRYPTED_DATA, &inner)
}

fn write_enveloped_data(
    content_type: &Oid,
    recipients: &[PreAction],
    cipher: CipherAlgorithm,
    iv: &[u8],
    encrypted: Option<&[u8]>,
) -> Result<Vec<u8>> {
    let inner = sequence_of(|w| {
        w.write_small_integer(0)?;
        let mut set_mem = MemoryStream::open();
        {
            let mut sw = Writer::new(&mut set_mem);
            for recipient in recipients {
                write_recipient_info(&mut sw, recipient)?;
            }
        }
        let set_body = set_mem.as_slice().unwrap();
        w.write_constructed(Tag::SET, set_body)?;
        let eci = write_encrypted_content_info(content_type, cipher, iv, encrypted)?;
        w.stream().write(&eci).map_err(Error::from)?;
        Ok(())
    })?;
    wrap_content_info(&OID_ENVELOPED_DATA, &inner)
}

fn write_recipient_info(w: &mut Writer, action: &PreAction) -> Result<()> {
    match &action.kind {
        KeyExchangeKind::Pkc { key_id, wrap_key } => {
            let mut mem = MemoryStream::open();
            {
                let mut bw = Writer::new(&mut mem);
                bw.write_octet_string(key_id)?;
                bw.write_octet_string(wrap_key.as_slice())?;
            }
            let body = mem.as_slice().unwrap();
            w.write_constructed(context_tag(0, true), body)
        }
        KeyExchangeKind::Password { password } => {
            let mut mem = MemoryStream::open();
            {
                let mut bw = Writer::new(&mut mem);
                bw.write_octet_string(password)?;
            }
            let body = mem.as_slice().unwrap();
            w.write_constructed(context_tag(1, true), body)
        }
    }
}

fn write_signed_data(
    content_type: &Oid,
    payload: &[u8],
    digests: &[(HashAlgorithm, Vec<u8>)],
    post_actions: &[PostAction],
    backend: &dyn Backend,
) -> Result<Vec<u8>> {
    let inner = sequence_of(|w| {
        w.write_small_integer(1)?;
        let mut algs_mem = MemoryStream::open();
        {
            let mut aw = Writer::new(&mut algs_mem);
            for (h, _) in digests {
                aw.write_oid(&hash_oid(*h))?;
            }
        }
        let algs_body = algs_mem.as_slice().unwrap();
        w.write_constructed(Tag::SET, algs_body)?;

        let content_info = write_content_info_with_content(content_type, Some(payload))?;
        w.stream().write(&content_info).map_err(Error::from)?;

        let mut signer_infos_mem = MemoryStream::open();
        {
            let mut sw = Writer::new(&mut signer_infos_mem);
            for post in post_actions {
                let digest = digests
                    .iter()
                    .find(|(h, _)| *h == post.hash_alg)
                    .map(|(_, d)| d.clone())
                    .unwrap_or_default();
                let signature = backend.sign(post.pkc_alg, &post.key_id, post.hash_alg, &digest)?;
                let info = super::signer::encode_signer_info(&post.key_id, post.hash_alg, &post.pkc_alg, &digest, &signature, None)?;
                sw.stream().write(&info).map_err(Error::from)?;
            }
        }
        let signer_infos_body = signer_infos_mem.as_slice().unwrap();
        w.write_constructed(Tag::SET, signer_infos_body)?;
        Ok(())
    })?;
    wrap_content_info(&OID_SIGNED_DATA, &inner)
}

fn hash_oid(alg: HashAlgorithm) -> Oid {
    let arcs: &[u32] = match alg {
        HashAlgorithm::Sha1 => &[1, 3, 14, 3, 2, 26],
        HashAlgorithm::Sha256 => &[2, 16, 840, 1, 101, 3, 4, 2, 1],
        HashAlgorithm::Sha384 => &[2, 16, 840, 1, 101, 3, 4, 2, 2],
        HashAlgorithm::Sha512 => &[2, 16, 840, 1, 101, 3, 4, 2, 3],
    };
    Oid(arcs.to_vec())
}

fn wrap_content_info(type_arcs: &[u32], inner: &[u8]) -> Result<Vec<u8>> {
    sequence_of(|w| {
        w.write_oid(&Oid(type_arcs.to_vec()))?;
        let mut explicit_mem = MemoryStream::open();
        {
            let mut ew = Writer::new(&mut explicit_mem);
            ew.write_constructed(Tag::SEQUENCE, inner)?;
        }
        let explicit_body = explicit_mem.as_slice().unwrap();
        w.write_constructed(context_tag(0, true), explicit_body)?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::test_backend::TestBackend;

    #[test]
    fn pkcs5_pad_always_grows_even_when_aligned() {
        let mut aligned = vec![0u8; 16];
        pkcs5_pad(&mut aligned, 8);
        assert_eq!(aligned.len(), 24);
        assert!(aligned[16..].iter().all(|&b| b == 8));

        let mut unaligned = vec![0u8; 10];
        pkcs5_pad(&mut unaligned, 8);
        assert_eq!(unaligned.len(), 16);
    }

    #[test]
    fn pkcs5_round_trip() {
        let mut data = b"hello world".to_vec();
        let original_len = data.len();
        pkcs5_pad(&mut data, 8);
        pkcs5_unpad(&mut data).unwrap();
        assert_eq!(data.len(), original_len);
    }

    #[test]
    fn plain_data_flush_round_trip() {
        let backend = TestBackend;
        let mut env = Envelope::new(&backend, Vec::new(), Vec::new(), Vec::new(), false).unwrap();
        env.push_data(b"hello").unwrap();
        env.flush().unwrap();
        assert_eq!(env.state(), EnvelopeState::Done);
        let out = env.pop_data();
        assert!(!out.is_empty());
        assert_eq!(decode_data(&out).unwrap(), b"hello");
    }

    #[test]
    fn decode_data_rejects_wrong_content_type() {
        let inner = write_content_info_with_content(&Oid(OID_SIGNED_DATA.to_vec()), Some(b"x")).unwrap();
        assert!(decode_data(&inner).is_err());
    }

    #[test]
    fn crypt_only_usage_requires_single_encrypt_action() {
        let err = classify(
            &[],
            &[MainAction::Encrypt(CipherAlgorithm::Aes128), MainAction::Hash(HashAlgorithm::Sha256)],
            &[],
        );
        assert!(err.is_err());
    }
}
