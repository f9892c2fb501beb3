//! Per-object-type data structures for the certificate writer family
//! (§4.6).
//!
//! A `Name` (issuer/subject distinguished name) is stored as its
//! already-DER-encoded bytes rather than parsed into RDN components:
//! every place §4.6 needs one it only ever compares two DNs for
//! equality or copies one verbatim from a parent, so keeping it
//! opaque avoids reimplementing an RDN/AttributeTypeAndValue grammar
//! this crate never needs to inspect.

use crate::attribute::AttributeList;
use crate::keys::PublicKey;

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Name(pub Vec<u8>);

impl Name {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// `YYMMDDHHMMSSZ` (UTCTime) or `YYYYMMDDHHMMSSZ` (GeneralizedTime),
/// stored as the raw ASCII the writer/reader already produced —
/// calendar arithmetic for validity containment is done on the ASCII
/// form directly, which sorts correctly for both encodings as long as
/// both endpoints use the same one.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct Time(pub String);

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Validity {
    pub not_before: Time,
    pub not_after: Time,
}

impl Validity {
    /// Whether `self` fits inside `issuer`'s validity window.
    pub fn within(&self, issuer: &Validity) -> bool {
        self.not_before >= issuer.not_before && self.not_after <= issuer.not_after
    }

    pub fn constrain_to(&mut self, issuer: &Validity) {
        if self.not_before < issuer.not_before {
            self.not_before = issuer.not_before.clone();
        }
        if self.not_after > issuer.not_after {
            self.not_after = issuer.not_after.clone();
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Extension {
    pub oid: crate::asn1::Oid,
    pub critical: bool,
    pub value: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct CertificateData {
    pub serial: Vec<u8>,
    pub issuer: Name,
    pub subject: Name,
    pub validity: Validity,
    pub public_key: PublicKey,
    pub extensions: Vec<Extension>,
    pub attributes: AttributeList,
    pub self_signed: bool,
    /// Set by the chain engine's path-kludge conversion (§4.7 step 7);
    /// a path-kludge cert looks self-signed on the wire but is not
    /// treated as a chain root.
    pub path_kludge: bool,
}

#[derive(Clone, Debug)]
pub struct AttributeCertificateData {
    pub holder_issuer: Name,
    pub holder_serial: Vec<u8>,
    pub issuer: Name,
    pub validity: Validity,
    pub attributes: AttributeList,
    pub extensions: Vec<Extension>,
}

#[derive(Clone, Debug)]
pub struct CertRequestData {
    pub subject: Name,
    pub public_key: PublicKey,
    pub attributes: AttributeList,
    pub extensions: Vec<Extension>,
}

#[derive(Clone, Debug)]
pub struct CrmfRequestData {
    pub subject: Name,
    pub public_key: Option<PublicKey>,
    pub extensions: Vec<Extension>,
}

#[derive(Clone, Debug)]
pub struct RevocationRequestData {
    pub serial: Vec<u8>,
    pub issuer: Name,
    pub reason: Option<CrlReason>,
    pub invalidity_date: Option<Time>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum CrlReason {
    Unspecified,
    KeyCompromise,
    CaCompromise,
    AffiliationChanged,
    Superseded,
    CessationOfOperation,
    CertificateHold,
    RemoveFromCrl,
    PrivilegeWithdrawn,
    AaCompromise,
    /// Not a real RFC 5280 reason code: a cryptlib-local sentinel
    /// meaning "this entry never was, and never will be, valid",
    /// which §4.6's pre-encode side-effect maps onto `invalidityDate
    /// == revocationDate`.
    NeverValid,
}

#[derive(Clone, Debug)]
pub struct CrlEntry {
    pub serial: Vec<u8>,
    pub revocation_date: Option<Time>,
    pub reason: Option<CrlReason>,
    pub invalidity_date: Option<Time>,
}

#[derive(Clone, Debug)]
pub struct CrlData {
    pub issuer: Name,
    pub this_update: Time,
    pub next_update: Option<Time>,
    pub entries: Vec<CrlEntry>,
    pub extensions: Vec<Extension>,
}

#[derive(Clone, Debug)]
pub struct RtcsRequestEntry {
    pub cert_fingerprint: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct RtcsRequestData {
    pub entries: Vec<RtcsRequestEntry>,
    pub nonce: Option<Vec<u8>>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum RtcsStatus {
    Valid,
    NotValid,
    Unknown,
}

#[derive(Clone, Debug)]
pub struct RtcsResponseEntry {
    pub cert_fingerprint: Vec<u8>,
    pub status: RtcsStatus,
}

#[derive(Clone, Debug)]
pub struct RtcsResponseData {
    pub entries: Vec<RtcsResponseEntry>,
    pub nonce: Option<Vec<u8>>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum OcspVersion {
    V1,
    V2,
}

#[derive(Clone, Debug)]
pub struct OcspRequestEntry {
    pub issuer_name_hash: Vec<u8>,
    pub issuer_key_hash: Vec<u8>,
    pub serial: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct OcspRequestData {
    pub version: OcspVersion,
    pub entries: Vec<OcspRequestEntry>,
    pub nonce: Option<Vec<u8>>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum OcspCertStatus {
    Good,
    Revoked,
    Unknown,
}

#[derive(Clone, Debug)]
pub struct OcspResponseEntry {
    pub issuer_name_hash: Vec<u8>,
    pub issuer_key_hash: Vec<u8>,
    pub serial: Vec<u8>,
    pub status: OcspCertStatus,
    pub this_update: Time,
}

#[derive(Clone, Debug)]
pub struct OcspResponseData {
    pub version: OcspVersion,
    pub entries: Vec<OcspResponseEntry>,
    pub nonce: Option<Vec<u8>>,
    pub produced_at: Time,
}

#[derive(Clone, Debug)]
pub struct PkiUserData {
    pub user_id: Vec<u8>,
    pub encrypted_authenticators: Vec<u8>,
}
