//! The certificate writer family (§4.6): data types, pre-encode side
//! effects, and the two-pass DER writers, for every object type the
//! certificate management layer produces.

pub mod preencode;
pub mod types;
pub mod write;

pub use types::{
    AttributeCertificateData, CertRequestData, CertificateData, CrlData, CrlEntry, CrlReason,
    CrmfRequestData, Extension, Name, OcspCertStatus, OcspRequestData, OcspRequestEntry,
    OcspResponseData, OcspResponseEntry, OcspVersion, PkiUserData, RevocationRequestData,
    RtcsRequestData, RtcsRequestEntry, RtcsResponseData, RtcsResponseEntry, RtcsStatus, Time,
    Validity,
};
