//! The closed error enumeration surfaced through the object kernel.
//!
//! Every status the core can report is one of these variants. New
//! variants are a breaking change, not an oversight — callers (and the
//! kernel's message dispatcher, see [`crate::kernel`]) are expected to
//! match exhaustively rather than against an open, `anyhow`-wrapped
//! error type: §6 asks for "a closed enumeration surfaces through the
//! object kernel".

use crate::attribute::AttributeType;

/// Errors produced anywhere in `pki-core`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}{}", locus.map(|l| format!(" (attribute {l:?})")).unwrap_or_default())]
pub struct Error {
    pub kind: ErrorKind,
    /// The attribute the failure is attributed to, when the failing
    /// operation was scoped to one (envelope and session layers carry
    /// this per §6; most ASN.1/stream-level failures leave it `None`).
    pub locus: Option<AttributeType>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Error { kind, locus: None }
    }

    pub fn at(kind: ErrorKind, locus: AttributeType) -> Self {
        Error {
            kind,
            locus: Some(locus),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// The closed status-code enumeration from §6.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("malformed data")]
    BadData,
    #[error("read past end of data")]
    Underflow,
    #[error("write exceeded available space")]
    Overflow,
    #[error("item not found")]
    NotFound,
    #[error("object not yet initialised")]
    NotInited,
    #[error("object already initialised")]
    Inited,
    #[error("operation not permitted in current object state")]
    Permission,
    #[error("operation timed out")]
    Timeout,
    #[error("signature or MAC verification failed")]
    Signature,
    #[error("wrong key used for cryptographic operation")]
    WrongKey,
    #[error("value is structurally valid but semantically invalid")]
    Invalid,
    #[error("requested facility is not available")]
    NotAvail,
    #[error("out of memory")]
    Memory,
    #[error("open failed")]
    Open,
    #[error("write failed")]
    Write,
    #[error("read failed")]
    Read,
    #[error("object has been destroyed or signalled")]
    Signalled,
    #[error("duplicate entry")]
    Duplicate,
    #[error("internal invariant violated")]
    Internal,
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

impl From<pki_stream::Error> for Error {
    fn from(e: pki_stream::Error) -> Self {
        let kind = match e {
            pki_stream::Error::Overflow => ErrorKind::Overflow,
            pki_stream::Error::Underflow => ErrorKind::Underflow,
            pki_stream::Error::Open => ErrorKind::Open,
            pki_stream::Error::Read => ErrorKind::Read,
            pki_stream::Error::Write => ErrorKind::Write,
        };
        Error::new(kind)
    }
}
