//! The attribute store (§4.4): a keyed, ordered collection of
//! certificate and CMS attributes, with a traversal cursor.

use crate::error::{ErrorKind, Result};

/// The closed enumeration of attribute types this core recognises.
/// Certificate extensions and CMS signed/unsigned attributes share one
/// namespace, the way cryptlib's `CRYPT_CERTINFO_*`/`CRYPT_CMSATTRIBUTE_*`
/// values are both drawn from one attribute-type enum.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum AttributeType {
    // Certificate fields / extensions.
    SubjectName,
    IssuerName,
    SerialNumber,
    ValidFrom,
    ValidTo,
    SubjectPublicKeyInfo,
    KeyUsage,
    ExtKeyUsage,
    BasicConstraints,
    SubjectKeyIdentifier,
    AuthorityKeyIdentifier,
    KeyFeatures,
    CrlReason,
    InvalidityDate,
    // CMS signed/unsigned attributes.
    CmsContentType,
    CmsMessageDigest,
    CmsSigningTime,
    CmsSmimeCapabilities,
    CmsNonce,
    CmsTimestamp,
    CmsEssCertId,
    // RTCS / TSP.
    RtcsNonce,
    TspMessageImprint,
    TspPolicyId,
}

/// A single attribute value. CMS/certificate attributes carry either a
/// plain integer, a byte blob, or (for multi-valued attributes such as
/// `extKeyUsage`) a sequence of blobs.
#[derive(Clone, Debug)]
pub enum Value {
    Integer(i64),
    Bytes(Vec<u8>),
    Sequence(Vec<Vec<u8>>),
}

/// One node in the attribute list.
#[derive(Clone, Debug)]
pub struct Attribute {
    pub ty: AttributeType,
    /// An optional sub-field selector (e.g. a specific GeneralName
    /// within `subjectAltName`); `None` selects the whole attribute.
    pub subtype: Option<u32>,
    pub critical: bool,
    pub value: Value,
}

/// Whether an attribute type may appear more than once in a store.
fn is_multivalued(ty: AttributeType) -> bool {
    matches!(ty, AttributeType::ExtKeyUsage | AttributeType::CmsSmimeCapabilities)
}

/// An ordered, keyed collection of attributes with first/next/
/// previous/last traversal.
#[derive(Clone, Debug, Default)]
pub struct AttributeList {
    nodes: Vec<Attribute>,
    cursor: usize,
}

impl AttributeList {
    pub fn new() -> Self {
        AttributeList::default()
    }

    /// Adds an attribute, enforcing per-type cardinality and the
    /// single-valued-replace side-effects §4.4 specifies: adding
    /// `CmsMessageDigest` replaces any existing digest, and adding
    /// `CmsContentType` replaces the current content OID.
    ///
    /// The `CrlReason`/`neverValid` → `InvalidityDate` side effect
    /// §4.4 also names operates on the CRL entry's own typed
    /// `revocation_date`/`invalidity_date` fields, not on attributes
    /// drawn from this store — see
    /// [`crate::cert::preencode::preencode_crl`], which is where that
    /// value actually lives and the only place it needs to.
    pub fn add(&mut self, attr: Attribute) -> Result<()> {
        let single_valued_replace = matches!(
            attr.ty,
            AttributeType::CmsMessageDigest | AttributeType::CmsContentType
        );
        if single_valued_replace {
            self.nodes.retain(|n| n.ty != attr.ty);
        } else if !is_multivalued(attr.ty) && self.find(attr.ty, attr.subtype).is_some() {
            return Err(ErrorKind::Duplicate.into());
        }

        self.nodes.push(attr);
        Ok(())
    }

    pub fn find(&self, ty: AttributeType, subtype: Option<u32>) -> Option<&Attribute> {
        self.nodes
            .iter()
            .find(|n| n.ty == ty && (subtype.is_none() || n.subtype == subtype))
    }

    pub fn find_mut(&mut self, ty: AttributeType, subtype: Option<u32>) -> Option<&mut Attribute> {
        self.nodes
            .iter_mut()
            .find(|n| n.ty == ty && (subtype.is_none() || n.subtype == subtype))
    }

    pub fn find_all(&self, ty: AttributeType) -> impl Iterator<Item = &Attribute> {
        self.nodes.iter().filter(move |n| n.ty == ty)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.nodes.iter()
    }

    // --- Cursor-based traversal, used by the chain writer to walk a
    // certificate's attributes root-to-leaf and by CMS signed-attribute
    // export. ---

    pub fn cursor_first(&mut self) -> Option<&Attribute> {
        if self.nodes.is_empty() {
            return None;
        }
        self.cursor = 0;
        self.nodes.first()
    }

    pub fn cursor_last(&mut self) -> Option<&Attribute> {
        if self.nodes.is_empty() {
            return None;
        }
        self.cursor = self.nodes.len() - 1;
        self.nodes.last()
    }

    pub fn cursor_next(&mut self) -> Option<&Attribute> {
        if self.cursor + 1 >= self.nodes.len() {
            return None;
        }
        self.cursor += 1;
        self.nodes.get(self.cursor)
    }

    pub fn cursor_previous(&mut self) -> Option<&Attribute> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.nodes.get(self.cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_digest_replaces_existing() {
        let mut list = AttributeList::new();
        list.add(Attribute {
            ty: AttributeType::CmsMessageDigest,
            subtype: None,
            critical: false,
            value: Value::Bytes(vec![1, 2, 3]),
        })
        .unwrap();
        list.add(Attribute {
            ty: AttributeType::CmsMessageDigest,
            subtype: None,
            critical: false,
            value: Value::Bytes(vec![4, 5, 6]),
        })
        .unwrap();
        assert_eq!(list.find_all(AttributeType::CmsMessageDigest).count(), 1);
    }

    #[test]
    fn duplicate_single_valued_rejected() {
        let mut list = AttributeList::new();
        list.add(Attribute {
            ty: AttributeType::SubjectKeyIdentifier,
            subtype: None,
            critical: false,
            value: Value::Bytes(vec![0xaa]),
        })
        .unwrap();
        let err = list.add(Attribute {
            ty: AttributeType::SubjectKeyIdentifier,
            subtype: None,
            critical: false,
            value: Value::Bytes(vec![0xbb]),
        });
        assert!(err.is_err());
    }
}
