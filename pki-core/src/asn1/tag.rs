//! ASN.1 tag octets.

/// The four tag classes a BER/DER tag octet can carry.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum Class {
    Universal = 0,
    Application = 1,
    Context = 2,
    Private = 3,
}

impl Class {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Class::Universal,
            1 => Class::Application,
            2 => Class::Context,
            _ => Class::Private,
        }
    }
}

/// A parsed tag: class, constructed-vs-primitive bit, and tag number.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Tag {
    pub class: Class,
    pub constructed: bool,
    pub number: u32,
}

impl Tag {
    pub const fn universal(number: u32, constructed: bool) -> Self {
        Tag {
            class: Class::Universal,
            constructed,
            number,
        }
    }

    pub const fn context(number: u32, constructed: bool) -> Self {
        Tag {
            class: Class::Context,
            constructed,
            number,
        }
    }

    /// The single EOC octet pair (`0x00 0x00`) that terminates an
    /// indefinite-length value is not itself a tagged value in the
    /// usual sense, but the reader needs to recognise its lead byte.
    pub const EOC: Tag = Tag::universal(0, false);
    pub const BOOLEAN: Tag = Tag::universal(1, false);
    pub const INTEGER: Tag = Tag::universal(2, false);
    pub const BIT_STRING: Tag = Tag::universal(3, false);
    pub const BIT_STRING_C: Tag = Tag::universal(3, true);
    pub const OCTET_STRING: Tag = Tag::universal(4, false);
    pub const OCTET_STRING_C: Tag = Tag::universal(4, true);
    pub const NULL: Tag = Tag::universal(5, false);
    pub const OID: Tag = Tag::universal(6, false);
    pub const ENUMERATED: Tag = Tag::universal(10, false);
    pub const UTF8_STRING: Tag = Tag::universal(12, false);
    pub const SEQUENCE: Tag = Tag::universal(16, true);
    pub const SET: Tag = Tag::universal(17, true);
    pub const PRINTABLE_STRING: Tag = Tag::universal(19, false);
    pub const TELETEX_STRING: Tag = Tag::universal(20, false);
    pub const IA5_STRING: Tag = Tag::universal(22, false);
    pub const UTC_TIME: Tag = Tag::universal(23, false);
    pub const GENERALIZED_TIME: Tag = Tag::universal(24, false);

    /// A constructed, context-tagged `[n]` with IMPLICIT tagging — the
    /// shape used throughout X.509/CMS for `[0] IMPLICIT SEQUENCE …`
    /// style fields, as opposed to `[n] EXPLICIT` which simply wraps an
    /// ordinary tagged value in another layer of context tag.
    pub const fn implicit(number: u32, constructed: bool) -> Self {
        Tag::context(number, constructed)
    }

    pub fn is_eoc(&self) -> bool {
        self.class == Class::Universal && self.number == 0 && !self.constructed
    }
}
