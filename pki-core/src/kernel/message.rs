//! The closed kernel message set (§4.3).
//!
//! Cryptographic verbs (`encrypt`, `decrypt`, `hash`, `sign`,
//! `sig_check`, `key_generate`, `generate_iv`, `derive_key`) are not
//! modelled as kernel messages here: only context objects carry key
//! material and a backend reference, so they're dispatched as typed
//! methods on `keys::Context` that internally go through
//! [`super::Kernel::with_object`] for the same lock/ACL/signalled
//! handling every other message gets, rather than being boxed into
//! this generic enum. Attribute access, lifecycle and dependent-object
//! messages, which are common to every object kind, live here.

use crate::attribute::{AttributeType, Value};

#[derive(Clone, Debug)]
pub enum Message {
    GetAttribute(AttributeType),
    SetAttribute(AttributeType, Value),
    Compare(AttributeType, Value),
    /// Indirect object creation: "create an object of this kind,
    /// already populated from an external encoding" — modelled by the
    /// higher-level constructors in `cert`/`cms`, not by this enum;
    /// kept here as a marker so the message set documents it exists.
    IndirectCreate,
    CloneObject,
    IncRefCount,
    DecRefCount,
    SetDependent(u32, u32),
    GetDependent,
    Destroy,
}

#[derive(Clone, Debug)]
pub enum MessageResult {
    Unit,
    Attribute(Value),
    Bool(bool),
    Dependent(Option<(u32, u32)>),
    RefCount(u32),
}
