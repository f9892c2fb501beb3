//! Kernel object metadata (§3 `Object`, §4.3).

use std::thread::ThreadId;

use super::lock::ObjectLock;
use crate::attribute::{AttributeList, AttributeType};

/// The object type tag carried by every kernel object.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ObjectKind {
    Context,
    Certificate,
    Envelope,
    Keyset,
    Session,
    Device,
    User,
}

/// An object's finalisation state. A "high"-state object (keyed,
/// signed or otherwise finalised) rejects attribute sets that would
/// violate its finalised contents (§3 `Object` invariant).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ObjectState {
    Low,
    High,
}

/// Per-attribute access control: whether the attribute may be touched
/// by an external caller at all, and whether it may be written once
/// the object has reached the `High` state.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct AttributeAcl {
    pub external_read: bool,
    pub external_write: bool,
    /// If `true`, a write is rejected once the object is `High`.
    pub locked_when_high: bool,
}

impl AttributeAcl {
    pub const READ_WRITE: AttributeAcl = AttributeAcl {
        external_read: true,
        external_write: true,
        locked_when_high: true,
    };
    pub const READ_ONLY: AttributeAcl = AttributeAcl {
        external_read: true,
        external_write: false,
        locked_when_high: false,
    };
    pub const INTERNAL_ONLY: AttributeAcl = AttributeAcl {
        external_read: false,
        external_write: false,
        locked_when_high: true,
    };
}

/// The behaviour a type must provide to live inside the kernel arena.
/// Certificate, context, envelope, session and keyset payloads each
/// implement this once; the kernel handles reference counting,
/// locking, dependent-object chains and the destroyed/signalled check
/// uniformly regardless of payload type.
pub trait KernelObject {
    fn kind(&self) -> ObjectKind;
    fn state(&self) -> ObjectState;
    fn attributes(&self) -> &AttributeList;
    fn attributes_mut(&mut self) -> &mut AttributeList;
    fn acl(&self, ty: AttributeType) -> AttributeAcl;
}

/// A kernel-managed object and its bookkeeping.
pub(crate) struct Slot<T> {
    pub(crate) generation: u32,
    pub(crate) entry: Option<Entry<T>>,
}

pub(crate) struct Entry<T> {
    pub(crate) kind: ObjectKind,
    pub(crate) data: T,
    pub(crate) ref_count: u32,
    pub(crate) owner_thread: ThreadId,
    pub(crate) lock: ObjectLock,
    /// A raw (untyped) index of a dependent object — a certificate's
    /// context, a context's device, a chain's member certificates —
    /// resolved back through the same arena's generation check.
    pub(crate) dependents: Vec<(u32, u32)>,
    pub(crate) destroyed: bool,
}

impl<T> Slot<T> {
    pub(crate) fn empty(generation: u32) -> Self {
        Slot {
            generation,
            entry: None,
        }
    }
}
