//! The tagged kernel-object header shared by PD, EC, SC, PT and SM.
//!
//! The original implementation dispatches across object kinds through a
//! C++ inheritance chain and `static_cast`. Rust has no such chain, so every
//! concrete object embeds an [`ObjectHeader`] as its first field and a
//! [`Capability`](crate::capability::Capability) carries the kind it was
//! validated against; typed access goes through `as_*` views that check the
//! tag before casting.

use core::sync::atomic::{AtomicUsize, Ordering};

/// The five kernel object kinds. `Ec` additionally carries a sub-kind,
/// recorded on the concrete `Ec` struct rather than here, since the tag only
/// needs to distinguish what a capability may be cast to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ObjectKind {
    Pd = 0,
    Ec = 1,
    Sc = 2,
    Pt = 3,
    Sm = 4,
}

/// Local/global/vCPU distinction for an EC. Kept on the concrete object,
/// not the header, since only EC code needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcSubKind {
    Local,
    Global,
    Vcpu,
}

/// Common prefix of every kernel object.
///
/// The refcount is released by `release()`; the object is only actually
/// freed (back to its slab, via RCU) when it reaches zero. Kernel code that
/// walks a list under a lock may safely dereference a header whose refcount
/// it has not itself bumped, as long as it never outlives the lock.
#[derive(Debug)]
pub struct ObjectHeader {
    kind: ObjectKind,
    refcount: AtomicUsize,
}

impl ObjectHeader {
    pub const fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            refcount: AtomicUsize::new(1),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Bumps the refcount. Called whenever a new capability to this object
    /// is published.
    pub fn acquire(&self) {
        self.refcount.fetch_add(1, Ordering::Relaxed);
    }

    /// Drops one reference, returning `true` if this was the last one and
    /// the caller must now run the object's RCU-deferred destructor.
    #[must_use]
    pub fn release(&self) -> bool {
        self.refcount.fetch_sub(1, Ordering::AcqRel) == 1
    }
}
