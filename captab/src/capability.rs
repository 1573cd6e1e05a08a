//! The packed `(object pointer, permission bits)` capability value.

use core::ptr::NonNull;

use crate::error::{KernelError, KernelResult};
use crate::object::{ObjectHeader, ObjectKind};

/// Number of low bits reserved for permissions. `ObjectHeader` is at least
/// `usize`-aligned (it embeds an `AtomicUsize`), so this many low bits are
/// always free in a non-null object pointer.
const PERM_BITS: u32 = 3;
const PERM_MASK: usize = (1 << PERM_BITS) - 1;

/// A pointer-width `(object pointer, permission bits)` pair.
///
/// Capabilities are monotonic: a slot holding a non-null capability can
/// only be cleared by publishing a null capability with overriding
/// permission (revocation), never overwritten in place with a different
/// object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Capability(usize);

impl Capability {
    pub const NULL: Capability = Capability(0);

    /// Packs `obj` and `permissions` into a capability. `obj` must be
    /// aligned to at least `2^PERM_BITS`.
    pub fn new(obj: NonNull<ObjectHeader>, permissions: u8) -> Self {
        let ptr = obj.as_ptr() as usize;
        utils::sanity_assert!(ptr & PERM_MASK == 0);
        Capability(ptr | usize::from(permissions))
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    pub fn permissions(self) -> u8 {
        (self.0 & PERM_MASK) as u8
    }

    fn object_ptr(self) -> Option<NonNull<ObjectHeader>> {
        NonNull::new((self.0 & !PERM_MASK) as *mut ObjectHeader)
    }

    /// Rebuilds a capability to the same object with a narrower permission
    /// mask. Used by `delegate()` to carry the masked rights into the
    /// destination space.
    #[must_use]
    pub fn masked(self, mask: u8) -> Self {
        Capability((self.0 & !PERM_MASK) | usize::from(self.permissions() & mask))
    }

    /// Validates that this capability is non-null, of kind `kind`, and
    /// holds at least `required` permission bits, per spec's
    /// `obj != null && obj.kind == expected && (prm & req) == req`.
    pub fn validate(self, kind: ObjectKind, required: u8) -> KernelResult<NonNull<ObjectHeader>> {
        let ptr = self.object_ptr().ok_or(KernelError::BadCap)?;
        let header = unsafe { ptr.as_ref() };

        if header.kind() != kind {
            return Err(KernelError::BadCap);
        }

        let held = self.permissions();
        if (held & required) != required {
            return Err(KernelError::BadCap);
        }

        Ok(ptr)
    }
}

impl Default for Capability {
    fn default() -> Self {
        Self::NULL
    }
}

/// Per-object-kind permission bit layouts. Each kind only interprets the
/// bits it defines; a capability's kind tag already disambiguates which
/// table applies, so the numeric values are free to overlap across kinds.
pub mod perm {
    pub const PD: u8 = 1 << 0;
    pub const EC: u8 = 1 << 1;
    pub const SC: u8 = 1 << 2;
    pub const PT: u8 = 1 << 3;
    pub const SM: u8 = 1 << 4;

    /// PT permissions.
    pub const CALL: u8 = 1 << 0;
    pub const EVENT: u8 = 1 << 1;

    /// SM permissions.
    pub const CTRL_UP: u8 = 1 << 0;
    pub const CTRL_DOWN: u8 = 1 << 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectHeader;

    #[test]
    fn null_capability_is_zero() {
        assert!(Capability::NULL.is_null());
        assert_eq!(Capability::NULL.permissions(), 0);
    }

    #[test]
    fn validate_rejects_wrong_kind() {
        let header = ObjectHeader::new(ObjectKind::Ec);
        let ptr = NonNull::from(&header);
        let cap = Capability::new(ptr, perm::EC);

        assert_eq!(
            cap.validate(ObjectKind::Pd, perm::EC),
            Err(KernelError::BadCap)
        );
        assert!(cap.validate(ObjectKind::Ec, perm::EC).is_ok());
    }

    #[test]
    fn validate_rejects_missing_permission() {
        let header = ObjectHeader::new(ObjectKind::Sm);
        let ptr = NonNull::from(&header);
        let cap = Capability::new(ptr, perm::CTRL_UP);

        assert_eq!(
            cap.validate(ObjectKind::Sm, perm::CTRL_DOWN),
            Err(KernelError::BadCap)
        );
    }

    #[test]
    fn masked_narrows_permissions_only() {
        let header = ObjectHeader::new(ObjectKind::Sm);
        let ptr = NonNull::from(&header);
        let cap = Capability::new(ptr, perm::CTRL_UP | perm::CTRL_DOWN);

        let narrowed = cap.masked(perm::CTRL_UP);
        assert_eq!(narrowed.permissions(), perm::CTRL_UP);
    }
}
