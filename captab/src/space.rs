//! A PD's object space: the capability table itself.

use utils::collections::id::Id;
use utils::sync::spinlock::{SpinLock, SpinLockGuard, SpinLockable};

use alloc::vec::Vec;

use crate::capability::Capability;
use crate::error::{KernelError, KernelResult};

/// Maps a selector to a [`Capability`]. Growable: a selector beyond the
/// current length is backed lazily on first publish.
pub struct ObjSpace {
    slots: SpinLock<Slots>,
}

struct Slots(Vec<Capability>);

impl SpinLockable for Slots {}

impl ObjSpace {
    pub fn new() -> Self {
        Self {
            slots: SpinLock::new(Slots(Vec::new())),
        }
    }

    fn lock(&self) -> SpinLockGuard<'_, Slots> {
        self.slots.lock()
    }

    /// Reads the capability at `sel`, or the null capability if `sel` has
    /// never been published to.
    pub fn lookup(&self, sel: Id) -> Capability {
        let slots = self.lock();
        slots.0.get(sel.0).copied().unwrap_or(Capability::NULL)
    }

    /// Publishes `cap` at `sel`. Fails with `BadCap` if a non-null
    /// capability already occupies the slot — capabilities are monotonic,
    /// they are never overwritten in place.
    pub fn publish(&self, sel: Id, cap: Capability) -> KernelResult<()> {
        let mut slots = self.lock();
        if sel.0 >= slots.0.len() {
            slots.0.resize(sel.0 + 1, Capability::NULL);
        }

        if !slots.0[sel.0].is_null() {
            return Err(KernelError::BadCap);
        }

        slots.0[sel.0] = cap;
        Ok(())
    }

    /// Revokes the capability at `sel` by publishing a null capability in
    /// its place, regardless of what is currently there.
    pub fn revoke(&self, sel: Id) {
        let mut slots = self.lock();
        if sel.0 < slots.0.len() {
            slots.0[sel.0] = Capability::NULL;
        }
    }

    /// Copies a power-of-two range `[src_base, src_base + 2^order)` of
    /// `src`'s slots into `dst` at `dst_base`, masking permissions by
    /// `permission_mask`. Object-space delegation carries no
    /// shareability/cacheability attributes (those are specific to memory
    /// spaces); see `memspace::space::Space::delegate` for the variant that
    /// also threads those attributes through.
    pub fn delegate(
        src: &ObjSpace,
        dst: &ObjSpace,
        src_base: Id,
        dst_base: Id,
        order: u32,
        permission_mask: u8,
    ) -> KernelResult<()> {
        let count = 1usize << order;
        if src_base.0 & (count - 1) != 0 || dst_base.0 & (count - 1) != 0 {
            return Err(KernelError::BadPar);
        }

        for i in 0..count {
            let src_sel = Id(src_base.0 + i);
            let dst_sel = Id(dst_base.0 + i);

            let cap = src.lookup(src_sel);
            if cap.is_null() {
                continue;
            }

            dst.publish(dst_sel, cap.masked(permission_mask))?;
        }

        Ok(())
    }
}

impl Default for ObjSpace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::perm;
    use crate::object::{ObjectHeader, ObjectKind};
    use alloc::boxed::Box;
    use core::ptr::NonNull;

    #[test]
    fn publish_then_lookup() {
        let space = ObjSpace::new();
        let header = Box::leak(Box::new(ObjectHeader::new(ObjectKind::Sm)));
        let cap = Capability::new(NonNull::from(&*header), perm::CTRL_UP);

        space.publish(Id(3), cap).unwrap();
        assert_eq!(space.lookup(Id(3)), cap);
        assert!(space.lookup(Id(0)).is_null());
    }

    #[test]
    fn publish_rejects_collision() {
        let space = ObjSpace::new();
        let header = Box::leak(Box::new(ObjectHeader::new(ObjectKind::Sm)));
        let cap = Capability::new(NonNull::from(&*header), perm::CTRL_UP);

        space.publish(Id(0), cap).unwrap();
        assert_eq!(space.publish(Id(0), cap), Err(KernelError::BadCap));
    }

    #[test]
    fn revoke_then_republish() {
        let space = ObjSpace::new();
        let header = Box::leak(Box::new(ObjectHeader::new(ObjectKind::Sm)));
        let cap = Capability::new(NonNull::from(&*header), perm::CTRL_UP);

        space.publish(Id(0), cap).unwrap();
        space.revoke(Id(0));
        assert!(space.lookup(Id(0)).is_null());
        space.publish(Id(0), cap).unwrap();
    }

    #[test]
    fn delegate_masks_permissions() {
        let src = ObjSpace::new();
        let dst = ObjSpace::new();
        let header = Box::leak(Box::new(ObjectHeader::new(ObjectKind::Sm)));
        let cap = Capability::new(NonNull::from(&*header), perm::CTRL_UP | perm::CTRL_DOWN);

        src.publish(Id(0), cap).unwrap();
        ObjSpace::delegate(&src, &dst, Id(0), Id(4), 0, perm::CTRL_UP).unwrap();

        assert_eq!(dst.lookup(Id(4)).permissions(), perm::CTRL_UP);
    }

    #[test]
    fn delegate_rejects_misaligned_range() {
        let src = ObjSpace::new();
        let dst = ObjSpace::new();
        assert_eq!(
            ObjSpace::delegate(&src, &dst, Id(1), Id(0), 1, perm::CTRL_UP),
            Err(KernelError::BadPar)
        );
    }
}
