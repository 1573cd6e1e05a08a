//! Protection domain: an object-capability space plus the device identity
//! used to tag IOMMU/TLB shootdown requests.
//!
//! Host/guest/DMA/pio/msr memory-space delegation lives in the `memspace`
//! crate; a `Pd` only carries what the capability layer itself needs.

use alloc::boxed::Box;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};

use slab::{SlabAllocatable, SlabAllocator};
use utils::collections::id::Id;

use crate::capability::{Capability, perm};
use crate::error::{KernelError, KernelResult};
use crate::object::{ObjectHeader, ObjectKind};
use crate::space::ObjSpace;

/// Sentinel `device_id` meaning "no device assigned".
const NO_DEVICE: usize = usize::MAX;

#[repr(C)]
pub struct Pd {
    header: ObjectHeader,
    pub obj_space: ObjSpace,
    device_id: AtomicUsize,
}

impl SlabAllocatable for Pd {}

static PD_SLAB: SlabAllocator<Pd> = SlabAllocator::new();

impl Pd {
    pub(crate) fn new() -> Self {
        Self {
            header: ObjectHeader::new(ObjectKind::Pd),
            obj_space: ObjSpace::new(),
            device_id: AtomicUsize::new(NO_DEVICE),
        }
    }

    pub fn device_id(&self) -> Option<usize> {
        match self.device_id.load(Ordering::Acquire) {
            NO_DEVICE => None,
            id => Some(id),
        }
    }

    /// Binds a device identifier to this PD. Overwriting an existing
    /// binding is a caller error; the IOMMU domain layout is fixed at
    /// device-assignment time.
    pub fn assign_device(&self, device_id: usize) -> KernelResult<()> {
        self.device_id
            .compare_exchange(
                NO_DEVICE,
                device_id,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|_| KernelError::BadDev)
    }

    pub fn header(&self) -> &ObjectHeader {
        &self.header
    }

    /// Builds the root PD directly, bypassing `create_pd`. There is no
    /// capability to present for the very first PD; the boot-time
    /// bootstrap calls this once to seed the root object space, and every
    /// other PD descends from it through `create_pd`.
    #[must_use]
    pub fn bootstrap_root() -> Self {
        Self::new()
    }
}

/// Creates a new, empty PD and publishes a capability to it at `dst_sel`
/// in `requestor`'s own object space.
///
/// Follows the four-step protocol shared by every kernel-object factory:
/// the destination selector must be free, the requestor must hold a
/// capability proving it may create PDs, the slab must have room, and
/// publishing must not race another creator into the same slot.
pub fn create_pd(requestor: &Pd, requestor_sel: Id, dst_sel: Id) -> KernelResult<()> {
    if !requestor.obj_space.lookup(dst_sel).is_null() {
        return Err(KernelError::BadCap);
    }

    requestor
        .obj_space
        .lookup(requestor_sel)
        .validate(ObjectKind::Pd, perm::PD)?;

    let boxed = Box::try_new_in(Pd::new(), &PD_SLAB).map_err(|_| KernelError::MemObj)?;
    let ptr = NonNull::from(Box::leak(boxed));

    let cap = Capability::new(ptr.cast(), perm::PD);
    requestor.obj_space.publish(dst_sel, cap)?;
    logger::debug!("captab: created PD at sel {}", dst_sel.0);
    Ok(())
}

/// Queues the last reference to a PD for RCU-deferred return to the slab.
///
/// # Safety
/// `ptr` must point at a `Pd` allocated by [`create_pd`] whose refcount has
/// just reached zero via [`ObjectHeader::release`].
pub unsafe fn destroy_pd(ptr: NonNull<Pd>) {
    struct SendPtr(NonNull<Pd>);
    unsafe impl Send for SendPtr {}
    let ptr = SendPtr(ptr);

    crate::rcu::defer(move || {
        drop(unsafe { Box::from_raw_in(ptr.0.as_ptr(), &PD_SLAB) });
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_pd_rejects_occupied_slot() {
        let root = Pd::new();
        let header = Box::leak(Box::new(ObjectHeader::new(ObjectKind::Pd)));
        let cap = Capability::new(NonNull::from(&*header), perm::PD);
        root.obj_space.publish(Id(0), cap).unwrap();

        assert_eq!(
            create_pd(&root, Id(0), Id(0)),
            Err(KernelError::BadCap)
        );
    }

    #[test]
    fn create_pd_rejects_missing_permission() {
        let root = Pd::new();
        let header = Box::leak(Box::new(ObjectHeader::new(ObjectKind::Sm)));
        let cap = Capability::new(NonNull::from(&*header), perm::CTRL_UP);
        root.obj_space.publish(Id(5), cap).unwrap();

        assert_eq!(
            create_pd(&root, Id(5), Id(1)),
            Err(KernelError::BadCap)
        );
    }

    #[test]
    fn assign_device_once() {
        let pd = Pd::new();
        assert_eq!(pd.device_id(), None);
        pd.assign_device(7).unwrap();
        assert_eq!(pd.device_id(), Some(7));
        assert_eq!(pd.assign_device(8), Err(KernelError::BadDev));
    }
}
