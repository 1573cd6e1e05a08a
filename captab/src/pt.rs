//! Portal: an IPC entry point. A `call()` through a portal transfers
//! control to its target local EC at its entry IP, carrying the registers
//! selected by its MTD.

use alloc::boxed::Box;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};

use slab::{SlabAllocatable, SlabAllocator};
use utils::collections::id::Id;

use crate::capability::{Capability, perm};
use crate::ec::Ec;
use crate::error::{KernelError, KernelResult};
use crate::object::{ObjectHeader, ObjectKind};
use crate::pd::Pd;

#[repr(C)]
pub struct Pt {
    header: ObjectHeader,
    pub ec: NonNull<Ec>,
    entry_ip: AtomicUsize,
    mtd: AtomicUsize,
    badge: AtomicUsize,
}

unsafe impl Send for Pt {}
unsafe impl Sync for Pt {}

impl SlabAllocatable for Pt {}

static PT_SLAB: SlabAllocator<Pt> = SlabAllocator::new();

impl Pt {
    fn new(ec: NonNull<Ec>, entry_ip: usize, mtd: usize) -> Self {
        Self {
            header: ObjectHeader::new(ObjectKind::Pt),
            ec,
            entry_ip: AtomicUsize::new(entry_ip),
            mtd: AtomicUsize::new(mtd),
            badge: AtomicUsize::new(0),
        }
    }

    pub fn header(&self) -> &ObjectHeader {
        &self.header
    }

    pub fn entry_ip(&self) -> usize {
        self.entry_ip.load(Ordering::Acquire)
    }

    pub fn mtd(&self) -> usize {
        self.mtd.load(Ordering::Acquire)
    }

    /// Reconfigures the entry point and transfer descriptor. Corresponds
    /// to the control-portal syscall; only the portal's owner may call
    /// this, enforced by the `CTRL_UP` permission check at the syscall
    /// layer.
    pub fn reconfigure(&self, entry_ip: usize, mtd: usize) {
        self.entry_ip.store(entry_ip, Ordering::Release);
        self.mtd.store(mtd, Ordering::Release);
    }

    pub fn badge(&self) -> usize {
        self.badge.load(Ordering::Acquire)
    }

    pub fn set_badge(&self, badge: usize) {
        self.badge.store(badge, Ordering::Release);
    }
}

/// Creates a portal targeting `ec` (referenced through `ec_sel`) with the
/// given entry IP and MTD, and publishes a capability to it at `dst_sel`.
pub fn create_pt(
    requestor: &Pd,
    requestor_sel: Id,
    ec_sel: Id,
    dst_sel: Id,
    entry_ip: usize,
    mtd: usize,
) -> KernelResult<()> {
    if !requestor.obj_space.lookup(dst_sel).is_null() {
        return Err(KernelError::BadCap);
    }

    requestor
        .obj_space
        .lookup(requestor_sel)
        .validate(ObjectKind::Pd, perm::PD)?;

    let ec_header = requestor
        .obj_space
        .lookup(ec_sel)
        .validate(ObjectKind::Ec, perm::EC)?;
    let ec = ec_header.cast::<Ec>();

    let boxed =
        Box::try_new_in(Pt::new(ec, entry_ip, mtd), &PT_SLAB).map_err(|_| KernelError::MemObj)?;
    let ptr = NonNull::from(Box::leak(boxed));

    let cap = Capability::new(ptr.cast(), perm::CALL | perm::EVENT);
    requestor.obj_space.publish(dst_sel, cap)?;
    logger::debug!("captab: created PT at sel {} (entry {entry_ip:#x})", dst_sel.0);
    Ok(())
}

/// # Safety
/// `ptr` must point at a `Pt` allocated by [`create_pt`] whose refcount
/// has just reached zero.
pub unsafe fn destroy_pt(ptr: NonNull<Pt>) {
    struct SendPtr(NonNull<Pt>);
    unsafe impl Send for SendPtr {}
    let ptr = SendPtr(ptr);

    crate::rcu::defer(move || {
        drop(unsafe { Box::from_raw_in(ptr.0.as_ptr(), &PT_SLAB) });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::EcSubKind;

    fn dummy_ec() -> NonNull<Ec> {
        let pd = NonNull::from(Box::leak(Box::new(Pd::new())));
        let ec = Box::leak(Box::new(Ec::new(pd, EcSubKind::Local, 0, None)));
        NonNull::from(ec)
    }

    #[test]
    fn reconfigure_updates_entry_and_mtd() {
        let pt = Pt::new(dummy_ec(), 0x1000, 0);
        assert_eq!(pt.entry_ip(), 0x1000);

        pt.reconfigure(0x2000, 0xff);
        assert_eq!(pt.entry_ip(), 0x2000);
        assert_eq!(pt.mtd(), 0xff);
    }

    #[test]
    fn badge_roundtrip() {
        let pt = Pt::new(dummy_ec(), 0, 0);
        assert_eq!(pt.badge(), 0);
        pt.set_badge(0xdead);
        assert_eq!(pt.badge(), 0xdead);
    }
}
