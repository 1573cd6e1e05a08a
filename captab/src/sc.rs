//! Scheduling context: the right to run an EC for a bounded budget at a
//! given priority. Queue membership (which per-CPU ready list an SC sits
//! in) is owned by the scheduler, not here.

use alloc::boxed::Box;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use slab::{SlabAllocatable, SlabAllocator};
use utils::collections::id::Id;

use crate::capability::{Capability, perm};
use crate::ec::Ec;
use crate::error::{KernelError, KernelResult};
use crate::object::{ObjectHeader, ObjectKind};
use crate::pd::Pd;

/// Number of distinct priority levels, matching the per-CPU ready-queue
/// array size.
pub const PRIORITY_LEVELS: u8 = 128;

#[repr(C)]
pub struct Sc {
    header: ObjectHeader,
    pub ec: NonNull<Ec>,
    cpu: AtomicUsize,
    pub priority: u8,
    /// Ticks granted per quantum.
    pub budget: u64,
    remaining: AtomicU64,
    last_dispatch: AtomicU64,
}

unsafe impl Send for Sc {}
unsafe impl Sync for Sc {}

impl SlabAllocatable for Sc {}

static SC_SLAB: SlabAllocator<Sc> = SlabAllocator::new();

impl Sc {
    fn new(ec: NonNull<Ec>, cpu: usize, priority: u8, budget: u64) -> Self {
        Self {
            header: ObjectHeader::new(ObjectKind::Sc),
            ec,
            cpu: AtomicUsize::new(cpu),
            priority,
            budget,
            remaining: AtomicU64::new(budget),
            last_dispatch: AtomicU64::new(0),
        }
    }

    pub fn header(&self) -> &ObjectHeader {
        &self.header
    }

    pub fn cpu(&self) -> usize {
        self.cpu.load(Ordering::Acquire)
    }

    /// Rebinds this SC to `cpu`. Only valid while the SC is not enqueued
    /// anywhere; the scheduler's migration path dequeues first.
    pub fn migrate_to(&self, cpu: usize) {
        self.cpu.store(cpu, Ordering::Release);
    }

    pub fn remaining(&self) -> u64 {
        self.remaining.load(Ordering::Acquire)
    }

    /// Consumes up to `ticks` of the current quantum, returning the ticks
    /// actually charged. Never returns more than was remaining.
    pub fn charge(&self, ticks: u64) -> u64 {
        let prev = self.remaining.fetch_update(Ordering::AcqRel, Ordering::Acquire, |r| {
            Some(r.saturating_sub(ticks))
        });
        let before = prev.unwrap_or(0);
        before - before.saturating_sub(ticks)
    }

    pub fn exhausted(&self) -> bool {
        self.remaining() == 0
    }

    pub fn refill(&self) {
        self.remaining.store(self.budget, Ordering::Release);
    }

    pub fn set_last_dispatch(&self, tick: u64) {
        self.last_dispatch.store(tick, Ordering::Release);
    }

    pub fn last_dispatch(&self) -> u64 {
        self.last_dispatch.load(Ordering::Acquire)
    }
}

/// Creates an SC bound to `ec` (referenced through `ec_sel`) running on
/// `cpu` at `priority` with `budget` ticks per quantum.
pub fn create_sc(
    requestor: &Pd,
    requestor_sel: Id,
    ec_sel: Id,
    dst_sel: Id,
    cpu: usize,
    priority: u8,
    budget: u64,
) -> KernelResult<()> {
    if priority == 0 || priority >= PRIORITY_LEVELS || budget == 0 {
        return Err(KernelError::BadPar);
    }

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
        Box::try_new_in(Sc::new(ec, cpu, priority, budget), &SC_SLAB).map_err(|_| KernelError::MemObj)?;
    let ptr = NonNull::from(Box::leak(boxed));

    let cap = Capability::new(ptr.cast(), perm::SC);
    requestor.obj_space.publish(dst_sel, cap)?;
    logger::debug!("captab: created SC at sel {} (cpu {cpu}, prio {priority})", dst_sel.0);
    Ok(())
}

/// # Safety
/// `ptr` must point at an `Sc` allocated by [`create_sc`] whose refcount
/// has just reached zero, and it must not be enqueued in any scheduler
/// ready list.
pub unsafe fn destroy_sc(ptr: NonNull<Sc>) {
    struct SendPtr(NonNull<Sc>);
    unsafe impl Send for SendPtr {}
    let ptr = SendPtr(ptr);

    crate::rcu::defer(move || {
        drop(unsafe { Box::from_raw_in(ptr.0.as_ptr(), &SC_SLAB) });
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
    fn create_sc_rejects_bad_priority() {
        let root = Pd::new();
        let header = Box::leak(Box::new(ObjectHeader::new(ObjectKind::Pd)));
        let cap = Capability::new(NonNull::from(&*header), perm::PD);
        root.obj_space.publish(Id(0), cap).unwrap();

        assert_eq!(
            create_sc(&root, Id(0), Id(1), Id(2), 0, PRIORITY_LEVELS, 10_000),
            Err(KernelError::BadPar)
        );
        assert_eq!(
            create_sc(&root, Id(0), Id(1), Id(2), 0, 0, 10_000),
            Err(KernelError::BadPar)
        );
        assert_eq!(
            create_sc(&root, Id(0), Id(1), Id(2), 0, 32, 0),
            Err(KernelError::BadPar)
        );
    }

    #[test]
    fn budget_charge_and_refill() {
        let ec = dummy_ec();
        let sc = Sc::new(ec, 0, 64, 1000);

        assert_eq!(sc.charge(400), 400);
        assert_eq!(sc.remaining(), 600);
        assert!(!sc.exhausted());

        sc.charge(600);
        assert!(sc.exhausted());

        sc.refill();
        assert_eq!(sc.remaining(), 1000);
    }

    #[test]
    fn charge_never_overdraws() {
        let ec = dummy_ec();
        let sc = Sc::new(ec, 0, 64, 100);

        assert_eq!(sc.charge(500), 100);
        assert_eq!(sc.remaining(), 0);
    }
}
