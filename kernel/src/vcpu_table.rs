//! Bridges a vCPU `captab::ec::Ec` to the `hypervisor::svm::Vmcb` control
//! block backing it, the same way `pd_table` bridges a `Pd` to its memory
//! spaces: `captab` and `hypervisor` never depend on each other, so the
//! kernel crate that composes them owns the link.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use core::ptr::NonNull;

use captab::ec::Ec;
use hypervisor::Vesselable;
use hypervisor::svm::Vmcb;
use utils::sync::spinlock::{SpinLock, SpinLockable};

struct Table(BTreeMap<usize, Box<Vmcb, &'static slab::SlabAllocator<Vmcb>>>);
impl SpinLockable for Table {}

static VCPU_TABLE: SpinLock<Table> = SpinLock::new(Table(BTreeMap::new()));

fn key(ec: NonNull<Ec>) -> usize {
    ec.as_ptr().addr()
}

/// Allocates a `Vmcb` for a freshly created vCPU EC. Called once by the
/// `create_ec` syscall handler right after `captab::ec::create_ec`
/// publishes the capability with `sub_kind == Vcpu`.
pub fn register(ec: NonNull<Ec>, guest_rip: usize) {
    let vmcb = Vmcb::new(ec, guest_rip);
    VCPU_TABLE.lock().0.insert(key(ec), vmcb);
}

pub fn unregister(ec: NonNull<Ec>) {
    VCPU_TABLE.lock().0.remove(&key(ec));
}

/// Runs `f` against `ec`'s `Vmcb` under the table lock. `None` if `ec` was
/// never registered as a vCPU (a plain local/global EC, or a vCPU whose
/// `create_ec` call raced a concurrent teardown).
pub fn with_vmcb<R>(ec: NonNull<Ec>, f: impl FnOnce(&mut Vmcb) -> R) -> Option<R> {
    let mut table = VCPU_TABLE.lock();
    table.0.get_mut(&key(ec)).map(|vmcb| f(vmcb))
}
