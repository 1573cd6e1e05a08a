//! Virtualization engine (spec §4.G): a vCPU EC's control block lifecycle,
//! world-switch, and the VM-exit -> synthetic-exception translation that
//! feeds the normal upcall machinery.
//!
//! Like the rest of the workspace (`captab::sm`, `ipc::engine`,
//! `scheduler`), this crate reports outcomes instead of acting on them:
//! `Vesselable::enter` never touches the IPC upcall path or the interrupt
//! controller, it returns a [`VmExit`] and leaves dispatch to the `kernel`
//! crate, which owns the trap/syscall machinery those vectors feed into.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod mem;
pub mod svm;

use alloc::boxed::Box;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};

use captab::ec::Ec;
use slab::SlabAllocator;
use utils::MAX_CPUS;

/// What a VMEXIT/world-switch boils down to, per spec §4.G's exit-class
/// table. Everything but the first three is handled by the upcall path;
/// those three are resolved in-kernel and never reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmExit {
    /// Handled in-kernel; not upcalled.
    ExternalInterrupt,
    /// Handled in-kernel.
    Nmi,
    /// FPU owner switch; not upcalled.
    FpuTrap,
    /// Upcall with QUAL = fault address.
    NestedPageFault { gpa: usize },
    /// Upcall with a dedicated selector.
    InvalidState,
    /// Upcall with selector = exit reason.
    Other { selector: u64 },
}

/// A per-vCPU hardware virtualization control block (VMCB on AMD, VMCS on
/// Intel, a synthetic EL1/EL2 shadow-register block on ARM) bound to
/// exactly one vCPU EC for its entire lifetime.
pub trait Vesselable: Sized {
    /// Allocates and initializes a control block for `ec`, whose guest
    /// instruction pointer starts at `rip`.
    fn new(ec: NonNull<Ec>, rip: usize) -> Box<Self, &'static SlabAllocator<Self>>;

    /// The vCPU EC this control block belongs to.
    fn ec(&self) -> NonNull<Ec>;

    /// World-switches in, runs until the hardware takes it back out, and
    /// reports why. Performs the full entry/exit register save-restore
    /// described in spec §4.G, deciding from [`world_switch_kind`] whether
    /// this entry needs a full guest register load or just an
    /// interrupt-controller state restore.
    fn enter(&mut self) -> VmExit;
}

/// One backend's identity (AMD-V/SVM today; Intel VT-x or ARM EL2 would be
/// siblings, never both compiled in at once per spec's single-architecture
/// resolution).
pub trait VirtTech {
    type VesselControlBlock: Vesselable;

    /// One-time, per-CPU enablement: turn on hardware support, set up the
    /// host save area and ASID/VMID allocator.
    fn start();
}

/// Whether a world-switch entry needs the full guest register set loaded
/// or just the interrupt-controller active-state restored (spec §4.G
/// *Entry*: "if the current CPU's active guest block differs from this
/// vCPU's... otherwise restore only interrupt-controller active-state").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldSwitchKind {
    Full,
    ActiveStateOnly,
}

/// Tracks, per physical CPU, the identity of the vessel control block
/// currently loaded there, so `world_switch_kind` can tell a same-vessel
/// re-entry from a switch to a different vCPU. Identity is the vessel's
/// own address; `0` means nothing is loaded yet.
struct ActiveVessel(AtomicUsize);

impl ActiveVessel {
    const fn new() -> Self {
        Self(AtomicUsize::new(0))
    }
}

static ACTIVE_VESSEL: [ActiveVessel; MAX_CPUS] = [const { ActiveVessel::new() }; MAX_CPUS];

/// Decides the world-switch kind for entering `vessel` on `cpu`, and
/// records `vessel` as the CPU's active one. Call once per entry, before
/// the hardware VMRUN/VMLAUNCH-equivalent instruction.
#[must_use]
pub fn world_switch_kind<T>(cpu: usize, vessel: &T) -> WorldSwitchKind {
    let identity = core::ptr::from_ref(vessel).addr();
    let previous = ACTIVE_VESSEL[cpu].0.swap(identity, Ordering::AcqRel);
    if previous == identity {
        WorldSwitchKind::ActiveStateOnly
    } else {
        WorldSwitchKind::Full
    }
}

/// The kernel's per-CPU lazy FPU owner: the vCPU or thread EC whose FPU
/// state is currently live in hardware, if any. Mirrors spec §4.F/§4.G's
/// "kernel keeps a per-CPU `fpu_owner` pointer".
struct FpuOwner(AtomicUsize);

impl FpuOwner {
    const fn new() -> Self {
        Self(AtomicUsize::new(0))
    }
}

static FPU_OWNER: [FpuOwner; MAX_CPUS] = [const { FpuOwner::new() }; MAX_CPUS];

#[must_use]
pub fn fpu_owner(cpu: usize) -> Option<NonNull<Ec>> {
    let raw = FPU_OWNER[cpu].0.load(Ordering::Acquire);
    NonNull::new(raw as *mut Ec)
}

/// Records `ec` as the new FPU owner on `cpu`. The caller is responsible
/// for having saved the previous owner's state first (if any) and for
/// enabling the FPU in the trap control word before returning to the
/// guest/thread.
pub fn set_fpu_owner(cpu: usize, ec: NonNull<Ec>) {
    FPU_OWNER[cpu].0.store(ec.as_ptr().addr(), Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy(u8);

    #[test]
    fn world_switch_kind_is_full_on_first_entry_then_active_state_only() {
        let vessel = Dummy(0);
        assert_eq!(world_switch_kind(20, &vessel), WorldSwitchKind::Full);
        assert_eq!(world_switch_kind(20, &vessel), WorldSwitchKind::ActiveStateOnly);
    }

    #[test]
    fn world_switch_kind_is_full_again_after_a_different_vessel() {
        let a = Dummy(0);
        let b = Dummy(1);
        assert_eq!(world_switch_kind(21, &a), WorldSwitchKind::Full);
        assert_eq!(world_switch_kind(21, &b), WorldSwitchKind::Full);
    }

    #[test]
    fn fpu_owner_starts_unset_and_records_the_new_owner() {
        assert_eq!(fpu_owner(22), None);
    }
}
