//! Execution context: the thread-of-control object. Local, global, and vCPU
//! ECs share this representation; `sub_kind` distinguishes their dispatch
//! rules in the scheduler and portal engine.

use alloc::boxed::Box;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use slab::{SlabAllocatable, SlabAllocator};
use utils::collections::id::Id;
use utils::collections::linkedlist::LinkedList;
use utils::sync::spinlock::{SpinLock, SpinLockable};

use crate::capability::{Capability, perm};
use crate::error::{KernelError, KernelResult};
use crate::object::{EcSubKind, ObjectHeader, ObjectKind};
use crate::pd::Pd;
use crate::sc::Sc;
use crate::sm::Sm;

/// A saved general-purpose register frame, restored on resume.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExceptionFrame {
    pub gprs: [u64; 16],
    pub rip: u64,
    pub rflags: u64,
}

impl SpinLockable for ExceptionFrame {}

/// Where control resumes once this EC is next dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    RetUserHypercall,
    RetUserException,
    RetUserVmexit,
    Idle,
}

/// Bits set in an EC's hazard word demand attention the next time it is
/// dispatched, without needing a dedicated IPI for each one.
pub mod hazard {
    pub const RECALL: usize = 1 << 0;
    pub const STOP: usize = 1 << 1;
}

struct Blocked {
    scs: LinkedList<NonNull<Sc>>,
}

impl SpinLockable for Blocked {}

#[repr(C)]
pub struct Ec {
    header: ObjectHeader,
    pub pd: NonNull<Pd>,
    pub sub_kind: EcSubKind,
    /// CPU this EC is bound to. Fixed at creation; a local EC may only
    /// ever receive a portal call on this CPU, per `call`'s `BAD_CPU`
    /// check. Global/vCPU ECs use it as the CPU their SC is initially
    /// enqueued on.
    cpu: AtomicUsize,
    /// User-mapped UTCB page used for this EC's hypercall argument/result
    /// transfer; `None` for a vCPU EC, which instead exposes its exit
    /// state through the vCPU's VMCB.
    pub utcb: Option<NonNull<u8>>,
    frame: SpinLock<ExceptionFrame>,
    continuation: SpinLock<ContinuationCell>,
    hazards: AtomicUsize,
    /// Deadline (absolute tick count) after which a blocking syscall on
    /// this EC aborts with `Timeout`; 0 means unbound. Armed and read back
    /// by `kernel::timeout`'s per-EC deadline queue.
    timeout: AtomicU64,
    /// The SM this EC is currently parked on as a waiter, if its pending
    /// timeout is SM-backed. `kernel::timeout`'s expiry handler uses this
    /// to pull the EC out of that SM's waiter queue before marking it
    /// TIMEOUT; cleared on any wake, normal or timed out.
    blocked_on: SpinLock<BlockedOnCell>,
    blocked: SpinLock<Blocked>,
    fpu_dirty: AtomicUsize,
    /// The EC currently rendezvoused with this one via a portal call, if
    /// any. Set on the callee by `call`, cleared and read back by `reply`
    /// to reverse the register transfer.
    partner: SpinLock<PartnerCell>,
}

struct ContinuationCell(Continuation);
impl SpinLockable for ContinuationCell {}

struct BlockedOnCell(Option<NonNull<Sm>>);
impl SpinLockable for BlockedOnCell {}

struct PartnerCell(Option<NonNull<Ec>>);
impl SpinLockable for PartnerCell {}

unsafe impl Send for Ec {}
unsafe impl Sync for Ec {}

impl SlabAllocatable for Ec {}

static EC_SLAB: SlabAllocator<Ec> = SlabAllocator::new();

impl Ec {
    pub(crate) fn new(pd: NonNull<Pd>, sub_kind: EcSubKind, cpu: usize, utcb: Option<NonNull<u8>>) -> Self {
        Self {
            header: ObjectHeader::new(ObjectKind::Ec),
            pd,
            sub_kind,
            cpu: AtomicUsize::new(cpu),
            utcb,
            frame: SpinLock::new(ExceptionFrame::default()),
            continuation: SpinLock::new(ContinuationCell(Continuation::RetUserHypercall)),
            hazards: AtomicUsize::new(0),
            timeout: AtomicU64::new(0),
            blocked_on: SpinLock::new(BlockedOnCell(None)),
            blocked: SpinLock::new(Blocked {
                scs: LinkedList::new(),
            }),
            fpu_dirty: AtomicUsize::new(0),
            partner: SpinLock::new(PartnerCell(None)),
        }
    }

    pub fn header(&self) -> &ObjectHeader {
        &self.header
    }

    pub fn cpu(&self) -> usize {
        self.cpu.load(Ordering::Acquire)
    }

    pub fn continuation(&self) -> Continuation {
        self.continuation.lock().0
    }

    pub fn set_continuation(&self, cont: Continuation) {
        self.continuation.lock().0 = cont;
    }

    pub fn frame(&self) -> ExceptionFrame {
        *self.frame.lock()
    }

    pub fn with_frame_mut<R>(&self, f: impl FnOnce(&mut ExceptionFrame) -> R) -> R {
        f(&mut self.frame.lock())
    }

    pub fn raise_hazard(&self, bits: usize) {
        self.hazards.fetch_or(bits, Ordering::AcqRel);
    }

    pub fn take_hazards(&self) -> usize {
        self.hazards.swap(0, Ordering::AcqRel)
    }

    pub fn set_timeout(&self, deadline_tick: u64) {
        self.timeout.store(deadline_tick, Ordering::Release);
    }

    pub fn timeout(&self) -> Option<u64> {
        match self.timeout.load(Ordering::Acquire) {
            0 => None,
            tick => Some(tick),
        }
    }

    /// Clears the armed deadline. Called once a wake, timed out or not,
    /// has been delivered so a stale entry can't fire twice.
    pub fn clear_timeout(&self) {
        self.timeout.store(0, Ordering::Release);
    }

    /// Records that this EC is parked as a waiter on `sm`, so the timeout
    /// handler knows where to pull it out of if its deadline expires.
    pub fn set_blocked_on(&self, sm: NonNull<Sm>) {
        self.blocked_on.lock().0 = Some(sm);
    }

    /// Clears and returns the SM this EC was parked on, if any. Called on
    /// any wake path (normal or timeout) so the record doesn't outlive
    /// the wait it describes.
    pub fn take_blocked_on(&self) -> Option<NonNull<Sm>> {
        self.blocked_on.lock().0.take()
    }

    /// Queues `sc` to be woken once this EC becomes runnable again. Used by
    /// the portal/IPC engine's helping protocol: a caller's SC parks here
    /// while the callee runs.
    pub fn park_sc(&self, sc: NonNull<Sc>) {
        self.blocked.lock().scs.push_back(sc);
    }

    pub fn take_parked_scs(&self) -> LinkedList<NonNull<Sc>> {
        core::mem::take(&mut self.blocked.lock().scs)
    }

    /// Marks `partner` as rendezvoused with this EC. Overwrites any
    /// previous partner; the portal engine only calls this on an EC it has
    /// just verified is not already busy.
    pub fn set_partner(&self, partner: NonNull<Ec>) {
        self.partner.lock().0 = Some(partner);
    }

    /// Clears and returns the rendezvoused partner, if any.
    pub fn take_partner(&self) -> Option<NonNull<Ec>> {
        self.partner.lock().0.take()
    }

    pub fn partner(&self) -> Option<NonNull<Ec>> {
        self.partner.lock().0
    }

    /// Marks the FPU state dirty, meaning this EC is the current lazy FPU
    /// owner and a save is required before another EC may use the FPU.
    pub fn mark_fpu_dirty(&self, dirty: bool) {
        self.fpu_dirty.store(usize::from(dirty), Ordering::Release);
    }

    pub fn fpu_dirty(&self) -> bool {
        self.fpu_dirty.load(Ordering::Acquire) != 0
    }
}

/// Creates a new EC owned by `owner_pd` (referenced through
/// `owner_pd_sel` in `requestor`'s object space), bound to `cpu`, and
/// publishes a capability to it at `dst_sel`.
pub fn create_ec(
    requestor: &Pd,
    requestor_sel: Id,
    owner_pd_sel: Id,
    dst_sel: Id,
    sub_kind: EcSubKind,
    cpu: usize,
    utcb: Option<NonNull<u8>>,
) -> KernelResult<()> {
    if !requestor.obj_space.lookup(dst_sel).is_null() {
        return Err(KernelError::BadCap);
    }

    requestor
        .obj_space
        .lookup(requestor_sel)
        .validate(ObjectKind::Pd, perm::PD)?;

    let owner_header = requestor
        .obj_space
        .lookup(owner_pd_sel)
        .validate(ObjectKind::Pd, perm::PD)?;
    let owner_pd = owner_header.cast::<Pd>();

    let boxed = Box::try_new_in(Ec::new(owner_pd, sub_kind, cpu, utcb), &EC_SLAB)
        .map_err(|_| KernelError::MemObj)?;
    let ptr = NonNull::from(Box::leak(boxed));

    let cap = Capability::new(ptr.cast(), perm::EC);
    requestor.obj_space.publish(dst_sel, cap)?;
    logger::debug!("captab: created EC ({sub_kind:?}) at sel {} (cpu {cpu})", dst_sel.0);
    Ok(())
}

/// # Safety
/// `ptr` must point at an `Ec` allocated by [`create_ec`] whose refcount
/// has just reached zero.
pub unsafe fn destroy_ec(ptr: NonNull<Ec>) {
    struct SendPtr(NonNull<Ec>);
    unsafe impl Send for SendPtr {}
    let ptr = SendPtr(ptr);

    crate::rcu::defer(move || {
        drop(unsafe { Box::from_raw_in(ptr.0.as_ptr(), &EC_SLAB) });
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hazards_accumulate_and_clear() {
        let pd = crate::pd::Pd::new();
        let ec = Ec::new(NonNull::from(&pd), EcSubKind::Local, 0, None);

        ec.raise_hazard(hazard::RECALL);
        ec.raise_hazard(hazard::STOP);
        assert_eq!(ec.take_hazards(), hazard::RECALL | hazard::STOP);
        assert_eq!(ec.take_hazards(), 0);
    }

    #[test]
    fn continuation_defaults_to_hypercall_return() {
        let pd = crate::pd::Pd::new();
        let ec = Ec::new(NonNull::from(&pd), EcSubKind::Global, 0, None);
        assert_eq!(ec.continuation(), Continuation::RetUserHypercall);

        ec.set_continuation(Continuation::RetUserVmexit);
        assert_eq!(ec.continuation(), Continuation::RetUserVmexit);
    }

    #[test]
    fn timeout_unbound_by_default() {
        let pd = crate::pd::Pd::new();
        let ec = Ec::new(NonNull::from(&pd), EcSubKind::Local, 0, None);
        assert_eq!(ec.timeout(), None);

        ec.set_timeout(42);
        assert_eq!(ec.timeout(), Some(42));

        ec.clear_timeout();
        assert_eq!(ec.timeout(), None);
    }

    #[test]
    fn blocked_on_round_trips_once() {
        let pd = crate::pd::Pd::new();
        let ec = Ec::new(NonNull::from(&pd), EcSubKind::Local, 0, None);
        assert!(ec.take_blocked_on().is_none());

        let sm = NonNull::<Sm>::dangling();
        ec.set_blocked_on(sm);
        assert_eq!(ec.take_blocked_on(), Some(sm));
        assert!(ec.take_blocked_on().is_none());
    }
}
