//! Per-CPU priority scheduler (spec §4.D): ready queues, SC budget
//! accounting, the `schedule()` dispatch decision, cross-CPU migration via
//! remote enqueue, and the helping/donation requeue on portal reply.
//!
//! This crate owns policy and data structures only. It never touches the
//! deadline timer or sends an IPI itself — `remote_enqueue`/`schedule`
//! return an outcome describing what the caller (the `kernel` crate, which
//! owns the APIC/timer drivers) must still do, the same "return an
//! outcome, let the caller act" shape `captab::sm::Sm` and `ipc::engine`
//! already use.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod queue;

use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, Ordering};

use captab::ec::{Continuation, Ec};
use captab::sc::Sc;
use utils::MAX_CPUS;
use utils::collections::linkedlist::LinkedList;
use utils::sync::spinlock::{SpinLock, SpinLockable};

use queue::ReadyQueue;

impl SpinLockable for ReadyQueue {}

struct RemoteQueue(LinkedList<NonNull<Sc>>);
impl SpinLockable for RemoteQueue {}

struct CurrentCell(Option<NonNull<Sc>>);
impl SpinLockable for CurrentCell {}

/// One physical CPU's scheduling state.
pub struct PerCpu {
    ready: SpinLock<ReadyQueue>,
    /// Pushed to by `remote_enqueue` from any CPU; drained into `ready` by
    /// this CPU's own `schedule()` call (spec §4.D step 1).
    remote: SpinLock<RemoteQueue>,
    current: SpinLock<CurrentCell>,
    /// Set while this CPU has nothing runnable and is halted; read by
    /// `remote_enqueue` on other CPUs to decide whether an RRQ IPI is
    /// needed to wake it.
    idle: AtomicBool,
}

impl PerCpu {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ready: SpinLock::new(ReadyQueue::new()),
            remote: SpinLock::new(RemoteQueue(LinkedList::new())),
            current: SpinLock::new(CurrentCell(None)),
            idle: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<NonNull<Sc>> {
        self.current.lock().0
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.idle.load(Ordering::Acquire)
    }
}

impl Default for PerCpu {
    fn default() -> Self {
        Self::new()
    }
}

// `ReadyQueue`/`RemoteQueue` hold raw `NonNull<Sc>` pointers into slab
// storage, which are never actually thread-confined: every access goes
// through `PerCpu`'s spinlocks, the same discipline `captab::ec::Ec` and
// `captab::sm::Sm` rely on for their own `NonNull` fields.
unsafe impl Send for PerCpu {}
unsafe impl Sync for PerCpu {}

/// Global per-CPU scheduler state, one entry per possible physical CPU.
static PERCPU: [PerCpu; MAX_CPUS] = [const { PerCpu::new() }; MAX_CPUS];

#[must_use]
pub fn percpu(cpu: usize) -> &'static PerCpu {
    &PERCPU[cpu]
}

/// What a cross-CPU enqueue requires of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteEnqueueOutcome {
    /// The target CPU was idle; send it an RRQ IPI so it drains its
    /// remote queue instead of staying halted.
    SendRrq(usize),
    /// The target CPU was already running something; it will drain its
    /// remote queue on its own next `schedule()` call.
    NoIpiNeeded,
}

/// Queues `sc` onto `cpu`'s remote-enqueue list. Lock-protected per spec
/// §5's shared-resource table; the actual splice into the ready array
/// happens only on `cpu`'s own `schedule()` (step 1), never here, so this
/// is safe to call from any CPU without touching `cpu`'s ready-queue lock.
pub fn remote_enqueue(cpu: usize, sc: NonNull<Sc>) -> RemoteEnqueueOutcome {
    let target = percpu(cpu);
    target.remote.lock().0.push_back(sc);

    if target.idle.load(Ordering::Acquire) {
        RemoteEnqueueOutcome::SendRrq(cpu)
    } else {
        RemoteEnqueueOutcome::NoIpiNeeded
    }
}

/// Moves every SC parked on `cpu`'s remote queue into its ready array, at
/// the priority level each SC was created/migrated with.
fn drain_remote(cpu: usize) {
    let target = percpu(cpu);
    let mut remote = target.remote.lock();
    if remote.0.is_empty() {
        return;
    }

    let mut ready = target.ready.lock();
    while let Some(sc) = remote.0.pop_front() {
        let priority = unsafe { sc.as_ref() }.priority;
        ready.push_back(priority, sc);
    }
}

/// Rebinds `sc` to `new_cpu` and remote-enqueues it there.
///
/// # Safety
/// `sc` must not currently be enqueued on any ready/remote/blocked queue
/// (the scheduler invariant: an SC is on at most one queue at a time); the
/// caller must have already dequeued it.
pub unsafe fn migrate(sc: NonNull<Sc>, new_cpu: usize) -> RemoteEnqueueOutcome {
    unsafe { sc.as_ref() }.migrate_to(new_cpu);
    remote_enqueue(new_cpu, sc)
}

/// What `schedule()` wants the caller to do next.
pub enum Decision {
    /// Resume `ec` via `continuation`, charging time against `sc`. If
    /// `deadline` is `Some`, the caller must program the deadline timer
    /// for that absolute tick so a quantum expiry reschedules.
    Run {
        sc: NonNull<Sc>,
        ec: NonNull<Ec>,
        continuation: Continuation,
        deadline: Option<u64>,
    },
    /// Nothing runnable; the caller should `halt()` until the next RRQ/RKE
    /// or interrupt.
    Idle,
}

/// Runs the scheduling algorithm for `cpu` (spec §4.D `schedule()`):
/// drain the remote queue, account the outgoing SC's elapsed time and
/// requeue it, pick the new highest-priority head, and report what to
/// resume.
///
/// Must be called with `cpu` equal to the CPU actually executing this
/// code; every queue it touches is this CPU's own.
#[must_use]
pub fn schedule(cpu: usize, now: u64) -> Decision {
    drain_remote(cpu);

    let this = percpu(cpu);
    let outgoing = this.current.lock().0.take();

    if let Some(sc) = outgoing {
        let sc_ref = unsafe { sc.as_ref() };
        let elapsed = now.saturating_sub(sc_ref.last_dispatch());
        let charged = sc_ref.charge(elapsed);
        let _ = charged;

        let mut ready = this.ready.lock();
        if sc_ref.exhausted() {
            sc_ref.refill();
            ready.push_back(sc_ref.priority, sc);
        } else {
            ready.push_front(sc_ref.priority, sc);
        }
    }

    let next = this.ready.lock().pop_highest();

    match next {
        Some(sc) => {
            this.idle.store(false, Ordering::Release);
            let sc_ref = unsafe { sc.as_ref() };
            sc_ref.set_last_dispatch(now);
            this.current.lock().0 = Some(sc);

            let ec = sc_ref.ec;
            let continuation = unsafe { ec.as_ref() }.continuation();
            let deadline = if sc_ref.budget == u64::MAX {
                None
            } else {
                Some(now + sc_ref.remaining())
            };

            Decision::Run {
                sc,
                ec,
                continuation,
                deadline,
            }
        }
        None => {
            this.idle.store(true, Ordering::Release);
            Decision::Idle
        }
    }
}

/// Drains the blocked-SC queue an EC accumulated while callers helped it
/// (spec §4.D "when `s` replies, `s` walks its blocked-SC queue and
/// remote-enqueues each back onto its home CPU"), and reports the RRQ
/// IPIs the caller still needs to send.
pub fn release_helpers(ec: &Ec) -> alloc::vec::Vec<RemoteEnqueueOutcome> {
    let mut parked = ec.take_parked_scs();
    let mut outcomes = alloc::vec::Vec::new();

    while let Some(sc) = parked.pop_front() {
        let home = unsafe { sc.as_ref() }.cpu();
        outcomes.push(remote_enqueue(home, sc));
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use captab::capability::{Capability, perm};
    use captab::ec::create_ec;
    use captab::object::{EcSubKind, ObjectKind};
    use captab::pd::Pd;
    use captab::sc::create_sc;
    use utils::collections::id::Id;

    fn seeded_sc(cpu: usize, priority: u8, budget: u64) -> NonNull<Sc> {
        let root = Pd::bootstrap_root();
        let self_cap = Capability::new(NonNull::from(root.header()), perm::PD);
        root.obj_space.publish(Id(0), self_cap).unwrap();

        create_ec(&root, Id(0), Id(0), Id(1), EcSubKind::Global, cpu, None).unwrap();
        create_sc(&root, Id(0), Id(1), Id(2), cpu, priority, budget).unwrap();

        root.obj_space
            .lookup(Id(2))
            .validate(ObjectKind::Sc, perm::SC)
            .unwrap()
            .cast::<Sc>()
    }

    #[test]
    fn schedule_picks_highest_priority_sc() {
        let lo = seeded_sc(9, 10, 1000);
        let hi = seeded_sc(9, 100, 1000);
        remote_enqueue(9, lo);
        remote_enqueue(9, hi);

        match schedule(9, 0) {
            Decision::Run { sc, .. } => assert_eq!(sc, hi),
            Decision::Idle => panic!("expected a runnable SC"),
        }
    }

    #[test]
    fn schedule_is_idle_with_nothing_enqueued() {
        assert!(matches!(schedule(10, 0), Decision::Idle));
    }

    #[test]
    fn exhausted_sc_goes_to_tail_and_refills() {
        let a = seeded_sc(11, 50, 100);
        let b = seeded_sc(11, 50, 100);
        remote_enqueue(11, a);
        remote_enqueue(11, b);

        // a dispatched first.
        let Decision::Run { sc, .. } = schedule(11, 0) else {
            panic!()
        };
        assert_eq!(sc, a);

        // a runs out its whole quantum; b should get picked next, and a
        // requeued (refilled) behind it.
        let Decision::Run { sc, .. } = schedule(11, 100) else {
            panic!()
        };
        assert_eq!(sc, b);

        let Decision::Run { sc, .. } = schedule(11, 100) else {
            panic!()
        };
        assert_eq!(sc, a);
        assert_eq!(unsafe { a.as_ref() }.remaining(), 100);
    }

    #[test]
    fn remote_enqueue_reports_rrq_only_when_idle() {
        // CPU 12 has never scheduled anything, so it starts idle.
        let sc = seeded_sc(12, 20, 100);
        assert_eq!(remote_enqueue(12, sc), RemoteEnqueueOutcome::SendRrq(12));

        // Draining it via schedule() marks the CPU non-idle.
        let _ = schedule(12, 0);
        let sc2 = seeded_sc(12, 20, 100);
        assert_eq!(
            remote_enqueue(12, sc2),
            RemoteEnqueueOutcome::NoIpiNeeded
        );
    }

    #[test]
    fn release_helpers_remote_enqueues_each_parked_donor() {
        let root = Pd::bootstrap_root();
        let self_cap = Capability::new(NonNull::from(root.header()), perm::PD);
        root.obj_space.publish(Id(0), self_cap).unwrap();
        create_ec(&root, Id(0), Id(0), Id(1), EcSubKind::Local, 13, None).unwrap();
        let callee_ec = root
            .obj_space
            .lookup(Id(1))
            .validate(ObjectKind::Ec, perm::EC)
            .unwrap()
            .cast::<Ec>();

        let donor = seeded_sc(14, 60, 100);
        unsafe { callee_ec.as_ref() }.park_sc(donor);

        let outcomes = release_helpers(unsafe { callee_ec.as_ref() });
        assert_eq!(outcomes, alloc::vec![RemoteEnqueueOutcome::SendRrq(14)]);
    }
}
