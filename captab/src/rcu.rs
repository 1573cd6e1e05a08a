//! Grace-period deferred destruction.
//!
//! `ObjectHeader::release` tells a caller it dropped the last reference to
//! a kernel object, but freeing the backing slab slot immediately would
//! race in-flight kernel code on another CPU that read the object's
//! pointer under a lock without bumping its refcount (the capability-table
//! walkers do exactly this). Instead, destruction is queued here and only
//! actually run once every CPU has passed through a quiescent point after
//! the queuing — i.e. once no CPU can still be mid-dereference of the old
//! pointer.
//!
//! A quiescent point is any kernel-exit edge; the scheduler calls
//! [`quiescent`] once per CPU from its `schedule()` loop.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use utils::MAX_CPUS;
use utils::sync::spinlock::{SpinLock, SpinLockable};

/// Global epoch counter. Bumped once per [`defer`] call.
static EPOCH: AtomicU64 = AtomicU64::new(0);

/// Per-CPU "last epoch observed at a quiescent point" table.
static OBSERVED: [AtomicU64; MAX_CPUS] = [const { AtomicU64::new(0) }; MAX_CPUS];

struct Pending(Vec<(u64, Box<dyn FnOnce() + Send>)>);

impl SpinLockable for Pending {}

static PENDING: SpinLock<Pending> = SpinLock::new(Pending(Vec::new()));

/// Queues `destructor` to run once every CPU has observed a quiescent
/// point past this call. Used by every `destroy_*` free function in place
/// of dropping the object's `Box` directly.
pub fn defer(destructor: impl FnOnce() + Send + 'static) {
    let epoch = EPOCH.fetch_add(1, Ordering::AcqRel) + 1;
    PENDING.lock().0.push((epoch, Box::new(destructor)));
}

/// Records that `cpu` has passed a quiescent point, then runs any deferred
/// destructors that are now safe to reclaim.
pub fn quiescent(cpu: usize) {
    OBSERVED[cpu].store(EPOCH.load(Ordering::Acquire), Ordering::Release);
    reclaim();
}

fn min_observed() -> u64 {
    OBSERVED.iter().map(|o| o.load(Ordering::Acquire)).min().unwrap_or(0)
}

fn reclaim() {
    let floor = min_observed();
    let ready = {
        let mut pending = PENDING.lock();
        let mut ready = Vec::new();
        let mut i = 0;
        while i < pending.0.len() {
            if pending.0[i].0 <= floor {
                ready.push(pending.0.remove(i));
            } else {
                i += 1;
            }
        }
        ready
    };

    for (_, destructor) in ready {
        destructor();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::AtomicBool;

    #[test]
    fn destructor_runs_once_every_cpu_has_observed() {
        static RAN: AtomicBool = AtomicBool::new(false);
        RAN.store(false, Ordering::SeqCst);

        defer(|| RAN.store(true, Ordering::SeqCst));

        // Before any CPU reports a quiescent point past the defer, nothing
        // should run yet (every OBSERVED entry is still behind EPOCH).
        for cpu in 1..MAX_CPUS {
            quiescent(cpu);
        }
        assert!(!RAN.load(Ordering::SeqCst));

        quiescent(0);
        assert!(RAN.load(Ordering::SeqCst));
    }
}
