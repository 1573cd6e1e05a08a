//! Semaphore: a counting wait object. `up()`/`down()` bookkeeping lives
//! here; actually parking and waking an EC is the scheduler's job, so the
//! two operations return an outcome for the syscall layer to act on rather
//! than blocking by themselves.

use alloc::boxed::Box;
use core::ptr::NonNull;

use slab::{SlabAllocatable, SlabAllocator};
use utils::collections::id::Id;
use utils::collections::linkedlist::LinkedList;
use utils::sync::spinlock::{SpinLock, SpinLockable};

use crate::capability::{Capability, perm};
use crate::ec::Ec;
use crate::error::{KernelError, KernelResult};
use crate::object::{ObjectHeader, ObjectKind};
use crate::pd::Pd;

struct State {
    counter: u64,
    waiters: LinkedList<NonNull<Ec>>,
}

impl SpinLockable for State {}

#[repr(C)]
pub struct Sm {
    header: ObjectHeader,
    state: SpinLock<State>,
}

unsafe impl Send for Sm {}
unsafe impl Sync for Sm {}

impl SlabAllocatable for Sm {}

static SM_SLAB: SlabAllocator<Sm> = SlabAllocator::new();

/// What the caller of [`Sm::down`] must do next.
#[derive(Debug, PartialEq, Eq)]
pub enum DownOutcome {
    /// The counter was non-zero and has been decremented; the caller may
    /// proceed immediately.
    Acquired,
    /// The counter was zero; `ec` has been queued and the caller must
    /// block it via the scheduler.
    Blocked,
}

impl Sm {
    fn new(initial: u64) -> Self {
        Self {
            header: ObjectHeader::new(ObjectKind::Sm),
            state: SpinLock::new(State {
                counter: initial,
                waiters: LinkedList::new(),
            }),
        }
    }

    pub fn header(&self) -> &ObjectHeader {
        &self.header
    }

    /// Increments the counter, or — if a waiter is parked — hands the
    /// increment straight to the oldest waiter and returns it so the
    /// caller can wake it.
    pub fn up(&self) -> Option<NonNull<Ec>> {
        let mut state = self.state.lock();
        if let Some(ec) = state.waiters.pop_front() {
            return Some(ec);
        }
        state.counter += 1;
        None
    }

    /// Attempts to decrement the counter; parks `ec` if it is already
    /// zero.
    pub fn down(&self, ec: NonNull<Ec>) -> DownOutcome {
        let mut state = self.state.lock();
        if state.counter > 0 {
            state.counter -= 1;
            DownOutcome::Acquired
        } else {
            state.waiters.push_back(ec);
            DownOutcome::Blocked
        }
    }

    pub fn counter(&self) -> u64 {
        self.state.lock().counter
    }

    /// Pulls `ec` out of the waiter queue if it is still parked there.
    /// Returns `false` if `ec` already left (a racing `up()` matched it
    /// first), in which case the caller must not treat it as timed out.
    /// Used by the timer's timeout handler (spec §4.I) to retire an
    /// expired EC before it can be handed a stale counter increment.
    pub fn remove_waiter(&self, ec: NonNull<Ec>) -> bool {
        let mut state = self.state.lock();
        let Some(index) = state.waiters.iter().position(|&waiting| waiting == ec) else {
            return false;
        };
        if let Some(node) = state.waiters.remove_at_node(index) {
            drop(unsafe { alloc::boxed::Box::from_raw(node.as_ptr()) });
        }
        true
    }
}

/// Creates a semaphore with the given initial counter value and publishes
/// a capability to it at `dst_sel`.
pub fn create_sm(
    requestor: &Pd,
    requestor_sel: Id,
    dst_sel: Id,
    initial: u64,
) -> KernelResult<()> {
    if !requestor.obj_space.lookup(dst_sel).is_null() {
        return Err(KernelError::BadCap);
    }

    requestor
        .obj_space
        .lookup(requestor_sel)
        .validate(ObjectKind::Pd, perm::PD)?;

    let boxed = Box::try_new_in(Sm::new(initial), &SM_SLAB).map_err(|_| KernelError::MemObj)?;
    let ptr = NonNull::from(Box::leak(boxed));

    let cap = Capability::new(ptr.cast(), perm::CTRL_UP | perm::CTRL_DOWN);
    requestor.obj_space.publish(dst_sel, cap)?;
    logger::debug!("captab: created SM at sel {} (initial {initial})", dst_sel.0);
    Ok(())
}

/// # Safety
/// `ptr` must point at an `Sm` allocated by [`create_sm`] whose refcount
/// has just reached zero, and its waiter list must be empty.
pub unsafe fn destroy_sm(ptr: NonNull<Sm>) {
    struct SendPtr(NonNull<Sm>);
    unsafe impl Send for SendPtr {}
    let ptr = SendPtr(ptr);

    crate::rcu::defer(move || {
        drop(unsafe { Box::from_raw_in(ptr.0.as_ptr(), &SM_SLAB) });
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
    fn down_succeeds_when_counter_positive() {
        let sm = Sm::new(1);
        assert_eq!(sm.down(dummy_ec()), DownOutcome::Acquired);
        assert_eq!(sm.counter(), 0);
    }

    #[test]
    fn down_blocks_when_counter_zero() {
        let sm = Sm::new(0);
        assert_eq!(sm.down(dummy_ec()), DownOutcome::Blocked);
    }

    #[test]
    fn up_wakes_a_waiter_instead_of_incrementing() {
        let sm = Sm::new(0);
        let ec = dummy_ec();
        assert_eq!(sm.down(ec), DownOutcome::Blocked);

        let woken = sm.up();
        assert_eq!(woken, Some(ec));
        assert_eq!(sm.counter(), 0);
    }

    #[test]
    fn up_increments_when_no_waiters() {
        let sm = Sm::new(0);
        assert!(sm.up().is_none());
        assert_eq!(sm.counter(), 1);
    }

    #[test]
    fn remove_waiter_retires_a_parked_ec() {
        let sm = Sm::new(0);
        let ec = dummy_ec();
        assert_eq!(sm.down(ec), DownOutcome::Blocked);

        assert!(sm.remove_waiter(ec));
        assert!(sm.up().is_none());
        assert_eq!(sm.counter(), 1);
    }

    #[test]
    fn remove_waiter_is_false_once_already_woken() {
        let sm = Sm::new(0);
        let ec = dummy_ec();
        assert_eq!(sm.down(ec), DownOutcome::Blocked);

        assert_eq!(sm.up(), Some(ec));
        assert!(!sm.remove_waiter(ec));
    }
}
