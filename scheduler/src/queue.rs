//! Per-CPU ready queue: a priority-ordered array of FIFOs plus a presence
//! bitmap so `pop_highest` never has to scan an empty level.

use core::ptr::NonNull;

use captab::sc::{PRIORITY_LEVELS, Sc};
use utils::collections::linkedlist::LinkedList;

const LEVELS: usize = PRIORITY_LEVELS as usize;

/// 128 priority levels, indexed 0 (lowest) through 127 (highest).
pub struct ReadyQueue {
    levels: [LinkedList<NonNull<Sc>>; LEVELS],
    /// Bit `p` set iff `levels[p]` is non-empty.
    presence: u128,
}

impl ReadyQueue {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            levels: [const { LinkedList::new() }; LEVELS],
            presence: 0,
        }
    }

    pub fn push_front(&mut self, priority: u8, sc: NonNull<Sc>) {
        self.levels[priority as usize].push_front(sc);
        self.presence |= 1 << priority;
    }

    pub fn push_back(&mut self, priority: u8, sc: NonNull<Sc>) {
        self.levels[priority as usize].push_back(sc);
        self.presence |= 1 << priority;
    }

    /// Removes and returns the head of the highest non-empty priority
    /// level, i.e. the next SC `schedule()` should dispatch.
    pub fn pop_highest(&mut self) -> Option<NonNull<Sc>> {
        if self.presence == 0 {
            return None;
        }
        let prio = 127 - self.presence.leading_zeros() as usize;
        let sc = self.levels[prio].pop_front();
        if self.levels[prio].is_empty() {
            self.presence &= !(1 << prio);
        }
        sc
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.presence == 0
    }

    #[must_use]
    pub fn top_priority(&self) -> Option<u8> {
        if self.presence == 0 {
            None
        } else {
            Some((127 - self.presence.leading_zeros()) as u8)
        }
    }
}

impl Default for ReadyQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use captab::capability::{Capability, perm};
    use captab::object::ObjectKind;
    use captab::pd::Pd;
    use captab::sc::create_sc;
    use utils::collections::id::Id;

    /// Builds a root PD holding a self-PD capability, one EC, and returns
    /// an SC at `priority` bound to it, all through the public factory
    /// functions (same setup captab's own PD/EC/SC tests use).
    fn dummy_sc(priority: u8) -> NonNull<Sc> {
        let root = Pd::bootstrap_root();
        let self_cap = Capability::new(NonNull::from(root.header()), perm::PD);
        root.obj_space.publish(Id(0), self_cap).unwrap();

        captab::ec::create_ec(
            &root,
            Id(0),
            Id(0),
            Id(1),
            captab::object::EcSubKind::Global,
            0,
            None,
        )
        .unwrap();

        create_sc(&root, Id(0), Id(1), Id(2), 0, priority, 1000).unwrap();

        let cap = root.obj_space.lookup(Id(2));
        cap.validate(ObjectKind::Sc, perm::SC).unwrap().cast::<Sc>()
    }

    #[test]
    fn pops_highest_priority_first() {
        let mut q = ReadyQueue::new();
        q.push_back(10, dummy_sc(10));
        q.push_back(90, dummy_sc(90));
        q.push_back(50, dummy_sc(50));

        let first = unsafe { q.pop_highest().unwrap().as_ref() };
        assert_eq!(first.priority, 90);
        let second = unsafe { q.pop_highest().unwrap().as_ref() };
        assert_eq!(second.priority, 50);
        let third = unsafe { q.pop_highest().unwrap().as_ref() };
        assert_eq!(third.priority, 10);
        assert!(q.is_empty());
    }

    #[test]
    fn fifo_within_a_level() {
        let mut q = ReadyQueue::new();
        let a = dummy_sc(5);
        let b = dummy_sc(5);
        q.push_back(5, a);
        q.push_back(5, b);
        assert_eq!(q.pop_highest(), Some(a));
        assert_eq!(q.pop_highest(), Some(b));
    }

    #[test]
    fn push_front_goes_ahead_of_push_back() {
        let mut q = ReadyQueue::new();
        let a = dummy_sc(5);
        let b = dummy_sc(5);
        q.push_back(5, a);
        q.push_front(5, b);
        assert_eq!(q.pop_highest(), Some(b));
        assert_eq!(q.pop_highest(), Some(a));
    }
}
