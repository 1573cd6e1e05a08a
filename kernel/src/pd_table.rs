//! Bridges `captab::pd::Pd` to the memory spaces and upcall event base a PD
//! owns. `captab` and `memspace` never depend on each other; the kernel
//! crate that composes them into syscalls owns the link instead.
//!
//! Keyed by the `Pd`'s own address: a slab-allocated object's address is
//! stable for its whole lifetime, so it makes as good a key as a dedicated
//! handle would, without asking `captab::pd::Pd` to grow a field only the
//! kernel crate cares about.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use core::ptr::NonNull;

use captab::pd::Pd;
use memspace::PdSpaces;
use utils::sync::spinlock::{SpinLock, SpinLockable};

struct Entry {
    spaces: Box<PdSpaces>,
    /// Base selector `ipc::upcall::upcall` adds its offsets to when
    /// delivering a fault or synthetic event to this PD.
    event_base: usize,
}

struct Table(BTreeMap<usize, Entry>);
impl SpinLockable for Table {}

static PD_TABLE: SpinLock<Table> = SpinLock::new(Table(BTreeMap::new()));

fn key(pd: NonNull<Pd>) -> usize {
    pd.as_ptr().addr()
}

/// Registers a freshly created PD's memory spaces and event base. Called
/// once by the `create_pd` syscall handler right after
/// `captab::pd::create_pd` publishes the capability.
pub fn register(pd: NonNull<Pd>, event_base: usize) {
    let mut table = PD_TABLE.lock();
    table.0.insert(
        key(pd),
        Entry {
            spaces: Box::new(PdSpaces::new()),
            event_base,
        },
    );
}

/// Drops a destroyed PD's side-table entry. Called from the object
/// destructor path once `captab::pd::destroy_pd`'s RCU grace period expires.
pub fn unregister(pd: NonNull<Pd>) {
    PD_TABLE.lock().0.remove(&key(pd));
}

#[must_use]
pub fn event_base(pd: NonNull<Pd>) -> Option<usize> {
    PD_TABLE.lock().0.get(&key(pd)).map(|e| e.event_base)
}

/// Runs `f` against `pd`'s memory spaces under the table lock. Returns
/// `None` if `pd` was never registered (it should always be, for any PD
/// reachable through a capability, but callers check rather than panic).
pub fn with_spaces<R>(pd: NonNull<Pd>, f: impl FnOnce(&mut PdSpaces) -> R) -> Option<R> {
    let mut table = PD_TABLE.lock();
    table.0.get_mut(&key(pd)).map(|entry| f(&mut entry.spaces))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::boxed::Box;

    fn leaked_pd() -> NonNull<Pd> {
        NonNull::from(Box::leak(Box::new(Pd::bootstrap_root())))
    }

    #[test]
    fn register_then_lookup() {
        let pd = leaked_pd();
        register(pd, 0x1000);
        assert_eq!(event_base(pd), Some(0x1000));

        let host_kind = with_spaces(pd, |spaces| spaces.host.kind()).unwrap();
        assert_eq!(host_kind, memspace::SpaceKind::Host);
    }

    #[test]
    fn unregister_removes_entry() {
        let pd = leaked_pd();
        register(pd, 0);
        unregister(pd);
        assert!(event_base(pd).is_none());
    }
}
