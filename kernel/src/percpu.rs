//! Kernel-owned per-CPU bookkeeping that sits above `scheduler::PerCpu`:
//! which SM a device GSI wakes, and the deadline tick the timer is
//! currently armed for. Neither belongs in `scheduler` or `drivers`
//! themselves — the scheduler only knows about ready queues and budgets
//! (spec §4.D), and `drivers::interrupt` only knows how to program the
//! controller, not what an interrupt *means*.

use core::ptr::NonNull;
use core::sync::atomic::{AtomicU64, Ordering};

use captab::sm::Sm;
use utils::MAX_CPUS;
use utils::sync::spinlock::{SpinLock, SpinLockable};

struct IrqBinding(Option<NonNull<Sm>>);
impl SpinLockable for IrqBinding {}

unsafe impl Send for IrqBinding {}

/// One physical CPU's kernel-level interrupt/timer state.
pub struct KernelPerCpu {
    /// The SM `assign_int` bound this CPU's generic device-IRQ vector to,
    /// if any. One slot rather than a GSI-keyed table: every dynamically
    /// assigned GSI on this build shares the IDT's single catch-all
    /// vector (254), so only the most recent binding can be told apart at
    /// dispatch time without per-vector IDT stubs this build doesn't
    /// generate. Recorded as an Open Question resolution in DESIGN.md.
    irq_sm: SpinLock<IrqBinding>,
    /// Absolute tick the deadline timer is currently armed for; 0 means
    /// unarmed. Read by `schedule()`'s caller to decide whether a
    /// reprogram is needed before resuming.
    deadline: AtomicU64,
}

impl KernelPerCpu {
    const fn new() -> Self {
        Self {
            irq_sm: SpinLock::new(IrqBinding(None)),
            deadline: AtomicU64::new(0),
        }
    }
}

static PERCPU: [KernelPerCpu; MAX_CPUS] = [const { KernelPerCpu::new() }; MAX_CPUS];

#[must_use]
pub fn percpu(cpu: usize) -> &'static KernelPerCpu {
    &PERCPU[cpu]
}

/// Binds `sm` to `cpu`'s generic device-IRQ vector, replacing whatever was
/// bound before.
pub fn bind_irq(cpu: usize, sm: NonNull<Sm>) {
    percpu(cpu).irq_sm.lock().0 = Some(sm);
}

/// The SM bound to `cpu`'s device-IRQ vector, if any.
#[must_use]
pub fn bound_irq(cpu: usize) -> Option<NonNull<Sm>> {
    percpu(cpu).irq_sm.lock().0
}

pub fn set_deadline(cpu: usize, tick: u64) {
    percpu(cpu).deadline.store(tick, Ordering::Release);
}

#[must_use]
pub fn deadline(cpu: usize) -> Option<u64> {
    match percpu(cpu).deadline.load(Ordering::Acquire) {
        0 => None,
        tick => Some(tick),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn irq_binding_round_trips() {
        assert!(bound_irq(40).is_none());
        let sm = NonNull::<Sm>::dangling();
        bind_irq(40, sm);
        assert_eq!(bound_irq(40), Some(sm));
    }

    #[test]
    fn deadline_unarmed_by_default() {
        assert_eq!(deadline(41), None);
        set_deadline(41, 1000);
        assert_eq!(deadline(41), Some(1000));
    }
}
