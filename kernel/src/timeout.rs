//! Per-EC deadline timeout queue (spec §4.I).
//!
//! `ctrl_sm`'s blocking `down` arms a deadline here whenever the caller
//! passed a nonzero one. The HPET one-shot interrupt this module owns
//! fires [`on_interrupt`], which retires every entry whose deadline has
//! passed — waking the EC with `TIMEOUT` and removing it from the SM it
//! was parked on — and reprograms the comparator for whatever deadline is
//! left soonest.
//!
//! The queue is a flat, unsorted list rather than one kept sorted by
//! deadline: `utils::collections::linkedlist::LinkedList` has no sorted
//! insert, and the number of ECs blocked with a live deadline at once is
//! small enough that a linear scan per expiry is cheap.

use core::ptr::NonNull;
use core::time::Duration;

use captab::ec::Ec;
use captab::error::KernelError;
use captab::sm::Sm;
use drivers::timer::Timer;
use drivers::timer::hpet::{AdditionalConfig, DeliveryMode, HpetTimer, TimerMode, TriggerMode};
use scheduler::RemoteEnqueueOutcome;
use utils::collections::linkedlist::LinkedList;
use utils::sync::spinlock::{SpinLock, SpinLockable};

/// Legacy-replacement routing (selected by `Hpet::init`) sends timer 0's
/// interrupt out on the same GSI the chipset maps legacy ISA IRQ0 to,
/// which the MADT's interrupt-source override on every board this pack
/// targets pins at GSI 2.
const HPET_LEGACY_GSI: u32 = 2;

#[derive(Clone, Copy)]
struct Entry {
    deadline: u64,
    ec: NonNull<Ec>,
    sm: NonNull<Sm>,
}

struct Queue(LinkedList<Entry>);
impl SpinLockable for Queue {}
unsafe impl Send for Queue {}

static QUEUE: SpinLock<Queue> = SpinLock::new(Queue(LinkedList::new()));

struct TickSource(Option<HpetTimer>);
impl SpinLockable for TickSource {}

static TICK_SOURCE: SpinLock<TickSource> = SpinLock::new(TickSource(None));

fn with_timer<R>(f: impl FnOnce(&mut HpetTimer) -> R) -> R {
    let mut slot = TICK_SOURCE.lock();
    if slot.0.is_none() {
        slot.0 = Some(HpetTimer::new().expect("HPET: timer 0 unavailable"));
    }
    f(slot.0.as_mut().expect("just initialized above"))
}

extern "C" fn isr() {
    on_interrupt();
}

/// Routes the HPET's legacy IRQ0 line to [`drivers::interrupt::TIMER_VECTOR`]
/// and leaves the comparator disarmed until the first [`arm`] call.
///
/// # Safety
/// Must run after ACPI/IO APIC discovery has registered the IO APIC that
/// owns [`HPET_LEGACY_GSI`], and only once.
pub unsafe fn init() {
    with_timer(|timer| {
        let _ = timer.configure(
            Duration::ZERO,
            TimerMode::OneShot,
            AdditionalConfig {
                receive_interrupts: true,
                delivery_mode: DeliveryMode::Interrupt(isr, TriggerMode::EdgeTriggered),
            },
        );
        timer.set_disabled(true);
    });

    unsafe {
        let _ = drivers::interrupt::assign_gsi(HPET_LEGACY_GSI, drivers::interrupt::TIMER_VECTOR, 0, false, false);
    }
}

/// The current tick, in HPET main-counter cycles. The kernel's only
/// notion of "now": SC budget accounting (spec §4.D), syscall deadlines,
/// and this queue all compare against the same raw counter.
#[must_use]
pub fn now() -> u64 {
    with_timer(HpetTimer::read_main_counter)
}

/// Arms `ec`'s deadline, parking it in the queue so [`on_interrupt`] can
/// retire it if `sm`'s `up()` doesn't reach it first. Reprograms the
/// comparator if this is now the earliest pending deadline.
pub fn arm(ec: NonNull<Ec>, sm: NonNull<Sm>, deadline: u64) {
    unsafe { ec.as_ref() }.set_timeout(deadline);
    unsafe { ec.as_ref() }.set_blocked_on(sm);
    QUEUE.lock().0.push_back(Entry { deadline, ec, sm });
    reprogram();
}

/// Cancels `ec`'s queued deadline, if any — e.g. because `up()` already
/// woke it before the deadline passed. Idempotent.
pub fn disarm(ec: NonNull<Ec>) {
    unsafe { ec.as_ref() }.clear_timeout();
    unsafe { ec.as_ref() }.take_blocked_on();

    let mut queue = QUEUE.lock();
    if let Some(index) = queue.0.iter().position(|entry| entry.ec == ec) {
        if let Some(node) = queue.0.remove_at_node(index) {
            drop(unsafe { alloc::boxed::Box::from_raw(node.as_ptr()) });
        }
    }
    drop(queue);
    reprogram();
}

/// Reached through `kernel::trap::handle_irq`'s `TIMER_VECTOR` arm.
/// Retires every entry whose deadline has passed.
pub fn on_interrupt() {
    let now = now();

    let expired: alloc::vec::Vec<Entry> = {
        let mut queue = QUEUE.lock();
        let due: alloc::vec::Vec<usize> = queue
            .0
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(i, _)| i)
            .collect();

        let mut out = alloc::vec::Vec::with_capacity(due.len());
        for index in due.into_iter().rev() {
            if let Some(node) = queue.0.remove_at_node(index) {
                out.push(unsafe { node.as_ref().data });
                drop(unsafe { alloc::boxed::Box::from_raw(node.as_ptr()) });
            }
        }
        out
    };

    for entry in expired {
        retire(entry);
    }

    reprogram();
}

/// Wakes `entry`'s EC with `TIMEOUT`, unless a racing `up()` already
/// pulled it off the SM's waiter list — in which case that path owns the
/// wake and this one has nothing left to do.
fn retire(entry: Entry) {
    let ec = unsafe { entry.ec.as_ref() };
    let sm = unsafe { entry.sm.as_ref() };

    ec.clear_timeout();
    ec.take_blocked_on();

    if !sm.remove_waiter(entry.ec) {
        return;
    }

    ec.with_frame_mut(|frame| frame.gprs[0] = KernelError::Timeout.code() as u64);

    for outcome in scheduler::release_helpers(ec) {
        if let RemoteEnqueueOutcome::SendRrq(apic_id) = outcome {
            unsafe { crate::trap::send_rrq(apic_id as u32) };
        }
    }
}

fn reprogram() {
    let earliest = QUEUE.lock().0.iter().map(|entry| entry.deadline).min();
    with_timer(|timer| match earliest {
        Some(deadline) => timer.arm_absolute(deadline),
        None => timer.set_disabled(true),
    });
}
