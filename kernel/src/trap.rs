//! Wires `arch::x86_64::trap`'s exception/IRQ hooks into the capability and
//! IPC layers: a fault or a device interrupt starts here and ends either as
//! an upcall into the faulting EC's owning PD or as scheduler policy.

use arch::x86_64::apic::lapic::LocalApic;
use arch::x86_64::trap::TrapFrame;
use drivers::interrupt::{KernelIpi, RKE_VECTOR, RRQ_VECTOR, TIMER_VECTOR};
use ipc::upcall::{self, UpcallOutcome};

use crate::pd_table;
use crate::regs::{load_ec_into_frame, save_frame_into_ec};

/// Installs this crate's exception/IRQ/hypercall dispatchers. Called once
/// at boot, after the IDT is loaded but before interrupts are enabled.
pub fn install() {
    arch::x86_64::trap::set_exception_handler(handle_exception);
    arch::x86_64::trap::set_irq_handler(handle_irq);
    arch::x86_64::trap::set_syscall_handler(crate::syscall::dispatch);
}

#[must_use]
pub fn this_cpu() -> usize {
    LocalApic::get_this_apic_id() as usize
}

/// Handles CPU exceptions (vectors 0-31). Captures the interrupted
/// register state onto the faulting EC, then upcalls into its owning PD's
/// exception portal at the fault's vector.
///
/// # Panics
/// If no EC is currently running on this CPU — an exception with nothing
/// scheduled indicates boot-time kernel code faulted, which is always fatal.
fn handle_exception(vector: u8, frame: &mut TrapFrame) {
    let cpu = this_cpu();
    let current_sc = scheduler::percpu(cpu)
        .current()
        .expect("exception with no EC scheduled on this CPU");
    let ec = unsafe { current_sc.as_ref() }.ec;
    let ec_ref = unsafe { ec.as_ref() };

    save_frame_into_ec(ec_ref, frame);

    let owner_pd = unsafe { ec_ref.pd.as_ref() };
    let Some(event_base) = pd_table::event_base(ec_ref.pd) else {
        logger::warn!("trap: PD {:p} has no registered event base, killing EC", ec_ref.pd);
        ec_ref.raise_hazard(captab::ec::hazard::STOP);
        return;
    };

    match upcall::upcall(owner_pd, event_base, usize::from(vector), ec_ref, current_sc, cpu) {
        UpcallOutcome::Dispatched(_) => {
            load_ec_into_frame(ec_ref, frame);
        }
        UpcallOutcome::Killed => {
            logger::warn!("trap: vector {vector} undeliverable, EC marked for teardown");
        }
    }
}

/// Handles the fixed device/IPI vectors (32-34, 254) and the two kernel IPI
/// vectors. RRQ/RKE never carry per-vector state beyond "something changed
/// on this CPU's scheduler state"; the actual reschedule happens on return
/// through the normal `schedule()`/hazard-check path, not here.
fn handle_irq(vector: u8) {
    match vector {
        RRQ_VECTOR | RKE_VECTOR => {
            // Nothing to do beyond the EOI the stub already issues: the
            // next `schedule()` call drains the remote queue, and hazard
            // bits are re-checked on every `ret_user_*` path.
        }
        TIMER_VECTOR => crate::timeout::on_interrupt(),
        other => {
            logger::debug!("trap: unhandled IRQ vector {other}");
        }
    }
}

/// Sends the RRQ kernel IPI named by [`scheduler::RemoteEnqueueOutcome`] to
/// wake an idle CPU after a cross-CPU enqueue. The syscall layer calls this
/// whenever a scheduler or IPC operation reports `SendRrq`.
///
/// # Safety
/// `apic_id` must be a CPU currently online and accepting IPIs.
pub unsafe fn send_rrq(apic_id: u32) {
    unsafe { drivers::interrupt::send_kernel_ipi(apic_id, KernelIpi::Rrq) };
}

/// # Safety
/// `apic_id` must be a CPU currently online and accepting IPIs.
pub unsafe fn send_rke(apic_id: u32) {
    unsafe { drivers::interrupt::send_kernel_ipi(apic_id, KernelIpi::Rke) };
}
