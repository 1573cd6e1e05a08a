//! Dynamically registered ISRs, for devices whose vector isn't one of the fixed ones wired up in
//! [`super::interrupts`].

use macros::isr;

use super::trap::dispatch_irq;

pub const GENERIC_ISR_VECTOR: u8 = 255;

#[isr]
pub fn generic_irq_isr() {
    dispatch_irq(GENERIC_ISR_VECTOR);
    super::apic::lapic::signal_eoi_this_cpu();
}
