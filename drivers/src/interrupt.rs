//! Physical interrupt routing (spec §4.H).
//!
//! Binding a vector to what it *means* (which SM to signal, which
//! scheduler remote queue to drain) is kernel-level policy; this module
//! only owns what talks to the controller hardware, the same split
//! [`arch::x86_64::apic`] already draws between register access and
//! dispatch. GSI/vector assignment is tracked here because it is, at
//! bottom, the same IO APIC redirection-table write `ioapic::override_irq`
//! already performs for the legacy PIT/RTC lines.

use arch::x86_64::apic::{Destination, DestinationShorthand, Level, TriggerMode, ioapic, lapic::LocalApic};
use arch::x86_64::apic::DeliveryMode as ApicDeliveryMode;

/// The kernel's two cross-CPU request classes (spec §4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelIpi {
    /// "Remote ready": a CPU enqueued work on your remote queue; drain it.
    Rrq,
    /// "Remote kick": re-evaluate hazards (sleep requested, shootdown
    /// pending).
    Rke,
}

/// Vector reserved for [`KernelIpi::Rrq`].
pub const RRQ_VECTOR: u8 = 253;
/// Vector reserved for [`KernelIpi::Rke`].
pub const RKE_VECTOR: u8 = 252;
/// Vector the per-EC deadline timer's interrupt is routed to (spec §4.I).
pub const TIMER_VECTOR: u8 = 251;

impl KernelIpi {
    const fn vector(self) -> u8 {
        match self {
            KernelIpi::Rrq => RRQ_VECTOR,
            KernelIpi::Rke => RKE_VECTOR,
        }
    }
}

/// Sends `ipi` to the CPU owning local APIC `apic_id`.
///
/// # Safety
/// Same caveats as [`LocalApic::send_ipi`]: the target CPU must actually
/// exist and be prepared to take an interrupt on this vector.
pub unsafe fn send_kernel_ipi(apic_id: u32, ipi: KernelIpi) {
    let destination = Destination::new(apic_id as u8, false).expect("physical destination");
    unsafe {
        LocalApic::get_apic(apic_id).send_ipi(
            ipi.vector(),
            ApicDeliveryMode::Fixed,
            destination,
            Level::Assert,
            TriggerMode::EdgeTriggered,
            DestinationShorthand::NoShorthand,
        );
    }
}

/// A device's message-signalled-interrupt address/data pair, handed back
/// to a driver so it can program its MSI/MSI-X capability.
#[derive(Debug, Clone, Copy)]
pub struct MsiTarget {
    pub address: u64,
    pub data: u32,
}

/// Computes the address/data pair that delivers `vector` to `apic_id` via
/// MSI, per the standard x86 "Destination ID in bits 12..19 of 0xFEE00000"
/// format every MSI-capable device on the platform understands.
#[must_use]
pub fn msi_target(apic_id: u32, vector: u8) -> MsiTarget {
    const MSI_ADDRESS_BASE: u64 = 0xFEE0_0000;
    MsiTarget {
        address: MSI_ADDRESS_BASE | (u64::from(apic_id) << 12),
        data: u32::from(vector),
    }
}

/// Assigns GSI `gsi` to `vector`, routed to `apic_id`, via the IO APIC
/// redirection table. `active_low`/`level_triggered` mirror the ACPI MADT
/// interrupt-source-override flags (spec's `assign_int` "configures the
/// physical controller" half).
///
/// # Safety
/// `gsi` must belong to an IO APIC already registered with
/// [`ioapic::add`].
pub unsafe fn assign_gsi(
    gsi: u32,
    vector: u8,
    apic_id: u32,
    active_low: bool,
    level_triggered: bool,
) -> Result<(), ()> {
    let flags = (u16::from(active_low) << 1) | (u16::from(level_triggered) << 3);
    unsafe {
        ioapic::override_irq_to(
            vector,
            gsi,
            flags,
            ApicDeliveryMode::Fixed,
            Some(apic_id as u8),
        )
    }
}
