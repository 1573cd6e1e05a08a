//! Interface and driver for the IO APIC

use alloc::vec::Vec;
use core::cell::SyncUnsafeCell;
use modular_bitfield::prelude::*;

use utils::mem::{
    PhysAddr,
    mmio::{MmioArea, Offsetable},
};

use super::DeliveryMode;
use crate::{
    map_page_to,
    paging::{Flags, PageSize},
    x86_64::X86_64,
};

static IO_APICS: SyncUnsafeCell<Vec<IoApic>> = SyncUnsafeCell::new(Vec::new());

/// Struct representing the IO APIC, containing everything needed to interact with it
#[derive(Debug)]
pub struct IoApic {
    /// The select register. The index of the register is written here in order for it to be
    /// accessible in the `win` register
    io_sel: MmioArea<usize, usize, u32>,
    /// The window register. This is where the data is read from and written to
    io_win: MmioArea<usize, usize, u32>,
    /// The base of the global system interrupts (GSIs) that this IO APIC is responsible for
    gsi_base: u32,
}

struct IoApicReg;

/// The IO APIC's redirection table entry, which configures the behaviour and mapping of the
/// external interrupts
#[bitfield]
#[derive(Debug, Clone, Copy)]
#[repr(u64)]
struct RedirectionEntry {
    /// The vector to be used for this interrupt
    vector: B8,
    /// The delivery mode of the interrupt
    delivery_mode: B3,
    /// The destination mode of the interrupt
    destination_mode: B1,
    /// The delivery status of the interrupt
    delivery_status: B1,
    /// The pin polarity of the interrupt
    pin_polarity: B1,
    /// The remote IRR of the interrupt
    remote_irr: B1,
    /// The trigger mode of the interrupt
    trigger_mode: B1,
    /// The mask of the interrupt
    mask: B1,
    _reserved: B39,
    /// The destination of the interrupt
    destination: B8,
}

impl IoApicReg {
    /// The base index of the redirection table registers
    const APIC_REDIRACTION_TABLE_BASE: u32 = 0x10;

    /// Convert a GSI to the corresponding redirection table index
    #[inline]
    const fn red_tbl_index(irq_index: u32) -> u32 {
        irq_index * 2 + Self::APIC_REDIRACTION_TABLE_BASE
    }
}

impl IoApic {
    /// The offset that needs to be added to the `sel` MMIO address to get the `win` MMIO address
    const OFFSET_FROM_SEL_TO_WIN: usize = 0x10;

    /// Creates a new IO APIC
    unsafe fn new(base: *mut u32, gsi_base: u32) -> Self {
        let io_sel = MmioArea::new(base);
        let io_win = MmioArea::new(unsafe { base.byte_add(Self::OFFSET_FROM_SEL_TO_WIN) });
        IoApic {
            io_sel,
            io_win,
            gsi_base,
        }
    }
}

#[allow(dead_code)]
impl RedirectionEntry {
    /// Get the low 32 bits of the entry
    #[inline]
    fn get_low(self) -> u32 {
        let value: u64 = self.into();
        (value & 0xffff_ffff) as u32
    }

    /// Get the high 32 bits of the entry
    #[inline]
    fn get_high(self) -> u32 {
        let value: u64 = self.into();
        ((value >> 32) & 0xffff_ffff) as u32
    }
}

/// Adds an IO APIC to the global list of IO APICs
pub unsafe fn add(phys_addr: PhysAddr, gsi_base: u32) {
    let virt_addr = phys_addr.add_hhdm_offset();

    unsafe {
        map_page_to::<X86_64>(
            phys_addr,
            virt_addr,
            Flags::new().set_read_write(true),
            PageSize::size_4kb(),
        )
        .expect("Failed to map IO APIC MMIO region");

        let io_apics = IO_APICS.get().as_mut().unwrap();
        io_apics.push(IoApic::new(virt_addr.into(), gsi_base));
    };
}

/// Overrides the identity mapping of a specific IRQ in the system
#[inline]
pub unsafe fn override_irq(
    irq_source: u8,
    gsi: u32,
    flags: u16,
    delivery_mode: DeliveryMode,
) -> Result<(), ()> {
    unsafe { override_irq_to(irq_source, gsi, flags, delivery_mode, None) }
}

/// Like [`override_irq`], but also pins the redirection entry's
/// destination field to a specific local APIC ID. `destination` of `None`
/// leaves the field as read back from hardware (the firmware/BIOS
/// default, usually the BSP).
#[inline]
pub unsafe fn override_irq_to(
    irq_source: u8,
    gsi: u32,
    flags: u16,
    delivery_mode: DeliveryMode,
    destination: Option<u8>,
) -> Result<(), ()> {
    unsafe {
        let io_apics = IO_APICS.get().as_ref().unwrap();
        io_apics
            .iter()
            .find(|&io_apic| io_apic.gsi_base <= gsi)
            .map(|io_apic| {
                let offset = IoApicReg::red_tbl_index(gsi - io_apic.gsi_base) as usize;

                let mut entry: RedirectionEntry = {
                    io_apic.io_sel.write(0, offset as u32);
                    let mut raw: u64 = u64::from(io_apic.io_win.read(0));
                    io_apic.io_sel.write(0, offset as u32 + 1);
                    raw |= u64::from(io_apic.io_win.read(0)) << 32;

                    raw.into()
                };

                entry.set_vector(irq_source);
                entry.set_pin_polarity(((flags & 2) >> 1) as u8);
                entry.set_trigger_mode(((flags & 8) >> 3) as u8);
                entry.set_delivery_mode(delivery_mode as u8);
                if let Some(destination) = destination {
                    entry.set_destination(destination);
                }

                io_apic.io_sel.write(0, offset as u32);
                io_apic.io_win.write(0, entry.get_low());
                io_apic.io_sel.write(0, offset as u32 + 1);
                io_apic.io_win.write(0, entry.get_high());
            });
    }

    Ok(())
}
