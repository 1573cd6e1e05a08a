//! Parser for the HPET table: maps the HPET's MMIO block and hands its
//! base address to `drivers::timer::hpet::Hpet::init`, the same driver
//! `kernel::timeout` reads ticks from and arms deadlines through.

use super::{AcpiError, AcpiTable, SdtHeader};
use crate::{arch::x86_64::paging::Entry, mem::{PhysAddr, vmm::map_page}};

/// ACPI Generic Address Structure, as embedded in the HPET table.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
struct Gas {
    address_space_id: u8,
    register_bit_width: u8,
    register_bit_offset: u8,
    _reserved: u8,
    address: u64,
}

/// The HPET table structure
#[repr(C, packed)]
#[derive(Debug)]
pub(super) struct Hpet {
    header: SdtHeader,
    event_timer_block_id: u32,
    base_addr: Gas,
    minimum_tick: u16,
    page_protection_n_oem_attr: u8,
}

impl Hpet {
    pub fn setup_hpet(&self) -> Result<(), AcpiError> {
        self.header.validate_checksum()?;

        // SAFETY: This should be OK since we're mapping a physical address that is marked as
        // reserved, so the kernel shouldn't be tracking it
        unsafe {
            let phys_addr = PhysAddr(self.base_addr.address as usize);
            let virt_addr = map_page(phys_addr, Entry::FLAG_RW);

            drivers::timer::hpet::Hpet::init(virt_addr.into());
        }

        log_info!("Configured HPET as timer");

        Ok(())
    }
}

impl AcpiTable for Hpet {
    const SIGNATURE: &'static [u8; 4] = b"HPET";
}
