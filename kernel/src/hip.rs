//! The Hypervisor Information Page (spec §6): a read-only page published
//! to the root EC describing the running image, its console buffer, the
//! root task's own load extent, and the object-space/event/CPU geometry
//! the root task needs to bootstrap without guessing kernel constants.

use core::sync::atomic::{AtomicU32, Ordering};

use captab::sc::PRIORITY_LEVELS;
use utils::MAX_CPUS;

const SIGNATURE: u32 = 0x5641_4e48; // "HNAV", little-endian for "NAVH"

/// One populated CPU's APIC id and feature bits, as published in the
/// HIP's trailing CPU-descriptor array.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct HipCpuDesc {
    pub apic_id: u32,
    pub flags: u32,
}

/// A loaded extent: host-virtual base and length in bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct HipExtent {
    pub addr: u64,
    pub size: u64,
}

/// Fixed-size header; the CPU descriptor array follows immediately after
/// in the same page, sized by `cpu_count`.
#[repr(C)]
pub struct Hip {
    pub signature: u32,
    pub checksum: AtomicU32,
    pub kernel_image: HipExtent,
    pub console: HipExtent,
    pub root_task: HipExtent,
    /// Number of selector bits a PD's object space is addressable over.
    pub obj_space_width: u32,
    /// Number of synthetic event selectors reserved past the CPU fault
    /// vectors (`ipc::upcall::VTIMER + 1`), per PD's `event_base` stride.
    pub event_selectors: u32,
    pub priority_levels: u32,
    pub cpu_count: u32,
    pub cpus: [HipCpuDesc; MAX_CPUS],
}

impl Hip {
    /// Builds the page contents. Called once at boot after the root PD's
    /// image and console extents are known; the checksum is computed over
    /// everything but itself, matching the "NOVA signature, checksum"
    /// pairing spec.md describes.
    #[must_use]
    pub fn build(kernel_image: HipExtent, console: HipExtent, root_task: HipExtent, cpus: &[HipCpuDesc]) -> Self {
        let mut table = [HipCpuDesc::default(); MAX_CPUS];
        table[..cpus.len()].copy_from_slice(cpus);

        let mut hip = Self {
            signature: SIGNATURE,
            checksum: AtomicU32::new(0),
            kernel_image,
            console,
            root_task,
            obj_space_width: usize::BITS,
            event_selectors: (ipc::upcall::VTIMER + 1) as u32,
            priority_levels: u32::from(PRIORITY_LEVELS),
            cpu_count: cpus.len() as u32,
            cpus: table,
        };
        hip.checksum.store(hip.compute_checksum(), Ordering::Release);
        hip
    }

    fn compute_checksum(&self) -> u32 {
        let mut sum: u32 = self.signature;
        sum = sum.wrapping_add(self.kernel_image.addr as u32).wrapping_add(self.kernel_image.size as u32);
        sum = sum.wrapping_add(self.console.addr as u32).wrapping_add(self.console.size as u32);
        sum = sum.wrapping_add(self.root_task.addr as u32).wrapping_add(self.root_task.size as u32);
        sum = sum.wrapping_add(self.obj_space_width);
        sum = sum.wrapping_add(self.event_selectors);
        sum = sum.wrapping_add(self.priority_levels);
        sum = sum.wrapping_add(self.cpu_count);
        for cpu in &self.cpus[..self.cpu_count as usize] {
            sum = sum.wrapping_add(cpu.apic_id).wrapping_add(cpu.flags);
        }
        sum
    }

    #[must_use]
    pub fn checksum_valid(&self) -> bool {
        self.checksum.load(Ordering::Acquire) == self.compute_checksum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_validates_fresh_build() {
        let hip = Hip::build(
            HipExtent { addr: 0x1000, size: 0x2000 },
            HipExtent { addr: 0x3000, size: 0x1000 },
            HipExtent { addr: 0x10_0000, size: 0x8000 },
            &[HipCpuDesc { apic_id: 0, flags: 1 }],
        );
        assert!(hip.checksum_valid());
        assert_eq!(hip.cpu_count, 1);
    }
}
