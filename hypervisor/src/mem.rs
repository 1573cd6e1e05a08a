//! Nested/guest-physical address space backing a vCPU's VMCB `n_cr3`
//! (spec §4.G). `memspace::Space` only tracks the logical guest-phys ->
//! host-phys mapping a PD is accountable for; turning that into the actual
//! hardware nested-page-table format is this crate's job.

use arch::paging::{Flags, PageSize};
use arch::x86_64::X86_64;
use arch::x86_64::paging::PageTable;
use memspace::Permission;
use utils::mem::{PhysAddr, VirtAddr};

/// An independent top-level page table used as a VMCB's nested-paging
/// root. Never the CPU's active CR3; only ever referenced via `n_cr3`.
pub struct GuestAddressSpace {
    table: &'static mut PageTable,
    root: PhysAddr,
}

impl GuestAddressSpace {
    /// Allocates a fresh, empty nested-paging root.
    #[must_use]
    pub fn new() -> Self {
        let (table, root) = PageTable::new();
        Self { table, root }
    }

    #[must_use]
    pub fn root(&self) -> PhysAddr {
        self.root
    }

    /// Installs a single guest-physical page at `gpa` backed by `hpa`,
    /// with the leaf permission translated from the owning
    /// `memspace::Space`'s attributes. Called by the fault-in path once
    /// the syscall layer has resolved `gpa` against the guest's
    /// `Space::lookup`.
    pub fn install_page(&mut self, gpa: usize, hpa: PhysAddr, perm: Permission) {
        let flags = flags_from_permission(perm);
        unsafe {
            // A second install at the same `gpa` (e.g. after a permission
            // upgrade) overwrites the existing leaf; the caller is
            // responsible for having shot down any stale TLB entry first.
            let _ = self
                .table
                .map(VirtAddr(gpa), hpa, PageSize::<X86_64>::size_4kb(), flags);
        }
    }
}

impl Default for GuestAddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

fn flags_from_permission(perm: Permission) -> Flags<X86_64> {
    Flags::<X86_64>::new()
        .set_read_write(perm.contains(Permission::W))
        .set_user_supervisor(perm.contains(Permission::U))
        .set_execute_disable(!(perm.contains(Permission::X_USER) || perm.contains(Permission::X_SUPER)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_guest_address_space_has_a_page_aligned_root() {
        let gas = GuestAddressSpace::new();
        assert_eq!(gas.root().0 & 0xfff, 0);
    }
}
