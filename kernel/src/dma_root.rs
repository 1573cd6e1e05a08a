//! Supplies `assign_dev` with the two things `memspace::Space` doesn't
//! carry itself: a literal physical page-table root to hand the IOMMU and
//! an allocated stream domain id (SDID).
//!
//! `memspace::Space` is a software-only permission map (see its own doc
//! comment: "building and walking the actual hardware page-table format
//! ... is left to the virtualization engine"); a DMA space has no
//! hardware root of its own until something is asked to program one.
//! Mirrors `drivers::iommu`'s own stance that the invalidation-queue wire
//! format is out of scope: this allocates a single zeroed page as a
//! placeholder root rather than building a real IOMMU page-table walker,
//! recorded as an Open Question resolution in DESIGN.md.

use utils::collections::id::{Id, tracker::IdTracker};
use utils::mem::{PhysAddr, memset};
use utils::sync::spinlock::SpinLock;

use captab::error::{KernelError, KernelResult};

/// SDIDs are a 16-bit hardware-visible domain id on most IOMMUs; reserve
/// the low half of that space here.
const SDID_POOL_END: usize = 0x7fff;

static SDID_ALLOCATOR: SpinLock<IdTracker> = SpinLock::new(IdTracker::uninit());

/// Initializes the SDID pool. Must be called exactly once during boot,
/// before the first `assign_dev` syscall; mirrors
/// `hypervisor::svm::Svm::start`'s `init_asid_allocator` step for the
/// same reason (the backing bitmap allocates, so it can't be `const`).
pub fn init() {
    *SDID_ALLOCATOR.lock() = IdTracker::new(Id(0)..Id(SDID_POOL_END));
}

/// Allocates a fresh SDID and a zeroed placeholder physical page to serve
/// as a DMA space's IOMMU context-table root.
pub fn allocate(sdid_out: &mut usize) -> KernelResult<PhysAddr> {
    let id = SDID_ALLOCATOR.lock().allocate().map_err(|_| KernelError::BadDev)?;
    *sdid_out = id.0;

    let page = pmm::get().allocate(1, 1).map_err(|_| KernelError::MemObj)?;
    let mapped = page.add_hhdm_offset();
    unsafe { memset(mapped.0 as *mut u8, 0, arch::BASIC_PAGE_SIZE) };

    Ok(page)
}
