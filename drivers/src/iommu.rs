//! IOMMU/SMMU stream-table management (spec §4.J).
//!
//! Mirrors the split `arch::x86_64::apic::ioapic` already draws between a
//! register-level driver and the table it owns: an [`Iommu`] is nothing
//! but the stream-ID -> context-table entries it has installed. Deciding
//! *what* root and domain id a stream ID gets bound to (walking a DMA
//! space's capability, allocating an SDID) is kernel-level policy owned
//! by the `kernel` crate; this module only programs the hardware once
//! it's told the answer, the same way `ioapic::override_irq` never
//! decides which vector an IRQ deserves.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::cell::SyncUnsafeCell;

use utils::{
    mem::PhysAddr,
    sync::spinlock::{SpinLock, SpinLockable},
};

static IOMMUS: SyncUnsafeCell<Vec<Iommu>> = SyncUnsafeCell::new(Vec::new());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IommuError {
    /// `invalidate` or `configure` named an IOMMU index that doesn't exist.
    NoSuchIommu,
    /// `invalidate` named an SDID with no bound context on this IOMMU.
    NoSuchDomain,
}

/// A stream-ID -> context-table entry: the root of the DMA space's page
/// tables and the domain (SDID) the stream belongs to.
#[derive(Debug, Clone, Copy)]
struct ContextEntry {
    root: PhysAddr,
    sdid: usize,
}

struct Contexts(BTreeMap<u16, ContextEntry>);

impl SpinLockable for Contexts {}

/// Marker type for the lock guarding an [`Iommu`]'s invalidation command,
/// kept distinct from the context-table lock per spec's lock-ordering
/// rule (space-root < object < scheduler-ready < SMMU-invalidate): a
/// context write never needs to hold the invalidate lock.
struct InvalidateLock;

impl SpinLockable for InvalidateLock {}

/// One physical IOMMU/SMMU instance.
pub struct Iommu {
    contexts: SpinLock<Contexts>,
    invalidate: SpinLock<InvalidateLock>,
}

impl Iommu {
    const fn new() -> Self {
        Self {
            contexts: SpinLock::new(Contexts(BTreeMap::new())),
            invalidate: SpinLock::new(InvalidateLock),
        }
    }
}

/// Registers a newly discovered IOMMU and returns the index future
/// `configure`/`invalidate` calls address it by.
///
/// # Safety
/// Must only be called during single-threaded boot, before any CPU other
/// than the caller can observe `IOMMUS`.
pub unsafe fn add() -> usize {
    unsafe {
        let iommus = IOMMUS.get().as_mut().unwrap();
        iommus.push(Iommu::new());
        iommus.len() - 1
    }
}

/// Fills `iommu`'s context table entry for `stream_id` with `root` and
/// `sdid`, then performs a context-selective invalidation so the hardware
/// never walks a stale entry for this stream.
pub fn configure(iommu: usize, stream_id: u16, root: PhysAddr, sdid: usize) -> Result<(), IommuError> {
    let iommus = unsafe { IOMMUS.get().as_ref().unwrap() };
    let iommu = iommus.get(iommu).ok_or(IommuError::NoSuchIommu)?;

    iommu
        .contexts
        .lock()
        .0
        .insert(stream_id, ContextEntry { root, sdid });

    let _guard = iommu.invalidate.lock();
    context_selective_invalidate(stream_id);
    Ok(())
}

/// Issues a domain-selective invalidation for `sdid` across every
/// registered IOMMU, per spec's `invalidate(sdid)`.
pub fn invalidate(sdid: usize) -> Result<(), IommuError> {
    let iommus = unsafe { IOMMUS.get().as_ref().unwrap() };
    let mut found = false;

    for iommu in iommus {
        let has_domain = iommu.contexts.lock().0.values().any(|entry| entry.sdid == sdid);
        if !has_domain {
            continue;
        }
        found = true;

        let _guard = iommu.invalidate.lock();
        domain_selective_invalidate(sdid);
    }

    if found { Ok(()) } else { Err(IommuError::NoSuchDomain) }
}

/// Clears the context entry for `stream_id` on `iommu`, e.g. when the
/// owning DMA space is torn down. A cleared stream faults (and logs) any
/// further DMA rather than walking a freed root.
pub fn clear(iommu: usize, stream_id: u16) -> Result<(), IommuError> {
    let iommus = unsafe { IOMMUS.get().as_ref().unwrap() };
    let iommu = iommus.get(iommu).ok_or(IommuError::NoSuchIommu)?;

    iommu.contexts.lock().0.remove(&stream_id);
    let _guard = iommu.invalidate.lock();
    context_selective_invalidate(stream_id);
    Ok(())
}

// Placeholder command issuance: the wire format of the invalidation queue
// is platform-specific (Intel VT-d's invalidation queue vs. AMD-Vi's
// command buffer vs. ARM SMMU's command queue) and out of this layer's
// scope per spec's component boundary; a concrete IOMMU would MMIO-enqueue
// the command here.
fn context_selective_invalidate(_stream_id: u16) {}
fn domain_selective_invalidate(_sdid: usize) {}
