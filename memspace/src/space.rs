//! A single memory space: the permission map belonging to one of a PD's
//! host / guest / DMA / pio / msr slots.

use alloc::collections::BTreeMap;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use captab::{KernelError, KernelResult};
use utils::MAX_CPUS;
use utils::sync::spinlock::{SpinLock, SpinLockable};

use crate::attrs::{Cacheability, Permission, Shareability};

/// Sentinel meaning "no IOMMU domain assigned"; only meaningful for
/// [`SpaceKind::Dma`].
const NO_SDID: usize = usize::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceKind {
    Host,
    Guest,
    Dma,
    Pio,
    Msr,
}

#[derive(Clone, Copy)]
struct Leaf {
    /// Page-granular backing address: a host/guest/bus-phys page number for
    /// Host/Guest/Dma, or the raw port/MSR index for Pio/Msr.
    backing_page: usize,
    /// `log2` of the leaf's page count; a leaf covers `[key, key + 2^order)`.
    order: u32,
    perm: Permission,
    shareability: Shareability,
    cacheability: Cacheability,
}

struct Mappings(BTreeMap<usize, Leaf>);

impl SpinLockable for Mappings {}

/// One of a PD's memory spaces.
pub struct Space {
    kind: SpaceKind,
    sdid: AtomicUsize,
    /// Bumped on every permission-reducing or remapping update.
    generation: AtomicU64,
    /// Bitmask of CPUs that currently hold this space loaded as their
    /// active translation table.
    active_cpus: AtomicU64,
    /// Per-CPU last-observed generation; a CPU is stale with respect to
    /// this space iff it's in `active_cpus` and its entry here lags
    /// `generation`.
    observed: [AtomicU64; MAX_CPUS],
    mappings: SpinLock<Mappings>,
}

impl Space {
    #[must_use]
    pub fn new(kind: SpaceKind) -> Self {
        Self {
            kind,
            sdid: AtomicUsize::new(NO_SDID),
            generation: AtomicU64::new(0),
            active_cpus: AtomicU64::new(0),
            observed: [const { AtomicU64::new(0) }; MAX_CPUS],
            mappings: SpinLock::new(Mappings(BTreeMap::new())),
        }
    }

    #[must_use]
    pub fn kind(&self) -> SpaceKind {
        self.kind
    }

    /// Binds an IOMMU domain identifier to this (DMA) space. Overwriting an
    /// existing binding is a caller error.
    pub fn assign_sdid(&self, sdid: usize) -> KernelResult<()> {
        self.sdid
            .compare_exchange(NO_SDID, sdid, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| KernelError::BadDev)
    }

    pub fn sdid(&self) -> Option<usize> {
        match self.sdid.load(Ordering::Acquire) {
            NO_SDID => None,
            id => Some(id),
        }
    }

    /// Installs a leaf `[key, key + 2^order)` -> `backing_page` with the
    /// given attributes. An exact-match leaf already present is coalesced
    /// (replaced in place); a partially-overlapping leaf is rejected with
    /// `BadPar` rather than split, since the on-disk format of a real
    /// nested-page-table split is architecture-specific and out of this
    /// layer's scope.
    pub fn map(
        &self,
        key: usize,
        backing_page: usize,
        order: u32,
        perm: Permission,
        shareability: Shareability,
        cacheability: Cacheability,
    ) -> KernelResult<()> {
        let count = 1usize << order;
        if key & (count - 1) != 0 {
            return Err(KernelError::BadPar);
        }

        let mut mappings = self.mappings.lock();
        if let Some(existing) = overlapping(&mappings.0, key, order)
            && !(existing.0 == key && existing.1.order == order)
        {
            return Err(KernelError::BadPar);
        }

        mappings.0.insert(
            key,
            Leaf {
                backing_page,
                order,
                perm,
                shareability,
                cacheability,
            },
        );
        Ok(())
    }

    /// Removes the leaf starting exactly at `key` with the given `order`,
    /// if present.
    pub fn unmap(&self, key: usize, order: u32) {
        let mut mappings = self.mappings.lock();
        if let Some(leaf) = mappings.0.get(&key)
            && leaf.order == order
        {
            mappings.0.remove(&key);
        }
    }

    /// Returns the largest leaf containing `key`, per spec's
    /// `lookup(va) -> (pa, order, ma, perm)`.
    #[must_use]
    pub fn lookup(&self, key: usize) -> Option<(usize, u32, Shareability, Cacheability, Permission)> {
        let mappings = self.mappings.lock();
        let (base, leaf) = overlapping(&mappings.0, key, 0)?;
        let offset = key - base;
        Some((
            leaf.backing_page + offset,
            leaf.order,
            leaf.shareability,
            leaf.cacheability,
            leaf.perm,
        ))
    }

    /// Copies the exact leaf at `[src_key, src_key + 2^order)` of `src`
    /// into `dst` at `dst_key`, masking permissions by `permission_mask`
    /// and carrying `src`'s shareability/cacheability forward unchanged.
    /// Installing a permission subset never needs a shootdown; the caller
    /// is the one adding the range to `dst`, which starts unmapped there.
    pub fn delegate(
        src: &Space,
        dst: &Space,
        src_key: usize,
        dst_key: usize,
        order: u32,
        permission_mask: Permission,
    ) -> KernelResult<()> {
        let count = 1usize << order;
        if src_key & (count - 1) != 0 || dst_key & (count - 1) != 0 {
            return Err(KernelError::BadPar);
        }

        let leaf = {
            let mappings = src.mappings.lock();
            let leaf = mappings.0.get(&src_key).copied().ok_or(KernelError::BadCap)?;
            if leaf.order != order {
                return Err(KernelError::BadCap);
            }
            leaf
        };

        dst.map(
            dst_key,
            leaf.backing_page,
            order,
            leaf.perm & permission_mask,
            leaf.shareability,
            leaf.cacheability,
        )
    }

    /// Narrows the permission of the leaf at `key` in place. Returns
    /// whether a shootdown is required: skipped when the new permission is
    /// a superset of the old one (strictly growing rights never needs one).
    pub fn update_permission(&self, key: usize, order: u32, new_perm: Permission) -> KernelResult<bool> {
        let mut mappings = self.mappings.lock();
        let leaf = mappings.0.get_mut(&key).ok_or(KernelError::BadCap)?;
        if leaf.order != order {
            return Err(KernelError::BadCap);
        }

        let needs_shootdown = !new_perm.grows_on(leaf.perm);
        leaf.perm = new_perm;
        drop(mappings);

        if needs_shootdown {
            self.generation.fetch_add(1, Ordering::AcqRel);
        }
        Ok(needs_shootdown)
    }

    pub fn mark_active(&self, cpu: usize) {
        self.active_cpus.fetch_or(1 << cpu, Ordering::AcqRel);
        self.observed[cpu].store(self.generation.load(Ordering::Acquire), Ordering::Release);
    }

    pub fn mark_inactive(&self, cpu: usize) {
        self.active_cpus.fetch_and(!(1 << cpu), Ordering::AcqRel);
    }

    /// True iff `cpu` has this space loaded and has not yet observed the
    /// latest generation, i.e. an RKE shootdown targeting `cpu` is still
    /// outstanding.
    #[must_use]
    pub fn is_stale(&self, cpu: usize) -> bool {
        let active = self.active_cpus.load(Ordering::Acquire) & (1 << cpu) != 0;
        active && self.observed[cpu].load(Ordering::Acquire) != self.generation.load(Ordering::Acquire)
    }

    /// Called by a CPU's RKE handler once it has reloaded this space's
    /// translation state, acknowledging the shootdown.
    pub fn acknowledge(&self, cpu: usize) {
        self.observed[cpu].store(self.generation.load(Ordering::Acquire), Ordering::Release);
    }

    /// CPUs that currently have this space active and have not yet
    /// acknowledged the latest generation — the set the caller must send
    /// an RKE to and wait on.
    #[must_use]
    pub fn dirty_cpus(&self) -> u64 {
        let active = self.active_cpus.load(Ordering::Acquire);
        let gen = self.generation.load(Ordering::Acquire);
        let mut dirty = 0u64;
        for cpu in 0..MAX_CPUS {
            if active & (1 << cpu) != 0 && self.observed[cpu].load(Ordering::Acquire) != gen {
                dirty |= 1 << cpu;
            }
        }
        dirty
    }
}

/// Finds the leaf overlapping `[key, key + 2^order)`, if any.
fn overlapping(map: &BTreeMap<usize, Leaf>, key: usize, order: u32) -> Option<(usize, Leaf)> {
    let end = key + (1usize << order);

    if let Some((&base, &leaf)) = map.range(..=key).next_back()
        && base + (1usize << leaf.order) > key
    {
        return Some((base, leaf));
    }

    map.range(key..end).next().map(|(&base, &leaf)| (base, leaf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_then_lookup() {
        let space = Space::new(SpaceKind::Host);
        space
            .map(0x10, 0x100, 2, Permission::R | Permission::W, Shareability::InnerShareable, Cacheability::WriteBack)
            .unwrap();

        let (phys, order, sh, ca, perm) = space.lookup(0x11).unwrap();
        assert_eq!(phys, 0x101);
        assert_eq!(order, 2);
        assert_eq!(sh, Shareability::InnerShareable);
        assert_eq!(ca, Cacheability::WriteBack);
        assert!(perm.contains(Permission::R));
    }

    #[test]
    fn map_rejects_partial_overlap() {
        let space = Space::new(SpaceKind::Host);
        space.map(0x0, 0x0, 2, Permission::R, Shareability::NonShareable, Cacheability::Uncacheable).unwrap();
        assert_eq!(
            space.map(0x2, 0x2, 1, Permission::R, Shareability::NonShareable, Cacheability::Uncacheable),
            Err(KernelError::BadPar)
        );
    }

    #[test]
    fn delegate_masks_and_carries_attributes() {
        let src = Space::new(SpaceKind::Host);
        let dst = Space::new(SpaceKind::Guest);
        src.map(
            0x1000,
            0x1000,
            0,
            Permission::R | Permission::W,
            Shareability::InnerShareable,
            Cacheability::WriteBack,
        )
        .unwrap();

        Space::delegate(&src, &dst, 0x1000, 0x1000, 0, Permission::R | Permission::X_USER).unwrap();

        let (phys, _, sh, ca, perm) = dst.lookup(0x1000).unwrap();
        assert_eq!(phys, 0x1000);
        assert_eq!(sh, Shareability::InnerShareable);
        assert_eq!(ca, Cacheability::WriteBack);
        assert!(perm.contains(Permission::R));
        assert!(!perm.contains(Permission::W));
    }

    #[test]
    fn delegate_rejects_missing_source() {
        let src = Space::new(SpaceKind::Host);
        let dst = Space::new(SpaceKind::Guest);
        assert_eq!(
            Space::delegate(&src, &dst, 0, 0, 0, Permission::R),
            Err(KernelError::BadCap)
        );
    }

    #[test]
    fn growing_permission_skips_shootdown() {
        let space = Space::new(SpaceKind::Host);
        space.map(0, 0, 0, Permission::R, Shareability::NonShareable, Cacheability::Uncacheable).unwrap();
        space.mark_active(0);

        let needs_shootdown = space.update_permission(0, 0, Permission::R | Permission::W).unwrap();
        assert!(!needs_shootdown);
        assert!(!space.is_stale(0));
    }

    #[test]
    fn narrowing_permission_requires_shootdown_ack() {
        let space = Space::new(SpaceKind::Host);
        space
            .map(0, 0, 0, Permission::R | Permission::W, Shareability::NonShareable, Cacheability::Uncacheable)
            .unwrap();
        space.mark_active(0);

        let needs_shootdown = space.update_permission(0, 0, Permission::R).unwrap();
        assert!(needs_shootdown);
        assert!(space.is_stale(0));

        space.acknowledge(0);
        assert!(!space.is_stale(0));
    }
}
