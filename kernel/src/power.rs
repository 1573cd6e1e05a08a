//! Root-PD-only platform power control (spec §6 `ctrl_hw`). ACPI sleep
//! transitions themselves are out of scope (spec.md's Non-goals exclude
//! the ACPI subsystem this build carries only for MADT/MCFG discovery);
//! this module just gatekeeps the syscall to the one PD allowed to ask
//! and reports that the feature isn't built, per spec's `BAD_FTR` status.

use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};

use captab::error::{KernelError, KernelResult};
use captab::pd::Pd;

static ROOT_PD: AtomicUsize = AtomicUsize::new(0);

/// Records `pd` as the root PD. Called exactly once at boot, right after
/// `Pd::bootstrap_root` creates it.
pub fn set_root(pd: NonNull<Pd>) {
    ROOT_PD.store(pd.as_ptr().addr(), Ordering::Release);
}

#[must_use]
pub fn is_root(pd: NonNull<Pd>) -> bool {
    ROOT_PD.load(Ordering::Acquire) == pd.as_ptr().addr()
}

/// Handles `ctrl_hw`'s sleep-transition request. Always `BadFtr`: this
/// build has no ACPI `\_S5`-style sleep-state machinery, only the MADT
/// discovery the legacy boot path already runs.
pub fn request_sleep(requestor: NonNull<Pd>) -> KernelResult<()> {
    if !is_root(requestor) {
        return Err(KernelError::BadHyp);
    }
    Err(KernelError::BadFtr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::boxed::Box;

    #[test]
    fn non_root_pd_is_rejected_before_checking_feature_support() {
        let root = NonNull::from(Box::leak(Box::new(Pd::bootstrap_root())));
        set_root(root);

        let other = NonNull::from(Box::leak(Box::new(Pd::bootstrap_root())));
        assert_eq!(request_sleep(other), Err(KernelError::BadHyp));
    }

    #[test]
    fn root_pd_gets_bad_ftr() {
        let root = NonNull::from(Box::leak(Box::new(Pd::bootstrap_root())));
        set_root(root);
        assert_eq!(request_sleep(root), Err(KernelError::BadFtr));
    }
}
