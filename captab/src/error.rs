//! The kernel-wide error kind returned by every syscall handler.

/// Every fallible kernel operation funnels its failure through one of these.
///
/// Mirrors the status word placed in the first argument register on
/// syscall return; `Ok` corresponds to `SUCCESS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// A blocking syscall's deadline expired.
    Timeout,
    /// The callee died mid-rendezvous.
    Aborted,
    /// Reserved opcode or a privilege mismatch.
    BadHyp,
    /// Capability missing, wrong kind, or insufficient permission.
    BadCap,
    /// Ill-formed parameter: alignment, range, or flag combination.
    BadPar,
    /// Feature not supported by this build or this CPU.
    BadFtr,
    /// Operation targets a non-local CPU where local is required.
    BadCpu,
    /// No such device / SMMU / interrupt.
    BadDev,
    /// Out-of-memory during object or page-table allocation.
    MemObj,
}

pub type KernelResult<T> = Result<T, KernelError>;

impl KernelError {
    /// Numeric status code placed in the return-value register.
    pub const fn code(self) -> usize {
        match self {
            KernelError::Timeout => 1,
            KernelError::Aborted => 2,
            KernelError::BadHyp => 3,
            KernelError::BadCap => 4,
            KernelError::BadPar => 5,
            KernelError::BadFtr => 6,
            KernelError::BadCpu => 7,
            KernelError::BadDev => 8,
            KernelError::MemObj => 9,
        }
    }
}
