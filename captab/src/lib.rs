//! The capability table and kernel-object factories: PD, EC, SC, PT, SM.

#![cfg_attr(not(test), no_std)]
#![feature(allocator_api)]

extern crate alloc;

pub mod capability;
pub mod ec;
pub mod error;
pub mod object;
pub mod pd;
pub mod pt;
pub mod rcu;
pub mod sc;
pub mod sm;
pub mod space;

pub use capability::Capability;
pub use error::{KernelError, KernelResult};
pub use object::{EcSubKind, ObjectHeader, ObjectKind};
