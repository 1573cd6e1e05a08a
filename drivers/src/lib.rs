//! Various drivers and driver interfaces
#![no_std]

extern crate alloc;

pub mod bus;
pub mod interrupt;
#[cfg(feature = "iommu")]
pub mod iommu;
pub mod timer;
