//! Bus enumeration and transport drivers

#[cfg(feature = "pcie")]
pub mod pcie;
