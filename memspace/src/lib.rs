//! Per-PD host, guest, DMA, pio and msr memory spaces.
//!
//! A [`space::Space`] is a permission map from a page-granular key (a
//! guest-physical page for GST, a bus-physical page for DMA, a port or MSR
//! index for PIO/MSR) to `(backing page, order, permission, memory type)`.
//! `delegate` atomically copies a range of entries from one space into
//! another, masking permissions and carrying the source's shareability and
//! cacheability forward. Permission-reducing or remapping updates mark the
//! space's dirty CPU set so the syscall layer can drive a shootdown before
//! the change is considered complete.
//!
//! Building and walking the actual hardware page-table format (nested
//! page tables / extended page tables) is left to the virtualization
//! engine at world-switch time; this crate only tracks the logical
//! mapping and permission state a PD is accountable for.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod attrs;
pub mod pd_spaces;
pub mod space;

pub use attrs::{Cacheability, Permission, Shareability};
pub use pd_spaces::PdSpaces;
pub use space::{Space, SpaceKind};
