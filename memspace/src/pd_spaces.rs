//! The aggregate of memory spaces a single PD owns: always a host space,
//! and optionally guest, DMA, pio and msr spaces depending on what the PD
//! was configured with at creation time (spec's `create_pd` sub-op).

use alloc::boxed::Box;

use crate::space::{Space, SpaceKind};

pub struct PdSpaces {
    pub host: Space,
    pub guest: Option<Box<Space>>,
    pub dma: Option<Box<Space>>,
    pub pio: Option<Box<Space>>,
    pub msr: Option<Box<Space>>,
}

impl PdSpaces {
    /// Every PD gets a host space; the rest start absent and are added by
    /// a later `create_pd` sub-op call.
    #[must_use]
    pub fn new() -> Self {
        Self {
            host: Space::new(SpaceKind::Host),
            guest: None,
            dma: None,
            pio: None,
            msr: None,
        }
    }

    pub fn add_guest(&mut self) -> &Space {
        self.guest.get_or_insert_with(|| Box::new(Space::new(SpaceKind::Guest)))
    }

    pub fn add_dma(&mut self) -> &Space {
        self.dma.get_or_insert_with(|| Box::new(Space::new(SpaceKind::Dma)))
    }

    pub fn add_pio(&mut self) -> &Space {
        self.pio.get_or_insert_with(|| Box::new(Space::new(SpaceKind::Pio)))
    }

    pub fn add_msr(&mut self) -> &Space {
        self.msr.get_or_insert_with(|| Box::new(Space::new(SpaceKind::Msr)))
    }
}

impl Default for PdSpaces {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_has_only_host() {
        let spaces = PdSpaces::new();
        assert_eq!(spaces.host.kind(), SpaceKind::Host);
        assert!(spaces.guest.is_none());
    }

    #[test]
    fn add_guest_is_idempotent() {
        let mut spaces = PdSpaces::new();
        spaces.add_guest();
        assert!(spaces.guest.is_some());
        spaces.add_guest();
        assert_eq!(spaces.guest.as_ref().unwrap().kind(), SpaceKind::Guest);
    }
}
