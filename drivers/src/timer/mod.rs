//! This module contains implementations of drivers for various timers.

use core::time::Duration;

#[cfg(all(target_arch = "x86_64", feature = "apic"))]
pub mod apic;
#[cfg(all(target_arch = "x86_64", feature = "hpet"))]
pub mod hpet;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimerError {
    NoTimerAvailable,
    UnsupportedTimerMode,
    InvalidDuration,
}

pub trait Timer {
    type TimerMode;
    type AdditionalConfig;

    fn configure(
        &mut self,
        time: Duration,
        timer_mode: Self::TimerMode,
        additional_config: Self::AdditionalConfig,
    ) -> Result<u64, TimerError>;

    fn set_disabled(&mut self, disable: bool);
}
