//! An HPET driver

use core::{mem::transmute, ptr, time::Duration};

use modular_bitfield::prelude::*;
use utils::{
    id_allocator::{Id, IdAllocator},
    mem::mmio::{MmioArea, Offsetable},
    sync::spinlock::{SpinLock, SpinLockable},
};

use super::{Timer, TimerError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TriggerMode {
    EdgeTriggered = 0b0,
    LevelTriggered = 0b1,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimerMode {
    OneShot = 0b0,
    Periodic = 0b1,
}

/// How (and whether) a timer should raise interrupts.
#[derive(Clone, Copy)]
pub enum DeliveryMode {
    /// The timer only drives the comparator; the caller polls `read_main_counter`.
    Polled,
    /// Route the timer through the generic IRQ ISR, tagged with the IO APIC trigger mode to use.
    Interrupt(unsafe extern "C" fn(), TriggerMode),
}

#[derive(Clone, Copy)]
pub struct AdditionalConfig {
    pub receive_interrupts: bool,
    pub delivery_mode: DeliveryMode,
}

struct ReadableRegs;

struct WriteableRegs;

#[bitfield]
#[derive(Clone, Copy)]
#[repr(u64)]
struct GeneralCapabilities {
    rev_id: B8,
    num_tim_cap: B5,
    count_size_cap: B1,
    _reserved: B1,
    leg_route_cap: B1,
    vendor_id: u16,
    counter_clock_period: u32,
}

#[bitfield]
#[derive(Clone, Copy)]
#[repr(u64)]
struct GeneralConfiguration {
    enable: B1,
    legacy_route: B1,
    _reserved1: B62,
}

#[bitfield]
#[derive(Clone, Copy)]
#[repr(u64)]
struct TimerConfiguration {
    _reserved0: B1,
    int_type: B1,
    int_enable: B1,
    timer_type: B1,
    periodic_int_capable: B1,
    size_capable: B1,
    value_set: B1,
    _reserved1: B1,
    timer_32bit_mode: B1,
    int_route: B5,
    fsb_int_enable: B1,
    fsb_int_delivery: B1,
    _reserved2: B16,
    int_route_cap: B32,
}

/// A HPET specific timer
pub struct HpetTimer {
    area: MmioArea<usize, usize, u64>,
    id: Id,
}

pub struct Hpet {
    area: MmioArea<usize, usize, u64>,
    main_clock_period: u64,
    timer_ids: IdAllocator,
}

const NANO_TO_FEMTOSEC: u128 = 1_000_000;

pub static HPET: SpinLock<Hpet> = SpinLock::new(Hpet {
    area: MmioArea::new(ptr::dangling_mut()),
    main_clock_period: 0,
    timer_ids: IdAllocator::uninit(),
});

impl Hpet {
    /// The maximum amount of timers supported by the HPET
    ///
    /// NOTE: This is not a guarantee, but a limit. The hardware might have less (usually it has 3)
    const MAX_TIMER_AMOUNT: u64 = 32;

    /// Converts the time to cycles.
    ///
    /// If the time is not a multiple of the main clock period, it is rounded up to the next
    /// multiple of the main clock period.
    #[inline]
    pub const fn time_to_cycles(&self, time: Duration) -> u64 {
        let diff = (time.as_nanos() * NANO_TO_FEMTOSEC) % (self.main_clock_period as u128);

        (((time.as_nanos() * NANO_TO_FEMTOSEC) + diff) / (self.main_clock_period as u128)) as u64
    }

    /// Set the HPET's interrupt routing mode
    ///
    /// SAFETY: Calling this outside of initialization can cause UB.
    #[inline]
    unsafe fn set_interrupt_routing(&mut self) {
        let capabilities: GeneralCapabilities =
            unsafe { transmute(self.area.read(ReadableRegs::GENERAL_CAPABILITIES)) };
        assert!(
            capabilities.leg_route_cap() == true.into(),
            "HPET: legacy routing not supported"
        );

        let mut config: GeneralConfiguration =
            unsafe { transmute(self.area.read(ReadableRegs::GENERAL_CONFIGURATION)) };
        config.set_legacy_route(true.into());
        unsafe {
            self.area
                .write(WriteableRegs::GENERAL_CONFIGURATION, config.into());
        }
    }

    /// Initialize the HPET
    ///
    /// This enables the HPET, but the IO APIC redirection entry for whichever GSI the HPET is
    /// wired to must be unmasked separately before it can actually deliver an interrupt.
    ///
    /// SAFETY: Writes to MMIO registers; `base` must already be mapped.
    #[inline]
    pub unsafe fn init(base: *mut u64) {
        let mut hpet = HPET.lock();

        *hpet = Hpet::new(base);

        hpet.set_disabled(true);
        unsafe {
            hpet.set_interrupt_routing();
            hpet.area.write(WriteableRegs::MAIN_COUNTER_VALUE, 0);
        }

        hpet.set_disabled(false);
    }

    fn new(base: *mut u64) -> Self {
        let mut hpet = Self {
            area: MmioArea::new(base),
            main_clock_period: 0,
            timer_ids: IdAllocator::uninit(),
        };

        hpet.main_clock_period = {
            let capabilities: GeneralCapabilities =
                unsafe { transmute(hpet.area.read(ReadableRegs::GENERAL_CAPABILITIES)) };
            utils::sanity_assert!(capabilities.counter_clock_period() != 0);
            utils::sanity_assert!(capabilities.counter_clock_period() < 0x5F5E100);

            capabilities.counter_clock_period().into()
        };

        let max_timer_amount = {
            let capabilities: GeneralCapabilities =
                unsafe { transmute(hpet.area.read(ReadableRegs::GENERAL_CAPABILITIES)) };
            let max_timer_index: u64 = capabilities.num_tim_cap().into();
            utils::sanity_assert!(max_timer_index < Self::MAX_TIMER_AMOUNT);
            max_timer_index as usize + 1
        };

        hpet.timer_ids = IdAllocator::new(Id(0)..Id(max_timer_amount));

        hpet
    }

    /// Enable/disable the HPET (halts the main counter, effectively disabling all timers)
    #[inline]
    pub fn set_disabled(&mut self, state: bool) {
        let mut config: GeneralConfiguration =
            unsafe { transmute(self.area.read(ReadableRegs::GENERAL_CONFIGURATION)) };

        config.set_enable((!state).into());

        unsafe {
            self.area
                .write(WriteableRegs::GENERAL_CONFIGURATION, config.into());
        }
    }
}

impl HpetTimer {
    #[must_use]
    pub fn new() -> Result<Self, TimerError> {
        let mut hpet = HPET.lock();

        let base = hpet.area.base();
        let id = hpet
            .timer_ids
            .allocate()
            .map_err(|_| TimerError::NoTimerAvailable)?;

        // TODO: allocate IO APIC redirection entries for timers other than 0
        assert!(id.0 == 0, "HPET: only timer 0 is supported currently");

        Ok(Self {
            area: MmioArea::new(base),
            id,
        })
    }

    /// Check if the timer has fired
    ///
    /// Only valid for level triggered interrupts; edge triggered timers never set the status bit.
    #[inline]
    pub fn get_status(&self) -> bool {
        unsafe {
            let read = self.area.read(ReadableRegs::GENERAL_INTERRUPT_STATUS) & (1 << self.id.0);
            if read != 0 {
                self.area
                    .write(WriteableRegs::GENERAL_INTERRUPT_STATUS, read);

                return true;
            }

            false
        }
    }

    #[inline]
    pub fn read_main_counter(&self) -> u64 {
        unsafe { self.area.read(ReadableRegs::MAIN_COUNTER_VALUE) }
    }

    #[inline]
    const fn config_reg_offset(&self) -> usize {
        0x100 + (0x20 * self.id.0)
    }

    #[inline]
    const fn comparator_reg_offset(&self) -> usize {
        0x108 + (0x20 * self.id.0)
    }

    #[inline]
    pub const fn id(&self) -> Id {
        self.id
    }

    /// Arms the comparator for the given absolute main-counter cycle value,
    /// firing an edge-triggered interrupt on the vector the ISR passed to
    /// the last `configure` call is wired to. Used by the kernel's per-EC
    /// timeout queue, which already thinks in main-counter cycles
    /// (`read_main_counter`'s unit) and needs to reprogram to an exact
    /// deadline rather than a duration relative to "now".
    #[inline]
    pub fn arm_absolute(&mut self, deadline_cycles: u64) {
        let mut config: TimerConfiguration =
            unsafe { transmute(self.area.read(self.config_reg_offset())) };

        unsafe { self.area.write(self.comparator_reg_offset(), deadline_cycles) };

        config.set_timer_type(TimerMode::OneShot as u8);
        config.set_int_enable(true.into());

        unsafe {
            self.area.write(self.config_reg_offset(), config.into());
        }
    }
}

impl Timer for HpetTimer {
    type TimerMode = TimerMode;
    type AdditionalConfig = AdditionalConfig;

    fn configure(
        &mut self,
        time: Duration,
        timer_mode: TimerMode,
        additional_config: AdditionalConfig,
    ) -> Result<u64, TimerError> {
        let hpet = HPET.lock();

        let mut config: TimerConfiguration =
            unsafe { transmute(self.area.read(self.config_reg_offset())) };

        if timer_mode == TimerMode::Periodic && config.periodic_int_capable() == false.into() {
            return Err(TimerError::UnsupportedTimerMode);
        }

        let cycles =
            unsafe { hpet.area.read(ReadableRegs::MAIN_COUNTER_VALUE) + hpet.time_to_cycles(time) };

        drop(hpet);

        unsafe { self.area.write(self.comparator_reg_offset(), cycles) };

        config.set_timer_type(timer_mode as u8);

        if additional_config.receive_interrupts {
            let DeliveryMode::Interrupt(_isr, trigger_mode) = additional_config.delivery_mode
            else {
                return Err(TimerError::UnsupportedTimerMode);
            };

            config.set_int_type(trigger_mode as u8);
            config.set_int_enable(true.into());
        } else {
            config.set_int_enable(false.into());
        }

        unsafe {
            self.area.write(self.config_reg_offset(), config.into());
        }

        Ok(cycles)
    }

    /// Disable this specific timer (just masks the interrupt, so it's effectively disabled)
    fn set_disabled(&mut self, state: bool) {
        let mut config: TimerConfiguration =
            unsafe { transmute(self.area.read(self.config_reg_offset())) };

        config.set_int_enable((!state).into());

        unsafe {
            self.area.write(self.config_reg_offset(), config.into());
        }
    }
}

impl ReadableRegs {
    const GENERAL_CAPABILITIES: usize = 0x0;
    const GENERAL_CONFIGURATION: usize = 0x10;
    const GENERAL_INTERRUPT_STATUS: usize = 0x20;
    const MAIN_COUNTER_VALUE: usize = 0xf0;
}

impl WriteableRegs {
    const GENERAL_CONFIGURATION: usize = 0x10;
    const GENERAL_INTERRUPT_STATUS: usize = 0x20;
    const MAIN_COUNTER_VALUE: usize = 0xf0;
}

unsafe impl Send for Hpet {}
unsafe impl Sync for Hpet {}

unsafe impl Send for HpetTimer {}
unsafe impl Sync for HpetTimer {}

impl SpinLockable for Hpet {}
