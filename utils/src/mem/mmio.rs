//! A typed, offset-indexed view over an MMIO register window.

use core::marker::PhantomData;
use core::ptr::{read_volatile, write_volatile};

/// A register that knows its own byte offset within an MMIO window.
pub trait Offsetable {
    fn offset(self) -> usize;
}

/// A base pointer into an MMIO register window, indexed by two possibly
/// distinct register-name enums (readable and writeable register sets often
/// differ, e.g. on the local APIC) sharing a common register width `W`.
#[derive(Debug)]
pub struct MmioArea<R, Wr, W> {
    base: *mut W,
    _readable: PhantomData<R>,
    _writeable: PhantomData<Wr>,
}

impl<R, Wr, W> MmioArea<R, Wr, W>
where
    R: Offsetable,
    Wr: Offsetable,
{
    /// Build an area rooted at `base`. `base` must already be mapped with the
    /// correct caching attributes (device/uncacheable) by the caller.
    pub const fn new(base: *mut W) -> Self {
        Self {
            base,
            _readable: PhantomData,
            _writeable: PhantomData,
        }
    }

    /// Re-root the area at a different mapped base, e.g. after an override
    /// from a firmware table.
    pub unsafe fn change_base(&mut self, base: *mut W) {
        self.base = base;
    }

    /// The raw base pointer this area is rooted at.
    pub const fn base(&self) -> *mut W {
        self.base
    }

    /// Reads the register at `reg`'s offset.
    pub unsafe fn read(&self, reg: R) -> W {
        unsafe {
            let ptr = self.base.cast::<u8>().add(reg.offset()).cast::<W>();
            read_volatile(ptr)
        }
    }

    /// Writes `value` to the register at `reg`'s offset.
    pub unsafe fn write(&self, reg: Wr, value: W) {
        unsafe {
            let ptr = self.base.cast::<u8>().add(reg.offset()).cast::<W>();
            write_volatile(ptr, value);
        }
    }
}

impl Offsetable for usize {
    fn offset(self) -> usize {
        self
    }
}

unsafe impl<R, Wr, W> Send for MmioArea<R, Wr, W> {}
unsafe impl<R, Wr, W> Sync for MmioArea<R, Wr, W> {}
