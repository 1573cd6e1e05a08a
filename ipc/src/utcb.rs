//! The per-EC UTCB page: architecture-agnostic register images transferred
//! during a `call`/`reply` beyond the GPR block (which lives directly on
//! the EC's exception frame and is copied from there instead).

use core::ptr::NonNull;

/// Layout of the extended register images an EC's mapped UTCB page holds.
/// GPRs are deliberately absent here — they are carried on
/// [`captab::ec::ExceptionFrame`] and copied by the engine directly from
/// one EC's frame to another's.
#[repr(C)]
pub struct Utcb {
    pub mtd: u32,
    _reserved: u32,
    pub segments: [u64; 4],
    pub virt: [u64; 8],
    pub vtimer: [u64; 4],
    pub hpfar: u64,
}

impl Utcb {
    /// # Safety
    /// `ptr` must point at a live, page-sized, properly aligned UTCB
    /// mapping for as long as the returned reference is used.
    #[must_use]
    pub unsafe fn view<'a>(ptr: NonNull<u8>) -> &'a mut Utcb {
        unsafe { &mut *ptr.as_ptr().cast::<Utcb>() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_round_trips_through_backing_bytes() {
        let mut backing = [0u8; core::mem::size_of::<Utcb>()];
        let ptr = NonNull::new(backing.as_mut_ptr()).unwrap();
        let utcb = unsafe { Utcb::view(ptr) };
        utcb.mtd = 0xdead;
        utcb.hpfar = 0x1000;

        let reread = unsafe { Utcb::view(ptr) };
        assert_eq!(reread.mtd, 0xdead);
        assert_eq!(reread.hpfar, 0x1000);
    }
}
