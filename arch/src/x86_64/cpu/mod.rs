//! Assembly instruction wrappers & other low level CPU operations
//!
//! `NOTE:` `core::arch::x86_64` already implements `__cpuid`, `rdtsc` and many others, so use them
//! when needed

use core::{arch::asm, mem::transmute};

use modular_bitfield::prelude::*;

use utils::mem::VirtAddr;

pub mod msr;

/// A CPU register that can be read and written wholesale, independent of any particular field.
pub trait Register: Sized {
    /// Read the current value of the register
    unsafe fn read() -> Self;

    /// Write a value to the register
    unsafe fn write(self);
}

#[derive(Clone, Copy)]
#[bitfield]
#[repr(u64)]
pub struct Rflags {
    pub cf: B1,
    reserved_mbo: B1,
    pub pf: B1,
    reserved_mbz_0: B1,
    pub af: B1,
    reserved_mbz_1: B1,
    pub zf: B1,
    pub sf: B1,
    pub tf: B1,
    pub if_enable: B1,
    pub df: B1,
    pub of: B1,
    pub iopl: B2,
    pub nt: B1,
    reserved_mbz_2: B1,
    pub rf: B1,
    pub vm: B1,
    pub ac: B1,
    pub vif: B1,
    pub vip: B1,
    pub id: B1,
    reserved_mbz_3: B42,
}

/// CR0: basic machine state (protection, paging, cache control).
#[derive(Clone, Copy)]
#[bitfield]
#[repr(u64)]
pub struct Cr0 {
    pub pe: B1,
    pub mp: B1,
    pub em: B1,
    pub ts: B1,
    pub et: B1,
    pub ne: B1,
    reserved_mbz_0: B10,
    pub wp: B1,
    reserved_mbz_1: B1,
    pub am: B1,
    reserved_mbz_2: B10,
    pub nw: B1,
    pub cd: B1,
    pub pg: B1,
    reserved_mbz_3: B32,
}

/// CR2: the faulting linear address left behind by a page fault.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(transparent)]
pub struct Cr2(pub u64);

/// CR3: the active page-table root.
#[bitfield]
#[repr(u64)]
pub struct Cr3 {
    reserved_mbz_0: B3,
    pub pwt: B1,
    pub pcd: B1,
    reserved_mbz_1: B7,
    pub top_pml: B52,
}

/// CR4: extended machine state (paging modes, virtualization, protection keys).
#[bitfield]
#[repr(u64)]
pub struct Cr4 {
    pub vme: B1,
    pub pvi: B1,
    pub tsd: B1,
    pub de: B1,
    pub pse: B1,
    pub pae: B1,
    pub mce: B1,
    pub pge: B1,
    pub pce: B1,
    pub osfxsr: B1,
    pub osxmmexcpt: B1,
    pub umip: B1,
    pub la57: B1,
    pub vmxe: B1,
    pub smxe: B1,
    reserved_mbz_0: B1,
    pub fsgsbase: B1,
    pub pcide: B1,
    pub osxsave: B1,
    reserved_mbz_1: B1,
    pub smep: B1,
    pub smap: B1,
    pub pke: B1,
    pub cet: B1,
    pub pks: B1,
    reserved_mbz_2: B39,
}

/// Debug register 6 on AMD CPUs: breakpoint condition bits latched by the last #DB.
#[derive(Clone, Copy)]
#[bitfield]
#[repr(u64)]
pub struct AmdDr6 {
    pub bd0: B1,
    pub bd1: B1,
    pub bd2: B1,
    pub bd3: B1,
    reserved_mbo_0: B7,
    pub bld: B1,
    reserved_mbz_0: B1,
    pub bd: B1,
    pub bs: B1,
    pub bt: B1,
    reserved_mbo_1: B16,
    reserved_mbz_1: B32,
}

/// Debug register 7 on AMD CPUs: breakpoint enable/type/length fields.
#[derive(Clone, Copy)]
#[bitfield]
#[repr(u64)]
pub struct AmdDr7 {
    pub l0: B1,
    pub g0: B1,
    pub l1: B1,
    pub g1: B1,
    pub l2: B1,
    pub g2: B1,
    pub l3: B1,
    pub g3: B1,
    pub le: B1,
    pub ge: B1,
    reserved_mbo: B1,
    reserved_mbz_0: B2,
    pub gd: B1,
    reserved_mbz_1: B2,
    pub ttt_0: B2,
    pub lb_0: B2,
    pub ttt_1: B2,
    pub lb_1: B2,
    pub ttt_2: B2,
    pub lb_2: B2,
    pub ttt_3: B2,
    pub lb_3: B2,
    reserved_mbz_2: B32,
}

/// Clear `RFLAGS.IF` to mask all maskable external interrupts
#[inline]
pub fn cli() {
    unsafe { asm!("cli", options(nostack, nomem)) };
}

/// Set `RFLAGS.IF` to enable handling of external interrupts
#[inline]
pub fn sti() {
    unsafe { asm!("sti", options(nostack, nomem)) };
}

/// Read the time stamp counter.
#[inline(always)]
pub unsafe fn rdtsc() -> u64 {
    let val: u64;
    unsafe {
        asm!(
            "rdtsc",
            "shl rdx, 32",
            "or rax, rdx",
            out("rax") val,
            out("rdx") _,
            options(nostack, nomem),
        )
    };
    val
}

/// Read the current stack pointer
pub fn read_rsp() -> usize {
    let rsp: u64;
    unsafe {
        asm!("mov {:r}, rsp", out(reg) rsp);
    }
    rsp as usize
}

/// Wrapper to read the value of a control register
#[macro_export]
macro_rules! read_cr {
    ($cr:ident) => {{
        #[allow(unused_unsafe)]
        unsafe {
            let value: usize;
            core::arch::asm!(
                concat!("mov {}, ", stringify!($cr)),
                out(reg) value,
                options(nostack, nomem)
            );
            value
        }
    }};
}

/// Wrapper to write a value to a control register
#[macro_export]
macro_rules! write_cr {
    ($cr:ident, $val:expr) => {{
        #[allow(unused_unsafe)]
        unsafe {
            core::arch::asm!(
                concat!("mov ", stringify!($cr), ", {}"),
                in(reg) $val,
                options(nostack, nomem)
            );
        }
    }};
}

impl Register for Rflags {
    unsafe fn read() -> Self {
        let rflags: u64;
        unsafe { asm!("pushfq", "pop {:r}", out(reg) rflags) };
        rflags.into()
    }

    unsafe fn write(self) {
        unsafe { asm!("push {:r}", "popfq", in(reg) transmute::<Self, u64>(self)) };
    }
}

impl Register for Cr0 {
    unsafe fn read() -> Self {
        let value: u64;
        unsafe { asm!("mov {:r}, cr0", out(reg) value) };
        value.into()
    }

    unsafe fn write(self) {
        unsafe { asm!("mov cr0, {:r}", in(reg) transmute::<Self, u64>(self)) };
    }
}

impl Register for Cr2 {
    unsafe fn read() -> Self {
        let value: u64;
        unsafe { asm!("mov {:r}, cr2", out(reg) value) };
        Cr2(value)
    }

    unsafe fn write(self) {
        panic!("CR2 is read-only");
    }
}

impl Register for Cr3 {
    unsafe fn read() -> Self {
        let value: u64;
        unsafe { asm!("mov {:r}, cr3", out(reg) value) };
        value.into()
    }

    unsafe fn write(self) {
        unsafe { asm!("mov cr3, {:r}", in(reg) transmute::<Self, u64>(self)) };
    }
}

impl Register for Cr4 {
    unsafe fn read() -> Self {
        let value: u64;
        unsafe { asm!("mov {:r}, cr4", out(reg) value) };
        value.into()
    }

    unsafe fn write(self) {
        unsafe { asm!("mov cr4, {:r}", in(reg) transmute::<Self, u64>(self)) };
    }
}

impl Register for AmdDr6 {
    unsafe fn read() -> Self {
        let value: u64;
        unsafe { asm!("mov {:r}, dr6", out(reg) value) };
        AmdDr6::from_bytes(value.to_le_bytes())
    }

    unsafe fn write(self) {
        panic!("AMD DR6 is read-only");
    }
}

impl Register for AmdDr7 {
    unsafe fn read() -> Self {
        let value: u64;
        unsafe { asm!("mov {:r}, dr7", out(reg) value) };
        AmdDr7::from_bytes(value.to_le_bytes())
    }

    unsafe fn write(self) {
        unsafe { asm!("mov dr7, {:r}", in(reg) transmute::<Self, u64>(self)) };
    }
}

impl From<VirtAddr> for Cr3 {
    fn from(value: VirtAddr) -> Self {
        let mut cr3 = Cr3::new();
        cr3.set_top_pml((value.0 as u64) >> 12);
        cr3
    }
}
