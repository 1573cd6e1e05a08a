//! Registration hooks for exception and IRQ dispatch.
//!
//! The raw ISR stubs in [`super::isrs`] are this crate's concern; deciding what an exception or a
//! device interrupt *means* belongs to whoever owns capabilities and scheduling, which this crate
//! must not depend on. The owner registers a function pointer here once during boot and the stubs
//! call through it.

use core::{mem::transmute, sync::atomic::{AtomicUsize, Ordering}};

/// The CPU- and stub-saved state of whatever was running when a trap hit, laid out to exactly
/// match the push order in [`super::isrs`]'s assembly stubs.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct TrapFrame {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    /// RSP as it stood right before the stub started pushing registers. Not restored into RSP
    /// itself on return, just a snapshot for whoever reads the frame.
    pub rsp_snapshot: u64,
    pub rbp: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub rbx: u64,
    pub rax: u64,
    pub vector: u64,
    /// The CPU's error code, or 0 for vectors that don't push one.
    pub error_code: u64,
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

/// Called for vectors 0-31 with the faulting vector number and the interrupted context's saved
/// registers. The handler may mutate `frame` to change what the faulting context resumes into.
pub type ExceptionHandler = fn(vector: u8, frame: &mut TrapFrame);

/// Called for the timer/device IRQ vectors (32, 33, 34, 254) with the vector number.
pub type IrqHandler = fn(vector: u8);

/// The software-interrupt vector user mode traps into for a hypercall.
/// Ring-3-callable, unlike every exception/IRQ gate above.
pub const SYSCALL_VECTOR: u8 = 0x80;

/// Called for the hypercall trap. Gets the same saved-register view an
/// exception handler does, since the packed opcode/selector word and every
/// syscall argument both live in GPRs.
pub type SyscallHandler = fn(frame: &mut TrapFrame);

static EXCEPTION_HANDLER: AtomicUsize = AtomicUsize::new(0);
static IRQ_HANDLER: AtomicUsize = AtomicUsize::new(0);
static SYSCALL_HANDLER: AtomicUsize = AtomicUsize::new(0);

/// Install the exception dispatcher. Intended to be called exactly once during boot, before
/// interrupts are ever enabled.
pub fn set_exception_handler(handler: ExceptionHandler) {
    EXCEPTION_HANDLER.store(handler as usize, Ordering::Release);
}

/// Install the IRQ dispatcher. Intended to be called exactly once during boot.
pub fn set_irq_handler(handler: IrqHandler) {
    IRQ_HANDLER.store(handler as usize, Ordering::Release);
}

/// Install the hypercall dispatcher. Intended to be called exactly once
/// during boot.
pub fn set_syscall_handler(handler: SyscallHandler) {
    SYSCALL_HANDLER.store(handler as usize, Ordering::Release);
}

pub(super) fn dispatch_exception(vector: u8, frame: &mut TrapFrame) {
    let addr = EXCEPTION_HANDLER.load(Ordering::Acquire);
    assert!(addr != 0, "unhandled exception {vector}: no handler registered");

    let handler: ExceptionHandler = unsafe { transmute::<usize, ExceptionHandler>(addr) };
    handler(vector, frame);
}

pub(super) fn dispatch_irq(vector: u8) {
    let addr = IRQ_HANDLER.load(Ordering::Acquire);
    if addr == 0 {
        return;
    }

    let handler: IrqHandler = unsafe { transmute::<usize, IrqHandler>(addr) };
    handler(vector);
}

pub(super) fn dispatch_syscall(frame: &mut TrapFrame) {
    let addr = SYSCALL_HANDLER.load(Ordering::Acquire);
    assert!(addr != 0, "hypercall trap with no syscall handler registered");

    let handler: SyscallHandler = unsafe { transmute::<usize, SyscallHandler>(addr) };
    handler(frame);
}
