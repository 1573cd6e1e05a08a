//! Interrupt Service Routines definitions
//!
//! The `stub_vec_N` labels are the actual IDT targets (see [`super::interrupts`]); each one saves
//! the interrupted context's general-purpose registers, calls the matching `handler_vec_N`, then
//! restores them and `iretq`s. Exception stubs additionally hand the handler a pointer to the
//! saved frame, since a fault delivered to a capability EC has to be reflected back through
//! [`super::trap::dispatch_exception`] into that EC's saved register state, not just logged.
//!
//! Every trap here is assumed to arrive from ring 3: the hardware always pushes RSP/SS alongside
//! RIP/CS/RFLAGS, since user execution contexts are what this kernel actually runs.

use core::arch::global_asm;

use super::trap::{TrapFrame, dispatch_exception, dispatch_irq, dispatch_syscall};

macro_rules! exception_handler {
    ($vec:ident, $vec_num:expr) => {
        #[unsafe(no_mangle)]
        extern "C" fn $vec(vector: u64, frame: *mut TrapFrame) {
            // SAFETY: `frame` points at the stub's own stack frame, valid for the call's duration.
            dispatch_exception(vector as u8, unsafe { &mut *frame });
        }
    };
}

exception_handler!(handler_vec_0, 0);
exception_handler!(handler_vec_1, 1);
exception_handler!(handler_vec_2, 2);
exception_handler!(handler_vec_3, 3);
exception_handler!(handler_vec_4, 4);
exception_handler!(handler_vec_5, 5);
exception_handler!(handler_vec_6, 6);
exception_handler!(handler_vec_7, 7);
exception_handler!(handler_vec_8, 8);
exception_handler!(handler_vec_9, 9);
exception_handler!(handler_vec_10, 10);
exception_handler!(handler_vec_11, 11);
exception_handler!(handler_vec_12, 12);
exception_handler!(handler_vec_13, 13);
exception_handler!(handler_vec_14, 14);
exception_handler!(handler_vec_15, 15);
exception_handler!(handler_vec_16, 16);
exception_handler!(handler_vec_17, 17);
exception_handler!(handler_vec_18, 18);
exception_handler!(handler_vec_19, 19);
exception_handler!(handler_vec_20, 20);
exception_handler!(handler_vec_21, 21);
exception_handler!(handler_vec_22, 22);
exception_handler!(handler_vec_23, 23);
exception_handler!(handler_vec_24, 24);
exception_handler!(handler_vec_25, 25);
exception_handler!(handler_vec_26, 26);
exception_handler!(handler_vec_27, 27);
exception_handler!(handler_vec_28, 28);
exception_handler!(handler_vec_29, 29);
exception_handler!(handler_vec_30, 30);
exception_handler!(handler_vec_31, 31);

#[unsafe(no_mangle)]
extern "C" fn signal_eoi() {
    super::apic::lapic::signal_eoi_this_cpu();
}

#[unsafe(no_mangle)]
extern "C" fn handler_vec_128(frame: *mut TrapFrame) {
    // SAFETY: `frame` points at the stub's own stack frame, valid for the call's duration.
    dispatch_syscall(unsafe { &mut *frame });
}

global_asm! {
    r#"
    .section .text

    # Saves the full GPR set. The pushed layout, low to high address, is
    # r15..r8, the rsp snapshot, rbp, rdi, rsi, rdx, rcx, rbx, rax -- this
    # must track `TrapFrame`'s field order exactly.
    .macro push_gprs
        push rax
        push rbx
        push rcx
        push rdx
        push rsi
        push rdi
        push rbp
        push rsp
        push r8
        push r9
        push r10
        push r11
        push r12
        push r13
        push r14
        push r15
    .endm

    .macro pop_gprs
        pop r15
        pop r14
        pop r13
        pop r12
        pop r11
        pop r10
        pop r9
        pop r8
        add rsp, 8 # the rsp snapshot is not restored into rsp itself
        pop rbp
        pop rdi
        pop rsi
        pop rdx
        pop rcx
        pop rbx
        pop rax
    .endm

    # `has_error_code` vectors (8, 10-14, 17, 21, 29, 30) get theirs from the
    # CPU; the rest get a synthetic zero so every frame has the same shape.
    .macro define_exception_stub vec, has_error_code
    .global stub_vec_\vec
    stub_vec_\vec:
    .if \has_error_code == 0
        push 0
    .endif
        push \vec
        push_gprs
        mov rdi, \vec
        mov rsi, rsp
        call handler_vec_\vec
        pop_gprs
        add rsp, 16 # discard the vector and error code
        iretq
    .endm

    .macro define_irq_stub vec
    .global stub_vec_\vec
    stub_vec_\vec:
        push_gprs
        mov rdi, \vec
        call handler_vec_\vec
        call signal_eoi
        pop_gprs
        iretq
    .endm

    define_exception_stub 0, 0
    define_exception_stub 1, 0
    define_exception_stub 2, 0
    define_exception_stub 3, 0
    define_exception_stub 4, 0
    define_exception_stub 5, 0
    define_exception_stub 6, 0
    define_exception_stub 7, 0
    define_exception_stub 8, 1
    define_exception_stub 9, 0
    define_exception_stub 10, 1
    define_exception_stub 11, 1
    define_exception_stub 12, 1
    define_exception_stub 13, 1
    define_exception_stub 14, 1
    define_exception_stub 15, 0
    define_exception_stub 16, 0
    define_exception_stub 17, 1
    define_exception_stub 18, 0
    define_exception_stub 19, 0
    define_exception_stub 20, 0
    define_exception_stub 21, 1
    define_exception_stub 22, 0
    define_exception_stub 23, 0
    define_exception_stub 24, 0
    define_exception_stub 25, 0
    define_exception_stub 26, 0
    define_exception_stub 27, 0
    define_exception_stub 28, 0
    define_exception_stub 29, 1
    define_exception_stub 30, 1
    define_exception_stub 31, 0

    define_irq_stub 32
    define_irq_stub 33
    define_irq_stub 34
    define_irq_stub 254

    # The hypercall vector: no error code, and the handler only wants the
    # saved frame, not the vector number, since a syscall's opcode travels
    # in a GPR rather than being baked into which vector fired.
    .global stub_vec_128
    stub_vec_128:
        push 0
        push 128
        push_gprs
        mov rdi, rsp
        call handler_vec_128
        pop_gprs
        add rsp, 16
        iretq
    "#
}

#[unsafe(no_mangle)]
extern "C" fn handler_vec_32(vector: u64) {
    dispatch_irq(vector as u8);
}

#[unsafe(no_mangle)]
extern "C" fn handler_vec_33(vector: u64) {
    dispatch_irq(vector as u8);
}

#[unsafe(no_mangle)]
extern "C" fn handler_vec_34(vector: u64) {
    dispatch_irq(vector as u8);
}

#[unsafe(no_mangle)]
extern "C" fn handler_vec_254(vector: u64) {
    dispatch_irq(vector as u8);
}
