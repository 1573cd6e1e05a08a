//! Conversions between [`TrapFrame`], the live per-trap register state, and
//! [`ExceptionFrame`], the per-EC saved copy. Shared by the exception-upcall
//! path and the hypercall dispatcher: both need to move a register set onto
//! an EC before dispatching a user-visible event through it, and load one
//! back before `iretq`ing.

use arch::x86_64::trap::TrapFrame;
use captab::ec::{Ec, ExceptionFrame};

/// Packs a `TrapFrame`'s register set into the 16-slot layout
/// `captab::ec::ExceptionFrame` carries. `gprs[0]` is RAX, matching the
/// hypercall ABI's "status goes in the first argument register" convention;
/// the rest follow the trap stub's own push order.
fn frame_to_gprs(tf: &TrapFrame) -> [u64; 16] {
    [
        tf.rax, tf.rbx, tf.rcx, tf.rdx, tf.rsi, tf.rdi, tf.rbp, tf.rsp, tf.r8, tf.r9, tf.r10,
        tf.r11, tf.r12, tf.r13, tf.r14, tf.r15,
    ]
}

fn gprs_to_frame(tf: &mut TrapFrame, gprs: &[u64; 16]) {
    tf.rax = gprs[0];
    tf.rbx = gprs[1];
    tf.rcx = gprs[2];
    tf.rdx = gprs[3];
    tf.rsi = gprs[4];
    tf.rdi = gprs[5];
    tf.rbp = gprs[6];
    tf.rsp = gprs[7];
    tf.r8 = gprs[8];
    tf.r9 = gprs[9];
    tf.r10 = gprs[10];
    tf.r11 = gprs[11];
    tf.r12 = gprs[12];
    tf.r13 = gprs[13];
    tf.r14 = gprs[14];
    tf.r15 = gprs[15];
}

/// Saves the live trap state onto `ec`'s own saved frame.
pub fn save_frame_into_ec(ec: &Ec, frame: &TrapFrame) {
    ec.with_frame_mut(|saved: &mut ExceptionFrame| {
        saved.gprs = frame_to_gprs(frame);
        saved.rip = frame.rip;
        saved.rflags = frame.rflags;
    });
}

/// Overwrites the live trap state with `ec`'s saved frame, so that the
/// pending `iretq` resumes into `ec` instead of whoever trapped.
pub fn load_ec_into_frame(ec: &Ec, frame: &mut TrapFrame) {
    let saved = ec.frame();
    gprs_to_frame(frame, &saved.gprs);
    frame.rip = saved.rip;
    frame.rflags = saved.rflags;
}
