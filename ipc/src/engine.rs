//! The `call`/`reply` rendezvous and the exception-upcall path built on
//! top of it.
//!
//! Neither operation touches the scheduler directly — mirroring
//! `captab::sm::Sm`'s `up`/`down`, they report what happened and leave
//! dispatch (running the callee, remote-enqueuing a woken SC) to the
//! syscall layer, which is the only place that knows how to talk to
//! whichever scheduler is configured.

use alloc::vec::Vec;
use core::ptr::NonNull;

use captab::ec::{Continuation, Ec, hazard};
use captab::error::{KernelError, KernelResult};
use captab::pt::Pt;
use captab::sc::Sc;

use crate::mtd::Mtd;
use crate::utcb::Utcb;

/// What the syscall layer must do after a successful [`call`].
#[derive(Debug, PartialEq, Eq)]
pub enum CallOutcome {
    /// The callee was idle and is now rendezvoused with the caller; the
    /// caller's SC has been parked on the callee and the syscall layer
    /// should switch to the callee via `ret_user_hypercall`.
    Dispatched,
    /// The callee was already rendezvoused with another partner. The
    /// caller's SC has been parked on the callee's blocked-SC queue
    /// (helping); the syscall layer has nothing further to do until the
    /// callee replies and drains that queue.
    Helped,
}

/// What the syscall layer must do after [`reply`].
#[derive(Debug, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The caller is resumed with the reversed register transfer applied.
    /// Carries the parked SCs the callee should hand back to their home
    /// CPUs via remote-enqueue.
    Resume { caller: NonNull<Ec>, woken: Vec<NonNull<Sc>> },
    /// The reply's MTD carried POISON; the caller must be killed rather
    /// than resumed. The parked SCs are still returned for remote-enqueue.
    PoisonCaller { caller: NonNull<Ec>, woken: Vec<NonNull<Sc>> },
    /// There was no partner to reply to (a stray `reply` with no prior
    /// `call`); nothing to do.
    NoPartner,
}

/// Performs the `call` half of a portal invocation. `caller` must be the
/// currently-running EC; `caller_sc` the SC charging for this call;
/// `current_cpu` the CPU the syscall trapped in on.
pub fn call(
    pt: &Pt,
    caller: &Ec,
    caller_sc: NonNull<Sc>,
    current_cpu: usize,
    mtd_send: Mtd,
) -> KernelResult<CallOutcome> {
    let callee = unsafe { pt.ec.as_ref() };

    if callee.cpu() != current_cpu {
        return Err(KernelError::BadCpu);
    }

    transfer_registers(caller, callee, mtd_send);
    callee.with_frame_mut(|frame| {
        frame.rip = pt.entry_ip() as u64;
        frame.gprs[0] = pt.badge() as u64;
    });
    if let Some(ptr) = callee.utcb {
        unsafe { Utcb::view(ptr) }.mtd = mtd_send.bits();
    }

    let outcome = if callee.partner().is_some() {
        callee.park_sc(caller_sc);
        CallOutcome::Helped
    } else {
        callee.set_partner(NonNull::from(caller));
        callee.park_sc(caller_sc);
        callee.set_continuation(Continuation::RetUserHypercall);
        CallOutcome::Dispatched
    };

    Ok(outcome)
}

/// Performs the `reply` half. `callee` is the EC issuing the reply.
pub fn reply(callee: &Ec, mtd_reply: Mtd) -> ReplyOutcome {
    let woken: Vec<NonNull<Sc>> = callee.take_parked_scs().into_iter().collect();

    let Some(caller_ptr) = callee.take_partner() else {
        return ReplyOutcome::NoPartner;
    };
    let caller = unsafe { caller_ptr.as_ref() };

    transfer_registers(callee, caller, mtd_reply);
    if let Some(ptr) = caller.utcb {
        unsafe { Utcb::view(ptr) }.mtd = mtd_reply.bits();
    }

    if mtd_reply.contains(Mtd::POISON) {
        caller.raise_hazard(hazard::RECALL);
        ReplyOutcome::PoisonCaller { caller: caller_ptr, woken }
    } else {
        ReplyOutcome::Resume { caller: caller_ptr, woken }
    }
}

/// Copies the GPR block (beyond the argument register) and, where both ECs
/// have a mapped UTCB, the extended register images named by `mtd`, from
/// `src` to `dst`. `gprs[0]` is left for the caller of this function to
/// set: `call` overwrites it with the portal's badge; `reply` leaves
/// whatever the callee put there as its return value.
fn transfer_registers(src: &Ec, dst: &Ec, mtd: Mtd) {
    if mtd.contains(Mtd::GPRS) {
        let src_frame = src.frame();
        dst.with_frame_mut(|frame| frame.gprs[1..].copy_from_slice(&src_frame.gprs[1..]));
    }

    let (Some(src_ptr), Some(dst_ptr)) = (src.utcb, dst.utcb) else {
        return;
    };
    let src_utcb = unsafe { Utcb::view(src_ptr) };
    let dst_utcb = unsafe { Utcb::view(dst_ptr) };

    if mtd.contains(Mtd::SEGMENTS) {
        dst_utcb.segments = src_utcb.segments;
    }
    if mtd.contains(Mtd::VIRT) {
        dst_utcb.virt = src_utcb.virt;
    }
    if mtd.contains(Mtd::VTIMER) {
        dst_utcb.vtimer = src_utcb.vtimer;
    }
    if mtd.contains(Mtd::HPFAR) {
        dst_utcb.hpfar = src_utcb.hpfar;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use captab::capability::{Capability, perm};
    use captab::ec::create_ec;
    use captab::object::{EcSubKind, ObjectHeader, ObjectKind};
    use captab::pd::Pd;
    use captab::pt::create_pt;
    use captab::sc::create_sc;
    use utils::collections::id::Id;

    /// A root PD with a self-referential PD capability at selector 0, the
    /// same fixture shape `captab`'s own factory tests use.
    fn root_pd() -> Pd {
        let pd = Pd::bootstrap_root();
        let header = alloc::boxed::Box::leak(alloc::boxed::Box::new(ObjectHeader::new(ObjectKind::Pd)));
        let cap = Capability::new(NonNull::from(&*header), perm::PD);
        pd.obj_space.publish(Id(0), cap).unwrap();
        pd
    }

    fn new_ec(pd: &Pd, sel: Id, cpu: usize) -> NonNull<Ec> {
        create_ec(pd, Id(0), Id(0), sel, EcSubKind::Local, cpu, None).unwrap();
        pd.obj_space.lookup(sel).validate(ObjectKind::Ec, perm::EC).unwrap().cast()
    }

    fn new_pt(pd: &Pd, sel: Id, ec_sel: Id, entry_ip: usize) -> NonNull<Pt> {
        create_pt(pd, Id(0), ec_sel, sel, entry_ip, 0).unwrap();
        pd.obj_space.lookup(sel).validate(ObjectKind::Pt, perm::CALL).unwrap().cast()
    }

    fn new_sc(pd: &Pd, sel: Id, ec_sel: Id, cpu: usize) -> NonNull<Sc> {
        create_sc(pd, Id(0), ec_sel, sel, cpu, 32, 1000).unwrap();
        pd.obj_space.lookup(sel).validate(ObjectKind::Sc, perm::SC).unwrap().cast()
    }

    #[test]
    fn call_on_wrong_cpu_fails_bad_cpu() {
        let pd = root_pd();
        new_ec(&pd, Id(1), 1); // server, home cpu 1
        let caller_ptr = new_ec(&pd, Id(2), 0);
        let pt_ptr = new_pt(&pd, Id(3), Id(1), 0x1000);
        let sc_ptr = new_sc(&pd, Id(4), Id(2), 0);

        let caller = unsafe { caller_ptr.as_ref() };
        let pt = unsafe { pt_ptr.as_ref() };

        let err = call(pt, caller, sc_ptr, 0, Mtd::GPRS).unwrap_err();
        assert_eq!(err, KernelError::BadCpu);
    }

    #[test]
    fn call_then_reply_round_trips_gprs() {
        let pd = root_pd();
        let server_ptr = new_ec(&pd, Id(1), 0);
        let caller_ptr = new_ec(&pd, Id(2), 0);
        let pt_ptr = new_pt(&pd, Id(3), Id(1), 0x4000);
        let sc_ptr = new_sc(&pd, Id(4), Id(2), 0);

        let caller = unsafe { caller_ptr.as_ref() };
        caller.with_frame_mut(|f| f.gprs[1] = 42);

        let outcome = call(unsafe { pt_ptr.as_ref() }, caller, sc_ptr, 0, Mtd::GPRS).unwrap();
        assert_eq!(outcome, CallOutcome::Dispatched);

        let server = unsafe { server_ptr.as_ref() };
        assert_eq!(server.frame().gprs[1], 42);
        assert_eq!(server.frame().rip, 0x4000);

        server.with_frame_mut(|f| f.gprs[1] = 100);
        match reply(server, Mtd::GPRS) {
            ReplyOutcome::Resume { caller: c, .. } => assert_eq!(c, caller_ptr),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(caller.frame().gprs[1], 100);
    }

    #[test]
    fn busy_callee_parks_caller_via_helping() {
        let pd = root_pd();
        let server_ptr = new_ec(&pd, Id(1), 0);
        let first_ptr = new_ec(&pd, Id(2), 0);
        let second_ptr = new_ec(&pd, Id(3), 0);
        let pt_ptr = new_pt(&pd, Id(4), Id(1), 0);
        let first_sc = new_sc(&pd, Id(5), Id(2), 0);
        let second_sc = new_sc(&pd, Id(6), Id(3), 0);
        let _ = server_ptr;

        let pt = unsafe { pt_ptr.as_ref() };
        let outcome = call(pt, unsafe { first_ptr.as_ref() }, first_sc, 0, Mtd::NONE).unwrap();
        assert_eq!(outcome, CallOutcome::Dispatched);

        let outcome = call(pt, unsafe { second_ptr.as_ref() }, second_sc, 0, Mtd::NONE).unwrap();
        assert_eq!(outcome, CallOutcome::Helped);
    }

    #[test]
    fn poison_reply_raises_recall_on_caller() {
        let pd = root_pd();
        let server_ptr = new_ec(&pd, Id(1), 0);
        let caller_ptr = new_ec(&pd, Id(2), 0);
        let pt_ptr = new_pt(&pd, Id(3), Id(1), 0);
        let sc_ptr = new_sc(&pd, Id(4), Id(2), 0);

        call(unsafe { pt_ptr.as_ref() }, unsafe { caller_ptr.as_ref() }, sc_ptr, 0, Mtd::NONE).unwrap();
        let server = unsafe { server_ptr.as_ref() };
        match reply(server, Mtd::POISON) {
            ReplyOutcome::PoisonCaller { caller: c, .. } => assert_eq!(c, caller_ptr),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(unsafe { caller_ptr.as_ref() }.take_hazards(), hazard::RECALL);
    }
}
