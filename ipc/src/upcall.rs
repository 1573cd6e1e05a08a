//! Turns a fault, or one of the synthetic startup/recall/vtimer events,
//! into an implicit portal `call` against a slot in the faulting EC's
//! owning PD.

use core::ptr::NonNull;

use captab::capability::perm;
use captab::ec::{Ec, hazard};
use captab::object::ObjectKind;
use captab::pd::Pd;
use captab::pt::Pt;
use captab::sc::Sc;
use utils::collections::id::Id;

use crate::engine::{self, CallOutcome};
use crate::mtd::Mtd;

/// Offsets added to a PD's configured event base to reach the synthetic
/// selectors that aren't CPU fault vectors. Fault vectors occupy
/// `[0, STARTUP)`, leaving plenty of room on any architecture this targets.
pub const STARTUP: usize = 0x100;
pub const RECALL: usize = 0x101;
pub const VTIMER: usize = 0x102;

#[derive(Debug, PartialEq, Eq)]
pub enum UpcallOutcome {
    /// The event slot held a valid `EVENT`-permission portal capability
    /// and the implicit call was dispatched; carries the same outcome a
    /// direct `call` would have produced.
    Dispatched(CallOutcome),
    /// The slot was null or lacked `EVENT` permission; `faulting` has had
    /// its `STOP` hazard raised and must be torn down at the next safe
    /// point instead of resumed.
    Killed,
}

/// Delivers the event named by `event_base + offset` (a fault vector, or
/// one of [`STARTUP`]/[`RECALL`]/[`VTIMER`]) to `faulting`'s owning PD.
pub fn upcall(
    owner_pd: &Pd,
    event_base: usize,
    offset: usize,
    faulting: &Ec,
    faulting_sc: NonNull<Sc>,
    current_cpu: usize,
) -> UpcallOutcome {
    let selector = Id(event_base + offset);
    let cap = owner_pd.obj_space.lookup(selector);

    let Ok(header) = cap.validate(ObjectKind::Pt, perm::EVENT) else {
        faulting.raise_hazard(hazard::STOP);
        return UpcallOutcome::Killed;
    };
    let pt: NonNull<Pt> = header.cast();

    match engine::call(unsafe { pt.as_ref() }, faulting, faulting_sc, current_cpu, Mtd::GPRS) {
        Ok(outcome) => UpcallOutcome::Dispatched(outcome),
        Err(_) => {
            faulting.raise_hazard(hazard::STOP);
            UpcallOutcome::Killed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use captab::capability::Capability;
    use captab::ec::create_ec;
    use captab::object::{EcSubKind, ObjectHeader};
    use captab::pd::Pd;
    use captab::pt::create_pt;
    use captab::sc::create_sc;

    fn root_pd() -> Pd {
        let pd = Pd::bootstrap_root();
        let header = alloc::boxed::Box::leak(alloc::boxed::Box::new(ObjectHeader::new(ObjectKind::Pd)));
        let cap = Capability::new(NonNull::from(&*header), perm::PD);
        pd.obj_space.publish(Id(0), cap).unwrap();
        pd
    }

    #[test]
    fn missing_event_slot_kills_faulting_ec() {
        let pd = root_pd();
        create_ec(&pd, Id(0), Id(0), Id(1), EcSubKind::Local, 0, None).unwrap();
        let ec_ptr: NonNull<Ec> =
            pd.obj_space.lookup(Id(1)).validate(ObjectKind::Ec, perm::EC).unwrap().cast();
        create_sc(&pd, Id(0), Id(1), Id(2), 0, 32, 1000).unwrap();
        let sc_ptr: NonNull<Sc> =
            pd.obj_space.lookup(Id(2)).validate(ObjectKind::Sc, perm::SC).unwrap().cast();

        let faulting = unsafe { ec_ptr.as_ref() };
        let outcome = upcall(&pd, 0x1000, 13, faulting, sc_ptr, 0);
        assert_eq!(outcome, UpcallOutcome::Killed);
        assert_eq!(faulting.take_hazards(), hazard::STOP);
    }

    #[test]
    fn present_event_slot_dispatches_implicit_call() {
        let pd = root_pd();
        create_ec(&pd, Id(0), Id(0), Id(1), EcSubKind::Local, 0, None).unwrap();
        create_ec(&pd, Id(0), Id(0), Id(2), EcSubKind::Local, 0, None).unwrap();
        let handler_ec = Id(2);
        create_pt(&pd, Id(0), handler_ec, Id(3 + STARTUP), 0x2000, 0).unwrap();

        let faulting_ptr: NonNull<Ec> =
            pd.obj_space.lookup(Id(1)).validate(ObjectKind::Ec, perm::EC).unwrap().cast();
        create_sc(&pd, Id(0), Id(1), Id(99), 0, 32, 1000).unwrap();
        let sc_ptr: NonNull<Sc> =
            pd.obj_space.lookup(Id(99)).validate(ObjectKind::Sc, perm::SC).unwrap().cast();

        let faulting = unsafe { faulting_ptr.as_ref() };
        let outcome = upcall(&pd, 3, STARTUP, faulting, sc_ptr, 0);
        assert_eq!(outcome, UpcallOutcome::Dispatched(CallOutcome::Dispatched));
    }
}
