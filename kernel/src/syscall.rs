//! The hypercall dispatcher (spec §6): decodes the packed opcode/flags/
//! selector word out of RAX, validates capabilities, and fans out to one
//! of sixteen handlers. Registered with `arch::x86_64::trap` as the
//! syscall handler by `trap::install`.
//!
//! Every handler here is the one place allowed to act on the outcomes
//! `captab`, `ipc`, and `scheduler` report rather than enacting
//! themselves (spec §4's "return an outcome, let the caller decide"
//! shape, used consistently by `Sm::up`/`down`, `ipc::engine::call`/
//! `reply`, and `scheduler::schedule`/`remote_enqueue`): this module is
//! that caller for every one of them.

use core::ptr::NonNull;

use arch::x86_64::trap::TrapFrame;
use captab::capability::perm;
use captab::ec::{Continuation, Ec, hazard};
use captab::error::KernelError;
use captab::object::{EcSubKind, ObjectKind};
use captab::pd::Pd;
use captab::pt::Pt;
use captab::sc::Sc;
use captab::sm::{DownOutcome, Sm};
use hypervisor::Vesselable;
use ipc::mtd::Mtd;
use memspace::Permission;
use scheduler::{Decision, RemoteEnqueueOutcome};
use utils::collections::id::Id;

use crate::regs::{load_ec_into_frame, save_frame_into_ec};
use crate::trap::this_cpu;

/// Opcode field: bits `[0:3]` of RAX.
const OPCODE_MASK: u64 = 0xF;
/// Flags field: bits `[4:7]` of RAX.
const FLAGS_SHIFT: u64 = 4;
const FLAGS_MASK: u64 = 0xF;
/// Selector field: the remaining high bits of RAX.
const SELECTOR_SHIFT: u64 = 8;

const OP_IPC_CALL: u64 = 0;
const OP_IPC_REPLY: u64 = 1;
const OP_CREATE_PD: u64 = 2;
const OP_CREATE_EC: u64 = 3;
const OP_CREATE_SC: u64 = 4;
const OP_CREATE_PT: u64 = 5;
const OP_CREATE_SM: u64 = 6;
const OP_CTRL_PD: u64 = 7;
const OP_CTRL_EC: u64 = 8;
const OP_CTRL_SC: u64 = 9;
const OP_CTRL_PT: u64 = 10;
const OP_CTRL_SM: u64 = 11;
const OP_CTRL_HW: u64 = 12;
const OP_ASSIGN_INT: u64 = 13;
const OP_ASSIGN_DEV: u64 = 14;

/// `create_pd`'s sub-op, packed in the flags field.
mod create_pd_subop {
    pub const NEW: u64 = 0;
    pub const ADD_GUEST: u64 = 1;
    pub const ADD_DMA: u64 = 2;
    pub const ADD_PIO: u64 = 3;
    pub const ADD_MSR: u64 = 4;
}

/// Space kind a `ctrl_pd` delegation targets, packed in the flags field.
mod delegate_kind {
    pub const OBJ: u64 = 0;
    pub const HOST: u64 = 1;
    pub const GUEST: u64 = 2;
    pub const DMA: u64 = 3;
    pub const PIO: u64 = 4;
    pub const MSR: u64 = 5;
}

/// Spacing left between consecutive PDs' event bases, wide enough for the
/// 32 fault vectors plus the three synthetic selectors
/// (`ipc::upcall::{STARTUP,RECALL,VTIMER}`) with slack for growth.
const EVENT_BASE_STRIDE: usize = 0x200;
static NEXT_EVENT_BASE: core::sync::atomic::AtomicUsize = core::sync::atomic::AtomicUsize::new(0x1000);

fn decode(raw: u64) -> (u64, u64, usize) {
    let opcode = raw & OPCODE_MASK;
    let flags = (raw >> FLAGS_SHIFT) & FLAGS_MASK;
    let selector = (raw >> SELECTOR_SHIFT) as usize;
    (opcode, flags, selector)
}

/// The EC/SC/PD triple a syscall trapped in on.
struct Current {
    pd: &'static Pd,
    ec: &'static Ec,
    sc: NonNull<Sc>,
}

fn current(cpu: usize) -> Option<Current> {
    let sc = scheduler::percpu(cpu).current()?;
    let ec = unsafe { sc.as_ref() }.ec;
    let ec_ref = unsafe { ec.as_ref() };
    let pd = unsafe { ec_ref.pd.as_ref() };
    Some(Current { pd, ec: ec_ref, sc })
}

/// Registered with `arch::x86_64::trap::set_syscall_handler`.
pub fn dispatch(frame: &mut TrapFrame) {
    let cpu = this_cpu();
    let Some(cur) = current(cpu) else {
        logger::warn!("syscall: trapped with no EC scheduled on cpu {cpu}");
        return;
    };

    save_frame_into_ec(cur.ec, frame);

    let (opcode, flags, selector) = decode(frame.rax);
    let result = match opcode {
        OP_IPC_CALL => ipc_call(&cur, cpu, flags, selector, frame),
        OP_IPC_REPLY => ipc_reply(&cur, cpu, frame),
        OP_CREATE_PD => create_pd(&cur, flags, selector, frame),
        OP_CREATE_EC => create_ec(&cur, flags, selector, frame),
        OP_CREATE_SC => create_sc(&cur, selector, frame),
        OP_CREATE_PT => create_pt(&cur, selector, frame),
        OP_CREATE_SM => create_sm(&cur, selector, frame),
        OP_CTRL_PD => ctrl_pd(&cur, flags, selector, frame),
        OP_CTRL_EC => ctrl_ec(&cur, flags, selector),
        OP_CTRL_SC => ctrl_sc(&cur, selector, frame),
        OP_CTRL_PT => ctrl_pt(&cur, selector, frame),
        OP_CTRL_SM => ctrl_sm(&cur, cpu, flags, selector, frame),
        OP_CTRL_HW => ctrl_hw(&cur, flags),
        OP_ASSIGN_INT => assign_int(&cur, selector, frame),
        OP_ASSIGN_DEV => assign_dev(&cur, selector, frame),
        _ => Err(KernelError::BadHyp),
    };

    // ipc_call/ipc_reply load the resuming context's frame themselves
    // (possibly an EC other than `cur.ec`); every other opcode resumes
    // the caller in place, so only they need the status word written
    // back here.
    if !matches!(opcode, OP_IPC_CALL | OP_IPC_REPLY) {
        if let Err(e) = result {
            frame.rax = e.code() as u64;
        } else {
            frame.rax = 0;
        }
        load_ec_into_frame(cur.ec, frame);
    }
}

fn validate_pd_requestor(pd: &Pd, requestor_sel: Id) -> Result<(), KernelError> {
    pd.obj_space.lookup(requestor_sel).validate(ObjectKind::Pd, perm::PD)?;
    Ok(())
}

// --- 0: ipc_call ---------------------------------------------------------

fn ipc_call(cur: &Current, cpu: usize, flags: u64, pt_sel: usize, frame: &mut TrapFrame) -> Result<(), KernelError> {
    let pt_header = cur.pd.obj_space.lookup(Id(pt_sel)).validate(ObjectKind::Pt, perm::CALL)?;
    let pt: NonNull<Pt> = pt_header.cast();

    let mtd = Mtd::from_bits(frame.rbx as u32);
    let deadline = frame.rcx;
    let timeout_flag = flags & 0x1 != 0;

    match ipc::engine::call(unsafe { pt.as_ref() }, cur.ec, cur.sc, cpu, mtd) {
        Ok(ipc::engine::CallOutcome::Dispatched) => {
            let callee = unsafe { pt.as_ref().ec.as_ref() };
            frame.rax = 0;
            load_ec_into_frame(callee, frame);
            Ok(())
        }
        Ok(ipc::engine::CallOutcome::Helped) => {
            if timeout_flag && deadline != 0 {
                cur.ec.set_timeout(deadline);
            }
            reschedule_after_block(cpu, frame);
            Ok(())
        }
        Err(e) => {
            frame.rax = e.code() as u64;
            load_ec_into_frame(cur.ec, frame);
            Err(e)
        }
    }
}

// --- 1: ipc_reply --------------------------------------------------------

fn ipc_reply(cur: &Current, cpu: usize, frame: &mut TrapFrame) -> Result<(), KernelError> {
    let mtd = Mtd::from_bits(frame.rbx as u32);

    match ipc::reply(cur.ec, mtd) {
        ipc::engine::ReplyOutcome::Resume { caller, woken } => {
            drain_woken(cpu, woken);
            let caller_ref = unsafe { caller.as_ref() };
            frame.rax = 0;
            load_ec_into_frame(caller_ref, frame);
        }
        ipc::engine::ReplyOutcome::PoisonCaller { caller: _, woken } => {
            drain_woken(cpu, woken);
            // The caller is marked for teardown via `hazard::RECALL` by
            // `ipc::reply` itself; nothing runnable is tied to this
            // callee's stack of work, so just reschedule.
            reschedule_after_block(cpu, frame);
        }
        ipc::engine::ReplyOutcome::NoPartner => {
            frame.rax = KernelError::BadCap.code() as u64;
            load_ec_into_frame(cur.ec, frame);
            return Err(KernelError::BadCap);
        }
    }
    Ok(())
}

fn drain_woken(cpu: usize, woken: alloc::vec::Vec<NonNull<Sc>>) {
    let _ = cpu;
    for sc in woken {
        let home = unsafe { sc.as_ref() }.cpu();
        if let RemoteEnqueueOutcome::SendRrq(apic_id) = scheduler::remote_enqueue(home, sc) {
            unsafe { crate::trap::send_rrq(apic_id as u32) };
        }
    }
}

/// Common tail for any opcode that leaves the calling EC blocked with
/// nothing to resume locally: ask the scheduler what runs next on this
/// CPU and load its frame, looping on `hlt` if nothing is runnable.
fn reschedule_after_block(cpu: usize, frame: &mut TrapFrame) {
    loop {
        match scheduler::schedule(cpu, now()) {
            Decision::Run { ec, continuation, deadline, .. } => {
                crate::percpu::set_deadline(cpu, deadline.unwrap_or(0));
                let ec_ref = unsafe { ec.as_ref() };
                match continuation {
                    Continuation::RetUserVmexit => {
                        if run_vcpu_until_upcall(ec_ref, cpu) {
                            continue;
                        }
                    }
                    Continuation::RetUserHypercall | Continuation::RetUserException | Continuation::Idle => {}
                }
                load_ec_into_frame(ec_ref, frame);
                return;
            }
            Decision::Idle => {
                unsafe { core::arch::asm!("sti", "hlt", "cli", options(nomem, nostack)) };
                continue;
            }
        }
    }
}

/// The kernel's single monotonic tick source (spec §4.I), backed by the
/// HPET main counter. Used both for SC budget accounting (spec §4.D) and
/// for comparing against armed syscall deadlines.
fn now() -> u64 {
    crate::timeout::now()
}

/// Drives a vCPU's world-switch loop until a `VmExit` needs upcalling (or
/// nothing, for the in-kernel-handled classes). Returns `true` if the
/// caller should re-run `schedule()` because the vessel's owning EC ended
/// up blocked (upcall failed or the vCPU EC itself was recalled).
fn run_vcpu_until_upcall(ec: &Ec, cpu: usize) -> bool {
    let Some(exit) = crate::vcpu_table::with_vmcb(NonNull::from(ec), |vmcb| vmcb.enter()) else {
        logger::warn!("syscall: RetUserVmexit continuation with no registered vessel");
        ec.raise_hazard(hazard::STOP);
        return true;
    };

    match exit {
        hypervisor::VmExit::ExternalInterrupt | hypervisor::VmExit::Nmi | hypervisor::VmExit::FpuTrap => false,
        hypervisor::VmExit::NestedPageFault { gpa } => deliver_vm_upcall(ec, cpu, gpa),
        hypervisor::VmExit::InvalidState => deliver_vm_upcall(ec, cpu, 0),
        hypervisor::VmExit::Other { selector } => deliver_vm_upcall(ec, cpu, selector as usize),
    }
}

fn deliver_vm_upcall(ec: &Ec, cpu: usize, offset: usize) -> bool {
    let owner_pd = unsafe { ec.pd.as_ref() };
    let Some(event_base) = crate::pd_table::event_base(ec.pd) else {
        ec.raise_hazard(hazard::STOP);
        return true;
    };
    let Some(sc) = scheduler::percpu(cpu).current() else {
        ec.raise_hazard(hazard::STOP);
        return true;
    };

    matches!(
        ipc::upcall::upcall(owner_pd, event_base, offset, ec, sc, cpu),
        ipc::upcall::UpcallOutcome::Killed
    )
}

// --- 2: create_pd ---------------------------------------------------------

fn create_pd(cur: &Current, flags: u64, selector: usize, frame: &mut TrapFrame) -> Result<(), KernelError> {
    let requestor_sel = Id(frame.rbx as usize);

    match flags {
        create_pd_subop::NEW => {
            captab::pd::create_pd(cur.pd, requestor_sel, Id(selector))?;
            let new_pd: NonNull<Pd> = cur
                .pd
                .obj_space
                .lookup(Id(selector))
                .validate(ObjectKind::Pd, perm::PD)?
                .cast();
            let event_base = NEXT_EVENT_BASE.fetch_add(EVENT_BASE_STRIDE, core::sync::atomic::Ordering::AcqRel);
            crate::pd_table::register(new_pd, event_base);
            Ok(())
        }
        sub @ (create_pd_subop::ADD_GUEST
        | create_pd_subop::ADD_DMA
        | create_pd_subop::ADD_PIO
        | create_pd_subop::ADD_MSR) => {
            validate_pd_requestor(cur.pd, requestor_sel)?;
            let target: NonNull<Pd> = cur
                .pd
                .obj_space
                .lookup(Id(selector))
                .validate(ObjectKind::Pd, perm::PD)?
                .cast();

            crate::pd_table::with_spaces(target, |spaces| match sub {
                create_pd_subop::ADD_GUEST => {
                    spaces.add_guest();
                }
                create_pd_subop::ADD_DMA => {
                    spaces.add_dma();
                }
                create_pd_subop::ADD_PIO => {
                    spaces.add_pio();
                }
                create_pd_subop::ADD_MSR => {
                    spaces.add_msr();
                }
                _ => unreachable!(),
            })
            .ok_or(KernelError::BadCap)
        }
        _ => Err(KernelError::BadPar),
    }
}

// --- 3: create_ec ----------------------------------------------------------

fn create_ec(cur: &Current, flags: u64, selector: usize, frame: &mut TrapFrame) -> Result<(), KernelError> {
    let requestor_sel = Id(frame.rbx as usize);
    let owner_pd_sel = Id(frame.rcx as usize);
    let cpu = frame.rdx as usize;
    let utcb_addr = frame.rsi as usize;
    let initial_rip = frame.rdi as usize;

    let sub_kind = match flags {
        0 => EcSubKind::Local,
        1 => EcSubKind::Global,
        2 => EcSubKind::Vcpu,
        _ => return Err(KernelError::BadPar),
    };

    let utcb = NonNull::new(utcb_addr as *mut u8);

    captab::ec::create_ec(cur.pd, requestor_sel, owner_pd_sel, Id(selector), sub_kind, cpu, utcb)?;
    let ec: NonNull<Ec> = cur
        .pd
        .obj_space
        .lookup(Id(selector))
        .validate(ObjectKind::Ec, perm::EC)?
        .cast();

    match sub_kind {
        // Local ECs only ever acquire an entry point from a portal's
        // `entry_ip` at call time; a Global EC has none until its
        // creator gives it one, since nothing else in this ABI writes
        // an EC's saved frame before it is first dispatched.
        EcSubKind::Global => {
            unsafe { ec.as_ref() }.with_frame_mut(|saved| saved.rip = initial_rip as u64);
        }
        EcSubKind::Vcpu => {
            crate::vcpu_table::register(ec, initial_rip);
        }
        EcSubKind::Local => {}
    }
    Ok(())
}

// --- 4: create_sc ----------------------------------------------------------

fn create_sc(cur: &Current, selector: usize, frame: &TrapFrame) -> Result<(), KernelError> {
    let requestor_sel = Id(frame.rbx as usize);
    let ec_sel = Id(frame.rcx as usize);
    let cpu = frame.rdx as usize;
    let priority = frame.rsi as u8;
    let budget = frame.rdi;

    captab::sc::create_sc(cur.pd, requestor_sel, ec_sel, Id(selector), cpu, priority, budget)
}

// --- 5: create_pt ----------------------------------------------------------

fn create_pt(cur: &Current, selector: usize, frame: &TrapFrame) -> Result<(), KernelError> {
    let requestor_sel = Id(frame.rbx as usize);
    let ec_sel = Id(frame.rcx as usize);
    let entry_ip = frame.rdx as usize;
    let mtd = frame.rsi as usize;

    captab::pt::create_pt(cur.pd, requestor_sel, ec_sel, Id(selector), entry_ip, mtd)
}

// --- 6: create_sm ----------------------------------------------------------

fn create_sm(cur: &Current, selector: usize, frame: &TrapFrame) -> Result<(), KernelError> {
    let requestor_sel = Id(frame.rbx as usize);
    let initial = frame.rcx;

    captab::sm::create_sm(cur.pd, requestor_sel, Id(selector), initial)
}

// --- 7: ctrl_pd (delegate) --------------------------------------------------

fn ctrl_pd(cur: &Current, flags: u64, dst_pd_sel: usize, frame: &TrapFrame) -> Result<(), KernelError> {
    let dst_pd: NonNull<Pd> = cur
        .pd
        .obj_space
        .lookup(Id(dst_pd_sel))
        .validate(ObjectKind::Pd, perm::PD)?
        .cast();
    let dst_pd_ref = unsafe { dst_pd.as_ref() };

    let src_base = frame.rbx as usize;
    let dst_base = frame.rcx as usize;
    let order = frame.rdx as u32;
    let perm_mask = frame.rsi;

    if flags == delegate_kind::OBJ {
        return captab::space::ObjSpace::delegate(
            &cur.pd.obj_space,
            &dst_pd_ref.obj_space,
            Id(src_base),
            Id(dst_base),
            order,
            perm_mask as u8,
        );
    }

    let permission_mask = Permission::from_bits(perm_mask as u8);
    let src_spaces = crate::pd_table::with_spaces(NonNull::from(cur.pd), |s| s as *mut memspace::PdSpaces as usize);
    let dst_spaces = crate::pd_table::with_spaces(dst_pd, |s| s as *mut memspace::PdSpaces as usize);
    let (Some(src_ptr), Some(dst_ptr)) = (src_spaces, dst_spaces) else {
        return Err(KernelError::BadCap);
    };
    // SAFETY: both pointers were taken from live `PdSpaces` under the
    // `pd_table` lock, which has since been released; neither PD's entry
    // is removed except by `destroy_pd`'s RCU grace period, which can't
    // fire while this capability's reference is alive.
    let src_spaces = unsafe { &*(src_ptr as *const memspace::PdSpaces) };
    let dst_spaces = unsafe { &*(dst_ptr as *const memspace::PdSpaces) };

    let pick = |spaces: &memspace::PdSpaces, kind: u64| -> Option<&memspace::Space> {
        match kind {
            delegate_kind::HOST => Some(&spaces.host),
            delegate_kind::GUEST => spaces.guest.as_deref(),
            delegate_kind::DMA => spaces.dma.as_deref(),
            delegate_kind::PIO => spaces.pio.as_deref(),
            delegate_kind::MSR => spaces.msr.as_deref(),
            _ => None,
        }
    };

    let src_space = pick(src_spaces, flags).ok_or(KernelError::BadPar)?;
    let dst_space = pick(dst_spaces, flags).ok_or(KernelError::BadPar)?;

    memspace::Space::delegate(src_space, dst_space, src_base, dst_base, order, permission_mask)
}

// --- 8: ctrl_ec (recall) ----------------------------------------------------

fn ctrl_ec(cur: &Current, flags: u64, ec_sel: usize) -> Result<(), KernelError> {
    let target: NonNull<Ec> = cur
        .pd
        .obj_space
        .lookup(Id(ec_sel))
        .validate(ObjectKind::Ec, perm::EC)?
        .cast();
    let target_ref = unsafe { target.as_ref() };

    target_ref.raise_hazard(hazard::RECALL);

    // A "strong" recall (flag bit 0) additionally kicks the EC's home
    // CPU so the hazard is observed even if it's halted or deep in a
    // long-running guest, instead of waiting for its next natural exit.
    if flags & 0x1 != 0 {
        unsafe { crate::trap::send_rke(target_ref.cpu() as u32) };
    }
    Ok(())
}

// --- 9: ctrl_sc (consumed time) ---------------------------------------------

fn ctrl_sc(cur: &Current, sc_sel: usize, frame: &mut TrapFrame) -> Result<(), KernelError> {
    let target: NonNull<Sc> = cur
        .pd
        .obj_space
        .lookup(Id(sc_sel))
        .validate(ObjectKind::Sc, perm::SC)?
        .cast();
    let sc = unsafe { target.as_ref() };
    frame.rbx = sc.budget - sc.remaining();
    Ok(())
}

// --- 10: ctrl_pt (reconfigure / badge) --------------------------------------

fn ctrl_pt(cur: &Current, pt_sel: usize, frame: &TrapFrame) -> Result<(), KernelError> {
    let target: NonNull<Pt> = cur
        .pd
        .obj_space
        .lookup(Id(pt_sel))
        .validate(ObjectKind::Pt, perm::EVENT)?
        .cast();
    let pt = unsafe { target.as_ref() };

    let entry_ip = frame.rbx as usize;
    let mtd = frame.rcx as usize;
    pt.reconfigure(entry_ip, mtd);
    pt.set_badge(frame.rdx as usize);
    Ok(())
}

// --- 11: ctrl_sm (up/down) ---------------------------------------------------

mod sm_flags {
    pub const DOWN: u64 = 0;
    pub const UP: u64 = 1;
}

fn ctrl_sm(cur: &Current, cpu: usize, flags: u64, sm_sel: usize, frame: &mut TrapFrame) -> Result<(), KernelError> {
    let direction = flags & 0x1;
    let required = match direction {
        sm_flags::UP => perm::CTRL_UP,
        sm_flags::DOWN => perm::CTRL_DOWN,
        _ => unreachable!("masked by 0x1"),
    };

    let sm_ptr: NonNull<Sm> = cur.pd.obj_space.lookup(Id(sm_sel)).validate(ObjectKind::Sm, required)?.cast();
    let sm = unsafe { sm_ptr.as_ref() };

    if direction == sm_flags::UP {
        // A woken EC's blocked SC was parked directly on it (the same
        // `park_sc`/`take_parked_scs` slot `ipc::engine`'s helping
        // protocol uses), so `scheduler::release_helpers` drains it the
        // same way a portal reply does.
        if let Some(woken) = sm.up() {
            // Cancel any armed deadline before it's handed a stale
            // timeout expiry later (spec §4.I); a racing `on_interrupt`
            // that already claimed this entry is harmless, `disarm` is
            // idempotent.
            crate::timeout::disarm(woken);
            for outcome in scheduler::release_helpers(unsafe { woken.as_ref() }) {
                if let RemoteEnqueueOutcome::SendRrq(apic_id) = outcome {
                    unsafe { crate::trap::send_rrq(apic_id as u32) };
                }
            }
        }
        Ok(())
    } else {
        let deadline = frame.rbx;
        match sm.down(NonNull::from(cur.ec)) {
            DownOutcome::Acquired => Ok(()),
            DownOutcome::Blocked => {
                cur.ec.park_sc(cur.sc);
                if deadline != 0 {
                    crate::timeout::arm(NonNull::from(cur.ec), sm_ptr, deadline);
                }
                reschedule_after_block(cpu, frame);
                Ok(())
            }
        }
    }
}

// --- 12: ctrl_hw -------------------------------------------------------------

fn ctrl_hw(cur: &Current, flags: u64) -> Result<(), KernelError> {
    if flags & 0x1 == 0 {
        return Err(KernelError::BadPar);
    }
    crate::power::request_sleep(NonNull::from(cur.pd))
}

// --- 13: assign_int ----------------------------------------------------------

fn assign_int(cur: &Current, gsi: usize, frame: &mut TrapFrame) -> Result<(), KernelError> {
    let sm_sel = Id(frame.rbx as usize);
    let target_cpu = frame.rcx as u32;

    let sm_ptr: NonNull<Sm> = cur
        .pd
        .obj_space
        .lookup(sm_sel)
        .validate(ObjectKind::Sm, perm::CTRL_UP)?
        .cast();

    const GENERIC_DEVICE_VECTOR: u8 = 254;
    unsafe {
        drivers::interrupt::assign_gsi(gsi as u32, GENERIC_DEVICE_VECTOR, target_cpu, false, true)
            .map_err(|()| KernelError::BadDev)?;
    }
    crate::percpu::bind_irq(target_cpu as usize, sm_ptr);

    let msi = drivers::interrupt::msi_target(target_cpu, GENERIC_DEVICE_VECTOR);
    frame.rbx = msi.address;
    frame.rcx = u64::from(msi.data);
    Ok(())
}

// --- 14: assign_dev -----------------------------------------------------------

fn assign_dev(cur: &Current, stream_id: usize, frame: &TrapFrame) -> Result<(), KernelError> {
    if !crate::power::is_root(NonNull::from(cur.pd)) {
        return Err(KernelError::BadHyp);
    }

    let iommu = frame.rbx as usize;
    let dma_pd_sel = Id(frame.rcx as usize);

    let target_pd: NonNull<Pd> = cur
        .pd
        .obj_space
        .lookup(dma_pd_sel)
        .validate(ObjectKind::Pd, perm::PD)?
        .cast();

    let mut sdid = 0usize;
    let root = crate::dma_root::allocate(&mut sdid)?;

    crate::pd_table::with_spaces(target_pd, |spaces| {
        let dma = spaces.add_dma();
        dma.assign_sdid(sdid)
    })
    .ok_or(KernelError::BadCap)??;

    unsafe { target_pd.as_ref() }.assign_device(stream_id)?;

    drivers::iommu::configure(iommu, stream_id as u16, root, sdid).map_err(|_| KernelError::BadDev)
}
