//! Root-task bootstrap (spec §6): seeds the root PD's self-capability,
//! creates its root EC and SC, initializes the per-boot singletons the
//! syscall handlers depend on, and builds the HIP the root EC reads to
//! learn the object-space/event/CPU geometry it is running under.
//!
//! Called once, as the last step of early boot, right before the
//! scheduler runs for the first time. There is no capability to present
//! for the very first PD (`captab::pd::Pd::bootstrap_root`'s own doc
//! comment); this publishes a self-referential one directly instead of
//! going through `captab::pd::create_pd`, then uses the normal factory
//! calls for everything downstream of it.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::ptr::NonNull;

use captab::capability::{Capability, perm};
use captab::ec::{Ec, create_ec};
use captab::object::{EcSubKind, ObjectKind};
use captab::pd::Pd;
use captab::sc::{PRIORITY_LEVELS, create_sc};
use utils::collections::id::Id;

use crate::hip::{Hip, HipCpuDesc, HipExtent};

/// Selector the root PD holds a capability to itself at. Every bootstrap
/// factory call below uses this as both `requestor_sel` and
/// `owner_pd_sel`.
const SELF_SEL: Id = Id(0);
const ROOT_EC_SEL: Id = Id(1);
const ROOT_SC_SEL: Id = Id(2);

/// The default priority and budget the root task's first SC runs with.
/// The root task is free to create narrower ones for its children once
/// running; these just need to be valid, not meaningful.
const ROOT_PRIORITY: u8 = PRIORITY_LEVELS / 2;
const ROOT_BUDGET: u64 = 10_000;

/// Bootstrap parameters only the early boot sequence can supply.
pub struct BootInfo {
    pub kernel_image: HipExtent,
    pub console: HipExtent,
    pub root_task: HipExtent,
    pub root_task_entry: usize,
    pub boot_cpu: usize,
    pub cpus: Vec<HipCpuDesc>,
}

/// Creates the root PD, its root EC/SC, and the HIP describing them.
/// Returns the root PD and the built HIP; the caller publishes the HIP
/// wherever the root EC expects to find it (spec §6) and hands off to
/// the scheduler.
pub fn init(info: BootInfo) -> (NonNull<Pd>, Hip) {
    let root = NonNull::from(Box::leak(Box::new(Pd::bootstrap_root())));
    let root_ref = unsafe { root.as_ref() };

    let self_cap = Capability::new(NonNull::from(root_ref.header()), perm::PD);
    root_ref
        .obj_space
        .publish(SELF_SEL, self_cap)
        .expect("root object space is empty at boot");

    crate::pd_table::register(root, 0);
    crate::power::set_root(root);
    crate::dma_root::init();

    create_ec(
        root_ref,
        SELF_SEL,
        SELF_SEL,
        ROOT_EC_SEL,
        EcSubKind::Global,
        info.boot_cpu,
        None,
    )
    .expect("root EC creation cannot fail against a freshly seeded object space");

    let root_ec = root_ref
        .obj_space
        .lookup(ROOT_EC_SEL)
        .validate(ObjectKind::Ec, perm::EC)
        .expect("just published")
        .cast::<Ec>();
    unsafe { root_ec.as_ref() }.with_frame_mut(|frame| frame.rip = info.root_task_entry as u64);

    create_sc(
        root_ref,
        SELF_SEL,
        ROOT_EC_SEL,
        ROOT_SC_SEL,
        info.boot_cpu,
        ROOT_PRIORITY,
        ROOT_BUDGET,
    )
    .expect("root SC creation cannot fail against a freshly seeded object space");

    let root_sc = root_ref
        .obj_space
        .lookup(ROOT_SC_SEL)
        .validate(ObjectKind::Sc, perm::SC)
        .expect("just published")
        .cast();
    scheduler::remote_enqueue(info.boot_cpu, root_sc);

    let hip = Hip::build(info.kernel_image, info.console, info.root_task, &info.cpus);
    (root, hip)
}
