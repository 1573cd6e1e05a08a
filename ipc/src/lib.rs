//! Synchronous portal IPC: `call`/`reply`, the register/UTCB transfer
//! engine, and the exception-upcall path built on top of the same
//! rendezvous.
//!
//! This crate owns none of the scheduling state itself — `call` and
//! `reply` report an outcome (who became runnable, whose SC needs
//! remote-enqueuing) and leave acting on it to the syscall layer, the same
//! division `captab::sm::Sm` already uses for its `up`/`down` pair.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod engine;
pub mod mtd;
pub mod upcall;
pub mod utcb;

pub use engine::{CallOutcome, ReplyOutcome, call, reply};
pub use mtd::Mtd;
pub use upcall::upcall;
