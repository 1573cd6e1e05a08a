//! Bootloader-protocol glue (Limine requests, memory map translation).

pub mod limine;
