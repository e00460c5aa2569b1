//! # Kernel Configuration
//!
//! This crate is the single source of truth for the sizes and limits shared by
//! the disk, file and paging layers. Every other crate in the workspace reads
//! its defaults from here, so the simulated disk, the file headers that
//! describe it and the address spaces that swap onto it always agree.
//!
//! ## Overview
//!
//! The configuration is split into two modules:
//!
//! ### Disk Layout ([`disk`])
//! * **Sector size**: the unit of every device transfer and of file allocation
//! * **Sector count**: the size of the free-space bitmap
//! * **Well-known sectors**: where the free-map and directory file headers live
//! * **Directory limits**: entry count and maximum file name length
//!
//! ### Memory Layout ([`memory`])
//! * **Page size**: equal to the sector size, so one page swaps as one sector
//! * **Physical frames**: size of main memory and of the global frame pool
//! * **Process limits**: size of the address-space id pool and the per-process
//!   resident frame budget used by FIFO replacement
//! * **User stack**: bytes appended to every address space
//!
//! ```text
//! Disk (NUM_SECTORS × SECTOR_SIZE):
//! sector 0 ┌──────────────────────────────┐
//!          │ free-map file header         │
//! sector 1 ├──────────────────────────────┤
//!          │ directory file header        │
//! sector 2 ├──────────────────────────────┤
//!          │ file headers, indirect       │
//!          │ blocks and data sectors      │
//!          │ (handed out by the free map) │
//!          └──────────────────────────────┘
//! ```
//!
//! ## Compile-Time and Runtime Configuration
//!
//! The constants are `const` values checked by compile-time assertions. The
//! paging limits can additionally be overridden at runtime through
//! [`memory::VmConfig`], whose [`Default`] is built from the constants. Tests
//! use that to shrink the per-process frame budget and exercise eviction.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod disk;
pub mod memory;
