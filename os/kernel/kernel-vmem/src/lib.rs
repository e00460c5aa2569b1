//! # Demand-Paged Virtual Memory
//!
//! User address spaces for the simulated machine, backed by per-process
//! swap files on the extent file system.
//!
//! ## What you get
//! - A [`Machine`]: main memory, the user register file, the installed
//!   translation and the global frame and address-space-id pools.
//! - A linear [`PageTable`] of [`TranslationEntry`] values with packed
//!   [`EntryFlags`].
//! - An [`AddressSpace`] that loads a NOFF executable, pages on demand and
//!   evicts in FIFO order once its frame budget is used.
//! - Tiny [`VirtualAddress`]/[`PhysicalFrame`]-style newtypes (u32) so
//!   address kinds cannot be mixed up.
//!
//! ## Translation
//!
//! ```text
//!  virtual address
//!  ├─ page   = addr / P ──► PageTable[page] ── valid? ──► frame
//!  └─ offset = addr % P ─────────────────────────────────► frame * P + offset
//!                                       │
//!                                       └─ not valid ──► PageFault ──► admit(page)
//! ```
//!
//! Each address space owns a swap file of `num_pages * P` bytes; virtual
//! page `v` lives at byte `v * P` of it while not resident.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod address_space;
mod addresses;
mod entry;
mod error;
mod machine;
mod noff;
mod page_table;
pub mod registers;

pub use crate::address_space::{AddressSpace, swap_file_name};
pub use crate::addresses::{PhysicalAddress, PhysicalFrame, VirtualAddress, VirtualPage};
pub use crate::entry::{EntryFlags, TranslationEntry};
pub use crate::error::{Exception, NoffError, VmError};
pub use crate::machine::{Machine, PagingStats};
pub use crate::noff::{Executable, HEADER_BYTES, NOFF_MAGIC, NoffHeader, Segment, build_image};
pub use crate::page_table::PageTable;
pub use crate::registers::Registers;
