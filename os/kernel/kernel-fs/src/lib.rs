//! # Extent-indexed file store
//!
//! Files are described by one [`ExtentHeader`] per file: the logical size,
//! a modification time and `D` direct sector pointers, plus a single
//! pointer to an indirect sector with `D2` more. The header occupies exactly
//! one sector and is serialized field by field (see [`extent`]).
//!
//! On top of the index sits a small flat file system:
//!
//! - [`FileSystem`] owns the free-sector [`Bitmap`](kernel_bitmap::Bitmap)
//!   and the single directory, both persisted as ordinary files whose
//!   headers live in well-known sectors.
//! - [`OpenFile`] reads and writes byte ranges and grows the file through
//!   [`ExtentHeader::extend`] when a write runs past the end.
//!
//! Growth is all-or-nothing. Newly allocated data sectors are zero-filled,
//! so a fresh file reads back as zeros.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod clock;
mod codec;
mod directory;
mod error;
pub mod extent;
mod file_system;
mod geometry;
mod indirect;
mod io;
mod open_file;

pub use clock::{Clock, ManualClock};
pub use error::{ExtentError, FsError, GeometryError};
pub use extent::{ExtentHeader, HeaderDump};
pub use file_system::{FileKind, FileSystem};
pub use geometry::{Geometry, HEADER_FIXED_BYTES, WORD_BYTES};
pub use open_file::OpenFile;
