//! # Sector store
//!
//! The lowest layer of the storage stack: a fixed-size, sector-addressed
//! block device with synchronous whole-sector transfers.
//!
//! - [`SectorId`]: index of one sector, with the on-disk `-1` sentinel for
//!   "unallocated" mapped to `Option<SectorId>`.
//! - [`SectorDevice`]: the blocking `read_sector` / `write_sector` interface
//!   every layer above talks to.
//! - [`RamDisk`]: an in-memory device with transfer counters, used by the
//!   simulator and by tests.
//!
//! A transfer either completes or panics; there are no recoverable device
//! errors at this level.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod ram_disk;

use core::fmt;

pub use ram_disk::{DiskStats, RamDisk};

/// Index of one sector on a [`SectorDevice`].
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SectorId(u32);

impl SectorId {
    /// On-disk encoding of "no sector".
    pub const UNALLOCATED: i32 = -1;

    #[inline]
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Build from a bitmap index.
    ///
    /// # Panics
    /// If `index` does not fit the 32-bit on-disk encoding.
    #[inline]
    #[must_use]
    pub fn from_index(index: usize) -> Self {
        let raw = i32::try_from(index).expect("sector index exceeds on-disk pointer width");
        Self(raw.unsigned_abs())
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Decode an on-disk pointer; any negative value is "unallocated".
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: i32) -> Option<Self> {
        if raw < 0 {
            None
        } else {
            Some(Self(raw.unsigned_abs()))
        }
    }

    /// Encode for disk; `None` becomes [`UNALLOCATED`](Self::UNALLOCATED).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn to_raw(sector: Option<Self>) -> i32 {
        match sector {
            Some(s) => s.0 as i32,
            None => Self::UNALLOCATED,
        }
    }
}

impl fmt::Debug for SectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SectorId({})", self.0)
    }
}

impl fmt::Display for SectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A sector-addressed block device.
///
/// Implementations block the caller until the transfer completes. Both
/// transfer methods take `&self` so one device can be shared by the file
/// system and every open file.
pub trait SectorDevice: Send + Sync {
    /// Bytes per sector; every buffer passed in must be exactly this long.
    fn sector_size(&self) -> usize;

    /// Number of addressable sectors.
    fn num_sectors(&self) -> usize;

    /// Copy sector `sector` into `buf`.
    ///
    /// # Panics
    /// If `sector` is out of range or `buf.len() != sector_size()`.
    fn read_sector(&self, sector: SectorId, buf: &mut [u8]);

    /// Overwrite sector `sector` with `buf`.
    ///
    /// # Panics
    /// If `sector` is out of range or `buf.len() != sector_size()`.
    fn write_sector(&self, sector: SectorId, buf: &[u8]);
}
