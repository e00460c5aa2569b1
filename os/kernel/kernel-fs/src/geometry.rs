use crate::error::GeometryError;
use kernel_info::disk::SECTOR_SIZE;

/// Width of one on-disk sector pointer or integer field.
pub const WORD_BYTES: usize = 4;

/// Header bytes that are not direct pointers: size, modification time and
/// the indirect pointer.
pub const HEADER_FIXED_BYTES: usize = 3 * WORD_BYTES;

/// Shape of an extent header on a disk with a given sector size.
///
/// `direct` pointers live in the header itself, `indirect` pointers in one
/// optional index sector. By default both are as large as a sector allows;
/// [`with_limits`](Self::with_limits) shrinks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    sector_size: usize,
    direct: usize,
    indirect: usize,
}

impl Geometry {
    /// Geometry of the default 128-byte sector.
    pub const DEFAULT: Self = Self {
        sector_size: SECTOR_SIZE,
        direct: (SECTOR_SIZE - HEADER_FIXED_BYTES) / WORD_BYTES,
        indirect: SECTOR_SIZE / WORD_BYTES,
    };

    /// Largest geometry a `sector_size`-byte sector can hold.
    ///
    /// # Errors
    /// If the sector cannot hold a header with at least one direct pointer.
    pub const fn for_sector_size(sector_size: usize) -> Result<Self, GeometryError> {
        if sector_size % WORD_BYTES != 0 {
            return Err(GeometryError::Unaligned(sector_size));
        }
        if sector_size <= HEADER_FIXED_BYTES {
            return Err(GeometryError::SectorTooSmall(sector_size));
        }
        Self::with_limits(
            sector_size,
            (sector_size - HEADER_FIXED_BYTES) / WORD_BYTES,
            sector_size / WORD_BYTES,
        )
    }

    /// Geometry with explicit pointer counts.
    ///
    /// # Errors
    /// If the pointers do not fit their sectors, or the largest file would
    /// not fit the 32-bit size field.
    pub const fn with_limits(
        sector_size: usize,
        direct: usize,
        indirect: usize,
    ) -> Result<Self, GeometryError> {
        if sector_size % WORD_BYTES != 0 {
            return Err(GeometryError::Unaligned(sector_size));
        }
        if sector_size <= HEADER_FIXED_BYTES {
            return Err(GeometryError::SectorTooSmall(sector_size));
        }
        if direct == 0 {
            return Err(GeometryError::NoDirect);
        }
        let max_direct = (sector_size - HEADER_FIXED_BYTES) / WORD_BYTES;
        if direct > max_direct {
            return Err(GeometryError::TooManyDirect {
                direct,
                max: max_direct,
            });
        }
        let max_indirect = sector_size / WORD_BYTES;
        if indirect > max_indirect {
            return Err(GeometryError::TooManyIndirect {
                indirect,
                max: max_indirect,
            });
        }
        let largest = (direct + indirect) * sector_size;
        if largest > i32::MAX.unsigned_abs() as usize {
            return Err(GeometryError::FileSizeOverflow(largest));
        }
        Ok(Self {
            sector_size,
            direct,
            indirect,
        })
    }

    #[inline]
    #[must_use]
    pub const fn sector_size(&self) -> usize {
        self.sector_size
    }

    /// Direct pointers per header (`D`).
    #[inline]
    #[must_use]
    pub const fn direct(&self) -> usize {
        self.direct
    }

    /// Pointers in the indirect sector (`D2`).
    #[inline]
    #[must_use]
    pub const fn indirect(&self) -> usize {
        self.indirect
    }

    /// Most data sectors one header can index.
    #[inline]
    #[must_use]
    pub const fn max_sectors(&self) -> usize {
        self.direct + self.indirect
    }

    #[inline]
    #[must_use]
    pub const fn max_file_size(&self) -> usize {
        self.max_sectors() * self.sector_size
    }

    /// Data sectors needed for a file of `bytes` bytes.
    #[inline]
    #[must_use]
    pub const fn sectors_for(&self, bytes: usize) -> usize {
        bytes.div_ceil(self.sector_size)
    }

    /// Index sectors (0 or 1) needed to map `sectors` data sectors.
    #[inline]
    #[must_use]
    pub const fn index_sectors_for(&self, sectors: usize) -> usize {
        if sectors > self.direct { 1 } else { 0 }
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::DEFAULT
    }
}
