//! # Disk Layout

/// Bytes per disk sector.
///
/// Also the unit of file allocation: a file of `n` bytes occupies
/// `ceil(n / SECTOR_SIZE)` data sectors.
pub const SECTOR_SIZE: usize = 128;

/// Number of sectors on the simulated disk.
pub const NUM_SECTORS: usize = 32 * 32;

/// Sector holding the header of the file that persists the free-space bitmap.
pub const FREE_MAP_SECTOR: u32 = 0;

/// Sector holding the header of the directory file.
pub const DIRECTORY_SECTOR: u32 = 1;

/// Number of entries in the flat root directory.
pub const NUM_DIR_ENTRIES: usize = 10;

/// Longest file name, in bytes, that fits a directory entry.
pub const FILE_NAME_MAX_LEN: usize = 9;

/// Bytes needed to persist one bit per sector.
pub const FREE_MAP_FILE_SIZE: usize = NUM_SECTORS.div_ceil(8);

const _: () = {
    assert!(SECTOR_SIZE.is_multiple_of(4));
    assert!(SECTOR_SIZE >= 16);
    assert!(NUM_SECTORS > DIRECTORY_SECTOR as usize);
    assert!(FREE_MAP_SECTOR != DIRECTORY_SECTOR);
};
