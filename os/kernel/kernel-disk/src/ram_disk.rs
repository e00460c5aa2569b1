use crate::{SectorDevice, SectorId};
use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};
use kernel_info::disk::{NUM_SECTORS, SECTOR_SIZE};
use kernel_sync::SpinLock;
use log::trace;

/// Transfer counters of a [`RamDisk`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DiskStats {
    pub reads: usize,
    pub writes: usize,
}

/// In-memory sector store.
///
/// Starts zero-filled. Transfers are serialized through a lock, so a
/// `RamDisk` can be shared between threads behind an `Arc`.
pub struct RamDisk {
    sector_size: usize,
    num_sectors: usize,
    bytes: SpinLock<Vec<u8>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl RamDisk {
    /// # Panics
    /// If `sector_size` or `num_sectors` is zero.
    #[must_use]
    pub fn new(sector_size: usize, num_sectors: usize) -> Self {
        assert!(sector_size > 0 && num_sectors > 0, "empty disk geometry");
        Self {
            sector_size,
            num_sectors,
            bytes: SpinLock::new(vec![0; sector_size * num_sectors]),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// A disk with the layout from `kernel_info::disk`.
    #[must_use]
    pub fn with_default_layout() -> Self {
        Self::new(SECTOR_SIZE, NUM_SECTORS)
    }

    /// Load a disk image previously produced by [`to_image`](Self::to_image).
    ///
    /// A short image is zero-extended to the next whole sector.
    ///
    /// # Panics
    /// If `sector_size` is zero.
    #[must_use]
    pub fn from_image(sector_size: usize, image: &[u8]) -> Self {
        assert!(sector_size > 0, "empty disk geometry");
        let num_sectors = image.len().div_ceil(sector_size).max(1);
        let disk = Self::new(sector_size, num_sectors);
        disk.bytes.lock()[..image.len()].copy_from_slice(image);
        disk
    }

    /// Snapshot of the whole disk.
    #[must_use]
    pub fn to_image(&self) -> Vec<u8> {
        self.bytes.lock().clone()
    }

    #[must_use]
    pub fn stats(&self) -> DiskStats {
        DiskStats {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        self.reads.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
    }

    fn span(&self, sector: SectorId, len: usize) -> core::ops::Range<usize> {
        assert!(
            sector.as_usize() < self.num_sectors,
            "sector {sector} out of range (disk has {})",
            self.num_sectors
        );
        assert_eq!(len, self.sector_size, "partial sector transfer");
        let start = sector.as_usize() * self.sector_size;
        start..start + self.sector_size
    }
}

impl SectorDevice for RamDisk {
    fn sector_size(&self) -> usize {
        self.sector_size
    }

    fn num_sectors(&self) -> usize {
        self.num_sectors
    }

    fn read_sector(&self, sector: SectorId, buf: &mut [u8]) {
        let span = self.span(sector, buf.len());
        buf.copy_from_slice(&self.bytes.lock()[span]);
        self.reads.fetch_add(1, Ordering::Relaxed);
        trace!("read sector {sector}");
    }

    fn write_sector(&self, sector: SectorId, buf: &[u8]) {
        let span = self.span(sector, buf.len());
        self.bytes.lock()[span].copy_from_slice(buf);
        self.writes.fetch_add(1, Ordering::Relaxed);
        trace!("wrote sector {sector}");
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn write_then_read_same_sector() {
        let disk = RamDisk::new(16, 4);
        disk.write_sector(SectorId::new(2), &[7; 16]);

        let mut buf = [0u8; 16];
        disk.read_sector(SectorId::new(2), &mut buf);
        assert_eq!(buf, [7; 16]);

        disk.read_sector(SectorId::new(1), &mut buf);
        assert_eq!(buf, [0; 16]);
        assert_eq!(disk.stats(), DiskStats { reads: 2, writes: 1 });
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn reading_past_the_end_panics() {
        let disk = RamDisk::new(16, 4);
        let mut buf = [0u8; 16];
        disk.read_sector(SectorId::new(4), &mut buf);
    }

    #[test]
    #[should_panic(expected = "partial sector transfer")]
    fn short_buffer_panics() {
        let disk = RamDisk::new(16, 4);
        disk.write_sector(SectorId::new(0), &[1; 8]);
    }

    #[test]
    fn image_round_trip() {
        let disk = RamDisk::new(8, 2);
        disk.write_sector(SectorId::new(1), &[9; 8]);
        let copy = RamDisk::from_image(8, &disk.to_image());
        assert_eq!(copy.num_sectors(), 2);
        let mut buf = [0u8; 8];
        copy.read_sector(SectorId::new(1), &mut buf);
        assert_eq!(buf, [9; 8]);
    }
}
