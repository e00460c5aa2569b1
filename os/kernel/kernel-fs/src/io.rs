//! Byte-range transfers through an extent header.

use crate::extent::ExtentHeader;
use alloc::vec;
use core::ops::Range;
use kernel_disk::SectorDevice;

/// Copy up to `buf.len()` bytes starting at `offset`, clamped to the file
/// length. Returns the number of bytes read.
pub(crate) fn read_at(
    header: &ExtentHeader,
    device: &dyn SectorDevice,
    buf: &mut [u8],
    offset: usize,
) -> usize {
    let length = header.file_length();
    if offset >= length || buf.is_empty() {
        return 0;
    }
    let count = buf.len().min(length - offset);
    let sector_size = header.geometry().sector_size();
    let sectors = header.sector_map(device);

    let mut scratch = vec![0u8; sector_size];
    let mut done = 0;
    for index in offset / sector_size..=(offset + count - 1) / sector_size {
        let start = (offset + done) % sector_size;
        let n = (sector_size - start).min(count - done);
        device.read_sector(sectors[index], &mut scratch);
        buf[done..done + n].copy_from_slice(&scratch[start..start + n]);
        done += n;
    }
    count
}

/// Copy `buf` into the file at `offset`, clamped to the file length.
/// Partial sectors are read, patched and written back.
pub(crate) fn write_at(
    header: &ExtentHeader,
    device: &dyn SectorDevice,
    buf: &[u8],
    offset: usize,
) -> usize {
    let length = header.file_length();
    if offset >= length || buf.is_empty() {
        return 0;
    }
    let count = buf.len().min(length - offset);
    let sector_size = header.geometry().sector_size();
    let sectors = header.sector_map(device);

    let mut scratch = vec![0u8; sector_size];
    let mut done = 0;
    for index in offset / sector_size..=(offset + count - 1) / sector_size {
        let start = (offset + done) % sector_size;
        let n = (sector_size - start).min(count - done);
        if n < sector_size {
            device.read_sector(sectors[index], &mut scratch);
        }
        scratch[start..start + n].copy_from_slice(&buf[done..done + n]);
        device.write_sector(sectors[index], &scratch);
        done += n;
    }
    count
}

/// Zero the data sectors with file indices in `range`.
pub(crate) fn zero_sectors(header: &ExtentHeader, device: &dyn SectorDevice, range: Range<usize>) {
    if range.is_empty() {
        return;
    }
    let zeros = vec![0u8; header.geometry().sector_size()];
    for sector in &header.sector_map(device)[range] {
        device.write_sector(*sector, &zeros);
    }
}
