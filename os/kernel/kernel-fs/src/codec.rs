//! Little-endian field access for on-disk records.

use crate::geometry::WORD_BYTES;
use kernel_disk::SectorId;

#[inline]
pub(crate) fn get_i32(buf: &[u8], at: usize) -> i32 {
    let mut raw = [0u8; WORD_BYTES];
    raw.copy_from_slice(&buf[at..at + WORD_BYTES]);
    i32::from_le_bytes(raw)
}

#[inline]
pub(crate) fn put_i32(buf: &mut [u8], at: usize, value: i32) {
    buf[at..at + WORD_BYTES].copy_from_slice(&value.to_le_bytes());
}

#[inline]
pub(crate) fn get_sector(buf: &[u8], at: usize) -> Option<SectorId> {
    SectorId::from_raw(get_i32(buf, at))
}

#[inline]
pub(crate) fn put_sector(buf: &mut [u8], at: usize, sector: Option<SectorId>) {
    put_i32(buf, at, SectorId::to_raw(sector));
}
