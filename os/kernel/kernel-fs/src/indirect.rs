use crate::codec::{get_sector, put_sector};
use crate::geometry::{Geometry, WORD_BYTES};
use alloc::vec;
use alloc::vec::Vec;
use kernel_disk::{SectorDevice, SectorId};

/// Contents of an indirect index sector: `D2` data-sector pointers, unused
/// slots holding `-1`, the rest of the sector zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IndirectBlock {
    entries: Vec<Option<SectorId>>,
}

impl IndirectBlock {
    pub(crate) fn empty(geometry: Geometry) -> Self {
        Self {
            entries: vec![None; geometry.indirect()],
        }
    }

    pub(crate) fn fetch_from(geometry: Geometry, device: &dyn SectorDevice, sector: SectorId) -> Self {
        let mut buf = vec![0u8; geometry.sector_size()];
        device.read_sector(sector, &mut buf);
        Self {
            entries: (0..geometry.indirect())
                .map(|i| get_sector(&buf, i * WORD_BYTES))
                .collect(),
        }
    }

    pub(crate) fn write_back(&self, geometry: Geometry, device: &dyn SectorDevice, sector: SectorId) {
        let mut buf = vec![0u8; geometry.sector_size()];
        for (i, entry) in self.entries.iter().enumerate() {
            put_sector(&mut buf, i * WORD_BYTES, *entry);
        }
        device.write_sector(sector, &buf);
    }

    #[inline]
    pub(crate) fn get(&self, index: usize) -> Option<SectorId> {
        self.entries[index]
    }

    #[inline]
    pub(crate) fn set(&mut self, index: usize, sector: SectorId) {
        self.entries[index] = Some(sector);
    }

    /// The allocated entries, in order, up to the first unused slot.
    pub(crate) fn allocated(&self) -> impl Iterator<Item = SectorId> + '_ {
        self.entries.iter().map_while(|e| *e)
    }
}
