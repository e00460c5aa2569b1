//! # Extent index
//!
//! The on-disk file header: logical size, modification time, `D` direct
//! sector pointers and one pointer to an indirect sector holding `D2` more.
//!
//! ```text
//!  header sector                         indirect sector
//! +------+----------+--------+-----+----------+    +--------+-----+---------+
//! | size | modified | d[0] ..| d[D-1] | ind  | -> | e[0]   | ... | e[D2-1] |
//! +------+----------+--------+-----+----------+    +--------+-----+---------+
//!   i32      i32      i32 each           i32         i32 each
//! ```
//!
//! Every field is a little-endian `i32`; unused pointers hold `-1` and the
//! remainder of the sector is zero. The indirect sector exists only while
//! the file needs more than `D` data sectors.

use crate::codec::{get_i32, get_sector, put_i32, put_sector};
use crate::error::ExtentError;
use crate::geometry::{Geometry, HEADER_FIXED_BYTES, WORD_BYTES};
use crate::indirect::IndirectBlock;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use kernel_bitmap::Bitmap;
use kernel_disk::{SectorDevice, SectorId};
use log::{debug, warn};

const SIZE_OFFSET: usize = 0;
const MODIFIED_OFFSET: usize = WORD_BYTES;
const DIRECT_OFFSET: usize = 2 * WORD_BYTES;

/// In-memory image of one file header.
#[derive(Clone, PartialEq, Eq)]
pub struct ExtentHeader {
    geometry: Geometry,
    size: usize,
    modified: i32,
    direct: Vec<Option<SectorId>>,
    indirect: Option<SectorId>,
}

impl ExtentHeader {
    /// `modified_time` of a file whose changes are not tracked.
    pub const UNTRACKED: i32 = 0;

    /// A zero-length header that owns no sectors.
    #[must_use]
    pub fn empty(geometry: Geometry) -> Self {
        Self {
            geometry,
            size: 0,
            modified: Self::UNTRACKED,
            direct: vec![None; geometry.direct()],
            indirect: None,
        }
    }

    /// Build a header for a new file of `file_size` bytes, drawing its data
    /// sectors (and the indirect sector, if needed) from `free_map`.
    ///
    /// Nothing is taken from `free_map` unless the whole allocation fits.
    ///
    /// # Errors
    /// [`ExtentError::FileTooLarge`] if the file needs more than `D + D2`
    /// sectors, [`ExtentError::DiskFull`] if `free_map` cannot supply them.
    pub fn allocate(
        geometry: Geometry,
        free_map: &mut Bitmap,
        device: &dyn SectorDevice,
        file_size: usize,
    ) -> Result<Self, ExtentError> {
        let sectors = geometry.sectors_for(file_size);
        if sectors > geometry.max_sectors() {
            warn!(
                "cannot allocate {file_size} bytes: {sectors} sectors exceed {}+{} pointers",
                geometry.direct(),
                geometry.indirect()
            );
            return Err(ExtentError::FileTooLarge {
                requested: sectors,
                capacity: geometry.max_sectors(),
            });
        }

        let needed = sectors + geometry.index_sectors_for(sectors);
        let free = free_map.num_clear();
        if needed > free {
            warn!("cannot allocate {file_size} bytes: need {needed} sectors, {free} free");
            warn!("{free_map}");
            return Err(ExtentError::DiskFull { needed, free });
        }

        let mut header = Self::empty(geometry);
        header.size = file_size;
        header.grow_into(free_map, device, 0, sectors);
        debug!("allocated {header:?}");
        Ok(header)
    }

    /// Return every sector this header owns to `free_map`.
    ///
    /// # Panics
    /// If any of those sectors is not marked in use.
    pub fn deallocate(self, free_map: &mut Bitmap, device: &dyn SectorDevice) {
        let sectors = self.sector_count();
        for sector in self.direct.iter().take(sectors) {
            release(free_map, sector.expect("direct pointer missing below sector count"));
        }
        if let Some(indirect) = self.indirect {
            let block = IndirectBlock::fetch_from(self.geometry, device, indirect);
            for i in 0..sectors.saturating_sub(self.geometry.direct()) {
                release(free_map, block.get(i).expect("indirect entry missing below sector count"));
            }
            release(free_map, indirect);
        }
        debug!("deallocated {self:?}");
    }

    /// Grow the file to `new_size` bytes, stamping it with `now`.
    ///
    /// Growth is all-or-nothing: capacity and free space for every new data
    /// sector plus a new indirect sector are checked before any is taken.
    ///
    /// # Errors
    /// [`ExtentError::Shrink`] if `new_size` is below the current size,
    /// otherwise as for [`allocate`](Self::allocate). The header is unchanged
    /// on error.
    pub fn extend(
        &mut self,
        new_size: usize,
        free_map: &mut Bitmap,
        device: &dyn SectorDevice,
        now: i32,
    ) -> Result<(), ExtentError> {
        if new_size < self.size {
            return Err(ExtentError::Shrink {
                current: self.size,
                requested: new_size,
            });
        }
        if new_size == self.size {
            return Ok(());
        }

        let old_sectors = self.sector_count();
        let new_sectors = self.geometry.sectors_for(new_size);
        if new_sectors == old_sectors {
            self.size = new_size;
            self.modified = now;
            return Ok(());
        }

        if new_sectors > self.geometry.max_sectors() {
            self.report_failure(new_size, new_sectors, free_map);
            return Err(ExtentError::FileTooLarge {
                requested: new_sectors,
                capacity: self.geometry.max_sectors(),
            });
        }
        let new_index = self.geometry.index_sectors_for(new_sectors)
            - self.geometry.index_sectors_for(old_sectors);
        let needed = new_sectors - old_sectors + new_index;
        let free = free_map.num_clear();
        if needed > free {
            self.report_failure(new_size, new_sectors, free_map);
            return Err(ExtentError::DiskFull { needed, free });
        }

        self.grow_into(free_map, device, old_sectors, new_sectors);
        self.size = new_size;
        self.modified = now;
        debug!("extended to {self:?}");
        Ok(())
    }

    /// Draw sectors `from..to` of the file. Capacity and free space are
    /// already checked.
    fn grow_into(&mut self, free_map: &mut Bitmap, device: &dyn SectorDevice, from: usize, to: usize) {
        let direct = self.geometry.direct();
        for slot in &mut self.direct[from.min(direct)..to.min(direct)] {
            *slot = Some(take(free_map));
        }
        if to <= direct {
            return;
        }

        let (indirect, mut block) = match self.indirect {
            Some(sector) => (sector, IndirectBlock::fetch_from(self.geometry, device, sector)),
            None => (take(free_map), IndirectBlock::empty(self.geometry)),
        };
        for i in from.max(direct) - direct..to - direct {
            block.set(i, take(free_map));
        }
        block.write_back(self.geometry, device, indirect);
        self.indirect = Some(indirect);
    }

    fn report_failure(&self, new_size: usize, new_sectors: usize, free_map: &Bitmap) {
        warn!(
            "cannot extend from {} to {new_size} bytes: {new_sectors} sectors, {}+{} pointers, {} free",
            self.size,
            self.geometry.direct(),
            self.geometry.indirect(),
            free_map.num_clear()
        );
        warn!("{free_map}");
    }

    /// Sector holding byte `offset` of the file, or `None` past the
    /// allocated sectors.
    ///
    /// Reads the indirect sector for offsets beyond the direct range; use
    /// [`sector_map`](Self::sector_map) for bulk lookups.
    #[must_use]
    pub fn byte_to_sector(&self, offset: usize, device: &dyn SectorDevice) -> Option<SectorId> {
        let index = offset / self.geometry.sector_size();
        if index >= self.sector_count() {
            return None;
        }
        if index < self.geometry.direct() {
            return self.direct[index];
        }
        let block = IndirectBlock::fetch_from(self.geometry, device, self.indirect?);
        block.get(index - self.geometry.direct())
    }

    /// Every data sector of the file, in file order.
    #[must_use]
    pub fn sector_map(&self, device: &dyn SectorDevice) -> Vec<SectorId> {
        let sectors = self.sector_count();
        let mut map: Vec<SectorId> = self.direct.iter().take(sectors).map_while(|s| *s).collect();
        if let Some(indirect) = self.indirect {
            let block = IndirectBlock::fetch_from(self.geometry, device, indirect);
            map.extend(block.allocated().take(sectors - map.len()));
        }
        map
    }

    /// Load the header stored in `sector`.
    ///
    /// # Errors
    /// [`ExtentError::CorruptSize`] if the stored size is negative or larger
    /// than the geometry can index.
    pub fn fetch_from(
        geometry: Geometry,
        device: &dyn SectorDevice,
        sector: SectorId,
    ) -> Result<Self, ExtentError> {
        let mut buf = vec![0u8; geometry.sector_size()];
        device.read_sector(sector, &mut buf);
        Self::decode(geometry, &buf)
    }

    /// Store the header in `sector`.
    pub fn write_back(&self, device: &dyn SectorDevice, sector: SectorId) {
        device.write_sector(sector, &self.encode());
    }

    /// Serialize into one sector's worth of bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.geometry.sector_size()];
        let size = i32::try_from(self.size).unwrap_or(i32::MAX);
        put_i32(&mut buf, SIZE_OFFSET, size);
        put_i32(&mut buf, MODIFIED_OFFSET, self.modified);
        for (i, sector) in self.direct.iter().enumerate() {
            put_sector(&mut buf, DIRECT_OFFSET + i * WORD_BYTES, *sector);
        }
        put_sector(&mut buf, self.indirect_offset(), self.indirect);
        buf
    }

    /// Inverse of [`encode`](Self::encode).
    ///
    /// # Errors
    /// [`ExtentError::CorruptSize`] if the stored size is negative or larger
    /// than the geometry can index.
    ///
    /// # Panics
    /// If `bytes` is shorter than a header.
    pub fn decode(geometry: Geometry, bytes: &[u8]) -> Result<Self, ExtentError> {
        assert!(
            bytes.len() >= HEADER_FIXED_BYTES + geometry.direct() * WORD_BYTES,
            "short header buffer"
        );
        let raw_size = get_i32(bytes, SIZE_OFFSET);
        let size = usize::try_from(raw_size)
            .ok()
            .filter(|&size| size <= geometry.max_file_size())
            .ok_or(ExtentError::CorruptSize(raw_size))?;
        let mut header = Self::empty(geometry);
        header.size = size;
        header.modified = get_i32(bytes, MODIFIED_OFFSET);
        for (i, slot) in header.direct.iter_mut().enumerate() {
            *slot = get_sector(bytes, DIRECT_OFFSET + i * WORD_BYTES);
        }
        header.indirect = get_sector(bytes, header.indirect_offset());
        Ok(header)
    }

    #[inline]
    const fn indirect_offset(&self) -> usize {
        DIRECT_OFFSET + self.geometry.direct() * WORD_BYTES
    }

    #[inline]
    #[must_use]
    pub const fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Logical size in bytes.
    #[inline]
    #[must_use]
    pub const fn file_length(&self) -> usize {
        self.size
    }

    /// Size in bytes, optionally rounded up to whole sectors.
    #[inline]
    #[must_use]
    pub const fn num_bytes(&self, including_fragment: bool) -> usize {
        if including_fragment {
            self.sector_count() * self.geometry.sector_size()
        } else {
            self.size
        }
    }

    /// Number of data sectors in use.
    #[inline]
    #[must_use]
    pub const fn sector_count(&self) -> usize {
        self.geometry.sectors_for(self.size)
    }

    /// Last modification time, [`UNTRACKED`](Self::UNTRACKED) for internal files.
    #[inline]
    #[must_use]
    pub const fn modified_time(&self) -> i32 {
        self.modified
    }

    #[inline]
    pub const fn touch(&mut self, now: i32) {
        self.modified = now;
    }

    #[inline]
    #[must_use]
    pub const fn is_timestamped(&self) -> bool {
        self.modified != Self::UNTRACKED
    }

    #[inline]
    #[must_use]
    pub const fn indirect_sector(&self) -> Option<SectorId> {
        self.indirect
    }

    /// All `D` direct pointers, unused ones `None`.
    #[inline]
    #[must_use]
    pub fn direct_sectors(&self) -> &[Option<SectorId>] {
        &self.direct
    }

    /// Diagnostic dump of the header and the file contents.
    #[must_use]
    pub fn dump<'a>(&'a self, device: &'a dyn SectorDevice) -> HeaderDump<'a> {
        HeaderDump { header: self, device }
    }
}

fn take(free_map: &mut Bitmap) -> SectorId {
    let sector = free_map
        .find()
        .expect("free sector vanished after the capacity check");
    SectorId::from_index(sector)
}

fn release(free_map: &mut Bitmap, sector: SectorId) {
    assert!(
        free_map.test(sector.as_usize()),
        "sector {sector} released but not marked in use"
    );
    free_map.clear(sector.as_usize());
}

impl fmt::Debug for ExtentHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direct: Vec<u32> = self
            .direct
            .iter()
            .map_while(|s| s.map(SectorId::as_u32))
            .collect();
        f.debug_struct("ExtentHeader")
            .field("size", &self.size)
            .field("modified", &self.modified)
            .field("direct", &direct)
            .field("indirect", &self.indirect)
            .finish()
    }
}

/// Header summary without touching the device.
impl fmt::Display for ExtentHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File size: {}. File blocks:", self.size)?;
        for sector in self.direct.iter().take(self.sector_count()).flatten() {
            write!(f, " {sector}")?;
        }
        if let Some(indirect) = self.indirect {
            write!(f, " (indirect at {indirect})")?;
        }
        if self.is_timestamped() {
            write!(f, ". Last modified: {}", self.modified)?;
        }
        Ok(())
    }
}

/// Full header dump including indirect entries and file contents.
///
/// Printable ASCII is shown as is, every other byte as `\xx`.
pub struct HeaderDump<'a> {
    header: &'a ExtentHeader,
    device: &'a dyn SectorDevice,
}

impl fmt::Display for HeaderDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = self.header;
        let map = header.sector_map(self.device);
        writeln!(f, "FileHeader contents.")?;
        writeln!(f, "File size: {}.", header.size)?;
        write!(f, "File blocks:")?;
        for (i, sector) in map.iter().enumerate() {
            if i == header.geometry.direct() {
                write!(f, " (level2)")?;
            }
            write!(f, " {sector}")?;
        }
        writeln!(f)?;
        if header.is_timestamped() {
            writeln!(f, "Last modified time: {}", header.modified)?;
        }
        writeln!(f, "File contents:")?;

        let mut data = vec![0u8; header.geometry.sector_size()];
        let mut remaining = header.size;
        for sector in map {
            self.device.read_sector(sector, &mut data);
            for &byte in data.iter().take(remaining) {
                if byte.is_ascii_graphic() || byte == b' ' {
                    write!(f, "{}", char::from(byte))?;
                } else {
                    write!(f, "\\{byte:x}")?;
                }
            }
            remaining = remaining.saturating_sub(data.len());
            writeln!(f)?;
        }
        Ok(())
    }
}
