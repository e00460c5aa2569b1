use crate::error::{ExtentError, FsError};
use crate::extent::ExtentHeader;
use crate::file_system::FileSystem;
use crate::io;
use kernel_disk::SectorId;

/// Handle to one file, with a cached copy of its header and a seek
/// position for sequential access.
///
/// Reads are clamped to the file length. Writes past the end grow the file
/// first.
#[derive(Debug)]
pub struct OpenFile {
    fs: FileSystem,
    sector: SectorId,
    header: ExtentHeader,
    position: usize,
}

impl OpenFile {
    pub(crate) const fn new(fs: FileSystem, sector: SectorId, header: ExtentHeader) -> Self {
        Self {
            fs,
            sector,
            header,
            position: 0,
        }
    }

    /// Read into `buf` from byte `offset`; returns the number of bytes read.
    pub fn read_at(&self, buf: &mut [u8], offset: usize) -> usize {
        io::read_at(&self.header, &**self.fs.device(), buf, offset)
    }

    /// Write `buf` at byte `offset`, growing the file if it ends past the
    /// current length.
    ///
    /// # Errors
    /// If the file cannot grow; nothing is written then.
    pub fn write_at(&mut self, buf: &[u8], offset: usize) -> Result<usize, FsError> {
        if buf.is_empty() {
            return Ok(0);
        }
        let end = offset
            .checked_add(buf.len())
            .ok_or(ExtentError::FileTooLarge {
                requested: usize::MAX,
                capacity: self.header.geometry().max_sectors(),
            })?;
        if end > self.header.file_length() {
            self.fs.grow(self.sector, &mut self.header, end)?;
        }

        let written = io::write_at(&self.header, &**self.fs.device(), buf, offset);
        if self.header.is_timestamped() {
            self.fs.stamp(self.sector, &mut self.header)?;
        }
        Ok(written)
    }

    /// Read from the current position and advance it.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = self.read_at(buf, self.position);
        self.position += n;
        n
    }

    /// Write at the current position and advance it.
    ///
    /// # Errors
    /// As for [`write_at`](Self::write_at).
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, FsError> {
        let n = self.write_at(buf, self.position)?;
        self.position += n;
        Ok(n)
    }

    pub const fn seek(&mut self, position: usize) {
        self.position = position;
    }

    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub const fn length(&self) -> usize {
        self.header.file_length()
    }

    #[must_use]
    pub const fn header(&self) -> &ExtentHeader {
        &self.header
    }

    /// Sector holding this file's header.
    #[must_use]
    pub const fn header_sector(&self) -> SectorId {
        self.sector
    }

    /// Header and contents, formatted for diagnostics.
    #[must_use]
    pub fn dump(&self) -> alloc::string::String {
        alloc::format!("{}", self.header.dump(&**self.fs.device()))
    }
}
