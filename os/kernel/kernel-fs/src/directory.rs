use crate::codec::{get_i32, get_sector, put_i32, put_sector};
use crate::error::FsError;
use crate::geometry::WORD_BYTES;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use kernel_disk::SectorId;
use kernel_info::disk::FILE_NAME_MAX_LEN;

/// `in_use`, header sector, then the NUL-terminated name.
const ENTRY_BYTES: usize = 2 * WORD_BYTES + FILE_NAME_MAX_LEN + 1;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    name: String,
    sector: SectorId,
}

/// Flat, fixed-capacity table mapping file names to header sectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Directory {
    entries: Vec<Option<Entry>>,
}

impl Directory {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: vec![None; capacity],
        }
    }

    /// Size of the directory file for `capacity` entries.
    pub(crate) const fn byte_len(capacity: usize) -> usize {
        capacity * ENTRY_BYTES
    }

    pub(crate) fn validate_name(name: &str) -> Result<(), FsError> {
        if name.is_empty() {
            return Err(FsError::EmptyName);
        }
        if name.len() > FILE_NAME_MAX_LEN || name.contains('\0') {
            return Err(FsError::NameTooLong {
                name: name.to_string(),
                max: FILE_NAME_MAX_LEN,
            });
        }
        Ok(())
    }

    pub(crate) fn find(&self, name: &str) -> Option<SectorId> {
        self.entries
            .iter()
            .flatten()
            .find(|e| e.name == name)
            .map(|e| e.sector)
    }

    pub(crate) fn add(&mut self, name: &str, sector: SectorId) -> Result<(), FsError> {
        if self.find(name).is_some() {
            return Err(FsError::AlreadyExists(name.to_string()));
        }
        let slot = self
            .entries
            .iter_mut()
            .find(|e| e.is_none())
            .ok_or(FsError::DirectoryFull)?;
        *slot = Some(Entry {
            name: name.to_string(),
            sector,
        });
        Ok(())
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<SectorId> {
        let slot = self
            .entries
            .iter_mut()
            .find(|e| e.as_ref().is_some_and(|e| e.name == name))?;
        slot.take().map(|e| e.sector)
    }

    /// `(name, header sector)` of every file, in table order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, SectorId)> + '_ {
        self.entries
            .iter()
            .flatten()
            .map(|e| (e.name.as_str(), e.sector))
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::byte_len(self.entries.len())];
        for (record, entry) in buf.chunks_exact_mut(ENTRY_BYTES).zip(&self.entries) {
            match entry {
                Some(entry) => {
                    put_i32(record, 0, 1);
                    put_sector(record, WORD_BYTES, Some(entry.sector));
                    let name = entry.name.as_bytes();
                    record[2 * WORD_BYTES..2 * WORD_BYTES + name.len()].copy_from_slice(name);
                }
                None => {
                    put_i32(record, 0, 0);
                    put_sector(record, WORD_BYTES, None);
                }
            }
        }
        buf
    }

    pub(crate) fn decode(capacity: usize, bytes: &[u8]) -> Self {
        let mut dir = Self::new(capacity);
        for (slot, record) in dir.entries.iter_mut().zip(bytes.chunks_exact(ENTRY_BYTES)) {
            if get_i32(record, 0) == 0 {
                continue;
            }
            let Some(sector) = get_sector(record, WORD_BYTES) else {
                continue;
            };
            let raw = &record[2 * WORD_BYTES..];
            let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
            *slot = Some(Entry {
                name: String::from_utf8_lossy(&raw[..end]).into_owned(),
                sector,
            });
        }
        dir
    }
}
