//! # NOFF executable header
//!
//! Ten little-endian 32-bit words at the start of the executable:
//!
//! ```text
//! +-------+----------------------+----------------------+----------------------+
//! | magic | code                 | initialized data     | uninitialized data   |
//! |       | vaddr  infile  size  | vaddr  infile  size  | vaddr  infile  size  |
//! +-------+----------------------+----------------------+----------------------+
//! ```
//!
//! An image written with the opposite byte order is recognized by its
//! byte-swapped magic and converted word by word.

use crate::error::NoffError;
use alloc::vec;
use alloc::vec::Vec;
use core::ops::RangeInclusive;
use kernel_fs::OpenFile;
use kernel_info::memory::PAGE_SIZE;

pub const NOFF_MAGIC: u32 = 0x00ba_dfad;

const WORDS: usize = 10;
pub const HEADER_BYTES: usize = WORDS * 4;

/// Random-access source of executable bytes.
pub trait Executable {
    /// Copy up to `buf.len()` bytes from `offset`; returns the count copied.
    fn read_at(&self, buf: &mut [u8], offset: usize) -> usize;
}

impl Executable for [u8] {
    fn read_at(&self, buf: &mut [u8], offset: usize) -> usize {
        let Some(tail) = self.get(offset..) else {
            return 0;
        };
        let n = buf.len().min(tail.len());
        buf[..n].copy_from_slice(&tail[..n]);
        n
    }
}

impl Executable for Vec<u8> {
    fn read_at(&self, buf: &mut [u8], offset: usize) -> usize {
        self.as_slice().read_at(buf, offset)
    }
}

impl Executable for OpenFile {
    fn read_at(&self, buf: &mut [u8], offset: usize) -> usize {
        Self::read_at(self, buf, offset)
    }
}

/// One program segment.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub virtual_addr: u32,
    pub in_file_addr: u32,
    pub size: u32,
}

impl Segment {
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// One past the last virtual byte.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> usize {
        self.virtual_addr as usize + self.size as usize
    }

    /// Every virtual page the segment touches.
    ///
    /// # Panics
    /// If the segment is empty.
    #[must_use]
    pub fn pages(&self) -> RangeInclusive<usize> {
        assert!(!self.is_empty(), "empty segment touches no page");
        self.virtual_addr as usize / PAGE_SIZE..=(self.end() - 1) / PAGE_SIZE
    }

    const fn swap_bytes(self) -> Self {
        Self {
            virtual_addr: self.virtual_addr.swap_bytes(),
            in_file_addr: self.in_file_addr.swap_bytes(),
            size: self.size.swap_bytes(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NoffHeader {
    pub code: Segment,
    pub init_data: Segment,
    pub uninit_data: Segment,
}

impl NoffHeader {
    /// Parse the first [`HEADER_BYTES`] of `bytes`.
    ///
    /// # Errors
    /// If `bytes` is too short or the magic matches in neither byte order.
    pub fn parse(bytes: &[u8]) -> Result<Self, NoffError> {
        if bytes.len() < HEADER_BYTES {
            return Err(NoffError::Truncated(bytes.len()));
        }
        let mut words = [0u32; WORDS];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }

        let segment = |i: usize| Segment {
            virtual_addr: words[i],
            in_file_addr: words[i + 1],
            size: words[i + 2],
        };
        let header = Self {
            code: segment(1),
            init_data: segment(4),
            uninit_data: segment(7),
        };

        match words[0] {
            NOFF_MAGIC => Ok(header),
            magic if magic.swap_bytes() == NOFF_MAGIC => Ok(header.swap_bytes()),
            magic => Err(NoffError::BadMagic(magic)),
        }
    }

    /// Read and parse the header of `executable`.
    ///
    /// # Errors
    /// As for [`parse`](Self::parse).
    pub fn read_from(executable: &(impl Executable + ?Sized)) -> Result<Self, NoffError> {
        let mut buf = [0u8; HEADER_BYTES];
        let n = executable.read_at(&mut buf, 0);
        Self::parse(&buf[..n])
    }

    const fn swap_bytes(self) -> Self {
        Self {
            code: self.code.swap_bytes(),
            init_data: self.init_data.swap_bytes(),
            uninit_data: self.uninit_data.swap_bytes(),
        }
    }

    /// Code, data and bss bytes together.
    #[must_use]
    pub const fn image_size(&self) -> usize {
        self.code.size as usize + self.init_data.size as usize + self.uninit_data.size as usize
    }

    /// Serialize in little-endian order.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_BYTES] {
        let words = [
            NOFF_MAGIC,
            self.code.virtual_addr,
            self.code.in_file_addr,
            self.code.size,
            self.init_data.virtual_addr,
            self.init_data.in_file_addr,
            self.init_data.size,
            self.uninit_data.virtual_addr,
            self.uninit_data.in_file_addr,
            self.uninit_data.size,
        ];
        let mut out = [0u8; HEADER_BYTES];
        for (chunk, word) in out.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        out
    }
}

/// Build an executable image: header, then `code` loaded at virtual
/// address 0, then `data` right after it, then `bss_size` zero bytes of
/// uninitialized data.
///
/// # Panics
/// If the segments do not fit 32-bit sizes.
#[must_use]
pub fn build_image(code: &[u8], data: &[u8], bss_size: usize) -> Vec<u8> {
    let word = |n: usize| u32::try_from(n).expect("segment exceeds 32 bits");
    let header = NoffHeader {
        code: Segment {
            virtual_addr: 0,
            in_file_addr: word(HEADER_BYTES),
            size: word(code.len()),
        },
        init_data: Segment {
            virtual_addr: word(code.len()),
            in_file_addr: word(HEADER_BYTES + code.len()),
            size: word(data.len()),
        },
        uninit_data: Segment {
            virtual_addr: word(code.len() + data.len()),
            in_file_addr: 0,
            size: word(bss_size),
        },
    };
    let mut image = vec![0u8; HEADER_BYTES];
    image.copy_from_slice(&header.encode());
    image.extend_from_slice(code);
    image.extend_from_slice(data);
    image
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_little_endian_header() {
        let image = build_image(&[1; 300], &[2; 10], 50);
        let header = NoffHeader::parse(&image).unwrap();
        assert_eq!(header.code.size, 300);
        assert_eq!(header.init_data.virtual_addr, 300);
        assert_eq!(header.init_data.in_file_addr, 340);
        assert_eq!(header.uninit_data.size, 50);
        assert_eq!(header.image_size(), 360);
    }

    #[test]
    fn byte_swapped_header_is_converted() {
        let image = build_image(&[1; 300], &[2; 10], 50);
        let mut swapped = image.clone();
        for chunk in swapped[..HEADER_BYTES].chunks_exact_mut(4) {
            chunk.reverse();
        }
        assert_eq!(NoffHeader::parse(&swapped), NoffHeader::parse(&image));
    }

    #[test]
    fn rejects_bad_magic_and_short_input() {
        let mut image = build_image(&[], &[], 0);
        image[0] = 0;
        assert_eq!(NoffHeader::parse(&image), Err(NoffError::BadMagic(0x00ba_df00)));
        assert_eq!(NoffHeader::parse(&image[..12]), Err(NoffError::Truncated(12)));
    }

    #[test]
    fn segment_pages_are_inclusive_and_exact() {
        let seg = Segment {
            virtual_addr: 0,
            in_file_addr: 0,
            size: u32::try_from(2 * PAGE_SIZE).unwrap(),
        };
        // Ends exactly on a page boundary: no extra page.
        assert_eq!(seg.pages(), 0..=1);

        let seg = Segment {
            virtual_addr: u32::try_from(PAGE_SIZE - 1).unwrap(),
            in_file_addr: 0,
            size: 2,
        };
        assert_eq!(seg.pages(), 0..=1);
    }

    #[test]
    fn slices_read_with_clamping() {
        let bytes = [1u8, 2, 3];
        let mut buf = [0u8; 4];
        assert_eq!(bytes[..].read_at(&mut buf, 1), 2);
        assert_eq!(&buf[..2], &[2, 3]);
        assert_eq!(bytes[..].read_at(&mut buf, 5), 0);
    }
}
