//! # Virtual and Physical Addresses
//!
//! 32-bit newtypes so that user virtual addresses, virtual page numbers,
//! physical frame numbers and physical (main-memory) addresses cannot be
//! mixed up. Page and frame size is [`PAGE_SIZE`].

use core::fmt;
use core::ops::Add;
use kernel_info::memory::PAGE_SIZE;

#[allow(clippy::cast_possible_truncation)]
const PAGE_BYTES: u32 = PAGE_SIZE as u32;

#[inline]
fn to_u32(value: usize, what: &str) -> u32 {
    u32::try_from(value).unwrap_or_else(|_| panic!("{what} {value} exceeds 32 bits"))
}

/// A byte address in a user address space.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualAddress(u32);

/// A virtual page number.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualPage(u32);

/// A physical frame number, i.e. a token of the machine's frame pool.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalFrame(u32);

/// A byte address in main memory.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u32);

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub const fn new(addr: u32) -> Self {
        Self(addr)
    }

    /// # Panics
    /// If `addr` does not fit 32 bits.
    #[inline]
    #[must_use]
    pub fn from_usize(addr: usize) -> Self {
        Self(to_u32(addr, "virtual address"))
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Page containing this address.
    #[inline]
    #[must_use]
    pub const fn page(self) -> VirtualPage {
        VirtualPage(self.0 / PAGE_BYTES)
    }

    /// Offset within the page.
    #[inline]
    #[must_use]
    pub const fn offset(self) -> usize {
        self.as_usize() % PAGE_SIZE
    }
}

impl VirtualPage {
    #[inline]
    #[must_use]
    pub const fn new(page: u32) -> Self {
        Self(page)
    }

    /// # Panics
    /// If `page` does not fit 32 bits.
    #[inline]
    #[must_use]
    pub fn from_index(page: usize) -> Self {
        Self(to_u32(page, "virtual page"))
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// First byte of the page.
    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        VirtualAddress(self.0 * PAGE_BYTES)
    }

    /// Byte offset of this page's copy in the swap file.
    #[inline]
    #[must_use]
    pub const fn swap_offset(self) -> usize {
        self.index() * PAGE_SIZE
    }
}

impl PhysicalFrame {
    #[inline]
    #[must_use]
    pub const fn new(frame: u32) -> Self {
        Self(frame)
    }

    /// # Panics
    /// If `frame` does not fit 32 bits.
    #[inline]
    #[must_use]
    pub fn from_index(frame: usize) -> Self {
        Self(to_u32(frame, "physical frame"))
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// First byte of the frame.
    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress(self.0 * PAGE_BYTES)
    }
}

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn new(addr: u32) -> Self {
        Self(addr)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[inline]
    #[must_use]
    pub const fn frame(self) -> PhysicalFrame {
        PhysicalFrame(self.0 / PAGE_BYTES)
    }
}

impl Add<usize> for VirtualAddress {
    type Output = Self;

    fn add(self, rhs: usize) -> Self::Output {
        Self::from_usize(self.as_usize() + rhs)
    }
}

impl Add<usize> for PhysicalAddress {
    type Output = Self;

    fn add(self, rhs: usize) -> Self::Output {
        Self(to_u32(self.as_usize() + rhs, "physical address"))
    }
}

impl From<u32> for VirtualAddress {
    fn from(addr: u32) -> Self {
        Self::new(addr)
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x} (Virtual page {})", self.0, self.page().0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x} (Physical frame {})", self.0, self.frame().0)
    }
}

impl fmt::Display for VirtualPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for VirtualPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualPage({})", self.0)
    }
}

impl fmt::Display for PhysicalFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for PhysicalFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalFrame({})", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn page_and_offset_split() {
        let addr = VirtualAddress::from_usize(3 * PAGE_SIZE + 17);
        assert_eq!(addr.page(), VirtualPage::new(3));
        assert_eq!(addr.offset(), 17);
        assert_eq!(addr.page().base() + 17, addr);
    }

    #[test]
    fn frame_base_round_trips() {
        let frame = PhysicalFrame::new(5);
        assert_eq!(frame.base().as_usize(), 5 * PAGE_SIZE);
        assert_eq!((frame.base() + 9).frame(), frame);
    }
}
