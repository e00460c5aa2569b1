use crate::addresses::{PhysicalFrame, VirtualPage};
use bitfield_struct::bitfield;

/// Access-state bits of a [`TranslationEntry`].
///
/// | Bit | Name         | Meaning |
/// |-----|--------------|---------|
/// | 0   | `valid`      | The page is resident in `frame` |
/// | 1   | `read_only`  | Writes raise [`Exception::ReadOnly`](crate::Exception::ReadOnly) |
/// | 2   | `referenced` | Set on every successful translation; not used for replacement |
/// | 3   | `dirty`      | The frame differs from the swap copy |
/// | 4–7 | reserved     | |
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct EntryFlags {
    pub valid: bool,
    pub read_only: bool,
    pub referenced: bool,
    pub dirty: bool,
    #[bits(4)]
    __: u8,
}

/// Mapping of one virtual page to its frame plus access state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationEntry {
    virtual_page: VirtualPage,
    frame: Option<PhysicalFrame>,
    flags: EntryFlags,
}

impl TranslationEntry {
    /// An entry for `page` that is not resident.
    #[must_use]
    pub const fn unmapped(page: VirtualPage) -> Self {
        Self {
            virtual_page: page,
            frame: None,
            flags: EntryFlags::new(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn virtual_page(&self) -> VirtualPage {
        self.virtual_page
    }

    /// Frame holding the page while it is valid.
    #[inline]
    #[must_use]
    pub const fn frame(&self) -> Option<PhysicalFrame> {
        if self.flags.valid() { self.frame } else { None }
    }

    #[inline]
    #[must_use]
    pub const fn flags(&self) -> EntryFlags {
        self.flags
    }

    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.flags.valid()
    }

    #[inline]
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.flags.dirty()
    }

    #[inline]
    #[must_use]
    pub const fn is_referenced(&self) -> bool {
        self.flags.referenced()
    }

    #[inline]
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.flags.read_only()
    }

    /// Make the page resident in `frame`: valid, clean, writable, unreferenced.
    pub fn map(&mut self, frame: PhysicalFrame) {
        self.frame = Some(frame);
        self.flags = EntryFlags::new().with_valid(true);
    }

    /// Drop the mapping and hand back the frame it used.
    pub fn unmap(&mut self) -> Option<PhysicalFrame> {
        let frame = self.frame();
        self.frame = None;
        self.flags = EntryFlags::new();
        frame
    }

    pub fn mark_dirty(&mut self) {
        self.flags.set_dirty(true);
    }

    pub fn mark_referenced(&mut self) {
        self.flags.set_referenced(true);
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.flags.set_read_only(read_only);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flag_bits_are_packed_low_first() {
        let flags = EntryFlags::new().with_valid(true).with_dirty(true);
        assert_eq!(flags.into_bits(), 0b1001);
    }

    #[test]
    fn map_resets_access_state() {
        let mut entry = TranslationEntry::unmapped(VirtualPage::new(4));
        assert_eq!(entry.frame(), None);

        entry.map(PhysicalFrame::new(2));
        entry.mark_dirty();
        entry.mark_referenced();
        assert!(entry.is_dirty() && entry.is_referenced());

        assert_eq!(entry.unmap(), Some(PhysicalFrame::new(2)));
        assert!(!entry.is_valid());
        entry.map(PhysicalFrame::new(3));
        assert!(!entry.is_dirty() && !entry.is_referenced() && !entry.is_read_only());
        assert_eq!(entry.frame(), Some(PhysicalFrame::new(3)));
    }
}
