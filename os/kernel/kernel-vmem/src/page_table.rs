use crate::addresses::{PhysicalAddress, VirtualAddress, VirtualPage};
use crate::entry::TranslationEntry;
use crate::error::Exception;
use alloc::vec::Vec;
use core::fmt;

/// Linear page table: one [`TranslationEntry`] per virtual page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTable {
    entries: Vec<TranslationEntry>,
}

impl PageTable {
    /// A table of `num_pages` unmapped entries.
    #[must_use]
    pub fn new(num_pages: usize) -> Self {
        Self {
            entries: (0..num_pages)
                .map(|page| TranslationEntry::unmapped(VirtualPage::from_index(page)))
                .collect(),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, page: VirtualPage) -> Option<&TranslationEntry> {
        self.entries.get(page.index())
    }

    pub fn get_mut(&mut self, page: VirtualPage) -> Option<&mut TranslationEntry> {
        self.entries.get_mut(page.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &TranslationEntry> + '_ {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TranslationEntry> + '_ {
        self.entries.iter_mut()
    }

    /// Translate `addr`, recording the access in the entry.
    ///
    /// # Errors
    /// [`Exception::AddressError`] past the last page, [`Exception::PageFault`]
    /// for a page that is not resident, [`Exception::ReadOnly`] for a write
    /// to a read-only page.
    pub fn translate(
        &mut self,
        addr: VirtualAddress,
        writing: bool,
    ) -> Result<PhysicalAddress, Exception> {
        let entry = self
            .entries
            .get_mut(addr.page().index())
            .ok_or(Exception::AddressError(addr))?;
        let frame = entry.frame().ok_or(Exception::PageFault(addr))?;
        if writing && entry.is_read_only() {
            return Err(Exception::ReadOnly(addr));
        }
        entry.mark_referenced();
        if writing {
            entry.mark_dirty();
        }
        Ok(frame.base() + addr.offset())
    }
}

/// One line per resident page.
impl fmt::Display for PageTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            let Some(frame) = entry.frame() else {
                continue;
            };
            write!(f, "virtual page {} -> frame {}", entry.virtual_page(), frame)?;
            if entry.is_dirty() {
                write!(f, " dirty")?;
            }
            if entry.is_referenced() {
                write!(f, " referenced")?;
            }
            if entry.is_read_only() {
                write!(f, " read-only")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::addresses::PhysicalFrame;
    use kernel_info::memory::PAGE_SIZE;

    #[test]
    fn translate_reports_each_exception() {
        let mut table = PageTable::new(2);
        let in_page_one = VirtualAddress::from_usize(PAGE_SIZE + 3);

        assert_eq!(
            table.translate(in_page_one, false),
            Err(Exception::PageFault(in_page_one))
        );
        let past_end = VirtualAddress::from_usize(2 * PAGE_SIZE);
        assert_eq!(
            table.translate(past_end, false),
            Err(Exception::AddressError(past_end))
        );

        table.get_mut(VirtualPage::new(1)).unwrap().map(PhysicalFrame::new(7));
        assert_eq!(
            table.translate(in_page_one, false),
            Ok(PhysicalAddress::new(u32::try_from(7 * PAGE_SIZE + 3).unwrap()))
        );
        let entry = table.get(VirtualPage::new(1)).unwrap();
        assert!(entry.is_referenced() && !entry.is_dirty());

        table.get_mut(VirtualPage::new(1)).unwrap().set_read_only(true);
        assert_eq!(
            table.translate(in_page_one, true),
            Err(Exception::ReadOnly(in_page_one))
        );
    }

    #[test]
    fn writes_mark_dirty() {
        let mut table = PageTable::new(1);
        table.get_mut(VirtualPage::new(0)).unwrap().map(PhysicalFrame::new(0));
        table.translate(VirtualAddress::new(5), true).unwrap();
        assert!(table.get(VirtualPage::new(0)).unwrap().is_dirty());
        assert_eq!(
            alloc::format!("{table}"),
            "virtual page 0 -> frame 0 dirty referenced\n"
        );
    }
}
