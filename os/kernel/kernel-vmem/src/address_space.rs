//! # Demand-paged user address space
//!
//! Every process gets a linear [`PageTable`], a private swap file named
//! `SWAP<id>` sized to the whole address space, and a resident-frame budget
//! `F` from [`VmConfig`](kernel_info::memory::VmConfig).
//!
//! ## Admission
//!
//! Pages enter memory through one routine, [`AddressSpace::admit`]:
//!
//! ```text
//!   queue: [oldest ... newest]          F = frames_per_process
//!
//!   admit(p):
//!     len == F ?  pop oldest o ── dirty? ──► write frame to swap @ o*P
//!                 unmap o, reuse its frame
//!     else        take a fresh frame from the machine
//!     map p (valid, clean), read swap @ p*P into the frame, push p
//! ```
//!
//! Replacement is strict FIFO: the `referenced` bit is maintained but never
//! consulted. Swap sectors are zero-filled at creation, so a page read in
//! before it was ever written comes back as zeros.
//!
//! ## Loading
//!
//! Code and initialized data are copied from the executable straight into
//! the frames of the pages they cover, admitting each page first. Those
//! pages are left dirty, so an eviction before they are ever written still
//! preserves their contents in the swap file.

use crate::addresses::{PhysicalAddress, PhysicalFrame, VirtualAddress, VirtualPage};
use crate::entry::TranslationEntry;
use crate::error::{Exception, VmError};
use crate::machine::Machine;
use crate::noff::{Executable, NoffHeader, Segment};
use crate::page_table::PageTable;
use crate::registers::{INSTRUCTION_BYTES, NEXT_PC_REG, NUM_TOTAL_REGS, PC_REG, Registers, STACK_REG};
use alloc::collections::VecDeque;
use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use kernel_fs::{FileKind, FileSystem, FsError, OpenFile};
use kernel_info::memory::{PAGE_SIZE, STACK_MARGIN};
use kernel_sync::SpinLock;
use log::{debug, info, trace, warn};

/// Name of the swap file backing address space `space_id`.
#[must_use]
pub fn swap_file_name(space_id: usize) -> String {
    format!("SWAP{space_id}")
}

pub struct AddressSpace {
    machine: Arc<Machine>,
    fs: FileSystem,
    space_id: usize,
    num_pages: usize,
    frame_budget: usize,
    table: Arc<SpinLock<PageTable>>,
    swap_name: String,
    swap: OpenFile,
    resident: VecDeque<VirtualPage>,
}

impl AddressSpace {
    /// Load `executable` into a fresh address space.
    ///
    /// # Errors
    /// - [`VmError::NoSpaceId`] when every address-space id is taken.
    /// - [`VmError::Noff`] for an unreadable executable header.
    /// - [`VmError::SwapFile`] if the swap file cannot be created.
    /// - [`VmError::OutOfFrames`], [`VmError::SegmentOutOfRange`] or
    ///   [`VmError::TruncatedSegment`] while loading segments.
    ///
    /// Everything acquired so far is released on error.
    pub fn new(
        machine: Arc<Machine>,
        fs: FileSystem,
        executable: &(impl Executable + ?Sized),
    ) -> Result<Self, VmError> {
        let space_id = machine.space_ids().acquire().ok_or(VmError::NoSpaceId)?;
        let (header, num_pages, swap_name, swap) =
            match Self::prepare_swap(&machine, &fs, executable, space_id) {
                Ok(parts) => parts,
                Err(e) => {
                    machine.space_ids().release(space_id);
                    return Err(e);
                }
            };

        let mut space = Self {
            frame_budget: machine.config().frames_per_process,
            machine,
            fs,
            space_id,
            num_pages,
            table: Arc::new(SpinLock::new(PageTable::new(num_pages))),
            swap_name,
            swap,
            resident: VecDeque::new(),
        };

        // From here on `Drop` undoes partial work.
        space.load_segment("code", header.code, executable)?;
        space.load_segment("data", header.init_data, executable)?;

        info!(
            "address space {}: {} pages, code {} bytes, data {} bytes, bss {} bytes",
            space.space_id,
            space.num_pages,
            header.code.size,
            header.init_data.size,
            header.uninit_data.size
        );
        Ok(space)
    }

    fn prepare_swap(
        machine: &Machine,
        fs: &FileSystem,
        executable: &(impl Executable + ?Sized),
        space_id: usize,
    ) -> Result<(NoffHeader, usize, String, OpenFile), VmError> {
        let header = NoffHeader::read_from(executable)?;
        let size = header.image_size() + machine.config().user_stack_size;
        let num_pages = size.div_ceil(PAGE_SIZE);

        let swap_name = swap_file_name(space_id);
        match fs.remove(&swap_name) {
            Ok(()) => debug!("replaced stale swap file {swap_name}"),
            Err(FsError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        fs.create(&swap_name, num_pages * PAGE_SIZE, FileKind::Internal)?;
        let swap = fs.open(&swap_name)?;
        Ok((header, num_pages, swap_name, swap))
    }

    fn load_segment(
        &mut self,
        name: &'static str,
        segment: Segment,
        executable: &(impl Executable + ?Sized),
    ) -> Result<(), VmError> {
        if segment.is_empty() {
            return Ok(());
        }
        let limit = self.num_pages * PAGE_SIZE;
        if segment.end() > limit {
            return Err(VmError::SegmentOutOfRange {
                segment: name,
                end: segment.end(),
                limit,
            });
        }

        let mut bytes = vec![0u8; segment.size as usize];
        let read = executable.read_at(&mut bytes, segment.in_file_addr as usize);
        if read < bytes.len() {
            return Err(VmError::TruncatedSegment {
                segment: name,
                expected: bytes.len(),
                read,
            });
        }

        let start = segment.virtual_addr as usize;
        for index in segment.pages() {
            let page = VirtualPage::from_index(index);
            if !self.is_resident(page) {
                self.admit(page)?;
            }
            let page_start = page.base().as_usize().max(start);
            let page_end = (page.base().as_usize() + PAGE_SIZE).min(segment.end());
            let chunk = &bytes[page_start - start..page_end - start];

            let mut table = self.table.lock();
            let entry = table
                .get_mut(page)
                .expect("segment page checked against the address space size");
            let frame = entry.frame().expect("page admitted above");
            self.machine
                .write_physical(frame.base() + page_start % PAGE_SIZE, chunk);
            entry.mark_dirty();
            trace!("{name}: {} bytes to virtual page {page} (frame {frame})", chunk.len());
        }
        Ok(())
    }

    /// Bring `page` into memory, evicting the oldest resident page once the
    /// frame budget is used up.
    ///
    /// # Errors
    /// [`VmError::OutOfFrames`] if a fresh frame is needed and the machine
    /// has none, [`VmError::SwapFile`] if the evicted page cannot be written
    /// out. The residency queue is unchanged on error.
    ///
    /// # Panics
    /// If `page` is outside the address space.
    pub fn admit(&mut self, page: VirtualPage) -> Result<(), VmError> {
        assert!(
            page.index() < self.num_pages,
            "page {page} outside the {}-page address space",
            self.num_pages
        );

        let frame = if self.resident.len() >= self.frame_budget {
            self.evict_oldest()?
        } else {
            let Some(frame) = self.machine.frames().acquire() else {
                warn!(
                    "address space {}: no frame for page {page} ({} resident)",
                    self.space_id,
                    self.resident.len()
                );
                return Err(VmError::OutOfFrames);
            };
            PhysicalFrame::from_index(frame)
        };

        self.table
            .lock()
            .get_mut(page)
            .expect("page checked against the address space size")
            .map(frame);

        let mut buf = vec![0u8; PAGE_SIZE];
        self.swap.read_at(&mut buf, page.swap_offset());
        self.machine.write_frame(frame, &buf);
        self.machine.record_page_in();
        self.resident.push_back(page);
        debug!(
            "address space {}: page {page} in at frame {frame}",
            self.space_id
        );
        Ok(())
    }

    /// Pop the oldest resident page, write it out if dirty and hand back
    /// its frame.
    fn evict_oldest(&mut self) -> Result<PhysicalFrame, VmError> {
        let old = self
            .resident
            .pop_front()
            .expect("frame budget is positive");
        let entry = *self
            .table
            .lock()
            .get(old)
            .expect("resident page inside the address space");
        let frame = entry.frame().expect("resident page is mapped");

        if entry.is_dirty() {
            let mut buf = vec![0u8; PAGE_SIZE];
            self.machine.read_frame(frame, &mut buf);
            if let Err(e) = self.swap.write_at(&buf, old.swap_offset()) {
                self.resident.push_front(old);
                return Err(e.into());
            }
            self.machine.record_page_write_out();
            debug!("address space {}: page {old} written out", self.space_id);
        } else {
            trace!("address space {}: page {old} clean, dropped", self.space_id);
        }

        if let Some(entry) = self.table.lock().get_mut(old) {
            entry.unmap();
        }
        Ok(frame)
    }

    /// Handle a page fault at `addr`.
    ///
    /// # Errors
    /// [`VmError::AddressOutOfRange`] past the last page, otherwise as for
    /// [`admit`](Self::admit).
    pub fn handle_page_fault(&mut self, addr: VirtualAddress) -> Result<(), VmError> {
        let page = addr.page();
        if page.index() >= self.num_pages {
            return Err(VmError::AddressOutOfRange {
                addr,
                num_pages: self.num_pages,
            });
        }
        self.machine.record_page_fault();
        if self.is_resident(page) {
            return Ok(());
        }
        self.admit(page)
    }

    /// Translate `addr`, taking one page fault if the page is not resident.
    fn translate(&mut self, addr: VirtualAddress, writing: bool) -> Result<PhysicalAddress, VmError> {
        let first = self.table.lock().translate(addr, writing);
        match first {
            Err(Exception::PageFault(_)) => {
                self.handle_page_fault(addr)?;
                Ok(self.table.lock().translate(addr, writing)?)
            }
            Err(Exception::AddressError(_)) => Err(VmError::AddressOutOfRange {
                addr,
                num_pages: self.num_pages,
            }),
            other => Ok(other?),
        }
    }

    /// Load one user byte, faulting the page in if needed.
    ///
    /// # Errors
    /// As for [`handle_page_fault`](Self::handle_page_fault).
    pub fn read_byte(&mut self, addr: VirtualAddress) -> Result<u8, VmError> {
        let phys = self.translate(addr, false)?;
        Ok(self.machine.read_physical(phys))
    }

    /// Store one user byte, faulting the page in if needed.
    ///
    /// # Errors
    /// As for [`handle_page_fault`](Self::handle_page_fault), plus
    /// [`Exception::ReadOnly`] for a read-only page.
    pub fn write_byte(&mut self, addr: VirtualAddress, value: u8) -> Result<(), VmError> {
        let phys = self.translate(addr, true)?;
        self.machine.write_physical(phys, &[value]);
        Ok(())
    }

    /// Fill `buf` from consecutive user bytes starting at `addr`.
    ///
    /// # Errors
    /// As for [`read_byte`](Self::read_byte).
    pub fn read_bytes(&mut self, addr: VirtualAddress, buf: &mut [u8]) -> Result<(), VmError> {
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.read_byte(addr + i)?;
        }
        Ok(())
    }

    /// Store `data` at consecutive user bytes starting at `addr`.
    ///
    /// # Errors
    /// As for [`write_byte`](Self::write_byte).
    pub fn write_bytes(&mut self, addr: VirtualAddress, data: &[u8]) -> Result<(), VmError> {
        for (i, byte) in data.iter().enumerate() {
            self.write_byte(addr + i, *byte)?;
        }
        Ok(())
    }

    /// Register values a new process starts with: everything zero, `PC` at
    /// 0, `NextPC` one instruction later, stack pointer just below the end
    /// of the address space.
    #[must_use]
    pub fn initial_registers(&self) -> Registers {
        let mut regs = Registers::new();
        regs.write(PC_REG, 0);
        regs.write(NEXT_PC_REG, INSTRUCTION_BYTES);
        let top = self.num_pages * PAGE_SIZE - STACK_MARGIN;
        regs.write(STACK_REG, i32::try_from(top).unwrap_or(i32::MAX));
        regs
    }

    /// Write [`initial_registers`](Self::initial_registers) into the machine.
    pub fn init_registers(&self) {
        let regs = self.initial_registers();
        for reg in 0..NUM_TOTAL_REGS {
            self.machine.write_register(reg, regs.read(reg));
        }
        debug!(
            "address space {}: stack pointer at {}",
            self.space_id,
            regs.stack_pointer()
        );
    }

    /// Nothing to save: all per-space state already lives in this object.
    pub const fn save_state(&self) {}

    /// Install this space's page table as the machine's translation.
    pub fn restore_state(&self) {
        self.machine
            .install(self.space_id, Arc::clone(&self.table), self.num_pages);
    }

    #[must_use]
    pub const fn space_id(&self) -> usize {
        self.space_id
    }

    #[must_use]
    pub const fn num_pages(&self) -> usize {
        self.num_pages
    }

    #[must_use]
    pub fn swap_name(&self) -> &str {
        &self.swap_name
    }

    #[must_use]
    pub fn is_resident(&self, page: VirtualPage) -> bool {
        self.table.lock().get(page).is_some_and(TranslationEntry::is_valid)
    }

    /// Resident pages, oldest first.
    #[must_use]
    pub fn resident_pages(&self) -> Vec<VirtualPage> {
        self.resident.iter().copied().collect()
    }

    /// Copy of the translation entry for `page`.
    #[must_use]
    pub fn entry(&self, page: VirtualPage) -> Option<TranslationEntry> {
        self.table.lock().get(page).copied()
    }

    /// Log the resident part of the page table.
    pub fn print(&self) {
        info!(
            "address space {} ({} pages, swap {}):\n{}",
            self.space_id,
            self.num_pages,
            self.swap_name,
            *self.table.lock()
        );
    }
}

impl Drop for AddressSpace {
    fn drop(&mut self) {
        let frames: Vec<PhysicalFrame> = self
            .table
            .lock()
            .iter_mut()
            .filter_map(TranslationEntry::unmap)
            .collect();
        for frame in &frames {
            self.machine.frames().release(frame.index());
        }
        self.resident.clear();
        self.machine.uninstall(self.space_id);
        self.machine.space_ids().release(self.space_id);

        if let Err(e) = self.fs.remove(&self.swap_name) {
            warn!("address space {}: cannot remove {}: {e}", self.space_id, self.swap_name);
        }
        debug!(
            "address space {} torn down, {} frames released",
            self.space_id,
            frames.len()
        );
    }
}

impl core::fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AddressSpace")
            .field("space_id", &self.space_id)
            .field("num_pages", &self.num_pages)
            .field("swap_name", &self.swap_name)
            .field("resident", &self.resident)
            .finish_non_exhaustive()
    }
}
