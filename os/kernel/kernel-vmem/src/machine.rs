use crate::addresses::{PhysicalAddress, PhysicalFrame, VirtualAddress};
use crate::error::Exception;
use crate::page_table::PageTable;
use crate::registers::Registers;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};
use kernel_alloc::TokenPool;
use kernel_info::memory::{PAGE_SIZE, VmConfig};
use kernel_sync::SpinLock;
use log::trace;

/// Paging counters of a [`Machine`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PagingStats {
    pub page_faults: usize,
    pub page_ins: usize,
    pub page_write_outs: usize,
}

/// The translation context the processor currently runs in.
struct ActiveSpace {
    space_id: usize,
    table: Arc<SpinLock<PageTable>>,
    num_pages: usize,
}

/// The simulated processor: main memory, the user register file, the
/// active translation and the two global resource pools every address
/// space draws from.
///
/// Shared between address spaces through an `Arc`.
pub struct Machine {
    config: VmConfig,
    memory: SpinLock<Vec<u8>>,
    registers: SpinLock<Registers>,
    active: SpinLock<Option<ActiveSpace>>,
    frames: TokenPool,
    space_ids: TokenPool,
    page_faults: AtomicUsize,
    page_ins: AtomicUsize,
    page_write_outs: AtomicUsize,
}

impl Machine {
    /// # Panics
    /// If `config` allows no resident frame per process.
    #[must_use]
    pub fn new(config: VmConfig) -> Self {
        assert!(config.frames_per_process > 0, "frame budget must be positive");
        Self {
            config,
            memory: SpinLock::new(vec![0; config.physical_frames * PAGE_SIZE]),
            registers: SpinLock::new(Registers::new()),
            active: SpinLock::new(None),
            frames: TokenPool::new("frames", config.physical_frames),
            space_ids: TokenPool::new("space ids", config.max_processes),
            page_faults: AtomicUsize::new(0),
            page_ins: AtomicUsize::new(0),
            page_write_outs: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Global pool of physical frames.
    #[must_use]
    pub const fn frames(&self) -> &TokenPool {
        &self.frames
    }

    /// Global pool of address-space ids.
    #[must_use]
    pub const fn space_ids(&self) -> &TokenPool {
        &self.space_ids
    }

    /// Copy a whole frame out of main memory.
    ///
    /// # Panics
    /// If `buf` is not one page long or `frame` is out of range.
    pub fn read_frame(&self, frame: PhysicalFrame, buf: &mut [u8]) {
        assert_eq!(buf.len(), PAGE_SIZE, "partial frame transfer");
        let start = frame.base().as_usize();
        buf.copy_from_slice(&self.memory.lock()[start..start + PAGE_SIZE]);
    }

    /// Overwrite a whole frame.
    ///
    /// # Panics
    /// If `buf` is not one page long or `frame` is out of range.
    pub fn write_frame(&self, frame: PhysicalFrame, buf: &[u8]) {
        assert_eq!(buf.len(), PAGE_SIZE, "partial frame transfer");
        let start = frame.base().as_usize();
        self.memory.lock()[start..start + PAGE_SIZE].copy_from_slice(buf);
    }

    /// Copy `data` into main memory at `addr`.
    ///
    /// # Panics
    /// If the range leaves main memory.
    pub fn write_physical(&self, addr: PhysicalAddress, data: &[u8]) {
        let start = addr.as_usize();
        self.memory.lock()[start..start + data.len()].copy_from_slice(data);
    }

    /// # Panics
    /// If `addr` is outside main memory.
    #[must_use]
    pub fn read_physical(&self, addr: PhysicalAddress) -> u8 {
        self.memory.lock()[addr.as_usize()]
    }

    #[must_use]
    pub fn read_register(&self, reg: usize) -> i32 {
        self.registers.lock().read(reg)
    }

    pub fn write_register(&self, reg: usize, value: i32) {
        self.registers.lock().write(reg, value);
    }

    /// Snapshot of the register file.
    #[must_use]
    pub fn registers(&self) -> Registers {
        self.registers.lock().clone()
    }

    /// Make `table` the translation for user accesses.
    pub fn install(&self, space_id: usize, table: Arc<SpinLock<PageTable>>, num_pages: usize) {
        trace!("installing address space {space_id} ({num_pages} pages)");
        *self.active.lock() = Some(ActiveSpace {
            space_id,
            table,
            num_pages,
        });
    }

    /// Drop the active translation if it belongs to `space_id`.
    pub fn uninstall(&self, space_id: usize) {
        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|a| a.space_id == space_id) {
            *active = None;
        }
    }

    /// Id of the installed address space.
    #[must_use]
    pub fn active_space(&self) -> Option<usize> {
        self.active.lock().as_ref().map(|a| a.space_id)
    }

    /// Page count of the installed address space.
    #[must_use]
    pub fn active_num_pages(&self) -> Option<usize> {
        self.active.lock().as_ref().map(|a| a.num_pages)
    }

    /// Translate through the installed page table.
    ///
    /// # Errors
    /// [`Exception::NoTranslation`] if nothing is installed, otherwise as
    /// for [`PageTable::translate`].
    pub fn translate(
        &self,
        addr: VirtualAddress,
        writing: bool,
    ) -> Result<PhysicalAddress, Exception> {
        let active = self.active.lock();
        let active = active.as_ref().ok_or(Exception::NoTranslation)?;
        if addr.page().index() >= active.num_pages {
            return Err(Exception::AddressError(addr));
        }
        active.table.lock().translate(addr, writing)
    }

    /// Load one byte through the installed translation.
    ///
    /// # Errors
    /// As for [`translate`](Self::translate).
    pub fn read_virtual(&self, addr: VirtualAddress) -> Result<u8, Exception> {
        let phys = self.translate(addr, false)?;
        Ok(self.read_physical(phys))
    }

    /// Store one byte through the installed translation.
    ///
    /// # Errors
    /// As for [`translate`](Self::translate).
    pub fn write_virtual(&self, addr: VirtualAddress, value: u8) -> Result<(), Exception> {
        let phys = self.translate(addr, true)?;
        self.write_physical(phys, &[value]);
        Ok(())
    }

    #[must_use]
    pub fn stats(&self) -> PagingStats {
        PagingStats {
            page_faults: self.page_faults.load(Ordering::Relaxed),
            page_ins: self.page_ins.load(Ordering::Relaxed),
            page_write_outs: self.page_write_outs.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_page_fault(&self) {
        self.page_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_page_in(&self) {
        self.page_ins.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_page_write_out(&self) {
        self.page_write_outs.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new(VmConfig::default())
    }
}

impl core::fmt::Debug for Machine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Machine")
            .field("config", &self.config)
            .field("frames", &self.frames)
            .field("space_ids", &self.space_ids)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
