//! # Memory Layout

use crate::disk::SECTOR_SIZE;

/// Bytes per virtual page and per physical frame.
///
/// Kept equal to the sector size so a page transfer to the swap file is a
/// single sector transfer.
pub const PAGE_SIZE: usize = SECTOR_SIZE;

/// Number of physical frames in main memory.
pub const NUM_PHYS_PAGES: usize = 32;

/// Size of the address-space id pool, i.e. the maximum number of live processes.
pub const MAX_PROCESSES: usize = 256;

/// Resident frame budget per process; FIFO replacement starts past this.
pub const FRAMES_PER_PROCESS: usize = 5;

/// Stack bytes appended to every address space.
pub const USER_STACK_SIZE: usize = 1024;

/// Distance kept between the initial stack pointer and the end of the
/// address space so the first push never leaves the mapped region.
pub const STACK_MARGIN: usize = 16;

const _: () = {
    assert!(PAGE_SIZE.is_power_of_two());
    assert!(FRAMES_PER_PROCESS <= NUM_PHYS_PAGES);
    assert!(STACK_MARGIN < USER_STACK_SIZE);
};

/// Runtime paging limits.
///
/// [`Default`] mirrors the compile-time constants above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    /// Number of physical frames in main memory.
    pub physical_frames: usize,
    /// Resident frame budget per process (`F`).
    pub frames_per_process: usize,
    /// Size of the address-space id pool.
    pub max_processes: usize,
    /// Stack bytes appended to every address space.
    pub user_stack_size: usize,
}

impl VmConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            physical_frames: NUM_PHYS_PAGES,
            frames_per_process: FRAMES_PER_PROCESS,
            max_processes: MAX_PROCESSES,
            user_stack_size: USER_STACK_SIZE,
        }
    }

    /// Override the per-process resident frame budget.
    #[must_use]
    pub const fn with_frames_per_process(mut self, frames: usize) -> Self {
        self.frames_per_process = frames;
        self
    }

    /// Override the number of physical frames.
    #[must_use]
    pub const fn with_physical_frames(mut self, frames: usize) -> Self {
        self.physical_frames = frames;
        self
    }

    /// Override the size of the address-space id pool.
    #[must_use]
    pub const fn with_max_processes(mut self, processes: usize) -> Self {
        self.max_processes = processes;
        self
    }

    /// Override the stack size appended to every address space.
    #[must_use]
    pub const fn with_user_stack_size(mut self, bytes: usize) -> Self {
        self.user_stack_size = bytes;
        self
    }
}

impl Default for VmConfig {
    fn default() -> Self {
        Self::new()
    }
}
