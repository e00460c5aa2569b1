//! # User-mode register file
//!
//! 32 general registers followed by the special registers of the simulated
//! MIPS-style processor.

use core::fmt;

pub const NUM_GP_REGS: usize = 32;
/// User stack pointer.
pub const STACK_REG: usize = 29;
/// Return address of a procedure call.
pub const RET_ADDR_REG: usize = 31;
pub const HI_REG: usize = 32;
pub const LO_REG: usize = 33;
/// Current program counter.
pub const PC_REG: usize = 34;
/// Next program counter (branch delay slot).
pub const NEXT_PC_REG: usize = 35;
/// Previous program counter, for debugging.
pub const PREV_PC_REG: usize = 36;
pub const LOAD_REG: usize = 37;
pub const LOAD_VALUE_REG: usize = 38;
/// Faulting virtual address after an exception.
pub const BAD_VADDR_REG: usize = 39;
pub const NUM_TOTAL_REGS: usize = 40;

/// Width of one instruction; `NextPC` starts this far past `PC`.
pub const INSTRUCTION_BYTES: i32 = 4;

#[derive(Clone, PartialEq, Eq)]
pub struct Registers([i32; NUM_TOTAL_REGS]);

impl Registers {
    /// All registers zero.
    #[must_use]
    pub const fn new() -> Self {
        Self([0; NUM_TOTAL_REGS])
    }

    /// # Panics
    /// If `reg` is not below [`NUM_TOTAL_REGS`].
    #[inline]
    #[must_use]
    pub const fn read(&self, reg: usize) -> i32 {
        self.0[reg]
    }

    /// # Panics
    /// If `reg` is not below [`NUM_TOTAL_REGS`].
    #[inline]
    pub const fn write(&mut self, reg: usize, value: i32) {
        self.0[reg] = value;
    }

    #[inline]
    #[must_use]
    pub const fn pc(&self) -> i32 {
        self.0[PC_REG]
    }

    #[inline]
    #[must_use]
    pub const fn next_pc(&self) -> i32 {
        self.0[NEXT_PC_REG]
    }

    #[inline]
    #[must_use]
    pub const fn stack_pointer(&self) -> i32 {
        self.0[STACK_REG]
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registers")
            .field("pc", &self.pc())
            .field("next_pc", &self.next_pc())
            .field("sp", &self.stack_pointer())
            .finish_non_exhaustive()
    }
}
