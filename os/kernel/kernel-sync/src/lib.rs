//! # Kernel synchronization primitives
//!
//! The simulated kernel runs its threads cooperatively on one processor, but a
//! thread may yield in the middle of a disk transfer. Every resource shared
//! between address spaces or open files (the disk free map, the frame pool,
//! the address-space id pool, the directory, page tables) is therefore kept
//! behind a [`SpinLock`], and a find/clear burst that must be atomic holds the
//! guard for its whole duration.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod spin_lock;

pub use spin_lock::{SpinLock, SpinLockGuard};
