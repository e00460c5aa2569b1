//! # Resource token pools
//!
//! Bounded pools of interchangeable tokens, claimed and released across
//! independent lifetimes. The kernel keeps two of them:
//!
//! ```text
//!  physical frames            address-space ids
//! ┌─┬─┬─┬─┬─┬─┬─┬─┬──┐       ┌─┬─┬─┬─┬──────┐
//! │1│1│0│1│0│0│0│0│..│       │1│0│0│0│ .... │
//! └─┴─┴─┴─┴─┴─┴─┴─┴──┘       └─┴─┴─┴─┴──────┘
//!  0 1 2 3 ...                0 1 2 3 ...  MAX_PROCESSES-1
//! ```
//!
//! Each pool wraps a [`Bitmap`](kernel_bitmap::Bitmap) behind a
//! [`SpinLock`](kernel_sync::SpinLock); callers only ever see
//! [`TokenPool::acquire`] and [`TokenPool::release`], so a find-and-mark is
//! always atomic.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod pool;

pub use pool::TokenPool;
