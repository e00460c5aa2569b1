use crate::addresses::VirtualAddress;
use kernel_fs::FsError;

/// Why an address could not be translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Exception {
    #[error("page fault at {0}")]
    PageFault(VirtualAddress),
    #[error("address {0} is past the end of the address space")]
    AddressError(VirtualAddress),
    #[error("write to read-only page at {0}")]
    ReadOnly(VirtualAddress),
    #[error("no address space is installed")]
    NoTranslation,
}

/// Rejected executable header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NoffError {
    #[error("executable header is {0} bytes, expected {expected}", expected = crate::noff::HEADER_BYTES)]
    Truncated(usize),
    #[error("bad executable magic {0:#010x}")]
    BadMagic(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VmError {
    #[error("no address-space id left")]
    NoSpaceId,
    #[error("no physical frame left")]
    OutOfFrames,
    #[error(transparent)]
    Noff(#[from] NoffError),
    #[error("swap file: {0}")]
    SwapFile(#[from] FsError),
    #[error("address {addr} is outside the {num_pages}-page address space")]
    AddressOutOfRange {
        addr: VirtualAddress,
        num_pages: usize,
    },
    #[error("{segment} segment ends at {end:#x}, past the address space end {limit:#x}")]
    SegmentOutOfRange {
        segment: &'static str,
        end: usize,
        limit: usize,
    },
    #[error("{segment} segment: read {read} of {expected} bytes from the executable")]
    TruncatedSegment {
        segment: &'static str,
        expected: usize,
        read: usize,
    },
    #[error(transparent)]
    Exception(#[from] Exception),
}
