use alloc::string::String;
use kernel_disk::SectorId;

/// Failures of the extent index itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ExtentError {
    #[error("file needs {requested} sectors but a header indexes at most {capacity}")]
    FileTooLarge { requested: usize, capacity: usize },
    #[error("need {needed} free sectors, only {free} available")]
    DiskFull { needed: usize, free: usize },
    #[error("cannot shrink a file from {current} to {requested} bytes")]
    Shrink { current: usize, requested: usize },
    #[error("header records an impossible size ({0})")]
    CorruptSize(i32),
}

/// Rejected sector geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    #[error("sector size {0} cannot hold a file header")]
    SectorTooSmall(usize),
    #[error("sector size {0} is not a multiple of the 4-byte pointer width")]
    Unaligned(usize),
    #[error("{direct} direct pointers do not fit a header (at most {max})")]
    TooManyDirect { direct: usize, max: usize },
    #[error("{indirect} indirect pointers do not fit a sector (at most {max})")]
    TooManyIndirect { indirect: usize, max: usize },
    #[error("a header needs at least one direct pointer")]
    NoDirect,
    #[error("largest file ({0} bytes) exceeds the on-disk size field")]
    FileSizeOverflow(usize),
}

/// Failures of the file layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FsError {
    #[error(transparent)]
    Extent(#[from] ExtentError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("device sectors are {device} bytes but the geometry expects {geometry}")]
    DeviceMismatch { device: usize, geometry: usize },
    #[error("device has {0} sectors, too few for the free map and directory")]
    DeviceTooSmall(usize),
    #[error("file name `{name}` is longer than {max} bytes")]
    NameTooLong { name: String, max: usize },
    #[error("file name is empty")]
    EmptyName,
    #[error("file `{0}` already exists")]
    AlreadyExists(String),
    #[error("file `{0}` not found")]
    NotFound(String),
    #[error("directory is full")]
    DirectoryFull,
    #[error("file header in sector {sector} is unreadable: {source}")]
    BadHeader {
        sector: SectorId,
        source: ExtentError,
    },
}
