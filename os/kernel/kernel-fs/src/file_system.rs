use crate::clock::Clock;
use crate::directory::Directory;
use crate::error::{ExtentError, FsError};
use crate::extent::ExtentHeader;
use crate::geometry::Geometry;
use crate::io;
use crate::open_file::OpenFile;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use kernel_bitmap::Bitmap;
use kernel_disk::{SectorDevice, SectorId};
use kernel_info::disk::{DIRECTORY_SECTOR, FREE_MAP_SECTOR, NUM_DIR_ENTRIES};
use kernel_sync::SpinLock;
use log::{debug, info, warn};

const FREE_MAP: SectorId = SectorId::new(FREE_MAP_SECTOR);
const DIRECTORY: SectorId = SectorId::new(DIRECTORY_SECTOR);

/// Whether a file records modification times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// User-visible file, stamped on creation and every write.
    Regular,
    /// Bookkeeping file such as a swap file; its time stays untracked.
    Internal,
}

/// The free-sector bitmap and the header of the file it is persisted in.
struct FreeMap {
    bitmap: Bitmap,
    header: ExtentHeader,
}

impl FreeMap {
    fn persist(&self, device: &dyn SectorDevice) {
        io::write_at(&self.header, device, &self.bitmap.to_bytes(), 0);
    }
}

struct DirectoryFile {
    table: Directory,
    header: ExtentHeader,
}

impl DirectoryFile {
    fn persist(&self, device: &dyn SectorDevice) {
        io::write_at(&self.header, device, &self.table.encode(), 0);
    }
}

struct Shared {
    device: Arc<dyn SectorDevice>,
    geometry: Geometry,
    clock: Arc<dyn Clock>,
    directory: SpinLock<DirectoryFile>,
    free_map: SpinLock<FreeMap>,
}

/// A flat file system: one directory, files indexed by [`ExtentHeader`]s.
///
/// Sector 0 holds the header of the free-map file, sector 1 the header of
/// the directory file. Cloning is cheap and every clone refers to the same
/// disk state.
///
/// Locks are taken directory first, then free map.
#[derive(Clone)]
pub struct FileSystem {
    shared: Arc<Shared>,
}

impl FileSystem {
    /// Lay out an empty file system on `device`.
    ///
    /// # Errors
    /// If `geometry` does not match the device or the device is too small
    /// for the free map and directory.
    pub fn format(
        device: Arc<dyn SectorDevice>,
        geometry: Geometry,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, FsError> {
        check_device(&*device, geometry)?;

        let mut bitmap = Bitmap::new(device.num_sectors());
        bitmap.mark(FREE_MAP.as_usize());
        bitmap.mark(DIRECTORY.as_usize());

        let map_len = bitmap.byte_len();
        let map_header = ExtentHeader::allocate(geometry, &mut bitmap, &*device, map_len)?;
        let dir_header = ExtentHeader::allocate(
            geometry,
            &mut bitmap,
            &*device,
            Directory::byte_len(NUM_DIR_ENTRIES),
        )?;
        map_header.write_back(&*device, FREE_MAP);
        dir_header.write_back(&*device, DIRECTORY);

        let free_map = FreeMap {
            bitmap,
            header: map_header,
        };
        let directory = DirectoryFile {
            table: Directory::new(NUM_DIR_ENTRIES),
            header: dir_header,
        };
        free_map.persist(&*device);
        directory.persist(&*device);

        info!(
            "formatted {} sectors of {} bytes, {} free",
            device.num_sectors(),
            geometry.sector_size(),
            free_map.bitmap.num_clear()
        );
        Ok(Self::from_parts(device, geometry, clock, free_map, directory))
    }

    /// Open the file system previously formatted on `device`.
    ///
    /// # Errors
    /// If `geometry` does not match the device or a bookkeeping header is
    /// unreadable.
    pub fn mount(
        device: Arc<dyn SectorDevice>,
        geometry: Geometry,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, FsError> {
        check_device(&*device, geometry)?;

        let map_header = fetch_header(geometry, &*device, FREE_MAP)?;
        let dir_header = fetch_header(geometry, &*device, DIRECTORY)?;

        let mut bytes = alloc::vec![0u8; map_header.file_length()];
        io::read_at(&map_header, &*device, &mut bytes, 0);
        let bitmap = Bitmap::from_bytes(device.num_sectors(), &bytes);

        let mut bytes = alloc::vec![0u8; dir_header.file_length()];
        io::read_at(&dir_header, &*device, &mut bytes, 0);
        let table = Directory::decode(NUM_DIR_ENTRIES, &bytes);

        info!("mounted, {} sectors free", bitmap.num_clear());
        Ok(Self::from_parts(
            device,
            geometry,
            clock,
            FreeMap {
                bitmap,
                header: map_header,
            },
            DirectoryFile {
                table,
                header: dir_header,
            },
        ))
    }

    fn from_parts(
        device: Arc<dyn SectorDevice>,
        geometry: Geometry,
        clock: Arc<dyn Clock>,
        free_map: FreeMap,
        directory: DirectoryFile,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                device,
                geometry,
                clock,
                directory: SpinLock::new(directory),
                free_map: SpinLock::new(free_map),
            }),
        }
    }

    /// Create a zero-filled file of `size` bytes.
    ///
    /// # Errors
    /// On a bad or duplicate name, a full directory, or if the header and
    /// data sectors cannot be allocated. Nothing is changed on error.
    pub fn create(&self, name: &str, size: usize, kind: FileKind) -> Result<(), FsError> {
        Directory::validate_name(name)?;
        let device = &*self.shared.device;

        let mut directory = self.shared.directory.lock();
        let mut free_map = self.shared.free_map.lock();

        let Some(index) = free_map.bitmap.find() else {
            warn!("cannot create {name}: no sector left for its header");
            return Err(ExtentError::DiskFull { needed: 1, free: 0 }.into());
        };
        let header_sector = SectorId::from_index(index);
        if let Err(e) = directory.table.add(name, header_sector) {
            free_map.bitmap.clear(index);
            return Err(e);
        }
        let mut header =
            match ExtentHeader::allocate(self.shared.geometry, &mut free_map.bitmap, device, size) {
                Ok(header) => header,
                Err(e) => {
                    directory.table.remove(name);
                    free_map.bitmap.clear(index);
                    return Err(e.into());
                }
            };
        if kind == FileKind::Regular {
            header.touch(self.shared.clock.now());
        }

        io::zero_sectors(&header, device, 0..header.sector_count());
        header.write_back(device, header_sector);
        free_map.persist(device);
        directory.persist(device);
        debug!("created {name} ({size} bytes, header in sector {header_sector})");
        Ok(())
    }

    /// Delete `name` and release all its sectors.
    ///
    /// # Errors
    /// If no such file exists or its header is unreadable.
    pub fn remove(&self, name: &str) -> Result<(), FsError> {
        let device = &*self.shared.device;
        let mut directory = self.shared.directory.lock();
        let sector = directory
            .table
            .find(name)
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        let header = fetch_header(self.shared.geometry, device, sector)?;

        let mut free_map = self.shared.free_map.lock();
        header.deallocate(&mut free_map.bitmap, device);
        assert!(
            free_map.bitmap.test(sector.as_usize()),
            "header sector {sector} of {name} not marked in use"
        );
        free_map.bitmap.clear(sector.as_usize());
        directory.table.remove(name);

        free_map.persist(device);
        directory.persist(device);
        debug!("removed {name}");
        Ok(())
    }

    /// Open `name` for reading and writing.
    ///
    /// # Errors
    /// If no such file exists or its header is unreadable.
    pub fn open(&self, name: &str) -> Result<OpenFile, FsError> {
        let sector = self
            .shared
            .directory
            .lock()
            .table
            .find(name)
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        let header = fetch_header(self.shared.geometry, &*self.shared.device, sector)?;
        Ok(OpenFile::new(self.clone(), sector, header))
    }

    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.shared.directory.lock().table.find(name).is_some()
    }

    /// Names of all files, in directory order.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.shared
            .directory
            .lock()
            .table
            .iter()
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Number of unallocated sectors.
    #[must_use]
    pub fn free_sectors(&self) -> usize {
        self.shared.free_map.lock().bitmap.num_clear()
    }

    #[must_use]
    pub fn geometry(&self) -> Geometry {
        self.shared.geometry
    }

    #[must_use]
    pub fn device(&self) -> &Arc<dyn SectorDevice> {
        &self.shared.device
    }

    /// Log the free map, the directory and every file header.
    pub fn print(&self) {
        let device = &*self.shared.device;
        let directory = self.shared.directory.lock();
        {
            let free_map = self.shared.free_map.lock();
            info!("free map: {}", free_map.bitmap);
        }
        for (name, sector) in directory.table.iter() {
            match ExtentHeader::fetch_from(self.shared.geometry, device, sector) {
                Ok(header) => info!("{name} (header {sector}): {header}"),
                Err(e) => warn!("{name} (header {sector}): {e}"),
            }
        }
    }

    /// Grow the file whose header lives in `sector` to `new_size` bytes.
    ///
    /// The header is re-read under the free-map lock so that growth through
    /// one handle is not lost by a stale copy in another. New sectors are
    /// zeroed; the header and free map are persisted before returning.
    pub(crate) fn grow(
        &self,
        sector: SectorId,
        header: &mut ExtentHeader,
        new_size: usize,
    ) -> Result<(), FsError> {
        let device = &*self.shared.device;
        let mut free_map = self.shared.free_map.lock();
        let mut current = fetch_header(self.shared.geometry, device, sector)?;
        if new_size <= current.file_length() {
            *header = current;
            return Ok(());
        }

        let old_sectors = current.sector_count();
        let now = if current.is_timestamped() {
            self.shared.clock.now()
        } else {
            ExtentHeader::UNTRACKED
        };
        current.extend(new_size, &mut free_map.bitmap, device, now)?;
        io::zero_sectors(&current, device, old_sectors..current.sector_count());
        current.write_back(device, sector);
        free_map.persist(device);
        *header = current;
        Ok(())
    }

    /// Stamp the file whose header lives in `sector` with the current time.
    ///
    /// Like [`grow`](Self::grow), this works on a fresh copy of the header
    /// taken under the free-map lock, and refreshes `header` from it.
    pub(crate) fn stamp(&self, sector: SectorId, header: &mut ExtentHeader) -> Result<(), FsError> {
        let device = &*self.shared.device;
        let _free_map = self.shared.free_map.lock();
        let mut current = fetch_header(self.shared.geometry, device, sector)?;
        if current.is_timestamped() {
            current.touch(self.shared.clock.now());
            current.write_back(device, sector);
        }
        *header = current;
        Ok(())
    }
}

impl core::fmt::Debug for FileSystem {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FileSystem")
            .field("geometry", &self.shared.geometry)
            .field("free_sectors", &self.free_sectors())
            .finish_non_exhaustive()
    }
}

fn check_device(device: &dyn SectorDevice, geometry: Geometry) -> Result<(), FsError> {
    if device.sector_size() != geometry.sector_size() {
        return Err(FsError::DeviceMismatch {
            device: device.sector_size(),
            geometry: geometry.sector_size(),
        });
    }
    if device.num_sectors() <= DIRECTORY.as_usize() {
        return Err(FsError::DeviceTooSmall(device.num_sectors()));
    }
    Ok(())
}

fn fetch_header(
    geometry: Geometry,
    device: &dyn SectorDevice,
    sector: SectorId,
) -> Result<ExtentHeader, FsError> {
    ExtentHeader::fetch_from(geometry, device, sector)
        .map_err(|source| FsError::BadHeader { sector, source })
}
