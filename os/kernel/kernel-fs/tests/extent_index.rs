use kernel_bitmap::Bitmap;
use kernel_disk::{RamDisk, SectorDevice, SectorId};
use kernel_fs::{ExtentError, ExtentHeader, Geometry};

const S: usize = 64;

fn geometry(direct: usize, indirect: usize) -> Geometry {
    Geometry::with_limits(S, direct, indirect).unwrap()
}

/// A bitmap over `len` sectors in which only `free` are clear.
fn map_with_free(len: usize, free: &[usize]) -> Bitmap {
    let mut map = Bitmap::new(len);
    for bit in 0..len {
        if !free.contains(&bit) {
            map.mark(bit);
        }
    }
    map
}

fn raw_indirect_entries(disk: &RamDisk, sector: SectorId, count: usize) -> Vec<i32> {
    let mut buf = vec![0u8; S];
    disk.read_sector(sector, &mut buf);
    buf.chunks_exact(4)
        .take(count)
        .map(|c| i32::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

#[test]
fn ten_free_sectors_fit_nine_data_sectors_but_not_ten() {
    let disk = RamDisk::new(S, 64);
    let free: Vec<usize> = (30..40).collect();
    let g = geometry(8, 4);

    let mut map = map_with_free(64, &free);
    let header = ExtentHeader::allocate(g, &mut map, &disk, 9 * S).unwrap();
    assert_eq!(map.num_clear(), 0);
    assert_eq!(header.sector_count(), 9);
    assert!(header.indirect_sector().is_some());

    let mut map = map_with_free(64, &free);
    let err = ExtentHeader::allocate(g, &mut map, &disk, 10 * S).unwrap_err();
    assert_eq!(err, ExtentError::DiskFull { needed: 11, free: 10 });
    assert_eq!(map.num_clear(), 10, "failed allocation must not take sectors");
}

#[test]
fn allocation_beyond_index_capacity_is_rejected() {
    let disk = RamDisk::new(S, 64);
    let mut map = Bitmap::new(64);
    let err = ExtentHeader::allocate(geometry(8, 4), &mut map, &disk, 12 * S + 1).unwrap_err();
    assert_eq!(err, ExtentError::FileTooLarge { requested: 13, capacity: 12 });
    assert_eq!(map.num_clear(), 64);

    // Exactly D + D2 sectors is the largest file.
    ExtentHeader::allocate(geometry(8, 4), &mut map, &disk, 12 * S).unwrap();
}

#[test]
fn small_files_have_no_indirect_block() {
    let disk = RamDisk::new(S, 64);
    let g = geometry(8, 4);
    for size in [0, 1, S, 7 * S + 3, 8 * S] {
        let mut map = Bitmap::new(64);
        let header = ExtentHeader::allocate(g, &mut map, &disk, size).unwrap();
        assert_eq!(header.indirect_sector(), None, "size {size}");
        assert_eq!(map.num_set(), g.sectors_for(size));
    }
}

#[test]
fn indirect_entries_are_the_sectors_drawn_from_the_bitmap() {
    let disk = RamDisk::new(S, 64);
    let g = geometry(3, 4);
    let mut map = map_with_free(64, &[4, 5, 6, 9, 11, 12, 13, 50]);
    let before = map.clone();

    let header = ExtentHeader::allocate(g, &mut map, &disk, 6 * S).unwrap();

    let drawn: Vec<usize> = map
        .iter_set()
        .filter(|bit| !before.test(*bit))
        .collect();
    assert_eq!(drawn, vec![4, 5, 6, 9, 11, 12, 13]);

    assert_eq!(
        header.direct_sectors(),
        &[Some(SectorId::new(4)), Some(SectorId::new(5)), Some(SectorId::new(6))]
    );
    let indirect = header.indirect_sector().unwrap();
    assert_eq!(indirect, SectorId::new(9));
    assert_eq!(raw_indirect_entries(&disk, indirect, 4), vec![11, 12, 13, -1]);
}

#[test]
fn deallocate_returns_data_and_indirect_sectors() {
    let disk = RamDisk::new(S, 64);
    let g = geometry(3, 4);
    let mut map = map_with_free(64, &[1, 2, 3, 10, 20, 21]);
    let header = ExtentHeader::allocate(g, &mut map, &disk, 5 * S).unwrap();
    assert_eq!(header.indirect_sector(), Some(SectorId::new(10)));
    assert_eq!(raw_indirect_entries(&disk, SectorId::new(10), 2), vec![20, 21]);

    let before = map.num_clear();
    header.deallocate(&mut map, &disk);
    assert_eq!(map.num_clear(), before + 6);
    for bit in [1, 2, 3, 10, 20, 21] {
        assert!(!map.test(bit));
    }
}

#[test]
#[should_panic(expected = "not marked in use")]
fn deallocating_twice_is_fatal() {
    let disk = RamDisk::new(S, 16);
    let mut map = Bitmap::new(16);
    let header = ExtentHeader::allocate(geometry(3, 4), &mut map, &disk, 2 * S).unwrap();
    header.clone().deallocate(&mut map, &disk);
    header.deallocate(&mut map, &disk);
}

#[test]
fn shrinking_fails_and_leaves_header_unchanged() {
    let disk = RamDisk::new(S, 64);
    let g = geometry(3, 4);
    for size in [1, S, 3 * S, 5 * S + 7] {
        let mut map = Bitmap::new(64);
        let mut header = ExtentHeader::allocate(g, &mut map, &disk, size).unwrap();
        let snapshot = header.clone();
        let free = map.num_clear();

        for smaller in [0, size - 1] {
            let err = header.extend(smaller, &mut map, &disk, 9).unwrap_err();
            assert_eq!(
                err,
                ExtentError::Shrink {
                    current: size,
                    requested: smaller
                }
            );
            assert_eq!(header, snapshot);
            assert_eq!(map.num_clear(), free);
        }
    }
}

#[test]
fn extend_within_last_sector_only_updates_size() {
    let disk = RamDisk::new(S, 16);
    let mut map = Bitmap::new(16);
    let mut header = ExtentHeader::allocate(geometry(3, 4), &mut map, &disk, 10).unwrap();
    let free = map.num_clear();

    header.extend(10, &mut map, &disk, 5).unwrap();
    assert_eq!(header.modified_time(), 0, "equal size is a no-op");

    header.extend(S, &mut map, &disk, 5).unwrap();
    assert_eq!(header.file_length(), S);
    assert_eq!(header.modified_time(), 5);
    assert_eq!(map.num_clear(), free);
}

#[test]
fn extend_appends_indirect_entries_at_the_right_offset() {
    let disk = RamDisk::new(S, 64);
    let g = geometry(3, 4);
    let mut map = Bitmap::new(64);
    let mut header = ExtentHeader::allocate(g, &mut map, &disk, 2 * S).unwrap();
    assert_eq!(header.sector_map(&disk), vec![SectorId::new(0), SectorId::new(1)]);

    // Crosses into indirect territory: one more direct sector, the index
    // sector, then the first entry.
    header.extend(4 * S, &mut map, &disk, 100).unwrap();
    assert_eq!(header.indirect_sector(), Some(SectorId::new(3)));
    assert_eq!(raw_indirect_entries(&disk, SectorId::new(3), 4), vec![4, -1, -1, -1]);

    // Re-reads the existing block and appends after entry 0.
    header.extend(6 * S, &mut map, &disk, 200).unwrap();
    assert_eq!(raw_indirect_entries(&disk, SectorId::new(3), 4), vec![4, 5, 6, -1]);
    assert_eq!(header.modified_time(), 200);
    assert_eq!(
        header.sector_map(&disk),
        [0, 1, 2, 4, 5, 6].map(SectorId::new).to_vec()
    );
}

#[test]
fn extend_is_all_or_nothing() {
    let disk = RamDisk::new(S, 64);
    let g = geometry(3, 4);
    // Room for the data sectors but not for the index sector as well.
    let mut map = map_with_free(64, &[1, 2, 3, 4]);
    let mut header = ExtentHeader::allocate(g, &mut map, &disk, S).unwrap();
    let snapshot = header.clone();

    let err = header.extend(4 * S, &mut map, &disk, 7).unwrap_err();
    assert_eq!(err, ExtentError::DiskFull { needed: 4, free: 3 });
    assert_eq!(header, snapshot);
    assert_eq!(map.num_clear(), 3);

    let err = header.extend(8 * S, &mut map, &disk, 7).unwrap_err();
    assert!(matches!(err, ExtentError::FileTooLarge { requested: 8, capacity: 7 }));
    assert_eq!(header, snapshot);

    header.extend(3 * S, &mut map, &disk, 7).unwrap();
    assert_eq!(map.num_clear(), 1);
}

#[test]
fn write_back_then_fetch_reproduces_header_and_block() {
    let disk = RamDisk::new(S, 64);
    let g = geometry(3, 4);
    let mut map = Bitmap::new(64);
    map.mark(0);
    let mut header = ExtentHeader::allocate(g, &mut map, &disk, 6 * S + 1).unwrap();
    header.touch(1_700_000_000);

    header.write_back(&disk, SectorId::new(0));
    let loaded = ExtentHeader::fetch_from(g, &disk, SectorId::new(0)).unwrap();
    assert_eq!(loaded, header);
    assert_eq!(loaded.sector_map(&disk), header.sector_map(&disk));
    assert_eq!(loaded.sector_map(&disk).len(), 7);
}

#[test]
fn byte_to_sector_agrees_with_a_direct_probe() {
    let disk = RamDisk::new(S, 64);
    let g = geometry(3, 4);
    let mut map = Bitmap::new(64);
    let size = 6 * S + 10;
    let header = ExtentHeader::allocate(g, &mut map, &disk, size).unwrap();

    // Stamp every data sector with its file index through the device.
    for (index, sector) in header.sector_map(&disk).into_iter().enumerate() {
        disk.write_sector(sector, &[u8::try_from(index).unwrap(); S]);
    }

    let mut buf = [0u8; S];
    for offset in (0..size).step_by(7) {
        let sector = header.byte_to_sector(offset, &disk).unwrap();
        disk.read_sector(sector, &mut buf);
        assert_eq!(usize::from(buf[offset % S]), offset / S, "offset {offset}");
    }
    assert_eq!(header.byte_to_sector(7 * S, &disk), None);
}
