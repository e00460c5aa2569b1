use kernel_disk::RamDisk;
use kernel_fs::{ExtentError, FileKind, FileSystem, FsError, Geometry, ManualClock};
use std::sync::Arc;

const S: usize = 64;

struct Fixture {
    disk: Arc<RamDisk>,
    clock: Arc<ManualClock>,
    fs: FileSystem,
}

fn fixture(num_sectors: usize) -> Fixture {
    let disk = Arc::new(RamDisk::new(S, num_sectors));
    let clock = Arc::new(ManualClock::new(1_000));
    let fs = FileSystem::format(
        disk.clone(),
        Geometry::with_limits(S, 8, 4).unwrap(),
        clock.clone(),
    )
    .unwrap();
    Fixture { disk, clock, fs }
}

#[test]
fn format_reserves_bookkeeping_sectors() {
    let f = fixture(64);
    // Headers at 0 and 1, one sector of free map, three of directory.
    assert_eq!(f.fs.free_sectors(), 64 - 2 - 1 - 3);
    assert!(f.fs.list().is_empty());
}

#[test]
fn geometry_must_match_device() {
    let disk = Arc::new(RamDisk::new(32, 64));
    let err = FileSystem::format(disk, Geometry::DEFAULT, Arc::new(ManualClock::default())).unwrap_err();
    assert_eq!(err, FsError::DeviceMismatch { device: 32, geometry: 128 });
}

#[test]
fn create_and_remove_restore_free_count() {
    let f = fixture(64);
    let free = f.fs.free_sectors();

    f.fs.create("big", 10 * S, FileKind::Regular).unwrap();
    // header + 10 data + indirect
    assert_eq!(f.fs.free_sectors(), free - 12);
    assert_eq!(f.fs.list(), vec!["big".to_string()]);

    f.fs.remove("big").unwrap();
    assert_eq!(f.fs.free_sectors(), free);
    assert!(!f.fs.exists("big"));
}

#[test]
fn create_rejects_duplicates_and_bad_names() {
    let f = fixture(64);
    f.fs.create("a", 1, FileKind::Regular).unwrap();
    let free = f.fs.free_sectors();

    assert_eq!(
        f.fs.create("a", 1, FileKind::Regular),
        Err(FsError::AlreadyExists("a".into()))
    );
    assert!(matches!(
        f.fs.create("much-too-long", 1, FileKind::Regular),
        Err(FsError::NameTooLong { .. })
    ));
    assert_eq!(f.fs.free_sectors(), free);
}

#[test]
fn failed_create_leaves_no_trace() {
    let f = fixture(64);
    let free = f.fs.free_sectors();
    let err = f.fs.create("huge", 13 * S, FileKind::Regular).unwrap_err();
    assert_eq!(
        err,
        FsError::Extent(ExtentError::FileTooLarge { requested: 13, capacity: 12 })
    );
    assert_eq!(f.fs.free_sectors(), free);
    assert!(!f.fs.exists("huge"));
}

#[test]
fn directory_fills_up() {
    let f = fixture(64);
    for i in 0..10 {
        f.fs.create(&format!("f{i}"), 0, FileKind::Internal).unwrap();
    }
    assert_eq!(
        f.fs.create("one-more", 0, FileKind::Internal),
        Err(FsError::DirectoryFull)
    );
}

#[test]
fn new_files_read_back_as_zeros() {
    let f = fixture(64);
    // Leave garbage in the sectors the next file will get.
    f.fs.create("scratch", 3 * S, FileKind::Regular).unwrap();
    let mut file = f.fs.open("scratch").unwrap();
    file.write_at(&[0xAA; 3 * S], 0).unwrap();
    drop(file);
    f.fs.remove("scratch").unwrap();

    f.fs.create("fresh", 3 * S, FileKind::Internal).unwrap();
    let file = f.fs.open("fresh").unwrap();
    let mut buf = vec![0xFFu8; 3 * S];
    assert_eq!(file.read_at(&mut buf, 0), 3 * S);
    assert!(buf.iter().all(|b| *b == 0));
}

#[test]
fn read_and_write_span_sector_boundaries() {
    let f = fixture(64);
    f.fs.create("data", 4 * S, FileKind::Regular).unwrap();
    let mut file = f.fs.open("data").unwrap();

    let payload: Vec<u8> = (0..150u8).collect();
    assert_eq!(file.write_at(&payload, 40).unwrap(), 150);

    let mut back = vec![0u8; 150];
    assert_eq!(file.read_at(&mut back, 40), 150);
    assert_eq!(back, payload);

    let mut head = [9u8; 40];
    file.read_at(&mut head, 0);
    assert_eq!(head, [0u8; 40]);
}

#[test]
fn reads_are_clamped_to_length() {
    let f = fixture(64);
    f.fs.create("short", 10, FileKind::Regular).unwrap();
    let file = f.fs.open("short").unwrap();
    let mut buf = [0u8; 32];
    assert_eq!(file.read_at(&mut buf, 4), 6);
    assert_eq!(file.read_at(&mut buf, 10), 0);
}

#[test]
fn writes_past_the_end_grow_the_file() {
    let f = fixture(64);
    f.fs.create("log", 0, FileKind::Regular).unwrap();
    let mut file = f.fs.open("log").unwrap();
    let free = f.fs.free_sectors();

    f.clock.set(2_000);
    for chunk in 0..10u8 {
        file.write(&[chunk; S]).unwrap();
    }
    assert_eq!(file.length(), 10 * S);
    assert_eq!(f.fs.free_sectors(), free - 11);
    assert!(file.header().indirect_sector().is_some());
    assert_eq!(file.header().modified_time(), 2_000);

    file.seek(9 * S);
    let mut buf = [0u8; S];
    assert_eq!(file.read(&mut buf), S);
    assert_eq!(buf, [9u8; S]);

    // Another handle sees the grown file.
    assert_eq!(f.fs.open("log").unwrap().length(), 10 * S);
}

#[test]
fn failed_growth_writes_nothing() {
    let f = fixture(64);
    f.fs.create("cap", 12 * S, FileKind::Regular).unwrap();
    let mut file = f.fs.open("cap").unwrap();
    let free = f.fs.free_sectors();

    let err = file.write_at(&[1], 12 * S).unwrap_err();
    assert!(matches!(err, FsError::Extent(ExtentError::FileTooLarge { .. })));
    assert_eq!(file.length(), 12 * S);
    assert_eq!(f.fs.free_sectors(), free);
}

#[test]
fn stale_handle_keeps_growth_from_another_handle() {
    let f = fixture(64);
    let free = f.fs.free_sectors();
    f.fs.create("f", 10, FileKind::Regular).unwrap();
    let mut early = f.fs.open("f").unwrap();
    let mut grower = f.fs.open("f").unwrap();

    grower.write_at(&[7; 5 * S], 10).unwrap();
    assert_eq!(f.fs.open("f").unwrap().length(), 10 + 5 * S);

    // `early` still caches the 10-byte header.
    f.clock.advance(1);
    early.write_at(b"x", 0).unwrap();
    assert_eq!(f.fs.open("f").unwrap().length(), 10 + 5 * S);
    assert_eq!(early.length(), 10 + 5 * S);
    assert_eq!(early.header().modified_time(), 1_001);

    let mut buf = [0u8; 3];
    early.read_at(&mut buf, 10 + 5 * S - 3);
    assert_eq!(buf, [7; 3]);

    drop((early, grower));
    f.fs.remove("f").unwrap();
    assert_eq!(f.fs.free_sectors(), free);
}

#[test]
fn write_offset_overflow_is_rejected() {
    let f = fixture(64);
    f.fs.create("edge", S, FileKind::Regular).unwrap();
    let mut file = f.fs.open("edge").unwrap();
    let free = f.fs.free_sectors();

    let err = file.write_at(b"xy", usize::MAX).unwrap_err();
    assert!(matches!(err, FsError::Extent(ExtentError::FileTooLarge { .. })));
    assert_eq!(file.length(), S);
    assert_eq!(f.fs.free_sectors(), free);
}

#[test]
fn timestamps_follow_the_file_kind() {
    let f = fixture(64);
    f.fs.create("user", S, FileKind::Regular).unwrap();
    f.fs.create("SWAP0", S, FileKind::Internal).unwrap();

    assert_eq!(f.fs.open("user").unwrap().header().modified_time(), 1_000);
    assert!(!f.fs.open("SWAP0").unwrap().header().is_timestamped());

    f.clock.advance(5);
    f.fs.open("user").unwrap().write_at(b"x", 0).unwrap();
    f.fs.open("SWAP0").unwrap().write_at(&[0; 2 * S], 0).unwrap();

    assert_eq!(f.fs.open("user").unwrap().header().modified_time(), 1_005);
    assert!(!f.fs.open("SWAP0").unwrap().header().is_timestamped());
}

#[test]
fn mount_sees_what_format_and_create_wrote() {
    let f = fixture(64);
    f.fs.create("keep", 2 * S, FileKind::Regular).unwrap();
    f.fs.open("keep").unwrap().write_at(b"persisted", 5).unwrap();
    let free = f.fs.free_sectors();
    drop(f.fs);

    let fs = FileSystem::mount(
        f.disk.clone(),
        Geometry::with_limits(S, 8, 4).unwrap(),
        f.clock.clone(),
    )
    .unwrap();
    assert_eq!(fs.free_sectors(), free);
    assert_eq!(fs.list(), vec!["keep".to_string()]);

    let file = fs.open("keep").unwrap();
    let mut buf = [0u8; 9];
    file.read_at(&mut buf, 5);
    assert_eq!(&buf, b"persisted");
    assert!(file.dump().contains("persisted"));
}

#[test]
fn remove_of_missing_file_fails() {
    let f = fixture(64);
    assert_eq!(f.fs.remove("ghost"), Err(FsError::NotFound("ghost".into())));
    assert!(matches!(f.fs.open("ghost"), Err(FsError::NotFound(_))));
}
