//! Run a NOFF executable's page touches through the demand pager on a RAM
//! disk and report what the pager did.
//!
//! ```text
//! vmsim --frames 2 0 1 2 1w 3 0
//! vmsim --program halt.noff --dump-disk disk.img 0 4w 9
//! ```

mod clock;
mod logger;

use crate::clock::SystemClock;
use crate::logger::ConsoleLogger;
use clap::Parser;
use kernel_disk::RamDisk;
use kernel_fs::{FileKind, FileSystem, FsError, Geometry};
use kernel_info::memory::{FRAMES_PER_PROCESS, NUM_PHYS_PAGES, PAGE_SIZE, VmConfig};
use kernel_vmem::{AddressSpace, Machine, VirtualAddress, VmError, build_image};
use log::{LevelFilter, error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

/// Name the executable is stored under on the simulated disk.
const PROGRAM_FILE: &str = "program";

#[derive(Debug, Parser)]
#[command(version, about = "Demand paging on a simulated disk")]
struct Args {
    /// NOFF executable to load; a built-in demo program when absent.
    #[arg(short, long)]
    program: Option<PathBuf>,

    /// Resident frames per process.
    #[arg(short, long, default_value_t = FRAMES_PER_PROCESS)]
    frames: usize,

    /// Physical frames in main memory.
    #[arg(long, default_value_t = NUM_PHYS_PAGES)]
    physical_frames: usize,

    #[arg(short, long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,

    /// Write the final disk image here.
    #[arg(long)]
    dump_disk: Option<PathBuf>,

    /// Virtual pages to touch in order; a `w` suffix writes instead of reads.
    touches: Vec<Touch>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Touch {
    page: usize,
    write: bool,
}

impl FromStr for Touch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (digits, write) = s.strip_suffix('w').map_or((s, false), |d| (d, true));
        let page = digits
            .parse()
            .map_err(|_| format!("bad page touch {s:?}, expected e.g. 3 or 3w"))?;
        Ok(Self { page, write })
    }
}

#[derive(Debug, thiserror::Error)]
enum SimError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Fs(#[from] FsError),
    #[error(transparent)]
    Vm(#[from] VmError),
    #[error("a process needs at least one resident frame")]
    NoFrames,
    #[error("cannot install logger: {0}")]
    Logger(#[from] log::SetLoggerError),
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("vmsim: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), SimError> {
    ConsoleLogger::new(args.log_level).init()?;
    if args.frames == 0 {
        return Err(SimError::NoFrames);
    }

    let image = match &args.program {
        Some(path) => std::fs::read(path).map_err(|source| SimError::Read {
            path: path.clone(),
            source,
        })?,
        None => demo_program(),
    };

    let disk = Arc::new(RamDisk::with_default_layout());
    let fs = FileSystem::format(disk.clone(), Geometry::DEFAULT, Arc::new(SystemClock))?;
    fs.create(PROGRAM_FILE, image.len(), FileKind::Regular)?;
    fs.open(PROGRAM_FILE)?.write_at(&image, 0)?;
    let executable = fs.open(PROGRAM_FILE)?;

    let config = VmConfig::new()
        .with_frames_per_process(args.frames)
        .with_physical_frames(args.physical_frames);
    let machine = Arc::new(Machine::new(config));
    let mut space = AddressSpace::new(machine.clone(), fs.clone(), &executable)?;
    space.init_registers();
    space.restore_state();

    for touch in &args.touches {
        let addr = VirtualAddress::from_usize(touch.page * PAGE_SIZE);
        if touch.write {
            space.write_byte(addr, 0xff)?;
        } else {
            let value = space.read_byte(addr)?;
            info!("page {} byte 0 = {value:#04x}", touch.page);
        }
    }

    space.print();
    fs.print();

    let stats = machine.stats();
    let resident: Vec<String> = space
        .resident_pages()
        .iter()
        .map(ToString::to_string)
        .collect();
    println!(
        "{} pages, {} resident [{}]",
        space.num_pages(),
        resident.len(),
        resident.join(" ")
    );
    println!(
        "page faults {}, page-ins {}, write-outs {}",
        stats.page_faults, stats.page_ins, stats.page_write_outs
    );
    let disk_stats = disk.stats();
    println!(
        "disk reads {}, disk writes {}",
        disk_stats.reads, disk_stats.writes
    );

    drop(space);
    if let Some(path) = &args.dump_disk {
        std::fs::write(path, disk.to_image()).map_err(|source| SimError::Write {
            path: path.clone(),
            source,
        })?;
        info!("disk image written to {}", path.display());
    }
    Ok(())
}

/// Three pages of code, a short data string and two pages of bss.
fn demo_program() -> Vec<u8> {
    let code: Vec<u8> = (0..3 * PAGE_SIZE)
        .map(|i| u8::try_from(i % 256).unwrap_or_default())
        .collect();
    build_image(&code, b"hello, paging\0", 2 * PAGE_SIZE)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_touches() {
        assert_eq!(
            "3".parse::<Touch>(),
            Ok(Touch {
                page: 3,
                write: false
            })
        );
        assert_eq!(
            "12w".parse::<Touch>(),
            Ok(Touch {
                page: 12,
                write: true
            })
        );
        assert!("w".parse::<Touch>().is_err());
        assert!("x3".parse::<Touch>().is_err());
    }

    #[test]
    fn demo_program_runs_through_the_pager() {
        let disk = Arc::new(RamDisk::with_default_layout());
        let fs = FileSystem::format(disk, Geometry::DEFAULT, Arc::new(SystemClock)).unwrap();
        let machine = Arc::new(Machine::new(VmConfig::new().with_frames_per_process(2)));
        let image = demo_program();
        let mut space = AddressSpace::new(machine, fs, &image).unwrap();

        let addr = VirtualAddress::from_usize(PAGE_SIZE + 5);
        assert_eq!(space.read_byte(addr).unwrap(), u8::try_from((PAGE_SIZE + 5) % 256).unwrap());
        assert_eq!(space.resident_pages().len(), 2);
    }

    #[test]
    fn args_parse_frames_and_touches() {
        let args = Args::parse_from(["vmsim", "--frames", "3", "0", "1w"]);
        assert_eq!(args.frames, 3);
        assert_eq!(
            args.touches,
            vec![
                Touch {
                    page: 0,
                    write: false
                },
                Touch {
                    page: 1,
                    write: true
                }
            ]
        );
    }
}
