mod logger;

use kexec_devtree::{DEFAULT_DEVICE_TREE_ROOT, ProcDeviceTree, SnapshotDeviceTree, StoreError};
use kexec_ranges::{Discovery, DiscoveryError, DiscoveryOptions, Placement};
use log::LevelFilter;
use logger::StderrLogger;
use std::env;
use std::error::Error as _;
use std::path::PathBuf;
use std::process::ExitCode;

const USAGE: &str = "\
usage: memranges [--crash] [--reuse-initrd] [--root <dir>] [-v|-vv]

  --crash          plan for a dump-capture kernel
  --reuse-initrd   keep the current initrd in place
  --root <dir>     device tree root (default: /proc/device-tree)
  -v, -vv          log to stderr (info, debug)
  -h, --help       show this help";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Config {
    root: PathBuf,
    options: DiscoveryOptions,
    log_level: LevelFilter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Run(Config),
    Help,
}

#[derive(Debug, thiserror::Error)]
enum ArgsError {
    #[error("unknown argument `{0}`")]
    Unknown(String),
    #[error("`{0}` needs a value")]
    MissingValue(&'static str),
}

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error(transparent)]
    Args(#[from] ArgsError),
    #[error("cannot read the device tree")]
    Store(#[from] StoreError),
    #[error("memory range discovery failed")]
    Discovery(#[from] DiscoveryError),
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Command, ArgsError> {
    let mut config = Config {
        root: PathBuf::from(DEFAULT_DEVICE_TREE_ROOT),
        options: DiscoveryOptions::default(),
        log_level: LevelFilter::Warn,
    };

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--crash" => config.options.crash_capture = true,
            "--reuse-initrd" => config.options.retain_boot_data = true,
            "--root" => {
                config.root = args.next().ok_or(ArgsError::MissingValue("--root"))?.into();
            }
            "-v" => config.log_level = LevelFilter::Info,
            "-vv" => config.log_level = LevelFilter::Debug,
            "-vvv" => config.log_level = LevelFilter::Trace,
            "-h" | "--help" => return Ok(Command::Help),
            _ => return Err(ArgsError::Unknown(arg)),
        }
    }

    Ok(Command::Run(config))
}

fn run(config: &Config) -> Result<(), Error> {
    // Read everything once so that all stages see the same tree.
    let tree = SnapshotDeviceTree::capture(&ProcDeviceTree::open(&config.root)?)?;

    let mut placement = Placement::default();
    let discovery = Discovery::run(&tree, config.options, &mut placement)?;

    for range in &discovery.ranges {
        println!("{range}");
    }

    if config.options.crash_capture {
        println!();
        println!(
            "placement window: {:016x}-{:016x}",
            placement.bounds.min, placement.bounds.max
        );
        println!("crash usable regions:");
        for region in placement.usable.iter() {
            println!("{:016x}-{:016x}", region.start(), region.end());
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let config = match parse_args(env::args().skip(1)) {
        Ok(Command::Run(config)) => config,
        Ok(Command::Help) => {
            println!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("memranges: {}\n\n{USAGE}", Error::from(e));
            return ExitCode::from(2);
        }
    };

    if let Err(e) = StderrLogger::new(config.log_level).init() {
        eprintln!("memranges: failed to install logger: {e}");
    }

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("memranges: {e}");
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
