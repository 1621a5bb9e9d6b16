use clap::{Parser, Subcommand, ValueEnum};
use flash_write_bench::benches;
use flash_write_bench::clock::MonotonicClock;
use flash_write_bench::error::BenchError;
use flash_write_bench::harness::{BenchConfig, Profile};
use flash_write_bench::payload::PayloadPattern;
use flash_write_bench::schema::{BenchReport, Measurement, RunMeta};
use flash_write_bench::store::{DirStore, MemStore, Store};
use flash_write_bench::StoreKind;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProfileArg {
    Quick,
    Full,
}

impl From<ProfileArg> for Profile {
    fn from(v: ProfileArg) -> Self {
        match v {
            ProfileArg::Quick => Profile::Quick,
            ProfileArg::Full => Profile::Full,
        }
    }
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Byte-by-byte fill of a RAM buffer.
    Ram,

    /// File writes: create vs overwrite, plus temp-file-and-rename.
    Flash,

    /// RAM and flash benches, with a flash/RAM slowdown per size.
    Suite,
}

#[derive(Parser, Debug)]
#[command(name = "flash-write-bench")]
#[command(about = "RAM vs flash write latency benchmarks (JSON output)")]
struct Args {
    #[arg(long, value_enum, default_value_t = ProfileArg::Quick, global = true)]
    profile: ProfileArg,

    #[arg(long, default_value_t = 0, global = true)]
    seed: u64,

    /// Trials per measurement; overrides the profile.
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    trials: Option<u64>,

    /// Payload size in KiB (1..=1048576). Can be provided multiple times.
    #[arg(
        long = "size-kib",
        value_name = "KIB",
        global = true,
        action = clap::ArgAction::Append,
        value_parser = clap::value_parser!(u64).range(1..=MAX_SIZE_KIB)
    )]
    sizes_kib: Vec<u64>,

    /// Pause after each flash trial, in milliseconds.
    #[arg(long, default_value_t = 10, global = true)]
    pause_ms: u64,

    #[arg(long, value_enum, default_value_t = PayloadPattern::Counter, global = true)]
    pattern: PayloadPattern,

    #[arg(long, value_enum, default_value_t = StoreKind::Dir, global = true)]
    store: StoreKind,

    /// Directory for the dir store. Defaults to a fresh temp dir.
    #[arg(long, value_name = "DIR", global = true)]
    dir: Option<PathBuf>,

    /// Where to write the JSON report. If omitted, prints to stdout.
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    /// Debug logging (per-trial samples).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

const DEFAULT_SIZES_KIB: [u64; 3] = [8, 32, 64];

/// 1 GiB; larger payloads make no sense for a single-file write.
const MAX_SIZE_KIB: u64 = 1024 * 1024;

fn payload_sizes(sizes_kib: &[u64]) -> Vec<usize> {
    let kib = if sizes_kib.is_empty() {
        &DEFAULT_SIZES_KIB[..]
    } else {
        sizes_kib
    };
    kib.iter().map(|k| (k * 1024) as usize).collect()
}

fn now_utc_rfc3339() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("unix:{secs}")
}

fn git_sha_short() -> Option<String> {
    std::env::var("GIT_SHA")
        .ok()
        .or_else(|| std::env::var("GITHUB_SHA").ok())
        .map(|s| s.chars().take(12).collect())
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "flash_write_bench=debug"
    } else {
        "flash_write_bench=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_with<S: Store>(
    cmd: Command,
    cfg: &BenchConfig,
    store: &S,
    sizes: &[usize],
) -> Result<Vec<Measurement>, BenchError> {
    let clock = MonotonicClock::new();
    match cmd {
        Command::Ram => benches::ram::run(cfg, &clock, sizes),
        Command::Flash => benches::flash::run(cfg, &clock, store, sizes),
        Command::Suite => benches::suite(cfg, &clock, store, sizes),
    }
}

fn main() -> Result<(), BenchError> {
    let args = Args::parse();
    init_logging(args.verbose);

    let cfg = BenchConfig {
        trials: args.trials.map(|t| t as usize),
        pause: Duration::from_millis(args.pause_ms),
        pattern: args.pattern,
        ..BenchConfig::new(args.profile.into(), args.seed)
    };

    let sizes = payload_sizes(&args.sizes_kib);

    info!(
        profile = cfg.profile.as_str(),
        trials = cfg.trials(),
        ?sizes,
        store = args.store.as_str(),
        "starting benchmarks"
    );

    let measurements = match args.store {
        StoreKind::Mem => run_with(args.cmd, &cfg, &MemStore::new(), &sizes)?,
        StoreKind::Dir => {
            // Keep the temp dir alive until the run is over.
            let (_guard, root) = match &args.dir {
                Some(dir) => (None, dir.clone()),
                None => {
                    let tmp = TempDir::new()?;
                    let root = tmp.path().to_path_buf();
                    (Some(tmp), root)
                }
            };
            let store = DirStore::new(root)?;
            info!(root = %store.root().display(), "dir store");
            run_with(args.cmd, &cfg, &store, &sizes)?
        }
    };

    let report = BenchReport {
        run: RunMeta {
            schema_version: 1,
            bench_version: env!("CARGO_PKG_VERSION").to_string(),
            profile: cfg.profile.as_str().to_string(),
            seed: cfg.seed,
            timestamp_utc: now_utc_rfc3339(),
            git_sha: git_sha_short(),
            store: args.store.as_str().to_string(),
            payload_pattern: cfg.pattern.as_str().to_string(),
        },
        measurements,
    };

    let json = serde_json::to_string_pretty(&report)?;
    if let Some(out) = args.out {
        fs::write(out, json)?;
    } else {
        println!("{json}");
    }

    Ok(())
}
