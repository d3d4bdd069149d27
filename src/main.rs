use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use clonemark::annotate::{self, RunOptions};
use clonemark::flags::AnnotationConfig;
use clonemark::naming::ReadNaming;
use clonemark::pairing::ReadGroupSet;
use clonemark::scheduler::SchedulerConfig;

/// clonemark - mate-pair annotation of SAM alignment streams
///
/// Groups SAM records by clone, checks mate-pair concordance against per-library
/// pairing models, and sets quality, tail, length and concordance bits in the
/// FLAG field. Output order always matches input order.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// SAM input (plain, .gz or .bgz); "-" reads stdin
    #[clap(value_name = "SAM", default_value = "-")]
    input: PathBuf,

    /// Output SAM file (stdout if not specified)
    #[clap(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Diagnostic output file (stderr if not specified)
    #[clap(long = "diag-output")]
    diag_output: Option<PathBuf>,

    /// Read-group pairing file: "name id orientation mean stddev" per line.
    /// Without it, input is treated as unpaired
    #[clap(short = 'l', long = "pairing", env = "CLONEMARK_PAIRING")]
    pairing: Option<PathBuf>,

    /// SAM of alignments to repeat elements, in the same clone order as the input
    #[clap(long = "repeat")]
    repeat: Option<PathBuf>,

    /// Read names are structured as <clone>:<read group id>:<mate 1|2>:<length>
    #[clap(short = 'P', long = "structured-names")]
    structured_names: bool,

    /// Minimum mapping quality for the quality-pass bit
    #[clap(short = 'q', long = "min-mapq", default_value = "5", env = "CLONEMARK_MIN_MAPQ")]
    min_mapq: u8,

    /// Minimum tail insert size for the tail-pass bits (0 disables them)
    #[clap(short = 'i', long = "min-tail-insert", default_value = "15", env = "CLONEMARK_MIN_TAIL_INSERT")]
    min_tail_insert: u32,

    /// Match runs at least this long end a tail
    #[clap(short = 'm', long = "min-tail-match", default_value = "5", env = "CLONEMARK_MIN_TAIL_MATCH")]
    min_tail_match: u32,

    /// Reads shorter than this get the length-fail bit
    #[clap(short = 'r', long = "min-read-len", default_value = "20", env = "CLONEMARK_MIN_READ_LEN")]
    min_read_len: u32,

    /// Read group for records without an RG tag
    #[clap(short = 'g', long = "default-rg", default_value = "00", env = "CLONEMARK_DEFAULT_RG")]
    default_rg: String,

    /// Clone groups per chunk
    #[clap(long = "chunk-size", default_value = "1000", env = "CLONEMARK_CHUNK_SIZE")]
    chunk_size: usize,

    /// Number of worker threads
    #[clap(short = 't', long = "threads", default_value = "1", env = "CLONEMARK_THREADS")]
    threads: usize,

    /// Verbosity: -v adds per-chunk and per-clone diagnostics and info logging,
    /// -vv debug logging
    #[clap(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Initialize logger based on verbosity; RUST_LOG still applies on top
fn setup_logger(verbosity: u8) {
    env_logger::Builder::new()
        .filter_level(match verbosity {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        })
        .parse_default_env()
        .init();
}

fn create_writer(path: Option<&PathBuf>, fallback: Box<dyn Write + Send>) -> Result<Box<dyn Write + Send>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(fallback),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logger(args.verbose);

    if args.chunk_size == 0 {
        anyhow::bail!("--chunk-size must be at least 1");
    }

    let read_groups = match &args.pairing {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open pairing file {}", path.display()))?;
            ReadGroupSet::load(BufReader::new(file))
                .with_context(|| format!("Failed to load pairing file {}", path.display()))?
        }
        None => ReadGroupSet::new(),
    };

    let options = RunOptions {
        input: args.input.clone(),
        repeat: args.repeat.clone(),
        naming: if args.structured_names {
            ReadNaming::Structured
        } else {
            ReadNaming::Plain
        },
        annotation: AnnotationConfig {
            min_read_len: args.min_read_len,
            min_mapq: args.min_mapq,
            min_tail_insert_size: args.min_tail_insert,
            min_tail_match_len: args.min_tail_match,
            default_read_group: args.default_rg.clone(),
        },
        scheduler: SchedulerConfig {
            threads: args.threads,
            chunk_size: args.chunk_size,
        },
        verbose: args.verbose > 0,
    };

    let out = create_writer(args.output.as_ref(), Box::new(BufWriter::new(io::stdout())))?;
    let diag = create_writer(args.diag_output.as_ref(), Box::new(io::stderr()))?;

    annotate::run(&options, &read_groups, out, diag)
        .with_context(|| format!("Failed to annotate {}", args.input.display()))?;

    Ok(())
}
