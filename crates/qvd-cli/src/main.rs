/// QVD command-line tool: inspect, validate, and dump QVD table files.
///
/// # Command overview
///
/// ```text
/// qvd <COMMAND> [OPTIONS]
///
/// Commands:
///   inspect    Print the header, field layout and leading symbols
///   validate   Decode the whole file and report structural problems
///   dump       Write the rows as an aligned table, CSV, or JSON
///   help       Print help information
///
/// Global options:
///   -v, --verbose          Log decode stages to stderr
///   --buffer-size BYTES    Read buffer capacity (default 8192)
///   -h, --help             Print help
///   -V, --version          Print version
/// ```
///
/// # Exit codes
///
/// | Code | Meaning                                 |
/// |------|-----------------------------------------|
/// | 0    | Success                                 |
/// | 1    | Error (I/O failure, invalid file, etc.) |
///
/// Errors and logs go to stderr so stdout can be piped cleanly.
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use qvd_decoder::DecoderConfig;
use tracing_subscriber::EnvFilter;

mod cmd_dump;
mod cmd_inspect;
mod cmd_validate;

// ── CLI root ──────────────────────────────────────────────────────────────────

/// Inspect, validate, and dump QVD table files.
#[derive(Parser)]
#[command(name = "qvd", version, about = "QVD table file decoder")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log decode stages at debug level (`RUST_LOG` overrides).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Read buffer capacity in bytes. Output does not depend on it.
    #[arg(long, global = true, value_name = "BYTES")]
    buffer_size: Option<usize>,
}

impl Cli {
    fn decoder_config(&self) -> DecoderConfig {
        let mut config = DecoderConfig::default();
        if let Some(size) = self.buffer_size {
            config.buffer_capacity = size;
        }
        config
    }
}

// ── Sub-commands ──────────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum Commands {
    /// Print table metadata, field layout and the first symbols of each field.
    Inspect(InspectArgs),
    /// Decode the whole file and report structural problems.
    Validate(ValidateArgs),
    /// Write decoded rows as an aligned table, CSV, or JSON.
    Dump(DumpArgs),
}

// ── Argument structs ──────────────────────────────────────────────────────────

/// Arguments for `qvd inspect`.
///
/// Decodes the header and symbol tables only; the row section is never
/// read, so this is fast on large files.
#[derive(clap::Args)]
pub struct InspectArgs {
    /// Path to the `.qvd` file to inspect.
    pub file: PathBuf,

    /// Print up to N symbols of each field.
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub symbols: usize,

    /// Emit the report as JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `qvd validate`.
#[derive(clap::Args)]
pub struct ValidateArgs {
    /// Path to the `.qvd` file to validate.
    pub file: PathBuf,
}

/// Arguments for `qvd dump`.
///
/// ```text
/// ┌─────────────────┬──────────────────────────────────────────────────┐
/// │ Flag            │ Values / default                                 │
/// ├─────────────────┼──────────────────────────────────────────────────┤
/// │ --format        │ table (default) | csv | json                     │
/// │ --limit         │ stop after N rows (none = all)                   │
/// │ --skip-bad-rows │ report bad rows on stderr and keep going         │
/// │ -o / --output   │ write to file instead of stdout                  │
/// └─────────────────┴──────────────────────────────────────────────────┘
/// ```
#[derive(clap::Args)]
pub struct DumpArgs {
    /// Path to the `.qvd` file to dump.
    pub file: PathBuf,

    /// Output format: `table`, `csv`, or `json`.
    #[arg(long, default_value = "table")]
    pub format: String,

    /// Stop after this many rows.
    #[arg(long)]
    pub limit: Option<u64>,

    /// Skip rows with a bad symbol index instead of stopping.
    #[arg(long)]
    pub skip_bad_rows: bool,

    /// Write output to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = cli.decoder_config();

    let result = match &cli.command {
        Commands::Inspect(args) => cmd_inspect::run(args, config),
        Commands::Validate(args) => cmd_validate::run(args, config),
        Commands::Dump(args) => cmd_dump::run(args, config),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}
