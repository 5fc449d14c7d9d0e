//! Command-line configuration.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Args, Parser, Subcommand};

/// Sizes processed when none are given on the command line.
pub const DEFAULT_SIZES: [usize; 6] = [50, 100, 150, 250, 500, 1000];

#[derive(Parser)]
#[command(name = "distributed-matrix-multiplication")]
#[command(about = "Row-block distributed integer matrix multiplication")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Multiply matrix_A_<size> by matrix_B_<size> for every size.
    Run(RunArgs),
    /// Write random matrix_A_<size> and matrix_B_<size> input files.
    Generate(GenerateArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directory holding matrix_A_<size>.txt and matrix_B_<size>.txt.
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Directory result_<size>.txt files are written to.
    #[arg(long, default_value = "results")]
    pub results_dir: PathBuf,

    /// Square matrix sizes, processed in order.
    #[arg(long, value_delimiter = ',')]
    pub sizes: Vec<usize>,

    /// Number of ranks for the thread transport. Ignored under MPI, where
    /// mpirun decides.
    #[arg(short = 'n', long)]
    pub processes: Option<usize>,

    /// Compare each result with the single-process product.
    #[arg(long)]
    pub verify: bool,

    /// Also time the single-process product.
    #[arg(long)]
    pub baseline: bool,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Directory to write the matrices into.
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Square matrix sizes to generate.
    #[arg(long, value_delimiter = ',')]
    pub sizes: Vec<usize>,

    /// Base seed. The i-th size uses seed + 2i for A and seed + 2i + 1 for B.
    /// Defaults to the current time.
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub data_dir: PathBuf,
    pub results_dir: PathBuf,
    pub sizes: Vec<usize>,
    pub processes: usize,
    pub verify: bool,
    pub baseline: bool,
}

#[derive(Debug, Clone)]
pub struct GenerateConfig {
    pub data_dir: PathBuf,
    pub sizes: Vec<usize>,
    pub seed: u64,
}

fn sizes_or_default(sizes: Vec<usize>) -> Vec<usize> {
    if sizes.is_empty() {
        DEFAULT_SIZES.to_vec()
    } else {
        sizes
    }
}

impl From<RunArgs> for RunConfig {
    fn from(args: RunArgs) -> Self {
        let processes = args.processes.unwrap_or_else(|| {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        });
        RunConfig {
            data_dir: args.data_dir,
            results_dir: args.results_dir,
            sizes: sizes_or_default(args.sizes),
            processes: processes.max(1),
            verify: args.verify,
            baseline: args.baseline,
        }
    }
}

impl From<GenerateArgs> for GenerateConfig {
    fn from(args: GenerateArgs) -> Self {
        let seed = args.seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_secs())
        });
        GenerateConfig {
            data_dir: args.data_dir,
            sizes: sizes_or_default(args.sizes),
            seed,
        }
    }
}
