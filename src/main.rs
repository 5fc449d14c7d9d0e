use anyhow::Context;
use clap::Parser;
use distributed_matrix_multiplication::config::{Cli, Commands, GenerateConfig, RunConfig};
use distributed_matrix_multiplication::generator;
use distributed_matrix_multiplication::runner::{self, TaskReport};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate(args) => {
            let config = GenerateConfig::from(args);
            let written = generator::generate(&config).context("failed to generate matrices")?;
            println!("Wrote {} matrix files to {}", written.len(), config.data_dir.display());
            Ok(())
        }
        Commands::Run(args) => {
            let config = RunConfig::from(args);
            let reports = run(&config)?;
            for report in &reports {
                println!("{}\n", report);
            }
            Ok(())
        }
    }
}

#[cfg(not(feature = "mpi"))]
fn run(config: &RunConfig) -> anyhow::Result<Vec<TaskReport>> {
    use distributed_matrix_multiplication::local;

    log::info!("[Coordinator] Starting {} ranks on threads", config.processes);
    let per_rank = local::run(config.processes, |comm| runner::run(&comm, config))
        .context("failed to run ranks")?;

    let mut reports = Vec::new();
    for (rank, result) in per_rank.into_iter().enumerate() {
        reports.extend(result.with_context(|| format!("rank {} failed", rank))?);
    }
    Ok(reports)
}

#[cfg(feature = "mpi")]
fn run(config: &RunConfig) -> anyhow::Result<Vec<TaskReport>> {
    use distributed_matrix_multiplication::mpi_comm::MpiComm;
    use distributed_matrix_multiplication::Communicator;

    let universe = mpi::initialize().context("failed to initialize MPI")?;
    let comm = MpiComm::new(universe.world());
    if comm.is_root() {
        log::info!("[Coordinator] Starting with {} MPI ranks", comm.size());
    }

    let rank = comm.rank();
    runner::run(&comm, config).with_context(|| format!("rank {} failed", rank))
}
