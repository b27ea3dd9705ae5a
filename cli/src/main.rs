mod commands;

use clap::{Parser, Subcommand};
use commands::{commit::CommitOffsiteCommand, mirror::MirrorCommand, offsite::OffsiteCommand};
use offsync_core::Outcome;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(
    name = "offsync",
    about = "Content-fingerprinting offsite and mirror backups",
    long_about = "Offsync computes the minimal set of file operations needed to bring a \
                  destination in line with one or more source inputs, then applies them"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, env = "OFFSYNC_DATA_DIR", help = "Directory holding persisted snapshots")]
    data_dir: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose output")]
    verbose: bool,

    #[arg(short, long, help = "Enable quiet mode")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Prepare offsite backup content based on the last committed run")]
    Offsite(OffsiteCommand),

    #[command(about = "Commit pending data written by a previous offsite run")]
    CommitOffsite(CommitOffsiteCommand),

    #[command(about = "Mirror files to a destination directory")]
    Mirror(MirrorCommand),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let code = match &cli.command {
        Commands::Offsite(cmd) => outcome_code(cmd.run(&cli).await),
        Commands::Mirror(cmd) => outcome_code(cmd.run(&cli).await),
        Commands::CommitOffsite(cmd) => match cmd.run(&cli).await {
            Ok(()) => 0,
            Err(e) => report_failure(e),
        },
    };

    ExitCode::from(code)
}

fn outcome_code(result: anyhow::Result<Outcome>) -> u8 {
    match result {
        Ok(Outcome::Completed(_)) => 0,
        Ok(Outcome::NothingToDo) => 1,
        Err(e) => report_failure(e),
    }
}

fn report_failure(e: anyhow::Error) -> u8 {
    eprintln!("ERROR: {e:#}");
    2
}

fn init_tracing(verbose: bool, quiet: bool) {
    let level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new(format!("offsync={level}")))
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Setting default subscriber failed");
}
