use crate::demo::{run_demo, run_rankings, run_sla, DemoArgs, RankingsArgs, SlaArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use roadwatch::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Roadwatch",
    about = "Track citizen-reported infrastructure issues, SLA breaches, and contractor performance",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Rank contractors from CSV exports
    Rankings(RankingsArgs),
    /// Print the SLA aging queue from a CSV export
    Sla(SlaArgs),
    /// Run an end-to-end demo on synthetic data
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Rankings(args) => run_rankings(args),
        Command::Sla(args) => run_sla(args),
        Command::Demo(args) => run_demo(args),
    }
}
