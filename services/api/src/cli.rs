use crate::demo::{run_demo, run_roster_export, DemoArgs, ExportArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use hostess_roster::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Hostess Roster",
    about = "Run the hostess shift roster service and its tooling from the command line",
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
    /// Month roster tooling
    Roster {
        #[command(subcommand)]
        command: RosterCommand,
    },
    /// Walk through the shift lifecycle against seeded in-memory data
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum RosterCommand {
    /// Export a month of seeded demo data as a roster CSV
    Export(ExportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Seed the in-memory store with demo staff and this month's jobs
    #[arg(long)]
    pub(crate) seed: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Roster {
            command: RosterCommand::Export(args),
        } => run_roster_export(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}
