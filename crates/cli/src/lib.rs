pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "leadbot",
    about = "Leadbot operator CLI",
    long_about = "Apply migrations, inspect configuration, check readiness, export leads.",
    after_help = "Examples:\n  leadbot doctor --json\n  leadbot config\n  leadbot export"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Print effective configuration as redacted JSON with source attribution")]
    Config,
    #[command(about = "Validate config, database connectivity and CRM webhook presence")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Write every stored chat profile to a CSV file")]
    Export {
        #[arg(long, default_value = "clients.csv", help = "Destination CSV path")]
        output: PathBuf,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Export { output } => commands::export::run(&output),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
