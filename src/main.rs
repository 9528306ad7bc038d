use clap::{Parser, Subcommand};

mod cmd;
mod operations;
mod tax;
mod utils;

use cmd::{
    calc::CalcCommand, report::ReportCommand, schema::SchemaCommand, validate::ValidateCommand,
};

/// Calculate Capital Gains Tax on stock operations
#[derive(Parser, Debug)]
#[command(name = "capgains", version, author, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Calculate tax for each operation, one JSON line per simulation
    Calc(CalcCommand),
    /// Show a detailed per-operation ledger
    Report(ReportCommand),
    /// Check simulations for invalid operations
    Validate(ValidateCommand),
    /// Print the expected input format
    Schema(SchemaCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Calc(cmd) => cmd.exec(),
        Command::Report(cmd) => cmd.exec(),
        Command::Validate(cmd) => cmd.exec(),
        Command::Schema(cmd) => cmd.exec(),
    }
}
