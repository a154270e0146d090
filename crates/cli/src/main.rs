use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
use commands::{init::InitArgs, rules::RulesArgs, scan::ScanArgs};

#[derive(Parser)]
#[command(name = "pyguard")]
#[command(about = "Hybrid security auditor for Python source")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Audit a Python file or a directory tree
    Scan(ScanArgs),

    /// List the deterministic rules and the finding taxonomy
    Rules(RulesArgs),

    /// Write a commented starter configuration
    InitConfig(InitArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan(args) => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::scan::execute(args))
        }
        Commands::Rules(args) => commands::rules::execute(args),
        Commands::InitConfig(args) => commands::init::execute(args),
    }
}
