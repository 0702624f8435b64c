//! Stampede CLI entry point.

use clap::Parser;

use stampede::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => stampede::cli::commands::run::execute(args).await,
    };

    if let Err(err) = result {
        stampede::cli::handle_error(err);
    }
}
