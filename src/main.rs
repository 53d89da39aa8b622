use clap::Parser;
use docflow::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve => cli::serve::run().await,
        Command::Status(args) => cli::inspect::status(args).await,
        Command::List(args) => cli::inspect::list(args).await,
    }
}
