mod cli;
mod config;
mod output;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting ado-connector");
    let code = cli.execute().await?;

    std::process::exit(code);
}
