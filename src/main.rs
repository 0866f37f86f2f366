mod app;
mod cli;
mod config;
mod db;
mod http;
mod logging;
mod paths;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    let config = config::Config::from_cli(&cli)?;
    logging::init(&config, cli.is_interactive())?;
    app::run(cli, config)
}
