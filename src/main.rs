use anyhow::Result;
use clap::Parser;

use edx_roster::args::Cli;
use edx_roster::config::Config;
use edx_roster::logging::{self, LogConfig};
use edx_roster::{run, theme};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    theme::init_color(cli.no_color);
    logging::init(LogConfig::from_env());

    let config = Config::load(cli.config.clone())?;
    run::run(&cli, &config).await
}
