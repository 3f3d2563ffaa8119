// Licensed under the Apache-2.0 license

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;
use simple_logger::SimpleLogger;
use synaprom_tool::args::Commands;

#[derive(Parser, Debug)]
#[command(
    name = "synaprom-tool",
    author,
    version,
    about = "Inspect and build Synaptics Prometheus firmware containers",
    long_about = None
)]
struct Cli {
    /// Show debug output while parsing
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    SimpleLogger::new().with_level(level).init()?;

    synaprom_tool::execute(cli.command, &mut std::io::stdout().lock())
}
