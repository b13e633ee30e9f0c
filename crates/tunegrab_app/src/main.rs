mod cli;
mod report;
mod runner;

use std::process::ExitCode;

use clap::Parser;

fn main() -> anyhow::Result<ExitCode> {
    let args = cli::Args::parse();
    engine_logging::initialize(args.log.into(), args.log_level());
    runner::run(args)
}
