use std::process::ExitCode;

use clap::Parser;
use paintcore::cli::{self, CliArgs};

fn main() -> ExitCode {
    let args = CliArgs::parse();
    cli::run(args)
}
