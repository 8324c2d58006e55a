use clap::Parser;
use tradeflow::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
