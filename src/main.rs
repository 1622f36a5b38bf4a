use clap::Parser;
use momentum_wf::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
