use clap::Parser;
use nutriscan::cli::{self, Cli};

fn main() {
    if let Err(err) = cli::run(Cli::parse()) {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}
