use anyhow::Result;
use clap::Parser;

use hierarch::cli::{run, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}
