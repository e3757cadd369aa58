mod bindings;
mod cli;
mod pattern;
mod run;
mod snapshot;
mod window;

use anyhow::Result;

fn main() -> Result<()> {
    let args = cli::parse();
    run::run(args)
}
