use anyhow::Result;
use std::process::ExitCode;

fn main() -> Result<ExitCode> {
    threadmap_cli::main_entry()
}
