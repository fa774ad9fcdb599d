//! Tanya - local conversational assistant over a knowledge base
//!
//! Usage:
//!   tanya ask "Apa itu kecerdasan buatan?"   One turn in the saved conversation
//!   tanya chat                               Interactive conversation
//!   tanya classify "how do I reset it"       Show the intent decision
//!   tanya math "integral x^2 from 0 to 1"    Evaluate without a knowledge base
//!   tanya --help                             Show all commands

use anyhow::Result;
use clap::Parser;

use tanya::cli::output::OutputMode;
use tanya::cli::{execute, execute_standalone, needs_context, Cli};
use tanya::init::AppContext;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Tracing to stderr so stdout stays clean for --json
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("tanya=info".parse()?),
        )
        .init();

    let mode = OutputMode::from_flags(cli.json, cli.md);

    if needs_context(&cli.command) {
        let mut ctx = AppContext::new(cli.data_path.clone(), cli.kb.clone())?;
        execute(&cli.command, &mut ctx, mode)?;
    } else {
        execute_standalone(&cli.command, mode)?;
    }

    Ok(())
}
