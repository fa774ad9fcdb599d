//! Interactive conversation loop on stdin.

use std::io::{self, BufRead, Write};

use anyhow::Result;
use colored::Colorize;

use crate::cli::handlers::ask::{render_outcome, run_turn};
use crate::cli::output::{print_error, print_hint, OutputMode};
use crate::cli::TurnArgs;
use crate::init::AppContext;

const EXIT_WORDS: &[&str] = &["exit", "quit", ":q", "keluar"];

pub fn handle_chat(ctx: &mut AppContext, turn: &TurnArgs, mode: OutputMode) -> Result<()> {
    let settings = turn.apply(&ctx.engine.config().settings);
    if mode == OutputMode::Human {
        print_hint("Type a message, or \"exit\" to quit.");
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        if mode == OutputMode::Human {
            print!("{} ", "you>".cyan().bold());
            io::stdout().flush()?;
        }
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&message.to_lowercase().as_str()) {
            break;
        }

        match run_turn(ctx, message, &settings) {
            Ok(outcome) => render_outcome(&outcome, mode),
            Err(e) => print_error(&e.to_string()),
        }
    }
    Ok(())
}
