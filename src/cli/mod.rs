//! CLI interface for Tanya.

pub mod handlers;
pub mod output;

use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use crate::math::Precision;
use crate::models::settings::Settings;
use output::OutputMode;

/// Tanya - local conversational assistant over a knowledge base
#[derive(Parser)]
#[command(name = "tanya", version, about, long_about = None)]
pub struct Cli {
    /// Override data directory (default: ~/.tanya)
    #[arg(long, env = "TANYA_DATA_PATH", global = true)]
    pub data_path: Option<PathBuf>,

    /// Knowledge base file (JSON, YAML or TOML); defaults to knowledge.* in the data directory
    #[arg(long, env = "TANYA_KB", global = true)]
    pub kb: Option<PathBuf>,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    pub json: bool,

    /// Output as Markdown
    #[arg(long, global = true)]
    pub md: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Per-turn behaviour switches layered over the configured defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct TurnArgs {
    /// Rounding for calculations: low, medium or high
    #[arg(long)]
    pub precision: Option<Precision>,
    /// Append related-topic hints to knowledge answers
    #[arg(long)]
    pub creative: bool,
    /// Capture a training example for each turn
    #[arg(long)]
    pub train: bool,
}

impl TurnArgs {
    pub fn apply(&self, base: &Settings) -> Settings {
        let mut settings = base.clone();
        if let Some(precision) = self.precision {
            settings = settings.with_precision(precision);
        }
        if self.creative {
            settings = settings.with_creative_mode(true);
        }
        if self.train {
            settings = settings.with_training(true);
        }
        settings
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send one message in the persisted conversation
    Ask {
        /// The message to send
        message: String,
        #[command(flatten)]
        turn: TurnArgs,
    },

    /// Interactive conversation on stdin (type "exit" to quit)
    Chat {
        #[command(flatten)]
        turn: TurnArgs,
    },

    /// Show how a message is classified
    Classify {
        /// Text to classify
        text: String,
    },

    /// Search the knowledge base
    Search {
        /// Search query
        query: String,
        /// Maximum results
        #[arg(long, default_value = "5")]
        limit: usize,
    },

    /// Check a claim against the knowledge base
    Check {
        /// The claim to verify
        claim: String,
        /// Minimum score for a claim to count as verified
        #[arg(long)]
        threshold: Option<f64>,
        /// Supporting sources to show
        #[arg(long)]
        top_n: Option<usize>,
    },

    /// Evaluate arithmetic, integrals or derivatives
    Math {
        /// Expression or question, e.g. "integral x^2 from 0 to 1"
        expression: String,
        /// Rounding: low, medium or high
        #[arg(long, default_value = "medium")]
        precision: Precision,
    },

    /// Session management (show, clear)
    #[command(subcommand)]
    Session(SessionCommands),

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, elvish, powershell)
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum SessionCommands {
    /// Show the conversation so far and any open clarification
    Show,
    /// Forget the conversation
    Clear,
}

/// Whether a command needs the engine and session loaded.
pub fn needs_context(command: &Commands) -> bool {
    !matches!(command, Commands::Completions { .. } | Commands::Math { .. })
}

/// Commands that run without loading a knowledge base or session.
pub fn execute_standalone(command: &Commands, mode: OutputMode) -> anyhow::Result<()> {
    match command {
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "tanya", &mut std::io::stdout());
        }
        Commands::Math {
            expression,
            precision,
        } => handlers::inspect::handle_math(expression, *precision, mode)?,
        _ => anyhow::bail!("command needs an initialized context"),
    }
    Ok(())
}

pub fn execute(
    command: &Commands,
    ctx: &mut crate::init::AppContext,
    mode: OutputMode,
) -> anyhow::Result<()> {
    match command {
        Commands::Ask { message, turn } => handlers::ask::handle_ask(ctx, message, turn, mode)?,
        Commands::Chat { turn } => handlers::chat::handle_chat(ctx, turn, mode)?,
        Commands::Classify { text } => handlers::inspect::handle_classify(ctx, text, mode)?,
        Commands::Search { query, limit } => {
            handlers::inspect::handle_search(ctx, query, *limit, mode)?
        }
        Commands::Check {
            claim,
            threshold,
            top_n,
        } => handlers::inspect::handle_check(ctx, claim, *threshold, *top_n, mode)?,
        Commands::Session(cmd) => match cmd {
            SessionCommands::Show => handlers::session::handle_show(ctx, mode)?,
            SessionCommands::Clear => handlers::session::handle_clear(ctx, mode)?,
        },
        Commands::Completions { .. } | Commands::Math { .. } => execute_standalone(command, mode)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_turn_args_override_defaults() {
        let cli = Cli::parse_from(["tanya", "ask", "halo", "--precision", "high", "--train"]);
        let Commands::Ask { turn, .. } = cli.command else {
            panic!("expected ask");
        };
        let settings = turn.apply(&Settings::default());
        assert_eq!(settings.calculation_precision, Precision::High);
        assert!(settings.auto_training_trigger);
        assert!(!settings.creative_mode);
    }
}
