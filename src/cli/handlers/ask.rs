//! One conversational turn against the persisted session.

use anyhow::Result;
use serde::Serialize;

use crate::cli::output::{output_json, print_envelope, print_hint, OutputMode};
use crate::cli::TurnArgs;
use crate::engine::TurnOutcome;
use crate::init::AppContext;
use crate::models::settings::Settings;

pub fn handle_ask(ctx: &mut AppContext, message: &str, turn: &TurnArgs, mode: OutputMode) -> Result<()> {
    let settings = turn.apply(&ctx.engine.config().settings);
    let outcome = run_turn(ctx, message, &settings)?;
    render_outcome(&outcome, mode);
    Ok(())
}

/// Run a turn, record it in the session and save the session.
pub(crate) fn run_turn(ctx: &mut AppContext, message: &str, settings: &Settings) -> Result<TurnOutcome> {
    let state = &mut ctx.session.state;
    let outcome = ctx.engine.handle_turn(
        message,
        &mut state.context,
        &mut state.pending_clarification,
        settings,
    )?;
    state.record(&outcome);
    ctx.session.save()?;
    Ok(outcome)
}

pub(crate) fn render_outcome(outcome: &TurnOutcome, mode: OutputMode) {
    match mode {
        OutputMode::Json => {
            #[derive(Serialize)]
            struct TurnJson<'a> {
                turn_id: u64,
                intent: String,
                intent_confidence: f64,
                response: &'a crate::models::envelope::ResponseEnvelope,
                #[serde(skip_serializing_if = "Option::is_none")]
                clarification: Option<String>,
            }
            output_json(&TurnJson {
                turn_id: outcome.turn_id,
                intent: outcome.classification.intent.to_string(),
                intent_confidence: outcome.classification.confidence,
                response: &outcome.envelope,
                clarification: outcome.clarification.as_ref().map(|c| c.kind.to_string()),
            });
        }
        _ => {
            print_envelope(&outcome.envelope, mode);
            if outcome.clarification.is_some() && mode == OutputMode::Human {
                print_hint("Answer with `tanya ask <reply>` to continue.");
            }
        }
    }
}
