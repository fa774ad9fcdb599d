//! Session management command handlers: show, clear.

use anyhow::Result;
use serde::Serialize;

use crate::cli::output::{
    output_json, print_header, print_hint, print_kv, print_success, print_table, OutputMode,
};
use crate::init::AppContext;
use crate::models::clarification::ClarificationSituation;
use crate::session::{Sender, Turn};

pub fn handle_show(ctx: &AppContext, mode: OutputMode) -> Result<()> {
    let state = &ctx.session.state;
    let context = &state.context;

    if mode == OutputMode::Json {
        #[derive(Serialize)]
        struct SessionJson<'a> {
            path: String,
            last_turn_id: u64,
            valid: bool,
            turns: Vec<&'a Turn>,
            topics: &'a [String],
            pending_clarification: Option<&'a ClarificationSituation>,
            training_examples: usize,
        }
        output_json(&SessionJson {
            path: ctx.session.path().display().to_string(),
            last_turn_id: state.last_turn_id,
            valid: context.is_valid(),
            turns: context.turns().collect(),
            topics: context.topics(),
            pending_clarification: state.pending_clarification.as_ref(),
            training_examples: state.training.len(),
        });
        return Ok(());
    }

    print_header("Session");
    print_kv("File", &ctx.session.path().display().to_string());
    print_kv("Last turn", &state.last_turn_id.to_string());
    if let Some(last) = context.last_activity() {
        let status = if context.is_valid() { "active" } else { "expired" };
        print_kv("Last activity", &format!("{} ({})", last.to_rfc3339(), status));
    }
    if !context.topics().is_empty() {
        print_kv("Topics", &context.topics().join(", "));
    }
    if !state.training.is_empty() {
        print_kv("Training examples", &state.training.len().to_string());
    }

    println!();
    let rows: Vec<Vec<String>> = context
        .turns()
        .map(|t| {
            let who = match t.sender {
                Sender::User => "you",
                Sender::Assistant => "tanya",
            };
            vec![
                who.to_string(),
                t.intent.map(|i| i.to_string()).unwrap_or_default(),
                t.content.clone(),
            ]
        })
        .collect();
    print_table(&["From", "Intent", "Message"], rows);

    if let Some(pending) = &state.pending_clarification {
        println!();
        print_hint(&format!("Waiting for clarification ({})", pending.kind));
    }
    Ok(())
}

pub fn handle_clear(ctx: &mut AppContext, mode: OutputMode) -> Result<()> {
    ctx.session.clear();
    ctx.session.save()?;

    if mode == OutputMode::Json {
        output_json(&serde_json::json!({ "cleared": true }));
    } else {
        print_success("Conversation cleared.");
    }
    Ok(())
}
