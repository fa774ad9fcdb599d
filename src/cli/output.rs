//! Output formatting infrastructure for CLI commands.

use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use serde::Serialize;

use crate::models::envelope::ResponseEnvelope;

/// Output mode for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
    Markdown,
}

impl OutputMode {
    pub fn from_flags(json: bool, md: bool) -> Self {
        if json {
            OutputMode::Json
        } else if md {
            OutputMode::Markdown
        } else {
            OutputMode::Human
        }
    }
}

/// Print a single item as pretty-printed JSON.
pub fn output_json<T: Serialize>(item: &T) {
    match serde_json::to_string_pretty(item) {
        Ok(json) => println!("{}", json),
        Err(e) => print_error(&format!("Failed to serialize to JSON: {}", e)),
    }
}

/// Print a formatted table with headers and rows.
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    if rows.is_empty() {
        println!("{}", "No results found.".dimmed());
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(headers);

    for row in rows {
        table.add_row(row);
    }

    println!("{table}");
}

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("{} {}", "OK".green().bold(), msg);
}

/// Print an error message to stderr.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "Error:".red().bold(), msg);
}

/// Print a bold section header.
pub fn print_header(title: &str) {
    println!("\n{}\n", title.bold());
}

/// Print a key-value pair line.
pub fn print_kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a dimmed hint/suggestion message.
pub fn print_hint(msg: &str) {
    println!("{}", msg.dimmed());
}

/// Confidence as a colored percentage.
pub fn confidence_label(confidence: f64) -> String {
    let label = format!("{:.0}%", confidence * 100.0);
    if confidence >= 0.8 {
        label.green().to_string()
    } else if confidence >= 0.5 {
        label.yellow().to_string()
    } else {
        label.red().to_string()
    }
}

/// Markdown rendering of a response.
pub fn envelope_markdown(envelope: &ResponseEnvelope) -> String {
    let mut out = format!("{}\n\n", envelope.text);
    out.push_str(&format!(
        "*{} · confidence {:.2}*\n",
        envelope.kind(),
        envelope.confidence
    ));
    if !envelope.source.attribution.is_empty() {
        out.push_str("\n**Sources**\n\n");
        for a in &envelope.source.attribution {
            let mark = if a.verified { "✓" } else { " " };
            out.push_str(&format!("- [{}] `{}` ({:.2})\n", mark, a.id, a.score));
        }
    }
    if !envelope.suggestions.is_empty() {
        out.push_str("\n**You could also ask about**\n\n");
        for s in &envelope.suggestions {
            out.push_str(&format!("- {}\n", s));
        }
    }
    out
}

/// Print a response in the requested mode.
pub fn print_envelope(envelope: &ResponseEnvelope, mode: OutputMode) {
    match mode {
        OutputMode::Json => output_json(envelope),
        OutputMode::Markdown => print!("{}", envelope_markdown(envelope)),
        OutputMode::Human => {
            println!("{}", envelope.text);
            println!(
                "{}",
                format!("[{} · {}]", envelope.kind(), confidence_label(envelope.confidence))
                    .dimmed()
            );
            if let Some(calc) = &envelope.calculation {
                print_kv("Method", &format!("{:?}", calc.method));
            }
            if envelope.requires_review {
                print_hint("Flagged for review.");
            }
            for s in &envelope.suggestions {
                print_hint(&format!("  • {}", s));
            }
        }
    }
}
