//! Inspection commands: classification, search, claim checks and math.

use anyhow::Result;
use serde::Serialize;

use crate::cli::output::{
    output_json, print_header, print_hint, print_kv, print_table, OutputMode,
};
use crate::init::AppContext;
use crate::math::{solve, Precision};
use crate::services::fact_check::{check_claim, FactCheckOptions};
use crate::services::index::search_or_fallback;
use crate::utils::text::snippet;

pub fn handle_classify(ctx: &AppContext, text: &str, mode: OutputMode) -> Result<()> {
    let result = ctx.engine.classify(text, &ctx.session.state.context);

    if mode == OutputMode::Json {
        output_json(&result);
        return Ok(());
    }

    print_header(&format!("Intent: {}", result.intent));
    print_kv("Confidence", &format!("{:.3}", result.confidence));
    print_kv(
        "Complexity",
        &format!(
            "{:.2}{}",
            result.complexity.score,
            if result.complexity.is_complex { " (complex)" } else { "" }
        ),
    );
    if !result.topics.is_empty() {
        print_kv("Topics", &result.topics.join(", "));
    }
    if !result.entities.is_empty() {
        let entities: Vec<String> = result.entities.iter().map(|e| e.text.clone()).collect();
        print_kv("Entities", &entities.join(", "));
    }

    let rows: Vec<Vec<String>> = result
        .breakdown
        .iter()
        .map(|s| {
            vec![
                s.name.clone(),
                s.intent.to_string(),
                format!("{:.3}", s.confidence),
                format!("{:.2}", s.weight),
            ]
        })
        .collect();
    println!();
    print_table(&["Signal", "Intent", "Confidence", "Weight"], rows);
    Ok(())
}

pub fn handle_search(ctx: &AppContext, query: &str, limit: usize, mode: OutputMode) -> Result<()> {
    let index = ctx.engine.index().current();
    let (hits, search_mode) =
        search_or_fallback(index.as_deref(), ctx.engine.knowledge(), query, limit);

    if mode == OutputMode::Json {
        #[derive(Serialize)]
        struct SearchJson<'a, H> {
            query: &'a str,
            mode: crate::services::index::SearchMode,
            results: H,
        }
        output_json(&SearchJson {
            query,
            mode: search_mode,
            results: &hits,
        });
        return Ok(());
    }

    println!("Query: {} | {:?} | {} results\n", query, search_mode, hits.len());
    let rows: Vec<Vec<String>> = hits
        .iter()
        .map(|h| vec![h.id.clone(), format!("{:.4}", h.score), snippet(&h.text, 70)])
        .collect();
    print_table(&["ID", "Score", "Text"], rows);
    if hits.is_empty() {
        print_hint("Nothing matched. Try other keywords.");
    }
    Ok(())
}

pub fn handle_check(
    ctx: &AppContext,
    claim: &str,
    threshold: Option<f64>,
    top_n: Option<usize>,
    mode: OutputMode,
) -> Result<()> {
    let base = &ctx.engine.config().fact_check;
    let opts = FactCheckOptions {
        threshold: threshold.unwrap_or(base.threshold),
        top_n: top_n.unwrap_or(base.top_n),
        ..base.clone()
    };
    let check = check_claim(claim, ctx.engine.knowledge(), &opts);

    if mode == OutputMode::Json {
        output_json(&check);
        return Ok(());
    }

    let verdict = if check.verified { "verified" } else { "not verified" };
    print_header(&format!("Claim {}", verdict));
    print_kv("Score", &format!("{:.3}", check.score));
    print_kv("Confidence", &format!("{:.3}", check.confidence));
    let rows: Vec<Vec<String>> = check
        .sources
        .iter()
        .map(|s| vec![s.id.clone(), format!("{:.4}", s.score), snippet(&s.text, 70)])
        .collect();
    println!();
    print_table(&["Source", "Score", "Text"], rows);
    Ok(())
}

pub fn handle_math(expression: &str, precision: Precision, mode: OutputMode) -> Result<()> {
    let Some(calculation) = solve(expression, precision) else {
        anyhow::bail!(
            "could not evaluate '{}'; try \"2 + 3 * 4\", \"integral x^2 from 0 to 1\" or \"derivative sin(x) at 0\"",
            expression
        );
    };

    if mode == OutputMode::Json {
        output_json(&calculation);
        return Ok(());
    }
    println!("{}", calculation.summary());
    Ok(())
}
