//! Response dispatch: safety gate, intent routing, knowledge answers with
//! verification, calculations, and fallbacks.
//!
//! Each intent maps to an ordered chain of handlers. The first handler that
//! produces an envelope wins; if none does, the confidence-tiered fallback
//! answers. A handler that fails or panics yields the generic fallback.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::math::{self, Method};
use crate::models::envelope::{Attribution, EngineAction, ResponseEnvelope, SourceKind};
use crate::models::intent::{ClassificationResult, Intent};
use crate::models::knowledge::KnowledgeBase;
use crate::models::settings::Settings;
use crate::services::clarification::generate_fallback;
use crate::services::fact_check::{check_claim, ClaimCheck, FactCheckOptions};
use crate::services::index::{search_or_fallback, try_build, KnowledgeIndex, SearchConfig, SearchHit};
use crate::services::safety::{check_safety, policy_envelope};
use crate::session::context::{is_follow_up, ConversationContext};
use crate::utils::math::clamp_unit;
use crate::utils::text::{snippet, tokenize};
use crate::TanyaError;

/// Confidence caps and handler constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub definition_cap: f64,
    pub knowledge_cap: f64,
    pub reasoning_cap: f64,
    pub comparison_cap: f64,
    /// Weight of the fact-check score added to a knowledge answer.
    pub verify_weight: f64,
    /// Confidence of the generic envelope returned after a handler failure.
    pub failure_confidence: f64,
    /// Confidence of the "need better input format" calculation reply.
    pub calculation_failure_confidence: f64,
    pub max_suggestions: usize,
    /// Characters kept from each suggestion or comparison entry.
    pub snippet_chars: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            definition_cap: 0.95,
            knowledge_cap: 0.9,
            reasoning_cap: 0.85,
            comparison_cap: 0.85,
            verify_weight: 0.2,
            failure_confidence: 0.3,
            calculation_failure_confidence: 0.4,
            max_suggestions: 3,
            snippet_chars: 120,
        }
    }
}

/// Everything a handler may look at for one turn.
pub struct Request<'a> {
    pub message: &'a str,
    pub settings: &'a Settings,
    pub context: &'a ConversationContext,
    pub classification: &'a ClassificationResult,
    pub kb: &'a KnowledgeBase,
    pub index: Option<&'a KnowledgeIndex>,
}

pub type HandlerResult = Result<Option<ResponseEnvelope>, TanyaError>;
pub type Handler = fn(&Dispatcher, &Request<'_>) -> HandlerResult;

/// A handler with the name used in logs.
pub type NamedHandler = (&'static str, Handler);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lang {
    En,
    Id,
}

const INDONESIAN_MARKERS: &[&str] = &[
    "apa", "itu", "ini", "saya", "aku", "kamu", "anda", "halo", "hai", "terima", "kasih",
    "makasih", "selamat", "bagaimana", "gimana", "cara", "tolong", "bisa", "yang", "adalah",
    "dan", "tidak", "berapa", "siapa", "kapan", "dimana", "mengapa", "kenapa", "jumpa", "dong",
    "ya", "iya", "sampai", "hitung",
];

fn detect_lang(message: &str) -> Lang {
    let tokens = tokenize(message);
    let hits = tokens
        .iter()
        .filter(|t| INDONESIAN_MARKERS.contains(&t.as_str()))
        .count();
    if hits > 0 && hits * 3 >= tokens.len() {
        Lang::Id
    } else {
        Lang::En
    }
}

fn pick(lang: Lang, en: &str, id: &str) -> String {
    match lang {
        Lang::En => en.to_string(),
        Lang::Id => id.to_string(),
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Routing
// ═════════════════════════════════════════════════════════════════════════════

const GREETING_CHAIN: &[NamedHandler] = &[("greeting", handle_greeting)];
const FAREWELL_CHAIN: &[NamedHandler] = &[("farewell", handle_farewell)];
const THANKS_CHAIN: &[NamedHandler] = &[("thanks", handle_thanks)];
const ABOUT_CHAIN: &[NamedHandler] = &[("about_assistant", handle_about)];
const CONFIRMATION_CHAIN: &[NamedHandler] = &[("confirmation", handle_confirmation)];
const COMMAND_CHAIN: &[NamedHandler] = &[("command", handle_command), ("knowledge", handle_knowledge)];
const COMPLAINT_CHAIN: &[NamedHandler] = &[("complaint", handle_complaint)];
const CALCULATION_CHAIN: &[NamedHandler] = &[("calculation", handle_calculation)];
const DEFINITION_CHAIN: &[NamedHandler] = &[("definition", handle_definition)];
const HOW_TO_CHAIN: &[NamedHandler] = &[("how_to", handle_how_to)];
const COMPARISON_CHAIN: &[NamedHandler] = &[
    ("comparison", handle_comparison),
    ("knowledge", handle_knowledge),
];
const REASONING_CHAIN: &[NamedHandler] = &[
    ("reasoning", handle_reasoning),
    ("knowledge", handle_knowledge),
];
const RE_EXPLAIN_CHAIN: &[NamedHandler] = &[("re_explain", handle_re_explain)];
const KNOWLEDGE_CHAIN: &[NamedHandler] = &[("knowledge", handle_knowledge)];
const UNKNOWN_CHAIN: &[NamedHandler] = &[
    ("calculation_check", handle_calculation_check),
    ("knowledge", handle_knowledge),
];

fn chain_for(intent: Intent) -> &'static [NamedHandler] {
    match intent {
        Intent::Greeting => GREETING_CHAIN,
        Intent::Farewell => FAREWELL_CHAIN,
        Intent::Thanks | Intent::Praise => THANKS_CHAIN,
        Intent::AboutAssistant => ABOUT_CHAIN,
        Intent::Confirmation => CONFIRMATION_CHAIN,
        Intent::Command => COMMAND_CHAIN,
        Intent::Complaint => COMPLAINT_CHAIN,
        Intent::Calculation => CALCULATION_CHAIN,
        Intent::Definition => DEFINITION_CHAIN,
        Intent::HowTo => HOW_TO_CHAIN,
        Intent::Comparison => COMPARISON_CHAIN,
        Intent::ComplexReasoning | Intent::Analysis => REASONING_CHAIN,
        Intent::Clarification => RE_EXPLAIN_CHAIN,
        Intent::SimpleFactual
        | Intent::Request
        | Intent::Concern
        | Intent::Correction
        | Intent::Prediction
        | Intent::Suggestion => KNOWLEDGE_CHAIN,
        Intent::Unknown => UNKNOWN_CHAIN,
    }
}

/// Produces the response envelope for a classified message.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    config: DispatcherConfig,
    search: SearchConfig,
    fact_check: FactCheckOptions,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig, search: SearchConfig, fact_check: FactCheckOptions) -> Self {
        Self {
            config,
            search,
            fact_check,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Answer one message. Never fails: handler errors and panics become the
    /// generic fallback envelope.
    pub fn respond(&self, request: &Request<'_>) -> ResponseEnvelope {
        if let Some(violation) = check_safety(request.message) {
            warn!(kind = %violation.kind, rule = violation.rule, "Message blocked by safety gate");
            return policy_envelope(&violation);
        }

        let chain = chain_for(request.classification.intent);
        self.run_chain(chain, request)
            .unwrap_or_else(|| self.fallback(request))
    }

    /// Run handlers in order until one answers. `Some` is returned for an
    /// answer or a failure envelope; `None` when every handler passed.
    pub fn run_chain(
        &self,
        chain: &[NamedHandler],
        request: &Request<'_>,
    ) -> Option<ResponseEnvelope> {
        for (name, handler) in chain {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(self, request))) {
                Ok(Ok(Some(envelope))) => {
                    debug!(handler = *name, kind = %envelope.kind(), confidence = envelope.confidence, "handler answered");
                    return Some(envelope);
                }
                Ok(Ok(None)) => continue,
                Ok(Err(e)) => {
                    warn!(handler = *name, error = %e, "Response handler failed");
                    return Some(self.failure_envelope(request));
                }
                Err(_) => {
                    warn!(handler = *name, "Response handler panicked");
                    return Some(self.failure_envelope(request));
                }
            }
        }
        None
    }

    fn failure_envelope(&self, request: &Request<'_>) -> ResponseEnvelope {
        let text = pick(
            detect_lang(request.message),
            "Sorry, something went wrong while preparing an answer. Could you try asking in a different way?",
            "Maaf, terjadi kesalahan saat menyiapkan jawaban. Bisakah Anda bertanya dengan cara lain?",
        );
        ResponseEnvelope::new(SourceKind::Fallback, text, self.config.failure_confidence)
            .with_source_id("fallback.failure")
    }

    fn fallback(&self, request: &Request<'_>) -> ResponseEnvelope {
        let confidence = request.classification.confidence;
        let fallback = generate_fallback(request.message, confidence);
        debug!(tier = ?fallback.tier, "No handler answered, using fallback");
        ResponseEnvelope::new(SourceKind::Fallback, fallback.text, confidence.min(0.5))
            .with_source_id(format!("fallback.{}", fallback.tier.as_str()))
            .with_suggestions(vec![fallback.suggestion])
            .with_follow_up(true)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Knowledge helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// The query used for retrieval. Follow-ups borrow topics from the
    /// conversation so "and the price?" still finds something.
    fn retrieval_query(&self, request: &Request<'_>) -> String {
        let ctx = request.context;
        let follow_up = is_follow_up(
            request.message,
            ctx.last_user_message(),
            &ctx.recent_intents(),
        );
        if follow_up && !ctx.topics().is_empty() {
            format!("{} {}", request.message, ctx.topics().join(" "))
        } else {
            request.message.to_string()
        }
    }

    fn hits(&self, request: &Request<'_>) -> Vec<SearchHit> {
        let query = self.retrieval_query(request);
        let (hits, mode) = search_or_fallback(request.index, request.kb, &query, self.search.top_n);
        debug!(?mode, hits = hits.len(), "knowledge retrieval");
        hits.into_iter()
            .filter(|h| h.score >= self.search.min_score)
            .collect()
    }

    /// Fact-check the user's message against the knowledge base.
    fn verify(&self, claim: &str, kb: &KnowledgeBase) -> ClaimCheck {
        check_claim(claim, kb, &self.fact_check)
    }

    /// Supporting entries of a claim check as attribution.
    fn attribution(&self, check: &ClaimCheck) -> Vec<Attribution> {
        check
            .sources
            .iter()
            .map(|s| Attribution {
                id: s.id.clone(),
                section: s.section.clone(),
                score: s.score,
                verified: s.score >= self.fact_check.threshold,
            })
            .collect()
    }

    /// Verification credit for one answer entry: its score in the claim
    /// check when it clears the threshold, otherwise 0.
    fn verify_score(&self, check: &ClaimCheck, id: &str) -> f64 {
        check
            .sources
            .iter()
            .find(|s| s.id == id)
            .filter(|s| s.score >= self.fact_check.threshold)
            .map_or(0.0, |s| clamp_unit(s.score))
    }

    fn blend(&self, kb_confidence: f64, verify_score: f64, cap: f64) -> f64 {
        (kb_confidence + verify_score * self.config.verify_weight).min(cap)
    }

    fn suggestions(&self, hits: &[SearchHit]) -> Vec<String> {
        hits.iter()
            .take(self.config.max_suggestions)
            .map(|h| snippet(&h.text, self.config.snippet_chars))
            .collect()
    }

    fn related_topic_hint(&self, request: &Request<'_>, used: &HashSet<&str>, lang: Lang) -> Option<String> {
        let section = request.kb.section_names().find(|s| !used.contains(s))?;
        Some(match lang {
            Lang::En => format!("You might also want to ask about {}.", section),
            Lang::Id => format!("Anda mungkin juga ingin bertanya tentang {}.", section),
        })
    }

    /// Answer from the best hit. `base` is the confidence floor before the
    /// retrieval score is added.
    fn single_answer(
        &self,
        request: &Request<'_>,
        kind: SourceKind,
        base: f64,
        cap: f64,
    ) -> HandlerResult {
        let hits = self.hits(request);
        let Some((best, rest)) = hits.split_first() else {
            return Ok(None);
        };
        let lang = detect_lang(request.message);

        let kb_confidence = clamp_unit(base + 0.4 * best.score);
        let check = self.verify(request.message, request.kb);
        let confidence = self.blend(kb_confidence, self.verify_score(&check, &best.id), cap);
        let attribution = self.attribution(&check);

        let mut text = best.text.clone();
        if request.settings.creative_mode {
            let used: HashSet<&str> = hits.iter().map(|h| h.meta.section.as_str()).collect();
            if let Some(hint) = self.related_topic_hint(request, &used, lang) {
                text = format!("{}\n\n{}", text, hint);
            }
        }

        Ok(Some(
            ResponseEnvelope::new(kind, text, confidence)
                .with_source_id(best.id.clone())
                .with_attribution(attribution)
                .with_suggestions(self.suggestions(rest))
                .with_follow_up(request.classification.follow_up_suggested || !rest.is_empty()),
        ))
    }
}

/// One-shot dispatch with default settings: the index is built from `kb` for
/// this call.
pub fn respond(
    message: &str,
    settings: &Settings,
    context: &ConversationContext,
    classification: &ClassificationResult,
    kb: &KnowledgeBase,
) -> ResponseEnvelope {
    let index = try_build(kb).ok();
    Dispatcher::default().respond(&Request {
        message,
        settings,
        context,
        classification,
        kb,
        index: index.as_ref(),
    })
}

// ═════════════════════════════════════════════════════════════════════════════
// Handlers
// ═════════════════════════════════════════════════════════════════════════════

fn handle_greeting(_: &Dispatcher, req: &Request<'_>) -> HandlerResult {
    let text = pick(
        detect_lang(req.message),
        "Hello! How can I help you today?",
        "Halo! Ada yang bisa saya bantu?",
    );
    Ok(Some(
        ResponseEnvelope::new(SourceKind::Greeting, text, 0.95).with_follow_up(true),
    ))
}

fn handle_farewell(_: &Dispatcher, req: &Request<'_>) -> HandlerResult {
    let text = pick(
        detect_lang(req.message),
        "Goodbye! Feel free to come back any time.",
        "Sampai jumpa! Silakan kembali kapan saja.",
    );
    Ok(Some(ResponseEnvelope::new(SourceKind::Farewell, text, 0.95)))
}

fn handle_thanks(_: &Dispatcher, req: &Request<'_>) -> HandlerResult {
    let lang = detect_lang(req.message);
    let (text, confidence) = if req.classification.intent == Intent::Praise {
        (
            pick(
                lang,
                "Thank you, glad it helped! Anything else?",
                "Terima kasih, senang bisa membantu! Ada lagi?",
            ),
            0.9,
        )
    } else {
        (
            pick(
                lang,
                "You're welcome! Let me know if there's anything else.",
                "Sama-sama! Kabari saya jika ada yang lain.",
            ),
            0.95,
        )
    };
    Ok(Some(
        ResponseEnvelope::new(SourceKind::Thanks, text, confidence).with_follow_up(true),
    ))
}

fn handle_about(_: &Dispatcher, req: &Request<'_>) -> HandlerResult {
    let topics: Vec<&str> = req.kb.section_names().take(5).collect();
    let lang = detect_lang(req.message);
    let mut text = pick(
        lang,
        "I'm Tanya, an assistant that answers from a local knowledge base. I can also do calculations, including integrals and derivatives.",
        "Saya Tanya, asisten yang menjawab dari basis pengetahuan lokal. Saya juga bisa berhitung, termasuk integral dan turunan.",
    );
    if !topics.is_empty() {
        let list = topics.join(", ");
        text = match lang {
            Lang::En => format!("{} Topics I know about: {}.", text, list),
            Lang::Id => format!("{} Topik yang saya ketahui: {}.", text, list),
        };
    }
    Ok(Some(
        ResponseEnvelope::new(SourceKind::Assistant, text, 0.95).with_follow_up(true),
    ))
}

fn handle_confirmation(_: &Dispatcher, req: &Request<'_>) -> HandlerResult {
    let lang = detect_lang(req.message);
    let envelope = match req.context.pending_question() {
        Some(question) => ResponseEnvelope::new(
            SourceKind::Confirmation,
            pick(lang, "Got it, thanks for confirming.", "Baik, terima kasih atas konfirmasinya."),
            0.85,
        )
        .with_source_id(question.id.clone()),
        None => ResponseEnvelope::new(
            SourceKind::Confirmation,
            pick(lang, "Okay. What would you like to do next?", "Oke. Apa yang ingin Anda lakukan selanjutnya?"),
            0.6,
        )
        .with_follow_up(true),
    };
    Ok(Some(envelope))
}

const RESET_WORDS: &[&str] = &[
    "clear", "reset", "restart", "over", "new", "hapus", "bersihkan", "ulang", "ulangi", "baru",
];

fn handle_command(_: &Dispatcher, req: &Request<'_>) -> HandlerResult {
    let wants_reset = tokenize(req.message)
        .iter()
        .any(|t| RESET_WORDS.contains(&t.as_str()));
    if !wants_reset {
        return Ok(None);
    }
    let text = pick(
        detect_lang(req.message),
        "Okay, I've cleared our conversation. What would you like to talk about?",
        "Baik, percakapan kita sudah saya hapus. Apa yang ingin Anda bicarakan?",
    );
    Ok(Some(
        ResponseEnvelope::new(SourceKind::Command, text, 0.95)
            .with_source_id("command.clear_context")
            .with_action(EngineAction::ClearContext),
    ))
}

fn handle_complaint(d: &Dispatcher, req: &Request<'_>) -> HandlerResult {
    let lang = detect_lang(req.message);
    let text = pick(
        lang,
        "I'm sorry about the trouble. I've flagged this conversation so someone can follow up.",
        "Mohon maaf atas kendalanya. Percakapan ini sudah saya tandai agar dapat ditindaklanjuti.",
    );
    let suggestions = d.suggestions(&d.hits(req));
    Ok(Some(
        ResponseEnvelope::new(SourceKind::Complaint, text, 0.8)
            .with_review()
            .with_suggestions(suggestions)
            .with_follow_up(true),
    ))
}

fn calculation_confidence(method: &Method) -> f64 {
    match method {
        Method::Direct | Method::Symbolic { .. } => 0.95,
        Method::Simpson { .. } => 0.9,
        Method::FiniteDifference { .. } => 0.85,
    }
}

fn handle_calculation(d: &Dispatcher, req: &Request<'_>) -> HandlerResult {
    match math::solve(req.message, req.settings.calculation_precision) {
        Some(calculation) => {
            let confidence = calculation_confidence(&calculation.method);
            Ok(Some(
                ResponseEnvelope::new(SourceKind::Calculation, calculation.summary(), confidence)
                    .with_source_id(format!("math.{}", calculation.mode.as_str()))
                    .with_calculation(calculation),
            ))
        }
        None => {
            let text = pick(
                detect_lang(req.message),
                "I couldn't work that out. I need a better input format, for example \"2 + 3 * 4\", \"integral x^2 from 0 to 1\" or \"derivative sin(x) at 0\".",
                "Saya belum bisa menghitungnya. Saya butuh format input yang lebih jelas, misalnya \"2 + 3 * 4\", \"integral x^2 dari 0 sampai 1\" atau \"turunan sin(x) pada 0\".",
            );
            Ok(Some(
                ResponseEnvelope::new(
                    SourceKind::Calculation,
                    text,
                    d.config.calculation_failure_confidence,
                )
                .with_source_id("math.unparsed")
                .with_follow_up(true),
            ))
        }
    }
}

/// Unclassified input may still be a bare expression like `12*7`.
fn handle_calculation_check(d: &Dispatcher, req: &Request<'_>) -> HandlerResult {
    if math::solve(req.message, req.settings.calculation_precision).is_none() {
        return Ok(None);
    }
    handle_calculation(d, req)
}

fn handle_definition(d: &Dispatcher, req: &Request<'_>) -> HandlerResult {
    d.single_answer(req, SourceKind::Definition, 0.55, d.config.definition_cap)
}

fn handle_how_to(d: &Dispatcher, req: &Request<'_>) -> HandlerResult {
    d.single_answer(req, SourceKind::HowTo, 0.5, d.config.knowledge_cap)
}

fn handle_knowledge(d: &Dispatcher, req: &Request<'_>) -> HandlerResult {
    d.single_answer(req, SourceKind::Knowledge, 0.5, d.config.knowledge_cap)
}

/// Put several relevant entries together for multi-part questions.
fn handle_reasoning(d: &Dispatcher, req: &Request<'_>) -> HandlerResult {
    let hits = d.hits(req);
    if hits.len() < 2 {
        return Ok(None);
    }
    let lang = detect_lang(req.message);
    let header = pick(
        lang,
        "Here is what I found that bears on your question:",
        "Berikut informasi yang relevan dengan pertanyaan Anda:",
    );
    let check = d.verify(req.message, req.kb);
    let mut lines = vec![header];
    let mut verify_total = 0.0;
    for hit in &hits {
        lines.push(format!("- {}", hit.text));
        verify_total += d.verify_score(&check, &hit.id);
    }
    let attribution = d.attribution(&check);
    let avg_score = hits.iter().map(|h| h.score).sum::<f64>() / hits.len() as f64;
    let avg_verify = verify_total / hits.len() as f64;
    let confidence = d.blend(clamp_unit(0.45 + 0.4 * avg_score), avg_verify, d.config.reasoning_cap);

    Ok(Some(
        ResponseEnvelope::new(SourceKind::Reasoning, lines.join("\n"), confidence)
            .with_source_id(hits[0].id.clone())
            .with_attribution(attribution)
            .with_follow_up(true),
    ))
}

/// Side-by-side view of the entries the message mentions.
fn handle_comparison(d: &Dispatcher, req: &Request<'_>) -> HandlerResult {
    let hits = d.hits(req);
    let mut seen = HashSet::new();
    let distinct: Vec<&SearchHit> = hits
        .iter()
        .filter(|h| seen.insert(h.id.as_str()))
        .collect();
    if distinct.len() < 2 {
        return Ok(None);
    }
    let lang = detect_lang(req.message);
    let mut lines = vec![pick(lang, "Comparison:", "Perbandingan:")];
    for hit in &distinct {
        let label = hit.meta.key.as_deref().unwrap_or(&hit.meta.section);
        lines.push(format!("• {}: {}", label, snippet(&hit.text, d.config.snippet_chars)));
    }
    let attribution = distinct
        .iter()
        .map(|h| Attribution {
            id: h.id.clone(),
            section: h.meta.section.clone(),
            score: h.score,
            verified: h.score >= d.fact_check.threshold,
        })
        .collect();
    let avg_score = distinct.iter().map(|h| h.score).sum::<f64>() / distinct.len() as f64;
    let confidence = clamp_unit(0.5 + 0.4 * avg_score).min(d.config.comparison_cap);

    Ok(Some(
        ResponseEnvelope::new(SourceKind::Comparison, lines.join("\n"), confidence)
            .with_source_id(distinct[0].id.clone())
            .with_attribution(attribution)
            .with_follow_up(true),
    ))
}

/// "What do you mean?": answer the previous user question again, phrased as
/// a clarification.
fn handle_re_explain(d: &Dispatcher, req: &Request<'_>) -> HandlerResult {
    let Some(previous) = req.context.last_user_message() else {
        return Ok(None);
    };
    let retarget = Request {
        message: previous,
        settings: req.settings,
        context: req.context,
        classification: req.classification,
        kb: req.kb,
        index: req.index,
    };
    let Some(answer) = d.single_answer(&retarget, SourceKind::Knowledge, 0.45, d.config.knowledge_cap)? else {
        return Ok(None);
    };
    let prefix = pick(detect_lang(req.message), "To put it another way:", "Dengan kata lain:");
    let ResponseEnvelope {
        text,
        source,
        confidence,
        suggestions,
        ..
    } = answer;
    let mut envelope = ResponseEnvelope::new(
        SourceKind::Knowledge,
        format!("{} {}", prefix, text),
        confidence,
    )
    .with_attribution(source.attribution)
    .with_suggestions(suggestions)
    .with_follow_up(true);
    if let Some(id) = source.id {
        envelope = envelope.with_source_id(id);
    }
    Ok(Some(envelope))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::knowledge::KbValue;
    use crate::services::classifier::classify;
    use crate::services::index::build_index;
    use std::collections::BTreeMap;

    fn kb() -> KnowledgeBase {
        KnowledgeBase::new()
            .with_section(
                "AI",
                KbValue::Map(BTreeMap::from([
                    (
                        "concept1".to_string(),
                        "Kecerdasan buatan adalah simulasi kecerdasan manusia oleh mesin".to_string(),
                    ),
                    (
                        "machine_learning".to_string(),
                        "Machine learning lets software improve from data without explicit rules".to_string(),
                    ),
                ])),
            )
            .with_section(
                "billing",
                KbValue::Map(BTreeMap::from([
                    (
                        "invoice".to_string(),
                        "Invoices are emailed on the first day of every month".to_string(),
                    ),
                    (
                        "refund".to_string(),
                        "Refunds are processed within five business days".to_string(),
                    ),
                ])),
            )
    }

    fn answer(message: &str, settings: &Settings) -> ResponseEnvelope {
        let ctx = ConversationContext::new();
        let classification = classify(message, &ctx);
        respond(message, settings, &ctx, &classification, &kb())
    }

    #[test]
    fn test_definition_is_attributed() {
        let env = answer("Apa itu kecerdasan buatan?", &Settings::default());
        assert_eq!(env.kind(), SourceKind::Definition);
        assert!(env.confidence > 0.6);
        assert!(env.confidence <= 0.95);
        assert!(!env.source.attribution.is_empty());
        assert_eq!(env.source.id.as_deref(), Some("AI.concept1"));
    }

    #[test]
    fn test_safety_runs_before_routing() {
        let env = answer("what is 4111111111111111", &Settings::default());
        assert_eq!(env.kind(), SourceKind::Policy);
        assert_eq!(env.confidence, 1.0);
        assert!(env.requires_review);
    }

    #[test]
    fn test_calculation_envelope() {
        let env = answer("what is 2 + 2", &Settings::default());
        assert_eq!(env.kind(), SourceKind::Calculation);
        assert_eq!(env.calculation.as_ref().map(|c| c.formatted.as_str()), Some("4"));
    }

    #[test]
    fn test_unparseable_calculation_degrades() {
        let env = answer("calculate 2 +* / 3", &Settings::default());
        assert_eq!(env.kind(), SourceKind::Calculation);
        assert_eq!(env.confidence, 0.4);
        assert!(env.calculation.is_none());
        assert!(env.text.contains("better input format"));
    }

    #[test]
    fn test_greeting_follows_language() {
        assert_eq!(
            answer("halo", &Settings::default()).text,
            "Halo! Ada yang bisa saya bantu?"
        );
        assert_eq!(
            answer("hello", &Settings::default()).text,
            "Hello! How can I help you today?"
        );
    }

    #[test]
    fn test_clear_command_sets_action() {
        let env = answer("reset", &Settings::default());
        assert_eq!(env.kind(), SourceKind::Command);
        assert_eq!(env.action, Some(EngineAction::ClearContext));
    }

    #[test]
    fn test_complaint_requires_review() {
        let env = answer("the invoice page is broken again", &Settings::default());
        assert_eq!(env.kind(), SourceKind::Complaint);
        assert!(env.requires_review);
    }

    #[test]
    fn test_creative_mode_adds_related_topic() {
        let plain = answer("Apa itu kecerdasan buatan?", &Settings::default());
        let creative = answer(
            "Apa itu kecerdasan buatan?",
            &Settings::default().with_creative_mode(true),
        );
        assert!(creative.text.starts_with(&plain.text));
        assert!(creative.text.contains("billing"));
    }

    #[test]
    fn test_nothing_found_falls_back() {
        let env = answer("zxqv wplk", &Settings::default());
        assert_eq!(env.kind(), SourceKind::Fallback);
        assert_eq!(env.suggestions.len(), 1);
        assert!(env.confidence <= 0.5);
    }

    fn failing(_: &Dispatcher, _: &Request<'_>) -> HandlerResult {
        Err(TanyaError::Validation("boom".into()))
    }

    fn panicking(_: &Dispatcher, _: &Request<'_>) -> HandlerResult {
        panic!("handler bug")
    }

    fn passing(_: &Dispatcher, _: &Request<'_>) -> HandlerResult {
        Ok(None)
    }

    fn request_parts() -> (KnowledgeBase, ConversationContext, ClassificationResult, Settings) {
        (
            kb(),
            ConversationContext::new(),
            ClassificationResult::unknown(0.1),
            Settings::default(),
        )
    }

    #[test]
    fn test_handler_error_becomes_generic_fallback() {
        let (kb, ctx, cls, settings) = request_parts();
        let index = build_index(&kb);
        let req = Request {
            message: "anything",
            settings: &settings,
            context: &ctx,
            classification: &cls,
            kb: &kb,
            index: Some(&index),
        };
        let d = Dispatcher::default();
        let env = d.run_chain(&[("pass", passing as Handler), ("fail", failing as Handler)], &req).unwrap();
        assert_eq!(env.kind(), SourceKind::Fallback);
        assert_eq!(env.confidence, 0.3);
    }

    #[test]
    fn test_handler_panic_is_contained() {
        let (kb, ctx, cls, settings) = request_parts();
        let req = Request {
            message: "anything",
            settings: &settings,
            context: &ctx,
            classification: &cls,
            kb: &kb,
            index: None,
        };
        let env = Dispatcher::default()
            .run_chain(&[("panic", panicking as Handler)], &req)
            .unwrap();
        assert_eq!(env.confidence, 0.3);
    }

    #[test]
    fn test_empty_chain_answers_nothing() {
        let (kb, ctx, cls, settings) = request_parts();
        let req = Request {
            message: "anything",
            settings: &settings,
            context: &ctx,
            classification: &cls,
            kb: &kb,
            index: None,
        };
        assert!(Dispatcher::default().run_chain(&[("pass", passing as Handler)], &req).is_none());
    }

    #[test]
    fn test_verification_follows_the_question() {
        let kb = kb();
        let d = Dispatcher::default();
        let score = |claim: &str| d.verify_score(&d.verify(claim, &kb), "AI.machine_learning");

        let close = score("machine learning lets software improve from data");
        let loose = score("what is machine learning");
        assert!(close > loose, "{} <= {}", close, loose);
        assert!(close <= 1.0);
        assert_eq!(score("invoice schedule"), 0.0);
    }

    #[test]
    fn test_language_detection() {
        assert_eq!(detect_lang("Apa itu kecerdasan buatan?"), Lang::Id);
        assert_eq!(detect_lang("What is machine learning?"), Lang::En);
    }
}
