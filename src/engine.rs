//! Per-conversation engine: owns the knowledge base, its index and the
//! configured services, and runs one user turn end to end.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::models::clarification::ClarificationSituation;
use crate::models::envelope::{EngineAction, ResponseEnvelope, SourceKind};
use crate::models::intent::{ClassificationResult, Intent};
use crate::models::knowledge::KnowledgeBase;
use crate::models::settings::Settings;
use crate::services::clarification::{
    detect, detect_unclear_intent, generate_prompt, parse_user_clarification,
};
use crate::services::classifier::IntentClassifier;
use crate::services::dispatcher::{Dispatcher, Request};
use crate::services::index::IndexHandle;
use crate::services::safety::check_safety;
use crate::session::context::{infer_question_kind, ConversationContext, Turn};
use crate::TanyaError;

/// Issues monotonically increasing turn ids.
#[derive(Debug, Default)]
pub struct TurnTracker {
    latest: AtomicU64,
}

impl TurnTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start at `last` so ids keep increasing across process restarts.
    pub fn starting_after(last: u64) -> Self {
        Self {
            latest: AtomicU64::new(last),
        }
    }

    pub fn next(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    /// Err unless `turn_id` is the most recently issued id.
    pub fn ensure_current(&self, turn_id: u64) -> Result<(), TanyaError> {
        let latest = self.latest();
        if turn_id == latest {
            Ok(())
        } else {
            Err(TanyaError::StaleTurn { turn_id, latest })
        }
    }
}

/// One labelled message, captured for later training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub input: String,
    pub intent: Intent,
    pub confidence: f64,
    pub source_kind: SourceKind,
    pub timestamp: DateTime<Utc>,
}

/// A computed turn that has not been applied to the conversation yet.
#[derive(Debug, Clone)]
pub struct TurnDraft {
    pub turn_id: u64,
    pub timestamp: DateTime<Utc>,
    /// The message as the user typed it.
    pub message: String,
    /// The message actually answered; differs after a clarification reply.
    pub query: String,
    /// The context had expired and must be cleared before this turn lands.
    pub expired: bool,
    pub envelope: ResponseEnvelope,
    pub classification: ClassificationResult,
    /// Set when the envelope is a clarification prompt.
    pub clarification: Option<ClarificationSituation>,
    pub training: Option<TrainingExample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub turn_id: u64,
    pub envelope: ResponseEnvelope,
    pub classification: ClassificationResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarification: Option<ClarificationSituation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training: Option<TrainingExample>,
}

/// Runs turns for one conversation.
pub struct Engine {
    config: EngineConfig,
    kb: KnowledgeBase,
    index: IndexHandle,
    classifier: IntentClassifier,
    dispatcher: Dispatcher,
    tracker: TurnTracker,
}

impl Engine {
    pub fn new(config: EngineConfig, kb: KnowledgeBase) -> Self {
        let index = IndexHandle::from_knowledge(&kb);
        let classifier = IntentClassifier::new(config.classifier.clone()).with_knowledge(&kb);
        let dispatcher = Dispatcher::new(
            config.dispatcher.clone(),
            config.search.clone(),
            config.fact_check.clone(),
        );
        info!(
            documents = kb.document_count(),
            indexed = index.is_ready(),
            "Engine ready"
        );
        Self {
            config,
            kb,
            index,
            classifier,
            dispatcher,
            tracker: TurnTracker::new(),
        }
    }

    /// Continue turn numbering from a persisted session.
    pub fn with_turn_counter(mut self, last_turn_id: u64) -> Self {
        self.tracker = TurnTracker::starting_after(last_turn_id);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.kb
    }

    pub fn index(&self) -> &IndexHandle {
        &self.index
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    pub fn last_turn_id(&self) -> u64 {
        self.tracker.latest()
    }

    /// An empty context using the configured limits.
    pub fn new_context(&self) -> ConversationContext {
        ConversationContext::with_config(self.config.context.clone())
    }

    /// Swap in a new knowledge base and rebuild the index. When the new base
    /// cannot be indexed, search degrades to substring matching.
    pub fn replace_knowledge(&mut self, kb: KnowledgeBase) {
        if let Err(e) = self.index.rebuild(&kb) {
            warn!("Index rebuild failed, using fallback search: {}", e);
            self.index.clear();
        }
        self.classifier.set_knowledge(&kb);
        self.kb = kb;
        info!(documents = self.kb.document_count(), "Knowledge base replaced");
    }

    /// Classify a message against the current knowledge base.
    pub fn classify(&self, message: &str, context: &ConversationContext) -> ClassificationResult {
        self.classifier.classify(message, context)
    }

    pub fn prepare_turn(&self) -> u64 {
        self.tracker.next()
    }

    /// Compute the response for `message` without touching the conversation.
    pub fn draft_turn(
        &self,
        turn_id: u64,
        message: &str,
        context: &ConversationContext,
        pending: Option<&ClarificationSituation>,
        settings: &Settings,
    ) -> TurnDraft {
        let now = Utc::now();
        let expired = !context.is_valid_at(now);
        let fresh;
        let (context, pending) = if expired {
            debug!("Conversation expired, starting fresh");
            fresh = self.new_context();
            (&fresh, None)
        } else {
            (context, pending)
        };

        let mut query = message.trim().to_string();
        let mut answered_clarification = false;
        if let Some(situation) = pending {
            let parsed = parse_user_clarification(message, situation);
            if let Some(resolved) = parsed.resolve_query(situation) {
                debug!(kind = %situation.kind, resolved = %resolved, "Clarification answered");
                query = resolved;
                answered_clarification = true;
            }
        }

        let classification = self.classifier.classify(&query, context);

        let clarification = if answered_clarification || check_safety(&query).is_some() {
            None
        } else {
            self.clarification_for(&query, context, &classification)
        };

        let envelope = match &clarification {
            Some(situation) => clarification_envelope(situation),
            None => self.dispatcher.respond(&Request {
                message: &query,
                settings,
                context,
                classification: &classification,
                kb: &self.kb,
                index: self.index.current().as_deref(),
            }),
        };

        let training = settings.auto_training_trigger.then(|| TrainingExample {
            input: message.to_string(),
            intent: classification.intent,
            confidence: classification.confidence,
            source_kind: envelope.kind(),
            timestamp: now,
        });

        TurnDraft {
            turn_id,
            timestamp: now,
            message: message.to_string(),
            query,
            expired,
            envelope,
            classification,
            clarification,
            training,
        }
    }

    /// A clarification is asked only when it is more certain than the
    /// classification, and never for social turns, calculations or commands.
    fn clarification_for(
        &self,
        query: &str,
        context: &ConversationContext,
        classification: &ClassificationResult,
    ) -> Option<ClarificationSituation> {
        let intent = classification.intent;
        if intent.is_social() || matches!(intent, Intent::Calculation | Intent::Command) {
            return None;
        }
        let situation = detect(query, context, &self.kb).or_else(|| {
            detect_unclear_intent(
                query,
                classification,
                self.config.classifier.unknown_threshold,
            )
        })?;
        (situation.confidence > classification.confidence).then_some(situation)
    }

    /// Apply a draft to the conversation. Fails when a newer turn has been
    /// prepared since the draft's; the conversation is then left untouched.
    pub fn commit_turn(
        &self,
        draft: TurnDraft,
        context: &mut ConversationContext,
        pending: &mut Option<ClarificationSituation>,
    ) -> Result<TurnOutcome, TanyaError> {
        self.tracker.ensure_current(draft.turn_id)?;

        if draft.expired {
            context.clear();
        }

        if draft.classification.intent == Intent::Confirmation {
            if let Some(id) = context.pending_question().map(|q| q.id.clone()) {
                context.resolve_question(&id);
            }
        }

        let entities = draft
            .classification
            .entities
            .iter()
            .map(|e| e.text.clone())
            .collect();
        context.add_turn(
            Turn::user(draft.query.clone(), draft.timestamp)
                .with_intent(draft.classification.intent)
                .with_entities(entities)
                .with_topics(draft.classification.topics.clone()),
        );
        context.add_turn(Turn::assistant(draft.envelope.text.clone(), draft.timestamp));

        let question = draft.envelope.text.trim_end();
        if question.ends_with('?') {
            context.add_unresolved_question(question, infer_question_kind(question), draft.timestamp);
        }

        if draft.envelope.action == Some(EngineAction::ClearContext) {
            context.clear();
        }
        *pending = draft.clarification.clone();

        Ok(TurnOutcome {
            turn_id: draft.turn_id,
            envelope: draft.envelope,
            classification: draft.classification,
            clarification: draft.clarification,
            training: draft.training,
        })
    }

    /// Run one turn: draft it and apply it to the conversation.
    pub fn handle_turn(
        &self,
        message: &str,
        context: &mut ConversationContext,
        pending: &mut Option<ClarificationSituation>,
        settings: &Settings,
    ) -> Result<TurnOutcome, TanyaError> {
        let turn_id = self.prepare_turn();
        let draft = self.draft_turn(turn_id, message, context, pending.as_ref(), settings);
        self.commit_turn(draft, context, pending)
    }
}

fn clarification_envelope(situation: &ClarificationSituation) -> ResponseEnvelope {
    ResponseEnvelope::new(
        SourceKind::Clarification,
        generate_prompt(situation),
        situation.confidence,
    )
    .with_source_id(format!(
        "clarification.{}",
        situation.kind.as_str().to_lowercase()
    ))
    .with_suggestions(situation.data.options.clone())
    .with_follow_up(true)
}
