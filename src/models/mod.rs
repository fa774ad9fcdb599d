pub mod clarification;
pub mod envelope;
pub mod intent;
pub mod knowledge;
pub mod settings;

pub use clarification::{
    ClarificationAnswer, ClarificationData, ClarificationKind, ClarificationSituation, Fallback,
    FallbackTier, ParsedClarification,
};
pub use envelope::{Attribution, EngineAction, ResponseEnvelope, Source, SourceKind};
pub use intent::{
    ClassificationResult, Complexity, Entity, EntityKind, Intent, SignalContribution,
};
pub use knowledge::{Document, KbValue, KnowledgeBase};
pub use settings::Settings;
