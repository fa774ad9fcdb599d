pub mod classifier;
pub mod clarification;
pub mod dispatcher;
pub mod fact_check;
pub mod index;
pub mod patterns;
pub mod safety;

pub use classifier::{ClassifierConfig, IntentClassifier, KnownVocabulary};
pub use clarification::{
    detect, detect_unclear_intent, generate_fallback, generate_prompt, parse_user_clarification,
};
pub use dispatcher::{Dispatcher, DispatcherConfig, Request};
pub use fact_check::{check_claim, ClaimCheck, FactCheckOptions, FactSource};
pub use index::{
    build_index, search, search_or_fallback, IndexHandle, KnowledgeIndex, SearchConfig, SearchHit,
    SearchMode,
};
pub use safety::{check_safety, SafetyViolation, ViolationKind};
