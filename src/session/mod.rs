pub mod context;
mod store;

pub use context::{
    infer_question_kind, is_follow_up, ContextConfig, ConversationContext, QuestionKind, Sender,
    Turn, UnresolvedQuestion,
};
pub use store::{SessionState, SessionStore, SESSION_FILE};
