pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod init;
pub mod math;
pub mod models;
pub mod services;
pub mod session;
pub mod utils;

pub use engine::{Engine, TurnOutcome};
pub use error::TanyaError;
pub use math::evaluate_math;
pub use services::classifier::classify;
pub use services::clarification::{
    detect as detect_clarification, generate_prompt as render_clarification,
    parse_user_clarification as parse_clarification_reply,
};
pub use services::dispatcher::respond;
pub use services::fact_check::check_claim;
pub use services::index::{build_index, search};
