#![allow(dead_code)]

pub mod builders;
pub mod harness;

// Re-export commonly used test utilities
pub use builders::{sample_knowledge, KnowledgeBuilder};
pub use harness::TestHarness;
