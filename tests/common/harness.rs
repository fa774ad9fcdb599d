//! Test harness: a temporary data directory with a knowledge file, plus an
//! engine and session store built from it.

use std::path::PathBuf;

use tanya::config::EngineConfig;
use tanya::engine::{Engine, TurnOutcome};
use tanya::init::load_knowledge;
use tanya::models::{KnowledgeBase, Settings};
use tanya::session::{SessionStore, SESSION_FILE};
use tempfile::TempDir;

use super::builders::sample_knowledge;

pub struct TestHarness {
    pub dir: TempDir,
    pub engine: Engine,
    pub session: SessionStore,
    pub settings: Settings,
}

impl TestHarness {
    /// Harness over the sample knowledge base, written to and read back from
    /// `knowledge.json` so the loader is exercised too.
    pub fn new() -> Self {
        Self::with_knowledge(sample_knowledge())
    }

    pub fn with_knowledge(kb: KnowledgeBase) -> Self {
        let dir = TempDir::new().expect("Temp dir");
        let kb_path = dir.path().join("knowledge.json");
        std::fs::write(&kb_path, serde_json::to_string_pretty(&kb).expect("Serialize kb"))
            .expect("Write kb");
        let kb = load_knowledge(&kb_path).expect("Load kb");

        let session = SessionStore::load_or_create(&dir.path().join(SESSION_FILE))
            .expect("Session store");
        let engine = Engine::new(EngineConfig::default(), kb);
        Self {
            dir,
            engine,
            session,
            settings: Settings::default(),
        }
    }

    pub fn session_path(&self) -> PathBuf {
        self.dir.path().join(SESSION_FILE)
    }

    /// Send a message the way the CLI does: run, record, save.
    pub fn say(&mut self, message: &str) -> TurnOutcome {
        let state = &mut self.session.state;
        let outcome = self
            .engine
            .handle_turn(
                message,
                &mut state.context,
                &mut state.pending_clarification,
                &self.settings,
            )
            .expect("Turn should commit");
        state.record(&outcome);
        self.session.save().expect("Session should save");
        outcome
    }
}
