//! Shared initialization for the command line: data path, configuration,
//! knowledge base, engine and session.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{info, warn};

use crate::config::{load_engine_config, EngineConfig};
use crate::engine::Engine;
use crate::error::TanyaError;
use crate::models::knowledge::KnowledgeBase;
use crate::session::{SessionStore, SESSION_FILE};

/// Knowledge file names looked up in the data path, in order.
pub const KNOWLEDGE_FILES: &[&str] = &[
    "knowledge.json",
    "knowledge.yaml",
    "knowledge.yml",
    "knowledge.toml",
];

/// Application context holding the engine and the persisted session.
pub struct AppContext {
    pub data_path: PathBuf,
    pub engine: Engine,
    pub session: SessionStore,
}

impl AppContext {
    /// Initialize application context.
    ///
    /// Data path priority: explicit path > TANYA_DATA_PATH env > ./.tanya (if exists) > ~/.tanya
    pub fn new(explicit_path: Option<PathBuf>, kb_path: Option<PathBuf>) -> Result<Self> {
        let data_path = resolve_data_path(explicit_path);
        info!("Using data path: {}", data_path.display());

        let config = load_engine_config(&data_path);
        let kb = match kb_path.or_else(|| find_knowledge_file(&data_path)) {
            Some(path) => {
                let kb = load_knowledge(&path)?;
                info!(
                    "Loaded {} knowledge entries from {}",
                    kb.document_count(),
                    path.display()
                );
                kb
            }
            None => {
                warn!(
                    "No knowledge file found in {}, starting with an empty knowledge base",
                    data_path.display()
                );
                KnowledgeBase::new()
            }
        };

        let session = SessionStore::load_or_create(&data_path.join(SESSION_FILE))?;
        let engine = build_engine(config, kb, &session);

        Ok(Self {
            data_path,
            engine,
            session,
        })
    }
}

fn build_engine(config: EngineConfig, kb: KnowledgeBase, session: &SessionStore) -> Engine {
    Engine::new(config, kb).with_turn_counter(session.state.last_turn_id)
}

pub fn resolve_data_path(explicit_path: Option<PathBuf>) -> PathBuf {
    explicit_path
        .or_else(|| std::env::var("TANYA_DATA_PATH").ok().map(PathBuf::from))
        .or_else(|| {
            let local_path = Path::new(".tanya");
            if local_path.exists() && local_path.is_dir() {
                Some(local_path.to_path_buf())
            } else {
                None
            }
        })
        .unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".tanya"))
                .unwrap_or_else(|| PathBuf::from(".tanya"))
        })
}

/// First knowledge file present in the data path.
pub fn find_knowledge_file(data_path: &Path) -> Option<PathBuf> {
    KNOWLEDGE_FILES
        .iter()
        .map(|name| data_path.join(name))
        .find(|path| path.is_file())
}

/// Read a knowledge base, choosing the format from the file extension.
pub fn load_knowledge(path: &Path) -> Result<KnowledgeBase, TanyaError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        TanyaError::KnowledgeBase(format!("Failed to read {}: {}", path.display(), e))
    })?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("json") => serde_json::from_str(&contents).map_err(|e| {
            TanyaError::KnowledgeBase(format!("Failed to parse {}: {}", path.display(), e))
        }),
        Some("yaml") | Some("yml") => Ok(serde_yaml_ng::from_str(&contents)?),
        Some("toml") => toml::from_str(&contents).map_err(|e| {
            TanyaError::KnowledgeBase(format!("Failed to parse {}: {}", path.display(), e))
        }),
        other => Err(TanyaError::KnowledgeBase(format!(
            "Unsupported knowledge file format: {}",
            other.unwrap_or("(none)")
        ))),
    }
}
