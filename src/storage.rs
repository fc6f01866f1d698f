//! Editor-buffer persistence.
//!
//! The orchestrator saves the learner's buffer before every run and restores
//! it when the widget reloads. The store is a plain key/value surface; the
//! session id is the key. Session snapshots (attempts, revealed flag) ride
//! along under a derived key.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};

/// Key/value persistence for editor text, keyed by session id.
pub trait PersistedBuffer {
    fn load(&self, session_id: &str) -> Result<Option<String>>;
    fn save(&self, session_id: &str, text: &str) -> Result<()>;
}

/// File-backed store: one file per key under a root directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        // Session ids are widget-generated slugs; replace anything that
        // could escape the root directory.
        let safe: String = session_id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
            .collect();
        self.root.join(safe)
    }
}

impl PersistedBuffer for FileStore {
    fn load(&self, session_id: &str) -> Result<Option<String>> {
        let path = self.path_for(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read buffer file: {}", path.display()))?;
        Ok(Some(text))
    }

    fn save(&self, session_id: &str, text: &str) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create store root: {}", self.root.display()))?;
        let path = self.path_for(session_id);
        fs::write(&path, text)
            .with_context(|| format!("Failed to write buffer file: {}", path.display()))?;
        Ok(())
    }
}

/// In-memory store with shared handles, for tests and headless embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    map: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistedBuffer for MemoryStore {
    fn load(&self, session_id: &str) -> Result<Option<String>> {
        Ok(self.map.borrow().get(session_id).cloned())
    }

    fn save(&self, session_id: &str, text: &str) -> Result<()> {
        self.map
            .borrow_mut()
            .insert(session_id.to_string(), text.to_string());
        Ok(())
    }
}

/// The derived key under which a session's snapshot is persisted.
pub fn snapshot_key(session_id: &str) -> String {
    format!("{session_id}.state")
}
