//! Department registry
//!
//! Maps a raw organisation name or URI onto a canonical department title.
//! Used only to stamp output; never consulted during validation. One
//! registry is built per run and passed by reference.

use organogram_common::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

pub trait DepartmentRegistry: Send + Sync {
    /// Canonical title for a raw name or URI, if known
    fn canonical_title(&self, raw: &str) -> Option<String>;
}

/// In-memory registry keyed by case-folded alias
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    titles: HashMap<String, String>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, alias: &str, title: &str) {
        self.titles.insert(fold(alias), title.to_string());
    }

    /// Load a JSON object of `alias -> title`
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read registry {} failed: {}", path.display(), e)))?;
        let entries: HashMap<String, String> = serde_json::from_str(&content)?;

        let mut registry = Self::new();
        for (alias, title) in &entries {
            registry.insert(alias, title);
        }
        debug!(entries = registry.len(), path = %path.display(), "Loaded department registry");
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

impl DepartmentRegistry for StaticRegistry {
    fn canonical_title(&self, raw: &str) -> Option<String> {
        self.titles.get(&fold(raw)).cloned()
    }
}

fn fold(text: &str) -> String {
    text.trim().trim_end_matches('/').to_lowercase()
}
