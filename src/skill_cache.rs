//! Time-boxed cache of skill reference -> skill name mappings.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillMapping {
    /// Identifier tasks use to refer to the skill.
    pub reference: String,
    /// Canonical display name demand is aggregated under.
    pub name: String,
}

impl SkillMapping {
    pub fn new(reference: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("failed to load skills: {0}")]
pub struct SkillSourceError(pub String);

pub trait SkillSource {
    fn load_skills(&self) -> Result<Vec<SkillMapping>, SkillSourceError>;
}

/// Fixed list of mappings; also the identity source when empty.
#[derive(Debug, Clone, Default)]
pub struct StaticSkillSource {
    mappings: Vec<SkillMapping>,
}

impl StaticSkillSource {
    pub fn new(mappings: Vec<SkillMapping>) -> Self {
        Self { mappings }
    }
}

impl SkillSource for StaticSkillSource {
    fn load_skills(&self) -> Result<Vec<SkillMapping>, SkillSourceError> {
        Ok(self.mappings.clone())
    }
}

#[derive(Debug, Clone)]
pub struct SkillMappingCache {
    ttl: Duration,
    entries: HashMap<String, String>,
    loaded_at: Option<Instant>,
}

impl SkillMappingCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
            loaded_at: None,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Instant::now())
    }

    fn is_stale_at(&self, now: Instant) -> bool {
        match self.loaded_at {
            Some(loaded_at) => now.saturating_duration_since(loaded_at) >= self.ttl,
            None => true,
        }
    }

    pub fn invalidate(&mut self) {
        self.entries.clear();
        self.loaded_at = None;
    }

    /// Reloads unconditionally. On failure the previous entries are kept.
    pub fn refresh<S: SkillSource + ?Sized>(&mut self, source: &S) -> Result<usize, SkillSourceError> {
        let mappings = source.load_skills()?;
        self.entries = mappings
            .into_iter()
            .map(|mapping| (mapping.reference, mapping.name))
            .collect();
        self.loaded_at = Some(Instant::now());
        debug!(entries = self.entries.len(), "skill mapping cache refreshed");
        Ok(self.entries.len())
    }

    /// Reloads only once the TTL has elapsed.
    pub fn ensure_fresh<S: SkillSource + ?Sized>(&mut self, source: &S) -> Result<(), SkillSourceError> {
        if self.is_stale() {
            self.refresh(source)?;
        }
        Ok(())
    }

    /// Canonical name for `reference`; unknown references map to themselves.
    pub fn resolve<'a>(&'a self, reference: &'a str) -> &'a str {
        self.entries
            .get(reference)
            .map(String::as_str)
            .unwrap_or(reference)
    }
}
