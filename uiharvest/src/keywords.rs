//! Application family → window-title keywords.
//!
//! Some launchers exit (or hand off) before the real UI process shows a
//! window, so no pid match ever materializes. For those the resolver falls
//! back to matching window titles against substrings known for the family.

use crate::HarvestError;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

const BUILTIN_KEYWORDS: &str = include_str!("../data/keywords.json");

/// Immutable lookup table, loaded once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordTable {
    families: BTreeMap<String, Vec<String>>,
}

impl KeywordTable {
    /// Table with no entries: every hint becomes its own keyword.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The table shipped with the crate.
    pub fn builtin() -> Self {
        // The bundled file is validated by the test suite.
        Self::from_json(BUILTIN_KEYWORDS).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Result<Self, HarvestError> {
        let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(json)
            .map_err(|e| HarvestError::InvalidArgument(format!("Invalid keyword table: {e}")))?;
        Ok(Self::from_entries(raw))
    }

    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<V>)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let families = entries
            .into_iter()
            .map(|(family, keywords)| {
                (
                    family.as_ref().to_lowercase(),
                    keywords
                        .iter()
                        .map(|k| k.as_ref().to_lowercase())
                        .filter(|k| !k.is_empty())
                        .collect(),
                )
            })
            .collect();
        Self { families }
    }

    /// Built-in table extended by a JSON file. Families named in the file
    /// replace the built-in entry.
    pub fn load_with_overrides(path: &Path) -> Result<Self, HarvestError> {
        let json = std::fs::read_to_string(path)?;
        let overrides = Self::from_json(&json)?;
        info!(
            "Loaded {} keyword families from {}",
            overrides.len(),
            path.display()
        );
        Ok(Self::builtin().merged(overrides))
    }

    pub fn merged(mut self, other: KeywordTable) -> Self {
        self.families.extend(other.families);
        self
    }

    /// Keywords for a name hint. A hint without an entry is its own keyword.
    pub fn keywords_for(&self, hint: &str) -> Vec<String> {
        let hint = hint.trim().to_lowercase();
        match self.families.get(&hint) {
            Some(keywords) => keywords.clone(),
            None if hint.is_empty() => Vec::new(),
            None => vec![hint],
        }
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.families
            .iter()
            .map(|(family, keywords)| (family.as_str(), keywords.as_slice()))
    }
}
