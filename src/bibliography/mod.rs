//! Bibliography loading and reference list formatting.

pub mod bibtex;
pub mod csl;
pub mod format;

pub use format::{build_references, format_authors, format_entry, render_references, Reference};

use crate::ast::BibEntry;
use crate::error::Result;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Bibliography entries keyed by citation key.
#[derive(Debug, Clone, Default)]
pub struct Bibliography {
    entries: HashMap<String, BibEntry>,
}

impl Bibliography {
    /// Parse bibliography text: CSL-JSON when it is a JSON array, BibTeX otherwise.
    pub fn parse(text: &str) -> Result<Self> {
        let entries = if text.trim_start().starts_with('[') {
            csl::parse_csl_json(text)?
        } else {
            bibtex::parse_bibtex(text)?
        };
        Ok(Self::from_entries(entries))
    }

    /// Collect entries; a repeated key keeps its first entry.
    pub fn from_entries(entries: impl IntoIterator<Item = BibEntry>) -> Self {
        let mut map = HashMap::new();
        for entry in entries {
            match map.entry(entry.key.clone()) {
                Entry::Occupied(_) => {
                    tracing::warn!(key = %entry.key, "duplicate bibliography key, keeping the first entry");
                }
                Entry::Vacant(slot) => {
                    slot.insert(entry);
                }
            }
        }
        Self { entries: map }
    }

    pub fn get(&self, key: &str) -> Option<&BibEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
