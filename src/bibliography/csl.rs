//! CSL-JSON bibliography input.

use serde::Deserialize;
use serde_json::Value;

use crate::ast::{BibEntry, Name};
use crate::error::{ParseError, Result};

#[derive(Debug, Deserialize)]
struct CslItem {
    id: Value,
    #[serde(rename = "type", default)]
    item_type: Option<String>,
    title: Option<String>,
    #[serde(default)]
    author: Vec<CslName>,
    issued: Option<CslDate>,
    #[serde(rename = "container-title")]
    container_title: Option<String>,
    publisher: Option<String>,
    #[serde(rename = "URL")]
    url: Option<String>,
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CslName {
    given: Option<String>,
    family: Option<String>,
    literal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CslDate {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Value>>,
    raw: Option<String>,
}

/// Parse a CSL-JSON array of items.
pub fn parse_csl_json(input: &str) -> Result<Vec<BibEntry>> {
    let items: Vec<CslItem> =
        serde_json::from_str(input).map_err(|e| ParseError::CslJson(e.to_string()))?;

    Ok(items.into_iter().map(CslItem::into_entry).collect())
}

impl CslItem {
    fn into_entry(self) -> BibEntry {
        let key = match self.id {
            Value::String(s) => s,
            other => other.to_string(),
        };

        BibEntry {
            key,
            entry_type: self.item_type.unwrap_or_default(),
            authors: self.author.into_iter().filter_map(CslName::into_name).collect(),
            title: non_empty(self.title),
            year: self.issued.and_then(CslDate::year),
            container_title: non_empty(self.container_title),
            publisher: non_empty(self.publisher),
            url: non_empty(self.url),
            doi: non_empty(self.doi),
        }
    }
}

impl CslName {
    fn into_name(self) -> Option<Name> {
        match (self.literal, self.family, self.given) {
            (Some(literal), _, _) => Some(Name::literal(literal)),
            (None, Some(family), given) => Some(Name::personal(given.unwrap_or_default(), family)),
            (None, None, Some(given)) => Some(Name::literal(given)),
            (None, None, None) => None,
        }
    }
}

impl CslDate {
    fn year(self) -> Option<String> {
        let from_parts = self
            .date_parts
            .first()
            .and_then(|parts| parts.first())
            .and_then(|year| match year {
                Value::Number(n) => Some(n.to_string()),
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                _ => None,
            });

        from_parts.or_else(|| {
            let raw = self.raw?;
            let year = raw.get(..4)?;
            year.chars().all(|c| c.is_ascii_digit()).then(|| year.to_string())
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
