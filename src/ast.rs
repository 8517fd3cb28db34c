//! Abstract Syntax Tree definitions for post documents.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// A complete parsed document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Front matter metadata
    pub metadata: FrontMatter,
    /// Document content as a sequence of blocks
    pub blocks: Vec<Block>,
}

/// Post metadata from the front matter block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrontMatter {
    /// Post title
    #[serde(default, deserialize_with = "scalar_string", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Publication date (ISO-8601)
    #[serde(default, deserialize_with = "scalar_string", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Short summary shown on listing cards
    #[serde(default, deserialize_with = "scalar_string", skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    /// Every other key, preserved as written
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl FrontMatter {
    /// True when the block carried no keys at all.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.date.is_none() && self.excerpt.is_none() && self.extra.is_empty()
    }

    /// Parse `date` as RFC 3339 or a plain `YYYY-MM-DD` date.
    pub fn published(&self) -> Option<NaiveDate> {
        parse_date(self.date.as_deref()?)
    }
}

/// Parse an ISO-8601 date or date-time into its calendar date.
pub(crate) fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    // Date-times without an offset, and bare dates
    s.get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}

/// Parse an ISO-8601 date-time as UTC. Bare dates fall at midnight.
pub(crate) fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .or_else(|| parse_date(s)?.and_hms_opt(0, 0, 0))
}

/// Accept strings, numbers, and booleans for a text field.
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|s| match s {
        Scalar::Text(t) => t,
        Scalar::Int(n) => n.to_string(),
        Scalar::Float(f) => f.to_string(),
        Scalar::Bool(b) => b.to_string(),
    }))
}

/// Block-level elements.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// A paragraph of inline content
    Paragraph(Vec<Inline>),

    /// A heading with level (1-6) and content
    Heading { level: u8, content: Vec<Inline> },

    /// A fenced or indented code block
    CodeBlock {
        language: Option<String>,
        content: String,
    },

    /// A block quote
    BlockQuote(Vec<Block>),

    /// An ordered or unordered list
    List {
        ordered: bool,
        start: Option<u32>,
        items: Vec<ListItem>,
    },

    /// A thematic break (horizontal rule)
    ThematicBreak,

    /// Display math block (raw TeX)
    DisplayMath(String),

    /// Raw HTML passthrough
    RawHtml(String),

    /// A GFM pipe table
    Table {
        headers: Vec<Vec<Inline>>,
        alignments: Vec<Alignment>,
        rows: Vec<Vec<Vec<Inline>>>,
    },
}

/// List item containing blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    pub content: Vec<Block>,
    /// Task list state; `None` for ordinary items
    pub checked: Option<bool>,
}

/// Table column alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    None,
    Left,
    Center,
    Right,
}

/// Inline-level elements.
#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    /// Plain text
    Text(String),

    /// Emphasized text (italic)
    Emphasis(Vec<Inline>),

    /// Strong text (bold)
    Strong(Vec<Inline>),

    /// Strikethrough text
    Strikethrough(Vec<Inline>),

    /// Inline code
    Code(String),

    /// A link (including autolinks)
    Link {
        url: String,
        title: Option<String>,
        content: Vec<Inline>,
    },

    /// An image
    Image {
        url: String,
        alt: String,
        title: Option<String>,
    },

    /// Inline math (raw TeX)
    InlineMath(String),

    /// A soft line break
    SoftBreak,

    /// A hard line break
    HardBreak,

    /// Raw HTML inline
    RawHtml(String),
}

/// A bibliography entry, shaped after CSL item fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BibEntry {
    pub key: String,
    pub entry_type: String,
    pub authors: Vec<Name>,
    pub title: Option<String>,
    /// Issue year
    pub year: Option<String>,
    /// Journal, proceedings, or book the work appears in
    pub container_title: Option<String>,
    pub publisher: Option<String>,
    pub url: Option<String>,
    pub doi: Option<String>,
}

/// An author name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Name {
    /// A person with given and family parts
    Personal {
        given: Option<String>,
        family: String,
    },
    /// A corporate or otherwise unsplittable name
    Literal { literal: String },
}

impl Name {
    pub fn personal(given: impl Into<String>, family: impl Into<String>) -> Self {
        let given = given.into();
        Self::Personal {
            given: if given.is_empty() { None } else { Some(given) },
            family: family.into(),
        }
    }

    pub fn literal(name: impl Into<String>) -> Self {
        Self::Literal {
            literal: name.into(),
        }
    }

    /// Display form: given name first, literals verbatim.
    pub fn display(&self) -> String {
        match self {
            Self::Personal { given: Some(given), family } => format!("{} {}", given, family),
            Self::Personal { given: None, family } => family.clone(),
            Self::Literal { literal } => literal.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_published_dates() {
        let mut meta = FrontMatter {
            date: Some("2024-03-05".into()),
            ..Default::default()
        };
        assert_eq!(meta.published(), NaiveDate::from_ymd_opt(2024, 3, 5));

        meta.date = Some("2023-11-20T08:30:00Z".into());
        assert_eq!(meta.published(), NaiveDate::from_ymd_opt(2023, 11, 20));

        meta.date = Some("next tuesday".into());
        assert_eq!(meta.published(), None);
    }

    #[test]
    fn test_name_display() {
        assert_eq!(Name::personal("Diederik P.", "Kingma").display(), "Diederik P. Kingma");
        assert_eq!(Name::personal("", "Plato").display(), "Plato");
        assert_eq!(Name::literal("OpenAI").display(), "OpenAI");
    }
}
