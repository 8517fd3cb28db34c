//! Parser for post documents: front matter plus GitHub-flavored Markdown with math.

mod block;
mod inline;
mod lexer;

pub use block::parse_blocks;
pub use inline::parse_inlines;

pub(crate) use inline::raw_html_len;

use crate::ast::{Document, FrontMatter};
use crate::error::{ParseError, Result};
use serde::Deserialize;

/// Maximum depth of nested blocks and inlines. Deeper content is kept as text.
pub(crate) const MAX_NESTING: usize = 32;

/// Which Markdown extensions the parser recognizes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// `$...$`, `$$...$$`, and ```` ```math ```` blocks.
    pub math: bool,
    /// GitHub-flavored extensions.
    pub gfm: GfmOptions,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            math: true,
            gfm: GfmOptions::default(),
        }
    }
}

/// GitHub-flavored Markdown extensions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GfmOptions {
    pub tables: bool,
    pub strikethrough: bool,
    /// Bare `http://`, `https://`, and `www.` links.
    pub autolinks: bool,
    pub task_lists: bool,
}

impl Default for GfmOptions {
    fn default() -> Self {
        Self {
            tables: true,
            strikethrough: true,
            autolinks: true,
            task_lists: true,
        }
    }
}

/// Parse a complete document from source text.
pub fn parse(input: &str) -> Result<Document> {
    parse_with(input, &ParseOptions::default())
}

/// Parse a complete document with explicit extension options.
pub fn parse_with(input: &str, options: &ParseOptions) -> Result<Document> {
    let (metadata, content) = split_front_matter(input)?;
    let blocks = parse_blocks(content, options);

    Ok(Document { metadata, blocks })
}

/// Split a leading front matter block from the body.
///
/// `---` blocks are YAML and `+++` blocks are TOML. Text without a closed
/// block at its very start comes back unchanged with empty metadata.
pub fn split_front_matter(input: &str) -> Result<(FrontMatter, &str)> {
    let text = input.strip_prefix('\u{feff}').unwrap_or(input);

    let Some((delimiter, after_open)) = opening_delimiter(text) else {
        return Ok((FrontMatter::default(), input));
    };

    let Some((block, body)) = find_closing(after_open, delimiter) else {
        tracing::debug!(delimiter, "front matter block is not closed, treating as body");
        return Ok((FrontMatter::default(), input));
    };

    if block.trim().is_empty() {
        return Ok((FrontMatter::default(), body));
    }

    let metadata = match delimiter {
        "+++" => {
            let table: toml::Table = toml::from_str(block)
                .map_err(|e| ParseError::FrontMatter(format!("Invalid TOML: {}", e)))?;
            stringify_datetimes(toml::Value::Table(table))
                .try_into::<FrontMatter>()
                .map_err(|e| ParseError::FrontMatter(format!("Invalid TOML: {}", e)))?
        }
        _ => serde_yaml::from_str(block)
            .map_err(|e| ParseError::FrontMatter(format!("Invalid YAML: {}", e)))?,
    };

    Ok((metadata, body))
}

/// Replace TOML dates and times with their RFC 3339 text.
fn stringify_datetimes(value: toml::Value) -> toml::Value {
    match value {
        toml::Value::Datetime(datetime) => toml::Value::String(datetime.to_string()),
        toml::Value::Array(items) => {
            toml::Value::Array(items.into_iter().map(stringify_datetimes).collect())
        }
        toml::Value::Table(table) => toml::Value::Table(
            table
                .into_iter()
                .map(|(key, value)| (key, stringify_datetimes(value)))
                .collect(),
        ),
        other => other,
    }
}

/// Match `---` or `+++` as the whole first line.
fn opening_delimiter(text: &str) -> Option<(&'static str, &str)> {
    let (first, rest) = match text.find('\n') {
        Some(end) => (&text[..end], &text[end + 1..]),
        None => (text, ""),
    };

    ["---", "+++"]
        .into_iter()
        .find(|d| first.trim_end() == *d)
        .map(|d| (d, rest))
}

/// Find the closing delimiter line, returning (block, body after it).
fn find_closing<'a>(text: &'a str, delimiter: &str) -> Option<(&'a str, &'a str)> {
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        if line.trim_end() == delimiter {
            return Some((&text[..offset], &text[offset + line.len()..]));
        }
        offset += line.len();
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_no_front_matter() {
        let input = "# Hello\n\nSome text.";
        let (meta, content) = split_front_matter(input).unwrap();
        assert!(meta.is_empty());
        assert_eq!(content, input);
    }

    #[test]
    fn test_yaml_front_matter() {
        let input = "---\ntitle: Understanding Variational Autoencoders\ndate: 2024-03-01\nexcerpt: \"Latent variables, gently.\"\n---\n\n# Hello\n\nSome text.";

        let (meta, content) = split_front_matter(input).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Understanding Variational Autoencoders"));
        assert_eq!(meta.date.as_deref(), Some("2024-03-01"));
        assert_eq!(meta.excerpt.as_deref(), Some("Latent variables, gently."));
        assert!(meta.extra.is_empty());
        assert_eq!(content, "\n# Hello\n\nSome text.");
    }

    #[test]
    fn test_toml_front_matter() {
        let input = "+++\ntitle = \"My Document\"\ndate = \"2023-05-02\"\ntags = [\"sql\"]\n+++\n# Hello";

        let (meta, content) = split_front_matter(input).unwrap();
        assert_eq!(meta.title.as_deref(), Some("My Document"));
        assert_eq!(meta.date.as_deref(), Some("2023-05-02"));
        assert_eq!(meta.extra.get("tags"), Some(&serde_json::json!(["sql"])));
        assert_eq!(content, "# Hello");
    }

    #[test]
    fn test_toml_native_dates() {
        let input = "+++\ntitle = \"T\"\ndate = 2023-05-02\nupdated = 2023-05-03T10:00:00Z\n+++\nBody";

        let (meta, content) = split_front_matter(input).unwrap();
        assert_eq!(meta.date.as_deref(), Some("2023-05-02"));
        assert_eq!(meta.published(), chrono::NaiveDate::from_ymd_opt(2023, 5, 2));
        assert_eq!(meta.extra.get("updated"), Some(&serde_json::json!("2023-05-03T10:00:00Z")));
        assert_eq!(content, "Body");
    }

    #[test]
    fn test_extra_keys_and_scalars() {
        let input = "---\ntitle: 2024\ndraft: true\n---\nbody";
        let (meta, content) = split_front_matter(input).unwrap();
        assert_eq!(meta.title.as_deref(), Some("2024"));
        assert_eq!(meta.extra.get("draft"), Some(&serde_json::Value::Bool(true)));
        assert_eq!(content, "body");
    }

    #[test]
    fn test_unclosed_front_matter_is_body() {
        let input = "---\ntitle: Oops\n\nNo closing line.";
        let (meta, content) = split_front_matter(input).unwrap();
        assert!(meta.is_empty());
        assert_eq!(content, input);
    }

    #[test]
    fn test_delimiter_must_open_the_text() {
        let input = "Intro\n---\ntitle: x\n---\n";
        let (meta, content) = split_front_matter(input).unwrap();
        assert!(meta.is_empty());
        assert_eq!(content, input);
    }

    #[test]
    fn test_empty_front_matter() {
        let (meta, content) = split_front_matter("---\n---\nbody").unwrap();
        assert!(meta.is_empty());
        assert_eq!(content, "body");
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        let result = split_front_matter("---\n- just\n- a list\n---\nbody");
        assert!(matches!(
            result,
            Err(crate::Error::Parse(ParseError::FrontMatter(_)))
        ));
    }

    #[test]
    fn test_parse_document() {
        let doc = parse("---\ntitle: T\n---\n# Heading\n\nText.").unwrap();
        assert_eq!(doc.metadata.title.as_deref(), Some("T"));
        assert_eq!(doc.blocks.len(), 2);
    }
}
