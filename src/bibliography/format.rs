//! Reference list formatting.

use serde::Serialize;

use super::Bibliography;
use crate::ast::{BibEntry, Name};
use crate::citations::anchor_id;
use crate::render::{escape_html, to_html, Element, HtmlNode};

/// Longest URL shown in full; longer ones are cut and marked with `...`.
const MAX_URL_DISPLAY: usize = 50;

/// One formatted entry of the reference list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reference {
    /// Number assigned in the body, by first appearance
    pub number: usize,
    pub key: String,
    /// Element id the in-body citation links to
    pub anchor: String,
    /// Formatted entry markup
    pub html: String,
}

/// Build the reference list for cited keys in first-appearance order.
///
/// Keys without an entry are skipped. The remaining entries keep the
/// numbers their citations show in the body.
pub fn build_references(keys: &[String], bibliography: &Bibliography) -> Vec<Reference> {
    keys.iter()
        .enumerate()
        .filter_map(|(i, key)| {
            let entry = bibliography.get(key)?;
            Some(Reference {
                number: i + 1,
                key: key.clone(),
                anchor: anchor_id(key),
                html: format_entry(entry),
            })
        })
        .collect()
}

/// Format an entry as `Authors (Year). Title. Container. Publisher. URL.`
///
/// Missing fields are left out along with their punctuation.
pub fn format_entry(entry: &BibEntry) -> String {
    let mut sentences: Vec<(String, bool)> = Vec::new();

    let authors = format_authors(&entry.authors);
    let byline = match (authors.is_empty(), &entry.year) {
        (false, Some(year)) => Some(format!("{} ({})", authors, year)),
        (false, None) => Some(authors),
        (true, Some(year)) => Some(format!("({})", year)),
        (true, None) => None,
    };
    if let Some(byline) = byline {
        let closed = ends_sentence(&byline);
        sentences.push((escape_html(&byline), closed));
    }

    if let Some(title) = &entry.title {
        sentences.push((format!("<em>{}</em>", escape_html(title)), ends_sentence(title)));
    }

    for field in [&entry.container_title, &entry.publisher].into_iter().flatten() {
        sentences.push((escape_html(field), ends_sentence(field)));
    }

    let url = entry
        .url
        .clone()
        .or_else(|| entry.doi.as_ref().map(|doi| format!("https://doi.org/{}", doi)));
    if let Some(url) = url {
        let link = Element::new("a")
            .attr("href", url.as_str())
            .attr("target", "_blank")
            .attr("rel", "noopener noreferrer")
            .child(HtmlNode::text(truncate_url(&url)));
        sentences.push((to_html(&[link.into()]), false));
    }

    sentences
        .into_iter()
        .map(|(text, closed)| if closed { text } else { text + "." })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Names in display order, joined with commas.
pub fn format_authors(authors: &[Name]) -> String {
    authors
        .iter()
        .map(Name::display)
        .collect::<Vec<_>>()
        .join(", ")
}

fn ends_sentence(text: &str) -> bool {
    text.trim_end().ends_with(['.', '?', '!'])
}

fn truncate_url(url: &str) -> String {
    if url.chars().count() > MAX_URL_DISPLAY {
        let cut: String = url.chars().take(MAX_URL_DISPLAY).collect();
        format!("{}...", cut)
    } else {
        url.to_string()
    }
}

/// Render the reference section, or nothing when the list is empty.
pub fn render_references(references: &[Reference]) -> String {
    if references.is_empty() {
        return String::new();
    }

    let items = references
        .iter()
        .map(|r| {
            Element::new("li")
                .attr("id", r.anchor.as_str())
                .attr("value", r.number.to_string())
                .child(HtmlNode::raw(r.html.as_str()))
                .into()
        })
        .collect();

    let section = Element::new("section")
        .attr("class", "references")
        .block_children(vec![
            Element::new("h2").child(HtmlNode::text("References")).into(),
            Element::new("ol").block_children(items).into(),
        ]);

    to_html(&[section.into()])
}
