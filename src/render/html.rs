//! HTML serialization.

use serde::Deserialize;

use crate::ast::Block;
use crate::render::math::MathDelimiters;
use crate::render::tree::{build_tree, Element, HtmlNode};

/// Elements written without a closing tag.
const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input"];

/// Configuration for HTML rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HtmlConfig {
    /// Delimiters written around math for the client-side typesetter.
    pub math_delimiters: MathDelimiters,
}

/// Render blocks to an HTML fragment, one top-level block per line.
pub fn render_html(blocks: &[Block], config: &HtmlConfig) -> String {
    let tree = build_tree(blocks, config.math_delimiters);

    let mut output = String::new();
    for (i, node) in tree.iter().enumerate() {
        if i > 0 {
            output.push('\n');
        }
        write_node(&mut output, node);
    }
    output
}

/// Serialize nodes back to back.
pub fn to_html(nodes: &[HtmlNode]) -> String {
    let mut output = String::new();
    for node in nodes {
        write_node(&mut output, node);
    }
    output
}

fn write_node(output: &mut String, node: &HtmlNode) {
    match node {
        HtmlNode::Element(element) => write_element(output, element),
        HtmlNode::Text(text) => output.push_str(&escape_html(text)),
        HtmlNode::Verbatim(text) => output.push_str(&escape_text(text)),
        HtmlNode::Raw(html) => output.push_str(html),
    }
}

fn write_element(output: &mut String, element: &Element) {
    output.push('<');
    output.push_str(element.tag);
    for (name, value) in &element.attrs {
        output.push(' ');
        output.push_str(name);
        if let Some(value) = value {
            output.push_str("=\"");
            output.push_str(&escape_html(value));
            output.push('"');
        }
    }
    output.push('>');

    if VOID_ELEMENTS.contains(&element.tag) {
        return;
    }

    for child in &element.children {
        write_node(output, child);
    }

    output.push_str("</");
    output.push_str(element.tag);
    output.push('>');
}

/// Escape text for HTML content and attribute values.
///
/// Entity references already present in the text (`&amp;`, `&#169;`,
/// `&#x2014;`) are kept as written.
pub fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for (i, c) in s.char_indices() {
        match c {
            '&' if is_entity_reference(&s[i..]) => escaped.push('&'),
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Escape every markup character, including the `&` of entity references.
pub fn escape_text(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Whether `s` starts with `&name;`, `&#123;`, or `&#x1F;`.
fn is_entity_reference(s: &str) -> bool {
    let Some(body) = s.strip_prefix('&') else {
        return false;
    };
    let Some(end) = body.find(';') else {
        return false;
    };
    let name = &body[..end];

    if let Some(num) = name.strip_prefix('#') {
        if let Some(hex) = num.strip_prefix(['x', 'X']) {
            return (1..=6).contains(&hex.len()) && hex.chars().all(|c| c.is_ascii_hexdigit());
        }
        return (1..=7).contains(&num.len()) && num.chars().all(|c| c.is_ascii_digit());
    }

    (2..=32).contains(&name.len())
        && name.starts_with(|c: char| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric())
}
