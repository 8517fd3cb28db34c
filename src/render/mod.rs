//! Rendering layer: Markdown AST to an HTML tree, then to a string.

pub mod html;
pub mod math;
pub mod tree;

pub use html::{escape_html, escape_text, render_html, to_html, HtmlConfig};
pub use math::MathDelimiters;
pub use tree::{build_tree, Element, HtmlNode};

use crate::ast::Document;

/// Render a parsed document body to HTML.
pub fn render(document: &Document, config: &HtmlConfig) -> String {
    render_html(&document.blocks, config)
}
