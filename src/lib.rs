//! # folio
//!
//! The post pipeline for a personal site: Markdown with front matter, math,
//! and numbered citations in, HTML with a reference list out.
//!
//! ## Features
//!
//! - **Front matter**: `---` YAML or `+++` TOML metadata at the top of a post
//! - **Citations**: `[@key]` tokens numbered by first appearance and linked to the reference list
//! - **Bibliographies**: BibTeX and CSL-JSON, formatted as an ordered reference section
//! - **Math**: Inline `$...$` and display `$$...$$` passed through for client-side typesetting
//! - **GitHub-flavored Markdown**: Tables, task lists, strikethrough, autolinks, and raw HTML
//! - **Post loading**: Fetch posts by slug from memory, a directory, or over HTTP
//! - **Listings**: Post cards, cover images, and a normalized video feed
//!
//! ## Quick Start
//!
//! ```rust
//! use folio::{render_post, RenderState};
//!
//! let markdown = r#"---
//! title: Understanding VAEs
//! date: 2024-03-01
//! ---
//!
//! Variational autoencoders [@kingma2014] learn $p(x)$.
//! "#;
//!
//! let bibliography = r#"@article{kingma2014,
//!   author = {Kingma, Diederik P. and Welling, Max},
//!   title = {Auto-Encoding Variational Bayes},
//!   year = {2014}
//! }"#;
//!
//! match render_post(markdown, Some(bibliography)) {
//!     RenderState::Success(post) => {
//!         assert_eq!(post.metadata.title.as_deref(), Some("Understanding VAEs"));
//!         assert!(post.html.contains("data-cite-number=\"1\""));
//!         assert!(post.html.contains("<section class=\"references\">"));
//!     }
//!     other => panic!("unexpected state: {:?}", other),
//! }
//! ```
//!
//! ## Syntax Reference
//!
//! ### Front Matter
//!
//! ```text
//! ---
//! title: My Post
//! date: 2024-03-01
//! excerpt: One line for the listing card.
//! ---
//! ```
//!
//! An opening `---` with no closing line is treated as body text.
//!
//! ### Citations
//!
//! - Cite: `[@kingma2014]`
//! - Inside code: `` `[@kingma2014]` `` shows as `[1]`
//!
//! Repeated keys share their first number. Keys missing from the
//! bibliography keep their number but are not linked.
//!
//! ### Math
//!
//! - Inline: `$E = mc^2$`
//! - Display: `$$\int_0^1 x\,dx$$` or a fenced block with the `math` info string
//!
//! ## Loading Posts
//!
//! [`PostAssembler`] maps a slug to its Markdown and bibliography paths
//! through a [`SiteConfig`] and fetches them from any [`ContentSource`].
//! [`PostView`] tracks which navigation is current so a slow render cannot
//! overwrite a newer one.

pub mod ast;
pub mod bibliography;
pub mod catalog;
pub mod citations;
pub mod config;
pub mod error;
pub mod parser;
pub mod post;
pub mod render;
pub mod source;

#[cfg(feature = "wasm")]
pub mod wasm;

// Convenience re-exports
pub use ast::{BibEntry, Block, Document, FrontMatter, Inline, Name};
pub use bibliography::{Bibliography, Reference};
pub use catalog::{slugify, ImageIndex, PostIndex, PostSummary, Video, VideoIndex};
pub use citations::{rewrite_citations, CitedBody};
pub use config::SiteConfig;
pub use error::{ConfigError, Error, FetchError, ParseError, ResolutionError, Result};
pub use parser::{parse, parse_with, split_front_matter, GfmOptions, ParseOptions};
pub use post::{assemble, PostAssembler, PostView, RenderOptions, RenderState, RenderTicket, RenderedPost};
pub use render::{render_html, HtmlConfig, MathDelimiters};
#[cfg(feature = "http")]
pub use source::HttpSource;
pub use source::{ContentSource, DirSource, MemorySource};

/// Render a post with default options.
///
/// This is [`assemble`] with [`RenderOptions::default`].
pub fn render_post(markdown: &str, bibliography: Option<&str>) -> RenderState {
    assemble(markdown, bibliography, &RenderOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html_of(markdown: &str) -> String {
        match render_post(markdown, None) {
            RenderState::Success(post) => post.html,
            other => panic!("render failed: {:?}", other),
        }
    }

    #[test]
    fn test_full_pipeline() {
        let input = r#"---
title: Test Post
excerpt: A short one.
---

# Introduction

Let $x \in \mathbb{R}$ be real, as shown in [@knuth1984].

- [x] cited
- [ ] typeset
"#;
        let bib = "@book{knuth1984, author = {Knuth, Donald E.}, title = {The {TeX}book}, year = 1984}";

        let RenderState::Success(post) = render_post(input, Some(bib)) else {
            panic!("expected success");
        };

        assert_eq!(post.metadata.title.as_deref(), Some("Test Post"));
        assert!(post.html.contains("<h1>Introduction</h1>"));
        assert!(post.html.contains("math math-inline"));
        assert!(post.html.contains("href=\"#ref-knuth1984\""));
        assert!(post.html.contains("task-list-item"));
        assert!(post.html.contains("Donald E. Knuth (1984)"));
        assert_eq!(post.citations, vec!["knuth1984"]);
    }

    #[test]
    fn test_simple_markdown() {
        let html = html_of("# Hello\n\n**Bold** and *italic* text.");

        assert!(html.contains("<h1>"));
        assert!(html.contains("<strong>Bold</strong>"));
        assert!(html.contains("<em>italic</em>"));
    }

    #[test]
    fn test_code_block() {
        let html = html_of("```rust\nfn main() {}\n```");

        assert!(html.contains("<pre><code"));
        assert!(html.contains("language-rust"));
    }

    #[test]
    fn test_list() {
        let html = html_of("- Item 1\n- Item 2\n- Item 3");

        assert!(html.contains("<ul>"));
        assert!(html.contains("<li>"));
    }

    #[test]
    fn test_display_math() {
        let html = html_of("$$\n\\int_0^1 x dx = \\frac{1}{2}\n$$");

        assert!(html.contains("math math-display"));
    }

    #[test]
    fn test_table() {
        let input = r#"
| Header 1 | Header 2 |
| -------- | -------- |
| Cell 1   | Cell 2   |
"#;
        let html = html_of(input);

        assert!(html.contains("<table"));
        assert!(html.contains("<th>"));
        assert!(html.contains("<td>"));
    }

    #[test]
    fn test_render_post_without_front_matter() {
        let RenderState::Success(post) = render_post("Just text.", None) else {
            panic!("expected success");
        };
        assert!(post.metadata.is_empty());
        assert_eq!(post.html, "<p>Just text.</p>");
    }
}
