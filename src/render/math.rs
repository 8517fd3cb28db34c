//! Math passthrough for client-side typesetting.
//!
//! TeX is never evaluated here. Each span is wrapped in delimiters that a
//! typesetting script (KaTeX auto-render, MathJax) picks up after the HTML
//! is mounted.

use serde::{Deserialize, Serialize};

use super::tree::{Element, HtmlNode};
use crate::citations::plain_citations;

/// Delimiters written around math spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MathDelimiters {
    /// `\( ... \)` inline and `\[ ... \]` display.
    #[default]
    Latex,
    /// `$ ... $` inline and `$$ ... $$` display.
    Dollars,
}

impl MathDelimiters {
    /// Wrap inline TeX.
    pub fn inline(self, tex: &str) -> String {
        match self {
            Self::Latex => format!("\\({}\\)", tex),
            Self::Dollars => format!("${}$", tex),
        }
    }

    /// Wrap display TeX.
    pub fn display(self, tex: &str) -> String {
        match self {
            Self::Latex => format!("\\[{}\\]", tex),
            Self::Dollars => format!("$${}$$", tex),
        }
    }
}

/// `<span class="math math-inline">` holding delimited TeX.
pub fn inline_math(tex: &str, delimiters: MathDelimiters) -> HtmlNode {
    Element::new("span")
        .attr("class", "math math-inline")
        .child(HtmlNode::verbatim(delimiters.inline(&plain_citations(tex))))
        .into()
}

/// `<div class="math math-display">` holding delimited TeX.
pub fn display_math(tex: &str, delimiters: MathDelimiters) -> HtmlNode {
    Element::new("div")
        .attr("class", "math math-display")
        .child(HtmlNode::verbatim(delimiters.display(&plain_citations(tex))))
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::html::to_html;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_latex_delimiters() {
        let node = inline_math("x^2", MathDelimiters::Latex);
        assert_eq!(
            to_html(&[node]),
            r#"<span class="math math-inline">\(x^2\)</span>"#
        );

        let node = display_math("\\int f", MathDelimiters::Latex);
        assert_eq!(
            to_html(&[node]),
            r#"<div class="math math-display">\[\int f\]</div>"#
        );
    }

    #[test]
    fn test_dollar_delimiters() {
        assert_eq!(MathDelimiters::Dollars.inline("a"), "$a$");
        assert_eq!(MathDelimiters::Dollars.display("a"), "$$a$$");
    }

    #[test]
    fn test_tex_is_escaped() {
        let node = inline_math("a < b", MathDelimiters::Latex);
        assert_eq!(
            to_html(&[node]),
            r#"<span class="math math-inline">\(a &lt; b\)</span>"#
        );
    }
}
