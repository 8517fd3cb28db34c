//! Conversion from the Markdown AST to an HTML node tree.

use crate::ast::{Alignment, Block, Inline, ListItem};
use crate::citations::plain_citations;
use crate::render::math::{display_math, inline_math, MathDelimiters};

/// A node in the HTML tree.
#[derive(Debug, Clone, PartialEq)]
pub enum HtmlNode {
    Element(Element),
    /// Text, escaped on serialization
    Text(String),
    /// Text shown exactly as written, such as code and TeX
    Verbatim(String),
    /// Markup written out verbatim
    Raw(String),
}

impl HtmlNode {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn verbatim(s: impl Into<String>) -> Self {
        Self::Verbatim(s.into())
    }

    pub fn raw(s: impl Into<String>) -> Self {
        Self::Raw(s.into())
    }
}

/// An HTML element with ordered attributes.
///
/// An attribute without a value is written as a bare name (`disabled`).
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: &'static str,
    pub attrs: Vec<(&'static str, Option<String>)>,
    pub children: Vec<HtmlNode>,
}

impl Element {
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.attrs.push((name, Some(value.into())));
        self
    }

    pub fn flag(mut self, name: &'static str) -> Self {
        self.attrs.push((name, None));
        self
    }

    pub fn child(mut self, node: HtmlNode) -> Self {
        self.children.push(node);
        self
    }

    pub fn children(mut self, nodes: impl IntoIterator<Item = HtmlNode>) -> Self {
        self.children.extend(nodes);
        self
    }

    /// Children each on their own line, as in block containers.
    pub fn block_children(mut self, nodes: Vec<HtmlNode>) -> Self {
        self.children.push(HtmlNode::text("\n"));
        for node in nodes {
            self.children.push(node);
            self.children.push(HtmlNode::text("\n"));
        }
        self
    }
}

impl From<Element> for HtmlNode {
    fn from(element: Element) -> Self {
        HtmlNode::Element(element)
    }
}

/// Build the HTML tree for a block sequence.
pub fn build_tree(blocks: &[Block], math: MathDelimiters) -> Vec<HtmlNode> {
    TreeBuilder { math }.blocks(blocks)
}

struct TreeBuilder {
    math: MathDelimiters,
}

impl TreeBuilder {
    fn blocks(&self, blocks: &[Block]) -> Vec<HtmlNode> {
        blocks.iter().map(|b| self.block(b)).collect()
    }

    fn block(&self, block: &Block) -> HtmlNode {
        match block {
            Block::Paragraph(inlines) => Element::new("p").children(self.inlines(inlines)).into(),
            Block::Heading { level, content } => Element::new(heading_tag(*level))
                .children(self.inlines(content))
                .into(),
            Block::CodeBlock { language, content } => {
                let mut code = Element::new("code");
                if let Some(lang) = language {
                    code = code.attr("class", format!("language-{}", lang));
                }
                let mut text = plain_citations(content).into_owned();
                if !text.is_empty() {
                    text.push('\n');
                }
                Element::new("pre").child(code.child(HtmlNode::verbatim(text)).into()).into()
            }
            Block::BlockQuote(inner) => Element::new("blockquote")
                .block_children(self.blocks(inner))
                .into(),
            Block::List {
                ordered,
                start,
                items,
            } => self.list(*ordered, *start, items),
            Block::ThematicBreak => Element::new("hr").into(),
            Block::DisplayMath(tex) => display_math(tex, self.math),
            Block::RawHtml(html) => HtmlNode::raw(html.as_str()),
            Block::Table {
                headers,
                alignments,
                rows,
            } => self.table(headers, alignments, rows),
        }
    }

    fn list(&self, ordered: bool, start: Option<u32>, items: &[ListItem]) -> HtmlNode {
        let mut list = Element::new(if ordered { "ol" } else { "ul" });
        if let Some(n) = start.filter(|n| *n != 1) {
            list = list.attr("start", n.to_string());
        }
        if items.iter().any(|i| i.checked.is_some()) {
            list = list.attr("class", "contains-task-list");
        }

        let items = items.iter().map(|item| self.list_item(item)).collect();
        list.block_children(items).into()
    }

    fn list_item(&self, item: &ListItem) -> HtmlNode {
        let mut li = Element::new("li");
        let mut lead = Vec::new();

        if let Some(checked) = item.checked {
            li = li.attr("class", "task-list-item");
            let mut input = Element::new("input").attr("type", "checkbox");
            if checked {
                input = input.flag("checked");
            }
            lead.push(input.flag("disabled").into());
            lead.push(HtmlNode::text(" "));
        }

        // Tight items render their paragraph inline
        match item.content.as_slice() {
            [] => li.children(lead).into(),
            [Block::Paragraph(inlines)] => li.children(lead).children(self.inlines(inlines)).into(),
            blocks => {
                let mut children = self.blocks(blocks);
                if !lead.is_empty() {
                    if let Some(HtmlNode::Element(first)) = children.first_mut() {
                        if first.tag == "p" {
                            lead.append(&mut first.children);
                            first.children = lead;
                        }
                    }
                }
                li.block_children(children).into()
            }
        }
    }

    fn table(
        &self,
        headers: &[Vec<Inline>],
        alignments: &[Alignment],
        rows: &[Vec<Vec<Inline>>],
    ) -> HtmlNode {
        let row = |tag: &'static str, cells: &[Vec<Inline>]| -> HtmlNode {
            let cells = cells
                .iter()
                .enumerate()
                .map(|(i, cell)| {
                    let mut el = Element::new(tag);
                    if let Some(align) = alignment_attr(alignments.get(i).copied()) {
                        el = el.attr("align", align);
                    }
                    el.children(self.inlines(cell)).into()
                })
                .collect();
            Element::new("tr").block_children(cells).into()
        };

        let thead = Element::new("thead").block_children(vec![row("th", headers)]);
        let mut sections = vec![thead.into()];

        if !rows.is_empty() {
            let body_rows = rows.iter().map(|r| row("td", r)).collect();
            sections.push(Element::new("tbody").block_children(body_rows).into());
        }

        Element::new("table").block_children(sections).into()
    }

    fn inlines(&self, inlines: &[Inline]) -> Vec<HtmlNode> {
        let mut nodes = Vec::with_capacity(inlines.len());
        for inline in inlines {
            self.inline(inline, &mut nodes);
        }
        nodes
    }

    fn inline(&self, inline: &Inline, out: &mut Vec<HtmlNode>) {
        let node = match inline {
            Inline::Text(text) => HtmlNode::text(text.as_str()),
            Inline::Emphasis(inner) => Element::new("em").children(self.inlines(inner)).into(),
            Inline::Strong(inner) => Element::new("strong").children(self.inlines(inner)).into(),
            Inline::Strikethrough(inner) => Element::new("del").children(self.inlines(inner)).into(),
            Inline::Code(code) => Element::new("code")
                .child(HtmlNode::verbatim(plain_citations(code)))
                .into(),
            Inline::Link { url, title, content } => {
                let mut a = Element::new("a").attr("href", url.as_str());
                if let Some(title) = title {
                    a = a.attr("title", title.as_str());
                }
                a.children(self.inlines(content)).into()
            }
            Inline::Image { url, alt, title } => {
                let mut img = Element::new("img")
                    .attr("src", url.as_str())
                    .attr("alt", alt.as_str());
                if let Some(title) = title {
                    img = img.attr("title", title.as_str());
                }
                img.into()
            }
            Inline::InlineMath(tex) => inline_math(tex, self.math),
            Inline::SoftBreak => HtmlNode::text("\n"),
            Inline::HardBreak => {
                out.push(Element::new("br").into());
                HtmlNode::text("\n")
            }
            Inline::RawHtml(html) => HtmlNode::raw(html.as_str()),
        };
        out.push(node);
    }
}

fn heading_tag(level: u8) -> &'static str {
    match level {
        1 => "h1",
        2 => "h2",
        3 => "h3",
        4 => "h4",
        5 => "h5",
        _ => "h6",
    }
}

fn alignment_attr(align: Option<Alignment>) -> Option<&'static str> {
    match align? {
        Alignment::None => None,
        Alignment::Left => Some("left"),
        Alignment::Center => Some("center"),
        Alignment::Right => Some("right"),
    }
}
