//! Block-level parsing for Markdown.

use crate::ast::{Alignment, Block, Inline, ListItem};
use crate::parser::inline::{parse_inlines, raw_html_len};
use crate::parser::lexer::{
    block_quote_marker, closes_fence, fenced_code_start, heading, list_item_marker,
    thematic_break, ListMarker, Token,
};
use crate::parser::{ParseOptions, MAX_NESTING};

/// Tag names that open an HTML block.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "caption", "center", "col", "colgroup",
    "dd", "details", "dialog", "dir", "div", "dl", "dt", "fieldset", "figcaption", "figure",
    "footer", "form", "frame", "frameset", "h1", "h2", "h3", "h4", "h5", "h6", "head", "header",
    "hr", "html", "iframe", "legend", "li", "link", "main", "menu", "menuitem", "nav", "noframes",
    "ol", "optgroup", "option", "p", "param", "pre", "script", "search", "section", "style",
    "summary", "table", "tbody", "td", "textarea", "tfoot", "th", "thead", "title", "tr", "track",
    "ul",
];

/// Parse all blocks from content.
///
/// Never fails: anything that does not form a complete block becomes
/// paragraph text.
pub fn parse_blocks(input: &str, options: &ParseOptions) -> Vec<Block> {
    BlockParser { options, depth: 0 }.parse(input)
}

struct BlockParser<'o> {
    options: &'o ParseOptions,
    depth: usize,
}

impl<'o> BlockParser<'o> {
    fn parse(&self, input: &str) -> Vec<Block> {
        let mut blocks = Vec::new();
        let lines: Vec<&str> = input.lines().collect();
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];

            // Skip blank lines
            if line.trim().is_empty() {
                i += 1;
                continue;
            }

            let rest = &lines[i..];
            let (block, consumed) = if let Some(parsed) = self.try_parse_indented_code(rest) {
                parsed
            } else if let Some(parsed) = self.try_parse_heading(line) {
                parsed
            } else if let Some(parsed) = try_parse_thematic_break(line) {
                parsed
            } else if let Some(parsed) = self.try_parse_fenced_code(rest) {
                parsed
            } else if let Some(parsed) = self.try_parse_display_math(rest) {
                parsed
            } else if let Some(parsed) = self.try_parse_block_quote(rest) {
                parsed
            } else if let Some(parsed) = self.try_parse_list(rest) {
                parsed
            } else if let Some(parsed) = self.try_parse_table(rest) {
                parsed
            } else if let Some(parsed) = try_parse_html_block(rest) {
                parsed
            } else {
                self.parse_paragraph(rest)
            };

            blocks.push(block);
            i += consumed.max(1);
        }

        blocks
    }

    /// Parse nested block content, or keep it as text past the nesting limit.
    fn parse_nested(&self, content: &str) -> Vec<Block> {
        if self.depth >= MAX_NESTING {
            return vec![Block::Paragraph(vec![Inline::Text(content.trim().to_string())])];
        }
        BlockParser {
            options: self.options,
            depth: self.depth + 1,
        }
        .parse(content)
    }

    fn inlines(&self, text: &str) -> Vec<Inline> {
        parse_inlines(text, self.options)
    }

    fn try_parse_indented_code(&self, lines: &[&str]) -> Option<(Block, usize)> {
        if !is_indented_code(lines[0]) {
            return None;
        }

        let mut code_lines = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];
            if is_indented_code(line) {
                code_lines.push(strip_code_indent(line));
            } else if line.trim().is_empty() {
                code_lines.push("");
            } else {
                break;
            }
            i += 1;
        }

        // Trailing blank lines belong to the surrounding document
        while code_lines.last().is_some_and(|l| l.trim().is_empty()) {
            code_lines.pop();
        }

        Some((
            Block::CodeBlock {
                language: None,
                content: code_lines.join("\n"),
            },
            i,
        ))
    }

    fn try_parse_heading(&self, line: &str) -> Option<(Block, usize)> {
        let trimmed = block_start(line)?;
        if !trimmed.starts_with('#') {
            return None;
        }

        match heading(trimmed) {
            Ok((_, Token::Heading(level, content))) => Some((
                Block::Heading {
                    level,
                    content: self.inlines(content),
                },
                1,
            )),
            _ => None,
        }
    }

    fn try_parse_fenced_code(&self, lines: &[&str]) -> Option<(Block, usize)> {
        let first = block_start(lines[0])?;

        let Ok((_, Token::FencedCodeStart(fence, lang))) = fenced_code_start(first) else {
            return None;
        };

        let mut content_lines = Vec::new();
        let mut i = 1;
        let mut closed = false;

        while i < lines.len() {
            if closes_fence(lines[i], fence) {
                closed = true;
                i += 1;
                break;
            }
            content_lines.push(lines[i]);
            i += 1;
        }

        let content = content_lines.join("\n");

        if closed && self.options.math && lang.eq_ignore_ascii_case("math") {
            return Some((Block::DisplayMath(content.trim().to_string()), i));
        }

        // An unclosed fence runs to the end of the document
        Some((
            Block::CodeBlock {
                language: if lang.is_empty() { None } else { Some(lang.to_string()) },
                content,
            },
            i,
        ))
    }

    fn try_parse_display_math(&self, lines: &[&str]) -> Option<(Block, usize)> {
        if !self.options.math {
            return None;
        }

        let first = block_start(lines[0])?.trim_end();
        let after_open = first.strip_prefix("$$")?;

        // Single-line display math
        if let Some(end_pos) = after_open.find("$$") {
            let content = after_open[..end_pos].trim();
            let trailing = after_open[end_pos + 2..].trim();
            if content.is_empty() || !trailing.is_empty() {
                return None;
            }
            return Some((Block::DisplayMath(content.to_string()), 1));
        }

        // Multi-line display math
        let mut content = String::from(after_open);
        let mut i = 1;

        while i < lines.len() {
            let line = lines[i];
            if let Some(end_pos) = line.find("$$") {
                content.push('\n');
                content.push_str(&line[..end_pos]);
                let tex = content.trim();
                if tex.is_empty() {
                    return None;
                }
                return Some((Block::DisplayMath(tex.to_string()), i + 1));
            }
            content.push('\n');
            content.push_str(line);
            i += 1;
        }

        // Unclosed math stays literal
        None
    }

    fn try_parse_block_quote(&self, lines: &[&str]) -> Option<(Block, usize)> {
        let first = block_start(lines[0])?;
        if !first.starts_with('>') {
            return None;
        }

        let mut quote_lines = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let trimmed = lines[i].trim_start();

            if let Ok((content, Token::BlockQuoteMarker)) = block_quote_marker(trimmed) {
                quote_lines.push(content);
                i += 1;
            } else {
                break;
            }
        }

        let inner_content = quote_lines.join("\n");
        Some((Block::BlockQuote(self.parse_nested(&inner_content)), i))
    }

    fn try_parse_list(&self, lines: &[&str]) -> Option<(Block, usize)> {
        let first = lines[0];
        let trimmed = first.trim_start();
        let indent = indent_width(first);

        let Ok((_, Token::ListItemMarker(marker_type))) = list_item_marker(trimmed) else {
            return None;
        };

        let ordered = matches!(marker_type, ListMarker::Ordered(_));
        let start = if let ListMarker::Ordered(n) = marker_type {
            Some(n)
        } else {
            None
        };

        let mut items = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];
            let trimmed = line.trim_start();
            let current_indent = indent_width(line);

            let Ok((rest, Token::ListItemMarker(m))) = list_item_marker(trimmed) else {
                if trimmed.is_empty() {
                    i += 1;
                    continue;
                }
                break;
            };

            let same_type = matches!(m, ListMarker::Ordered(_)) == ordered;
            if current_indent > indent || !same_type || is_thematic_break(line) {
                break;
            }

            let (checked, rest) = match m {
                ListMarker::Checkbox(c) if self.options.gfm.task_lists => (Some(c), rest),
                ListMarker::Checkbox(_) => (None, trimmed[1..].trim_start()),
                _ => (None, rest),
            };
            let content_indent = current_indent + (trimmed.len() - rest.len());

            // Collect item content
            let mut item_lines = vec![rest.to_string()];
            i += 1;

            while i < lines.len() {
                let next_line = lines[i];
                let next_trimmed = next_line.trim_start();
                let next_indent = indent_width(next_line);

                if next_trimmed.is_empty() {
                    // Blank lines continue the item only if indented content follows
                    let mut j = i + 1;
                    while j < lines.len() && lines[j].trim().is_empty() {
                        j += 1;
                    }
                    if j >= lines.len() || indent_width(lines[j]) < content_indent {
                        break;
                    }
                    item_lines.push(String::new());
                    i += 1;
                    continue;
                }

                if next_indent <= indent
                    && (list_item_marker(next_trimmed).is_ok() || is_thematic_break(next_line))
                {
                    break;
                }

                if next_indent < content_indent && item_lines.last().is_some_and(|l| l.is_empty()) {
                    break;
                }

                item_lines.push(strip_indent(next_line, content_indent).to_string());
                i += 1;
            }

            let content = item_lines.join("\n");
            items.push(ListItem {
                content: self.parse_nested(&content),
                checked,
            });
        }

        if items.is_empty() {
            return None;
        }

        // Trailing blank lines are not part of the list
        while i > 0 && lines[i - 1].trim().is_empty() {
            i -= 1;
        }

        Some((
            Block::List {
                ordered,
                start,
                items,
            },
            i,
        ))
    }

    fn try_parse_table(&self, lines: &[&str]) -> Option<(Block, usize)> {
        if !self.options.gfm.tables || !starts_table(lines) {
            return None;
        }

        let header_cells = split_cells(lines[0]);
        let alignments = parse_alignments(lines[1]);
        let width = header_cells.len();

        let headers = header_cells.iter().map(|c| self.inlines(c)).collect();

        // Parse body rows
        let mut rows = Vec::new();
        let mut i = 2;

        while i < lines.len() {
            let line = lines[i];
            if line.trim().is_empty() || !line.contains('|') {
                break;
            }
            let mut cells: Vec<Vec<Inline>> = split_cells(line)
                .iter()
                .take(width)
                .map(|c| self.inlines(c))
                .collect();
            cells.resize(width, Vec::new());
            rows.push(cells);
            i += 1;
        }

        Some((
            Block::Table {
                headers,
                alignments,
                rows,
            },
            i,
        ))
    }

    fn parse_paragraph(&self, lines: &[&str]) -> (Block, usize) {
        let mut para_lines = vec![lines[0].trim_start()];
        let mut i = 1;

        while i < lines.len() {
            let line = lines[i];
            let trimmed = line.trim();

            // End paragraph on blank line
            if trimmed.is_empty() {
                break;
            }

            // Setext underline turns the paragraph into a heading
            if let Some(level) = setext_level(line) {
                let content = para_lines.join("\n");
                return (
                    Block::Heading {
                        level,
                        content: self.inlines(content.trim()),
                    },
                    i + 1,
                );
            }

            if self.interrupts_paragraph(&lines[i..]) {
                break;
            }

            para_lines.push(line.trim_start());
            i += 1;
        }

        let content = para_lines.join("\n");
        (Block::Paragraph(self.inlines(content.trim_end())), i)
    }

    fn interrupts_paragraph(&self, lines: &[&str]) -> bool {
        let line = lines[0];
        let Some(trimmed) = block_start(line) else {
            // Indented lines continue the paragraph
            return false;
        };

        if trimmed.starts_with('#') && heading(trimmed).is_ok() {
            return true;
        }
        if trimmed.starts_with('>') || is_thematic_break(line) {
            return true;
        }
        if fenced_code_start(trimmed).is_ok() {
            return true;
        }
        if self.options.math && trimmed.starts_with("$$") {
            return true;
        }
        match list_item_marker(trimmed) {
            Ok((rest, Token::ListItemMarker(ListMarker::Ordered(n)))) => {
                return n == 1 && !rest.trim().is_empty();
            }
            Ok((rest, _)) => return !rest.trim().is_empty(),
            Err(_) => {}
        }
        if self.options.gfm.tables && starts_table(lines) {
            return true;
        }
        html_block_kind(trimmed).is_some_and(|kind| kind != HtmlBlockKind::Standalone)
    }
}

fn try_parse_thematic_break(line: &str) -> Option<(Block, usize)> {
    is_thematic_break(line).then_some((Block::ThematicBreak, 1))
}

fn is_thematic_break(line: &str) -> bool {
    block_start(line).is_some_and(|t| thematic_break(t.trim_end()).is_ok())
}

/// The line with up to three spaces of indentation removed, if it can start a block.
fn block_start(line: &str) -> Option<&str> {
    if indent_width(line) > 3 {
        None
    } else {
        Some(line.trim_start())
    }
}

fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

fn is_indented_code(line: &str) -> bool {
    !line.trim().is_empty() && indent_width(line) >= 4
}

fn strip_code_indent(line: &str) -> &str {
    line.strip_prefix('\t')
        .or_else(|| line.strip_prefix("    "))
        .unwrap_or_else(|| line.trim_start())
}

/// Remove up to `width` columns of leading whitespace.
fn strip_indent(line: &str, width: usize) -> &str {
    let mut removed = 0;
    for (i, c) in line.char_indices() {
        if removed >= width || !(c == ' ' || c == '\t') {
            return &line[i..];
        }
        removed += if c == '\t' { 4 } else { 1 };
    }
    ""
}

fn setext_level(line: &str) -> Option<u8> {
    let trimmed = block_start(line)?.trim_end();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.chars().all(|c| c == '=') {
        Some(1)
    } else if trimmed.chars().all(|c| c == '-') {
        Some(2)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HtmlBlockKind {
    /// `<!-- ... -->`, ends at the line that closes the comment
    Comment,
    /// `<pre>`, `<script>`, `<style>`, `<textarea>`, ends at the closing tag
    Raw(&'static str),
    /// A block-level tag, ends at a blank line
    Block,
    /// Any complete tag alone on its line, ends at a blank line
    Standalone,
}

fn html_block_kind(trimmed: &str) -> Option<HtmlBlockKind> {
    if trimmed.starts_with("<!--") {
        return Some(HtmlBlockKind::Comment);
    }

    let after = trimmed
        .strip_prefix("</")
        .or_else(|| trimmed.strip_prefix('<'))?;
    let name_end = after
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .unwrap_or(after.len());
    let name = after[..name_end].to_ascii_lowercase();
    let boundary = after[name_end..]
        .chars()
        .next()
        .map_or(true, |c| c.is_whitespace() || c == '>' || c == '/');

    if !name.is_empty() && boundary {
        let opening = !trimmed.starts_with("</");
        for raw in ["pre", "script", "style", "textarea"] {
            if opening && name == raw {
                return Some(HtmlBlockKind::Raw(raw));
            }
        }
        if BLOCK_TAGS.contains(&name.as_str()) {
            return Some(HtmlBlockKind::Block);
        }
    }

    let line = trimmed.trim_end();
    (raw_html_len(line) == Some(line.len())).then_some(HtmlBlockKind::Standalone)
}

fn try_parse_html_block(lines: &[&str]) -> Option<(Block, usize)> {
    let first = block_start(lines[0])?;
    let kind = html_block_kind(first)?;

    let mut i = 0;
    match kind {
        HtmlBlockKind::Comment | HtmlBlockKind::Raw(_) => {
            let terminator = match kind {
                HtmlBlockKind::Raw(name) => format!("</{}>", name),
                _ => "-->".to_string(),
            };
            while i < lines.len() {
                let done = lines[i].to_ascii_lowercase().contains(&terminator);
                i += 1;
                if done {
                    break;
                }
            }
        }
        HtmlBlockKind::Block | HtmlBlockKind::Standalone => {
            while i < lines.len() && !lines[i].trim().is_empty() {
                i += 1;
            }
        }
    }

    Some((Block::RawHtml(lines[..i].join("\n")), i))
}

/// A header row followed by a matching delimiter row.
fn starts_table(lines: &[&str]) -> bool {
    if lines.len() < 2 || !lines[0].contains('|') || !is_table_delimiter(lines[1]) {
        return false;
    }
    split_cells(lines[0]).len() == split_cells(lines[1]).len()
}

fn is_table_delimiter(line: &str) -> bool {
    let trimmed = line.trim();
    if !trimmed.contains('|') && !trimmed.contains('-') {
        return false;
    }

    let cells = split_cells(trimmed);
    !cells.is_empty()
        && cells.iter().all(|cell| {
            let inner = cell.strip_prefix(':').unwrap_or(cell);
            let inner = inner.strip_suffix(':').unwrap_or(inner);
            !inner.is_empty() && inner.chars().all(|c| c == '-')
        })
}

fn parse_alignments(line: &str) -> Vec<Alignment> {
    split_cells(line)
        .iter()
        .map(|cell| {
            let left = cell.starts_with(':');
            let right = cell.ends_with(':');
            match (left, right) {
                (true, true) => Alignment::Center,
                (false, true) => Alignment::Right,
                (true, false) => Alignment::Left,
                (false, false) => Alignment::None,
            }
        })
        .collect()
}

/// Split a table row on unescaped pipes; `\|` becomes a literal pipe.
fn split_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let trimmed = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let trimmed = if trimmed.ends_with('|') && !trimmed.ends_with("\\|") {
        &trimmed[..trimmed.len() - 1]
    } else {
        trimmed
    };

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = trimmed.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    cells.push(current.trim().to_string());

    cells
}
