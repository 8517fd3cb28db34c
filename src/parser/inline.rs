//! Inline-level parsing for Markdown.

use crate::ast::Inline;
use crate::parser::lexer::{display_math, emphasis, inline_math, strong, Token};
use crate::parser::{ParseOptions, MAX_NESTING};

/// Parse inline content from a string.
///
/// Never fails: constructs that do not close are kept as literal text.
pub fn parse_inlines(input: &str, options: &ParseOptions) -> Vec<Inline> {
    InlineParser { options, depth: 0 }.parse(input)
}

struct InlineParser<'o> {
    options: &'o ParseOptions,
    depth: usize,
}

impl<'o> InlineParser<'o> {
    fn nested(&self) -> Option<InlineParser<'o>> {
        if self.depth >= MAX_NESTING {
            return None;
        }
        Some(InlineParser {
            options: self.options,
            depth: self.depth + 1,
        })
    }

    fn parse(&self, input: &str) -> Vec<Inline> {
        let mut inlines = Vec::new();
        let mut text = String::new();
        let mut pos = 0;

        while pos < input.len() {
            let remaining = &input[pos..];
            let prev = input[..pos].chars().next_back();

            if let Some((inline, rest)) = self.try_parse_inline(remaining, prev) {
                flush_text(&mut text, &mut inlines);
                inlines.push(inline);
                pos = input.len() - rest.len();
                continue;
            }

            let Some(c) = remaining.chars().next() else {
                break;
            };

            match c {
                '\\' => {
                    let next = remaining[1..].chars().next();
                    match next {
                        Some(n) if n.is_ascii_punctuation() => {
                            text.push(n);
                            pos += 1 + n.len_utf8();
                        }
                        Some('\n') => {
                            flush_text(&mut text, &mut inlines);
                            inlines.push(Inline::HardBreak);
                            pos += 2;
                            pos += leading_spaces(&input[pos..]);
                        }
                        _ => {
                            text.push('\\');
                            pos += 1;
                        }
                    }
                }
                '\n' => {
                    let hard = text.ends_with("  ");
                    let kept = text.trim_end_matches([' ', '\t']).len();
                    text.truncate(kept);
                    flush_text(&mut text, &mut inlines);
                    inlines.push(if hard { Inline::HardBreak } else { Inline::SoftBreak });
                    pos += 1;
                    pos += leading_spaces(&input[pos..]);
                }
                '`' => {
                    // An unmatched backtick run stays literal as a whole
                    let run = remaining.len() - remaining.trim_start_matches('`').len();
                    text.push_str(&remaining[..run]);
                    pos += run;
                }
                _ => {
                    text.push(c);
                    pos += c.len_utf8();
                }
            }
        }

        flush_text(&mut text, &mut inlines);
        inlines
    }

    fn try_parse_inline<'a>(&self, input: &'a str, prev: Option<char>) -> Option<(Inline, &'a str)> {
        let first = input.chars().next()?;

        match first {
            '$' if self.options.math => self.try_parse_math(input),
            '`' => try_parse_code(input),
            '*' | '_' => self.try_parse_emphasis(input, prev),
            '~' if self.options.gfm.strikethrough => self.try_parse_strikethrough(input),
            '!' => try_parse_image(input),
            '[' => self.try_parse_link(input),
            '<' => try_parse_autolink(input).or_else(|| try_parse_raw_html(input)),
            'h' | 'w' | 'H' | 'W' if self.options.gfm.autolinks => {
                if prev.is_some_and(|p| p.is_alphanumeric()) {
                    return None;
                }
                try_parse_bare_url(input)
            }
            _ => None,
        }
    }

    fn try_parse_math<'a>(&self, input: &'a str) -> Option<(Inline, &'a str)> {
        if input.starts_with("$$") {
            if let Ok((rest, Token::DisplayMath(content))) = display_math(input) {
                return Some((Inline::InlineMath(content.trim().to_string()), rest));
            }
            return None;
        }

        match inline_math(input) {
            Ok((rest, Token::InlineMath(content))) => {
                Some((Inline::InlineMath(content.to_string()), rest))
            }
            _ => None,
        }
    }

    fn try_parse_emphasis<'a>(&self, input: &'a str, prev: Option<char>) -> Option<(Inline, &'a str)> {
        let marker = input.chars().next()?;

        // No intraword underscore emphasis
        if marker == '_' && prev.is_some_and(|p| p.is_alphanumeric()) {
            return None;
        }

        let inner = self.nested()?;

        let triple: String = std::iter::repeat(marker).take(3).collect();
        if input.starts_with(&triple) {
            if let Some(end) = input[3..].find(&triple) {
                let content = &input[3..3 + end];
                let rest = &input[3 + end + 3..];
                if is_flanked(content) && closes_cleanly(marker, rest) {
                    let strong = Inline::Strong(inner.parse(content));
                    return Some((Inline::Emphasis(vec![strong]), rest));
                }
            }
        }

        let parsed = if input[marker.len_utf8()..].starts_with(marker) {
            strong(input)
        } else {
            emphasis(input)
        };

        match parsed {
            Ok((rest, Token::Strong(content))) if closes_cleanly(marker, rest) => {
                Some((Inline::Strong(inner.parse(content)), rest))
            }
            Ok((rest, Token::Emphasis(content))) if closes_cleanly(marker, rest) => {
                Some((Inline::Emphasis(inner.parse(content)), rest))
            }
            _ => None,
        }
    }

    fn try_parse_strikethrough<'a>(&self, input: &'a str) -> Option<(Inline, &'a str)> {
        let body = input.strip_prefix("~~")?;
        let end = body.find("~~")?;
        let content = &body[..end];
        if !is_flanked(content) {
            return None;
        }
        let rest = &body[end + 2..];
        Some((Inline::Strikethrough(self.nested()?.parse(content)), rest))
    }

    fn try_parse_link<'a>(&self, input: &'a str) -> Option<(Inline, &'a str)> {
        // [text](url "title")
        let text_end = matching_bracket(input)?;
        let text = &input[1..text_end];
        let after_text = &input[text_end + 1..];

        let (url_part, rest) = parenthesized(after_text)?;
        let (url, title) = parse_url_and_title(url_part);

        let content = self.nested()?.parse(text);

        Some((
            Inline::Link {
                url: url.to_string(),
                title: title.map(String::from),
                content,
            },
            rest,
        ))
    }
}

fn flush_text(text: &mut String, inlines: &mut Vec<Inline>) {
    if !text.is_empty() {
        inlines.push(Inline::Text(std::mem::take(text)));
    }
}

fn leading_spaces(s: &str) -> usize {
    s.len() - s.trim_start_matches([' ', '\t']).len()
}

fn is_flanked(content: &str) -> bool {
    let starts = content.chars().next().is_some_and(|c| !c.is_whitespace());
    let ends = content.chars().last().is_some_and(|c| !c.is_whitespace());
    starts && ends
}

/// A closing `_` run may not be followed by a word character.
fn closes_cleanly(marker: char, rest: &str) -> bool {
    marker != '_' || !rest.chars().next().is_some_and(|c| c.is_alphanumeric())
}

fn try_parse_code(input: &str) -> Option<(Inline, &str)> {
    let run = input.len() - input.trim_start_matches('`').len();
    let body = &input[run..];

    // Find a closing run of exactly the same length
    let mut offset = 0;
    while offset < body.len() {
        let found = body[offset..].find('`')? + offset;
        let close = body[found..].len() - body[found..].trim_start_matches('`').len();
        if close == run {
            let raw = body[..found].replace('\n', " ");
            let content = if raw.len() >= 2
                && raw.starts_with(' ')
                && raw.ends_with(' ')
                && !raw.trim().is_empty()
            {
                raw[1..raw.len() - 1].to_string()
            } else {
                raw
            };
            return Some((Inline::Code(content), &body[found + close..]));
        }
        offset = found + close;
    }

    None
}

fn try_parse_image(input: &str) -> Option<(Inline, &str)> {
    // ![alt](url "title")
    let bracketed = input.strip_prefix('!')?;
    let close_bracket = matching_bracket(bracketed)?;
    let alt = &bracketed[1..close_bracket];
    let (url_part, rest) = parenthesized(&bracketed[close_bracket + 1..])?;
    let (url, title) = parse_url_and_title(url_part);

    Some((
        Inline::Image {
            url: url.to_string(),
            alt: alt.to_string(),
            title: title.map(String::from),
        },
        rest,
    ))
}

/// Index of the `]` matching the leading `[`.
fn matching_bracket(input: &str) -> Option<usize> {
    if !input.starts_with('[') {
        return None;
    }

    let mut depth = 0;
    let mut escaped = false;

    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

/// Split `(inner)rest`, handling nested parens.
fn parenthesized(input: &str) -> Option<(&str, &str)> {
    if !input.starts_with('(') {
        return None;
    }

    let mut depth = 0;
    for (i, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some((&input[1..i], &input[i + 1..]));
                }
            }
            '\n' if input[1..i].contains('\n') => return None,
            _ => {}
        }
    }

    None
}

fn parse_url_and_title(input: &str) -> (&str, Option<&str>) {
    let input = input.trim();

    let (url, after) = if let Some(stripped) = input.strip_prefix('<') {
        match stripped.find('>') {
            Some(end) => (&stripped[..end], stripped[end + 1..].trim()),
            None => (input, ""),
        }
    } else {
        match input.find(char::is_whitespace) {
            Some(split) => (&input[..split], input[split..].trim()),
            None => (input, ""),
        }
    };

    // Title in double quotes, single quotes, or parens
    for (open, close) in [('"', '"'), ('\'', '\''), ('(', ')')] {
        if after.len() >= 2 && after.starts_with(open) && after.ends_with(close) {
            return (url, Some(&after[1..after.len() - 1]));
        }
    }

    (url, None)
}

fn try_parse_autolink(input: &str) -> Option<(Inline, &str)> {
    let body = input.strip_prefix('<')?;
    let end = body.find('>')?;
    let target = &body[..end];
    let rest = &body[end + 1..];

    if target.is_empty() || target.contains(|c: char| c.is_whitespace() || c == '<') {
        return None;
    }

    let url = if is_uri(target) {
        target.to_string()
    } else if is_email(target) {
        format!("mailto:{}", target)
    } else {
        return None;
    };

    Some((
        Inline::Link {
            url,
            title: None,
            content: vec![Inline::Text(target.to_string())],
        },
        rest,
    ))
}

fn is_uri(s: &str) -> bool {
    let Some((scheme, _)) = s.split_once(':') else {
        return false;
    };
    (2..=32).contains(&scheme.len())
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
}

fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || ".!#$%&'*+/=?^_`{|}~-".contains(c))
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-'))
}

fn try_parse_bare_url(input: &str) -> Option<(Inline, &str)> {
    let lower: String = input.chars().take(8).collect::<String>().to_ascii_lowercase();
    let (prefix_len, needs_scheme) = if lower.starts_with("https://") {
        (8, false)
    } else if lower.starts_with("http://") {
        (7, false)
    } else if lower.starts_with("www.") {
        (4, true)
    } else {
        return None;
    };

    let end = input
        .find(|c: char| c.is_whitespace() || c == '<')
        .unwrap_or(input.len());
    let mut candidate = &input[..end];

    // Trailing punctuation is not part of the link
    loop {
        let trimmed = candidate.trim_end_matches(['?', '!', '.', ',', ':', '*', '_', '~', '\'', '"']);
        let trimmed = if trimmed.ends_with(')')
            && trimmed.matches(')').count() > trimmed.matches('(').count()
        {
            &trimmed[..trimmed.len() - 1]
        } else {
            trimmed
        };
        if trimmed.len() == candidate.len() {
            break;
        }
        candidate = trimmed;
    }

    let host = &candidate[prefix_len.min(candidate.len())..];
    if host.is_empty() || !host.starts_with(|c: char| c.is_alphanumeric()) {
        return None;
    }

    let url = if needs_scheme {
        format!("http://{}", candidate)
    } else {
        candidate.to_string()
    };

    Some((
        Inline::Link {
            url,
            title: None,
            content: vec![Inline::Text(candidate.to_string())],
        },
        &input[candidate.len()..],
    ))
}

fn try_parse_raw_html(input: &str) -> Option<(Inline, &str)> {
    let end = raw_html_len(input)?;
    Some((Inline::RawHtml(input[..end].to_string()), &input[end..]))
}

/// Byte length of an HTML tag or comment at the start of `input`.
pub(crate) fn raw_html_len(input: &str) -> Option<usize> {
    if let Some(body) = input.strip_prefix("<!--") {
        return body.find("-->").map(|end| 4 + end + 3);
    }

    let (after_open, closing) = match input.strip_prefix("</") {
        Some(rest) => (rest, true),
        None => (input.strip_prefix('<')?, false),
    };

    let name_len = tag_name_len(after_open)?;
    let after_name = &after_open[name_len..];
    let open_len = input.len() - after_open.len();

    if closing {
        let trimmed = after_name.trim_start();
        return trimmed
            .strip_prefix('>')
            .map(|_| open_len + name_len + (after_name.len() - trimmed.len()) + 1);
    }

    match after_name.chars().next()? {
        '>' => return Some(open_len + name_len + 1),
        '/' if after_name.starts_with("/>") => return Some(open_len + name_len + 2),
        c if c.is_whitespace() => {}
        _ => return None,
    }

    // Attributes: scan to the closing `>` outside of quotes
    let mut quote: Option<char> = None;
    for (i, c) in after_name.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '<') => return None,
            (None, '>') => return Some(open_len + name_len + i + 1),
            _ => {}
        }
    }

    None
}

fn tag_name_len(s: &str) -> Option<usize> {
    if !s.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }
    Some(
        s.find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
            .unwrap_or(s.len()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(input: &str) -> Vec<Inline> {
        parse_inlines(input, &ParseOptions::default())
    }

    fn text(s: &str) -> Inline {
        Inline::Text(s.to_string())
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(parse("Hello, world!"), vec![text("Hello, world!")]);
    }

    #[test]
    fn test_emphasis() {
        let inlines = parse("Hello *world*!");
        assert_eq!(inlines.len(), 3);
        assert!(matches!(&inlines[1], Inline::Emphasis(_)));
    }

    #[test]
    fn test_strong() {
        let inlines = parse("Hello **world**!");
        assert!(matches!(&inlines[1], Inline::Strong(_)));
    }

    #[test]
    fn test_strong_emphasis() {
        let inlines = parse("***both***");
        assert_eq!(
            inlines,
            vec![Inline::Emphasis(vec![Inline::Strong(vec![text("both")])])]
        );
    }

    #[test]
    fn test_intraword_underscore() {
        assert_eq!(parse("snake_case_name"), vec![text("snake_case_name")]);
    }

    #[test]
    fn test_inline_math() {
        let inlines = parse("The equation $E = mc^2$ is famous.");
        assert_eq!(
            inlines,
            vec![
                text("The equation "),
                Inline::InlineMath("E = mc^2".into()),
                text(" is famous."),
            ]
        );
    }

    #[test]
    fn test_unclosed_math_is_literal() {
        assert_eq!(parse("costs $5 total"), vec![text("costs $5 total")]);
    }

    #[test]
    fn test_math_disabled() {
        let options = ParseOptions {
            math: false,
            ..Default::default()
        };
        assert_eq!(parse_inlines("$x$", &options), vec![text("$x$")]);
    }

    #[test]
    fn test_escapes() {
        assert_eq!(parse(r"\*not emphasis\* and \$5"), vec![text("*not emphasis* and $5")]);
    }

    #[test]
    fn test_code_span() {
        assert_eq!(
            parse("use `` a`b `` here"),
            vec![text("use "), Inline::Code("a`b".into()), text(" here")]
        );
        assert_eq!(parse("a ` lone"), vec![text("a ` lone")]);
    }

    #[test]
    fn test_strikethrough() {
        let inlines = parse("~~gone~~ stays");
        assert_eq!(
            inlines,
            vec![Inline::Strikethrough(vec![text("gone")]), text(" stays")]
        );
    }

    #[test]
    fn test_link() {
        let inlines = parse("Click [here](https://example.com \"Title\")!");
        let link = inlines.iter().find(|i| matches!(i, Inline::Link { .. }));
        if let Some(Inline::Link { url, title, .. }) = link {
            assert_eq!(url, "https://example.com");
            assert_eq!(title.as_deref(), Some("Title"));
        } else {
            panic!("Expected link");
        }
    }

    #[test]
    fn test_bracket_without_url_is_text() {
        assert_eq!(parse("see [1] here"), vec![text("see [1] here")]);
    }

    #[test]
    fn test_image() {
        let inlines = parse("![a cat](/img/cat.png)");
        assert_eq!(
            inlines,
            vec![Inline::Image {
                url: "/img/cat.png".into(),
                alt: "a cat".into(),
                title: None,
            }]
        );
    }

    #[test]
    fn test_angle_autolink() {
        let inlines = parse("<https://example.com/a> and <me@example.com>");
        assert!(matches!(&inlines[0], Inline::Link { url, .. } if url == "https://example.com/a"));
        assert!(matches!(&inlines[2], Inline::Link { url, .. } if url == "mailto:me@example.com"));
    }

    #[test]
    fn test_bare_autolink() {
        let inlines = parse("Visit https://example.com/path. Or www.example.org, too.");
        assert_eq!(
            inlines,
            vec![
                text("Visit "),
                Inline::Link {
                    url: "https://example.com/path".into(),
                    title: None,
                    content: vec![text("https://example.com/path")],
                },
                text(". Or "),
                Inline::Link {
                    url: "http://www.example.org".into(),
                    title: None,
                    content: vec![text("www.example.org")],
                },
                text(", too."),
            ]
        );
    }

    #[test]
    fn test_bare_autolink_balanced_parens() {
        let inlines = parse("(see https://en.wikipedia.org/wiki/Foo_(bar))");
        assert!(matches!(
            &inlines[1],
            Inline::Link { url, .. } if url == "https://en.wikipedia.org/wiki/Foo_(bar)"
        ));
        assert_eq!(inlines[2], text(")"));
    }

    #[test]
    fn test_raw_html() {
        let inlines = parse(r#"a <span class="x">b</span> c"#);
        assert_eq!(
            inlines,
            vec![
                text("a "),
                Inline::RawHtml(r#"<span class="x">"#.into()),
                text("b"),
                Inline::RawHtml("</span>".into()),
                text(" c"),
            ]
        );
    }

    #[test]
    fn test_less_than_is_text() {
        assert_eq!(parse("a < b and 3<4"), vec![text("a < b and 3<4")]);
    }

    #[test]
    fn test_line_breaks() {
        let inlines = parse("one  \ntwo\nthree");
        assert_eq!(
            inlines,
            vec![
                text("one"),
                Inline::HardBreak,
                text("two"),
                Inline::SoftBreak,
                text("three"),
            ]
        );
    }
}
