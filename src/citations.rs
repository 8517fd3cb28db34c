//! Citation token rewriting.
//!
//! `[@key]` markers in a post body are numbered by first appearance and
//! replaced with inline HTML placeholders before the Markdown is parsed.
//! Placeholders that land in code or math are turned back into plain
//! `[n]` labels by [`plain_citations`].

use nom::{
    bytes::complete::{tag, take_while1},
    character::complete::char,
    sequence::delimited,
    IResult,
};
use std::borrow::Cow;
use std::collections::HashMap;

/// A post body with its citation tokens replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitedBody {
    /// The rewritten body
    pub text: String,
    /// Unique keys in order of first appearance
    pub keys: Vec<String>,
}

impl CitedBody {
    /// The 1-based number assigned to `key`.
    pub fn number_of(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|k| k == key).map(|i| i + 1)
    }
}

/// Replace every `[@key]` token with a numbered placeholder.
///
/// `resolves` reports whether a key has a bibliography entry; resolved
/// citations link to their reference, the rest render as plain numbers.
/// A backslash escaping the opening bracket is dropped along with the token.
pub fn rewrite_citations(body: &str, resolves: impl Fn(&str) -> bool) -> CitedBody {
    let mut text = String::with_capacity(body.len());
    let mut keys: Vec<String> = Vec::new();
    let mut numbers: HashMap<&str, usize> = HashMap::new();
    let mut rest = body;

    while let Some(pos) = rest.find("[@") {
        let (before, candidate) = rest.split_at(pos);
        text.push_str(before);

        match citation_token(candidate) {
            Ok((after, key)) => {
                if is_escaped(before) {
                    text.pop();
                }
                let number = *numbers.entry(key).or_insert_with(|| {
                    keys.push(key.to_string());
                    keys.len()
                });
                text.push_str(&placeholder(key, number, resolves(key)));
                rest = after;
            }
            Err(_) => {
                text.push_str("[@");
                rest = &candidate[2..];
            }
        }
    }

    text.push_str(rest);
    CitedBody { text, keys }
}

/// Parse `[@key]` where the key is one or more non-`]` characters.
fn citation_token(input: &str) -> IResult<&str, &str> {
    delimited(tag("[@"), take_while1(|c| c != ']'), char(']'))(input)
}

/// An odd run of trailing backslashes escapes the next character.
fn is_escaped(before: &str) -> bool {
    let run = before.len() - before.trim_end_matches('\\').len();
    run % 2 == 1
}

fn placeholder(key: &str, number: usize, resolved: bool) -> String {
    let escaped = encode_key(key);
    if resolved {
        format!(
            r##"<a class="citation" href="#{}" data-cite-key="{}" data-cite-number="{}">[{}]</a>"##,
            anchor_id(key),
            escaped,
            number,
            number
        )
    } else {
        format!(
            r#"<span class="citation" data-cite-key="{}" data-cite-number="{}">[{}]</span>"#,
            escaped, number, number
        )
    }
}

/// Encode a key for an attribute value that must survive Markdown parsing.
///
/// Line breaks, table pipes, and inline delimiters become numeric character
/// references, so the placeholder stays on one line and in one cell.
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for c in key.chars() {
        let keep = c.is_alphanumeric()
            || matches!(c, '-' | '.' | ':' | '/' | '@' | '+' | ',' | ';' | '=' | '?' | '%' | '#' | '\'' | ' ')
            || (!c.is_ascii() && !c.is_control());
        if keep {
            encoded.push(c);
        } else {
            encoded.push_str(&format!("&#{};", u32::from(c)));
        }
    }
    encoded
}

/// Replace citation placeholders with their `[n]` labels.
///
/// Code spans, code blocks, and math show text exactly as written, so a
/// placeholder rewritten inside them is reduced to the number a reader sees.
pub fn plain_citations(text: &str) -> Cow<'_, str> {
    if !text.contains("data-cite-number=") {
        return Cow::Borrowed(text);
    }

    let mut plain = String::with_capacity(text.len());
    let mut rest = text;
    while let Some((start, label, len)) = next_placeholder(rest) {
        plain.push_str(&rest[..start]);
        plain.push_str(label);
        rest = &rest[start + len..];
    }
    plain.push_str(rest);
    Cow::Owned(plain)
}

/// Position, label, and length of the first placeholder in `text`.
fn next_placeholder(text: &str) -> Option<(usize, &str, usize)> {
    let mut from = 0;
    while let Some(pos) = text[from..].find('<') {
        let start = from + pos;
        if let Some((label, len)) = placeholder_at(&text[start..]) {
            return Some((start, label, len));
        }
        from = start + 1;
    }
    None
}

fn placeholder_at(s: &str) -> Option<(&str, usize)> {
    let close = if s.starts_with(r#"<a class="citation" "#) {
        "</a>"
    } else if s.starts_with(r#"<span class="citation" "#) {
        "</span>"
    } else {
        return None;
    };

    let open_end = s.find('>')? + 1;
    if !s[..open_end].contains("data-cite-number=") {
        return None;
    }
    let label_len = s[open_end..].find(close)?;
    let label = &s[open_end..open_end + label_len];

    let is_number = label
        .strip_prefix('[')
        .and_then(|l| l.strip_suffix(']'))
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()));
    is_number.then_some((label, open_end + label_len + close.len()))
}

/// Element id of the reference entry for `key`.
pub fn anchor_id(key: &str) -> String {
    format!("ref-{}", label_to_id(key))
}

/// Convert a label to a valid HTML id.
fn label_to_id(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn span(key: &str, n: usize) -> String {
        format!(
            r#"<span class="citation" data-cite-key="{}" data-cite-number="{}">[{}]</span>"#,
            key, n, n
        )
    }

    #[test]
    fn test_numbers_by_first_appearance() {
        let body = "See [@smith2020] and [@smith2020] again, also [@jones1999].";
        let cited = rewrite_citations(body, |key| key == "jones1999");

        assert_eq!(cited.keys, vec!["smith2020", "jones1999"]);
        assert_eq!(cited.number_of("smith2020"), Some(1));
        assert_eq!(cited.number_of("jones1999"), Some(2));
        assert_eq!(cited.number_of("nobody"), None);

        let expected = format!(
            "See {} and {} again, also {}.",
            span("smith2020", 1),
            span("smith2020", 1),
            r##"<a class="citation" href="#ref-jones1999" data-cite-key="jones1999" data-cite-number="2">[2]</a>"##
        );
        assert_eq!(cited.text, expected);
    }

    #[test]
    fn test_no_tokens_is_unchanged() {
        let body = "Plain [text](https://example.com) with [brackets] and @handles.";
        let cited = rewrite_citations(body, |_| true);
        assert_eq!(cited.text, body);
        assert!(cited.keys.is_empty());
    }

    #[test]
    fn test_empty_key_is_literal() {
        let cited = rewrite_citations("An empty [@] token and [@unterminated", |_| true);
        assert_eq!(cited.text, "An empty [@] token and [@unterminated");
        assert!(cited.keys.is_empty());
    }

    #[test]
    fn test_escaped_token_is_still_numbered() {
        let cited = rewrite_citations(r"Cite \[@k] here, and [@k] again.", |_| false);
        assert_eq!(
            cited.text,
            format!("Cite {} here, and {} again.", span("k", 1), span("k", 1))
        );
        assert_eq!(cited.keys, vec!["k"]);

        let cited = rewrite_citations(r"A literal backslash \\[@k].", |_| false);
        assert_eq!(cited.text, format!(r"A literal backslash \\{}.", span("k", 1)));
    }

    #[test]
    fn test_key_is_encoded() {
        let cited = rewrite_citations("[@a\"b<c]", |_| true);
        assert_eq!(
            cited.text,
            r##"<a class="citation" href="#ref-a-b-c" data-cite-key="a&#34;b&#60;c" data-cite-number="1">[1]</a>"##
        );
    }

    #[test]
    fn test_key_stays_on_one_line() {
        let cited = rewrite_citations("A [@a\n\n# b|c] d", |_| false);
        assert_eq!(
            cited.text,
            format!("A {} d", span("a&#10;&#10;# b&#124;c", 1))
        );
        assert!(!cited.text.contains('\n'));
        assert_eq!(cited.keys, vec!["a\n\n# b|c"]);
    }

    #[test]
    fn test_plain_citations() {
        let cited = rewrite_citations("`[@x]` and `[@y]`", |key| key == "x");
        assert_eq!(plain_citations(&cited.text), "`[1]` and `[2]`");
        assert_eq!(plain_citations("<span class=\"other\">[1]</span>"), "<span class=\"other\">[1]</span>");
        assert!(matches!(plain_citations("no markup"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_anchor_id() {
        assert_eq!(anchor_id("kingma2013"), "ref-kingma2013");
        assert_eq!(anchor_id("doe:2020/x"), "ref-doe-2020-x");
    }
}
