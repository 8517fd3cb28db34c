//! nom recognizers for the markers that open Markdown constructs.
//!
//! Each function matches at the start of its input and returns the rest.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while1, take_while_m_n},
    character::complete::{char, not_line_ending, space0, space1},
    combinator::{eof, map, opt, peek, recognize, value},
    multi::many0,
    sequence::{delimited, pair, tuple},
    IResult,
};

/// A recognized marker, borrowing its content from the input.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    // Block-level tokens
    Heading(u8, &'a str),     // Level, content
    FencedCodeStart(&'a str, &'a str), // Fence, info string
    ThematicBreak,
    BlockQuoteMarker,
    ListItemMarker(ListMarker),

    // Inline tokens
    Emphasis(&'a str),        // * or _
    Strong(&'a str),          // ** or __
    InlineMath(&'a str),
    DisplayMath(&'a str),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListMarker {
    Unordered,
    Ordered(u32),
    Checkbox(bool),
}

/// ATX heading: one to six `#`, then a space or end of line.
pub fn heading(input: &str) -> IResult<&str, Token> {
    let (input, hashes) = take_while_m_n(1, 6, |c| c == '#')(input)?;
    let level = hashes.len() as u8;
    let (input, content) = alt((
        map(eof, |_| ""),
        map(pair(space1, not_line_ending), |(_, c)| c),
    ))(input)?;
    // Trim a closing sequence of #s
    let content = content.trim_end();
    let stripped = content.trim_end_matches('#');
    let content = if stripped.is_empty() || stripped.ends_with(' ') {
        stripped.trim_end()
    } else {
        content
    };
    Ok((input, Token::Heading(level, content)))
}

/// Parse a thematic break (---, ***, ___), optionally spaced.
pub fn thematic_break(input: &str) -> IResult<&str, Token> {
    let (input, _) = alt((
        recognize(tuple((char('-'), space0, char('-'), space0, char('-'), many0(alt((char('-'), char(' '), char('\t'))))))),
        recognize(tuple((char('*'), space0, char('*'), space0, char('*'), many0(alt((char('*'), char(' '), char('\t'))))))),
        recognize(tuple((char('_'), space0, char('_'), space0, char('_'), many0(alt((char('_'), char(' '), char('\t'))))))),
    ))(input)?;
    let (input, _) = eof(input)?;
    Ok((input, Token::ThematicBreak))
}

/// Parse a fenced code block start, returning the fence and the info string.
pub fn fenced_code_start(input: &str) -> IResult<&str, Token> {
    let (input, fence) = alt((
        recognize(pair(tag("```"), many0(char('`')))),
        recognize(pair(tag("~~~"), many0(char('~')))),
    ))(input)?;
    let (input, _) = space0(input)?;
    let (input, info) = not_line_ending(input)?;
    // Backtick fences may not carry backticks in the info string
    if fence.starts_with('`') && info.contains('`') {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }
    let lang = info.split_whitespace().next().unwrap_or("");
    Ok((input, Token::FencedCodeStart(fence, lang)))
}

/// Check whether a line closes a fence opened with `fence`.
pub fn closes_fence(line: &str, fence: &str) -> bool {
    let trimmed = line.trim();
    let Some(marker) = fence.chars().next() else {
        return false;
    };
    trimmed.len() >= fence.len() && trimmed.chars().all(|c| c == marker)
}

/// `>` with one optional space.
pub fn block_quote_marker(input: &str) -> IResult<&str, Token> {
    let (input, _) = char('>')(input)?;
    let (input, _) = opt(char(' '))(input)?;
    Ok((input, Token::BlockQuoteMarker))
}

/// Bullet, ordered, or task list marker. The marker must be followed by
/// whitespace or end of line.
pub fn list_item_marker(input: &str) -> IResult<&str, Token> {
    alt((
        // Checkbox
        map(
            tuple((
                alt((char('-'), char('*'), char('+'))),
                space1,
                char('['),
                alt((value(true, char('x')), value(true, char('X')), value(false, char(' ')))),
                char(']'),
                alt((space1, eof)),
            )),
            |(_, _, _, checked, _, _)| Token::ListItemMarker(ListMarker::Checkbox(checked)),
        ),
        // Unordered
        map(
            pair(alt((char('-'), char('*'), char('+'))), alt((space1, eof))),
            |_| Token::ListItemMarker(ListMarker::Unordered),
        ),
        // Ordered
        map(
            tuple((
                take_while_m_n(1, 9, |c: char| c.is_ascii_digit()),
                alt((char('.'), char(')'))),
                alt((space1, eof)),
            )),
            |(num, _, _): (&str, _, _)| {
                Token::ListItemMarker(ListMarker::Ordered(num.parse().unwrap_or(1)))
            },
        ),
    ))(input)
}

/// `$tex$` with non-blank content.
pub fn inline_math(input: &str) -> IResult<&str, Token> {
    let (input, _) = char('$')(input)?;
    let (input, _) = peek(nom::combinator::not(char('$')))(input)?; // Not display math
    let (input, content) = take_until("$")(input)?;
    let (input, _) = char('$')(input)?;
    if content.trim().is_empty() {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }
    Ok((input, Token::InlineMath(content)))
}

/// `$$tex$$` on a single run of text.
pub fn display_math(input: &str) -> IResult<&str, Token> {
    let (input, _) = tag("$$")(input)?;
    let (input, content) = take_until("$$")(input)?;
    let (input, _) = tag("$$")(input)?;
    if content.trim().is_empty() {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }
    Ok((input, Token::DisplayMath(content)))
}

/// `*text*` or `_text_`.
pub fn emphasis(input: &str) -> IResult<&str, Token> {
    let (rest, token) = alt((
        delimited(
            pair(char('*'), peek(nom::combinator::not(char('*')))),
            map(take_while1(|c| c != '*'), Token::Emphasis),
            char('*'),
        ),
        delimited(
            pair(char('_'), peek(nom::combinator::not(char('_')))),
            map(take_while1(|c| c != '_'), Token::Emphasis),
            char('_'),
        ),
    ))(input)?;
    flanked(rest, token)
}

/// `**text**` or `__text__`.
pub fn strong(input: &str) -> IResult<&str, Token> {
    let (rest, token) = alt((
        delimited(tag("**"), map(take_until("**"), Token::Strong), tag("**")),
        delimited(tag("__"), map(take_until("__"), Token::Strong), tag("__")),
    ))(input)?;
    flanked(rest, token)
}

/// Reject delimiter runs whose content starts or ends with whitespace.
fn flanked<'a>(rest: &'a str, token: Token<'a>) -> IResult<&'a str, Token<'a>> {
    let content = match &token {
        Token::Emphasis(c) | Token::Strong(c) => *c,
        _ => return Ok((rest, token)),
    };
    let starts = content.chars().next().is_some_and(|c| !c.is_whitespace());
    let ends = content.chars().last().is_some_and(|c| !c.is_whitespace());
    if starts && ends {
        Ok((rest, token))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            rest,
            nom::error::ErrorKind::Verify,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading() {
        assert_eq!(
            heading("# Understanding VAEs"),
            Ok(("", Token::Heading(1, "Understanding VAEs")))
        );
        assert_eq!(
            heading("### The ELBO ###"),
            Ok(("", Token::Heading(3, "The ELBO")))
        );
        assert_eq!(heading("## C#"), Ok(("", Token::Heading(2, "C#"))));
        assert!(heading("#hashtag").is_err());
        assert!(heading("####### seven").is_err());
    }

    #[test]
    fn test_thematic_break() {
        assert!(thematic_break("---").is_ok());
        assert!(thematic_break("* * *").is_ok());
        assert!(thematic_break("___ ").is_ok());
        assert!(thematic_break("--").is_err());
        assert!(thematic_break("--- x").is_err());
    }

    #[test]
    fn test_fenced_code_start() {
        assert_eq!(
            fenced_code_start("```rust"),
            Ok(("", Token::FencedCodeStart("```", "rust")))
        );
        assert_eq!(
            fenced_code_start("~~~~ math extra"),
            Ok(("", Token::FencedCodeStart("~~~~", "math")))
        );
        assert!(closes_fence("````", "```"));
        assert!(!closes_fence("``", "```"));
        assert!(!closes_fence("~~~", "```"));
    }

    #[test]
    fn test_list_markers() {
        assert_eq!(
            list_item_marker("- [x] done"),
            Ok(("done", Token::ListItemMarker(ListMarker::Checkbox(true))))
        );
        assert_eq!(
            list_item_marker("3. third"),
            Ok(("third", Token::ListItemMarker(ListMarker::Ordered(3))))
        );
        assert!(list_item_marker("-not a list").is_err());
    }

    #[test]
    fn test_inline_math() {
        assert_eq!(
            inline_math("$p_\\theta(x)$ is"),
            Ok((" is", Token::InlineMath("p_\\theta(x)")))
        );
        assert!(inline_math("$unclosed").is_err());
        assert!(inline_math("$ $").is_err());
    }

    #[test]
    fn test_display_math() {
        assert_eq!(
            display_math("$$\\log p(x) \\geq \\mathcal{L}$$ and"),
            Ok((" and", Token::DisplayMath("\\log p(x) \\geq \\mathcal{L}")))
        );
    }

    #[test]
    fn test_emphasis_flanking() {
        assert_eq!(emphasis("*word*"), Ok(("", Token::Emphasis("word"))));
        assert!(emphasis("* spaced *").is_err());
        assert_eq!(strong("**bold** tail"), Ok((" tail", Token::Strong("bold"))));
    }
}
