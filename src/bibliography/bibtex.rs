//! BibTeX parser.

use crate::ast::{BibEntry, Name};
use crate::error::{ParseError, Result};
use nom::{
    bytes::complete::take_while1,
    character::complete::{char, multispace0},
    IResult,
};
use std::collections::HashMap;

/// Parse BibTeX text into entries, in file order.
///
/// Entries that fail to parse are skipped with a warning. Text that holds
/// no entries at all is an error unless it is blank or only comments.
pub fn parse_bibtex(input: &str) -> Result<Vec<BibEntry>> {
    let mut entries = Vec::new();
    let mut special_blocks = 0;
    let mut skipped = 0;

    let mut remaining = input;

    while !remaining.is_empty() {
        // Skip whitespace and comments
        remaining = skip_whitespace_and_comments(remaining);

        if remaining.is_empty() {
            break;
        }

        if remaining.starts_with('@') {
            match parse_entry(remaining) {
                Ok((rest, Some(entry))) => {
                    entries.push(entry);
                    remaining = rest;
                }
                Ok((rest, None)) => {
                    // @comment, @preamble, or @string
                    special_blocks += 1;
                    remaining = rest;
                }
                Err(_) => {
                    skipped += 1;
                    tracing::warn!(
                        entry = %entry_head(remaining),
                        "skipping malformed BibTeX entry"
                    );
                    // Recover at the next @
                    match remaining[1..].find('@') {
                        Some(pos) => remaining = &remaining[pos + 1..],
                        None => break,
                    }
                }
            }
        } else {
            // Text between entries is ignored
            match remaining.find('@') {
                Some(pos) => remaining = &remaining[pos..],
                None => break,
            }
        }
    }

    let blank = skip_whitespace_and_comments(input).is_empty();
    if entries.is_empty() && special_blocks == 0 && !blank {
        return Err(ParseError::BibTeX(format!(
            "no entries found ({} malformed)",
            skipped
        ))
        .into());
    }

    Ok(entries)
}

fn entry_head(input: &str) -> String {
    let end = input
        .find(|c: char| c == ',' || c == '\n')
        .unwrap_or(input.len());
    input[..end].chars().take(60).collect()
}

fn skip_whitespace_and_comments(input: &str) -> &str {
    let mut s = input;

    loop {
        s = s.trim_start();

        if s.starts_with('%') {
            // Skip line comment
            if let Some(end) = s.find('\n') {
                s = &s[end + 1..];
            } else {
                return "";
            }
        } else {
            break;
        }
    }

    s
}

fn parse_entry(input: &str) -> IResult<&str, Option<BibEntry>> {
    let (input, _) = char('@')(input)?;
    let (input, entry_type) = take_while1(|c: char| c.is_alphanumeric())(input)?;
    let (input, _) = multispace0(input)?;

    let entry_type = entry_type.to_lowercase();

    // Handle special entries
    if matches!(entry_type.as_str(), "comment" | "preamble" | "string") {
        let (input, _) = skip_braced_content(input)?;
        return Ok((input, None));
    }

    let (input, _) = char('{')(input)?;
    let (input, _) = multispace0(input)?;

    // Parse citation key
    let (input, key) =
        take_while1(|c: char| !c.is_whitespace() && !matches!(c, ',' | '{' | '}'))(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char(',')(input)?;

    // Parse fields
    let (input, fields) = parse_fields(input)?;

    let (input, _) = multispace0(input)?;
    let (input, _) = char('}')(input)?;

    Ok((input, Some(build_entry(key, &entry_type, &fields))))
}

fn skip_braced_content(input: &str) -> IResult<&str, ()> {
    let (input, _) = char('{')(input)?;
    let end = closing_brace(input).unwrap_or(input.len());
    Ok((input.get(end + 1..).unwrap_or(""), ()))
}

/// Index of the `}` closing an already opened brace.
fn closing_brace(input: &str) -> Option<usize> {
    let mut depth = 1;

    for (idx, c) in input.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }

    None
}

/// Field values with their outer delimiters removed, keyed by lowercase name.
fn parse_fields(input: &str) -> IResult<&str, HashMap<String, &str>> {
    let mut fields = HashMap::new();
    let mut remaining = input;

    loop {
        remaining = remaining.trim_start();

        if remaining.starts_with('}') || remaining.is_empty() {
            break;
        }

        let (rest, (name, value)) = parse_field(remaining)?;
        fields.insert(name.to_lowercase(), value);
        remaining = rest.trim_start();

        // Optional comma
        if let Some(rest) = remaining.strip_prefix(',') {
            remaining = rest;
        }
    }

    Ok((remaining, fields))
}

fn parse_field(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, _) = multispace0(input)?;
    let (input, name) = take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-')(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char('=')(input)?;
    let (input, _) = multispace0(input)?;
    let (input, value) = parse_value(input)?;

    Ok((input, (name, value)))
}

fn parse_value(input: &str) -> IResult<&str, &str> {
    nom::branch::alt((parse_braced_value, parse_quoted_value, parse_number_value))(input)
}

fn parse_braced_value(input: &str) -> IResult<&str, &str> {
    let (input, _) = char('{')(input)?;
    match closing_brace(input) {
        Some(end) => Ok((&input[end + 1..], &input[..end])),
        None => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Char,
        ))),
    }
}

fn parse_quoted_value(input: &str) -> IResult<&str, &str> {
    let (input, _) = char('"')(input)?;

    let mut escape = false;
    let mut depth = 0;

    for (i, c) in input.char_indices() {
        if escape {
            escape = false;
            continue;
        }

        match c {
            '\\' => escape = true,
            '{' => depth += 1,
            '}' => depth -= 1,
            '"' if depth == 0 => return Ok((&input[i + 1..], &input[..i])),
            _ => {}
        }
    }

    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Char,
    )))
}

fn parse_number_value(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_digit())(input)
}

/// Turn a raw field value into display text.
///
/// Protective braces are dropped, escaped specials and common accent
/// commands are decoded, and whitespace is collapsed.
fn clean_bibtex_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' | '}' => {}
            '~' => result.push(' '),
            '\\' => match chars.next() {
                Some(special @ ('&' | '%' | '_' | '$' | '#' | '{' | '}')) => result.push(special),
                Some(accent @ ('"' | '\'' | '`' | '^' | '~')) => {
                    while chars.peek() == Some(&'{') {
                        chars.next();
                    }
                    if let Some(letter) = chars.next() {
                        result.push(accented(accent, letter).unwrap_or(letter));
                    }
                }
                Some('c') if matches!(chars.peek(), Some('{') | Some(' ')) => {
                    chars.next();
                    if let Some(letter) = chars.next() {
                        result.push(accented('c', letter).unwrap_or(letter));
                    }
                }
                Some(letter) if letter.is_ascii_alphabetic() => {
                    // Other commands: drop the name when it takes an argument
                    let mut name = String::from(letter);
                    while let Some(&next) = chars.peek() {
                        if !next.is_ascii_alphabetic() {
                            break;
                        }
                        name.push(next);
                        chars.next();
                    }
                    if chars.peek() != Some(&'{') {
                        result.push_str(&name);
                    }
                }
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => result.push('\\'),
            },
            _ => result.push(c),
        }
    }

    // Normalize whitespace and dashes
    result
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("---", "\u{2014}")
        .replace("--", "\u{2013}")
}

fn accented(accent: char, letter: char) -> Option<char> {
    let table: &[(char, &str, &str)] = &[
        ('\'', "aeiouyAEIOUY", "áéíóúýÁÉÍÓÚÝ"),
        ('`', "aeiouAEIOU", "àèìòùÀÈÌÒÙ"),
        ('^', "aeiouAEIOU", "âêîôûÂÊÎÔÛ"),
        ('"', "aeiouyAEIOU", "äëïöüÿÄËÏÖÜ"),
        ('~', "anoANO", "ãñõÃÑÕ"),
        ('c', "cC", "çÇ"),
    ];

    let (_, plain, marked) = table.iter().find(|(a, _, _)| *a == accent)?;
    let index = plain.chars().position(|c| c == letter)?;
    marked.chars().nth(index)
}

fn build_entry(key: &str, entry_type: &str, fields: &HashMap<String, &str>) -> BibEntry {
    let field = |names: &[&str]| -> Option<String> {
        names
            .iter()
            .find_map(|name| fields.get(*name))
            .map(|v| clean_bibtex_value(v))
            .filter(|v| !v.is_empty())
    };

    let year = field(&["year"]).or_else(|| {
        field(&["date"]).and_then(|date| {
            let year = date.get(..4)?;
            year.chars().all(|c| c.is_ascii_digit()).then(|| year.to_string())
        })
    });

    BibEntry {
        key: key.to_string(),
        entry_type: entry_type.to_string(),
        authors: fields.get("author").map(|a| parse_authors(a)).unwrap_or_default(),
        title: field(&["title"]),
        year,
        container_title: field(&["journal", "journaltitle", "booktitle"]),
        publisher: field(&["publisher", "institution", "organization", "school"]),
        url: fields.get("url").map(|u| u.trim().to_string()).filter(|u| !u.is_empty()),
        doi: field(&["doi"]),
    }
}

/// Parse an `author` field: names joined by `and` outside braces.
fn parse_authors(raw: &str) -> Vec<Name> {
    split_names(raw).into_iter().filter_map(parse_name).collect()
}

fn split_names(raw: &str) -> Vec<&str> {
    let bytes = raw.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b if depth == 0 && b.is_ascii_whitespace() => {
                let rest = &raw[i..];
                let word = rest.trim_start();
                let is_and = word
                    .get(..3)
                    .is_some_and(|w| w.eq_ignore_ascii_case("and"))
                    && word[3..].starts_with(char::is_whitespace);
                if is_and {
                    parts.push(&raw[start..i]);
                    i += rest.len() - word.len() + 3;
                    start = i;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&raw[start..]);

    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

fn parse_name(raw: &str) -> Option<Name> {
    // A fully braced name is a corporate or literal name
    if let Some(inner) = raw.strip_prefix('{') {
        if closing_brace(inner).is_some_and(|end| end + 1 == inner.len()) {
            let literal = clean_bibtex_value(&inner[..inner.len() - 1]);
            return (!literal.is_empty()).then(|| Name::literal(literal));
        }
    }

    let parts = split_top_level(raw, |c| c == ',');
    match parts.as_slice() {
        // Family, Given
        [family, given] => Some(Name::personal(
            clean_bibtex_value(given),
            clean_bibtex_value(family),
        )),
        // Family, Suffix, Given
        [family, suffix, given, ..] => Some(Name::personal(
            clean_bibtex_value(given),
            format!("{}, {}", clean_bibtex_value(family), clean_bibtex_value(suffix)),
        )),
        _ => {
            // Given [von] Family
            let words = split_top_level(raw, char::is_whitespace);
            let (last, rest) = words.split_last()?;
            let particle = rest
                .iter()
                .position(|w| w.starts_with(|c: char| c.is_lowercase()))
                .unwrap_or(rest.len());

            let given = rest[..particle].join(" ");
            let mut family: Vec<&str> = rest[particle..].to_vec();
            family.push(last);

            Some(Name::personal(
                clean_bibtex_value(&given),
                clean_bibtex_value(&family.join(" ")),
            ))
        }
    }
}

/// Split on separator characters outside braces, dropping empty pieces.
fn split_top_level(input: &str, is_separator: impl Fn(char) -> bool) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            c if depth == 0 && is_separator(c) => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);

    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}
