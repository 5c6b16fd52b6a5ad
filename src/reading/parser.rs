//! Strict decoder for the instrument's line protocol.
//!
//! A line is a bracketed, comma-separated list of real numbers such as
//! `[29.30, 219.78, 103.05]`. A single trailing comma is tolerated. Elements
//! that are well-formed literals of another kind (strings, booleans, nested
//! lists, `nan`, `inf`) are reported as non-numeric; anything else is a syntax
//! error.

use thiserror::Error;

use crate::config::ArrayConfig;

use super::Reading;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed reading literal: {reason}")]
    MalformedSyntax { reason: String },
    #[error("expected {expected} values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("element {index} (`{token}`) is not a finite real number")]
    NonNumericElement { index: usize, token: String },
}

impl ParseError {
    fn malformed(reason: impl Into<String>) -> Self {
        ParseError::MalformedSyntax {
            reason: reason.into(),
        }
    }
}

enum Element<'a> {
    Number(f64),
    /// A valid literal that is not a finite real.
    Other(&'a str),
}

/// Decodes one transport line against the active array configuration.
pub fn parse(line: &str, config: &ArrayConfig) -> Result<Reading, ParseError> {
    let text = line.trim_start_matches('\u{feff}').trim();
    if text.is_empty() {
        return Err(ParseError::malformed("empty line"));
    }

    let inner = text
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| ParseError::malformed("expected a list enclosed in `[` and `]`"))?;

    let tokens = split_top_level(inner)?;
    let elements = tokens
        .iter()
        .map(|token| classify(token))
        .collect::<Result<Vec<_>, _>>()?;

    let expected = config.total_readings();
    if elements.len() != expected {
        return Err(ParseError::LengthMismatch {
            expected,
            actual: elements.len(),
        });
    }

    let mut values = Vec::with_capacity(elements.len());
    for (index, element) in elements.into_iter().enumerate() {
        match element {
            Element::Number(value) => values.push(value),
            Element::Other(token) => {
                return Err(ParseError::NonNumericElement {
                    index,
                    token: token.to_string(),
                })
            }
        }
    }

    Ok(Reading::from_validated(values))
}

/// Splits on commas outside quotes and nested brackets.
fn split_top_level(inner: &str) -> Result<Vec<&str>, ParseError> {
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut tokens = Vec::new();
    let mut depth: Vec<char> = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (pos, ch) in inner.char_indices() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == open {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => quote = Some(ch),
            '[' | '(' | '{' => depth.push(ch),
            ']' | ')' | '}' => {
                let expected_open = match ch {
                    ']' => '[',
                    ')' => '(',
                    _ => '{',
                };
                if depth.pop() != Some(expected_open) {
                    return Err(ParseError::malformed(format!("unbalanced `{ch}`")));
                }
            }
            ',' if depth.is_empty() => {
                tokens.push(inner[start..pos].trim());
                start = pos + 1;
            }
            _ => {}
        }
    }

    if quote.is_some() {
        return Err(ParseError::malformed("unterminated string"));
    }
    if let Some(open) = depth.last() {
        return Err(ParseError::malformed(format!("unclosed `{open}`")));
    }

    let last = inner[start..].trim();
    if last.is_empty() {
        // `[1, 2,]` is fine, `[,]` and `[1,,2]` are not.
        if tokens.is_empty() {
            return Err(ParseError::malformed("missing element before `,`"));
        }
    } else {
        tokens.push(last);
    }

    if tokens.iter().any(|token| token.is_empty()) {
        return Err(ParseError::malformed("missing element between `,`"));
    }
    Ok(tokens)
}

fn classify(token: &str) -> Result<Element<'_>, ParseError> {
    if is_numeric_literal(token) {
        return match token.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(Element::Number(value)),
            _ => Ok(Element::Other(token)),
        };
    }
    if is_other_literal(token) {
        return Ok(Element::Other(token));
    }
    Err(ParseError::malformed(format!("unexpected token `{token}`")))
}

/// `[+-]? (digits [. digits?] | . digits) ([eE] [+-]? digits)?`
fn is_numeric_literal(token: &str) -> bool {
    let bytes = token.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }

    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut mantissa_digits = i - int_start;

    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        mantissa_digits += i - frac_start;
    }
    if mantissa_digits == 0 {
        return false;
    }

    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        i += 1;
        if i < bytes.len() && matches!(bytes[i], b'+' | b'-') {
            i += 1;
        }
        let exp_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }

    i == bytes.len()
}

fn is_other_literal(token: &str) -> bool {
    let unsigned = token.trim_start_matches(['+', '-']);
    let word = unsigned.to_ascii_lowercase();
    if matches!(word.as_str(), "nan" | "inf" | "infinity") {
        return true;
    }
    if matches!(token, "True" | "False" | "None") {
        return true;
    }
    // Strings and containers were balanced by the splitter, so only the
    // opening character needs checking.
    matches!(token.chars().next(), Some('\'' | '"' | '[' | '(' | '{'))
        && matches!(token.chars().last(), Some('\'' | '"' | ']' | ')' | '}'))
}
