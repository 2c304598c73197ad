//! Token parsers
//!
//! Every function here splits an attribute (or property) value into the URL-shaped tokens it
//! carries, together with the byte offset each token starts at. Callers rewrite exactly
//! `value[index..index + token.len()]`, so the offsets have to be exact.
//!
//! ```rust
//! use freeze_dry::parsers::html::parser::{parse_srcset, TokenPointer};
//!
//! let tokens = parse_srcset("a.jpg 1x, b.jpg 2x");
//! assert_eq!(tokens[1], TokenPointer::new("b.jpg", 10));
//! ```

use std::sync::LazyLock;

use regex::Regex;

use super::utils::{is_whitespace, WHITESPACES};

/// One URL-shaped substring plus the byte offset it was found at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenPointer {
    pub token: String,
    pub index: usize,
}

impl TokenPointer {
    pub fn new(token: &str, index: usize) -> Self {
        Self {
            token: token.to_string(),
            index,
        }
    }

    /// Byte offset one past the end of the token.
    pub fn end(&self) -> usize {
        self.index + self.token.len()
    }
}

/// The whole value (minus surrounding whitespace) is one token.
pub fn parse_single_token(value: &str) -> Vec<TokenPointer> {
    let token = value.trim_matches(WHITESPACES);
    if token.is_empty() {
        return vec![];
    }
    let index = value.len() - value.trim_start_matches(WHITESPACES).len();

    vec![TokenPointer::new(token, index)]
}

/// Every run of non-whitespace is a token.
pub fn parse_whitespace_separated(value: &str) -> Vec<TokenPointer> {
    let mut tokens = vec![];
    let mut start: Option<usize> = None;

    for (i, c) in value.char_indices() {
        match (is_whitespace(c), start) {
            (true, Some(s)) => {
                tokens.push(TokenPointer::new(&value[s..i], s));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        tokens.push(TokenPointer::new(&value[s..], s));
    }

    tokens
}

/// Comma-delimited runs, each trimmed; runs that are empty after trimming are dropped.
pub fn parse_comma_separated(value: &str) -> Vec<TokenPointer> {
    let mut tokens = vec![];
    let mut segment_start = 0;

    for segment in value.split(',') {
        tokens.extend(
            parse_single_token(segment)
                .into_iter()
                .map(|t| TokenPointer::new(&t.token, segment_start + t.index)),
        );
        segment_start += segment.len() + 1;
    }

    tokens
}

/// Image candidate URLs of a `srcset`/`imagesrcset` value: the first whitespace-delimited token
/// of every comma-separated candidate.
///
/// A candidate URL is a run of non-whitespace that ends at its first comma. Whatever follows the
/// URL is descriptors, skipped up to the next comma outside parentheses. `data:` URLs are the
/// exception, since their payload may contain commas: only trailing commas end them.
pub fn parse_srcset(srcset: &str) -> Vec<TokenPointer> {
    let bytes = srcset.as_bytes();
    let is_space = |b: u8| is_whitespace(b as char);
    let mut tokens = vec![];
    let mut pos = 0;

    loop {
        while pos < bytes.len() && (is_space(bytes[pos]) || bytes[pos] == b',') {
            pos += 1;
        }
        if pos >= bytes.len() {
            break;
        }

        let start = pos;
        while pos < bytes.len() && !is_space(bytes[pos]) {
            pos += 1;
        }
        let url = &srcset[start..pos];
        if !is_data_url(url) {
            if let Some(comma) = url.find(',') {
                tokens.push(TokenPointer::new(&url[..comma], start));
                pos = start + comma + 1;
                continue;
            }
        }
        let trimmed = url.trim_end_matches(',');
        tokens.push(TokenPointer::new(trimmed, start));
        if trimmed.len() != url.len() {
            continue;
        }

        let mut depth = 0usize;
        while pos < bytes.len() {
            match bytes[pos] {
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                b',' if depth == 0 => {
                    pos += 1;
                    break;
                }
                _ => {}
            }
            pos += 1;
        }
    }

    tokens
}

fn is_data_url(url: &str) -> bool {
    url.as_bytes()
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case(b"data:"))
}

static META_REFRESH_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^[ \t\n\x0C\r]*[0-9.]+(?:[ \t\n\x0C\r]*[;,][ \t\n\x0C\r]*|[ \t\n\x0C\r]+)(?:[uU][rR][lL][ \t\n\x0C\r]*=[ \t\n\x0C\r]*)?(['"])?"#,
    )
    .unwrap()
});

/// URL of a declarative refresh (`<meta http-equiv="refresh" content="...">`).
///
/// A bare delay means the page reloads itself, which is not a link.
pub fn parse_meta_refresh(content: &str) -> Vec<TokenPointer> {
    let Some(captures) = META_REFRESH_PREFIX.captures(content) else {
        return vec![];
    };
    let (Some(prefix), quote) = (captures.get(0), captures.get(1)) else {
        return vec![];
    };

    let index = prefix.end();
    let mut url = &content[index..];
    if let Some(quote) = quote {
        if let Some(close) = url.find(quote.as_str()) {
            url = &url[..close];
        }
    }
    let url = url.trim_end_matches(WHITESPACES);
    if url.is_empty() {
        return vec![];
    }

    vec![TokenPointer::new(url, index)]
}
