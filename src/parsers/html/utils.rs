/// ASCII whitespace as HTML defines it
pub const WHITESPACES: &[char] = &[' ', '\t', '\n', '\x0c', '\r'];

/// Policy injected into snapshots unless configured otherwise: nothing may be loaded from
/// outside the document itself, and no scripts may run.
pub const DEFAULT_CONTENT_SECURITY_POLICY: &str =
    "default-src 'none'; img-src data:; media-src data:; style-src data: 'unsafe-inline'; font-src data:; frame-src data:";

pub fn is_whitespace(c: char) -> bool {
    WHITESPACES.contains(&c)
}

/// Whether a space-separated token list (such as `rel`) contains `token`, ignoring ASCII case.
pub fn includes_token(list: &str, token: &str) -> bool {
    list.split(WHITESPACES)
        .any(|t| !t.is_empty() && t.eq_ignore_ascii_case(token))
}
