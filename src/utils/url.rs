use base64::{prelude::BASE64_STANDARD, Engine};
use percent_encoding::percent_decode_str;

use crate::core::{detect_media_type, parse_content_type};

pub use url::Url;

/// Builds a `data:` URL carrying `data` base64-encoded.
///
/// An empty `media_type` is sniffed from the bytes (and `final_url`'s file name). The charset
/// parameter is only written when non-empty, which keeps the output stable when a data URL is
/// decoded and encoded again.
pub fn create_data_url(media_type: &str, charset: &str, data: &[u8], final_url: &Url) -> String {
    let media_type: String = if media_type.is_empty() {
        detect_media_type(data, final_url)
    } else {
        media_type.to_string()
    };

    let mut data_url = format!("data:{media_type}");
    if !charset.trim().is_empty() {
        data_url.push_str(";charset=");
        data_url.push_str(charset.trim());
    }
    data_url.push_str(";base64,");
    data_url.push_str(&BASE64_STANDARD.encode(data));
    data_url
}

/// Splits a `data:` URL into media type, charset and decoded bytes.
///
/// Anything that does not decode yields empty data instead of an error.
pub fn parse_data_url(url: &Url) -> (String, String, Vec<u8>) {
    let raw = url.as_str().strip_prefix("data:").unwrap_or_default();
    let raw = raw.split('#').next().unwrap_or_default();
    let (header, body) = raw.split_once(',').unwrap_or((raw, ""));

    let (mut media_type, mut charset, is_base64) = parse_content_type(header);
    if media_type.is_empty() {
        media_type = "text/plain".to_string();
        if charset.is_empty() {
            charset = "US-ASCII".to_string();
        }
    }

    let decoded: Vec<u8> = percent_decode_str(body).collect();
    let data = if is_base64 {
        let compact: Vec<u8> = decoded
            .into_iter()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        BASE64_STANDARD.decode(compact).unwrap_or_default()
    } else {
        decoded
    };

    (media_type, charset, data)
}

/// Resolves `href` against `from`; `None` when the result is not a valid URL.
pub fn resolve_url(from: &Url, href: &str) -> Option<Url> {
    from.join(href.trim()).ok()
}

/// Drops the fragment (and an empty trailing `?`) so two references to the same entity compare equal.
pub fn clean_url(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    if url.query() == Some("") {
        url.set_query(None);
    }
    url
}
