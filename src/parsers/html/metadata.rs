//! Document metadata
//!
//! Reading the charset a document declares, and the finishing touches a snapshot gets: a
//! Content-Security-Policy that keeps it from loading anything, a single charset declaration,
//! and a record of when and from where it was taken.

use chrono::{DateTime, Utc};
use html5ever::interface::{Attribute, QualName};
use html5ever::tendril::format_tendril;
use html5ever::tree_builder::create_element;
use html5ever::{namespace_url, ns, LocalName};
use markup5ever_rcdom::{Handle, RcDom};

use crate::core::{parse_content_type, FreezeDryOptions};
use crate::utils::url::{clean_url, Url};

use super::dom::{
    find_nodes, get_node_attr, get_node_name, prepend_child, remove_node, set_node_attr,
    walk_elements,
};
use super::utils::includes_token;

fn head_of(document: &Handle) -> Option<Handle> {
    find_nodes(document, &["html", "head"]).into_iter().next()
}

fn metas(document: &Handle) -> Vec<Handle> {
    walk_elements(document)
        .into_iter()
        .filter(|element| get_node_name(element) == Some("meta"))
        .collect()
}

fn has_http_equiv(meta: &Handle, value: &str) -> bool {
    get_node_attr(meta, "http-equiv").is_some_and(|v| v.trim().eq_ignore_ascii_case(value))
}

fn new_element(dom: &RcDom, name: &str, attrs: &[(&str, &str)]) -> Handle {
    create_element(
        dom,
        QualName::new(None, ns!(html), LocalName::from(name)),
        attrs
            .iter()
            .map(|(name, value)| Attribute {
                name: QualName::new(None, ns!(), LocalName::from(*name)),
                value: format_tendril!("{}", value),
            })
            .collect(),
    )
}

/// The charset the document declares, through `<meta charset>` or
/// `<meta http-equiv="content-type">`, whichever comes first.
pub fn get_charset(document: &Handle) -> Option<String> {
    for meta in metas(document) {
        if let Some(charset) = get_node_attr(&meta, "charset") {
            return Some(charset.trim().to_string());
        }

        if has_http_equiv(&meta, "content-type") {
            if let Some(content) = get_node_attr(&meta, "content") {
                let (_media_type, charset, _is_base64) = parse_content_type(&content);
                if !charset.is_empty() {
                    return Some(charset);
                }
            }
        }
    }

    None
}

/// Leaves exactly one `<meta charset>` as the first child of `<head>`, or none at all.
pub fn set_charset_declaration(dom: &RcDom, charset: Option<&str>) {
    for meta in metas(&dom.document) {
        if get_node_attr(&meta, "charset").is_some() || has_http_equiv(&meta, "content-type") {
            remove_node(&meta);
        }
    }

    if let (Some(charset), Some(head)) = (charset, head_of(&dom.document)) {
        prepend_child(&head, new_element(dom, "meta", &[("charset", charset)]));
    }
}

/// Prepends a policy element, unless the first one present already says exactly this.
///
/// Prepending matters: browsers ignore attempts to relax a policy that is already in force, so
/// ours has to come before any the document brings along.
pub fn set_content_security_policy(dom: &RcDom, policy: &str) {
    let first = metas(&dom.document)
        .into_iter()
        .find(|meta| has_http_equiv(meta, "content-security-policy"));
    if first.is_some_and(|meta| get_node_attr(&meta, "content").as_deref() == Some(policy)) {
        return;
    }

    if let Some(head) = head_of(&dom.document) {
        let meta = new_element(
            dom,
            "meta",
            &[("http-equiv", "Content-Security-Policy"), ("content", policy)],
        );
        prepend_child(&head, meta);
    }
}

/// RFC 1123, as HTTP dates are written.
pub fn format_memento_datetime(now: &DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Records the snapshot time and the URL the document was taken from.
///
/// An existing `Memento-Datetime` is updated; an existing `<link rel="original">` is kept, since
/// it already names the first origin of a re-snapshotted document.
pub fn add_snapshot_metadata(dom: &RcDom, url: &Url, now: &DateTime<Utc>) {
    let Some(head) = head_of(&dom.document) else {
        return;
    };
    let datetime = format_memento_datetime(now);

    let has_original = walk_elements(&dom.document).iter().any(|element| {
        get_node_name(element) == Some("link")
            && get_node_attr(element, "rel").is_some_and(|rel| includes_token(&rel, "original"))
    });
    if !has_original && !url.scheme().eq_ignore_ascii_case("about") {
        let href = clean_url(url);
        let link = new_element(dom, "link", &[("rel", "original"), ("href", href.as_str())]);
        prepend_child(&head, link);
    }

    match metas(&dom.document)
        .into_iter()
        .find(|meta| has_http_equiv(meta, "memento-datetime"))
    {
        Some(meta) => set_node_attr(&meta, "content", Some(datetime)),
        None => {
            let meta = new_element(
                dom,
                "meta",
                &[("http-equiv", "Memento-Datetime"), ("content", datetime.as_str())],
            );
            prepend_child(&head, meta);
        }
    }
}

/// Applies the metadata options to the root document of a snapshot.
///
/// The charset declaration goes last so it ends up first in `<head>`.
pub fn finalize_document(dom: &RcDom, url: &Url, options: &FreezeDryOptions) {
    if options.add_metadata {
        add_snapshot_metadata(dom, url, &options.now());
    }
    if options.set_content_security_policy {
        set_content_security_policy(dom, &options.content_security_policy);
    }
    set_charset_declaration(dom, options.charset_declaration.as_deref());
}
