//! # Resources
//!
//! A [`Resource`] is one fetched entity together with the links found in it. Documents and
//! stylesheets keep their content in parsed, mutable form so that rewriting a link edits the
//! resource itself; anything else is an opaque leaf without links.

use std::cell::RefCell;
use std::rc::Rc;

use encoding_rs::{Encoding, UTF_8};
use markup5ever_rcdom::{Handle, RcDom};
use tokio_util::sync::CancellationToken;

use crate::core::{
    detect_media_type, is_css_media_type, is_html_media_type, is_plaintext_media_type,
    parse_content_type, FetchError, FreezeDryError,
};
use crate::links::{Link, LinkBase, StyleOwner};
use crate::network::{FetchResource, FetchedResource};
use crate::parsers::css::{stylesheet_view, CssKind, StyleBacking};
use crate::parsers::html::assets::check_integrity;
use crate::parsers::html::attributes::SubresourceType;
use crate::parsers::html::dom::{html_to_dom, parse_html, serialize_node};
use crate::parsers::html::links::{extract_links_from_dom, stylesheet_links, DocumentContext};
use crate::parsers::html::metadata::get_charset;
use crate::utils::url::Url;

/// Media types that say nothing about the content, so a link's expectation may decide.
const GENERIC_MEDIA_TYPES: &[&str] = &["", "application/octet-stream", "text/plain"];

pub enum Content {
    Document {
        dom: RcDom,
        context: Rc<DocumentContext>,
    },
    Stylesheet(Rc<RefCell<String>>),
    Leaf(Vec<u8>),
}

/// Serialized form of a resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob {
    pub data: Vec<u8>,
    pub media_type: String,
    pub charset: Option<String>,
}

pub struct Resource {
    url: Url,
    media_type: String,
    charset: String,
    content: Content,
    links: RefCell<Option<Vec<Rc<Link>>>>,
}

impl Resource {
    fn new(url: Url, media_type: String, charset: String, content: Content) -> Self {
        Self {
            url,
            media_type,
            charset,
            content,
            links: RefCell::new(None),
        }
    }

    pub fn from_html(html: &str, url: Url) -> Self {
        Self::from_dom(parse_html(html), url)
    }

    pub fn from_dom(dom: RcDom, url: Url) -> Self {
        let context = Rc::new(DocumentContext::new(dom.document.clone(), url.clone()));
        Self::new(
            url,
            "text/html".to_string(),
            "utf-8".to_string(),
            Content::Document { dom, context },
        )
    }

    pub fn from_stylesheet(text: &str, url: Url) -> Self {
        Self::new(
            url,
            "text/css".to_string(),
            "utf-8".to_string(),
            Content::Stylesheet(Rc::new(RefCell::new(text.to_string()))),
        )
    }

    /// Builds a resource from raw bytes.
    ///
    /// The declared content type wins; without one the type is sniffed. `hint` is what the
    /// linking attribute expects, which settles content served with a generic type (a stylesheet
    /// served as `text/plain` is still parsed as CSS).
    pub fn from_bytes(
        data: &[u8],
        url: Url,
        content_type: Option<&str>,
        hint: Option<SubresourceType>,
    ) -> Self {
        let (mut media_type, charset, _) = content_type.map(parse_content_type).unwrap_or_default();
        if media_type.is_empty() {
            media_type = detect_media_type(data, &url);
        }
        let generic = GENERIC_MEDIA_TYPES.contains(&media_type.as_str());

        if is_html_media_type(&media_type) {
            let dom = decode_document(data, &charset);
            let mut resource = Self::from_dom(dom, url);
            resource.media_type = media_type;
            resource
        } else if is_css_media_type(&media_type) || (generic && hint == Some(SubresourceType::Style))
        {
            let encoding = Encoding::for_label(charset.as_bytes()).unwrap_or(UTF_8);
            let text = encoding.decode(data).0.into_owned();
            Self::from_stylesheet(&text, url)
        } else {
            let charset = if is_plaintext_media_type(&media_type) {
                charset
            } else {
                String::new()
            };
            Self::new(url, media_type, charset, Content::Leaf(data.to_vec()))
        }
    }

    pub fn from_response(fetched: FetchedResource, hint: Option<SubresourceType>) -> Self {
        Self::from_bytes(
            &fetched.data,
            fetched.url,
            fetched.content_type.as_deref(),
            hint,
        )
    }

    /// Fetches the absolute target of `link` and builds a resource from the response.
    ///
    /// Bytes that fail the link's `integrity` check are rejected.
    pub async fn from_link(
        link: &Link,
        fetcher: &dyn FetchResource,
        signal: &CancellationToken,
    ) -> Result<Self, FreezeDryError> {
        let url = link.absolute_target().ok_or_else(|| {
            FreezeDryError::InvalidInput(format!("cannot resolve link target '{}'", link.target()))
        })?;

        let fetched = fetcher.fetch(&url, signal).await?;
        if let Some(integrity) = link.integrity() {
            if !check_integrity(&fetched.data, &integrity) {
                return Err(FetchError::IntegrityMismatch(url.to_string()).into());
            }
        }

        Ok(Self::from_response(fetched, link.subresource_type()))
    }

    /// The same content under another URL.
    pub fn with_url(self, url: Url) -> Self {
        let content = match self.content {
            Content::Document { dom, .. } => {
                let context = Rc::new(DocumentContext::new(dom.document.clone(), url.clone()));
                Content::Document { dom, context }
            }
            other => other,
        };
        Self::new(url, self.media_type, self.charset, content)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn charset(&self) -> &str {
        &self.charset
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn dom(&self) -> Option<&RcDom> {
        match &self.content {
            Content::Document { dom, .. } => Some(dom),
            _ => None,
        }
    }

    /// The document node, for document resources.
    pub fn doc(&self) -> Option<Handle> {
        self.dom().map(|dom| dom.document.clone())
    }

    pub fn document_context(&self) -> Option<Rc<DocumentContext>> {
        match &self.content {
            Content::Document { context, .. } => Some(context.clone()),
            _ => None,
        }
    }

    /// Current content as text. Documents are serialized.
    pub fn string(&self) -> Result<String, FreezeDryError> {
        match &self.content {
            Content::Document { dom, .. } => Ok(serialize_node(&dom.document)?),
            Content::Stylesheet(text) => Ok(text.borrow().clone()),
            Content::Leaf(data) => {
                let encoding = Encoding::for_label(self.charset.as_bytes()).unwrap_or(UTF_8);
                Ok(encoding.decode(data).0.into_owned())
            }
        }
    }

    /// Current content as bytes. Documents and stylesheets are always UTF-8.
    pub fn blob(&self) -> Result<Blob, FreezeDryError> {
        let blob = match &self.content {
            Content::Document { .. } | Content::Stylesheet(_) => Blob {
                data: self.string()?.into_bytes(),
                media_type: self.media_type.clone(),
                charset: Some("utf-8".to_string()),
            },
            Content::Leaf(data) => Blob {
                data: data.clone(),
                media_type: self.media_type.clone(),
                charset: Some(self.charset.clone()).filter(|charset| !charset.is_empty()),
            },
        };
        Ok(blob)
    }

    /// Links in the current content, extracted on first use.
    ///
    /// Each link reads and writes its source live, so the list only goes stale when the
    /// content changes shape (elements added or removed); call [`Resource::invalidate_links`]
    /// after such changes.
    pub fn links(&self) -> Vec<Rc<Link>> {
        if let Some(links) = self.links.borrow().as_ref() {
            return links.clone();
        }

        let links = match &self.content {
            Content::Document { context, .. } => extract_links_from_dom(context),
            Content::Stylesheet(text) => {
                let view = Rc::new(stylesheet_view(
                    StyleBacking::Text(text.clone()),
                    CssKind::Stylesheet,
                ));
                stylesheet_links(&view, StyleOwner::Sheet, LinkBase::Fixed(self.url.clone()))
            }
            Content::Leaf(_) => Vec::new(),
        };
        *self.links.borrow_mut() = Some(links.clone());
        links
    }

    pub fn invalidate_links(&self) {
        *self.links.borrow_mut() = None;
    }

    /// Resources attached to this resource's links so far.
    pub fn subresources(&self) -> Vec<Rc<Resource>> {
        self.links().iter().filter_map(|link| link.resource()).collect()
    }
}

/// Decodes with the declared charset, else the one the document declares itself, else UTF-8.
fn decode_document(data: &[u8], charset: &str) -> RcDom {
    if Encoding::for_label(charset.as_bytes()).is_some() {
        return html_to_dom(data, charset);
    }

    let dom = html_to_dom(data, "utf-8");
    match get_charset(&dom.document) {
        Some(declared)
            if Encoding::for_label(declared.as_bytes()).is_some_and(|e| e != UTF_8) =>
        {
            html_to_dom(data, &declared)
        }
        _ => dom,
    }
}
