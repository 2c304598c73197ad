use std::rc::Rc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use markup5ever_rcdom::RcDom;
use serde::Deserialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::dry::DefaultDry;
use crate::engine::{
    DataUrlForResource, DefaultProcessSubresource, DryResource, Engine, NewUrlForResource,
    ProcessSubresource,
};
use crate::env::{snapshot, EnvVar};
use crate::network::{FetchResource, HttpFetcher};
use crate::parsers::html::attributes::SubresourceType;
use crate::parsers::html::dom::{get_child_node_by_name, parse_html};
use crate::parsers::html::utils::DEFAULT_CONTENT_SECURITY_POLICY;
use crate::resource::Resource;
use crate::utils::url::Url;

/// Errors surfaced to the caller of a snapshot.
///
/// Problems with individual subresources never end up here: they are logged and the link is left
/// pointing at its original target.
#[derive(Debug, Error)]
pub enum FreezeDryError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("hook failed: {0}")]
    Hook(String),

    #[error("failed to serialize document: {0}")]
    Serialize(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Why a subresource could not be retrieved.
///
/// `Clone` because one fetch may be awaited by several links pointing at the same URL.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("{url} responded with status {status}")]
    Status { url: String, status: u16 },

    #[error("fetch of {0} was aborted")]
    Aborted(String),

    #[error("cannot fetch URL scheme of {0}")]
    UnsupportedScheme(String),

    #[error("failed to read {url}: {message}")]
    Io { url: String, message: String },

    #[error("integrity check failed for {0}")]
    IntegrityMismatch(String),
}

pub type FreezeDryResult<T> = Result<T, FreezeDryError>;

/// Serializable snapshot configuration.
///
/// Hooks and the cancellation signal are not part of it; see [`FreezeDry`].
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct FreezeDryOptions {
    /// Insert the snapshot time and the original URL into the document.
    pub add_metadata: bool,
    /// Keep pre-inlining attribute values in `data-original-*` attributes.
    #[serde(alias = "remember_original_urls")]
    pub keep_original_attributes: bool,
    /// Snapshot timestamp; the current time when unset.
    pub now: Option<DateTime<Utc>>,
    pub content_security_policy: String,
    pub set_content_security_policy: bool,
    /// `None` removes every charset declaration.
    pub charset_declaration: Option<String>,
    pub timeout_ms: Option<u64>,
    /// URL of the document, overriding the one it was loaded from.
    pub doc_url: Option<String>,
    /// Only used by the default fetcher.
    pub user_agent: Option<String>,
}

impl Default for FreezeDryOptions {
    fn default() -> Self {
        Self {
            add_metadata: true,
            keep_original_attributes: true,
            now: None,
            content_security_policy: DEFAULT_CONTENT_SECURITY_POLICY.to_string(),
            set_content_security_policy: true,
            charset_declaration: Some("utf-8".to_string()),
            timeout_ms: None,
            doc_url: None,
            user_agent: None,
        }
    }
}

impl FreezeDryOptions {
    pub fn from_toml_str(input: &str) -> FreezeDryResult<Self> {
        let mut options: FreezeDryOptions =
            toml::from_str(input).map_err(|e| FreezeDryError::Config(e.to_string()))?;
        if options
            .charset_declaration
            .as_deref()
            .is_some_and(|charset| charset.trim().is_empty())
        {
            options.charset_declaration = None;
        }
        Ok(options)
    }

    /// Overrides fields with any `FREEZE_DRY_*` variables that are set.
    pub fn apply_env_overrides(&mut self) -> FreezeDryResult<()> {
        let config_error = |e: crate::env::EnvError| FreezeDryError::Config(e.to_string());

        if let Some(timeout_ms) = snapshot::TimeoutMs::get().map_err(config_error)? {
            self.timeout_ms = Some(timeout_ms);
        }
        if let Some(user_agent) = snapshot::UserAgent::get().map_err(config_error)? {
            self.user_agent = Some(user_agent);
        }
        if let Some(add_metadata) = snapshot::AddMetadata::get().map_err(config_error)? {
            self.add_metadata = add_metadata;
        }
        if let Some(keep) = snapshot::KeepOriginalAttributes::get().map_err(config_error)? {
            self.keep_original_attributes = keep;
        }
        if let Some(policy) = snapshot::ContentSecurityPolicy::get().map_err(config_error)? {
            self.content_security_policy = policy;
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn doc_url(&self) -> FreezeDryResult<Option<Url>> {
        self.doc_url
            .as_deref()
            .map(|doc_url| {
                Url::parse(doc_url).map_err(|source| FreezeDryError::InvalidUrl {
                    url: doc_url.to_string(),
                    source,
                })
            })
            .transpose()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }
}

/// Snapshot builder: options plus the overridable seams of the pipeline.
///
/// ```no_run
/// # async fn run() -> Result<(), freeze_dry::FreezeDryError> {
/// use freeze_dry::{FreezeDry, FreezeDryOptions};
///
/// let html = FreezeDry::new(FreezeDryOptions::default())
///     .freeze_url("https://example.com/")
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct FreezeDry {
    options: FreezeDryOptions,
    fetcher: Option<Rc<dyn FetchResource>>,
    dry: Rc<dyn DryResource>,
    new_url: Rc<dyn NewUrlForResource>,
    process: Rc<dyn ProcessSubresource>,
    signal: CancellationToken,
}

impl FreezeDry {
    pub fn new(options: FreezeDryOptions) -> Self {
        Self {
            options,
            fetcher: None,
            dry: Rc::new(DefaultDry),
            new_url: Rc::new(DataUrlForResource),
            process: Rc::new(DefaultProcessSubresource),
            signal: CancellationToken::new(),
        }
    }

    pub fn options(&self) -> &FreezeDryOptions {
        &self.options
    }

    /// Replaces the network fetch primitive.
    pub fn fetch_resource(mut self, fetcher: impl FetchResource + 'static) -> Self {
        self.fetcher = Some(Rc::new(fetcher));
        self
    }

    /// Replaces the per-resource transform (interactivity stripping by default).
    pub fn dry_resource(mut self, dry: impl DryResource + 'static) -> Self {
        self.dry = Rc::new(dry);
        self
    }

    /// Replaces the inlining strategy (data URLs by default).
    pub fn new_url_for_resource(mut self, new_url: impl NewUrlForResource + 'static) -> Self {
        self.new_url = Rc::new(new_url);
        self
    }

    /// Replaces the whole per-link pipeline.
    pub fn process_subresource(mut self, process: impl ProcessSubresource + 'static) -> Self {
        self.process = Rc::new(process);
        self
    }

    /// Cancelling `signal` stops the snapshot and yields whatever was inlined so far.
    pub fn signal(mut self, signal: CancellationToken) -> Self {
        self.signal = signal;
        self
    }

    fn fetcher(&self) -> FreezeDryResult<Rc<dyn FetchResource>> {
        match &self.fetcher {
            Some(fetcher) => Ok(fetcher.clone()),
            None => Ok(Rc::new(HttpFetcher::new(self.options.user_agent.as_deref())?)),
        }
    }

    fn document_url(&self, fallback: Option<Url>) -> FreezeDryResult<Url> {
        if let Some(doc_url) = self.options.doc_url()? {
            return Ok(doc_url);
        }
        match fallback {
            Some(url) => Ok(url),
            None => Url::parse("about:blank").map_err(|source| FreezeDryError::InvalidUrl {
                url: "about:blank".to_string(),
                source,
            }),
        }
    }

    pub async fn freeze_html(&self, html: &str) -> FreezeDryResult<String> {
        self.freeze_dom(parse_html(html)).await
    }

    pub async fn freeze_dom(&self, dom: RcDom) -> FreezeDryResult<String> {
        if get_child_node_by_name(&dom.document, "html").is_none() {
            return Err(FreezeDryError::InvalidInput(
                "document has no root element".to_string(),
            ));
        }
        let url = self.document_url(None)?;
        self.freeze_resource(Rc::new(Resource::from_dom(dom, url)))
            .await
    }

    /// A fresh engine; its time budget starts now.
    fn engine(&self) -> FreezeDryResult<Engine> {
        Ok(Engine::new(
            self.options.clone(),
            self.signal.child_token(),
            self.fetcher()?,
            self.dry.clone(),
            self.new_url.clone(),
            self.process.clone(),
        ))
    }

    pub async fn freeze_resource(&self, root: Rc<Resource>) -> FreezeDryResult<String> {
        self.engine()?.freeze(root).await
    }

    /// Fetches the document at `url` and snapshots it.
    ///
    /// The timeout covers fetching the document itself; running out of time before it arrives is
    /// a [`FetchError::Aborted`].
    pub async fn freeze_url(&self, url: &str) -> FreezeDryResult<String> {
        let parsed = Url::parse(url).map_err(|source| FreezeDryError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        let engine = self.engine()?;
        let fetched = engine.fetch_root(&parsed).await?;
        let mut root = Resource::from_response(fetched, Some(SubresourceType::Document));
        if root.doc().is_none() {
            return Err(FreezeDryError::UnsupportedMediaType(
                root.media_type().to_string(),
            ));
        }
        if let Some(doc_url) = self.options.doc_url()? {
            root = root.with_url(doc_url);
        }
        engine.freeze(Rc::new(root)).await
    }
}

/// Snapshots an HTML string with the default pipeline.
pub async fn freeze_dry(html: &str, options: FreezeDryOptions) -> FreezeDryResult<String> {
    FreezeDry::new(options).freeze_html(html).await
}

const FILE_SIGNATURES: [[&[u8]; 2]; 22] = [
    // Image
    [b"GIF87a", b"image/gif"],
    [b"GIF89a", b"image/gif"],
    [b"\xFF\xD8\xFF", b"image/jpeg"],
    [b"\x89PNG\x0D\x0A\x1A\x0A", b"image/png"],
    [b"<svg ", b"image/svg+xml"],
    [b"RIFF....WEBPVP8", b"image/webp"],
    [b"\x00\x00\x01\x00", b"image/x-icon"],
    // Audio
    [b"ID3", b"audio/mpeg"],
    [b"\xFF\x0E", b"audio/mpeg"],
    [b"\xFF\x0F", b"audio/mpeg"],
    [b"OggS", b"audio/ogg"],
    [b"RIFF....WAVEfmt ", b"audio/wav"],
    [b"fLaC", b"audio/x-flac"],
    // Video
    [b"RIFF....AVI LIST", b"video/avi"],
    [b"....ftyp", b"video/mp4"],
    [b"\x00\x00\x01\x0B", b"video/mpeg"],
    [b"....moov", b"video/quicktime"],
    [b"\x1A\x45\xDF\xA3", b"video/webm"],
    // Font
    [b"wOFF", b"font/woff"],
    [b"wOF2", b"font/woff2"],
    [b"\x00\x01\x00\x00\x00", b"font/ttf"],
    [b"OTTO", b"font/otf"],
];

// All known non-"text/..." plaintext media types
const PLAINTEXT_MEDIA_TYPES: &[&str] = &[
    "application/javascript",          // .js
    "application/json",                // .json
    "application/ld+json",             // .jsonld
    "application/x-sh",                // .sh
    "application/xhtml+xml",           // .xhtml
    "application/xml",                 // .xml
    "application/vnd.mozilla.xul+xml", // .xul
    "image/svg+xml",                   // .svg
];

/// `.` in a signature matches any byte.
fn matches_signature(data: &[u8], signature: &[u8]) -> bool {
    data.len() >= signature.len()
        && signature
            .iter()
            .zip(data)
            .all(|(expected, actual)| *expected == b'.' || expected == actual)
}

/// Determines the media type of data based on its content signature
pub fn detect_media_type(data: &[u8], url: &Url) -> String {
    for [signature, media_type] in FILE_SIGNATURES.iter() {
        if matches_signature(data, signature) {
            return String::from_utf8_lossy(media_type).to_string();
        }
    }

    detect_media_type_by_file_name(url.path())
}

/// Determines the media type based on file extension
pub fn detect_media_type_by_file_name(filename: &str) -> String {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "html" | "htm" => "text/html",
        "xhtml" => "application/xhtml+xml",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "flac" => "audio/x-flac",
        "mp4" => "video/mp4",
        "avi" => "video/avi",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mpeg" | "mpg" => "video/mpeg",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// Splits a `Content-Type` value (or a data URL header) into media type, charset and whether
/// `;base64` was present.
pub fn parse_content_type(content_type: &str) -> (String, String, bool) {
    let mut parts = content_type.split(';');
    let media_type = parts.next().unwrap_or_default().trim().to_lowercase();
    let mut charset = String::new();
    let mut is_base64 = false;

    for part in parts {
        let part = part.trim();
        match part.split_once('=') {
            Some((name, value)) if name.trim().eq_ignore_ascii_case("charset") => {
                charset = value.trim().trim_matches('"').to_string();
            }
            None if part.eq_ignore_ascii_case("base64") => is_base64 = true,
            _ => {}
        }
    }

    (media_type, charset, is_base64)
}

pub fn is_plaintext_media_type(media_type: &str) -> bool {
    media_type.starts_with("text/") || PLAINTEXT_MEDIA_TYPES.contains(&media_type)
}

pub fn is_html_media_type(media_type: &str) -> bool {
    matches!(media_type, "text/html" | "application/xhtml+xml")
}

pub fn is_css_media_type(media_type: &str) -> bool {
    media_type == "text/css"
}
