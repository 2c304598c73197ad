// Shared fixtures for the snapshot tests: an in-memory web to fetch from, and helpers for
// reading attributes and data URLs back out of the output.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use freeze_dry::core::FetchError;
use freeze_dry::network::fetch::fetch_data_url;
use freeze_dry::parsers::html::dom::{get_node_attr, get_node_name, parse_html, walk_elements};
use freeze_dry::utils::url::{clean_url, parse_data_url, Url};
use freeze_dry::{FetchResource, FetchedResource, FreezeDryOptions};
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

pub const PAGE_URL: &str = "https://example.com/page.html";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Options for a document at [`PAGE_URL`], without the time-dependent metadata.
pub fn options() -> FreezeDryOptions {
    FreezeDryOptions {
        add_metadata: false,
        doc_url: Some(PAGE_URL.to_string()),
        ..Default::default()
    }
}

#[derive(Clone)]
struct Entry {
    content_type: Option<String>,
    data: Vec<u8>,
    delay: Option<Duration>,
}

/// Serves a fixed set of URLs; anything else is a 404.
///
/// `data:` URLs are decoded in place. Every other request is recorded.
#[derive(Clone, Default)]
pub struct MemoryFetcher {
    entries: HashMap<String, Entry>,
    requests: Rc<RefCell<Vec<String>>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, url: &str, content_type: &str, data: impl AsRef<[u8]>) -> Self {
        self.with_entry(url, Some(content_type), data.as_ref(), None)
    }

    pub fn with_delay(
        self,
        url: &str,
        content_type: &str,
        data: impl AsRef<[u8]>,
        delay: Duration,
    ) -> Self {
        self.with_entry(url, Some(content_type), data.as_ref(), Some(delay))
    }

    fn with_entry(
        mut self,
        url: &str,
        content_type: Option<&str>,
        data: &[u8],
        delay: Option<Duration>,
    ) -> Self {
        self.entries.insert(
            url.to_string(),
            Entry {
                content_type: content_type.map(str::to_string),
                data: data.to_vec(),
                delay,
            },
        );
        self
    }

    /// Handle to the request log; stays valid after the fetcher is moved into a snapshot.
    pub fn requests(&self) -> Rc<RefCell<Vec<String>>> {
        self.requests.clone()
    }
}

impl FetchResource for MemoryFetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a Url,
        signal: &'a CancellationToken,
    ) -> LocalBoxFuture<'a, Result<FetchedResource, FetchError>> {
        async move {
            if url.scheme() == "data" {
                return Ok(fetch_data_url(url));
            }
            self.requests.borrow_mut().push(url.to_string());

            let Some(entry) = self.entries.get(clean_url(url).as_str()) else {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                });
            };

            if let Some(delay) = entry.delay {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = signal.cancelled() => return Err(FetchError::Aborted(url.to_string())),
                }
            }

            Ok(FetchedResource {
                url: url.clone(),
                data: entry.data.clone(),
                content_type: entry.content_type.clone(),
            })
        }
        .boxed_local()
    }
}

/// Values of `attribute` on every `tag` element of `html`, in document order.
pub fn attr_values(html: &str, tag: &str, attribute: &str) -> Vec<String> {
    let dom = parse_html(html);
    walk_elements(&dom.document)
        .iter()
        .filter(|element| get_node_name(element) == Some(tag))
        .filter_map(|element| get_node_attr(element, attribute))
        .collect()
}

pub fn attr_value(html: &str, tag: &str, attribute: &str) -> String {
    attr_values(html, tag, attribute)
        .into_iter()
        .next()
        .unwrap_or_else(|| panic!("no <{tag} {attribute}> in {html}"))
}

pub fn decode_data_url(data_url: &str) -> String {
    let url = Url::parse(data_url).unwrap();
    assert_eq!(url.scheme(), "data", "not a data URL: {data_url}");
    let (_media_type, _charset, data) = parse_data_url(&url);
    String::from_utf8(data).unwrap()
}

/// The first quoted `data:` URL in a stylesheet.
pub fn first_quoted_data_url(css: &str) -> String {
    let start = css.find("\"data:").unwrap() + 1;
    let end = start + css[start..].find('"').unwrap();
    css[start..end].to_string()
}
