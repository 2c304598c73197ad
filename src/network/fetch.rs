use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use futures::future::{LocalBoxFuture, Shared};
use futures::FutureExt;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::{FetchError, FreezeDryError};
use crate::utils::url::{clean_url, parse_data_url, Url};

/// A retrieved response body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedResource {
    /// The URL the bytes finally came from, after redirects.
    pub url: Url,
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

/// Retrieves the bytes behind a URL.
///
/// Implementations must give up with [`FetchError::Aborted`] once `signal` is cancelled.
pub trait FetchResource {
    fn fetch<'a>(
        &'a self,
        url: &'a Url,
        signal: &'a CancellationToken,
    ) -> LocalBoxFuture<'a, Result<FetchedResource, FetchError>>;
}

/// `http(s):` through reqwest, `data:` decoded in place, `file:` from disk.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: Option<&str>) -> Result<Self, FreezeDryError> {
        let mut builder = Client::builder();
        if let Some(user_agent) = user_agent {
            let mut headers = reqwest::header::HeaderMap::new();
            let value = user_agent
                .parse()
                .map_err(|_| FreezeDryError::Config(format!("invalid user agent '{user_agent}'")))?;
            headers.insert(USER_AGENT, value);
            builder = builder.default_headers(headers);
        }

        let client = builder
            .build()
            .map_err(|e| FreezeDryError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn fetch_http(&self, url: &Url) -> Result<FetchedResource, FetchError> {
        let network_error = |e: reqwest::Error| FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let data = response.bytes().await.map_err(network_error)?;

        Ok(FetchedResource {
            url: final_url,
            data: data.to_vec(),
            content_type,
        })
    }

    async fn fetch_file(&self, url: &Url) -> Result<FetchedResource, FetchError> {
        let io_error = |message: String| FetchError::Io {
            url: url.to_string(),
            message,
        };

        let path = url
            .to_file_path()
            .map_err(|_| io_error("not a local path".to_string()))?;
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| io_error(e.to_string()))?;

        Ok(FetchedResource {
            url: url.clone(),
            data,
            content_type: None,
        })
    }
}

/// Decodes a `data:` URL without touching the network.
pub fn fetch_data_url(url: &Url) -> FetchedResource {
    let (media_type, charset, data) = parse_data_url(url);
    let content_type = if charset.is_empty() {
        media_type
    } else {
        format!("{media_type};charset={charset}")
    };

    FetchedResource {
        url: url.clone(),
        data,
        content_type: Some(content_type),
    }
}

impl FetchResource for HttpFetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a Url,
        signal: &'a CancellationToken,
    ) -> LocalBoxFuture<'a, Result<FetchedResource, FetchError>> {
        async move {
            if signal.is_cancelled() {
                return Err(FetchError::Aborted(url.to_string()));
            }

            let fetching = async {
                match url.scheme() {
                    "data" => Ok(fetch_data_url(url)),
                    "http" | "https" => self.fetch_http(url).await,
                    "file" => self.fetch_file(url).await,
                    _ => Err(FetchError::UnsupportedScheme(url.to_string())),
                }
            };

            tokio::select! {
                result = fetching => result,
                _ = signal.cancelled() => Err(FetchError::Aborted(url.to_string())),
            }
        }
        .boxed_local()
    }
}

type SharedFetch = Shared<LocalBoxFuture<'static, Result<FetchedResource, FetchError>>>;

/// Wraps a fetcher so each URL is retrieved at most once, however many links point at it.
///
/// Fetches are keyed by URL without fragment. Waiters on one URL share a single in-flight
/// request and its outcome, failures included.
pub struct CachedFetcher {
    inner: Rc<dyn FetchResource>,
    fetches: RefCell<HashMap<Url, SharedFetch>>,
}

impl CachedFetcher {
    pub fn new(inner: Rc<dyn FetchResource>) -> Self {
        Self {
            inner,
            fetches: RefCell::new(HashMap::new()),
        }
    }

    /// Number of distinct URLs requested so far.
    pub fn len(&self) -> usize {
        self.fetches.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fetches.borrow().is_empty()
    }
}

impl FetchResource for CachedFetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a Url,
        signal: &'a CancellationToken,
    ) -> LocalBoxFuture<'a, Result<FetchedResource, FetchError>> {
        let key = clean_url(url);
        let shared = {
            let mut fetches = self.fetches.borrow_mut();
            match fetches.get(&key) {
                Some(shared) => {
                    debug!(url = %key, "Reusing fetch");
                    shared.clone()
                }
                None => {
                    let inner = self.inner.clone();
                    let signal = signal.clone();
                    let target = key.clone();
                    let shared = async move { inner.fetch(&target, &signal).await }
                        .boxed_local()
                        .shared();
                    fetches.insert(key, shared.clone());
                    shared
                }
            }
        };

        shared.boxed_local()
    }
}
