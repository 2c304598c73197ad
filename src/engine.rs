//! # Snapshot engine
//!
//! Walks the tree of resources reachable from a root document: dries each resource, processes
//! its subresource links concurrently and rewrites every link to point at a self-contained copy
//! of its target.
//!
//! Each step can be replaced through a hook trait. [`ProcessSubresource`] replaces the whole
//! per-link pipeline and receives a [`Recurse`] continuation that offers the default building
//! blocks, including recursing into the link's own subresources.
//!
//! All work happens on the calling task. Sibling links are joined, not spawned, so the
//! reference-counted DOM never leaves the thread.

use std::rc::Rc;

use futures::future::{join_all, LocalBoxFuture};
use futures::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::{
    is_css_media_type, is_html_media_type, FetchError, FreezeDryError, FreezeDryOptions,
};
use crate::links::Link;
use crate::network::{CachedFetcher, FetchResource, FetchedResource};
use crate::parsers::html::dom::{get_node_attr, set_node_attr};
use crate::parsers::html::metadata::finalize_document;
use crate::resource::Resource;
use crate::utils::url::{clean_url, create_data_url, parse_data_url, Url};

/// Transforms a resource before its links are processed.
pub trait DryResource {
    fn dry<'a>(
        &'a self,
        resource: &'a Resource,
        options: &'a FreezeDryOptions,
    ) -> LocalBoxFuture<'a, Result<(), FreezeDryError>>;
}

/// Chooses the URL a processed subresource is replaced with.
pub trait NewUrlForResource {
    fn new_url<'a>(&'a self, resource: &'a Resource)
        -> LocalBoxFuture<'a, Result<String, FreezeDryError>>;
}

/// Handles one subresource link.
///
/// An error leaves the link as it is; the snapshot goes on.
pub trait ProcessSubresource {
    fn process<'a>(
        &'a self,
        link: Rc<Link>,
        recurse: Recurse<'a>,
    ) -> LocalBoxFuture<'a, Result<(), FreezeDryError>>;
}

/// Inlines resources as `data:` URLs.
pub struct DataUrlForResource;

impl NewUrlForResource for DataUrlForResource {
    fn new_url<'a>(
        &'a self,
        resource: &'a Resource,
    ) -> LocalBoxFuture<'a, Result<String, FreezeDryError>> {
        async move {
            let blob = resource.blob()?;
            Ok(create_data_url(
                &blob.media_type,
                blob.charset.as_deref().unwrap_or_default(),
                &blob.data,
                resource.url(),
            ))
        }
        .boxed_local()
    }
}

/// Fetch, recurse, inline.
pub struct DefaultProcessSubresource;

impl ProcessSubresource for DefaultProcessSubresource {
    fn process<'a>(
        &'a self,
        link: Rc<Link>,
        recurse: Recurse<'a>,
    ) -> LocalBoxFuture<'a, Result<(), FreezeDryError>> {
        async move { recurse.process_link_default(link).await }.boxed_local()
    }
}

/// URLs of the resources currently being processed, innermost first.
///
/// Each frame holds every URL one resource is known by: the target it was requested as and the
/// URL it was finally fetched from.
#[derive(Clone, Default)]
pub struct Ancestry(Option<Rc<AncestryFrame>>);

struct AncestryFrame {
    urls: Vec<Url>,
    parent: Ancestry,
}

impl Ancestry {
    pub fn root(url: &Url) -> Self {
        Ancestry::default().push(vec![url.clone()])
    }

    pub fn push(&self, urls: Vec<Url>) -> Self {
        let urls = urls.iter().map(clean_url).collect();
        Ancestry(Some(Rc::new(AncestryFrame {
            urls,
            parent: self.clone(),
        })))
    }

    pub fn contains(&self, url: &Url) -> bool {
        let url = clean_url(url);
        let mut current = self.0.as_ref();
        while let Some(frame) = current {
            if frame.urls.contains(&url) {
                return true;
            }
            current = frame.parent.0.as_ref();
        }
        false
    }

    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.0.as_ref();
        while let Some(frame) = current {
            depth += 1;
            current = frame.parent.0.as_ref();
        }
        depth
    }
}

/// State of one snapshot. Never shared between snapshots.
pub struct Engine {
    options: FreezeDryOptions,
    signal: CancellationToken,
    deadline: Option<Instant>,
    fetcher: CachedFetcher,
    dry: Rc<dyn DryResource>,
    new_url: Rc<dyn NewUrlForResource>,
    process: Rc<dyn ProcessSubresource>,
}

impl Engine {
    pub fn new(
        options: FreezeDryOptions,
        signal: CancellationToken,
        fetcher: Rc<dyn FetchResource>,
        dry: Rc<dyn DryResource>,
        new_url: Rc<dyn NewUrlForResource>,
        process: Rc<dyn ProcessSubresource>,
    ) -> Self {
        let deadline = options.timeout().map(|timeout| Instant::now() + timeout);
        Self {
            options,
            signal,
            deadline,
            fetcher: CachedFetcher::new(fetcher),
            dry,
            new_url,
            process,
        }
    }

    pub fn options(&self) -> &FreezeDryOptions {
        &self.options
    }

    pub fn signal(&self) -> &CancellationToken {
        &self.signal
    }

    /// Resolves once the snapshot has to stop, with the reason. The timeout runs from the
    /// engine's creation, so it covers fetching the root document too.
    async fn cut_off(&self) -> &'static str {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = tokio::time::sleep_until(deadline) => "timed out",
                _ = self.signal.cancelled() => "cancelled",
            },
            None => {
                self.signal.cancelled().await;
                "cancelled"
            }
        }
    }

    /// Fetches the root document through the snapshot's cache, within its time budget.
    pub async fn fetch_root(&self, url: &Url) -> Result<FetchedResource, FetchError> {
        tokio::select! {
            biased;
            fetched = self.fetcher.fetch(url, &self.signal) => fetched,
            reason = self.cut_off() => {
                self.signal.cancel();
                info!(%url, reason, "Snapshot cut off before the document arrived");
                Err(FetchError::Aborted(url.to_string()))
            }
        }
    }

    /// Snapshots `root` and returns its serialized content.
    ///
    /// Running out of time or being cancelled is not an error: links not inlined by then keep
    /// their original targets.
    pub async fn freeze(&self, root: Rc<Resource>) -> Result<String, FreezeDryError> {
        info!(url = %root.url(), "Starting snapshot");

        let processing = async {
            self.dry.dry(&root, &self.options).await?;
            self.process_links(root.clone(), Ancestry::root(root.url()))
                .await;
            Ok::<(), FreezeDryError>(())
        };

        tokio::select! {
            biased;
            result = processing => result?,
            reason = self.cut_off() => {
                self.signal.cancel();
                info!(url = %root.url(), reason, "Snapshot cut off; unfinished links keep their targets");
            }
        }

        if let Some(dom) = root.dom() {
            finalize_document(dom, root.url(), &self.options);
        }
        let output = root.string()?;

        info!(
            url = %root.url(),
            fetched = self.fetcher.len(),
            bytes = output.len(),
            "Finished snapshot"
        );
        Ok(output)
    }

    /// Runs the subresource hook on every subresource link of `resource`, concurrently.
    pub fn process_links<'a>(
        &'a self,
        resource: Rc<Resource>,
        ancestry: Ancestry,
    ) -> LocalBoxFuture<'a, ()> {
        async move {
            if self.signal.is_cancelled() {
                return;
            }

            let links: Vec<Rc<Link>> = resource
                .links()
                .into_iter()
                .filter(|link| link.is_subresource())
                .collect();

            let tasks = links.into_iter().map(|link| {
                let recurse = Recurse {
                    engine: self,
                    ancestry: ancestry.clone(),
                };
                async move {
                    if let Err(e) = self.process.process(link.clone(), recurse).await {
                        warn!(link = %link.target(), error = %e, "Leaving link as is");
                    }
                }
            });
            join_all(tasks).await;
        }
        .boxed_local()
    }
}

/// What a [`ProcessSubresource`] hook gets to work with: the default pipeline's steps, bound to
/// the link's position in the resource tree.
#[derive(Clone)]
pub struct Recurse<'a> {
    engine: &'a Engine,
    ancestry: Ancestry,
}

impl<'a> Recurse<'a> {
    pub fn options(&self) -> &'a FreezeDryOptions {
        &self.engine.options
    }

    pub fn signal(&self) -> &'a CancellationToken {
        &self.engine.signal
    }

    /// Whether `url` is one of the resources the link sits inside.
    pub fn is_cyclic(&self, url: &Url) -> bool {
        self.ancestry.contains(url)
    }

    /// Fetches through the snapshot's cache.
    pub async fn fetch(&self, url: &Url) -> Result<FetchedResource, FetchError> {
        self.engine.fetcher.fetch(url, &self.engine.signal).await
    }

    /// Fetches the link's target and builds a resource from it.
    pub async fn fetch_resource(&self, link: &Link) -> Result<Rc<Resource>, FreezeDryError> {
        let resource =
            Resource::from_link(link, &self.engine.fetcher, &self.engine.signal).await?;
        Ok(Rc::new(resource))
    }

    /// Dries the link's resource and processes its own subresources.
    pub async fn recurse(&self, link: &Link) -> Result<(), FreezeDryError> {
        let Some(resource) = link.resource() else {
            return Ok(());
        };

        self.engine
            .dry
            .dry(&resource, &self.engine.options)
            .await?;

        let mut urls: Vec<Url> = link.absolute_target().into_iter().collect();
        urls.push(resource.url().clone());
        let ancestry = self.ancestry.push(urls);
        debug!(url = %resource.url(), depth = ancestry.depth(), "Recursing");

        self.engine.process_links(resource, ancestry).await;
        Ok(())
    }

    pub async fn new_url_for(&self, resource: &Resource) -> Result<String, FreezeDryError> {
        self.engine.new_url.new_url(resource).await
    }

    /// Points the link at `new_target`.
    ///
    /// The previous attribute value is kept in `data-original-<attribute>` (once, so every
    /// token of a multi-URL attribute shares it), and `integrity` goes since it described the
    /// old bytes.
    pub fn assign_target(&self, link: &Link, new_target: &str) {
        if let (Some(element), Some(attribute)) = (link.element(), link.attribute_name()) {
            if self.engine.options.keep_original_attributes {
                let original_name = format!("data-original-{attribute}");
                if get_node_attr(&element, &original_name).is_none() {
                    set_node_attr(&element, &original_name, get_node_attr(&element, attribute));
                }
            }
        }

        let had_integrity = link.integrity().is_some();
        link.set_target(new_target);
        if had_integrity {
            if let Some(element) = link.element() {
                set_node_attr(&element, "integrity", None);
            }
        }
    }

    /// The default pipeline: resolve, skip cycles, fetch, recurse, inline.
    pub async fn process_link_default(&self, link: Rc<Link>) -> Result<(), FreezeDryError> {
        let target = link.target();
        if is_self_reference(&target) {
            debug!(link = %target, "Skipping reference to the containing resource");
            return Ok(());
        }

        let Some(url) = link.absolute_target() else {
            debug!(link = %link.target(), "Skipping unresolvable link");
            return Ok(());
        };

        if self.is_cyclic(&url) {
            debug!(url = %url, "Skipping link back into a resource being processed");
            return Ok(());
        }

        let resource = match link.resource() {
            Some(resource) => resource,
            None => {
                if is_leaf_data_url(&url) {
                    debug!("Keeping data URL");
                    return Ok(());
                }
                let resource = self.fetch_resource(&link).await?;
                link.set_resource(resource.clone());
                resource
            }
        };

        self.recurse(&link).await?;

        let mut new_url = self.new_url_for(&resource).await?;
        if let Some(fragment) = url.fragment() {
            new_url.push('#');
            new_url.push_str(fragment);
        }
        self.assign_target(&link, &new_url);
        Ok(())
    }
}

/// `url("")` and `url(#id)` point into the resource they appear in.
fn is_self_reference(target: &str) -> bool {
    let target = target.trim();
    target.is_empty() || target.starts_with('#')
}

/// A `data:` URL with nothing inside that could link elsewhere.
fn is_leaf_data_url(url: &Url) -> bool {
    if url.scheme() != "data" {
        return false;
    }
    let (media_type, _, _) = parse_data_url(url);
    !is_html_media_type(&media_type) && !is_css_media_type(&media_type)
}
