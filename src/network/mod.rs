//! # Network
//!
//! The fetch primitive the snapshot engine retrieves subresources with.
//!
//! - `fetch` - the [`FetchResource`] seam, the default HTTP/data/file fetcher and the per-snapshot
//!   fetch cache

pub mod fetch;

pub use fetch::{CachedFetcher, FetchResource, FetchedResource, HttpFetcher};
