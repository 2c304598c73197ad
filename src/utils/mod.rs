//! # Utilities
//!
//! - `url` - URL resolution, cleanup and the `data:` URL codec used for inlining

pub mod url;

pub use url::{clean_url, create_data_url, parse_data_url, resolve_url, Url};
