//! # freeze-dry
//!
//! Turns a web page and everything it loads into one self-contained, static HTML document:
//! subresources are fetched, processed recursively and inlined as `data:` URLs, and scripts
//! are stripped.
//!
//! ```no_run
//! # async fn run() -> Result<(), freeze_dry::FreezeDryError> {
//! let options = freeze_dry::FreezeDryOptions {
//!     doc_url: Some("https://example.com/".to_string()),
//!     ..Default::default()
//! };
//! let html = freeze_dry::freeze_dry(r#"<img src="logo.png">"#, options).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - `core` - errors, options and the [`FreezeDry`] entry point
//! - `engine` - the recursive snapshot engine and its hooks
//! - `dry` - the default interactivity stripping
//! - `links` - live link handles
//! - `resource` - documents, stylesheets and opaque resources
//! - `sync` - views that keep parsed data and its text in step
//! - `parsers` - HTML and CSS link extraction
//! - `network` - the fetch primitive
//! - `env` - environment variable configuration
//! - `utils` - URL helpers

pub mod core;
pub mod dry;
pub mod engine;
pub mod env;
pub mod links;
pub mod network;
pub mod parsers;
pub mod resource;
pub mod sync;
pub mod utils;

// Re-export commonly used items for convenience
pub use core::*;
pub use engine::{
    DataUrlForResource, DefaultProcessSubresource, DryResource, NewUrlForResource,
    ProcessSubresource, Recurse,
};
pub use links::{Anchor, Link};
pub use network::{FetchResource, FetchedResource, HttpFetcher};
pub use resource::Resource;
