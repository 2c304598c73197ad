//! # Parsers
//!
//! - `html` - token parsers, the URL attribute registry, DOM helpers and document links
//! - `css` - URLs in stylesheets and `style` attributes
//! - `js` - event handler attributes

pub mod css;
pub mod html;
pub mod js;

pub use css::{CssKind, CssSheet, CssUrl};
pub use html::{extract_links_from_dom, parse_html, DocumentContext, TokenPointer};
pub use js::attr_is_event_handler;
