//! HTML
//!
//! - `utils`: whitespace handling and shared constants
//! - `parser`: the token parsers that split attribute values into URLs
//! - `attributes`: the registry of URL-valued attributes
//! - `dom`: basic DOM operations
//! - `links`: extracting the links of a document
//! - `metadata`: charset, policy and snapshot metadata
//! - `assets`: subresource integrity

pub mod assets;
pub mod attributes;
pub mod dom;
pub mod links;
pub mod metadata;
pub mod parser;
pub mod utils;

pub use assets::check_integrity;
pub use attributes::{attribute_rules, rule, AttributeRule, SubresourceType, TokenParser};
pub use dom::{
    find_nodes, get_child_node_by_name, get_node_attr, get_node_name, get_parent_node, html_to_dom,
    parse_html, serialize_node, set_node_attr,
};
pub use links::{extract_links_from_dom, DocumentContext};
pub use metadata::{finalize_document, get_charset};
pub use parser::{
    parse_comma_separated, parse_meta_refresh, parse_single_token, parse_srcset,
    parse_whitespace_separated, TokenPointer,
};
pub use utils::{DEFAULT_CONTENT_SECURITY_POLICY, WHITESPACES};
