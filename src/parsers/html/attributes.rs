//! # URL attribute registry
//!
//! Which attributes of which elements hold URLs, how to split their values into URL tokens,
//! whether the URLs point at subresources, and how to make them absolute.
//!
//! Three generations of HTML (4.01, 5.2, WHATWG living standard) are described as separate
//! tables, then merged into one effective registry: for every rule name the element selectors of
//! all tables are unioned, and each field a later table sets overrides the earlier value.

use std::fmt;
use std::sync::LazyLock;

use markup5ever_rcdom::Handle;

use crate::utils::url::{resolve_url, Url};

use super::dom::{get_node_attr, get_node_name};
use super::parser::{
    parse_comma_separated, parse_meta_refresh, parse_single_token, parse_srcset,
    parse_whitespace_separated, TokenPointer,
};
use super::utils::includes_token;

/// What kind of content a subresource link is expected to load.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubresourceType {
    Audio,
    Document,
    Embed,
    Font,
    Image,
    Object,
    Script,
    Style,
    Track,
    Video,
}

/// How an attribute value is split into URL tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenParser {
    SingleToken,
    WhitespaceSeparated,
    CommaSeparated,
    Srcset,
    MetaRefresh,
}

impl TokenParser {
    pub fn parse(self, value: &str) -> Vec<TokenPointer> {
        match self {
            TokenParser::SingleToken => parse_single_token(value),
            TokenParser::WhitespaceSeparated => parse_whitespace_separated(value),
            TokenParser::CommaSeparated => parse_comma_separated(value),
            TokenParser::Srcset => parse_srcset(value),
            TokenParser::MetaRefresh => parse_meta_refresh(value),
        }
    }
}

/// What a relative URL is resolved against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// The element's base URL (`<base href>` included).
    Base,
    /// The element's `codebase` attribute, itself resolved against the base URL.
    Codebase,
    /// The document URL, ignoring any `<base>`.
    DocumentUrl,
    /// Only absolute URLs are meaningful; relative values do not resolve at all.
    AbsoluteOnly,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttrCondition {
    Equals(&'static str, &'static str),
    Includes(&'static str, &'static str),
    Excludes(&'static str, &'static [&'static str]),
}

/// A tiny subset of CSS selectors: an optional tag name plus an optional attribute condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElementSelector {
    pub tag: Option<&'static str>,
    pub condition: Option<AttrCondition>,
}

impl ElementSelector {
    pub const fn tag(tag: &'static str) -> Self {
        Self {
            tag: Some(tag),
            condition: None,
        }
    }

    pub const fn any() -> Self {
        Self {
            tag: None,
            condition: None,
        }
    }

    pub const fn with(self, condition: AttrCondition) -> Self {
        Self {
            tag: self.tag,
            condition: Some(condition),
        }
    }

    pub fn matches(&self, element: &Handle) -> bool {
        let Some(name) = get_node_name(element) else {
            return false;
        };
        if let Some(tag) = self.tag {
            if !name.eq_ignore_ascii_case(tag) {
                return false;
            }
        }

        match self.condition {
            None => true,
            Some(AttrCondition::Equals(attr, expected)) => get_node_attr(element, attr)
                .is_some_and(|value| value.trim().eq_ignore_ascii_case(expected)),
            Some(AttrCondition::Includes(attr, token)) => {
                get_node_attr(element, attr).is_some_and(|value| includes_token(&value, token))
            }
            Some(AttrCondition::Excludes(attr, tokens)) => {
                let value = get_node_attr(element, attr).unwrap_or_default();
                !tokens.iter().any(|token| includes_token(&value, token))
            }
        }
    }
}

impl fmt::Display for ElementSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag.unwrap_or("*"))?;
        match self.condition {
            None => Ok(()),
            Some(AttrCondition::Equals(attr, value)) => write!(f, "[{attr}={value}]"),
            Some(AttrCondition::Includes(attr, token)) => write!(f, "[{attr}~={token}]"),
            Some(AttrCondition::Excludes(attr, tokens)) => {
                let excluded: Vec<String> =
                    tokens.iter().map(|t| format!("[{attr}~={t}]")).collect();
                write!(f, ":not({})", excluded.join(","))
            }
        }
    }
}

/// Everything needed to make a URL found on `element` absolute.
pub struct ResolveContext<'a> {
    pub element: &'a Handle,
    pub document_url: &'a Url,
    /// The document's effective base URL, `<base href>` already applied.
    pub base_url: &'a Url,
}

/// One effective, merged rule.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeRule {
    pub name: &'static str,
    pub attribute: &'static str,
    pub elements: Vec<ElementSelector>,
    pub parser: TokenParser,
    pub is_subresource: bool,
    pub subresource_type: Option<SubresourceType>,
    pub resolution: Resolution,
}

impl AttributeRule {
    pub fn parse(&self, value: &str) -> Vec<TokenPointer> {
        self.parser.parse(value)
    }

    /// Whether `element` carries this rule's attribute and matches one of its selectors.
    pub fn applies_to(&self, element: &Handle) -> bool {
        get_node_attr(element, self.attribute).is_some()
            && self.elements.iter().any(|selector| selector.matches(element))
    }

    /// Resolves `url` as this attribute's value on `context.element`; `None` if it cannot be.
    pub fn make_absolute(&self, url: &str, context: &ResolveContext) -> Option<Url> {
        match self.resolution {
            Resolution::Base => resolve_url(context.base_url, url),
            Resolution::DocumentUrl => resolve_url(context.document_url, url),
            Resolution::AbsoluteOnly => Url::parse(url.trim()).ok(),
            Resolution::Codebase => {
                let codebase = get_node_attr(context.element, "codebase")
                    .and_then(|value| {
                        let codebase_rule = rule("codebase")?;
                        let token = codebase_rule.parse(&value).into_iter().next()?;
                        codebase_rule.make_absolute(&token.token, context)
                    })
                    .unwrap_or_else(|| context.base_url.clone());
                resolve_url(&codebase, url)
            }
        }
    }
}

/// A rule as one table describes it; unset fields fall through to earlier tables.
#[derive(Clone, Copy)]
struct RuleSpec {
    name: &'static str,
    attribute: Option<&'static str>,
    elements: &'static [ElementSelector],
    parser: Option<TokenParser>,
    is_subresource: Option<bool>,
    subresource_type: Option<SubresourceType>,
    resolution: Option<Resolution>,
}

impl RuleSpec {
    const fn new(name: &'static str, elements: &'static [ElementSelector]) -> Self {
        Self {
            name,
            attribute: None,
            elements,
            parser: None,
            is_subresource: None,
            subresource_type: None,
            resolution: None,
        }
    }

    const fn attribute(mut self, attribute: &'static str) -> Self {
        self.attribute = Some(attribute);
        self
    }

    const fn parser(mut self, parser: TokenParser) -> Self {
        self.parser = Some(parser);
        self
    }

    const fn subresource(mut self, subresource_type: SubresourceType) -> Self {
        self.is_subresource = Some(true);
        self.subresource_type = Some(subresource_type);
        self
    }

    const fn not_subresource(mut self) -> Self {
        self.is_subresource = Some(false);
        self
    }

    const fn resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }
}

const fn tag(name: &'static str) -> ElementSelector {
    ElementSelector::tag(name)
}

use self::AttrCondition::{Equals, Excludes, Includes};
use self::Resolution::{AbsoluteOnly, Codebase, DocumentUrl};
use self::SubresourceType as T;
use self::TokenParser::{CommaSeparated, MetaRefresh, Srcset, WhitespaceSeparated};

const LINK_RESOURCE_RELS: &[&str] = &["stylesheet", "icon", "apple-touch-icon"];

/// HTML 4.01, <https://www.w3.org/TR/html401/index/attributes.html>
const HTML40: &[RuleSpec] = &[
    RuleSpec::new("action", &[tag("form")]),
    RuleSpec::new("applet-archive", &[tag("applet")])
        .attribute("archive")
        .parser(CommaSeparated)
        .resolution(Codebase),
    RuleSpec::new("object-archive", &[tag("object")])
        .attribute("archive")
        .parser(WhitespaceSeparated)
        .resolution(Codebase),
    RuleSpec::new("background", &[tag("body")]).subresource(T::Image),
    RuleSpec::new("cite", &[tag("blockquote"), tag("q"), tag("del"), tag("ins")]),
    RuleSpec::new("classid", &[tag("object")]).resolution(Codebase),
    RuleSpec::new("codebase", &[tag("object"), tag("applet")]),
    RuleSpec::new("data", &[tag("object")]).resolution(Codebase),
    RuleSpec::new("href", &[tag("a"), tag("area")]).not_subresource(),
    RuleSpec::new(
        "link-href",
        &[tag("link").with(Excludes("rel", LINK_RESOURCE_RELS))],
    )
    .attribute("href"),
    RuleSpec::new(
        "stylesheet-href",
        &[tag("link").with(Includes("rel", "stylesheet"))],
    )
    .attribute("href")
    .subresource(T::Style),
    RuleSpec::new("base-href", &[tag("base")])
        .attribute("href")
        .resolution(DocumentUrl),
    RuleSpec::new("longdesc", &[tag("img"), tag("frame"), tag("iframe")]),
    RuleSpec::new("profile", &[tag("head")]).parser(WhitespaceSeparated),
    RuleSpec::new("script-src", &[tag("script")])
        .attribute("src")
        .subresource(T::Script),
    RuleSpec::new("image-src", &[tag("img"), tag("input").with(Equals("type", "image"))])
        .attribute("src")
        .subresource(T::Image),
    RuleSpec::new("frame-src", &[tag("frame"), tag("iframe")])
        .attribute("src")
        .subresource(T::Document),
    RuleSpec::new("usemap", &[tag("img"), tag("input"), tag("object")]),
];

/// HTML 5.2, <https://www.w3.org/TR/html52/fullindex.html#attributes-table>
const HTML52: &[RuleSpec] = &[
    RuleSpec::new("action", &[tag("form")]),
    RuleSpec::new("cite", &[tag("blockquote"), tag("del"), tag("ins"), tag("q")]),
    RuleSpec::new("data", &[tag("object")]).subresource(T::Object),
    RuleSpec::new("formaction", &[tag("button"), tag("input")]),
    RuleSpec::new("href", &[tag("a"), tag("area")]),
    RuleSpec::new(
        "link-href",
        &[tag("link").with(Excludes("rel", LINK_RESOURCE_RELS))],
    )
    .attribute("href")
    .not_subresource(),
    RuleSpec::new(
        "stylesheet-href",
        &[tag("link").with(Includes("rel", "stylesheet"))],
    )
    .attribute("href")
    .subresource(T::Style),
    RuleSpec::new(
        "icon-href",
        &[
            tag("link").with(Includes("rel", "icon")),
            tag("link").with(Includes("rel", "apple-touch-icon")),
        ],
    )
    .attribute("href")
    .subresource(T::Image),
    RuleSpec::new("base-href", &[tag("base")])
        .attribute("href")
        .resolution(DocumentUrl),
    RuleSpec::new("manifest", &[tag("html")]).resolution(DocumentUrl),
    RuleSpec::new("poster", &[tag("video")]).subresource(T::Image),
    RuleSpec::new("image-src", &[tag("img")])
        .attribute("src")
        .subresource(T::Image),
    RuleSpec::new("frame-src", &[tag("iframe")])
        .attribute("src")
        .subresource(T::Document),
    RuleSpec::new("embed-src", &[tag("embed")])
        .attribute("src")
        .subresource(T::Embed),
    RuleSpec::new("audio-src", &[tag("audio")])
        .attribute("src")
        .subresource(T::Audio),
    RuleSpec::new("video-src", &[tag("video")])
        .attribute("src")
        .subresource(T::Video),
    RuleSpec::new("source-src", &[tag("source")])
        .attribute("src")
        .subresource(T::Video),
    RuleSpec::new("track-src", &[tag("track")])
        .attribute("src")
        .subresource(T::Track),
    RuleSpec::new("srcset", &[tag("img"), tag("source")])
        .parser(Srcset)
        .subresource(T::Image),
    RuleSpec::new("itemprop", &[ElementSelector::any()])
        .parser(WhitespaceSeparated)
        .resolution(AbsoluteOnly),
    RuleSpec::new("itemtype", &[ElementSelector::any()])
        .parser(WhitespaceSeparated)
        .resolution(AbsoluteOnly),
];

/// WHATWG HTML living standard, <https://html.spec.whatwg.org/multipage/indices.html#attributes-3>
const WHATWG: &[RuleSpec] = &[
    RuleSpec::new("ping", &[tag("a"), tag("area")]).parser(WhitespaceSeparated),
    RuleSpec::new("itemid", &[ElementSelector::any()]),
    RuleSpec::new("imagesrcset", &[tag("link")])
        .parser(Srcset)
        .not_subresource(),
    RuleSpec::new(
        "meta-refresh",
        &[tag("meta").with(Equals("http-equiv", "refresh"))],
    )
    .attribute("content")
    .parser(MetaRefresh)
    .not_subresource(),
];

fn merge_tables(tables: &[&[RuleSpec]]) -> Vec<AttributeRule> {
    let mut merged: Vec<AttributeRule> = Vec::new();

    for entry in tables.iter().flat_map(|table| table.iter()) {
        let position = merged.iter().position(|rule| rule.name == entry.name);
        let rule = match position {
            Some(i) => &mut merged[i],
            None => {
                merged.push(AttributeRule {
                    name: entry.name,
                    attribute: entry.name,
                    elements: vec![],
                    parser: TokenParser::SingleToken,
                    is_subresource: false,
                    subresource_type: None,
                    resolution: Resolution::Base,
                });
                let last = merged.len() - 1;
                &mut merged[last]
            }
        };

        for selector in entry.elements {
            if !rule.elements.contains(selector) {
                rule.elements.push(*selector);
            }
        }
        if let Some(attribute) = entry.attribute {
            rule.attribute = attribute;
        }
        if let Some(parser) = entry.parser {
            rule.parser = parser;
        }
        if let Some(is_subresource) = entry.is_subresource {
            rule.is_subresource = is_subresource;
        }
        if let Some(subresource_type) = entry.subresource_type {
            rule.subresource_type = Some(subresource_type);
        }
        if let Some(resolution) = entry.resolution {
            rule.resolution = resolution;
        }
    }

    merged
}

static ATTRIBUTE_RULES: LazyLock<Vec<AttributeRule>> =
    LazyLock::new(|| merge_tables(&[HTML40, HTML52, WHATWG]));

/// The merged registry, in a stable order.
pub fn attribute_rules() -> &'static [AttributeRule] {
    &ATTRIBUTE_RULES
}

pub fn rule(name: &str) -> Option<&'static AttributeRule> {
    ATTRIBUTE_RULES.iter().find(|rule| rule.name == name)
}
