//! CSS link extraction
//!
//! Finds every URL a stylesheet (or a `style` attribute) refers to: the target of each
//! `@import`, and every `url(...)` inside declaration values. Each occurrence is recorded
//! together with the exact byte range it occupies, so it can be rewritten in place without
//! re-serializing the rest of the sheet.
//!
//! Malformed CSS never fails: whatever cssparser cannot make sense of simply contains no URLs.
//!
//! ```rust
//! use freeze_dry::parsers::css::{CssKind, CssSheet};
//!
//! let mut sheet = CssSheet::parse("a { background: url(bg.png) }", CssKind::Stylesheet);
//! assert_eq!(sheet.urls[0].value, "bg.png");
//!
//! sheet.set_url(0, "data:image/png;base64,AAAA");
//! assert_eq!(sheet.text, r#"a { background: url("data:image/png;base64,AAAA") }"#);
//! ```

use std::cell::RefCell;
use std::ops::Range;
use std::rc::Rc;

use cssparser::{serialize_string, ParseError, Parser, ParserInput, Token};
use markup5ever_rcdom::Handle;

use crate::parsers::html::attributes::SubresourceType;
use crate::parsers::html::dom::{get_node_attr, get_text_content, set_node_attr, set_text_content};
use crate::sync::{Backing, Codec, SyncedView};

/// Whether the text is a whole stylesheet or the body of a `style` attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CssKind {
    Stylesheet,
    DeclarationList,
}

/// How a URL is written, which decides how a replacement is written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UrlSyntax {
    /// `url(...)`, quoted or not
    Function,
    /// A bare string, as in `@import "a.css"`
    String,
}

/// One URL occurrence in a stylesheet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CssUrl {
    /// Byte range of the whole occurrence, `url(` and `)` included.
    pub range: Range<usize>,
    /// The URL itself, with CSS escapes resolved.
    pub value: String,
    pub syntax: UrlSyntax,
    pub subresource_type: SubresourceType,
    /// At-rule the occurrence belongs to (`import`, `font-face`, ...).
    pub at_rule: Option<String>,
    /// Property of the declaration the occurrence is part of.
    pub property: Option<String>,
}

/// A stylesheet's text plus the URLs found in it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CssSheet {
    pub text: String,
    pub kind: CssKind,
    pub urls: Vec<CssUrl>,
}

impl CssSheet {
    pub fn parse(text: &str, kind: CssKind) -> Self {
        let mut input = ParserInput::new(text);
        let mut parser = Parser::new(&mut input);
        let mut urls = Vec::new();
        scan_block(&mut parser, kind, None, None, &mut urls);

        Self {
            text: text.to_string(),
            kind,
            urls,
        }
    }

    /// Rewrites the `index`th URL, shifting the ranges of every URL after it.
    pub fn set_url(&mut self, index: usize, new_value: &str) {
        let Some(url) = self.urls.get(index) else {
            return;
        };

        let replacement = match url.syntax {
            UrlSyntax::Function => format!("url({})", format_quoted_string(new_value)),
            UrlSyntax::String => format_quoted_string(new_value),
        };
        let old_range = url.range.clone();
        self.text.replace_range(old_range.clone(), &replacement);

        let new_end = old_range.start + replacement.len();
        for later in self.urls.iter_mut().skip(index + 1) {
            if later.range.start >= old_range.end {
                later.range = (later.range.start - old_range.end + new_end)
                    ..(later.range.end - old_range.end + new_end);
            }
        }

        let url = &mut self.urls[index];
        url.range = old_range.start..new_end;
        url.value = new_value.to_string();
    }
}

pub fn format_quoted_string(string: &str) -> String {
    let mut res: String = "".to_string();
    let _ = serialize_string(string, &mut res);
    res
}

/// Walks one block (or the whole sheet), recording URLs and descending into nested blocks.
fn scan_block<'i>(
    parser: &mut Parser<'i, '_>,
    kind: CssKind,
    block_at_rule: Option<&str>,
    inherited_property: Option<&str>,
    urls: &mut Vec<CssUrl>,
) {
    let mut prelude_at_rule: Option<String> = None;
    let mut import_url_seen = false;
    let mut pending_ident: Option<String> = None;
    let mut property: Option<String> = inherited_property.map(str::to_string);

    loop {
        let start = parser.position().byte_index();
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };

        let found: Option<(String, UrlSyntax)> = match token {
            Token::AtKeyword(ref name) => {
                prelude_at_rule = Some(name.to_ascii_lowercase());
                pending_ident = None;
                property = None;
                None
            }
            Token::Ident(ref name) => {
                pending_ident = Some(name.to_string());
                None
            }
            Token::Colon => {
                if prelude_at_rule.is_none() {
                    if let Some(ident) = pending_ident.take() {
                        property = Some(ident.to_ascii_lowercase());
                    }
                }
                None
            }
            Token::Semicolon => {
                prelude_at_rule = None;
                import_url_seen = false;
                pending_ident = None;
                property = None;
                None
            }
            Token::UnquotedUrl(ref value) => Some((value.to_string(), UrlSyntax::Function)),
            Token::Function(ref name) if name.eq_ignore_ascii_case("url") => {
                let quoted = parser
                    .parse_nested_block(|nested| {
                        let mut found: Option<String> = None;
                        while let Ok(token) = nested.next() {
                            if let Token::QuotedString(value) = token {
                                found.get_or_insert_with(|| value.to_string());
                            }
                        }
                        Ok::<_, ParseError<'i, ()>>(found)
                    })
                    .ok()
                    .flatten();
                quoted.map(|value| (value, UrlSyntax::Function))
            }
            Token::QuotedString(ref value)
                if kind == CssKind::Stylesheet
                    && prelude_at_rule.as_deref() == Some("import")
                    && !import_url_seen =>
            {
                Some((value.to_string(), UrlSyntax::String))
            }
            Token::Function(_) | Token::ParenthesisBlock | Token::SquareBracketBlock => {
                let at_rule = prelude_at_rule.clone().or(block_at_rule.map(str::to_string));
                let _ = parser.parse_nested_block(|nested| {
                    scan_block(nested, kind, at_rule.as_deref(), property.as_deref(), urls);
                    Ok::<_, ParseError<'i, ()>>(())
                });
                None
            }
            Token::CurlyBracketBlock => {
                let at_rule = prelude_at_rule.take();
                let _ = parser.parse_nested_block(|nested| {
                    scan_block(nested, kind, at_rule.as_deref(), None, urls);
                    Ok::<_, ParseError<'i, ()>>(())
                });
                import_url_seen = false;
                pending_ident = None;
                property = None;
                None
            }
            _ => None,
        };

        let Some((value, syntax)) = found else {
            continue;
        };
        let end = parser.position().byte_index();

        let subresource_type = match prelude_at_rule.as_deref() {
            // not allowed in a declaration list, so not loaded either
            Some("import") if kind == CssKind::DeclarationList => continue,
            Some("import") => {
                if import_url_seen {
                    continue;
                }
                import_url_seen = true;
                SubresourceType::Style
            }
            Some("namespace") => continue,
            _ if block_at_rule == Some("font-face") && property.as_deref() == Some("src") => {
                SubresourceType::Font
            }
            _ => SubresourceType::Image,
        };
        urls.push(CssUrl {
            range: start..end,
            value,
            syntax,
            subresource_type,
            at_rule: prelude_at_rule
                .clone()
                .or(block_at_rule.map(str::to_string)),
            property: property.clone(),
        });
    }
}

/// Where the text of a stylesheet lives.
#[derive(Clone)]
pub enum StyleBacking {
    /// The `style` attribute of an element
    Attribute(Handle),
    /// The text content of a `<style>` element
    ElementText(Handle),
    /// A standalone stylesheet
    Text(Rc<RefCell<String>>),
}

impl Backing for StyleBacking {
    type Value = String;

    fn read(&self) -> String {
        match self {
            StyleBacking::Attribute(element) => get_node_attr(element, "style").unwrap_or_default(),
            StyleBacking::ElementText(element) => get_text_content(element),
            StyleBacking::Text(text) => text.borrow().clone(),
        }
    }

    fn write(&self, value: &String) {
        match self {
            StyleBacking::Attribute(element) => {
                set_node_attr(element, "style", Some(value.clone()))
            }
            StyleBacking::ElementText(element) => set_text_content(element, value),
            StyleBacking::Text(text) => *text.borrow_mut() = value.clone(),
        }
    }
}

pub struct CssCodec {
    pub kind: CssKind,
}

impl Codec for CssCodec {
    type Raw = String;
    type Parsed = CssSheet;

    fn parse(&self, raw: &String) -> CssSheet {
        CssSheet::parse(raw, self.kind)
    }

    fn serialize(&self, parsed: &CssSheet) -> String {
        parsed.text.clone()
    }
}

pub type StylesheetView = SyncedView<StyleBacking, CssCodec>;

pub fn stylesheet_view(backing: StyleBacking, kind: CssKind) -> StylesheetView {
    SyncedView::new(backing, CssCodec { kind })
}
