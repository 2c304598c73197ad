//! Document link extraction
//!
//! Produces every link of a document: first the URL-valued attributes the registry knows about
//! (rule by rule, elements in document order), then the URLs inside `style` attributes, then
//! those inside `<style>` elements.

use std::collections::HashSet;
use std::rc::Rc;

use markup5ever_rcdom::{Handle, Node};

use crate::links::{Link, LinkBase, StyleOwner};
use crate::parsers::css::{stylesheet_view, CssKind, StyleBacking, StylesheetView};
use crate::sync::{Backing, Codec, SyncedView};
use crate::utils::url::{resolve_url, Url};

use super::attributes::{attribute_rules, TokenParser};
use super::dom::{find_nodes, get_node_attr, get_node_name, set_node_attr, walk_elements};
use super::parser::TokenPointer;

/// A document together with the URL its relative links resolve against.
pub struct DocumentContext {
    pub document: Handle,
    pub url: Url,
}

impl DocumentContext {
    pub fn new(document: Handle, url: Url) -> Self {
        Self { document, url }
    }

    /// The document's base URL: the first `<base href>` (resolved against the document URL), or
    /// the document URL itself. Read live, so edits to `<base>` are picked up.
    pub fn base_url(&self) -> Url {
        find_nodes(&self.document, &["base"])
            .iter()
            .find_map(|base| get_node_attr(base, "href"))
            .and_then(|href| resolve_url(&self.url, &href))
            .unwrap_or_else(|| self.url.clone())
    }
}

/// One attribute of one element.
pub struct AttributeBacking {
    pub element: Handle,
    pub attribute: &'static str,
}

impl Backing for AttributeBacking {
    type Value = String;

    fn read(&self) -> String {
        get_node_attr(&self.element, self.attribute).unwrap_or_default()
    }

    fn write(&self, value: &String) {
        set_node_attr(&self.element, self.attribute, Some(value.clone()));
    }
}

/// An attribute value split into URL tokens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenList {
    pub value: String,
    pub tokens: Vec<TokenPointer>,
}

impl TokenList {
    /// Replaces the `index`th token, shifting the offsets of the tokens after it.
    pub fn replace(&mut self, index: usize, new_token: &str) {
        let Some(old) = self.tokens.get(index).cloned() else {
            return;
        };

        self.value.replace_range(old.index..old.end(), new_token);
        let delta = new_token.len() as isize - old.token.len() as isize;
        for later in self.tokens.iter_mut().skip(index + 1) {
            later.index = (later.index as isize + delta) as usize;
        }
        self.tokens[index].token = new_token.to_string();
    }
}

pub struct TokenCodec {
    pub parser: TokenParser,
}

impl Codec for TokenCodec {
    type Raw = String;
    type Parsed = TokenList;

    fn parse(&self, raw: &String) -> TokenList {
        TokenList {
            value: raw.clone(),
            tokens: self.parser.parse(raw),
        }
    }

    fn serialize(&self, parsed: &TokenList) -> String {
        parsed.value.clone()
    }
}

pub type AttributeView = SyncedView<AttributeBacking, TokenCodec>;

/// All links of the document `context` describes.
pub fn extract_links_from_dom(context: &Rc<DocumentContext>) -> Vec<Rc<Link>> {
    let elements = walk_elements(&context.document);
    let mut links: Vec<Rc<Link>> = Vec::new();
    let mut seen: HashSet<(*const Node, &'static str)> = HashSet::new();

    for rule in attribute_rules() {
        for element in elements.iter().filter(|element| rule.applies_to(element)) {
            if !seen.insert((Rc::as_ptr(element), rule.attribute)) {
                continue;
            }

            let view = Rc::new(SyncedView::new(
                AttributeBacking {
                    element: element.clone(),
                    attribute: rule.attribute,
                },
                TokenCodec {
                    parser: rule.parser,
                },
            ));
            let count = view.get().tokens.len();
            links.extend((0..count).map(|index| {
                Rc::new(Link::attribute(
                    view.clone(),
                    index,
                    rule,
                    element.clone(),
                    context.clone(),
                ))
            }));
        }
    }

    for element in elements
        .iter()
        .filter(|element| get_node_attr(element, "style").is_some())
    {
        let view = Rc::new(stylesheet_view(
            StyleBacking::Attribute(element.clone()),
            CssKind::DeclarationList,
        ));
        links.extend(stylesheet_links(
            &view,
            StyleOwner::Attribute(element.clone()),
            LinkBase::Document(context.clone()),
        ));
    }

    for element in elements
        .iter()
        .filter(|element| get_node_name(element) == Some("style"))
    {
        let view = Rc::new(stylesheet_view(
            StyleBacking::ElementText(element.clone()),
            CssKind::Stylesheet,
        ));
        links.extend(stylesheet_links(
            &view,
            StyleOwner::Element(element.clone()),
            LinkBase::Document(context.clone()),
        ));
    }

    links
}

/// One link per URL currently found in the stylesheet behind `view`.
pub fn stylesheet_links(
    view: &Rc<StylesheetView>,
    owner: StyleOwner,
    base: LinkBase,
) -> Vec<Rc<Link>> {
    let count = view.get().urls.len();
    (0..count)
        .map(|index| {
            Rc::new(Link::stylesheet(
                view.clone(),
                index,
                owner.clone(),
                base.clone(),
            ))
        })
        .collect()
}
