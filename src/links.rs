//! # Links
//!
//! A [`Link`] is one URL occurrence in a document or stylesheet. It does not copy the URL: it
//! holds the synchronized view of the attribute or stylesheet it was found in plus the index of
//! its occurrence there, so reading the target always reflects the current source, and writing
//! it rewrites exactly that occurrence.

use std::cell::RefCell;
use std::fmt;
use std::ops::Range;
use std::rc::Rc;

use markup5ever_rcdom::Handle;

use crate::parsers::css::StylesheetView;
use crate::parsers::html::attributes::{AttributeRule, ResolveContext, SubresourceType};
use crate::parsers::html::dom::get_node_attr;
use crate::parsers::html::links::{AttributeView, DocumentContext};
use crate::resource::Resource;
use crate::utils::url::{resolve_url, Url};

/// Where a stylesheet's text lives.
#[derive(Clone)]
pub enum StyleOwner {
    /// A standalone stylesheet resource
    Sheet,
    /// The `style` attribute of this element
    Attribute(Handle),
    /// The text of this `<style>` element
    Element(Handle),
}

/// What URLs in a stylesheet are resolved against.
#[derive(Clone)]
pub enum LinkBase {
    /// The stylesheet's own URL
    Fixed(Url),
    /// The base URL of the document the stylesheet is embedded in
    Document(Rc<DocumentContext>),
}

impl LinkBase {
    pub fn url(&self) -> Url {
        match self {
            LinkBase::Fixed(url) => url.clone(),
            LinkBase::Document(context) => context.base_url(),
        }
    }
}

pub struct AttributeLink {
    view: Rc<AttributeView>,
    index: usize,
    rule: &'static AttributeRule,
    element: Handle,
    context: Rc<DocumentContext>,
}

pub struct StylesheetLink {
    view: Rc<StylesheetView>,
    index: usize,
    owner: StyleOwner,
    base: LinkBase,
}

pub enum LinkKind {
    Attribute(AttributeLink),
    Stylesheet(StylesheetLink),
}

/// Where a link was found.
#[derive(Clone)]
pub enum Anchor {
    Attribute {
        element: Handle,
        attribute: &'static str,
        range: Range<usize>,
    },
    StyleAttribute {
        element: Handle,
        range: Range<usize>,
    },
    StyleElement {
        element: Handle,
        range: Range<usize>,
    },
    Stylesheet {
        range: Range<usize>,
        at_rule: Option<String>,
        property: Option<String>,
    },
}

impl Anchor {
    /// Byte range of the occurrence within its attribute value or stylesheet text.
    pub fn range(&self) -> Range<usize> {
        match self {
            Anchor::Attribute { range, .. }
            | Anchor::StyleAttribute { range, .. }
            | Anchor::StyleElement { range, .. }
            | Anchor::Stylesheet { range, .. } => range.clone(),
        }
    }
}

pub struct Link {
    kind: LinkKind,
    resource: RefCell<Option<Rc<Resource>>>,
}

impl Link {
    pub fn attribute(
        view: Rc<AttributeView>,
        index: usize,
        rule: &'static AttributeRule,
        element: Handle,
        context: Rc<DocumentContext>,
    ) -> Self {
        Self {
            kind: LinkKind::Attribute(AttributeLink {
                view,
                index,
                rule,
                element,
                context,
            }),
            resource: RefCell::new(None),
        }
    }

    pub fn stylesheet(
        view: Rc<StylesheetView>,
        index: usize,
        owner: StyleOwner,
        base: LinkBase,
    ) -> Self {
        Self {
            kind: LinkKind::Stylesheet(StylesheetLink {
                view,
                index,
                owner,
                base,
            }),
            resource: RefCell::new(None),
        }
    }

    pub fn kind(&self) -> &LinkKind {
        &self.kind
    }

    /// The URL as written in the source. Empty if the occurrence no longer exists.
    pub fn target(&self) -> String {
        match &self.kind {
            LinkKind::Attribute(link) => link
                .view
                .get()
                .tokens
                .get(link.index)
                .map(|t| t.token.clone())
                .unwrap_or_default(),
            LinkKind::Stylesheet(link) => link
                .view
                .get()
                .urls
                .get(link.index)
                .map(|u| u.value.clone())
                .unwrap_or_default(),
        }
    }

    /// Rewrites the occurrence in its source.
    pub fn set_target(&self, target: &str) {
        match &self.kind {
            LinkKind::Attribute(link) => link.view.get_mut().replace(link.index, target),
            LinkKind::Stylesheet(link) => link.view.get_mut().set_url(link.index, target),
        }
    }

    /// The target resolved the way its attribute or stylesheet demands; `None` if it cannot be.
    pub fn absolute_target(&self) -> Option<Url> {
        let target = self.target();
        match &self.kind {
            LinkKind::Attribute(link) => {
                let base_url = link.context.base_url();
                let context = ResolveContext {
                    element: &link.element,
                    document_url: &link.context.url,
                    base_url: &base_url,
                };
                link.rule.make_absolute(&target, &context)
            }
            LinkKind::Stylesheet(link) => resolve_url(&link.base.url(), &target),
        }
    }

    pub fn is_subresource(&self) -> bool {
        match &self.kind {
            LinkKind::Attribute(link) => link.rule.is_subresource,
            LinkKind::Stylesheet(_) => true,
        }
    }

    pub fn subresource_type(&self) -> Option<SubresourceType> {
        match &self.kind {
            LinkKind::Attribute(link) => link.rule.subresource_type,
            LinkKind::Stylesheet(link) => link
                .view
                .get()
                .urls
                .get(link.index)
                .map(|u| u.subresource_type),
        }
    }

    /// Where the link currently sits in its source.
    pub fn from(&self) -> Anchor {
        match &self.kind {
            LinkKind::Attribute(link) => {
                let range = link
                    .view
                    .get()
                    .tokens
                    .get(link.index)
                    .map(|t| t.index..t.end())
                    .unwrap_or_default();
                Anchor::Attribute {
                    element: link.element.clone(),
                    attribute: link.rule.attribute,
                    range,
                }
            }
            LinkKind::Stylesheet(link) => {
                let sheet = link.view.get();
                let url = sheet.urls.get(link.index);
                let range = url.map(|u| u.range.clone()).unwrap_or_default();
                match &link.owner {
                    StyleOwner::Attribute(element) => Anchor::StyleAttribute {
                        element: element.clone(),
                        range,
                    },
                    StyleOwner::Element(element) => Anchor::StyleElement {
                        element: element.clone(),
                        range,
                    },
                    StyleOwner::Sheet => Anchor::Stylesheet {
                        range,
                        at_rule: url.and_then(|u| u.at_rule.clone()),
                        property: url.and_then(|u| u.property.clone()),
                    },
                }
            }
        }
    }

    /// Element the link belongs to, if it lives in a document.
    pub fn element(&self) -> Option<Handle> {
        match &self.kind {
            LinkKind::Attribute(link) => Some(link.element.clone()),
            LinkKind::Stylesheet(link) => match &link.owner {
                StyleOwner::Attribute(element) | StyleOwner::Element(element) => {
                    Some(element.clone())
                }
                StyleOwner::Sheet => None,
            },
        }
    }

    /// Name of the attribute holding the link (`style` for style attributes).
    pub fn attribute_name(&self) -> Option<&'static str> {
        match &self.kind {
            LinkKind::Attribute(link) => Some(link.rule.attribute),
            LinkKind::Stylesheet(link) => match link.owner {
                StyleOwner::Attribute(_) => Some("style"),
                _ => None,
            },
        }
    }

    /// Name of the registry rule that produced the link.
    pub fn rule_name(&self) -> Option<&'static str> {
        match &self.kind {
            LinkKind::Attribute(link) => Some(link.rule.name),
            LinkKind::Stylesheet(_) => None,
        }
    }

    /// The `integrity` metadata guarding this link's target, if any.
    pub fn integrity(&self) -> Option<String> {
        match &self.kind {
            LinkKind::Attribute(link) => get_node_attr(&link.element, "integrity")
                .filter(|value| !value.trim().is_empty()),
            LinkKind::Stylesheet(_) => None,
        }
    }

    pub fn resource(&self) -> Option<Rc<Resource>> {
        self.resource.borrow().clone()
    }

    pub fn set_resource(&self, resource: Rc<Resource>) {
        *self.resource.borrow_mut() = Some(resource);
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Link");
        debug.field("target", &self.target());
        match &self.kind {
            LinkKind::Attribute(link) => debug.field("rule", &link.rule.name),
            LinkKind::Stylesheet(_) => debug.field("rule", &"css"),
        };
        debug
            .field("subresource_type", &self.subresource_type())
            .field("has_resource", &self.resource.borrow().is_some())
            .finish()
    }
}
