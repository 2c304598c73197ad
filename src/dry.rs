//! Default resource transform
//!
//! Makes a document static: scripts, event handlers, `javascript:` URLs and automatic
//! navigation go, and links that merely point elsewhere are made absolute so they keep working
//! once the snapshot lives at another address. Running it twice changes nothing the second time.

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use markup5ever_rcdom::Handle;
use tracing::debug;

use crate::core::{FreezeDryError, FreezeDryOptions};
use crate::engine::DryResource;
use crate::links::Anchor;
use crate::parsers::html::dom::{
    get_node_attr, get_node_attr_names, get_node_name, remove_node, set_node_attr, walk_elements,
};
use crate::parsers::js::attr_is_event_handler;
use crate::resource::Resource;

/// Per-element cleanup step.
trait ElementCleaner {
    fn can_handle(&self, element_name: &str) -> bool;
    fn clean(&self, node: &Handle);
}

struct ScriptCleaner;

impl ElementCleaner for ScriptCleaner {
    fn can_handle(&self, element_name: &str) -> bool {
        element_name == "script"
    }

    fn clean(&self, node: &Handle) {
        remove_node(node);
    }
}

struct EventHandlerCleaner;

impl ElementCleaner for EventHandlerCleaner {
    fn can_handle(&self, _element_name: &str) -> bool {
        true
    }

    fn clean(&self, node: &Handle) {
        for attr_name in get_node_attr_names(node) {
            if attr_is_event_handler(&attr_name) {
                set_node_attr(node, &attr_name, None);
            }
        }
    }
}

/// Drops `http-equiv` from `<meta>` elements that would refresh or navigate the page.
struct MetaCleaner;

impl ElementCleaner for MetaCleaner {
    fn can_handle(&self, element_name: &str) -> bool {
        element_name == "meta"
    }

    fn clean(&self, node: &Handle) {
        if let Some(http_equiv) = get_node_attr(node, "http-equiv") {
            if http_equiv.trim().eq_ignore_ascii_case("refresh")
                || http_equiv.trim().eq_ignore_ascii_case("location")
            {
                set_node_attr(node, "http-equiv", None);
            }
        }
    }
}

const CLEANERS: &[&dyn ElementCleaner] = &[&ScriptCleaner, &EventHandlerCleaner, &MetaCleaner];

fn is_javascript_url(target: &str) -> bool {
    target
        .trim_start()
        .get(..11)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("javascript:"))
}

/// Removes interactivity from documents; other resources pass through untouched.
pub struct DefaultDry;

impl DefaultDry {
    fn strip_scripts(resource: &Resource) {
        let Some(document) = resource.doc() else {
            return;
        };

        for element in walk_elements(&document) {
            let Some(name) = get_node_name(&element).map(str::to_string) else {
                continue;
            };
            for cleaner in CLEANERS.iter().filter(|c| c.can_handle(&name)) {
                cleaner.clean(&element);
            }
        }

        resource.invalidate_links();
        let javascript_attributes: Vec<(Handle, &'static str)> = resource
            .links()
            .iter()
            .filter(|link| is_javascript_url(&link.target()))
            .filter_map(|link| match link.from() {
                Anchor::Attribute {
                    element, attribute, ..
                } => Some((element, attribute)),
                _ => None,
            })
            .collect();
        for (element, attribute) in javascript_attributes {
            set_node_attr(&element, attribute, None);
        }
        resource.invalidate_links();
    }

    /// Rewrites links that are not subresources to their absolute form.
    fn make_links_absolute(resource: &Resource) {
        for link in resource.links() {
            if link.is_subresource() {
                continue;
            }

            let target = link.target();
            let trimmed = target.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || is_javascript_url(trimmed) {
                continue;
            }

            match link.absolute_target() {
                Some(absolute) if absolute.as_str() != target => {
                    link.set_target(absolute.as_str());
                }
                Some(_) => {}
                None => debug!(link = %target, "Leaving unresolvable link relative"),
            }
        }
        resource.invalidate_links();
    }
}

impl DryResource for DefaultDry {
    fn dry<'a>(
        &'a self,
        resource: &'a Resource,
        _options: &'a FreezeDryOptions,
    ) -> LocalBoxFuture<'a, Result<(), FreezeDryError>> {
        async move {
            if resource.doc().is_some() {
                Self::strip_scripts(resource);
                Self::make_links_absolute(resource);
            }
            Ok(())
        }
        .boxed_local()
    }
}
