use std::cell::RefCell;
use std::rc::Rc;

use encoding_rs::Encoding;
use html5ever::interface::{Attribute, QualName};
use html5ever::parse_document;
use html5ever::serialize::{serialize, SerializeOpts};
use html5ever::tendril::{format_tendril, StrTendril, TendrilSink};
use html5ever::{namespace_url, ns, LocalName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};

/// Decodes `data` with `document_encoding` (UTF-8 when the label is unknown) and parses it.
pub fn html_to_dom(data: &[u8], document_encoding: &str) -> RcDom {
    let s = match Encoding::for_label(document_encoding.as_bytes()) {
        Some(encoding) => encoding.decode(data).0.into_owned(),
        None => String::from_utf8_lossy(data).into_owned(),
    };

    parse_html(&s)
}

pub fn parse_html(html: &str) -> RcDom {
    parse_document(RcDom::default(), Default::default()).one(html)
}

/// Serializes a whole document (or any subtree) back into markup.
pub fn serialize_node(handle: &Handle) -> Result<String, std::io::Error> {
    let mut buf: Vec<u8> = Vec::new();
    serialize(
        &mut buf,
        &SerializableHandle::from(handle.clone()),
        SerializeOpts::default(),
    )?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Finds nodes along a path of element names (`["html", "head", "meta"]`).
pub fn find_nodes(node: &Handle, node_names: &[&str]) -> Vec<Handle> {
    let Some((&node_name, rest)) = node_names.split_first() else {
        return vec![];
    };

    let mut found_nodes = Vec::new();
    let name_matches = get_node_name(node) == Some(node_name);

    if name_matches && rest.is_empty() {
        found_nodes.push(node.clone());
    }
    if name_matches && !rest.is_empty() {
        for child_node in node.children.borrow().iter() {
            found_nodes.append(&mut find_nodes(child_node, rest));
        }
    } else {
        for child_node in node.children.borrow().iter() {
            found_nodes.append(&mut find_nodes(child_node, node_names));
        }
    }

    found_nodes
}

/// All elements below `node`, in document order.
pub fn walk_elements(node: &Handle) -> Vec<Handle> {
    let mut elements = Vec::new();
    let mut stack: Vec<Handle> = vec![node.clone()];

    while let Some(current) = stack.pop() {
        if let NodeData::Element { .. } = current.data {
            elements.push(current.clone());
        }
        for child_node in current.children.borrow().iter().rev() {
            stack.push(child_node.clone());
        }
    }

    elements
}

pub fn get_child_node_by_name(parent: &Handle, node_name: &str) -> Option<Handle> {
    parent
        .children
        .borrow()
        .iter()
        .find(|child| get_node_name(child) == Some(node_name))
        .cloned()
}

pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == attr_name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

/// Names of all attributes of an element, in source order.
pub fn get_node_attr_names(node: &Handle) -> Vec<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .map(|attr| attr.name.local.to_string())
            .collect(),
        _ => vec![],
    }
}

pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

pub fn get_parent_node(child: &Handle) -> Option<Handle> {
    let weak = child.parent.take();
    let parent = weak.as_ref().and_then(|node| node.upgrade());
    child.parent.set(weak);
    parent
}

/// Sets, adds or (with `None`) removes an attribute.
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<String>) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let attrs_mut = &mut attrs.borrow_mut();
        let position = attrs_mut
            .iter()
            .position(|attr| &*attr.name.local == attr_name);

        match (position, attr_value) {
            (Some(i), Some(attr_value)) => {
                attrs_mut[i].value = StrTendril::from(attr_value);
            }
            (Some(i), None) => {
                attrs_mut.remove(i);
            }
            (None, Some(attr_value)) => attrs_mut.push(Attribute {
                name: QualName::new(None, ns!(), LocalName::from(attr_name)),
                value: format_tendril!("{}", attr_value),
            }),
            (None, None) => {}
        }
    };
}

/// Detaches `node` from its parent.
pub fn remove_node(node: &Handle) {
    if let Some(parent) = get_parent_node(node) {
        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, node));
    }
    node.parent.set(None);
}

/// Inserts `node` as the first child of `parent`.
pub fn prepend_child(parent: &Handle, node: Handle) {
    remove_node(&node);
    node.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().insert(0, node);
}

/// Concatenated text of the direct text children (what a `<style>` element holds).
pub fn get_text_content(node: &Handle) -> String {
    node.children
        .borrow()
        .iter()
        .filter_map(|child| match &child.data {
            NodeData::Text { contents } => Some(contents.borrow().to_string()),
            _ => None,
        })
        .collect()
}

/// Replaces all children with one text node.
pub fn set_text_content(node: &Handle, text: &str) {
    let text_node = Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from(text)),
    });
    text_node.parent.set(Some(Rc::downgrade(node)));

    for child in node.children.borrow().iter() {
        child.parent.set(None);
    }
    *node.children.borrow_mut() = vec![text_node];
}
