//! Render: build live nodes from virtual nodes
//!
//! Also the reverse direction: [`virtualize`] reads an existing live
//! subtree back into a snapshot so a mount can adopt it.
//!
//! Author: Moroya Sakamoto

use crate::diff::FactsDiff;
use crate::events::EventRootId;
use crate::live::{LiveId, LiveKind, LiveNode, LiveTree};
use crate::vnode::{Fact, Facts, VNode, VNodeKind};

/// Build a fresh live subtree for `vnode`. The result is detached.
///
/// `event_root` is the mapper chain listeners created here will route
/// through. Each tagger opens a new root whose parent is the current one.
pub fn render(tree: &mut LiveTree, vnode: &VNode, event_root: Option<EventRootId>) -> LiveId {
    match vnode.kind() {
        VNodeKind::Thunk(thunk) => render(tree, &thunk.force(), event_root),

        VNodeKind::Text(text) => tree.create_text(text),

        VNodeKind::Tagger(_) => {
            let (mappers, inner) = vnode.untag();
            let root = tree.events_mut().insert(mappers, event_root);
            let id = render(tree, inner, Some(root));
            // inner taggers behind a lazy node rendered their roots first
            if let Some(node) = tree.get_mut(id) {
                node.tagger_roots.insert(0, root);
            }
            id
        }

        VNodeKind::Custom(custom) => {
            let id = custom.render.call(&*custom.model, tree);
            if let Some(node) = tree.get_mut(id) {
                apply_facts(node, &custom.facts, event_root);
            }
            id
        }

        VNodeKind::Element(el) => {
            let id = create_element(tree, &el.tag, el.namespace.as_deref(), &el.facts, event_root);
            render_children(tree, id, vnode, event_root);
            id
        }

        VNodeKind::KeyedElement(el) => {
            let id = create_element(tree, &el.tag, el.namespace.as_deref(), &el.facts, event_root);
            render_children(tree, id, vnode, event_root);
            id
        }
    }
}

fn create_element(
    tree: &mut LiveTree,
    tag: &str,
    namespace: Option<&str>,
    facts: &Facts,
    event_root: Option<EventRootId>,
) -> LiveId {
    let id = tree.create_element(tag, namespace);
    if let Some(node) = tree.get_mut(id) {
        apply_facts(node, facts, event_root);
    }
    id
}

fn render_children(tree: &mut LiveTree, parent: LiveId, vnode: &VNode, event_root: Option<EventRootId>) {
    for child in vnode.child_nodes() {
        let child_id = render(tree, child, event_root);
        tree.link(parent, child_id, None);
    }
}

/// Install a full fact set on a node.
pub fn apply_facts(node: &mut LiveNode, facts: &Facts, event_root: Option<EventRootId>) {
    for (key, value) in &facts.styles {
        node.set_style(key, value);
    }
    for (name, handler) in &facts.events {
        node.set_listener(name, handler.clone(), event_root);
    }
    for (key, value) in &facts.properties {
        node.set_property(key, value.clone());
    }
    for (key, value) in &facts.attributes {
        node.set_attribute(key, value);
    }
    for (key, value) in &facts.ns_attributes {
        node.set_attribute_ns(&value.namespace, key, &value.value);
    }
}

/// Apply a facts delta. Listeners that already exist swap their handler
/// in place and keep their event root.
pub fn apply_facts_diff(node: &mut LiveNode, diff: &FactsDiff, event_root: Option<EventRootId>) {
    for (key, value) in &diff.styles {
        node.set_style(key, value);
    }
    for (name, handler) in &diff.events {
        match handler {
            Some(handler) => node.set_listener(name, handler.clone(), event_root),
            None => node.remove_listener(name),
        }
    }
    for (key, value) in &diff.properties {
        node.set_property(key, value.clone());
    }
    for (key, value) in &diff.attributes {
        match value {
            Some(value) => node.set_attribute(key, value),
            None => node.remove_attribute(key),
        }
    }
    for (key, change) in &diff.ns_attributes {
        match &change.value {
            Some(value) => node.set_attribute_ns(&change.namespace, key, value),
            None => node.remove_attribute_ns(key),
        }
    }
}

/// Read a live subtree back into a snapshot.
///
/// Only text and attributes survive: styles, properties and listeners are
/// not recoverable as facts, so the first diff against the real view
/// re-installs them. Fragments yield `None`.
pub fn virtualize(tree: &LiveTree, id: LiveId) -> Option<VNode> {
    let node = tree.get(id)?;
    match &node.kind {
        LiveKind::Text(text) => Some(VNode::text(text.clone())),
        LiveKind::Element { tag, namespace } => {
            let mut facts: Vec<Fact> = node
                .attributes
                .iter()
                .map(|(key, value)| Fact::Attribute {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect();
            facts.extend(node.ns_attributes.iter().map(|(key, value)| Fact::AttributeNs {
                namespace: value.namespace.clone(),
                key: key.clone(),
                value: value.value.clone(),
            }));
            let children = node
                .children
                .iter()
                .filter_map(|&child| virtualize(tree, child))
                .collect();
            Some(VNode::element_ns(namespace.as_deref(), tag, facts, children))
        }
        LiveKind::Fragment => None,
    }
}
