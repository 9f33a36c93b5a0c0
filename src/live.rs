//! Live Tree: the mutable host tree patches are applied to
//!
//! Flat arena of nodes addressed by `LiveId`, with O(1) lookup through a
//! HashMap. Every structural primitive the patcher needs (create, append,
//! insert at position, detach, replace, remove) lives here, along with the
//! per-node fact setters, event dispatch and structural hashing.
//!
//! Author: Moroya Sakamoto

use std::any::Any;
use std::collections::HashMap;

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::error::{PatchError, Result};
use crate::events::{EventRootId, EventRoots};
use crate::vnode::{Handler, Message, NsValue, PropValue};

/// Unique live node identifier
pub type LiveId = u32;

/// What a live node is
#[derive(Debug, Clone, PartialEq)]
pub enum LiveKind {
    /// Text content
    Text(String),
    /// Element with optional namespace
    Element {
        tag: String,
        namespace: Option<String>,
    },
    /// Temporary container; appending it moves its children instead
    Fragment,
}

/// Installed event listener
#[derive(Debug, Clone)]
pub struct Listener {
    pub handler: Handler,
    /// Mapper chain messages from this listener pass through
    pub event_root: Option<EventRootId>,
}

/// Live node
#[derive(Debug, Clone)]
pub struct LiveNode {
    pub id: LiveId,
    pub kind: LiveKind,
    pub styles: IndexMap<String, String>,
    pub properties: IndexMap<String, PropValue>,
    pub attributes: IndexMap<String, String>,
    pub ns_attributes: IndexMap<String, NsValue>,
    pub listeners: IndexMap<String, Listener>,
    pub children: Vec<LiveId>,
    pub parent: Option<LiveId>,
    /// Event roots of the taggers rendered at this node, outermost first.
    /// More than one when lazy nodes separate taggers that wrap the same
    /// live node.
    pub tagger_roots: SmallVec<[EventRootId; 1]>,
}

impl LiveNode {
    fn new(id: LiveId, kind: LiveKind) -> Self {
        Self {
            id,
            kind,
            styles: IndexMap::new(),
            properties: IndexMap::new(),
            attributes: IndexMap::new(),
            ns_attributes: IndexMap::new(),
            listeners: IndexMap::new(),
            children: Vec::new(),
            parent: None,
            tagger_roots: SmallVec::new(),
        }
    }

    /// Set an inline style; an empty value removes it.
    pub fn set_style(&mut self, key: &str, value: &str) {
        if value.is_empty() {
            self.styles.shift_remove(key);
        } else {
            self.styles.insert(String::from(key), String::from(value));
        }
    }

    /// Set a property; clearing values (null, empty text) unset it.
    pub fn set_property(&mut self, key: &str, value: PropValue) {
        if value.is_clearing() {
            self.properties.shift_remove(key);
        } else {
            self.properties.insert(String::from(key), value);
        }
    }

    pub fn set_attribute(&mut self, key: &str, value: &str) {
        self.attributes.insert(String::from(key), String::from(value));
    }

    pub fn remove_attribute(&mut self, key: &str) {
        self.attributes.shift_remove(key);
    }

    pub fn set_attribute_ns(&mut self, namespace: &str, key: &str, value: &str) {
        self.ns_attributes.insert(
            String::from(key),
            NsValue {
                namespace: String::from(namespace),
                value: String::from(value),
            },
        );
    }

    pub fn remove_attribute_ns(&mut self, key: &str) {
        self.ns_attributes.shift_remove(key);
    }

    /// Install a listener, or swap the handler of an existing one in place.
    ///
    /// An existing listener keeps its event root; only the handler changes.
    pub fn set_listener(&mut self, name: &str, handler: Handler, event_root: Option<EventRootId>) {
        match self.listeners.get_mut(name) {
            Some(listener) => listener.handler = handler,
            None => {
                self.listeners.insert(
                    String::from(name),
                    Listener {
                        handler,
                        event_root,
                    },
                );
            }
        }
    }

    pub fn remove_listener(&mut self, name: &str) {
        self.listeners.shift_remove(name);
    }

    /// Text content, if this is a text node.
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            LiveKind::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Tag name, if this is an element.
    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            LiveKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }
}

/// Live tree: flat storage with O(1) ID lookup and a side table of
/// event roots.
#[derive(Debug)]
pub struct LiveTree {
    nodes: HashMap<LiveId, LiveNode>,
    next_id: LiveId,
    events: EventRoots,
}

impl Default for LiveTree {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveTree {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            next_id: 0,
            events: EventRoots::new(),
        }
    }

    fn alloc(&mut self, kind: LiveKind) -> LiveId {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(id, LiveNode::new(id, kind));
        id
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: &str) -> LiveId {
        self.alloc(LiveKind::Text(String::from(text)))
    }

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str, namespace: Option<&str>) -> LiveId {
        self.alloc(LiveKind::Element {
            tag: String::from(tag),
            namespace: namespace.map(String::from),
        })
    }

    /// Create a detached fragment
    pub fn create_fragment(&mut self) -> LiveId {
        self.alloc(LiveKind::Fragment)
    }

    /// Get node by ID
    pub fn get(&self, id: LiveId) -> Option<&LiveNode> {
        self.nodes.get(&id)
    }

    /// Get mutable node by ID
    pub fn get_mut(&mut self, id: LiveId) -> Option<&mut LiveNode> {
        self.nodes.get_mut(&id)
    }

    /// Like `get`, but a missing node is an error
    pub fn node(&self, id: LiveId) -> Result<&LiveNode> {
        self.nodes.get(&id).ok_or(PatchError::MissingNode(id))
    }

    /// Like `get_mut`, but a missing node is an error
    pub fn node_mut(&mut self, id: LiveId) -> Result<&mut LiveNode> {
        self.nodes.get_mut(&id).ok_or(PatchError::MissingNode(id))
    }

    /// Children of a node; empty for unknown ids.
    pub fn children(&self, id: LiveId) -> &[LiveId] {
        self.nodes
            .get(&id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent_of(&self, id: LiveId) -> Option<LiveId> {
        self.nodes.get(&id).and_then(|node| node.parent)
    }

    /// Total node count, detached nodes included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All live nodes, in no particular order
    pub fn nodes(&self) -> impl Iterator<Item = &LiveNode> {
        self.nodes.values()
    }

    pub fn events(&self) -> &EventRoots {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventRoots {
        &mut self.events
    }

    /// Append `child` as the last child of `parent`.
    ///
    /// A fragment is dissolved: its children move over in order and the
    /// fragment itself is freed.
    pub fn append_child(&mut self, parent: LiveId, child: LiveId) -> Result<()> {
        self.node(parent)?;
        if self.node(child)?.kind == LiveKind::Fragment {
            let moved = std::mem::take(&mut self.node_mut(child)?.children);
            for &grandchild in &moved {
                self.link(parent, grandchild, None);
            }
            self.detach(child)?;
            self.nodes.remove(&child);
            return Ok(());
        }
        self.detach(child)?;
        self.link(parent, child, None);
        Ok(())
    }

    /// Insert `child` before whatever currently sits at `position` in
    /// `parent`, or append when `position` is past the end.
    pub fn insert_child(&mut self, parent: LiveId, child: LiveId, position: usize) -> Result<()> {
        let reference = self.node(parent)?.children.get(position).copied();
        if reference == Some(child) {
            return Ok(());
        }
        self.detach(child)?;
        let at = reference.and_then(|r| self.children(parent).iter().position(|&c| c == r));
        self.link(parent, child, at);
        Ok(())
    }

    /// Attach a parentless node. Missing ids are ignored; callers that
    /// cannot guarantee existence go through `append_child`.
    pub(crate) fn link(&mut self, parent: LiveId, child: LiveId, at: Option<usize>) {
        if let Some(node) = self.nodes.get_mut(&parent) {
            match at {
                Some(at) => node.children.insert(at, child),
                None => node.children.push(child),
            }
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
    }

    /// Unlink a node from its parent. The node stays in the arena.
    pub fn detach(&mut self, id: LiveId) -> Result<()> {
        let Some(parent) = self.node_mut(id)?.parent.take() else {
            return Ok(());
        };
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.retain(|&c| c != id);
        }
        Ok(())
    }

    /// Put `new` where `old` sits in its parent. `old` ends up detached.
    pub fn replace(&mut self, old: LiveId, new: LiveId) -> Result<()> {
        if old == new {
            return Ok(());
        }
        self.detach(new)?;
        let Some(parent) = self.node_mut(old)?.parent.take() else {
            return Ok(());
        };
        if let Some(node) = self.nodes.get_mut(&parent) {
            for slot in node.children.iter_mut().filter(|c| **c == old) {
                *slot = new;
            }
        }
        self.node_mut(new)?.parent = Some(parent);
        Ok(())
    }

    /// Detach a node and free it together with all its descendants.
    pub fn remove_subtree(&mut self, id: LiveId) -> Result<()> {
        self.detach(id)?;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children);
            }
        }
        Ok(())
    }

    /// Replace the content of a text node.
    pub fn set_text(&mut self, id: LiveId, text: &str) -> Result<()> {
        let node = self.node_mut(id)?;
        node.kind = LiveKind::Text(String::from(text));
        Ok(())
    }

    /// Fire `event` at `target` and bubble it to the root.
    ///
    /// Every listener on the path may produce a message; each message is
    /// routed through the mapper chain of the listener's event root, innermost
    /// mapper first.
    pub fn dispatch(&self, target: LiveId, event: &str, payload: &dyn Any) -> Vec<Message> {
        let mut messages = Vec::new();
        let mut current = Some(target);
        while let Some(id) = current {
            let Some(node) = self.nodes.get(&id) else {
                break;
            };
            if let Some(listener) = node.listeners.get(event) {
                if let Some(message) = listener.handler.call(payload) {
                    messages.push(self.events.route(listener.event_root, message));
                }
            }
            current = node.parent;
        }
        messages
    }

    /// Structural hash of a subtree (FNV-1a).
    ///
    /// Covers kinds, text, tags, namespaces, all facts and listener names.
    /// Ids, handlers and event roots are excluded, and fact order does not
    /// matter, so a patched tree hashes equal to a fresh render of the same
    /// snapshot.
    pub fn subtree_hash(&self, id: LiveId) -> u64 {
        let mut h = Fnv::new();
        self.hash_node(id, &mut h);
        h.finish()
    }

    fn hash_node(&self, id: LiveId, h: &mut Fnv) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        match &node.kind {
            LiveKind::Text(text) => {
                h.write(&[0]);
                h.write(text.as_bytes());
            }
            LiveKind::Element { tag, namespace } => {
                h.write(&[1]);
                h.write(tag.as_bytes());
                if let Some(ns) = namespace {
                    h.write(ns.as_bytes());
                }
            }
            LiveKind::Fragment => h.write(&[2]),
        }
        for (key, value) in sorted(&node.styles) {
            h.write(key.as_bytes());
            h.write(value.as_bytes());
        }
        h.write(&[3]);
        for (key, value) in sorted(&node.properties) {
            h.write(key.as_bytes());
            h.write(format!("{value:?}").as_bytes());
        }
        h.write(&[4]);
        for (key, value) in sorted(&node.attributes) {
            h.write(key.as_bytes());
            h.write(value.as_bytes());
        }
        h.write(&[5]);
        for (key, value) in sorted(&node.ns_attributes) {
            h.write(value.namespace.as_bytes());
            h.write(key.as_bytes());
            h.write(value.value.as_bytes());
        }
        h.write(&[6]);
        for (name, _) in sorted(&node.listeners) {
            h.write(name.as_bytes());
        }
        h.write(&[7]);
        for &child in &node.children {
            self.hash_node(child, h);
        }
        h.write(&[8]);
    }

    /// Serialize a subtree as markup, for debugging and tests.
    pub fn to_html(&self, id: LiveId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    fn write_html(&self, id: LiveId, out: &mut String) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let tag = match &node.kind {
            LiveKind::Text(text) => {
                escape_into(text, out);
                return;
            }
            LiveKind::Fragment => None,
            LiveKind::Element { tag, .. } => Some(tag.as_str()),
        };
        if let Some(tag) = tag {
            out.push('<');
            out.push_str(tag);
            for (key, value) in &node.attributes {
                push_attr(out, key, value);
            }
            for (key, value) in &node.ns_attributes {
                push_attr(out, key, &value.value);
            }
            if !node.styles.is_empty() {
                let css: String = node
                    .styles
                    .iter()
                    .map(|(k, v)| format!("{k}: {v};"))
                    .collect::<Vec<_>>()
                    .join(" ");
                push_attr(out, "style", &css);
            }
            out.push('>');
        }
        for &child in &node.children {
            self.write_html(child, out);
        }
        if let Some(tag) = tag {
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

fn sorted<V>(map: &IndexMap<String, V>) -> Vec<(&String, &V)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

fn push_attr(out: &mut String, key: &str, value: &str) {
    out.push(' ');
    out.push_str(key);
    out.push_str("=\"");
    escape_into(value, out);
    out.push('"');
}

fn escape_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

struct Fnv(u64);

impl Fnv {
    fn new() -> Self {
        Self(0xcbf29ce484222325)
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(0x100000001b3);
        }
        // length separator so ("ab","c") != ("a","bc")
        self.0 ^= 0xff;
        self.0 = self.0.wrapping_mul(0x100000001b3);
    }

    fn finish(&self) -> u64 {
        self.0
    }
}
