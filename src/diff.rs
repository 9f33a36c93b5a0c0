//! Snapshot diff engine
//!
//! Compares two virtual trees and produces a flat list of patches, each
//! addressed by its node's position in a depth-first pre-order walk of the
//! OLD tree (root = 0). Patches come out with non-decreasing indices so the
//! patcher can match them to live nodes in a single pass.
//!
//! Author: Moroya Sakamoto

use std::borrow::Cow;

use indexmap::IndexMap;

use crate::events::EventRootId;
use crate::keyed::{diff_keyed, KeyedPatch, MoveData};
use crate::live::LiveId;
use crate::vnode::{CustomPatch, Facts, Handler, Mappers, PropValue, VNode, VNodeKind};

/// Live node a patch was matched to, with the event root in effect there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub node: LiveId,
    pub event_root: Option<EventRootId>,
    /// Tagger roots on `node` owned by enclosing taggers. A tagger patched
    /// here owns `tagger_roots[depth]`.
    pub depth: usize,
}

/// One edit against the live tree.
#[derive(Debug, Clone)]
pub struct Patch {
    /// Pre-order position of the affected node in the old snapshot
    pub index: usize,
    pub kind: PatchKind,
    /// Filled in by address resolution just before application
    pub target: Option<Target>,
}

impl Patch {
    pub fn new(index: usize, kind: PatchKind) -> Self {
        Self {
            index,
            kind,
            target: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum PatchKind {
    /// Replace the node with a fresh render
    Redraw(VNode),
    /// Patches for a thunk's content, indexed from the thunk itself
    Thunk(Vec<Patch>),
    /// New mapper chain for a tagger's event root
    TaggerChanged(Mappers),
    TextChanged(String),
    FactsChanged(FactsDiff),
    /// Caller-defined mutation of a custom node. `facts` are the new node's
    /// full facts, installed again if the mutation swaps in another node.
    Custom { patch: CustomPatch, facts: Facts },
    /// Drop `count` trailing children starting at `from`
    RemoveChildren { from: usize, count: usize },
    /// Render `children` and insert them starting at position `from`
    InsertChildren { from: usize, children: Vec<VNode> },
    /// Keyed child reconciliation
    Reorder(KeyedPatch),
    /// Remove a keyed child; with move data it is kept for reinsertion
    Remove(Option<MoveData>),
}

/// Change to one namespaced attribute. `None` removes it.
#[derive(Debug, Clone, PartialEq)]
pub struct NsChange {
    pub namespace: String,
    pub value: Option<String>,
}

/// Per-category fact changes. Removed keys carry a clearing value: `""`
/// for styles, `None` for events and attributes, and for properties an
/// empty string if the old value was a string, else null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactsDiff {
    pub styles: Vec<(String, String)>,
    pub events: Vec<(String, Option<Handler>)>,
    pub properties: Vec<(String, PropValue)>,
    pub attributes: Vec<(String, Option<String>)>,
    pub ns_attributes: Vec<(String, NsChange)>,
}

impl FactsDiff {
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of changed keys across all categories
    pub fn len(&self) -> usize {
        self.styles.len()
            + self.events.len()
            + self.properties.len()
            + self.attributes.len()
            + self.ns_attributes.len()
    }
}

/// Compute the patches that turn `old` into `new`.
///
/// Diffing a snapshot against itself (same handle) yields nothing.
pub fn diff(old: &VNode, new: &VNode) -> Vec<Patch> {
    let mut patches = Vec::new();
    diff_help(old, new, &mut patches, 0);
    tracing::trace!(patches = patches.len(), "diff complete");
    patches
}

pub(crate) fn diff_help(old: &VNode, new: &VNode, patches: &mut Vec<Patch>, index: usize) {
    if old.ptr_eq(new) {
        return;
    }

    match (old.kind(), new.kind()) {
        (VNodeKind::Thunk(x), VNodeKind::Thunk(y)) => {
            let old_child = x.force();
            if x.same_args(y) {
                y.adopt(old_child);
                return;
            }
            let new_child = y.force();
            let mut nested = Vec::new();
            diff_help(&old_child, &new_child, &mut nested, 0);
            if !nested.is_empty() {
                patches.push(Patch::new(index, PatchKind::Thunk(nested)));
            }
        }

        (VNodeKind::Tagger(_), VNodeKind::Tagger(_)) => {
            let (x_mappers, x_inner) = old.untag();
            let (y_mappers, y_inner) = new.untag();
            if x_mappers.len() != y_mappers.len() {
                redraw(new, patches, index);
                return;
            }
            let changed = x_mappers.iter().zip(&y_mappers).any(|(a, b)| !a.same(b));
            if changed {
                patches.push(Patch::new(index, PatchKind::TaggerChanged(y_mappers)));
            }
            diff_help(x_inner, y_inner, patches, index + 1);
        }

        (VNodeKind::Text(x), VNodeKind::Text(y)) => {
            if x != y {
                patches.push(Patch::new(index, PatchKind::TextChanged(y.clone())));
            }
        }

        (
            VNodeKind::Element(_) | VNodeKind::KeyedElement(_),
            VNodeKind::Element(_) | VNodeKind::KeyedElement(_),
        ) => diff_elements(old, new, patches, index),

        (VNodeKind::Custom(x), VNodeKind::Custom(y)) => {
            if !x.render.same(&y.render) {
                redraw(new, patches, index);
                return;
            }
            if let Some(facts) = diff_facts(&x.facts, &y.facts) {
                patches.push(Patch::new(index, PatchKind::FactsChanged(facts)));
            }
            if let Some(patch) = y.diff.call(&*x.model, &*y.model) {
                let facts = y.facts.clone();
                patches.push(Patch::new(index, PatchKind::Custom { patch, facts }));
            }
        }

        _ => redraw(new, patches, index),
    }
}

fn redraw(new: &VNode, patches: &mut Vec<Patch>, index: usize) {
    tracing::trace!(index, "redraw");
    patches.push(Patch::new(index, PatchKind::Redraw(new.clone())));
}

/// Header fields shared by plain and keyed elements.
fn header(node: &VNode) -> Option<(&str, Option<&str>, &Facts)> {
    match node.kind() {
        VNodeKind::Element(el) => Some((el.tag.as_str(), el.namespace.as_deref(), &el.facts)),
        VNodeKind::KeyedElement(el) => Some((el.tag.as_str(), el.namespace.as_deref(), &el.facts)),
        _ => None,
    }
}

fn diff_elements(old: &VNode, new: &VNode, patches: &mut Vec<Patch>, index: usize) {
    let (Some((x_tag, x_ns, x_facts)), Some((y_tag, y_ns, y_facts))) = (header(old), header(new))
    else {
        redraw(new, patches, index);
        return;
    };
    if x_tag != y_tag || x_ns != y_ns {
        redraw(new, patches, index);
        return;
    }

    if let Some(facts) = diff_facts(x_facts, y_facts) {
        patches.push(Patch::new(index, PatchKind::FactsChanged(facts)));
    }

    match (old.kind(), new.kind()) {
        (VNodeKind::KeyedElement(x), VNodeKind::KeyedElement(y)) => {
            if let Some(patch) = diff_keyed(&x.children, &y.children, index) {
                patches.push(patch);
            }
        }
        // mixed keyed/plain pairs compare positionally, keys dropped
        _ => diff_children(&plain_children(old), &plain_children(new), patches, index),
    }
}

fn plain_children(node: &VNode) -> Cow<'_, [VNode]> {
    match node.kind() {
        VNodeKind::Element(el) => Cow::Borrowed(&el.children),
        _ => Cow::Owned(node.child_nodes().cloned().collect()),
    }
}

fn diff_children(old: &[VNode], new: &[VNode], patches: &mut Vec<Patch>, index: usize) {
    if old.len() > new.len() {
        patches.push(Patch::new(
            index,
            PatchKind::RemoveChildren {
                from: new.len(),
                count: old.len() - new.len(),
            },
        ));
    } else if old.len() < new.len() {
        patches.push(Patch::new(
            index,
            PatchKind::InsertChildren {
                from: old.len(),
                children: new[old.len()..].to_vec(),
            },
        ));
    }

    let mut index = index;
    for (x, y) in old.iter().zip(new) {
        index += 1;
        diff_help(x, y, patches, index);
        index += x.descendants();
    }
}

/// Per-category fact comparison. `None` when nothing changed.
pub fn diff_facts(old: &Facts, new: &Facts) -> Option<FactsDiff> {
    let diff = FactsDiff {
        styles: diff_category(&old.styles, &new.styles, String::clone, |_| String::new()),
        events: diff_category(&old.events, &new.events, |h| Some(h.clone()), |_| None),
        properties: diff_category(
            &old.properties,
            &new.properties,
            PropValue::clone,
            PropValue::cleared,
        ),
        attributes: diff_category(
            &old.attributes,
            &new.attributes,
            |v| Some(v.clone()),
            |_| None,
        ),
        ns_attributes: diff_category(
            &old.ns_attributes,
            &new.ns_attributes,
            |v| NsChange {
                namespace: v.namespace.clone(),
                value: Some(v.value.clone()),
            },
            |v| NsChange {
                namespace: v.namespace.clone(),
                value: None,
            },
        ),
    };
    (!diff.is_empty()).then_some(diff)
}

fn diff_category<V: PartialEq, T>(
    old: &IndexMap<String, V>,
    new: &IndexMap<String, V>,
    present: impl Fn(&V) -> T,
    removed: impl Fn(&V) -> T,
) -> Vec<(String, T)> {
    let mut changes = Vec::new();
    for (key, old_value) in old {
        match new.get(key) {
            None => changes.push((key.clone(), removed(old_value))),
            Some(new_value) if new_value != old_value => {
                changes.push((key.clone(), present(new_value)))
            }
            Some(_) => {}
        }
    }
    for (key, new_value) in new {
        if !old.contains_key(key) {
            changes.push((key.clone(), present(new_value)));
        }
    }
    changes
}

/// Total patch count, nested thunk, reorder and move lists included.
pub fn count_patches(patches: &[Patch]) -> usize {
    patches
        .iter()
        .map(|patch| {
            1 + match &patch.kind {
                PatchKind::Thunk(nested) => count_patches(nested),
                PatchKind::Reorder(keyed) => count_patches(&keyed.local),
                PatchKind::Remove(Some(moved)) => count_patches(&moved.patches),
                _ => 0,
            }
        })
        .sum()
}
