//! Event roots and their collection
//!
//! Every tagger rendered into the live tree owns an event root: a small
//! record holding the tagger's collapsed mapper chain and a link to the
//! enclosing root. Listeners reference a root instead of capturing the
//! mappers, so a `TaggerChanged` patch re-routes every listener below the
//! tagger by mutating one record.
//!
//! Roots are kept in an id-addressed table. Once the live nodes that
//! referenced a root are gone, [`collect_event_roots`] sweeps it.
//!
//! Author: Moroya Sakamoto

use std::collections::{HashMap, HashSet};

use crate::live::LiveTree;
use crate::vnode::{Mappers, Message};

/// Event root identifier; never reused within one tree.
pub type EventRootId = u32;

/// Mapper chain of one tagger.
#[derive(Debug, Clone)]
pub struct EventRoot {
    /// Collapsed mappers, outermost first.
    pub mappers: Mappers,
    /// Root of the enclosing tagger, if any.
    pub parent: Option<EventRootId>,
}

/// Id-addressed table of event roots.
#[derive(Debug, Default)]
pub struct EventRoots {
    roots: HashMap<EventRootId, EventRoot>,
    next_id: EventRootId,
}

impl EventRoots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a root, returns its id.
    pub fn insert(&mut self, mappers: Mappers, parent: Option<EventRootId>) -> EventRootId {
        let id = self.next_id;
        self.next_id += 1;
        self.roots.insert(id, EventRoot { mappers, parent });
        id
    }

    pub fn get(&self, id: EventRootId) -> Option<&EventRoot> {
        self.roots.get(&id)
    }

    /// Swap the mapper chain of an existing root. False if it is gone.
    pub fn set_mappers(&mut self, id: EventRootId, mappers: Mappers) -> bool {
        match self.roots.get_mut(&id) {
            Some(root) => {
                root.mappers = mappers;
                true
            }
            None => false,
        }
    }

    pub fn parent_of(&self, id: EventRootId) -> Option<EventRootId> {
        self.roots.get(&id).and_then(|root| root.parent)
    }

    pub fn contains(&self, id: EventRootId) -> bool {
        self.roots.contains_key(&id)
    }

    pub fn remove(&mut self, id: EventRootId) -> Option<EventRoot> {
        self.roots.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn all_ids(&self) -> Vec<EventRootId> {
        self.roots.keys().copied().collect()
    }

    /// Pass a message through the chain starting at `root`.
    ///
    /// Within one root, mappers run innermost first; then the enclosing
    /// root takes over.
    pub fn route(&self, root: Option<EventRootId>, message: Message) -> Message {
        let mut message = message;
        let mut current = root;
        while let Some(id) = current {
            let Some(entry) = self.roots.get(&id) else {
                break;
            };
            for mapper in entry.mappers.iter().rev() {
                message = mapper.call(message);
            }
            current = entry.parent;
        }
        message
    }
}

// ── GC Result ──────────────────────────────────────────────────────────

/// Statistics from a collection run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcResult {
    /// Roots still referenced from the live tree.
    pub retained: usize,
    /// Roots removed.
    pub collected: usize,
    /// Roots before the run.
    pub total_before: usize,
}

impl GcResult {
    /// True if any roots were collected.
    #[inline]
    pub fn did_collect(&self) -> bool {
        self.collected > 0
    }
}

// ── Mark-Sweep ────────────────────────────────────────────────────────

/// Remove every event root no live node can reach.
///
/// 1. **Mark**: seed with each node's tagger root and each listener's root,
///    then follow parent links.
/// 2. **Sweep**: drop all roots not marked.
pub fn collect_event_roots(tree: &mut LiveTree) -> GcResult {
    let reachable = mark(tree);
    let events = tree.events_mut();
    let total_before = events.len();

    let mut collected = 0;
    for id in events.all_ids() {
        if !reachable.contains(&id) {
            events.remove(id);
            collected += 1;
        }
    }

    GcResult {
        retained: total_before - collected,
        collected,
        total_before,
    }
}

/// Compute what a collection would remove, without removing anything.
pub fn dry_run(tree: &LiveTree) -> GcResult {
    let total_before = tree.events().len();
    let retained = mark(tree).len();
    GcResult {
        retained,
        collected: total_before - retained,
        total_before,
    }
}

fn mark(tree: &LiveTree) -> HashSet<EventRootId> {
    let events = tree.events();
    let mut reachable = HashSet::new();
    let mut queue = Vec::new();

    let seeds = tree.nodes().flat_map(|node| {
        node.tagger_roots
            .iter()
            .copied()
            .chain(node.listeners.values().filter_map(|l| l.event_root))
    });
    for seed in seeds {
        if events.contains(seed) && reachable.insert(seed) {
            queue.push(seed);
        }
    }

    while let Some(id) = queue.pop() {
        if let Some(parent) = events.parent_of(id) {
            if events.contains(parent) && reachable.insert(parent) {
                queue.push(parent);
            }
        }
    }

    reachable
}
