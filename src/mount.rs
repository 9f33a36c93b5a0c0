//! Mount: one live tree driven by a sequence of snapshots
//!
//! Holds the live tree, its root and the snapshot it currently reflects.
//! Each `update` diffs the held snapshot against the next one, patches the
//! live tree and keeps the new snapshot for the following cycle.
//!
//! Event roots left behind by removed taggers are swept once their count
//! has doubled since the last sweep, so collection cost is amortized over
//! many cycles instead of paid per update.
//!
//! Author: Moroya Sakamoto

use std::any::Any;

use crate::diff::{count_patches, diff};
use crate::error::{PatchError, Result};
use crate::events::{collect_event_roots, GcResult};
use crate::live::{LiveId, LiveTree};
use crate::patch::apply_patches;
use crate::render::{render, virtualize};
use crate::vnode::{Message, VNode};

/// Minimum event-root count before a sweep is considered.
const DEFAULT_GC_FLOOR: usize = 64;

/// Outcome of one update cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStats {
    /// Patches applied, nested ones included
    pub patches: usize,
    /// Root of the mounted subtree after the update
    pub root: LiveId,
    /// Set when this cycle swept event roots
    pub gc: Option<GcResult>,
}

/// A mounted view
pub struct Mount {
    tree: LiveTree,
    root: LiveId,
    current: VNode,
    cycles: u64,
    gc_floor: usize,
    gc_threshold: usize,
}

impl Mount {
    /// Render `view` into a fresh live tree.
    pub fn new(view: VNode) -> Self {
        let mut tree = LiveTree::new();
        let root = render(&mut tree, &view, None);
        tracing::debug!(root, nodes = tree.node_count(), "mounted");
        Self::from_parts(tree, root, view)
    }

    /// Adopt an existing live subtree and bring it in line with `view`.
    ///
    /// The subtree is read back with [`virtualize`]; nodes that already
    /// match are kept, the rest is patched.
    pub fn hydrate(mut tree: LiveTree, root: LiveId, view: VNode) -> Result<Self> {
        let existing = virtualize(&tree, root).ok_or(PatchError::MissingNode(root))?;
        let patches = diff(&existing, &view);
        let count = count_patches(&patches);
        let root = apply_patches(&mut tree, root, &existing, patches, None)?;
        tracing::debug!(root, patches = count, "hydrated");
        Ok(Self::from_parts(tree, root, view))
    }

    fn from_parts(tree: LiveTree, root: LiveId, current: VNode) -> Self {
        Self {
            tree,
            root,
            current,
            cycles: 0,
            gc_floor: DEFAULT_GC_FLOOR,
            gc_threshold: DEFAULT_GC_FLOOR,
        }
    }

    /// Sweep event roots once at least `floor` of them exist.
    pub fn with_gc_floor(mut self, floor: usize) -> Self {
        self.gc_floor = floor;
        self.gc_threshold = floor;
        self
    }

    /// Reconcile the live tree with `next`.
    ///
    /// On error the live tree may be partially patched; drop the mount and
    /// create a new one from the latest view.
    pub fn update(&mut self, next: VNode) -> Result<UpdateStats> {
        let patches = diff(&self.current, &next);
        let count = count_patches(&patches);
        self.root = apply_patches(&mut self.tree, self.root, &self.current, patches, None)?;
        self.current = next;
        self.cycles += 1;

        let gc = self.maybe_collect();
        tracing::debug!(cycle = self.cycles, patches = count, root = self.root, "update applied");
        Ok(UpdateStats {
            patches: count,
            root: self.root,
            gc,
        })
    }

    fn maybe_collect(&mut self) -> Option<GcResult> {
        if self.tree.events().len() < self.gc_threshold {
            return None;
        }
        let result = collect_event_roots(&mut self.tree);
        self.gc_threshold = self.gc_floor.max(result.retained * 2);
        if result.did_collect() {
            tracing::debug!(
                collected = result.collected,
                retained = result.retained,
                "event roots swept"
            );
        }
        Some(result)
    }

    /// Force a sweep of unreachable event roots.
    pub fn collect(&mut self) -> GcResult {
        let result = collect_event_roots(&mut self.tree);
        self.gc_threshold = self.gc_floor.max(result.retained * 2);
        result
    }

    /// Fire an event at `target`; returns the messages it produced.
    pub fn dispatch(&self, target: LiveId, event: &str, payload: &dyn Any) -> Vec<Message> {
        self.tree.dispatch(target, event, payload)
    }

    pub fn root(&self) -> LiveId {
        self.root
    }

    pub fn tree(&self) -> &LiveTree {
        &self.tree
    }

    /// Snapshot the live tree currently reflects
    pub fn current(&self) -> &VNode {
        &self.current
    }

    /// Completed update cycles
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn to_html(&self) -> String {
        self.tree.to_html(self.root)
    }

    /// Give back the live tree and its root.
    pub fn into_parts(self) -> (LiveTree, LiveId) {
        (self.tree, self.root)
    }
}
