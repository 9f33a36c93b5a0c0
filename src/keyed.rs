//! Keyed children reconciliation
//!
//! Walks two keyed child lists in lockstep and recognizes the common edits
//! by looking one step ahead: same key, a single insertion, a single
//! removal, an adjacent swap, a one-for-one replacement. Anything else
//! stops the walk; leftover old children are removed and leftover new
//! children are appended.
//!
//! A key that is removed in one place and inserted in another becomes a
//! move: the live node is detached, patched against its new snapshot and
//! reinserted instead of being rebuilt.
//!
//! Author: Moroya Sakamoto

use std::collections::HashMap;

use crate::diff::{diff_help, Patch, PatchKind};
use crate::vnode::VNode;

/// Output of keyed reconciliation, carried by a `Reorder` patch.
#[derive(Debug, Clone, Default)]
pub struct KeyedPatch {
    /// Child-level patches, `Remove` included
    pub local: Vec<Patch>,
    /// Entries to insert at a final child position
    pub inserts: Vec<KeyedInsert>,
    /// Entries appended after everything else, in order
    pub end_inserts: Vec<usize>,
    /// Every key that was inserted, removed or moved
    pub entries: Vec<KeyedEntry>,
}

impl KeyedPatch {
    fn is_empty(&self) -> bool {
        self.local.is_empty() && self.inserts.is_empty() && self.end_inserts.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyedInsert {
    /// Child position in the new list
    pub index: usize,
    /// Position in `KeyedPatch::entries`
    pub entry: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// New key: render fresh
    Insert,
    /// Gone key: discard
    Remove,
    /// Removed and inserted: reuse the live node
    Move,
}

#[derive(Debug, Clone)]
pub struct KeyedEntry {
    pub key: String,
    /// New snapshot for inserts and moves, old snapshot for removals
    pub vnode: VNode,
    pub status: EntryStatus,
    /// Target child position, `None` for end inserts. For a pure removal,
    /// the flat index of the removed node.
    pub index: Option<usize>,
}

/// Patches for a node that leaves its slot and comes back elsewhere.
#[derive(Debug, Clone)]
pub struct MoveData {
    /// Position in `KeyedPatch::entries`
    pub entry: usize,
    /// Patches against the moved node, indexed from its old flat position
    pub patches: Vec<Patch>,
}

struct Removal {
    /// Position of the `Remove` patch in `local`
    patch: usize,
    /// Flat index of the removed node
    index: usize,
}

#[derive(Default)]
struct Reconciler<'a> {
    patch: KeyedPatch,
    removals: Vec<Option<Removal>>,
    /// (key, occurrence) -> entry; the occurrence separates a duplicated key
    changes: HashMap<(&'a str, u32), usize>,
}

/// Reconcile two keyed child lists of the element at `root_index`.
///
/// Returns a `Reorder` patch, or `None` when every child lines up.
pub fn diff_keyed<'a>(
    old: &'a [(String, VNode)],
    new: &'a [(String, VNode)],
    root_index: usize,
) -> Option<Patch> {
    let mut r = Reconciler::default();
    let mut index = root_index;
    let (mut x, mut y) = (0, 0);

    while x < old.len() && y < new.len() {
        let (x_key, x_node) = (&old[x].0, &old[x].1);
        let (y_key, y_node) = (&new[y].0, &new[y].1);

        if x_key == y_key {
            index += 1;
            diff_help(x_node, y_node, &mut r.patch.local, index);
            index += x_node.descendants();
            x += 1;
            y += 1;
            continue;
        }

        match (old.get(x + 1), new.get(y + 1)) {
            // swap
            (Some((x_next_key, x_next)), Some((y_next_key, y_next)))
                if x_key == y_next_key && y_key == x_next_key =>
            {
                index += 1;
                diff_help(x_node, y_next, &mut r.patch.local, index);
                r.insert(y_key, y_node, Some(y));
                index += x_node.descendants();

                index += 1;
                r.remove(x_next_key, x_next, index);
                index += x_next.descendants();

                x += 2;
                y += 2;
            }
            // insertion
            (_, Some((y_next_key, y_next))) if x_key == y_next_key => {
                index += 1;
                r.insert(y_key, y_node, Some(y));
                diff_help(x_node, y_next, &mut r.patch.local, index);
                index += x_node.descendants();

                x += 1;
                y += 2;
            }
            // removal
            (Some((x_next_key, x_next)), _) if y_key == x_next_key => {
                index += 1;
                r.remove(x_key, x_node, index);
                index += x_node.descendants();

                index += 1;
                diff_help(x_next, y_node, &mut r.patch.local, index);
                index += x_next.descendants();

                x += 2;
                y += 1;
            }
            // replacement
            (Some((x_next_key, x_next)), Some((y_next_key, y_next)))
                if x_next_key == y_next_key =>
            {
                index += 1;
                r.remove(x_key, x_node, index);
                r.insert(y_key, y_node, Some(y));
                index += x_node.descendants();

                index += 1;
                diff_help(x_next, y_next, &mut r.patch.local, index);
                index += x_next.descendants();

                x += 2;
                y += 2;
            }
            _ => break,
        }
    }

    while x < old.len() {
        let (key, node) = (&old[x].0, &old[x].1);
        index += 1;
        r.remove(key, node, index);
        index += node.descendants();
        x += 1;
    }

    while y < new.len() {
        let (key, node) = (&new[y].0, &new[y].1);
        r.insert(key, node, None);
        y += 1;
    }

    if r.patch.is_empty() {
        return None;
    }
    tracing::trace!(
        local = r.patch.local.len(),
        inserts = r.patch.inserts.len() + r.patch.end_inserts.len(),
        "keyed reorder"
    );
    Some(Patch::new(root_index, PatchKind::Reorder(r.patch)))
}

impl<'a> Reconciler<'a> {
    fn push_entry(&mut self, key: &str, vnode: &VNode, status: EntryStatus, index: Option<usize>) -> usize {
        self.patch.entries.push(KeyedEntry {
            key: String::from(key),
            vnode: vnode.clone(),
            status,
            index,
        });
        self.removals.push(None);
        self.patch.entries.len() - 1
    }

    fn queue(&mut self, entry: usize, target: Option<usize>) {
        match target {
            Some(index) => self.patch.inserts.push(KeyedInsert { index, entry }),
            None => self.patch.end_inserts.push(entry),
        }
    }

    /// Record that `vnode` appears under `key` at child position `target`
    /// (`None` = appended at the end).
    fn insert(&mut self, key: &'a str, vnode: &VNode, target: Option<usize>) {
        let mut occurrence = 0;
        loop {
            let Some(&entry) = self.changes.get(&(key, occurrence)) else {
                let entry = self.push_entry(key, vnode, EntryStatus::Insert, target);
                self.changes.insert((key, occurrence), entry);
                self.queue(entry, target);
                return;
            };

            if self.patch.entries[entry].status == EntryStatus::Remove {
                if let Some(removal) = self.removals[entry].take() {
                    tracing::trace!(key, "keyed move");
                    let mut nested = Vec::new();
                    let old_vnode = self.patch.entries[entry].vnode.clone();
                    diff_help(&old_vnode, vnode, &mut nested, removal.index);

                    let record = &mut self.patch.entries[entry];
                    record.status = EntryStatus::Move;
                    record.vnode = vnode.clone();
                    record.index = target;
                    self.patch.local[removal.patch].kind =
                        PatchKind::Remove(Some(MoveData { entry, patches: nested }));
                    self.queue(entry, target);
                    return;
                }
            }

            occurrence += 1;
        }
    }

    /// Record that `vnode`, keyed `key`, leaves from flat position `index`.
    fn remove(&mut self, key: &'a str, vnode: &VNode, index: usize) {
        let mut occurrence = 0;
        loop {
            let Some(&entry) = self.changes.get(&(key, occurrence)) else {
                let patch = self.patch.local.len();
                self.patch.local.push(Patch::new(index, PatchKind::Remove(None)));
                let entry = self.push_entry(key, vnode, EntryStatus::Remove, Some(index));
                self.removals[entry] = Some(Removal { patch, index });
                self.changes.insert((key, occurrence), entry);
                return;
            };

            if self.patch.entries[entry].status == EntryStatus::Insert {
                tracing::trace!(key, "keyed move");
                let mut nested = Vec::new();
                diff_help(vnode, &self.patch.entries[entry].vnode, &mut nested, index);
                self.patch.entries[entry].status = EntryStatus::Move;
                self.patch.local.push(Patch::new(
                    index,
                    PatchKind::Remove(Some(MoveData { entry, patches: nested })),
                ));
                return;
            }

            occurrence += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff;

    fn item(key: &str, label: &str) -> (String, VNode) {
        (
            String::from(key),
            VNode::element("li", vec![], vec![VNode::text(label)]),
        )
    }

    fn list(keys: &[&str]) -> Vec<(String, VNode)> {
        keys.iter().map(|k| item(k, k)).collect()
    }

    fn reorder(old: &[&str], new: &[&str]) -> KeyedPatch {
        let patch = diff_keyed(&list(old), &list(new), 0).expect("expected a reorder");
        match patch.kind {
            PatchKind::Reorder(keyed) => keyed,
            other => panic!("unexpected {other:?}"),
        }
    }

    fn has_redraw(patches: &[Patch]) -> bool {
        patches.iter().any(|p| match &p.kind {
            PatchKind::Redraw(_) => true,
            PatchKind::Remove(Some(moved)) => has_redraw(&moved.patches),
            PatchKind::Reorder(keyed) => has_redraw(&keyed.local),
            _ => false,
        })
    }

    #[test]
    fn test_identical_lists() {
        assert!(diff_keyed(&list(&["a", "b"]), &list(&["a", "b"]), 0).is_none());
    }

    #[test]
    fn test_same_keys_changed_content() {
        let old = vec![item("a", "1"), item("b", "2")];
        let new = vec![item("a", "1"), item("b", "3")];
        let patch = diff_keyed(&old, &new, 0).unwrap();
        let PatchKind::Reorder(keyed) = patch.kind else {
            panic!("expected reorder");
        };
        // li(1) > text(2), li(3) > text(4)
        assert_eq!(keyed.local.len(), 1);
        assert_eq!(keyed.local[0].index, 4);
        assert!(keyed.inserts.is_empty());
    }

    #[test]
    fn test_swap_is_one_move() {
        let keyed = reorder(&["a", "b", "c"], &["b", "a", "c"]);
        assert!(!has_redraw(&keyed.local));
        assert_eq!(keyed.inserts, vec![KeyedInsert { index: 0, entry: 0 }]);
        assert_eq!(keyed.entries.len(), 1);
        assert_eq!(keyed.entries[0].key, "b");
        assert_eq!(keyed.entries[0].status, EntryStatus::Move);
        // old "b" sits at flat index 3: ul(0) li-a(1) text(2) li-b(3)
        assert_eq!(keyed.local.len(), 1);
        assert_eq!(keyed.local[0].index, 3);
        assert!(matches!(&keyed.local[0].kind, PatchKind::Remove(Some(m)) if m.entry == 0));
    }

    #[test]
    fn test_single_insertion() {
        let keyed = reorder(&["a", "b"], &["a", "x", "b"]);
        assert!(keyed.local.is_empty());
        assert_eq!(keyed.inserts, vec![KeyedInsert { index: 1, entry: 0 }]);
        assert_eq!(keyed.entries[0].status, EntryStatus::Insert);
        assert!(keyed.end_inserts.is_empty());
    }

    #[test]
    fn test_single_removal() {
        let keyed = reorder(&["a", "x", "b"], &["a", "b"]);
        assert!(keyed.inserts.is_empty());
        assert_eq!(keyed.local.len(), 1);
        assert_eq!(keyed.local[0].index, 3);
        assert!(matches!(keyed.local[0].kind, PatchKind::Remove(None)));
        assert_eq!(keyed.entries[0].status, EntryStatus::Remove);
    }

    #[test]
    fn test_replacement() {
        let keyed = reorder(&["a", "x", "c"], &["a", "y", "c"]);
        assert_eq!(keyed.inserts, vec![KeyedInsert { index: 1, entry: 1 }]);
        assert!(matches!(keyed.local[0].kind, PatchKind::Remove(None)));
        assert_eq!(keyed.entries[0].key, "x");
        assert_eq!(keyed.entries[1].key, "y");
    }

    #[test]
    fn test_tail_append_and_truncate() {
        let appended = reorder(&["a"], &["a", "b", "c"]);
        assert_eq!(appended.end_inserts, vec![0, 1]);
        assert!(appended.entries.iter().all(|e| e.index.is_none()));

        let truncated = reorder(&["a", "b", "c"], &["a"]);
        let removed: Vec<usize> = truncated.local.iter().map(|p| p.index).collect();
        assert_eq!(removed, vec![3, 5]);
    }

    #[test]
    fn test_move_to_end() {
        // "a" leaves the front and reappears after the walk stops
        let keyed = reorder(&["a", "b", "c", "d"], &["b", "c", "d", "a"]);
        assert!(!has_redraw(&keyed.local));
        let moved = keyed
            .entries
            .iter()
            .find(|e| e.key == "a")
            .expect("a must be tracked");
        assert_eq!(moved.status, EntryStatus::Move);
        assert_eq!(moved.index, None);
    }

    #[test]
    fn test_duplicate_key_pair() {
        let keyed = reorder(&["a", "a"], &["a", "b", "a"]);
        assert_eq!(keyed.inserts.len(), 1);
        assert_eq!(keyed.entries[0].key, "b");
    }

    #[test]
    fn test_indices_monotonic() {
        let keyed = reorder(&["a", "b", "c", "d", "e"], &["b", "a", "x", "d", "c"]);
        let idx: Vec<usize> = keyed.local.iter().map(|p| p.index).collect();
        assert!(idx.windows(2).all(|w| w[0] <= w[1]), "{idx:?}");
    }

    #[test]
    fn test_reached_through_diff() {
        let old = VNode::keyed("ul", vec![], list(&["a", "b"])).unwrap();
        let new = VNode::keyed("ul", vec![], list(&["b", "a"])).unwrap();
        let patches = diff(&old, &new);
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].index, 0);
        assert!(matches!(patches[0].kind, PatchKind::Reorder(_)));
    }
}
