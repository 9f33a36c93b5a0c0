//! Patch application
//!
//! Two passes over a patch list:
//!
//! 1. **Resolve**: walk the old snapshot and the live tree side by side,
//!    visiting only the index ranges that contain patches, and record the
//!    live node (and event root) each patch addresses.
//! 2. **Apply**: run every patch against its recorded node, in order.
//!
//! Resolution is finished before any mutation starts, so structural edits
//! made by early patches cannot shift the addresses of later ones.
//!
//! Author: Moroya Sakamoto

use crate::diff::{Patch, PatchKind, Target};
use crate::error::{PatchError, Result};
use crate::events::EventRootId;
use crate::keyed::{EntryStatus, KeyedEntry, KeyedPatch};
use crate::live::{LiveId, LiveTree};
use crate::render::{apply_facts, apply_facts_diff, render};
use crate::vnode::{VNode, VNodeKind};

/// Apply `patches` (computed against `old`) to the live subtree at `root`.
///
/// Returns the root of the patched subtree, which differs from `root` when
/// the root itself was redrawn.
pub fn apply_patches(
    tree: &mut LiveTree,
    root: LiveId,
    old: &VNode,
    mut patches: Vec<Patch>,
    event_root: Option<EventRootId>,
) -> Result<LiveId> {
    if patches.is_empty() {
        return Ok(root);
    }
    let site = Site {
        node: root,
        vnode: old,
        event_root,
        depth: 0,
    };
    resolve(tree, site, &mut patches, 0, 0, old.descendants())
        .and_then(|_| apply_list(tree, root, patches, &mut Moves::default()))
        .inspect_err(|err| tracing::error!(%err, "patch application failed"))
}

// ── Resolve ────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
struct Site<'v> {
    node: LiveId,
    vnode: &'v VNode,
    event_root: Option<EventRootId>,
    /// Tagger roots of `node` already claimed by enclosing taggers
    depth: usize,
}

/// Match patches `i..` whose index falls in `low..=high` to nodes under
/// `site`. Returns the position of the first patch left unmatched.
fn resolve(
    tree: &LiveTree,
    site: Site<'_>,
    patches: &mut [Patch],
    mut i: usize,
    low: usize,
    high: usize,
) -> Result<usize> {
    let Some(first) = patches.get(i) else {
        return Ok(i);
    };
    let mut index = first.index;

    while index == low {
        let patch = &mut patches[i];
        patch.target = Some(Target {
            node: site.node,
            event_root: site.event_root,
            depth: site.depth,
        });
        match &mut patch.kind {
            PatchKind::Thunk(nested) => {
                let VNodeKind::Thunk(thunk) = site.vnode.kind() else {
                    return Err(PatchError::NotAThunk { index });
                };
                let content = thunk.force();
                let inner = Site {
                    vnode: &content,
                    ..site
                };
                resolve(tree, inner, nested, 0, 0, content.descendants())?;
            }
            PatchKind::Reorder(keyed) => {
                resolve(tree, site, &mut keyed.local, 0, low, high)?;
            }
            PatchKind::Remove(Some(moved)) => {
                resolve(tree, site, &mut moved.patches, 0, low, high)?;
            }
            _ => {}
        }

        i += 1;
        match patches.get(i) {
            Some(next) if next.index <= high => index = next.index,
            _ => return Ok(i),
        }
    }

    if let VNodeKind::Tagger(_) = site.vnode.kind() {
        let (_, inner) = site.vnode.untag();
        let root = tree
            .node(site.node)?
            .tagger_roots
            .get(site.depth)
            .copied()
            .ok_or(PatchError::MissingTaggerRoot {
                node: site.node,
                depth: site.depth,
            })?;
        let inner_site = Site {
            node: site.node,
            vnode: inner,
            event_root: Some(root),
            depth: site.depth + 1,
        };
        return resolve(tree, inner_site, patches, i, low + 1, high);
    }

    let live_children = &tree.node(site.node)?.children;
    let mut low = low;
    for (position, child) in site.vnode.child_nodes().enumerate() {
        low += 1;
        let next_low = low + child.descendants();
        if low <= index && index <= next_low {
            let node = *live_children
                .get(position)
                .ok_or(PatchError::MissingChild {
                    parent: site.node,
                    position,
                })?;
            let child_site = Site {
                node,
                vnode: child,
                event_root: site.event_root,
                depth: 0,
            };
            i = resolve(tree, child_site, patches, i, low, next_low)?;
            match patches.get(i) {
                Some(next) if next.index <= high => index = next.index,
                _ => return Ok(i),
            }
        }
        low = next_low;
    }
    Ok(i)
}

// ── Apply ──────────────────────────────────────────────────────────────

/// Live nodes held by the moves of one keyed reorder.
#[derive(Default)]
struct Moves<'p> {
    entries: &'p [KeyedEntry],
    live: Vec<Option<LiveId>>,
}

fn apply_list(tree: &mut LiveTree, root: LiveId, patches: Vec<Patch>, moves: &mut Moves<'_>) -> Result<LiveId> {
    let mut root = root;
    for patch in patches {
        let target = patch.target.ok_or(PatchError::Unresolved { index: patch.index })?;
        let node = apply_one(tree, target, patch.kind, moves)?;
        if target.node == root {
            root = node;
        }
    }
    Ok(root)
}

/// Apply one patch. Returns the node that now occupies the target's place.
fn apply_one(tree: &mut LiveTree, target: Target, kind: PatchKind, moves: &mut Moves<'_>) -> Result<LiveId> {
    match kind {
        PatchKind::Redraw(vnode) => redraw(tree, target, &vnode),

        PatchKind::FactsChanged(facts) => {
            let node = tree.node_mut(target.node)?;
            apply_facts_diff(node, &facts, target.event_root);
            Ok(target.node)
        }

        PatchKind::TextChanged(text) => {
            tree.set_text(target.node, &text)?;
            Ok(target.node)
        }

        PatchKind::Thunk(nested) => apply_list(tree, target.node, nested, &mut Moves::default()),

        PatchKind::TaggerChanged(mappers) => {
            let existing = tree.node(target.node)?.tagger_roots.get(target.depth).copied();
            let updated =
                existing.is_some_and(|root| tree.events_mut().set_mappers(root, mappers.clone()));
            if !updated {
                let root = tree.events_mut().insert(mappers, target.event_root);
                let roots = &mut tree.node_mut(target.node)?.tagger_roots;
                match roots.get_mut(target.depth) {
                    Some(slot) => *slot = root,
                    None => roots.push(root),
                }
            }
            Ok(target.node)
        }

        PatchKind::Custom { patch, facts } => {
            let node = patch.call(tree, target.node);
            if node != target.node {
                carry_tagger_roots(tree, target, node)?;
                apply_facts(tree.node_mut(node)?, &facts, target.event_root);
                tree.replace(target.node, node)?;
                tree.remove_subtree(target.node)?;
            }
            Ok(node)
        }

        PatchKind::RemoveChildren { from, count } => {
            for _ in 0..count {
                let child = tree
                    .children(target.node)
                    .get(from)
                    .copied()
                    .ok_or(PatchError::MissingChild {
                        parent: target.node,
                        position: from,
                    })?;
                tree.remove_subtree(child)?;
            }
            Ok(target.node)
        }

        PatchKind::InsertChildren { from, children } => {
            for (offset, vnode) in children.iter().enumerate() {
                let child = render(tree, vnode, target.event_root);
                tree.insert_child(target.node, child, from + offset)?;
            }
            Ok(target.node)
        }

        PatchKind::Reorder(keyed) => reorder(tree, target, keyed),

        PatchKind::Remove(None) => {
            tree.remove_subtree(target.node)?;
            Ok(target.node)
        }

        PatchKind::Remove(Some(moved)) => {
            let entry = moves
                .entries
                .get(moved.entry)
                .ok_or(PatchError::DanglingMove { entry: moved.entry })?;
            if entry.index.is_some() {
                tree.detach(target.node)?;
            }
            let node = apply_list(tree, target.node, moved.patches, &mut Moves::default())?;
            let slot = moves
                .live
                .get_mut(moved.entry)
                .ok_or(PatchError::DanglingMove { entry: moved.entry })?;
            *slot = Some(node);
            Ok(target.node)
        }
    }
}

fn redraw(tree: &mut LiveTree, target: Target, vnode: &VNode) -> Result<LiveId> {
    let node = render(tree, vnode, target.event_root);
    carry_tagger_roots(tree, target, node)?;
    tree.replace(target.node, node)?;
    tree.remove_subtree(target.node)?;
    tracing::trace!(old = target.node, new = node, "redraw");
    Ok(node)
}

/// Move the roots of taggers enclosing `target` onto its replacement,
/// ahead of the roots the replacement rendered itself. Roots past
/// `target.depth` belonged to the replaced content and are dropped.
fn carry_tagger_roots(tree: &mut LiveTree, target: Target, node: LiveId) -> Result<()> {
    let mut roots = std::mem::take(&mut tree.node_mut(target.node)?.tagger_roots);
    roots.truncate(target.depth);
    let fresh = tree.node_mut(node)?;
    roots.extend(fresh.tagger_roots.drain(..));
    fresh.tagger_roots = roots;
    Ok(())
}

fn reorder(tree: &mut LiveTree, target: Target, keyed: KeyedPatch) -> Result<LiveId> {
    let KeyedPatch {
        local,
        inserts,
        end_inserts,
        entries,
    } = keyed;
    let mut moves = Moves {
        entries: &entries,
        live: vec![None; entries.len()],
    };

    // moved nodes start out as whatever their removal patch resolved to
    for patch in &local {
        if let (PatchKind::Remove(Some(moved)), Some(resolved)) = (&patch.kind, patch.target) {
            if let Some(slot) = moves.live.get_mut(moved.entry) {
                *slot = Some(resolved.node);
            }
        }
    }

    let fragment = if end_inserts.is_empty() {
        None
    } else {
        let fragment = tree.create_fragment();
        for &entry in &end_inserts {
            let child = entry_node(tree, &moves, entry, target.event_root)?;
            tree.append_child(fragment, child)?;
        }
        Some(fragment)
    };

    let parent = apply_list(tree, target.node, local, &mut moves)?;

    for insert in &inserts {
        let child = entry_node(tree, &moves, insert.entry, target.event_root)?;
        tree.insert_child(parent, child, insert.index)?;
    }

    if let Some(fragment) = fragment {
        tree.append_child(parent, fragment)?;
    }
    Ok(parent)
}

/// Live node for an inserted entry: the held node for a move, a fresh
/// render otherwise.
fn entry_node(tree: &mut LiveTree, moves: &Moves<'_>, entry: usize, event_root: Option<EventRootId>) -> Result<LiveId> {
    let record = moves
        .entries
        .get(entry)
        .ok_or(PatchError::DanglingMove { entry })?;
    match record.status {
        EntryStatus::Move => moves
            .live
            .get(entry)
            .copied()
            .flatten()
            .ok_or(PatchError::DanglingMove { entry }),
        EntryStatus::Insert | EntryStatus::Remove => Ok(render(tree, &record.vnode, event_root)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff;
    use crate::vnode::{
        attribute, class, on, style, CustomDiff, CustomPatch, Handler, Identity, Mapper, RenderFn,
    };
    use std::rc::Rc;

    fn mount(view: &VNode) -> (LiveTree, LiveId) {
        let mut tree = LiveTree::new();
        let root = render(&mut tree, view, None);
        (tree, root)
    }

    /// Patch `old` into `new` and check the result against a fresh render.
    fn check(old: &VNode, new: &VNode) -> (LiveTree, LiveId) {
        let (mut tree, root) = mount(old);
        let root = apply_patches(&mut tree, root, old, diff(old, new), None).unwrap();
        let (fresh, fresh_root) = mount(new);
        assert_eq!(tree.to_html(root), fresh.to_html(fresh_root));
        assert_eq!(tree.subtree_hash(root), fresh.subtree_hash(fresh_root));
        (tree, root)
    }

    fn li(label: &str) -> VNode {
        VNode::element("li", vec![], vec![VNode::text(label)])
    }

    fn keyed_list(keys: &[&str]) -> VNode {
        VNode::keyed(
            "ul",
            vec![],
            keys.iter().map(|k| (String::from(*k), li(k))).collect(),
        )
        .unwrap()
    }

    fn keyed_pairs(entries: &[(&str, &str)]) -> VNode {
        VNode::keyed(
            "ul",
            vec![],
            entries.iter().map(|(k, label)| (String::from(*k), li(label))).collect(),
        )
        .unwrap()
    }

    /// Mapper appending `label` to a `String` message
    fn tag(label: &'static str) -> Mapper {
        Mapper::new(move |m| {
            let trail = m.downcast::<String>().map(|s| *s).unwrap_or_default();
            Box::new(format!("{trail}>{label}"))
        })
    }

    fn click_trail(tree: &LiveTree, node: LiveId) -> Vec<String> {
        tree.dispatch(node, "click", &())
            .into_iter()
            .filter_map(|m| m.downcast::<String>().ok().map(|s| *s))
            .collect()
    }

    fn leaf_ids(tree: &LiveTree, ul: LiveId) -> Vec<(String, LiveId)> {
        tree.children(ul)
            .iter()
            .map(|&id| {
                let text = tree.children(id)[0];
                (String::from(tree.get(text).unwrap().text().unwrap()), id)
            })
            .collect()
    }

    #[test]
    fn test_empty_patch_list_is_noop() {
        let view = VNode::text("x");
        let (mut tree, root) = mount(&view);
        assert_eq!(apply_patches(&mut tree, root, &view, vec![], None).unwrap(), root);
    }

    #[test]
    fn test_text_change_in_place() {
        let old = VNode::element("div", vec![class("a")], vec![VNode::text("hi")]);
        let new = VNode::element("div", vec![class("a")], vec![VNode::text("bye")]);
        let (mut tree, root) = mount(&old);
        let text = tree.children(root)[0];
        let root = apply_patches(&mut tree, root, &old, diff(&old, &new), None).unwrap();
        assert_eq!(tree.children(root), &[text]);
        assert_eq!(tree.get(text).unwrap().text(), Some("bye"));
    }

    #[test]
    fn test_root_redraw_returns_new_root() {
        let old = VNode::element("div", vec![], vec![]);
        let new = VNode::element("span", vec![], vec![VNode::text("x")]);
        let (mut tree, root) = mount(&old);
        let new_root = apply_patches(&mut tree, root, &old, diff(&old, &new), None).unwrap();
        assert_ne!(new_root, root);
        assert!(tree.get(root).is_none());
        assert_eq!(tree.to_html(new_root), "<span>x</span>");
        assert_eq!(tree.node_count(), 2);
    }

    #[test]
    fn test_facts_round_trip() {
        check(
            &VNode::element("p", vec![style("color", "red"), class("a")], vec![]),
            &VNode::element("p", vec![style("margin", "0"), class("b")], vec![]),
        );
    }

    #[test]
    fn test_children_grow_and_shrink() {
        let one = VNode::element("ul", vec![], vec![li("a")]);
        let three = VNode::element("ul", vec![], vec![li("a"), li("b"), li("c")]);
        check(&one, &three);
        check(&three, &one);
    }

    #[test]
    fn test_deep_patch_skips_untouched_subtrees() {
        let old = VNode::element(
            "div",
            vec![],
            vec![
                VNode::element("ul", vec![], vec![li("a"), li("b")]),
                VNode::element("p", vec![], vec![VNode::text("x")]),
            ],
        );
        let new = VNode::element(
            "div",
            vec![],
            vec![
                VNode::element("ul", vec![], vec![li("a"), li("b")]),
                VNode::element("p", vec![], vec![VNode::text("y")]),
            ],
        );
        check(&old, &new);
    }

    #[test]
    fn test_keyed_swap_keeps_nodes() {
        let old = keyed_list(&["a", "b", "c"]);
        let new = keyed_list(&["b", "a", "c"]);
        let (mut tree, root) = mount(&old);
        let before = leaf_ids(&tree, root);
        let root = apply_patches(&mut tree, root, &old, diff(&old, &new), None).unwrap();
        let after = leaf_ids(&tree, root);
        let labels: Vec<&str> = after.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["b", "a", "c"]);
        assert_eq!(after[0].1, before[1].1);
        assert_eq!(after[1].1, before[0].1);
        assert_eq!(after[2].1, before[2].1);
    }

    #[test]
    fn test_keyed_insert_keeps_neighbours() {
        let old = keyed_list(&["a", "b"]);
        let new = keyed_list(&["a", "x", "b"]);
        let (mut tree, root) = mount(&old);
        let before = leaf_ids(&tree, root);
        let root = apply_patches(&mut tree, root, &old, diff(&old, &new), None).unwrap();
        let after = leaf_ids(&tree, root);
        assert_eq!(after.len(), 3);
        assert_eq!(after[0].1, before[0].1);
        assert_eq!(after[2].1, before[1].1);
        assert_eq!(after[1].0, "x");
    }

    #[test]
    fn test_keyed_move_to_end_reuses_node() {
        let old = keyed_list(&["a", "b", "c", "d"]);
        let new = keyed_list(&["b", "c", "d", "a"]);
        let (mut tree, root) = mount(&old);
        let before = leaf_ids(&tree, root);
        let root = apply_patches(&mut tree, root, &old, diff(&old, &new), None).unwrap();
        let after = leaf_ids(&tree, root);
        let labels: Vec<&str> = after.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["b", "c", "d", "a"]);
        assert_eq!(after[3].1, before[0].1);
    }

    #[test]
    fn test_keyed_sequences_match_fresh_render() {
        let cases: Vec<(Vec<&str>, Vec<&str>)> = vec![
            (vec!["a", "b", "c"], vec!["c", "b", "a"]),
            (vec!["a", "b", "c", "d", "e"], vec!["b", "a", "x", "d", "c"]),
            (vec!["a", "b"], vec![]),
            (vec![], vec!["a", "b"]),
            (vec!["a", "b", "c"], vec!["x", "y"]),
            (vec!["a", "x", "c"], vec!["a", "y", "c"]),
        ];
        for (old, new) in &cases {
            check(&keyed_list(old), &keyed_list(new));
        }
    }

    #[test]
    fn test_keyed_duplicate_key_matches_fresh_render() {
        type Entries<'a> = Vec<(&'a str, &'a str)>;
        let cases: Vec<(Entries, Entries)> = vec![
            (vec![("a", "1"), ("b", "2"), ("a", "3")], vec![("b", "2"), ("a", "1"), ("a", "3")]),
            (vec![("a", "1"), ("a", "2")], vec![("a", "2"), ("a", "1"), ("c", "4")]),
            (vec![("x", "0"), ("a", "1"), ("b", "2"), ("a", "3")], vec![("a", "3"), ("b", "2")]),
            (vec![("a", "1"), ("b", "2")], vec![("a", "1"), ("a", "5"), ("b", "2")]),
        ];
        for (old, new) in &cases {
            check(&keyed_pairs(old), &keyed_pairs(new));
        }
    }

    #[test]
    fn test_keyed_move_with_content_change() {
        let old = VNode::keyed(
            "ul",
            vec![],
            vec![(String::from("a"), li("1")), (String::from("b"), li("2"))],
        )
        .unwrap();
        let new = VNode::keyed(
            "ul",
            vec![],
            vec![(String::from("b"), li("2")), (String::from("a"), li("changed"))],
        )
        .unwrap();
        check(&old, &new);
    }

    #[test]
    fn test_thunk_patches_apply() {
        let old = VNode::element(
            "div",
            vec![],
            vec![VNode::lazy(vec![Identity::Int(1)], || li("one"))],
        );
        let new = VNode::element(
            "div",
            vec![],
            vec![VNode::lazy(vec![Identity::Int(2)], || li("two"))],
        );
        check(&old, &new);
    }

    #[test]
    fn test_tagger_change_reroutes_existing_listener() {
        let handler = Handler::new(|_| Some(Box::new(1_i32)));
        let add = |n: i32| {
            Mapper::new(move |m| {
                let v = m.downcast::<i32>().map(|v| *v).unwrap_or(0);
                Box::new(v + n)
            })
        };
        let button = |h: &Handler| VNode::element("button", vec![on("click", h.clone())], vec![]);
        let old = VNode::element("div", vec![], vec![button(&handler).map(add(10))]);
        let new = VNode::element("div", vec![], vec![button(&handler).map(add(20))]);

        let (mut tree, root) = mount(&old);
        let target = tree.children(root)[0];
        let patches = diff(&old, &new);
        assert_eq!(patches.len(), 1);
        let root = apply_patches(&mut tree, root, &old, patches, None).unwrap();
        assert_eq!(tree.children(root), &[target]);
        let messages = tree.dispatch(target, "click", &());
        assert_eq!(*messages[0].downcast_ref::<i32>().unwrap(), 21);
    }

    #[test]
    fn test_redraw_inside_tagger_inherits_root() {
        let mapper = Mapper::new(|m| {
            let v = m.downcast::<i32>().map(|v| *v).unwrap_or(0);
            Box::new(v * 3)
        });
        let handler = Handler::new(|_| Some(Box::new(2_i32)));
        let old = VNode::element("b", vec![on("click", handler.clone())], vec![]).map(mapper.clone());
        let new = VNode::element("i", vec![on("click", handler)], vec![]).map(mapper);
        let (mut tree, root) = mount(&old);
        let root = apply_patches(&mut tree, root, &old, diff(&old, &new), None).unwrap();
        assert_eq!(tree.get(root).unwrap().tag(), Some("i"));
        assert_eq!(tree.get(root).unwrap().tagger_roots.len(), 1);
        let messages = tree.dispatch(root, "click", &());
        assert_eq!(*messages[0].downcast_ref::<i32>().unwrap(), 6);
    }

    #[test]
    fn test_lazy_between_taggers_keeps_both_roots() {
        let handler = Handler::new(|_| Some(Box::new(String::from("h"))));
        let outer = tag("m0");
        let view = |arg: i64, inner: Mapper| {
            let handler = handler.clone();
            VNode::lazy(vec![Identity::Int(arg)], move || {
                VNode::element("b", vec![on("click", handler.clone())], vec![]).map(inner.clone())
            })
            .map(outer.clone())
        };
        let old = view(0, tag("m1"));
        let new = view(1, tag("m2"));

        let (mut tree, root) = mount(&old);
        assert_eq!(tree.get(root).unwrap().tagger_roots.len(), 2);
        assert_eq!(click_trail(&tree, root), ["h>m1>m0"]);

        let root = apply_patches(&mut tree, root, &old, diff(&old, &new), None).unwrap();
        let (fresh, fresh_root) = mount(&new);
        assert_eq!(click_trail(&tree, root), click_trail(&fresh, fresh_root));
        assert_eq!(click_trail(&tree, root), ["h>m2>m0"]);
    }

    #[test]
    fn test_lazy_redraw_below_tagger_keeps_outer_root() {
        let handler = Handler::new(|_| Some(Box::new(String::from("h"))));
        let outer = tag("m0");
        let button = {
            let handler = handler.clone();
            move |tag_name: &str| VNode::element(tag_name, vec![on("click", handler.clone())], vec![])
        };
        let old = {
            let button = button.clone();
            VNode::lazy(vec![Identity::Int(0)], move || button("b").map(tag("m1"))).map(outer.clone())
        };
        let new = VNode::lazy(vec![Identity::Int(1)], move || button("i").map(tag("m2")).map(tag("m1")))
            .map(outer);

        let (mut tree, root) = mount(&old);
        let root = apply_patches(&mut tree, root, &old, diff(&old, &new), None).unwrap();
        assert_eq!(tree.get(root).unwrap().tag(), Some("i"));
        assert_eq!(tree.get(root).unwrap().tagger_roots.len(), 2);
        assert_eq!(click_trail(&tree, root), ["h>m2>m1>m0"]);
    }

    #[test]
    fn test_custom_patch_replaces_node() {
        let render_fn = RenderFn::new(|model, tree| {
            let n = model.downcast_ref::<i32>().copied().unwrap_or(0);
            let span = tree.create_element("span", None);
            let text = tree.create_text(&n.to_string());
            tree.append_child(span, text).unwrap();
            span
        });
        let differ = CustomDiff::new(move |_, new| {
            let n = new.downcast_ref::<i32>().copied()?;
            Some(CustomPatch::new(move |tree, _| {
                let span = tree.create_element("span", None);
                let text = tree.create_text(&n.to_string());
                tree.append_child(span, text).unwrap();
                span
            }))
        });
        let handler = Handler::new(|_| Some(Box::new(String::from("h"))));
        let make = |n: i32| {
            let facts = vec![attribute("data-k", &n.to_string()), on("click", handler.clone())];
            let custom = VNode::custom(facts, Rc::new(n), render_fn.clone(), differ.clone());
            VNode::element("div", vec![], vec![custom.map(tag("row"))])
        };
        let (old, new) = (make(1), make(2));
        let (tree, root) = check(&old, &new);
        assert_eq!(tree.to_html(root), "<div><span data-k=\"2\">2</span></div>");
        assert_eq!(tree.node_count(), 3);

        let span = tree.children(root)[0];
        assert_eq!(tree.get(span).unwrap().tagger_roots.len(), 1);
        assert_eq!(click_trail(&tree, span), ["h>row"]);
    }

    #[test]
    fn test_drifted_tree_reports_missing_child() {
        let old = VNode::element("div", vec![], vec![VNode::text("a")]);
        let new = VNode::element("div", vec![], vec![VNode::text("b")]);
        let mut tree = LiveTree::new();
        let root = tree.create_element("div", None);
        let err = apply_patches(&mut tree, root, &old, diff(&old, &new), None).unwrap_err();
        assert_eq!(err, PatchError::MissingChild { parent: root, position: 0 });
    }

    #[test]
    fn test_out_of_range_patch_is_unresolved() {
        let old = VNode::text("a");
        let (mut tree, root) = mount(&old);
        let stray = vec![Patch::new(5, PatchKind::TextChanged(String::from("x")))];
        let err = apply_patches(&mut tree, root, &old, stray, None).unwrap_err();
        assert_eq!(err, PatchError::Unresolved { index: 5 });
    }
}
