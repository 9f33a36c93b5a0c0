//! ALICE-VDOM: Virtual Tree Reconciliation
//!
//! Don't rebuild the tree, patch it.
//!
//! Each render cycle produces an immutable snapshot of the view. The engine
//! diffs it against the previous snapshot and applies the minimal set of
//! edits to the live tree in place:
//! - Pre-order indexed patches, resolved to live nodes in a single pass
//! - Keyed children with move detection (swap, insert, remove, replace)
//! - Lazy thunks skipped when their arguments are identical
//! - Message mapping through tagger chains, re-routable without touching listeners
//! - Custom nodes with caller-supplied render and diff
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`vnode`] | Immutable virtual nodes, facts, and their constructors |
//! | [`live`] | Live tree arena with structural primitives and event dispatch |
//! | [`events`] | Event roots for tagger chains, with mark-sweep collection |
//! | [`render`] | Build live nodes from snapshots, and read them back |
//! | [`diff`] | Snapshot diff engine producing indexed patches |
//! | [`keyed`] | Keyed children reconciliation with move detection |
//! | [`patch`] | Patch address resolution and application |
//! | [`mount`] | Session driving a live tree through successive snapshots |
//! | [`error`] | Validation and patch consistency errors |
//!
//! # Quick Start
//!
//! ```
//! use alice_vdom::{class, diff, Mount, PatchKind, VNode};
//!
//! let view = |greeting: &str| {
//!     VNode::element("div", vec![class("a")], vec![VNode::text(greeting)])
//! };
//!
//! // The only change is the text child at pre-order index 1
//! let patches = diff(&view("hi"), &view("bye"));
//! assert_eq!(patches.len(), 1);
//! assert_eq!(patches[0].index, 1);
//! assert!(matches!(&patches[0].kind, PatchKind::TextChanged(t) if t == "bye"));
//!
//! // A mount keeps the live tree in step with each new snapshot
//! let mut mount = Mount::new(view("hi"));
//! mount.update(view("bye")).unwrap();
//! assert_eq!(mount.to_html(), "<div class=\"a\">bye</div>");
//! ```
//!
//! Author: Moroya Sakamoto

pub mod diff;
pub mod error;
pub mod events;
pub mod keyed;
pub mod live;
pub mod mount;
pub mod patch;
pub mod render;
pub mod vnode;

pub use diff::{count_patches, diff, diff_facts, FactsDiff, NsChange, Patch, PatchKind, Target};
pub use error::{PatchError, Result, VNodeError};
pub use events::{collect_event_roots, dry_run, EventRoot, EventRootId, EventRoots, GcResult};
pub use keyed::{diff_keyed, EntryStatus, KeyedEntry, KeyedInsert, KeyedPatch, MoveData};
pub use live::{Listener, LiveId, LiveKind, LiveNode, LiveTree};
pub use mount::{Mount, UpdateStats};
pub use patch::apply_patches;
pub use render::{apply_facts, apply_facts_diff, render, virtualize};
pub use vnode::{
    attribute, attribute_ns, class, on, organize_facts, property, style, CustomDiff, CustomPatch,
    Fact, Facts, Handler, Identity, Mapper, Mappers, Message, NsValue, PropValue, RenderFn, VNode,
    VNodeKind,
};
