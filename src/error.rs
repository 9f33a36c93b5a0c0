//! Error types
//!
//! Structural mismatches are never errors; they become `Redraw` patches.
//! What remains is input validation on keyed children and internal
//! consistency failures while patching, which mean the live tree and the
//! old snapshot have drifted apart or the engine itself is defective.
//!
//! Author: Moroya Sakamoto

use crate::live::LiveId;

/// Rejected virtual node input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VNodeError {
    /// A keyed child list used the same key more than twice.
    #[error("key {key:?} appears {count} times in keyed children (at most 2 allowed)")]
    DuplicateKey { key: String, count: usize },
}

/// Internal consistency failure during patch application.
///
/// None of these are recoverable by retrying: diff and patch are pure
/// functions of their inputs. The host should treat the mount as corrupt
/// and remount from a fresh render.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    /// A patch was never matched to a live node during address resolution.
    #[error("patch at index {index} was never resolved to a live node")]
    Unresolved { index: usize },

    /// The old snapshot has a child the live tree does not.
    #[error("live node {parent} has no child at position {position}")]
    MissingChild { parent: LiveId, position: usize },

    /// A live id did not exist in the arena.
    #[error("live node {0} does not exist")]
    MissingNode(LiveId),

    /// A thunk patch was addressed to something other than a thunk.
    #[error("thunk patch at index {index} targets a non-thunk node")]
    NotAThunk { index: usize },

    /// A tagger in the old snapshot has no event root on its live node.
    #[error("live node {node} has no tagger root at depth {depth}")]
    MissingTaggerRoot { node: LiveId, depth: usize },

    /// A keyed move could not find the live node it was meant to reuse.
    #[error("keyed move for entry {entry} has no live node")]
    DanglingMove { entry: usize },
}

pub type Result<T> = std::result::Result<T, PatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_key_message() {
        let err = VNodeError::DuplicateKey {
            key: String::from("row-1"),
            count: 3,
        };
        assert_eq!(
            err.to_string(),
            "key \"row-1\" appears 3 times in keyed children (at most 2 allowed)"
        );
    }

    #[test]
    fn test_patch_error_messages() {
        assert_eq!(
            PatchError::MissingChild { parent: 4, position: 2 }.to_string(),
            "live node 4 has no child at position 2"
        );
        assert_eq!(
            PatchError::Unresolved { index: 7 }.to_string(),
            "patch at index 7 was never resolved to a live node"
        );
        assert_eq!(
            PatchError::MissingTaggerRoot { node: 3, depth: 1 }.to_string(),
            "live node 3 has no tagger root at depth 1"
        );
    }
}
