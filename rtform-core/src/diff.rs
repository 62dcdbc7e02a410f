//! Edit operations and the diff/cursor-transform capability.
//!
//! The reconciler only needs two things from a diff engine: the edit between
//! two texts, and where a position in the old text ends up in the new one.
//! [`PrefixSuffixDiff`] is the default engine: it describes the change as a
//! single splice found by trimming the common prefix and suffix.
//!
//! All offsets are in `char`s, never bytes.

use serde::{Deserialize, Serialize};

/// A single splice: remove `remove` chars at `offset`, then insert `insert`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EditOperation {
    pub offset: usize,
    pub remove: usize,
    pub insert: String,
}

impl EditOperation {
    pub fn new(offset: usize, remove: usize, insert: impl Into<String>) -> Self {
        Self {
            offset,
            remove,
            insert: insert.into(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.remove == 0 && self.insert.is_empty()
    }

    /// Length of the inserted text in chars.
    pub fn insert_len(&self) -> usize {
        self.insert.chars().count()
    }

    /// Apply to `text`. `None` if the splice falls outside the text.
    pub fn apply(&self, text: &str) -> Option<String> {
        let chars: Vec<char> = text.chars().collect();
        let end = self.offset.checked_add(self.remove)?;
        if end > chars.len() {
            return None;
        }
        let mut out = String::with_capacity(text.len() + self.insert.len());
        out.extend(&chars[..self.offset]);
        out.push_str(&self.insert);
        out.extend(&chars[end..]);
        Some(out)
    }

    /// Map a position in the pre-edit text to the post-edit text.
    ///
    /// Positions before or at the splice stay put; positions after the
    /// removed range shift by the net length change; positions inside the
    /// removed range land just after the inserted text.
    pub fn transform_position(&self, position: usize) -> usize {
        if position <= self.offset {
            position
        } else if position >= self.offset + self.remove {
            position - self.remove + self.insert_len()
        } else {
            self.offset + self.insert_len()
        }
    }

    /// Rewrite this operation so it applies after `prior`, where both were
    /// computed against the same base text.
    pub fn rebase(&self, prior: &EditOperation) -> EditOperation {
        let start = prior.transform_position(self.offset);
        let end = prior.transform_position(self.offset + self.remove);
        EditOperation {
            offset: start,
            remove: end.saturating_sub(start),
            insert: self.insert.clone(),
        }
    }
}

/// Diff and cursor-transform capability consumed by the reconciler.
pub trait DiffEngine {
    /// Minimal edit turning `old` into `new`.
    fn diff(&self, old: &str, new: &str) -> EditOperation;

    /// Where `offset` in the old text lands after `op`.
    fn transform_cursor(&self, offset: usize, op: &EditOperation) -> usize {
        op.transform_position(offset)
    }
}

/// Single-splice diff over the common prefix and suffix.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixSuffixDiff;

impl DiffEngine for PrefixSuffixDiff {
    fn diff(&self, old: &str, new: &str) -> EditOperation {
        let old: Vec<char> = old.chars().collect();
        let new: Vec<char> = new.chars().collect();

        let prefix = old
            .iter()
            .zip(new.iter())
            .take_while(|(a, b)| a == b)
            .count();

        // The suffix may not overlap the prefix in either text.
        let max_suffix = old.len().min(new.len()) - prefix;
        let suffix = old
            .iter()
            .rev()
            .zip(new.iter().rev())
            .take(max_suffix)
            .take_while(|(a, b)| a == b)
            .count();

        EditOperation {
            offset: prefix,
            remove: old.len() - prefix - suffix,
            insert: new[prefix..new.len() - suffix].iter().collect(),
        }
    }
}
