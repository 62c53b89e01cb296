//! Character-level text patches used to rebase a staged edit onto content
//! that drifted since the edit was proposed.
//!
//! A [`Patch`] is built from a `before -> after` pair. Each hunk keeps a few
//! characters of surrounding context and is located in the target near the
//! offset it had in `before`. Context may shrink when the surroundings
//! changed, but at least half of it has to survive, and text the hunk
//! deletes must be found verbatim.

use similar::{DiffTag, TextDiff};
use tracing::debug;

const CONTEXT_CHARS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    Applied(String),
    /// `hunk` is the index of the first hunk that could not be placed.
    Failed { hunk: usize },
}

impl PatchOutcome {
    pub fn applied(self) -> Option<String> {
        match self {
            PatchOutcome::Applied(text) => Some(text),
            PatchOutcome::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Hunk {
    old_start: usize,
    old: Vec<char>,
    new: Vec<char>,
    prefix: usize,
    suffix: usize,
}

#[derive(Debug, Clone, Copy)]
struct Placement {
    pos: usize,
    len: usize,
    trim_prefix: usize,
    trim_suffix: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Patch {
    hunks: Vec<Hunk>,
}

impl Patch {
    pub fn between(before: &str, after: &str) -> Self {
        let old: Vec<char> = before.chars().collect();
        let new: Vec<char> = after.chars().collect();
        let diff = TextDiff::from_chars(before, after);

        let hunks = diff
            .grouped_ops(CONTEXT_CHARS)
            .into_iter()
            .filter_map(|group| {
                let first = group.first()?;
                let last = group.last()?;
                let old_range = first.old_range().start..last.old_range().end;
                let new_range = first.new_range().start..last.new_range().end;

                let prefix = match first.tag() {
                    DiffTag::Equal => first.old_range().len(),
                    _ => 0,
                };
                let suffix = match last.tag() {
                    DiffTag::Equal => last.old_range().len(),
                    _ => 0,
                };

                Some(Hunk {
                    old_start: old_range.start,
                    old: old[old_range].to_vec(),
                    new: new[new_range].to_vec(),
                    prefix,
                    suffix,
                })
            })
            .collect();

        Self { hunks }
    }

    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }

    pub fn hunk_count(&self) -> usize {
        self.hunks.len()
    }

    /// Applies every hunk in order. The patch either applies completely or
    /// fails; a partial result is never returned.
    pub fn apply(&self, target: &str) -> PatchOutcome {
        let mut text: Vec<char> = target.chars().collect();
        let mut delta: isize = 0;
        let mut cursor = 0usize;

        for (index, hunk) in self.hunks.iter().enumerate() {
            let Some(found) = hunk.locate(&text, cursor, delta) else {
                debug!(hunk = index, total = self.hunks.len(), "patch hunk did not apply");
                return PatchOutcome::Failed { hunk: index };
            };

            let replacement = &hunk.new[found.trim_prefix..hunk.new.len() - found.trim_suffix];
            text.splice(
                found.pos..found.pos + found.len,
                replacement.iter().copied(),
            );

            cursor = found.pos + replacement.len();
            let old_end = hunk.old_start + hunk.old.len() - found.trim_suffix;
            delta = cursor as isize - old_end as isize;
        }

        PatchOutcome::Applied(text.into_iter().collect())
    }
}

/// Replays the `before -> after` edit on top of `target`.
pub fn rebase(before: &str, after: &str, target: &str) -> PatchOutcome {
    Patch::between(before, after).apply(target)
}

impl Hunk {
    fn locate(&self, text: &[char], cursor: usize, delta: isize) -> Option<Placement> {
        // Only an empty target can take an edit that had nothing to anchor on.
        if self.old.is_empty() {
            return text.is_empty().then_some(Placement {
                pos: 0,
                len: 0,
                trim_prefix: 0,
                trim_suffix: 0,
            });
        }

        let context = self.prefix + self.suffix;
        let anchor = context.div_ceil(2);

        for trim in 0..=self.prefix.max(self.suffix) {
            let trim_prefix = trim.min(self.prefix);
            let trim_suffix = trim.min(self.suffix);
            if context - trim_prefix - trim_suffix < anchor {
                break;
            }
            let needle = &self.old[trim_prefix..self.old.len() - trim_suffix];
            if needle.is_empty() {
                break;
            }

            let expected = shifted(self.old_start + trim_prefix, delta);
            if let Some(pos) = nearest(text, needle, cursor, expected) {
                return Some(Placement {
                    pos,
                    len: needle.len(),
                    trim_prefix,
                    trim_suffix,
                });
            }
        }

        None
    }
}

fn shifted(base: usize, delta: isize) -> usize {
    (base as isize + delta).max(0) as usize
}

fn nearest(text: &[char], needle: &[char], from: usize, expected: usize) -> Option<usize> {
    if from > text.len() || needle.len() > text.len() - from {
        return None;
    }

    text[from..]
        .windows(needle.len())
        .enumerate()
        .filter(|(_, window)| *window == needle)
        .map(|(offset, _)| from + offset)
        .min_by_key(|pos| pos.abs_diff(expected))
}
