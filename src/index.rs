//! Post index — flat by-id lookup over a fetched thread.
//!
//! DESIGN
//! ======
//! Built in a single pass over the post list as returned by the backend.
//! Nesting is expressed by parent references, so the index is always flat;
//! a reply map is derived once at build time for rendering walks.
//!
//! ERROR HANDLING
//! ==============
//! Duplicate post ids are a data anomaly, not a failure: the later post
//! wins and a warning is logged.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::model::{Post, PostId};

#[cfg(test)]
#[path = "index_test.rs"]
mod tests;

// =============================================================================
// POST INDEX
// =============================================================================

/// Mapping from post id to post for one thread snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostIndex {
    posts: HashMap<PostId, Post>,
    /// Reply ids keyed by parent, sorted ascending.
    replies: HashMap<PostId, Vec<PostId>>,
}

/// One row of a rendering walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutEntry {
    pub post: PostId,
    /// 0 for roots, clamped to the depth limit of the walk.
    pub depth: u8,
}

impl PostIndex {
    /// Index `posts` by id. Later duplicates replace earlier ones.
    #[must_use]
    pub fn build(posts: &[Post]) -> Self {
        let mut by_id: HashMap<PostId, Post> = HashMap::with_capacity(posts.len());
        for post in posts {
            if by_id.insert(post.id, post.clone()).is_some() {
                warn!(post_id = %post.id, "duplicate post id in thread; keeping last");
            }
        }

        let mut replies: HashMap<PostId, Vec<PostId>> = HashMap::new();
        for post in by_id.values() {
            if let Some(parent) = post.parent {
                replies.entry(parent).or_default().push(post.id);
            }
        }
        for ids in replies.values_mut() {
            ids.sort_unstable();
        }

        Self { posts: by_id, replies }
    }

    #[must_use]
    pub fn get(&self, id: PostId) -> Option<&Post> {
        self.posts.get(&id)
    }

    #[must_use]
    pub fn contains(&self, id: PostId) -> bool {
        self.posts.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.posts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Post ids in arbitrary order.
    pub fn ids(&self) -> impl Iterator<Item = PostId> + '_ {
        self.posts.keys().copied()
    }

    /// Direct replies to `id`, ordered by post id.
    #[must_use]
    pub fn replies(&self, id: PostId) -> &[PostId] {
        self.replies.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Top-level posts of the thread.
    ///
    /// When the backend declares `declared` roots those are used (minus any
    /// that are not in the index). Otherwise every post without a parent, or
    /// whose parent is missing from the index, is a root.
    #[must_use]
    pub fn roots(&self, declared: &[PostId]) -> Vec<PostId> {
        if !declared.is_empty() {
            return declared.iter().copied().filter(|id| self.contains(*id)).collect();
        }
        let mut roots: Vec<PostId> = self
            .posts
            .values()
            .filter(|post| post.parent.map_or(true, |parent| !self.contains(parent)))
            .map(|post| post.id)
            .collect();
        roots.sort_unstable();
        roots
    }

    /// Depth-first render order starting at `roots`.
    ///
    /// Depth is clamped to `max_depth - 1`: replies nested deeper than the
    /// limit render flat at the deepest permitted level. A `max_depth` of 0
    /// is treated as 1. Each post is emitted at most once, so parent cycles
    /// terminate.
    #[must_use]
    pub fn layout(&self, roots: &[PostId], max_depth: u8) -> Vec<LayoutEntry> {
        let deepest = max_depth.max(1) - 1;
        let mut out = Vec::with_capacity(self.posts.len());
        let mut seen: HashSet<PostId> = HashSet::with_capacity(self.posts.len());
        let mut stack: Vec<(PostId, u8)> = roots.iter().rev().map(|id| (*id, 0)).collect();

        while let Some((id, level)) = stack.pop() {
            if !self.contains(id) || !seen.insert(id) {
                continue;
            }
            out.push(LayoutEntry { post: id, depth: level.min(deepest) });
            let next = level.saturating_add(1);
            stack.extend(self.replies(id).iter().rev().map(|child| (*child, next)));
        }

        out
    }
}
