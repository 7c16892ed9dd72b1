//! Identity-based deduplication.
//!
//! Identity is the `(platform, source_post_id)` pair and nothing else. Two
//! layers: a per-run seen-set drops repeat occurrences inside one batch, and
//! a caller-supplied set of already-persisted identities routes known posts
//! to the refresh path instead of counting them as new discoveries.

use std::collections::HashSet;

use trendscout_core::{Post, PostIdentity};

/// Result of one dedup pass.
#[derive(Debug)]
pub struct DedupOutcome {
    /// Accepted posts, first occurrence per identity, input order preserved.
    pub posts: Vec<Post>,
    /// Accepted posts whose identity was not already persisted.
    pub new_posts: usize,
    /// Repeat occurrences dropped within this batch.
    pub duplicates: usize,
}

/// Deduplicates a batch against itself and against `known` identities.
///
/// Idempotent: feeding the same batch twice (with the first pass's accepted
/// identities added to `known`) yields the same accepted set and zero new
/// posts the second time.
#[must_use]
pub fn dedup_posts(posts: Vec<Post>, known: &HashSet<PostIdentity>) -> DedupOutcome {
    let mut seen: HashSet<PostIdentity> = HashSet::with_capacity(posts.len());
    let mut accepted: Vec<Post> = Vec::with_capacity(posts.len());
    let mut new_posts = 0usize;
    let mut duplicates = 0usize;

    for post in posts {
        let identity = post.identity();
        if !seen.insert(identity.clone()) {
            duplicates += 1;
            continue;
        }
        if !known.contains(&identity) {
            new_posts += 1;
        }
        accepted.push(post);
    }

    if duplicates > 0 {
        tracing::debug!(duplicates, accepted = accepted.len(), "dropped in-batch duplicates");
    }

    DedupOutcome {
        posts: accepted,
        new_posts,
        duplicates,
    }
}
