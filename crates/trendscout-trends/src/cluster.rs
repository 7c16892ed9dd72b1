//! Groups posts into trend candidates by shared signals.
//!
//! Candidate keys are tried in fixed priority order: primary hashtag, then
//! source community, then classifier category. The category backstop means
//! every post lands somewhere, and grouping over a `BTreeMap` keeps the
//! result deterministic for identical input.

use std::collections::BTreeMap;

use trendscout_core::policy::{FALLBACK_GROUP_COUNT, MIN_GROUP_SIZE};
use trendscout_core::Post;

use crate::classify::DEFAULT_CATEGORY;
use crate::types::TrendGroup;

/// The first non-empty candidate key for a post.
fn group_key(post: &Post) -> String {
    if let Some(tag) = post.primary_hashtag() {
        return tag.to_owned();
    }
    if let Some(community) = post.community.as_deref() {
        let community = community.trim();
        if !community.is_empty() {
            return community.to_lowercase();
        }
    }
    post.category
        .clone()
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_owned())
}

/// Clusters posts into trend groups.
///
/// Groups below [`MIN_GROUP_SIZE`] are dropped, unless no group qualifies, in
/// which case the [`FALLBACK_GROUP_COUNT`] largest survive so a non-empty
/// input always yields at least one group. Output is ordered by size
/// descending, ties broken by key.
#[must_use]
pub fn cluster_posts(posts: &[Post]) -> Vec<TrendGroup> {
    let mut buckets: BTreeMap<String, Vec<Post>> = BTreeMap::new();
    for post in posts {
        buckets
            .entry(group_key(post))
            .or_default()
            .push(post.clone());
    }

    let mut groups: Vec<TrendGroup> = buckets
        .into_iter()
        .map(|(key, posts)| TrendGroup { key, posts })
        .collect();
    groups.sort_by(|a, b| {
        b.posts
            .len()
            .cmp(&a.posts.len())
            .then_with(|| a.key.cmp(&b.key))
    });

    if groups.iter().any(|g| g.posts.len() >= MIN_GROUP_SIZE) {
        groups.retain(|g| g.posts.len() >= MIN_GROUP_SIZE);
    } else if !groups.is_empty() {
        groups.truncate(FALLBACK_GROUP_COUNT);
        tracing::debug!(
            kept = groups.len(),
            "no group met the size floor, keeping the largest"
        );
    }

    groups
}
