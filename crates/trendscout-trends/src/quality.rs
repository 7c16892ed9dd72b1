//! Pre-pipeline quality gate.
//!
//! Rejects posts that can never be a useful trend signal before any scoring,
//! clustering, or persistence happens. Provider-specific junk (NSFW, pinned)
//! is already dropped at normalize time; this gate applies the generic rules.

use trendscout_core::policy::{INVALID_AUTHORS, MIN_CONTENT_CHARS};
use trendscout_core::Post;

/// Whether a post clears the generic quality rules.
///
/// A post fails on any of: content shorter than [`MIN_CONTENT_CHARS`] after
/// trimming, a missing/deleted/bot author, or zero across every engagement
/// counter.
#[must_use]
pub fn passes_quality(post: &Post) -> bool {
    if post.content.trim().chars().count() < MIN_CONTENT_CHARS {
        return false;
    }

    let author = post.author.username.trim().to_lowercase();
    if INVALID_AUTHORS.contains(&author.as_str()) {
        return false;
    }

    post.engagement.has_any_signal()
}

/// Drops failing posts, returning the survivors and the rejected count.
pub fn filter_posts(posts: Vec<Post>) -> (Vec<Post>, usize) {
    let input = posts.len();
    let kept: Vec<Post> = posts.into_iter().filter(passes_quality).collect();
    let rejected = input - kept.len();
    if rejected > 0 {
        tracing::debug!(rejected, kept = kept.len(), "quality filter dropped posts");
    }
    (kept, rejected)
}
