//! Platform fetchers for trend discovery.
//!
//! Pulls candidate posts from Reddit (paginated OAuth listing) and X (single
//! recent-search call), normalizes them into the canonical `Post` shape, and
//! enforces per-platform request budgets so providers are never over-called.
//! Collection is best-effort: a failing source degrades the run instead of
//! aborting it.

pub mod budget;
pub mod error;

mod backoff;
mod collect;
mod reddit;
mod twitter;

pub use budget::{
    shared, Acquire, PlatformRules, RateBudgetConfig, RateBudgetTracker, SharedBudget, WindowRule,
};
pub use collect::{
    collect_posts, CollectedPosts, FetchOutcome, SourceReport, SourceSet, SourceStatus,
};
pub use error::SourceError;
pub use reddit::{RedditConfig, RedditSource};
pub use twitter::{XConfig, XSource};
