//! Trend analysis pipeline for TrendScout.
//!
//! Takes normalized posts from the source collectors through quality
//! filtering, identity dedup, keyword classification, and clustering, then
//! summarizes each surviving group into a trend analysis. An optional HTTP
//! insight service enriches summaries and generates content suggestions; a
//! deterministic rule-based generator covers every failure of that service.
//! Also computes the lookback dashboard snapshot over persisted posts.

pub mod classify;
pub mod cluster;
pub mod dashboard;
pub mod dedup;
pub mod error;
pub mod insight;
pub mod pipeline;
pub mod quality;
pub mod summarize;
pub mod types;

pub use classify::{Classifier, KeywordClassifier, DEFAULT_CATEGORY};
pub use cluster::cluster_posts;
pub use dashboard::{build_dashboard, DashboardSnapshot, ViralityTier};
pub use dedup::{dedup_posts, DedupOutcome};
pub use error::TrendError;
pub use insight::{fallback_suggestions, AiInsights, InsightClient};
pub use pipeline::{analyze_posts, discovery_gate, AnalysisOutcome};
pub use quality::{filter_posts, passes_quality};
pub use summarize::summarize_group;
pub use types::{ContentSuggestion, TrendAnalysis, TrendGroup};
