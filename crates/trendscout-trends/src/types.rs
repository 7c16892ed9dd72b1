//! Trend-analysis data model.
//!
//! [`TrendGroup`] is the transient clustering output; [`TrendAnalysis`] is the
//! durable summary persisted per group per discovery pass. Analyses are fresh
//! records every pass, identified by a `public_id` assigned at creation so a
//! retried persistence write stays idempotent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use trendscout_core::{Platform, Post};

/// One cluster of related posts, keyed by the shared signal that grouped them.
#[derive(Debug, Clone)]
pub struct TrendGroup {
    pub key: String,
    pub posts: Vec<Post>,
}

/// Per-type engagement totals and publish-time shape for one trend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementPattern {
    pub total_likes: u64,
    pub total_shares: u64,
    pub total_comments: u64,
    pub total_quotes: u64,
    pub total_views: u64,
    pub average_score: f64,
    /// UTC publish hours with the most posts, best first.
    pub peak_hours: Vec<u32>,
}

/// Share of posts per media kind; the three fractions sum to 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MediaMix {
    pub text: f64,
    pub image: f64,
    pub video: f64,
}

/// Three-way sentiment split; the probabilities sum to 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SentimentDistribution {
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
}

/// One actionable posting idea derived from a trend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentSuggestion {
    /// `reel`, `post`, `story`, or `carousel`.
    pub content_type: String,
    pub suggested_content: String,
    pub suggested_hashtags: Vec<String>,
    pub confidence_score: f64,
    pub viral_potential: String,
    pub target_audience: String,
}

/// Durable summary of one trend group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub public_id: Uuid,
    pub group_key: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub platforms: Vec<Platform>,
    pub top_hashtags: Vec<String>,
    pub keywords: Vec<String>,
    pub engagement: EngagementPattern,
    pub media_mix: MediaMix,
    pub sentiment: SentimentDistribution,
    /// 0 to 100, capped normalization of the group's average engagement score.
    pub viral_score: f64,
    pub post_count: usize,
    pub sample_posts: Vec<Post>,
    pub suggestions: Vec<ContentSuggestion>,
    pub created_at: DateTime<Utc>,
}
