//! Builds the durable summary for one trend group.
//!
//! Everything here is pure aggregation over the group's posts; `now` comes in
//! as a parameter and the `public_id` is assigned at creation so replayed
//! persistence writes stay idempotent. Enrichment (AI titles, categories)
//! overrides the local fields afterwards via [`apply_insights`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Timelike, Utc};
use uuid::Uuid;

use trendscout_core::policy::{
    KEYWORD_COUNT, PEAK_HOUR_COUNT, SAMPLE_POST_COUNT, TOP_HASHTAG_COUNT, VIRAL_SCORE_DIVISOR,
};
use trendscout_core::{MediaKind, Platform, Post, Sentiment};

use crate::classify::DEFAULT_CATEGORY;
use crate::insight::AiInsights;
use crate::types::{
    EngagementPattern, MediaMix, SentimentDistribution, TrendAnalysis, TrendGroup,
};

/// Common words excluded from keyword extraction.
const STOPWORDS: &[&str] = &[
    "this", "that", "with", "have", "from", "they", "will", "what", "when", "your", "about",
    "just", "like", "more", "been", "were", "their", "would", "there", "which", "these", "than",
    "them", "then", "some", "into", "over", "after", "because", "never", "very", "here", "https",
];

/// Summarizes one non-empty group into a [`TrendAnalysis`].
///
/// Suggestions start empty; the pipeline attaches them (enriched or
/// fallback) after summarization.
#[must_use]
pub fn summarize_group(group: &TrendGroup, now: DateTime<Utc>) -> TrendAnalysis {
    let posts = &group.posts;
    let count = posts.len().max(1);

    let engagement = engagement_pattern(posts, count);
    let sentiment = sentiment_distribution(posts, count);
    let media_mix = media_mix(posts, count);
    let top_hashtags = ranked_hashtags(posts);
    let keywords = extract_keywords(posts, &top_hashtags);
    let category = majority_category(posts);
    let viral_score = (engagement.average_score / VIRAL_SCORE_DIVISOR).min(100.0);

    let platforms: Vec<Platform> = posts
        .iter()
        .map(|p| p.platform)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut sample_posts: Vec<Post> = posts.clone();
    sample_posts.sort_by(|a, b| {
        b.engagement_score
            .cmp(&a.engagement_score)
            .then_with(|| a.source_post_id.cmp(&b.source_post_id))
    });
    sample_posts.truncate(SAMPLE_POST_COUNT);

    let sentiment_word = dominant_sentiment(sentiment);
    let title = truncate_chars(&format!("{category} Trend: {}", group.key), 60);
    let description = truncate_chars(
        &format!(
            "{} trending {} posts around \"{}\" with {sentiment_word} sentiment",
            posts.len(),
            category.to_lowercase(),
            group.key,
        ),
        200,
    );

    TrendAnalysis {
        public_id: Uuid::new_v4(),
        group_key: group.key.clone(),
        title,
        description,
        category,
        platforms,
        top_hashtags,
        keywords,
        engagement,
        media_mix,
        sentiment,
        viral_score,
        post_count: posts.len(),
        sample_posts,
        suggestions: Vec::new(),
        created_at: now,
    }
}

/// Overrides the local summary fields with enrichment output.
///
/// Blank AI fields leave the local values in place; content themes merge into
/// the keyword list up to its cap.
pub fn apply_insights(analysis: &mut TrendAnalysis, insights: &AiInsights) {
    if !insights.trend_title.trim().is_empty() {
        analysis.title = truncate_chars(&insights.trend_title, 60);
    }
    if !insights.trend_description.trim().is_empty() {
        analysis.description = truncate_chars(&insights.trend_description, 200);
    }
    if !insights.category.trim().is_empty() {
        analysis.category = insights.category.trim().to_owned();
    }
    for theme in &insights.content_themes {
        let theme = theme.trim_start_matches('#').trim().to_lowercase();
        if !theme.is_empty() && !analysis.keywords.contains(&theme) {
            analysis.keywords.push(theme);
        }
    }
    analysis.keywords.truncate(KEYWORD_COUNT);
}

#[allow(clippy::cast_precision_loss)]
fn engagement_pattern(posts: &[Post], count: usize) -> EngagementPattern {
    let mut total_likes = 0u64;
    let mut total_shares = 0u64;
    let mut total_comments = 0u64;
    let mut total_quotes = 0u64;
    let mut total_views = 0u64;
    let mut score_sum = 0u64;
    let mut hour_counts = [0usize; 24];

    for post in posts {
        total_likes = total_likes.saturating_add(post.engagement.likes);
        total_shares = total_shares.saturating_add(post.engagement.shares);
        total_comments = total_comments.saturating_add(post.engagement.comments);
        total_quotes = total_quotes.saturating_add(post.engagement.quotes);
        total_views = total_views.saturating_add(post.engagement.views);
        score_sum = score_sum.saturating_add(post.engagement_score);
        hour_counts[post.published_at.hour() as usize] += 1;
    }

    let mut hours: Vec<u32> = (0..24u32).filter(|h| hour_counts[*h as usize] > 0).collect();
    hours.sort_by(|a, b| {
        hour_counts[*b as usize]
            .cmp(&hour_counts[*a as usize])
            .then_with(|| a.cmp(b))
    });
    hours.truncate(PEAK_HOUR_COUNT);

    EngagementPattern {
        total_likes,
        total_shares,
        total_comments,
        total_quotes,
        total_views,
        average_score: score_sum as f64 / count as f64,
        peak_hours: hours,
    }
}

#[allow(clippy::cast_precision_loss)]
fn sentiment_distribution(posts: &[Post], count: usize) -> SentimentDistribution {
    let mut positive = 0usize;
    let mut negative = 0usize;
    for post in posts {
        match post.sentiment {
            Some(Sentiment::Positive) => positive += 1,
            Some(Sentiment::Negative) => negative += 1,
            Some(Sentiment::Neutral) | None => {}
        }
    }

    let positive = positive as f64 / count as f64;
    let negative = negative as f64 / count as f64;
    SentimentDistribution {
        positive,
        negative,
        // Forced remainder keeps the three summing to exactly 1.0.
        neutral: 1.0 - positive - negative,
    }
}

#[allow(clippy::cast_precision_loss)]
fn media_mix(posts: &[Post], count: usize) -> MediaMix {
    let mut image = 0usize;
    let mut video = 0usize;
    for post in posts {
        match post.media_kind() {
            MediaKind::Image => image += 1,
            MediaKind::Video => video += 1,
            MediaKind::Text => {}
        }
    }

    let image = image as f64 / count as f64;
    let video = video as f64 / count as f64;
    MediaMix {
        text: 1.0 - image - video,
        image,
        video,
    }
}

/// Hashtags ranked by frequency desc, ties alphabetical, capped.
fn ranked_hashtags(posts: &[Post]) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for post in posts {
        for tag in &post.hashtags {
            *counts.entry(tag.as_str()).or_default() += 1;
        }
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(TOP_HASHTAG_COUNT)
        .map(|(tag, _)| tag.to_owned())
        .collect()
}

/// Hashtags first, then frequent content words, capped at [`KEYWORD_COUNT`].
fn extract_keywords(posts: &[Post], top_hashtags: &[String]) -> Vec<String> {
    let mut keywords: Vec<String> = top_hashtags.to_vec();

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for post in posts {
        for word in post.content.split_whitespace() {
            let w = word
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if w.chars().count() >= 4 && !STOPWORDS.contains(&w.as_str()) {
                *counts.entry(w).or_default() += 1;
            }
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    for (word, _) in ranked {
        if keywords.len() >= KEYWORD_COUNT {
            break;
        }
        if !keywords.contains(&word) {
            keywords.push(word);
        }
    }

    keywords.truncate(KEYWORD_COUNT);
    keywords
}

/// Mode of the per-post categories, ties alphabetical.
fn majority_category(posts: &[Post]) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for post in posts {
        let category = post.category.as_deref().unwrap_or(DEFAULT_CATEGORY);
        *counts.entry(category).or_default() += 1;
    }

    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map_or_else(|| DEFAULT_CATEGORY.to_owned(), |(c, _)| c.to_owned())
}

fn dominant_sentiment(distribution: SentimentDistribution) -> &'static str {
    if distribution.positive > distribution.negative && distribution.positive > distribution.neutral
    {
        "positive"
    } else if distribution.negative > distribution.positive
        && distribution.negative > distribution.neutral
    {
        "negative"
    } else {
        "neutral"
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_owned()
    } else {
        s.chars().take(max).collect()
    }
}
