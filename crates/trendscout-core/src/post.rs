//! Canonical post model shared by every pipeline stage.
//!
//! A [`Post`] is the normalized shape every source maps into. Its identity is
//! the `(platform, source_post_id)` pair, never derived from content text,
//! and that pair alone drives deduplication and persistence upserts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// External content provider a post was discovered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Reddit,
    X,
}

impl Platform {
    /// Stable lowercase form used in the database and API JSON.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Reddit => "reddit",
            Platform::X => "x",
        }
    }

    /// All platforms, in the order sources are fetched.
    #[must_use]
    pub fn all() -> &'static [Platform] {
        &[Platform::Reddit, Platform::X]
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reddit" => Ok(Platform::Reddit),
            "x" | "twitter" => Ok(Platform::X),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

/// The sole deduplication identity: source plus the source's own post ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostIdentity {
    pub platform: Platform,
    pub source_post_id: String,
}

impl std::fmt::Display for PostIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.platform, self.source_post_id)
    }
}

/// Post author as reported by the source. Follower count may legitimately be
/// zero when the provider does not expose it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub username: String,
    pub display_name: String,
    pub followers: u64,
}

/// Raw engagement counters. Missing provider fields normalize to zero rather
/// than propagating nulls into scoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
    pub likes: u64,
    pub shares: u64,
    pub comments: u64,
    pub quotes: u64,
    pub views: u64,
}

impl Engagement {
    /// True when at least one counter is non-zero.
    #[must_use]
    pub fn has_any_signal(&self) -> bool {
        self.likes > 0 || self.shares > 0 || self.comments > 0 || self.quotes > 0 || self.views > 0
    }
}

/// Three-way sentiment label assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

impl std::str::FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "negative" => Ok(Sentiment::Negative),
            "neutral" => Ok(Sentiment::Neutral),
            other => Err(format!("unknown sentiment: {other}")),
        }
    }
}

/// Coarse media classification used for trend media mixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Text,
    Image,
    Video,
}

impl MediaKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Text => "text",
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

/// A normalized content item.
///
/// Built by a source normalizer, enriched by the quality filter, scorer, and
/// classifier, then treated as immutable for the rest of the discovery run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub platform: Platform,
    pub source_post_id: String,
    pub author: Author,
    pub content: String,
    /// Canonical permalink back to the source.
    pub url: String,
    /// Source-specific community (subreddit); `None` where the concept does
    /// not exist.
    pub community: Option<String>,
    pub media_urls: Vec<String>,
    /// Lowercased, deduplicated, without the leading `#`.
    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,
    pub engagement: Engagement,
    /// Derived virality score; see [`crate::score::engagement_score`].
    pub engagement_score: u64,
    pub published_at: DateTime<Utc>,
    /// Wall-clock ingestion time. Invariant: `published_at <= discovered_at`.
    pub discovered_at: DateTime<Utc>,
    pub category: Option<String>,
    pub sentiment: Option<Sentiment>,
}

impl Post {
    /// The composite dedup identity.
    #[must_use]
    pub fn identity(&self) -> PostIdentity {
        PostIdentity {
            platform: self.platform,
            source_post_id: self.source_post_id.clone(),
        }
    }

    /// First hashtag, if any; the highest-priority cluster key candidate.
    #[must_use]
    pub fn primary_hashtag(&self) -> Option<&str> {
        self.hashtags.first().map(String::as_str).filter(|h| !h.is_empty())
    }

    /// Classifies the post's dominant media kind from its media URLs.
    ///
    /// Any video-looking URL wins over images; no media URLs means text.
    #[must_use]
    pub fn media_kind(&self) -> MediaKind {
        if self.media_urls.is_empty() {
            return MediaKind::Text;
        }
        let is_video = |url: &str| {
            let lower = url.to_lowercase();
            lower.ends_with(".mp4")
                || lower.ends_with(".mov")
                || lower.ends_with(".webm")
                || lower.contains("/video/")
                || lower.contains("v.redd.it")
        };
        if self.media_urls.iter().any(|u| is_video(u)) {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base_post() -> Post {
        Post {
            platform: Platform::Reddit,
            source_post_id: "abc123".to_string(),
            author: Author {
                username: "poster".to_string(),
                display_name: "Poster".to_string(),
                followers: 10,
            },
            content: "hello world".to_string(),
            url: "https://reddit.com/r/test/abc123".to_string(),
            community: Some("test".to_string()),
            media_urls: vec![],
            hashtags: vec![],
            mentions: vec![],
            engagement: Engagement::default(),
            engagement_score: 0,
            published_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            discovered_at: Utc.with_ymd_and_hms(2026, 3, 1, 13, 0, 0).unwrap(),
            category: None,
            sentiment: None,
        }
    }

    #[test]
    fn platform_round_trips_through_str() {
        for p in Platform::all() {
            assert_eq!(p.as_str().parse::<Platform>().unwrap(), *p);
        }
    }

    #[test]
    fn platform_accepts_twitter_alias() {
        assert_eq!("twitter".parse::<Platform>().unwrap(), Platform::X);
    }

    #[test]
    fn identity_is_platform_plus_source_id() {
        let post = base_post();
        let id = post.identity();
        assert_eq!(id.platform, Platform::Reddit);
        assert_eq!(id.source_post_id, "abc123");
    }

    #[test]
    fn identities_differ_across_platforms_with_same_source_id() {
        let a = PostIdentity {
            platform: Platform::Reddit,
            source_post_id: "same".to_string(),
        };
        let b = PostIdentity {
            platform: Platform::X,
            source_post_id: "same".to_string(),
        };
        assert_ne!(a, b);
    }

    #[test]
    fn engagement_signal_detection() {
        assert!(!Engagement::default().has_any_signal());
        assert!(Engagement {
            views: 1,
            ..Engagement::default()
        }
        .has_any_signal());
    }

    #[test]
    fn media_kind_prefers_video_over_image() {
        let mut post = base_post();
        post.media_urls = vec![
            "https://i.redd.it/pic.jpg".to_string(),
            "https://v.redd.it/clip".to_string(),
        ];
        assert_eq!(post.media_kind(), MediaKind::Video);
    }

    #[test]
    fn media_kind_text_when_no_media() {
        assert_eq!(base_post().media_kind(), MediaKind::Text);
    }

    #[test]
    fn primary_hashtag_skips_empty() {
        let mut post = base_post();
        assert!(post.primary_hashtag().is_none());
        post.hashtags = vec!["ai".to_string(), "tech".to_string()];
        assert_eq!(post.primary_hashtag(), Some("ai"));
    }

    #[test]
    fn platform_serializes_lowercase() {
        let json = serde_json::to_string(&Platform::Reddit).unwrap();
        assert_eq!(json, "\"reddit\"");
    }
}
