//! Keyword-heuristic content classification.
//!
//! The injectable [`Classifier`] seam lets the pipeline swap the local
//! heuristic for a smarter backend without touching any stage; the bundled
//! [`KeywordClassifier`] needs no model, no network, and is fully
//! deterministic.

use trendscout_core::{Post, Sentiment};

/// Category assigned when no keyword list matches.
pub const DEFAULT_CATEGORY: &str = "General";

/// Per-category keyword lists.
///
/// Keys are the stable category names used in analyses and dashboards;
/// keywords are lowercase single words matched against content and hashtags.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Technology",
        &[
            "ai", "tech", "software", "app", "startup", "coding", "robot", "gadget", "iphone",
            "android", "crypto", "chip", "cyber", "quantum", "developer",
        ],
    ),
    (
        "Entertainment",
        &[
            "movie", "film", "music", "song", "album", "celebrity", "netflix", "trailer",
            "concert", "actor", "gaming", "meme", "anime", "comedy", "festival",
        ],
    ),
    (
        "Sports",
        &[
            "football", "soccer", "basketball", "baseball", "tennis", "olympics", "playoffs",
            "championship", "goal", "touchdown", "league", "athlete", "match", "race", "workout",
        ],
    ),
    (
        "Business",
        &[
            "market", "stocks", "economy", "earnings", "layoffs", "merger", "revenue", "invest",
            "inflation", "entrepreneur", "finance", "salary", "billion", "deal", "ipo",
        ],
    ),
    (
        "Lifestyle",
        &[
            "travel", "recipe", "fitness", "fashion", "wellness", "skincare", "home", "diet",
            "vacation", "coffee", "garden", "decor", "pets", "parenting", "minimalism",
        ],
    ),
    (
        "News & Politics",
        &[
            "election", "senate", "congress", "policy", "president", "protest", "vote", "court",
            "bill", "government", "minister", "war", "climate", "breaking", "investigation",
        ],
    ),
    (
        "Social Media",
        &[
            "tiktok", "instagram", "youtube", "influencer", "viral", "creator", "followers",
            "livestream", "subscribers", "hashtag", "reels", "shorts", "trending", "algorithm",
            "engagement",
        ],
    ),
];

/// Viral-content word weights.
///
/// Keys are lowercase single words. Values in `(0.0, 1.0]` are positive,
/// in `[-1.0, 0.0)` are negative. The final score is clamped to `[-1.0, 1.0]`.
const SENTIMENT_LEXICON: &[(&str, f32)] = &[
    // Positive signals
    ("love", 0.5),
    ("amazing", 0.5),
    ("awesome", 0.5),
    ("incredible", 0.5),
    ("best", 0.5),
    ("great", 0.4),
    ("beautiful", 0.4),
    ("win", 0.4),
    ("hilarious", 0.4),
    ("happy", 0.4),
    ("excited", 0.4),
    ("perfect", 0.4),
    ("wholesome", 0.4),
    ("inspiring", 0.4),
    ("brilliant", 0.4),
    ("stunning", 0.4),
    ("celebrate", 0.3),
    ("fun", 0.3),
    // Negative signals
    ("scam", -0.7),
    ("terrible", -0.6),
    ("awful", -0.6),
    ("worst", -0.6),
    ("disaster", -0.6),
    ("horrible", -0.6),
    ("disgusting", -0.6),
    ("hate", -0.5),
    ("outrage", -0.5),
    ("crisis", -0.5),
    ("angry", -0.4),
    ("sad", -0.4),
    ("fail", -0.4),
    ("shame", -0.4),
    ("fraud", -0.6),
    ("broken", -0.3),
    ("problem", -0.3),
    ("warning", -0.4),
];

/// Sentiment is called positive/negative only past this magnitude.
const SENTIMENT_THRESHOLD: f32 = 0.05;

/// Content classification seam used by the analysis pipeline.
pub trait Classifier: Send + Sync {
    /// Stable category name for a post.
    fn categorize(&self, post: &Post) -> String;

    /// Three-way sentiment for a text.
    fn sentiment(&self, text: &str) -> Sentiment;
}

/// Deterministic keyword-list classifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl Classifier for KeywordClassifier {
    fn categorize(&self, post: &Post) -> String {
        let mut best: Option<(&str, usize)> = None;

        for (category, keywords) in CATEGORY_KEYWORDS {
            let hits = keyword_hits(post, keywords);
            if hits > 0 && best.is_none_or(|(_, b)| hits > b) {
                best = Some((category, hits));
            }
        }

        best.map_or_else(|| DEFAULT_CATEGORY.to_owned(), |(c, _)| c.to_owned())
    }

    fn sentiment(&self, text: &str) -> Sentiment {
        let score = lexicon_score(text);
        if score > SENTIMENT_THRESHOLD {
            Sentiment::Positive
        } else if score < -SENTIMENT_THRESHOLD {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        }
    }
}

/// Counts keyword occurrences across a post's content words and hashtags.
fn keyword_hits(post: &Post, keywords: &[&str]) -> usize {
    let mut hits = 0usize;

    for word in post.content.split_whitespace() {
        let w = word
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if keywords.contains(&w.as_str()) {
            hits += 1;
        }
    }
    for tag in &post.hashtags {
        if keywords.contains(&tag.as_str()) {
            hits += 1;
        }
    }

    hits
}

/// Score a text string using the sentiment lexicon.
///
/// Splits text into lowercase words, sums matching weights, and clamps
/// the result to `[-1.0, 1.0]`. Returns `0.0` for empty or unknown text.
#[must_use]
pub fn lexicon_score(text: &str) -> f32 {
    let mut score = 0.0_f32;
    for word in text.split_whitespace() {
        let w = word
            .trim_matches(|c: char| !c.is_alphabetic())
            .to_lowercase();
        for &(lex_word, weight) in SENTIMENT_LEXICON {
            if w == lex_word {
                score += weight;
                break;
            }
        }
    }
    score.clamp(-1.0, 1.0)
}

/// Fills in category and sentiment where the normalizers left them empty.
pub fn classify_posts(posts: &mut [Post], classifier: &dyn Classifier) {
    for post in posts.iter_mut() {
        if post.category.is_none() {
            post.category = Some(classifier.categorize(post));
        }
        if post.sentiment.is_none() {
            post.sentiment = Some(classifier.sentiment(&post.content));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use trendscout_core::{Author, Engagement, Platform};

    fn post(content: &str, hashtags: &[&str]) -> Post {
        let now = Utc::now();
        Post {
            platform: Platform::X,
            source_post_id: "c1".to_owned(),
            author: Author::default(),
            content: content.to_owned(),
            url: String::new(),
            community: None,
            media_urls: Vec::new(),
            hashtags: hashtags.iter().map(|s| (*s).to_owned()).collect(),
            mentions: Vec::new(),
            engagement: Engagement::default(),
            engagement_score: 0,
            published_at: now,
            discovered_at: now,
            category: None,
            sentiment: None,
        }
    }

    #[test]
    fn tech_words_classify_as_technology() {
        let p = post("new AI chip beats every benchmark", &["tech"]);
        assert_eq!(KeywordClassifier.categorize(&p), "Technology");
    }

    #[test]
    fn hashtags_count_toward_the_category() {
        let p = post("look at this", &["tiktok", "viral", "creator"]);
        assert_eq!(KeywordClassifier.categorize(&p), "Social Media");
    }

    #[test]
    fn unmatched_content_falls_back_to_general() {
        let p = post("the quick brown fox jumps over it", &[]);
        assert_eq!(KeywordClassifier.categorize(&p), DEFAULT_CATEGORY);
    }

    #[test]
    fn most_hits_wins_across_categories() {
        // One tech word, two sports words.
        let p = post("robot referee ruins the championship match", &[]);
        assert_eq!(KeywordClassifier.categorize(&p), "Sports");
    }

    #[test]
    fn empty_string_scores_zero() {
        assert_eq!(lexicon_score(""), 0.0);
    }

    #[test]
    fn positive_words_score_positive() {
        assert!(lexicon_score("this is amazing, love it") > 0.0);
    }

    #[test]
    fn negative_words_score_negative() {
        assert!(lexicon_score("total scam, worst launch ever") < 0.0);
    }

    #[test]
    fn score_clamps_to_unit_range() {
        let text = "amazing awesome incredible best love perfect brilliant stunning";
        assert_eq!(lexicon_score(text), 1.0);
    }

    #[test]
    fn sentiment_maps_through_thresholds() {
        let c = KeywordClassifier;
        assert_eq!(c.sentiment("what an amazing win"), Sentiment::Positive);
        assert_eq!(c.sentiment("utter disaster and outrage"), Sentiment::Negative);
        assert_eq!(c.sentiment("a parcel arrived on tuesday"), Sentiment::Neutral);
    }

    #[test]
    fn classify_fills_only_missing_fields() {
        let mut posts = vec![post("new AI chip", &[]), post("boring text here", &[])];
        posts[0].category = Some("Entertainment".to_owned());

        classify_posts(&mut posts, &KeywordClassifier);

        assert_eq!(posts[0].category.as_deref(), Some("Entertainment"));
        assert_eq!(posts[1].category.as_deref(), Some(DEFAULT_CATEGORY));
        assert!(posts.iter().all(|p| p.sentiment.is_some()));
    }
}
