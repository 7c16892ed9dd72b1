//! AI enrichment client with a deterministic local fallback.
//!
//! Talks to the external insight service over HTTP: a health probe gates the
//! run, `/analyze-posts` enriches one group, `/generate-content-suggestions`
//! turns an analysis into posting ideas. Every failure path degrades to the
//! rule-based local generator; enrichment is never load-bearing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use trendscout_core::Post;

use crate::error::TrendError;
use crate::types::{ContentSuggestion, TrendAnalysis, TrendGroup};

/// Suggested content types with their fixed confidence scores.
const SUGGESTION_TYPES: &[(&str, f64)] = &[
    ("reel", 0.85),
    ("post", 0.80),
    ("story", 0.75),
    ("carousel", 0.78),
];

/// Hashtags attached to a generated suggestion, at most.
const SUGGESTION_HASHTAG_LIMIT: usize = 8;

/// Group-level enrichment returned by `/analyze-posts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiInsights {
    pub trend_title: String,
    pub trend_description: String,
    pub category: String,
    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default)]
    pub viral_factors: Vec<String>,
    #[serde(default)]
    pub content_themes: Vec<String>,
    #[serde(default)]
    pub ai_sentiment: String,
    #[serde(default)]
    pub engagement_prediction: String,
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    posts: &'a [Post],
    group_key: &'a str,
}

#[derive(Serialize)]
struct SuggestionRequest<'a> {
    trend_analysis: &'a TrendAnalysis,
    ai_insights: &'a AiInsights,
}

#[derive(Deserialize)]
struct SuggestionsResponse {
    suggestions: Vec<ContentSuggestion>,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
}

/// Insight (enrichment) service HTTP client.
pub struct InsightClient {
    client: reqwest::Client,
    base_url: String,
}

impl InsightClient {
    /// # Errors
    ///
    /// Returns [`TrendError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, TrendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        let base_url: String = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Whether the service reports itself healthy.
    ///
    /// Anything but a 2xx `{ "status": "healthy" }` counts as unavailable;
    /// the caller then skips enrichment for the whole run.
    pub async fn health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<HealthResponse>().await {
                    Ok(body) if body.status == "healthy" => true,
                    Ok(body) => {
                        tracing::warn!(status = %body.status, "insight service not healthy");
                        false
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "insight health response unreadable");
                        false
                    }
                }
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), "insight health check rejected");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "insight health check failed");
                false
            }
        }
    }

    /// Enriches one group with AI title/description/category and themes.
    ///
    /// # Errors
    ///
    /// Returns [`TrendError::Insight`] if the request fails, the service
    /// rejects it, or the response cannot be parsed.
    pub async fn analyze_group(&self, group: &TrendGroup) -> Result<AiInsights, TrendError> {
        let url = format!("{}/analyze-posts", self.base_url);
        let request = AnalyzeRequest {
            posts: &group.posts,
            group_key: &group.key,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| TrendError::Insight(format!("analyze-posts request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(TrendError::Insight(format!(
                "analyze-posts returned status {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| TrendError::Insight(format!("analyze-posts response parse error: {e}")))
    }

    /// Generates posting suggestions for an enriched analysis.
    ///
    /// # Errors
    ///
    /// Returns [`TrendError::Insight`] on any request, status, or parse
    /// failure.
    pub async fn content_suggestions(
        &self,
        analysis: &TrendAnalysis,
        insights: &AiInsights,
    ) -> Result<Vec<ContentSuggestion>, TrendError> {
        let url = format!("{}/generate-content-suggestions", self.base_url);
        let request = SuggestionRequest {
            trend_analysis: analysis,
            ai_insights: insights,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                TrendError::Insight(format!("content-suggestions request failed: {e}"))
            })?;

        if !response.status().is_success() {
            return Err(TrendError::Insight(format!(
                "content-suggestions returned status {}",
                response.status()
            )));
        }

        let body: SuggestionsResponse = response.json().await.map_err(|e| {
            TrendError::Insight(format!("content-suggestions response parse error: {e}"))
        })?;
        Ok(body.suggestions)
    }
}

/// Rule-based suggestion generator used whenever enrichment is unavailable.
///
/// One suggestion per content type with a fixed confidence; themes come from
/// AI insights when a partial enrichment exists, otherwise from the
/// analysis's own keywords. Deterministic for identical input.
#[must_use]
pub fn fallback_suggestions(
    analysis: &TrendAnalysis,
    insights: Option<&AiInsights>,
) -> Vec<ContentSuggestion> {
    let ai_themes = insights.map(|i| &i.content_themes);
    let themes: Vec<String> = match ai_themes {
        Some(themes) if !themes.is_empty() => themes
            .iter()
            .map(|t| t.trim_start_matches('#').to_lowercase())
            .collect(),
        _ => analysis.keywords.clone(),
    };

    let primary = themes
        .first()
        .map_or("trending topic", String::as_str)
        .to_owned();
    let theme_line = if themes.is_empty() {
        analysis.group_key.clone()
    } else {
        themes
            .iter()
            .take(2)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    };
    let factor = insights
        .and_then(|i| i.viral_factors.first())
        .map_or("engaging content", String::as_str);
    let category = analysis.category.as_str();
    let category_lower = category.to_lowercase();

    let mut hashtags: Vec<String> = Vec::new();
    for theme in themes.iter().take(3) {
        let tag = format!("#{theme}");
        if !hashtags.contains(&tag) {
            hashtags.push(tag);
        }
    }
    for tag in [format!("#{category_lower}"), "#viral".to_owned(), "#trending".to_owned()] {
        if !hashtags.contains(&tag) {
            hashtags.push(tag);
        }
    }
    hashtags.truncate(SUGGESTION_HASHTAG_LIMIT);

    SUGGESTION_TYPES
        .iter()
        .map(|(content_type, confidence)| {
            let suggested_content = match *content_type {
                "reel" => format!(
                    "🎥 Viral trend: {theme_line}. Create a 30-60 second video showcasing {primary}"
                ),
                "post" => format!(
                    "📝 Trending topic: {category} insights around {primary}. Share your take with engaging visuals"
                ),
                "story" => format!(
                    "📱 Hot right now: {primary}. Quick story with polls or questions for engagement"
                ),
                _ => format!(
                    "🔄 {theme_line} breakdown. Multi-slide carousel with key points and takeaways"
                ),
            };

            ContentSuggestion {
                content_type: (*content_type).to_owned(),
                suggested_content,
                suggested_hashtags: hashtags.clone(),
                confidence_score: *confidence,
                viral_potential: format!(
                    "High potential due to {factor} and current {category_lower} trends"
                ),
                target_audience: format!(
                    "{category} enthusiasts and social media users following trending topics"
                ),
            }
        })
        .collect()
}
