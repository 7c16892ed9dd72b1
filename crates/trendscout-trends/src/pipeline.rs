//! Analysis pipeline orchestration and discovery pacing.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use trendscout_core::{Post, PostIdentity};

use crate::classify::{classify_posts, Classifier};
use crate::cluster::cluster_posts;
use crate::dedup::dedup_posts;
use crate::insight::{fallback_suggestions, InsightClient};
use crate::quality::filter_posts;
use crate::summarize::{apply_insights, summarize_group};
use crate::types::TrendAnalysis;

/// Result of one analysis pass over a fetched batch.
#[derive(Debug)]
pub struct AnalysisOutcome {
    /// Posts that survived quality filtering and dedup, ready to persist.
    pub posts: Vec<Post>,
    /// Survivors whose identity had not been seen before this pass.
    pub new_posts: usize,
    /// Posts rejected by the quality filter.
    pub rejected: usize,
    /// In-batch repeat occurrences dropped.
    pub duplicates: usize,
    /// One analysis per surviving trend group, every one carrying suggestions.
    pub analyses: Vec<TrendAnalysis>,
    /// Total content suggestions attached across all analyses.
    pub suggestion_count: usize,
}

/// Decides whether a discovery run may start at `now`.
///
/// Returns `Some(wait)` with the remaining time when the last successful run
/// is closer than `interval_mins`; `None` means the run may proceed. A
/// missing `last_success` always proceeds.
#[must_use]
pub fn discovery_gate(
    last_success: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    interval_mins: i64,
) -> Option<Duration> {
    let last = last_success?;
    let next_allowed = last + Duration::minutes(interval_mins);
    if now >= next_allowed {
        None
    } else {
        Some(next_allowed - now)
    }
}

/// Runs the full analysis pipeline over one fetched batch.
///
/// 1. Quality-filter the batch.
/// 2. Deduplicate within the batch and against `known` identities.
/// 3. Fill categories and sentiment the sources left empty.
/// 4. Cluster into trend groups.
/// 5. Summarize each group; when the insight service is configured and
///    healthy, enrich the summary and request content suggestions, otherwise
///    use the rule-based fallback generator.
///
/// Enrichment failures never fail the pass: each one logs a warning and the
/// affected analysis keeps its local summary plus fallback suggestions.
pub async fn analyze_posts(
    posts: Vec<Post>,
    known: &HashSet<PostIdentity>,
    classifier: &dyn Classifier,
    insight: Option<&InsightClient>,
    now: DateTime<Utc>,
) -> AnalysisOutcome {
    // Step 1: Quality filter.
    let (kept, rejected) = filter_posts(posts);

    // Step 2: Dedup within the batch and against persisted identities.
    let deduped = dedup_posts(kept, known);
    let mut posts = deduped.posts;

    // Step 3: Classify where the source left category or sentiment empty.
    classify_posts(&mut posts, classifier);

    // Step 4: Cluster into candidate trend groups.
    let groups = cluster_posts(&posts);

    // Step 5: Summarize and enrich. One health probe gates enrichment for
    // the whole pass; a dead service downgrades every group to fallback.
    let enricher = match insight {
        Some(client) if !groups.is_empty() => {
            if client.health().await {
                Some(client)
            } else {
                tracing::warn!("insight service unhealthy; using local summaries");
                None
            }
        }
        _ => None,
    };

    let mut analyses = Vec::with_capacity(groups.len());
    let mut suggestion_count = 0usize;
    for group in &groups {
        let mut analysis = summarize_group(group, now);
        let mut insights = None;

        if let Some(client) = enricher {
            match client.analyze_group(group).await {
                Ok(ai) => {
                    apply_insights(&mut analysis, &ai);
                    insights = Some(ai);
                }
                Err(e) => {
                    tracing::warn!(
                        group = %group.key,
                        error = %e,
                        "trend enrichment failed; keeping local summary"
                    );
                }
            }
        }

        let suggestions = match (enricher, insights.as_ref()) {
            (Some(client), Some(ai)) => match client.content_suggestions(&analysis, ai).await {
                Ok(s) if !s.is_empty() => s,
                Ok(_) => fallback_suggestions(&analysis, Some(ai)),
                Err(e) => {
                    tracing::warn!(
                        group = %group.key,
                        error = %e,
                        "content suggestions failed; using fallback"
                    );
                    fallback_suggestions(&analysis, Some(ai))
                }
            },
            _ => fallback_suggestions(&analysis, insights.as_ref()),
        };
        suggestion_count += suggestions.len();
        analysis.suggestions = suggestions;
        analyses.push(analysis);
    }

    tracing::info!(
        posts = posts.len(),
        new_posts = deduped.new_posts,
        rejected,
        duplicates = deduped.duplicates,
        trends = analyses.len(),
        suggestions = suggestion_count,
        "analysis pass complete"
    );

    AnalysisOutcome {
        posts,
        new_posts: deduped.new_posts,
        rejected,
        duplicates: deduped.duplicates,
        analyses,
        suggestion_count,
    }
}
