//! The `discover` subcommand: one full discovery pass from the terminal,
//! recorded as a run row exactly like API- and scheduler-triggered passes.

use std::collections::HashSet;

use chrono::Utc;
use trendscout_core::{AppConfig, Platform, PostIdentity};
use trendscout_db::RunCounts;
use trendscout_sources::{
    collect_posts, shared, CollectedPosts, RateBudgetConfig, RateBudgetTracker, SourceReport,
    SourceSet, SourceStatus,
};
use trendscout_trends::{analyze_posts, discovery_gate, InsightClient, KeywordClassifier};

pub(crate) async fn run_discover(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    source_names: &[String],
    max_posts: Option<usize>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let filter = parse_source_filter(source_names)?;
    let now = Utc::now();

    let budget = shared(RateBudgetTracker::new(RateBudgetConfig::standard(), now));
    let mut sources = SourceSet::from_app_config(config, &budget)?;
    if let Some(wanted) = &filter {
        if !wanted.contains(&Platform::Reddit) {
            sources.reddit = None;
        }
        if !wanted.contains(&Platform::X) {
            sources.x = None;
        }
    }
    let max_posts = max_posts.unwrap_or(config.max_posts_per_source);

    let last_success = trendscout_db::latest_successful_run(pool).await?;
    let gate = discovery_gate(last_success, now, config.min_discovery_interval_mins);

    if dry_run {
        println!("discovery plan (dry run)");
        println!("  sources:          {}", describe_sources(&sources));
        println!("  max posts/source: {max_posts}");
        match gate {
            Some(wait) => println!(
                "  interval gate:    deferred, retry in {}s",
                wait.num_seconds().max(1)
            ),
            None => println!("  interval gate:    clear"),
        }
        return Ok(());
    }

    if let Some(wait) = gate {
        println!(
            "discovery deferred; minimum interval not elapsed, retry in {}s",
            wait.num_seconds().max(1)
        );
        return Ok(());
    }

    if sources.is_empty() {
        anyhow::bail!(
            "no sources configured; set REDDIT_CLIENT_ID/REDDIT_CLIENT_SECRET or X_BEARER_TOKEN"
        );
    }

    let run = trendscout_db::create_discovery_run(pool, "cli").await?;
    trendscout_db::start_discovery_run(pool, run.id).await?;

    let collected = collect_posts(&sources, max_posts).await;
    print_reports(&collected.reports);

    let fetched: usize = collected.reports.iter().map(|r| r.fetched).sum();
    let reports_json = serde_json::to_value(&collected.reports)
        .unwrap_or_else(|_| serde_json::Value::Array(Vec::new()));

    if let Some(message) = all_sources_failed(&collected) {
        trendscout_db::fail_discovery_run(pool, run.id, &message).await?;
        let active: Vec<&SourceReport> = collected
            .reports
            .iter()
            .filter(|r| r.status != SourceStatus::Skipped)
            .collect();
        if active
            .iter()
            .all(|r| r.status == SourceStatus::QuotaExhausted)
        {
            match active.iter().filter_map(|r| r.reset_at).min() {
                Some(at) => println!(
                    "\ndiscovery deferred; provider quotas exhausted until {}",
                    at.format("%Y-%m-%d %H:%M UTC")
                ),
                None => println!("\ndiscovery deferred; provider quotas exhausted"),
            }
            return Ok(());
        }
        anyhow::bail!("{message}");
    }

    let stats = match persist_pass(pool, config, collected.posts, now).await {
        Ok(stats) => stats,
        Err(err) => {
            fail_run_best_effort(pool, run.id, &format!("{err:#}")).await;
            return Err(err);
        }
    };

    let counts = RunCounts {
        posts_fetched: to_count(fetched),
        new_posts: to_count(stats.new_posts),
        trends_created: to_count(stats.trends_created),
    };
    if let Err(err) =
        trendscout_db::complete_discovery_run(pool, run.id, counts, &reports_json).await
    {
        fail_run_best_effort(pool, run.id, &format!("{err:#}")).await;
        return Err(err.into());
    }

    println!();
    println!("discovery run {} succeeded", run.public_id);
    println!("  posts fetched:  {fetched}");
    println!("  persisted:      {}", stats.persisted);
    println!("  new posts:      {}", stats.new_posts);
    println!("  rejected:       {}", stats.rejected);
    println!("  duplicates:     {}", stats.duplicates);
    println!("  trend analyses: {}", stats.analyses);
    println!("  suggestions:    {}", stats.suggestions);

    Ok(())
}

struct PassStats {
    persisted: usize,
    new_posts: usize,
    rejected: usize,
    duplicates: usize,
    analyses: usize,
    suggestions: usize,
    trends_created: usize,
}

async fn persist_pass(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    posts: Vec<trendscout_core::Post>,
    now: chrono::DateTime<Utc>,
) -> anyhow::Result<PassStats> {
    let mut known: HashSet<PostIdentity> = HashSet::new();
    for platform in Platform::all() {
        let ids: Vec<String> = posts
            .iter()
            .filter(|p| p.platform == *platform)
            .map(|p| p.source_post_id.clone())
            .collect();
        for source_post_id in trendscout_db::known_post_ids(pool, *platform, &ids).await? {
            known.insert(PostIdentity {
                platform: *platform,
                source_post_id,
            });
        }
    }

    let insight = build_insight_client(config);
    let outcome = analyze_posts(posts, &known, &KeywordClassifier, insight.as_ref(), now).await;

    let persisted = trendscout_db::upsert_posts(pool, &outcome.posts).await?;
    let trends_created = trendscout_db::insert_trend_analyses(pool, &outcome.analyses).await?;

    Ok(PassStats {
        persisted,
        new_posts: outcome.new_posts,
        rejected: outcome.rejected,
        duplicates: outcome.duplicates,
        analyses: outcome.analyses.len(),
        suggestions: outcome.suggestion_count,
        trends_created,
    })
}

/// `Some(message)` when nothing was fetched and every configured source
/// failed. One healthy source with zero posts is a legitimate empty pass.
fn all_sources_failed(collected: &CollectedPosts) -> Option<String> {
    if !collected.posts.is_empty() {
        return None;
    }
    let active: Vec<&SourceReport> = collected
        .reports
        .iter()
        .filter(|r| r.status != SourceStatus::Skipped)
        .collect();
    if active.is_empty() || active.iter().any(|r| r.status == SourceStatus::Ok) {
        return None;
    }

    let detail = active
        .iter()
        .map(|r| {
            format!(
                "{}: {}",
                r.platform.as_str(),
                r.detail.as_deref().unwrap_or("no detail")
            )
        })
        .collect::<Vec<_>>()
        .join("; ");
    Some(format!("all sources failed: {detail}"))
}

fn parse_source_filter(names: &[String]) -> anyhow::Result<Option<Vec<Platform>>> {
    if names.is_empty() {
        return Ok(None);
    }

    let mut platforms = Vec::new();
    for name in names {
        let platform = name
            .parse::<Platform>()
            .map_err(|_| anyhow::anyhow!("unknown source '{name}'; expected reddit or x"))?;
        if !platforms.contains(&platform) {
            platforms.push(platform);
        }
    }
    Ok(Some(platforms))
}

fn describe_sources(sources: &SourceSet) -> String {
    let mut names = Vec::new();
    if sources.reddit.is_some() {
        names.push("reddit");
    }
    if sources.x.is_some() {
        names.push("x");
    }
    if names.is_empty() {
        "none configured".to_owned()
    } else {
        names.join(", ")
    }
}

fn print_reports(reports: &[SourceReport]) {
    println!("{:<10}{:<18}{:<10}DETAIL", "SOURCE", "STATUS", "FETCHED");
    for report in reports {
        println!(
            "{:<10}{:<18}{:<10}{}",
            report.platform.as_str(),
            status_label(report.status),
            report.fetched,
            report.detail.as_deref().unwrap_or("-")
        );
    }
}

fn status_label(status: SourceStatus) -> &'static str {
    match status {
        SourceStatus::Ok => "ok",
        SourceStatus::RateLimited => "rate-limited",
        SourceStatus::QuotaExhausted => "quota-exhausted",
        SourceStatus::AuthFailed => "auth-failed",
        SourceStatus::TransportFailed => "transport-failed",
        SourceStatus::Skipped => "skipped",
    }
}

fn build_insight_client(config: &AppConfig) -> Option<InsightClient> {
    let url = config.insight_service_url.as_deref()?;
    match InsightClient::new(url, config.insight_timeout_secs) {
        Ok(client) => Some(client),
        Err(err) => {
            tracing::warn!(error = %err, "insight client unavailable; using local summaries");
            None
        }
    }
}

async fn fail_run_best_effort(pool: &sqlx::PgPool, run_id: i64, message: &str) {
    if let Err(err) = trendscout_db::fail_discovery_run(pool, run_id, message).await {
        tracing::error!(run_id, error = %err, "could not mark discovery run failed");
    }
}

fn to_count(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(status: SourceStatus, detail: &str) -> SourceReport {
        SourceReport {
            platform: Platform::Reddit,
            fetched: 0,
            status,
            detail: Some(detail.to_owned()),
            retry_after_secs: None,
            reset_at: None,
        }
    }

    #[test]
    fn source_filter_accepts_known_names_and_dedupes() {
        let names = vec!["reddit".to_owned(), "x".to_owned(), "reddit".to_owned()];
        let filter = parse_source_filter(&names).expect("known names");
        assert_eq!(filter, Some(vec![Platform::Reddit, Platform::X]));

        assert!(parse_source_filter(&["myspace".to_owned()]).is_err());
        assert_eq!(parse_source_filter(&[]).expect("empty is fine"), None);
    }

    #[test]
    fn an_ok_source_makes_an_empty_pass_legitimate() {
        let collected = CollectedPosts {
            posts: Vec::new(),
            reports: vec![
                report(SourceStatus::Ok, "-"),
                report(SourceStatus::TransportFailed, "timed out"),
            ],
        };
        assert!(all_sources_failed(&collected).is_none());
    }

    #[test]
    fn all_failed_message_names_each_source() {
        let mut second = report(SourceStatus::AuthFailed, "bad token");
        second.platform = Platform::X;
        let collected = CollectedPosts {
            posts: Vec::new(),
            reports: vec![report(SourceStatus::TransportFailed, "timed out"), second],
        };

        let message = all_sources_failed(&collected).expect("both sources failed");
        assert!(message.contains("reddit: timed out"), "{message}");
        assert!(message.contains("x: bad token"), "{message}");
    }
}
