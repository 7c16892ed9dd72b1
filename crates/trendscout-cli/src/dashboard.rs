//! Markdown dashboard report, rendered from the same aggregation the API
//! serves.

use chrono::{Duration, Utc};
use trendscout_core::AppConfig;
use trendscout_trends::build_dashboard;

pub(crate) async fn run_dashboard(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    hours: Option<i64>,
) -> anyhow::Result<()> {
    let hours = hours.unwrap_or(config.dashboard_lookback_hours).clamp(1, 168);
    let now = Utc::now();
    let since = now - Duration::hours(hours);

    let posts = trendscout_db::recent_posts(pool, since).await?;
    let trend_count = trendscout_db::recent_trend_count(pool, since).await?;
    let snapshot = build_dashboard(&posts, usize::try_from(trend_count).unwrap_or(0), hours, now);

    println!("# Trend Dashboard");
    println!();
    println!(
        "**Generated**: {}",
        snapshot.generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    println!("**Window**: last {hours}h");
    println!("**Posts**: {}", snapshot.total_posts);
    println!("**Virality score**: {:.0}/100", snapshot.virality_score);

    if snapshot.total_posts == 0 {
        println!();
        println!("no posts in the window; run `discover` first");
        return Ok(());
    }

    println!();
    println!("| Platform | Posts | Engagement |");
    println!("|----------|-------|------------|");
    for stat in &snapshot.platforms {
        println!(
            "| {} | {} | {} |",
            stat.platform.as_str(),
            stat.posts,
            stat.total_engagement
        );
    }

    println!();
    println!("| Category | Posts | Avg engagement | Tier |");
    println!("|----------|-------|----------------|------|");
    for stat in &snapshot.categories {
        println!(
            "| {} | {} | {:.1} | {} |",
            stat.category,
            stat.posts,
            stat.average_engagement,
            stat.tier.as_str()
        );
    }

    if !snapshot.keywords.is_empty() {
        println!();
        let keywords = snapshot
            .keywords
            .iter()
            .map(|k| format!("{} ({})", k.keyword, k.mentions))
            .collect::<Vec<_>>()
            .join(", ");
        println!("**Top keywords**: {keywords}");
    }

    Ok(())
}
