//! Read-only trend query handler.

pub(crate) async fn run_trends(pool: &sqlx::PgPool, limit: i64) -> anyhow::Result<()> {
    let limit = limit.clamp(1, 100);
    let rows = trendscout_db::top_trends(pool, limit).await?;

    if rows.is_empty() {
        println!("no trend analyses found; run `discover` first");
        return Ok(());
    }

    println!(
        "{:<32}{:<16}{:<8}{:<7}TITLE",
        "GROUP", "CATEGORY", "SCORE", "POSTS"
    );
    for row in &rows {
        println!(
            "{:<32}{:<16}{:<8.1}{:<7}{}",
            row.group_key, row.category, row.viral_score, row.post_count, row.title
        );
    }

    Ok(())
}
