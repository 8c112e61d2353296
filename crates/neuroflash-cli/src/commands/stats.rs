//! Statistics and leaderboard commands

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use neuroflash_core::db::Database;

use super::{resolve_user, truncate};

pub fn cmd_stats(db: &Database, email: &str, today: NaiveDate) -> Result<()> {
    let user = resolve_user(db, email)?;
    let dashboard = db.get_dashboard(user.id, today)?;
    let window = db.get_performance(user.id, today)?;
    let activity = db.get_recent_activity(user.id)?;

    println!();
    println!("📊 Stats for {}", user.username);
    println!("   ─────────────────────────────");
    println!("   Decks:          {}", dashboard.total_decks);
    println!("   Cards mastered: {}", dashboard.cards_mastered);
    println!("   Points:         {}", dashboard.points);
    println!("   Streak:         {} day(s)", dashboard.review_streak_days);

    let active_days: Vec<_> = window.iter().filter(|d| d.review_count > 0).collect();
    let total_reviews: i64 = active_days.iter().map(|d| d.review_count).sum();
    println!();
    println!(
        "   Last 30 days: {} review(s) on {} day(s)",
        total_reviews,
        active_days.len()
    );
    for day in active_days.iter().rev().take(7) {
        println!(
            "     {}  {:>4} review(s), avg rating {:.2}",
            day.date,
            day.review_count,
            day.average_rating.unwrap_or_default()
        );
    }

    if !activity.is_empty() {
        println!();
        println!("   Recent activity:");
        for item in &activity {
            println!(
                "     {}  {}",
                item.review_time.format("%Y-%m-%d %H:%M"),
                item.description
            );
        }
    }

    Ok(())
}

pub fn cmd_leaderboard_show(db: &Database, limit: i64) -> Result<()> {
    // No caller here, so no user's own rank is requested
    let page = db.get_leaderboard(0, 1, limit)?;

    if page.leaderboard.is_empty() {
        println!("No one has earned points yet.");
        return Ok(());
    }

    println!();
    println!("🏆 Leaderboard ({} ranked user(s))", page.pagination.total_entries);
    println!("   ─────────────────────────────");
    for entry in &page.leaderboard {
        println!(
            "   {:>4}. {:<24} {:>8}",
            entry.rank,
            truncate(&entry.username, 24),
            entry.points
        );
    }

    Ok(())
}

pub fn cmd_leaderboard_refresh(db: &Database) -> Result<()> {
    let result = db.refresh_leaderboard_snapshot(Utc::now())?;

    db.log_audit(
        "cli",
        "leaderboard_refresh",
        Some("leaderboard"),
        None,
        Some(&format!("entries={}", result.entries)),
    )?;

    println!(
        "✅ Leaderboard snapshot refreshed: {} entr{}",
        result.entries,
        if result.entries == 1 { "y" } else { "ies" }
    );
    Ok(())
}
