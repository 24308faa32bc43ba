//! CSV export of unlocked achievements and lifetime stats.

use serde::Serialize;
use std::io::Write;

use crate::achievements;
use crate::error::Result;
use crate::progress::ProgressLedger;

#[derive(Debug, Serialize)]
struct AchievementRow<'a> {
    id: &'a str,
    name: &'a str,
    category: String,
    xp_earned: u64,
    unlocked_at: String,
}

#[derive(Debug, Serialize)]
struct StatRow {
    stat: &'static str,
    value: String,
}

pub fn write_achievements<W: Write>(ledger: &ProgressLedger, out: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    for unlocked in ledger.unlocked_achievements() {
        let definition = achievements::find(&unlocked.achievement_id);
        wtr.serialize(AchievementRow {
            id: &unlocked.achievement_id,
            name: definition.map(|a| a.name).unwrap_or(""),
            category: definition
                .map(|a| a.category.to_string())
                .unwrap_or_default(),
            xp_earned: unlocked.xp_earned,
            unlocked_at: unlocked.unlocked_at.to_rfc3339(),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_stats<W: Write>(ledger: &ProgressLedger, out: W) -> Result<()> {
    let stats = ledger.stats();
    let streak = ledger.streak();
    let rows = [
        ("xp", ledger.xp().to_string()),
        ("level", ledger.level().to_string()),
        ("current_streak", streak.current_streak.to_string()),
        ("longest_streak", streak.longest_streak.to_string()),
        ("total_words_spoken", stats.total_words_spoken.to_string()),
        ("total_practice_minutes", stats.total_practice_minutes.to_string()),
        ("lessons_completed", stats.lessons_completed.to_string()),
        ("conversations_completed", stats.conversations_completed.to_string()),
        ("role_plays_completed", stats.role_plays_completed.len().to_string()),
        ("best_pronunciation_score", stats.best_pronunciation_score.to_string()),
        ("perfect_answers", stats.perfect_answers.to_string()),
    ];

    let mut wtr = csv::Writer::from_writer(out);
    for (stat, value) in rows {
        wtr.serialize(StatRow { stat, value })?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressAction;
    use chrono::{Local, TimeZone};

    #[test]
    fn achievements_csv_has_header_and_rows() {
        let mut ledger = ProgressLedger::default();
        let at = Local.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        ledger.dispatch_at(ProgressAction::CompleteConversation, at);

        let mut buf = Vec::new();
        write_achievements(&ledger, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();

        assert_eq!(lines.next(), Some("id,name,category,xp_earned,unlocked_at"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("first_conversation,First Words,milestone,50,"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn stats_csv_lists_every_counter() {
        let ledger = ProgressLedger::default();
        let mut buf = Vec::new();
        write_stats(&ledger, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.starts_with("stat,value\n"));
        assert!(text.contains("xp,0\n"));
        assert_eq!(text.lines().count(), 12);
    }
}
