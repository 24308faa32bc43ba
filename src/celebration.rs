use rand::seq::SliceRandom;
use rand::Rng;

use crate::achievements::{self, UnlockedAchievement};

const HEADLINES: [&str; 6] = [
    "AMAZING!",
    "EXCELLENT!",
    "WELL SPOKEN!",
    "SUPERB!",
    "BRILLIANT!",
    "KEEP IT UP!",
];

/// Banner the host shows when it drains newly unlocked achievements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Celebration {
    pub headline: &'static str,
    pub lines: Vec<String>,
}

impl Celebration {
    /// `None` when there is nothing to celebrate
    pub fn for_unlocks<R: Rng + ?Sized>(
        unlocked: &[UnlockedAchievement],
        rng: &mut R,
    ) -> Option<Self> {
        if unlocked.is_empty() {
            return None;
        }

        let headline = HEADLINES.choose(rng).copied().unwrap_or("AMAZING!");
        let lines = unlocked.iter().map(unlock_line).collect();

        Some(Self { headline, lines })
    }

    pub fn render(&self) -> String {
        let mut out = format!("🎉 {}", self.headline);
        for line in &self.lines {
            out.push('\n');
            out.push_str(line);
        }
        out
    }
}

fn unlock_line(unlocked: &UnlockedAchievement) -> String {
    match achievements::find(&unlocked.achievement_id) {
        Some(a) => format!(
            "🏆 {} (+{} XP): {}",
            a.name, unlocked.xp_earned, a.description
        ),
        None => format!("🏆 {} (+{} XP)", unlocked.achievement_id, unlocked.xp_earned),
    }
}

pub fn level_up_line(level: u32) -> String {
    format!("⭐ Level up! You reached level {level}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn unlocked(id: &str, xp: u64) -> UnlockedAchievement {
        UnlockedAchievement {
            achievement_id: id.to_string(),
            unlocked_at: Local::now(),
            xp_earned: xp,
        }
    }

    #[test]
    fn nothing_to_celebrate() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(Celebration::for_unlocks(&[], &mut rng).is_none());
    }

    #[test]
    fn one_line_per_unlock() {
        let mut rng = StdRng::seed_from_u64(7);
        let celebration = Celebration::for_unlocks(
            &[unlocked("streak_7", 100), unlocked("night_owl", 50)],
            &mut rng,
        )
        .unwrap();

        assert!(HEADLINES.contains(&celebration.headline));
        assert_eq!(celebration.lines.len(), 2);
        assert!(celebration.lines[0].contains("Week Warrior"));
        assert!(celebration.lines[0].contains("+100 XP"));

        let rendered = celebration.render();
        assert_eq!(rendered.lines().count(), 3);
    }

    #[test]
    fn unknown_ids_still_render() {
        let mut rng = StdRng::seed_from_u64(1);
        let celebration = Celebration::for_unlocks(&[unlocked("legacy", 5)], &mut rng).unwrap();
        assert_eq!(celebration.lines[0], "🏆 legacy (+5 XP)");
    }

    #[test]
    fn level_up_mentions_level() {
        assert!(level_up_line(4).ends_with("level 4"));
    }
}
