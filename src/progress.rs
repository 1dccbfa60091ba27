//! Durable player record (stats, achievements, daily challenge), stored as JSON in the
//! XDG config dir (or ~/.config/swaptui).

use crate::Difficulty;
use crate::config::MAX_COLORS;
use anyhow::{Context, Result};
use log::warn;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const FILENAME: &str = "progress.json";

/// Today's colour quest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyChallenge {
    /// Days since the Unix epoch.
    pub day: u64,
    pub target_color: u8,
    pub target: u32,
    pub progress: u32,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Progress {
    pub high_score: u32,
    pub best_combo: u32,
    pub total_matches: u64,
    pub games_played: u32,
    pub achievements: Vec<String>,
    pub difficulty: Difficulty,
    pub daily: Option<DailyChallenge>,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            high_score: 0,
            best_combo: 0,
            total_matches: 0,
            games_played: 0,
            achievements: Vec::new(),
            difficulty: Difficulty::default(),
            daily: None,
        }
    }
}

pub struct Achievement {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    reached: fn(&Progress) -> bool,
}

pub static ACHIEVEMENTS: [Achievement; 6] = [
    Achievement {
        id: "first_match",
        name: "First match!",
        description: "Match your first three gems",
        reached: |p| p.total_matches >= 1,
    },
    Achievement {
        id: "combo_5",
        name: "Combo master",
        description: "Reach a x5 combo",
        reached: |p| p.best_combo >= 5,
    },
    Achievement {
        id: "score_5000",
        name: "Five grand",
        description: "Score 5000 points",
        reached: |p| p.high_score >= 5000,
    },
    Achievement {
        id: "score_10000",
        name: "Ten grand",
        description: "Score 10000 points",
        reached: |p| p.high_score >= 10_000,
    },
    Achievement {
        id: "games_10",
        name: "Regular",
        description: "Play 10 games",
        reached: |p| p.games_played >= 10,
    },
    Achievement {
        id: "perfect",
        name: "Perfect game",
        description: "Score 20000 or more",
        reached: |p| p.high_score >= 20_000,
    },
];

pub fn achievement(id: &str) -> Option<&'static Achievement> {
    ACHIEVEMENTS.iter().find(|a| a.id == id)
}

impl Progress {
    /// Unlock every achievement whose condition now holds. Returns the new ones.
    pub fn unlock_achievements(&mut self) -> Vec<&'static str> {
        let mut unlocked = Vec::new();
        for a in &ACHIEVEMENTS {
            if !self.achievements.iter().any(|id| id == a.id) && (a.reached)(self) {
                self.achievements.push(a.id.to_string());
                unlocked.push(a.id);
            }
        }
        unlocked
    }

    /// Roll a new challenge unless today's is already stored. Returns true if rolled.
    pub fn ensure_daily(&mut self, today: u64, palette_size: u8, rng: &mut impl Rng) -> bool {
        if self.daily.as_ref().is_some_and(|d| d.day == today) {
            return false;
        }
        self.daily = Some(DailyChallenge {
            day: today,
            target_color: rng.random_range(1..=palette_size.clamp(1, MAX_COLORS)),
            target: rng.random_range(20..40),
            progress: 0,
            completed: false,
        });
        true
    }

    /// Count cleared gems towards the challenge. Returns true the moment it completes.
    pub fn record_daily(&mut self, cleared_colors: &[u32]) -> bool {
        let Some(daily) = self.daily.as_mut() else {
            return false;
        };
        if daily.completed {
            return false;
        }
        let hits = cleared_colors
            .get(usize::from(daily.target_color))
            .copied()
            .unwrap_or(0);
        daily.progress = daily.progress.saturating_add(hits).min(daily.target);
        if daily.progress >= daily.target {
            daily.completed = true;
            return true;
        }
        false
    }
}

/// Day number for the daily challenge.
pub fn today() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() / 86_400)
        .unwrap_or(0)
}

/// Path of the progress file (config dir / swaptui / progress.json).
fn config_path() -> PathBuf {
    let base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg),
        _ => std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".config"))
            .unwrap_or_else(|_| PathBuf::from(".")),
    };
    base.join("swaptui").join(FILENAME)
}

/// Load the record; a missing or unreadable file gives a fresh one.
pub fn load() -> Progress {
    let path = config_path();
    if !path.exists() {
        return Progress::default();
    }
    load_from(&path).unwrap_or_else(|e| {
        warn!("ignoring progress file {}: {e:#}", path.display());
        Progress::default()
    })
}

pub fn load_from(path: &Path) -> Result<Progress> {
    let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let progress = serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
    Ok(progress)
}

/// Save the record. Creates the config directory if needed.
pub fn save(progress: &Progress) -> Result<()> {
    save_to(&config_path(), progress)
}

pub fn save_to(path: &Path, progress: &Progress) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(progress)?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn achievements_unlock_once() {
        let mut p = Progress {
            total_matches: 3,
            high_score: 12_000,
            ..Progress::default()
        };
        let first = p.unlock_achievements();
        assert_eq!(first, vec!["first_match", "score_5000", "score_10000"]);
        assert!(p.unlock_achievements().is_empty());
        p.games_played = 10;
        assert_eq!(p.unlock_achievements(), vec!["games_10"]);
        assert_eq!(achievement("games_10").map(|a| a.name), Some("Regular"));
    }

    #[test]
    fn daily_is_rolled_once_per_day() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut p = Progress::default();
        assert!(p.ensure_daily(100, 6, &mut rng));
        let d = p.daily.clone().unwrap();
        assert!((1..=6).contains(&d.target_color));
        assert!((20..40).contains(&d.target));
        assert!(!p.ensure_daily(100, 6, &mut rng));
        assert!(p.ensure_daily(101, 6, &mut rng));
    }

    #[test]
    fn daily_completes_on_target_colour() {
        let mut p = Progress {
            daily: Some(DailyChallenge {
                day: 1,
                target_color: 2,
                target: 5,
                progress: 0,
                completed: false,
            }),
            ..Progress::default()
        };
        assert!(!p.record_daily(&[0, 9, 3, 0, 0, 0, 0]));
        assert_eq!(p.daily.as_ref().unwrap().progress, 3);
        assert!(p.record_daily(&[0, 0, 4, 0, 0, 0, 0]));
        assert_eq!(p.daily.as_ref().unwrap().progress, 5);
        assert!(!p.record_daily(&[0, 0, 4, 0, 0, 0, 0]));
    }

    #[test]
    fn old_files_fill_missing_fields() {
        let p: Progress = serde_json::from_str(r#"{"high_score": 900, "difficulty": "hard"}"#).unwrap();
        assert_eq!(p.high_score, 900);
        assert_eq!(p.difficulty, Difficulty::Hard);
        assert!(p.achievements.is_empty());
    }

    #[test]
    fn save_then_load_from_disk() {
        let dir = std::env::temp_dir().join(format!("swaptui-test-{}", std::process::id()));
        let path = dir.join(FILENAME);
        let p = Progress {
            best_combo: 4,
            achievements: vec!["first_match".into()],
            ..Progress::default()
        };
        save_to(&path, &p).unwrap();
        assert_eq!(load_from(&path).unwrap(), p);
        let _ = fs::remove_dir_all(dir);
    }
}
