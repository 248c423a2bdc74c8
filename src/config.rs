//! Loading engine configuration (reward table, badge catalog, challenge bank,
//! retry policy) from TOML.
//!
//! Every section is optional. Example:
//!
//! ```toml
//! [rewards]
//! perfect_score_bonus = 15
//! late_penalty_enabled = false
//!
//! [retry]
//! max_attempts = 8
//!
//! [[badges]]
//! id = "pipe_wizard"
//! name = "Pipe Wizard"
//! category = "skill"
//! rarity = "rare"
//! criteria = { type = "challenge_score", topic = "plumbing", min_score = 95 }
//!
//! [[challenges]]
//! id = "plumb-101"
//! challenge_type = "quiz"
//! topic = "plumbing"
//! base_xp = 20
//! due_date = "2026-09-01T00:00:00Z"
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::domain::{BadgeDefinition, Challenge};
use crate::rewards::RewardTable;

/// Optimistic-concurrency retry budget for one reward application.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryPolicy {
  pub max_attempts: u32,
  /// Base backoff between attempts; grows linearly, plus jitter.
  pub backoff_ms: u64,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self { max_attempts: 5, backoff_ms: 5 }
  }
}

#[derive(Clone, Debug, Default)]
pub struct EngineConfig {
  pub rewards: RewardTable,
  pub retry: RetryPolicy,
  /// Added to the built-in catalog; an existing id is replaced.
  pub badges: Vec<BadgeDefinition>,
  pub challenges: Vec<Challenge>,
}

/// Sections kept as raw TOML so one bad entry cannot sink the rest.
#[derive(Deserialize)]
struct RawConfig {
  #[serde(default)]
  rewards: Option<toml::Value>,
  #[serde(default)]
  retry: Option<toml::Value>,
  #[serde(default)]
  badges: Vec<toml::Value>,
  #[serde(default)]
  challenges: Vec<toml::Value>,
}

impl EngineConfig {
  /// Parse TOML text, repairing values the engine cannot work with.
  ///
  /// Only malformed TOML is an error. A section that does not fit falls back
  /// to its defaults and a bad badge or challenge row is skipped and logged.
  pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
    let raw = toml::from_str::<RawConfig>(s)?;
    let mut cfg = EngineConfig {
      rewards: section::<RewardTable>("rewards", raw.rewards).sanitized(),
      retry: section("retry", raw.retry),
      badges: rows("badges", raw.badges),
      challenges: rows("challenges", raw.challenges),
    };
    if cfg.retry.max_attempts == 0 {
      error!(target: "tradecraft", "retry.max_attempts must be at least 1; using 1");
      cfg.retry.max_attempts = 1;
    }
    Ok(cfg)
  }
}

fn section<T: DeserializeOwned + Default>(name: &str, value: Option<toml::Value>) -> T {
  let Some(value) = value else { return T::default() };
  value.try_into().unwrap_or_else(|e| {
    error!(target: "tradecraft", section = name, error = %e, "Invalid config section; using defaults");
    T::default()
  })
}

fn rows<T: DeserializeOwned>(name: &str, values: Vec<toml::Value>) -> Vec<T> {
  values
    .into_iter()
    .enumerate()
    .filter_map(|(index, value)| {
      let id = value.get("id").and_then(|v| v.as_str()).unwrap_or("<no id>").to_string();
      match value.try_into() {
        Ok(row) => Some(row),
        Err(e) => {
          warn!(target: "tradecraft", section = name, index, %id, error = %e, "Skipping invalid config entry");
          None
        }
      }
    })
    .collect()
}

/// Attempt to load `EngineConfig` from PROGRESSION_CONFIG_PATH. Returns None when the file is unreadable or not TOML.
pub fn load_engine_config_from_env() -> Option<EngineConfig> {
  let path = std::env::var("PROGRESSION_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match EngineConfig::from_toml_str(&s) {
      Ok(cfg) => {
        info!(target: "tradecraft", %path, badges = cfg.badges.len(), challenges = cfg.challenges.len(), "Loaded engine config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "tradecraft", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "tradecraft", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::BadgeCriteria;

  #[test]
  fn empty_file_is_all_defaults() {
    let cfg = EngineConfig::from_toml_str("").unwrap();
    assert_eq!(cfg.rewards, RewardTable::default());
    assert_eq!(cfg.retry, RetryPolicy::default());
    assert!(cfg.badges.is_empty());
  }

  #[test]
  fn sections_parse() {
    let cfg = EngineConfig::from_toml_str(
      r#"
[rewards]
perfect_score_bonus = 15

[retry]
max_attempts = 0

[[badges]]
id = "pipe_wizard"
name = "Pipe Wizard"
category = "skill"
rarity = "rare"
criteria = { type = "challenge_score", topic = "plumbing", min_score = 95 }

[[badges]]
id = "mystery"
name = "Mystery"
category = "special"
rarity = "legendary"
criteria = { type = "lunar_alignment" }

[[challenges]]
id = "plumb-101"
challenge_type = "quiz"
topic = "plumbing"
base_xp = 20
due_date = "2026-09-01T00:00:00Z"
"#,
    )
    .unwrap();

    assert_eq!(cfg.rewards.perfect_score_bonus, 15);
    assert_eq!(cfg.retry.max_attempts, 1);
    assert_eq!(
      cfg.badges[0].criteria,
      BadgeCriteria::ChallengeScore { topic: "plumbing".into(), min_score: 95 }
    );
    assert_eq!(cfg.badges[1].criteria, BadgeCriteria::Unrecognized);
    assert!(cfg.challenges[0].due_date.is_some());
  }

  #[test]
  fn bad_rows_are_skipped_and_other_sections_kept() {
    let cfg = EngineConfig::from_toml_str(
      r#"
[rewards]
late_penalty_enabled = false

[retry]
max_attempts = 9

[[badges]]
id = "half_streak"
name = "Half Streak"
category = "streak"
rarity = "common"
criteria = { type = "streak" }

[[badges]]
id = "odd_category"
name = "Odd"
category = "astrology"
rarity = "common"
criteria = { type = "challenge_completion", count = 1 }

[[badges]]
id = "pipe_wizard"
name = "Pipe Wizard"
category = "skill"
rarity = "rare"
criteria = { type = "challenge_score", topic = "plumbing", min_score = 95 }

[[challenges]]
id = "broken"
challenge_type = "seance"

[[challenges]]
id = "roof-101"
challenge_type = "quiz"
topic = "roofing"
base_xp = 20
"#,
    )
    .unwrap();

    assert!(!cfg.rewards.late_penalty_enabled);
    assert_eq!(cfg.retry.max_attempts, 9);
    let ids: Vec<_> = cfg.badges.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec!["pipe_wizard"]);
    let challenges: Vec<_> = cfg.challenges.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(challenges, vec!["roof-101"]);
  }

  #[test]
  fn bad_section_falls_back_alone() {
    let cfg = EngineConfig::from_toml_str(
      r#"
[rewards]
perfect_score_bonus = "lots"

[retry]
max_attempts = 3
"#,
    )
    .unwrap();
    assert_eq!(cfg.rewards, RewardTable::default());
    assert_eq!(cfg.retry.max_attempts, 3);
  }

  #[test]
  fn malformed_toml_is_an_error() {
    assert!(EngineConfig::from_toml_str("[rewards\nbroken").is_err());
  }
}
