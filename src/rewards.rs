//! Reward table: base XP per activity, bonus and penalty amounts, tier bands.
//!
//! Pure data. Every field has a default so a TOML `[rewards]` section can
//! override only what it needs.

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::domain::{ChallengeType, Difficulty, Tier};

/// One row of the base XP lookup.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BaseXpRow {
  pub challenge_type: ChallengeType,
  pub difficulty: Difficulty,
  pub xp: u32,
}

/// Lower XP bound and reward multiplier of a tier.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TierBand {
  pub tier: Tier,
  pub min_xp: u64,
  pub multiplier: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RewardTable {
  pub base_xp: Vec<BaseXpRow>,
  pub perfect_score_bonus: u32,
  pub speed_bonus: u32,
  pub first_attempt_bonus: u32,
  pub streak_bonus_per_day: u32,
  pub streak_bonus_max_days: u32,
  /// Minimum score for the challenge-declared bonus.
  pub bonus_score_threshold: u8,
  /// Floor of the score scaling factor applied to base XP.
  pub min_score_factor: f64,
  pub late_penalty: u32,
  /// Due dates are not populated everywhere; the penalty can be switched off.
  pub late_penalty_enabled: bool,
  pub resubmission_penalty: u32,
  pub milestone_xp: u32,
  /// Ascending by `min_xp`, first band at 0, one band per tier.
  pub tiers: Vec<TierBand>,
}

impl Default for RewardTable {
  fn default() -> Self {
    use ChallengeType::*;
    use Difficulty::*;
    let rows = [
      (Quiz, [20, 30, 45, 60]),
      (RealWorld, [50, 75, 100, 150]),
      (MiniGame, [15, 25, 35, 50]),
      (BossBattle, [100, 150, 200, 300]),
    ];
    let mut base_xp = Vec::new();
    for (challenge_type, xps) in rows {
      for (difficulty, xp) in [Beginner, Intermediate, Advanced, Expert].into_iter().zip(xps) {
        base_xp.push(BaseXpRow { challenge_type, difficulty, xp });
      }
    }

    Self {
      base_xp,
      perfect_score_bonus: 10,
      speed_bonus: 5,
      first_attempt_bonus: 5,
      streak_bonus_per_day: 2,
      streak_bonus_max_days: 14,
      bonus_score_threshold: 90,
      min_score_factor: 0.3,
      late_penalty: 10,
      late_penalty_enabled: true,
      resubmission_penalty: 3,
      milestone_xp: 100,
      tiers: default_tiers(),
    }
  }
}

pub fn default_tiers() -> Vec<TierBand> {
  vec![
    TierBand { tier: Tier::Apprentice, min_xp: 0, multiplier: 1.0 },
    TierBand { tier: Tier::Journeyman, min_xp: 100, multiplier: 1.1 },
    TierBand { tier: Tier::Master, min_xp: 300, multiplier: 1.25 },
    TierBand { tier: Tier::Contractor, min_xp: 600, multiplier: 1.5 },
    TierBand { tier: Tier::Boss, min_xp: 1000, multiplier: 2.0 },
  ]
}

impl RewardTable {
  /// Table lookup for a challenge's base XP, if configured.
  pub fn base_for(&self, challenge_type: ChallengeType, difficulty: Difficulty) -> Option<u32> {
    self.base_xp
      .iter()
      .find(|r| r.challenge_type == challenge_type && r.difficulty == difficulty)
      .map(|r| r.xp)
  }

  /// Replace a malformed tier table with the default one.
  pub fn sanitized(mut self) -> Self {
    if let Err(reason) = validate_tiers(&self.tiers) {
      error!(target: "progression", %reason, "Invalid tier table in configuration; using defaults");
      self.tiers = default_tiers();
    }
    if !(0.0..=1.0).contains(&self.min_score_factor) {
      error!(target: "progression", factor = self.min_score_factor, "min_score_factor out of range; using 0.3");
      self.min_score_factor = 0.3;
    }
    self
  }
}

fn validate_tiers(bands: &[TierBand]) -> Result<(), String> {
  if bands.len() != Tier::ALL.len() {
    return Err(format!("expected {} bands, found {}", Tier::ALL.len(), bands.len()));
  }
  for (band, tier) in bands.iter().zip(Tier::ALL) {
    if band.tier != tier {
      return Err(format!("band for {} out of order", band.tier));
    }
    if !band.multiplier.is_finite() || band.multiplier < 1.0 {
      return Err(format!("multiplier for {} must be >= 1.0", band.tier));
    }
  }
  if bands[0].min_xp != 0 {
    return Err("first band must start at 0 XP".into());
  }
  if bands.windows(2).any(|w| w[0].min_xp >= w[1].min_xp) {
    return Err("thresholds must be strictly ascending".into());
  }
  Ok(())
}
