//! XP calculation for graded submissions and business milestones.
//!
//! Pure functions over the reward table and the user's snapshot *before* the
//! award. The result carries an itemized breakdown whose lines always sum to
//! `total_xp`.

use serde::Serialize;

use crate::domain::{Challenge, Submission, UserProgress};
use crate::rewards::RewardTable;
use crate::tier::multiplier_for;
use crate::util::scale_xp;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum XpComponent {
  Base,
  PerfectScore,
  Speed,
  FirstAttempt,
  Streak,
  ChallengeBonus,
  LateSubmission,
  Resubmission,
  TierMultiplier,
  Milestone,
  MinimumAward,
}

impl XpComponent {
  pub fn label(self) -> &'static str {
    match self {
      XpComponent::Base => "base",
      XpComponent::PerfectScore => "perfect score",
      XpComponent::Speed => "speed",
      XpComponent::FirstAttempt => "first attempt",
      XpComponent::Streak => "streak",
      XpComponent::ChallengeBonus => "challenge bonus",
      XpComponent::LateSubmission => "late submission",
      XpComponent::Resubmission => "resubmission",
      XpComponent::TierMultiplier => "tier multiplier",
      XpComponent::Milestone => "milestone",
      XpComponent::MinimumAward => "minimum award",
    }
  }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct XpLine {
  pub component: XpComponent,
  pub amount: i64,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct XpAward {
  pub base_xp: i64,
  pub bonus_xp: i64,
  /// Non-positive.
  pub penalty_xp: i64,
  pub tier_multiplier_xp: i64,
  /// Always >= 1.
  pub total_xp: u64,
  pub breakdown: Vec<XpLine>,
}

impl XpAward {
  /// Comma-separated names of the bonus lines, for the submission record.
  pub fn bonus_reason(&self) -> String {
    self.breakdown
      .iter()
      .filter(|l| is_bonus(l.component))
      .map(|l| l.component.label())
      .collect::<Vec<_>>()
      .join(", ")
  }

  pub fn amount_of(&self, component: XpComponent) -> i64 {
    self.breakdown.iter().filter(|l| l.component == component).map(|l| l.amount).sum()
  }
}

fn is_bonus(c: XpComponent) -> bool {
  matches!(
    c,
    XpComponent::PerfectScore
      | XpComponent::Speed
      | XpComponent::FirstAttempt
      | XpComponent::Streak
      | XpComponent::ChallengeBonus
  )
}

#[derive(Default)]
struct Breakdown {
  lines: Vec<XpLine>,
}

impl Breakdown {
  fn push(&mut self, component: XpComponent, amount: i64) {
    if amount != 0 {
      self.lines.push(XpLine { component, amount });
    }
  }

  fn sum_where(&self, pred: impl Fn(XpComponent) -> bool) -> i64 {
    self.lines.iter().filter(|l| pred(l.component)).map(|l| l.amount).sum()
  }

  fn finish(mut self, base_xp: i64, bonus_xp: i64, penalty_xp: i64, tier_multiplier_xp: i64) -> XpAward {
    let raw = base_xp + bonus_xp + penalty_xp + tier_multiplier_xp;
    if raw < 1 {
      self.push(XpComponent::MinimumAward, 1 - raw);
    }
    XpAward {
      base_xp,
      bonus_xp,
      penalty_xp,
      tier_multiplier_xp,
      total_xp: raw.max(1) as u64,
      breakdown: self.lines,
    }
  }
}

/// XP for an approved submission.
pub fn compute_xp(
  table: &RewardTable,
  challenge: &Challenge,
  submission: &Submission,
  user: &UserProgress,
) -> XpAward {
  let mut out = Breakdown::default();
  let score = submission.score.min(100);

  // 1-2. Base, scaled by score with a floor so a zero still earns something.
  let declared = table
    .base_for(challenge.challenge_type, challenge.difficulty)
    .unwrap_or(challenge.base_xp);
  let factor = (f64::from(score) / 100.0).max(table.min_score_factor);
  let base_xp = scale_xp(i64::from(declared), factor);
  out.push(XpComponent::Base, base_xp);

  // 3. Independent bonuses.
  if score == 100 {
    out.push(XpComponent::PerfectScore, i64::from(table.perfect_score_bonus));
  }
  if let (Some(estimated_min), Some(spent_s)) = (challenge.estimated_time, submission.time_spent) {
    if f64::from(spent_s) < 0.5 * f64::from(estimated_min) * 60.0 {
      out.push(XpComponent::Speed, i64::from(table.speed_bonus));
    }
  }
  if !submission.is_resubmission {
    out.push(XpComponent::FirstAttempt, i64::from(table.first_attempt_bonus));
  }
  let streak_days = user.current_streak.min(table.streak_bonus_max_days);
  out.push(XpComponent::Streak, i64::from(streak_days) * i64::from(table.streak_bonus_per_day));
  if score >= table.bonus_score_threshold {
    out.push(XpComponent::ChallengeBonus, i64::from(challenge.bonus_xp));
  }

  // 4. Penalties.
  if table.late_penalty_enabled {
    if let Some(due) = challenge.due_date {
      if submission.submitted_at > due {
        out.push(XpComponent::LateSubmission, -i64::from(table.late_penalty));
      }
    }
  }
  if submission.attempt_number > 2 {
    let extra = i64::from(submission.attempt_number - 2);
    out.push(XpComponent::Resubmission, -extra * i64::from(table.resubmission_penalty));
  }

  let bonus_xp = out.sum_where(is_bonus);
  let penalty_xp = out.sum_where(|c| matches!(c, XpComponent::LateSubmission | XpComponent::Resubmission));

  // 5. Multiplier of the tier held before this award, reported on its own line.
  let multiplier = multiplier_for(&table.tiers, user.cumulative_xp);
  let tier_multiplier_xp = scale_xp(base_xp + bonus_xp, multiplier - 1.0);
  out.push(XpComponent::TierMultiplier, tier_multiplier_xp);

  out.finish(base_xp, bonus_xp, penalty_xp, tier_multiplier_xp)
}

/// XP for a business milestone: fixed base times the current tier multiplier.
pub fn compute_milestone_xp(table: &RewardTable, user: &UserProgress) -> XpAward {
  let mut out = Breakdown::default();
  let base_xp = i64::from(table.milestone_xp);
  out.push(XpComponent::Milestone, base_xp);
  let multiplier = multiplier_for(&table.tiers, user.cumulative_xp);
  let tier_multiplier_xp = scale_xp(base_xp, multiplier - 1.0);
  out.push(XpComponent::TierMultiplier, tier_multiplier_xp);
  out.finish(base_xp, 0, 0, tier_multiplier_xp)
}
