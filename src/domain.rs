//! Domain models used by the engine: challenges, submissions, the user
//! progression snapshot, tiers, and badge definitions.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub type UserId = String;
pub type ChallengeId = String;
pub type SubmissionId = String;
pub type BadgeId = String;

/// What kind of activity a challenge is.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeType {
  Quiz,
  RealWorld,
  MiniGame,
  BossBattle,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
  #[default]
  Beginner,
  Intermediate,
  Advanced,
  Expert,
}

/// A challenge as referenced by graded submissions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Challenge {
  pub id: ChallengeId,
  #[serde(default)] pub title: String,
  pub challenge_type: ChallengeType,
  #[serde(default)] pub difficulty: Difficulty,
  /// Trade topic, e.g. "plumbing" or "electrical".
  pub topic: String,
  /// Declared reward, used when the reward table has no row for this type/difficulty.
  #[serde(default)] pub base_xp: u32,
  /// Extra reward for scoring at or above the bonus threshold.
  #[serde(default)] pub bonus_xp: u32,
  /// Minutes.
  #[serde(default)] pub estimated_time: Option<u32>,
  #[serde(default, with = "time::serde::rfc3339::option")]
  pub due_date: Option<OffsetDateTime>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
  Submitted,
  Approved,
  NeedsRevision,
}

/// Reward summary written back onto a submission after approval.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmissionRewards {
  pub xp_awarded: u64,
  /// Bonus component already contained in `xp_awarded`.
  pub bonus_xp: u64,
  pub bonus_reason: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Submission {
  pub id: SubmissionId,
  pub user_id: UserId,
  pub challenge_id: ChallengeId,
  /// 0-100.
  pub score: u8,
  /// Seconds.
  #[serde(default)] pub time_spent: Option<u32>,
  #[serde(default = "first_attempt")] pub attempt_number: u32,
  #[serde(default)] pub is_resubmission: bool,
  #[serde(with = "time::serde::rfc3339")]
  pub submitted_at: OffsetDateTime,
  pub status: SubmissionStatus,
  #[serde(default)] pub rewards: Option<SubmissionRewards>,
}

fn first_attempt() -> u32 { 1 }

/// Ordered progression ranks. Declaration order is promotion order.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
  #[default]
  Apprentice,
  Journeyman,
  Master,
  Contractor,
  Boss,
}

impl Tier {
  pub const ALL: [Tier; 5] = [Tier::Apprentice, Tier::Journeyman, Tier::Master, Tier::Contractor, Tier::Boss];

  pub fn as_str(self) -> &'static str {
    match self {
      Tier::Apprentice => "apprentice",
      Tier::Journeyman => "journeyman",
      Tier::Master => "master",
      Tier::Contractor => "contractor",
      Tier::Boss => "boss",
    }
  }

  /// Badge id awarded on promotion into this tier. The entry tier has none.
  pub fn badge_id(self) -> Option<BadgeId> {
    match self {
      Tier::Apprentice => None,
      other => Some(format!("tier_{}", other.as_str())),
    }
  }
}

impl std::fmt::Display for Tier {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BadgeCategory {
  Achievement,
  Skill,
  Milestone,
  Streak,
  Tier,
  Special,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum BadgeRarity {
  Common,
  Uncommon,
  Rare,
  Epic,
  Legendary,
}

/// Declarative badge requirement. Each kind carries its own payload.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BadgeCriteria {
  ChallengeCompletion { count: u32 },
  TopicCompletion { topic: String, percentage: f64 },
  ChallengeScore { topic: String, min_score: u8 },
  BusinessMilestone { milestone: String },
  PerfectScores { count: u32 },
  Streak { days: u32 },
  AverageScore { challenge_count: u32, min_score: f64 },
  /// Only granted explicitly (grading action or tier promotion).
  Manual,
  /// Anything the catalog names that this build does not know.
  #[serde(other)]
  Unrecognized,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BadgeDefinition {
  pub id: BadgeId,
  pub name: String,
  #[serde(default)] pub description: String,
  pub category: BadgeCategory,
  pub rarity: BadgeRarity,
  pub criteria: BadgeCriteria,
}

/// Why a badge landed on a user.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AwardReason {
  Criteria,
  Promotion { tier: Tier },
  Granted { submission_id: SubmissionId },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BadgeAward {
  #[serde(with = "time::serde::rfc3339")]
  pub awarded_at: OffsetDateTime,
  pub reason: AwardReason,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum XpSource {
  Challenge { challenge_id: ChallengeId, submission_id: SubmissionId },
  Milestone { milestone: String },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct XpHistoryEntry {
  pub amount: u64,
  pub source: XpSource,
  pub description: String,
  #[serde(with = "time::serde::rfc3339")]
  pub at: OffsetDateTime,
}

/// One row of the completed-challenges ledger, in completion order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletedChallenge {
  pub challenge_id: ChallengeId,
  pub submission_id: SubmissionId,
  pub topic: String,
  pub score: u8,
  #[serde(with = "time::serde::rfc3339")]
  pub completed_at: OffsetDateTime,
}

/// Everything the engine knows about a user's progression.
///
/// Mutated only by the orchestrator in [`crate::engine`]; `tier` always equals
/// the tier implied by `cumulative_xp` under the configured table.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct UserProgress {
  pub user_id: UserId,
  pub cumulative_xp: u64,
  pub tier: Tier,
  pub current_streak: u32,
  pub longest_streak: u32,
  #[serde(default, with = "time::serde::rfc3339::option")]
  pub last_activity: Option<OffsetDateTime>,
  pub challenges_completed: u32,
  #[serde(default)] pub completed: Vec<CompletedChallenge>,
  #[serde(default)] pub xp_history: Vec<XpHistoryEntry>,
  #[serde(default)] pub badges: BTreeMap<BadgeId, BadgeAward>,
  #[serde(default)] pub milestones: BTreeSet<String>,
  /// Submissions whose approval has already been rewarded.
  #[serde(default)] pub rewarded_submissions: BTreeSet<SubmissionId>,
}

impl UserProgress {
  /// Zeroed snapshot created at registration.
  pub fn new(user_id: impl Into<UserId>) -> Self {
    Self { user_id: user_id.into(), ..Self::default() }
  }

  pub fn has_badge(&self, id: &str) -> bool {
    self.badges.contains_key(id)
  }

  pub fn has_completed(&self, challenge_id: &str) -> bool {
    self.completed.iter().any(|c| c.challenge_id == challenge_id)
  }

  /// Set-insert; returns false when the badge was already held.
  pub fn award_badge(&mut self, id: BadgeId, award: BadgeAward) -> bool {
    if self.badges.contains_key(&id) {
      return false;
    }
    self.badges.insert(id, award);
    true
  }
}
