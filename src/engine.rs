//! Reward application: the only write path for XP, tier, streak and badges.
//!
//! Each operation runs a read → plan → compare-and-swap cycle against one
//! user's snapshot. Planning is pure (see [`plan_approval`] and
//! [`plan_milestone`]), so a lost race costs nothing but a re-plan, and a
//! failure before the write leaves the stored snapshot untouched.
//!
//! Idempotency rides on the snapshot itself: the ids of rewarded submissions
//! and completed milestones are part of the versioned document, so the
//! "already applied?" check and the write commit together.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};

use crate::badges::{eligible_badges, BadgeCatalog, TopicIndex};
use crate::config::RetryPolicy;
use crate::domain::{
  AwardReason, BadgeAward, BadgeId, Challenge, CompletedChallenge, Submission, SubmissionRewards,
  SubmissionStatus, Tier, UserProgress, XpHistoryEntry, XpSource,
};
use crate::error::{EngineError, StoreError};
use crate::rewards::RewardTable;
use crate::store::{ProgressStore, WriteOutcome};
use crate::streak::record_activity;
use crate::tier::{next_tier_info, tier_for, NextTierInfo};
use crate::xp::{compute_milestone_xp, compute_xp, XpAward};

/// A grading action that moved a submission to `approved`.
#[derive(Clone, Debug)]
pub struct ApprovalRequest {
  pub challenge: Challenge,
  pub submission: Submission,
  /// Badges the grader handed out explicitly.
  pub granted_badges: Vec<BadgeId>,
  pub approved_at: OffsetDateTime,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RewardStatus {
  Applied,
  /// This event had already been rewarded; nothing changed.
  AlreadyApplied,
}

/// What a reward application did, for the caller to surface.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct RewardOutcome {
  pub user_id: String,
  pub status: RewardStatus,
  pub xp: Option<XpAward>,
  /// Values to record on the submission (approvals only).
  pub rewards: Option<SubmissionRewards>,
  pub previous_tier: Tier,
  pub tier: Tier,
  pub promoted: bool,
  /// Sorted.
  pub new_badges: Vec<BadgeId>,
  pub cumulative_xp: u64,
  pub attempts: u32,
}

impl RewardOutcome {
  fn replay(user: &UserProgress) -> Self {
    Self {
      user_id: user.user_id.clone(),
      status: RewardStatus::AlreadyApplied,
      xp: None,
      rewards: None,
      previous_tier: user.tier,
      tier: user.tier,
      promoted: false,
      new_badges: Vec::new(),
      cumulative_xp: user.cumulative_xp,
      attempts: 0,
    }
  }
}

/// Read-only progression view for reporting consumers.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ProgressView {
  pub user_id: String,
  pub cumulative_xp: u64,
  pub tier: Tier,
  pub next_tier: NextTierInfo,
  pub current_streak: u32,
  pub longest_streak: u32,
  pub challenges_completed: u32,
  pub badges: Vec<BadgeId>,
  pub milestones: Vec<String>,
}

/// Result of planning against one snapshot.
#[derive(Debug)]
pub enum Plan {
  Replay(RewardOutcome),
  Write { next: UserProgress, outcome: RewardOutcome },
}

/// Shared, read-only inputs of every plan.
pub struct Rules<'a> {
  pub rewards: &'a RewardTable,
  pub catalog: &'a BadgeCatalog,
  pub topics: &'a TopicIndex,
}

/// Compute the snapshot after approving `req`, without touching storage.
pub fn plan_approval(rules: &Rules<'_>, user: &UserProgress, req: &ApprovalRequest) -> Plan {
  let submission = &req.submission;
  let challenge = &req.challenge;
  if user.rewarded_submissions.contains(&submission.id) {
    return Plan::Replay(RewardOutcome::replay(user));
  }

  let mut next = user.clone();
  let mut new_badges = Vec::new();

  if !next.has_completed(&challenge.id) {
    next.completed.push(CompletedChallenge {
      challenge_id: challenge.id.clone(),
      submission_id: submission.id.clone(),
      topic: challenge.topic.clone(),
      score: submission.score.min(100),
      completed_at: req.approved_at,
    });
    next.challenges_completed += 1;
  }

  // XP is computed against the snapshot as it was before this award.
  let award = compute_xp(rules.rewards, challenge, submission, user);
  let name = if challenge.title.is_empty() { &challenge.id } else { &challenge.title };
  credit(
    &mut next,
    &award,
    XpSource::Challenge { challenge_id: challenge.id.clone(), submission_id: submission.id.clone() },
    format!("{name} scored {}", submission.score.min(100)),
    req.approved_at,
  );

  promote(rules, &mut next, user.tier, req.approved_at, &mut new_badges);

  for id in &req.granted_badges {
    if rules.catalog.get(id).is_none() {
      warn!(target: "badges", badge = %id, submission = %submission.id, "Ignoring grant of badge missing from catalog");
      continue;
    }
    let grant = BadgeAward {
      awarded_at: req.approved_at,
      reason: AwardReason::Granted { submission_id: submission.id.clone() },
    };
    if next.award_badge(id.clone(), grant) {
      new_badges.push(id.clone());
    }
  }

  record_activity(&mut next, req.approved_at);
  award_eligible(rules, &mut next, req.approved_at, &mut new_badges);
  next.rewarded_submissions.insert(submission.id.clone());

  let rewards = SubmissionRewards {
    xp_awarded: award.total_xp,
    bonus_xp: award.bonus_xp.max(0) as u64,
    bonus_reason: award.bonus_reason(),
  };
  let outcome = applied(user, &next, Some(award), Some(rewards), new_badges);
  Plan::Write { next, outcome }
}

/// Compute the snapshot after completing a business milestone.
pub fn plan_milestone(rules: &Rules<'_>, user: &UserProgress, milestone: &str, at: OffsetDateTime) -> Plan {
  if user.milestones.contains(milestone) {
    return Plan::Replay(RewardOutcome::replay(user));
  }

  let mut next = user.clone();
  let mut new_badges = Vec::new();
  next.milestones.insert(milestone.to_string());

  let award = compute_milestone_xp(rules.rewards, user);
  credit(
    &mut next,
    &award,
    XpSource::Milestone { milestone: milestone.to_string() },
    format!("milestone {milestone}"),
    at,
  );
  promote(rules, &mut next, user.tier, at, &mut new_badges);
  award_eligible(rules, &mut next, at, &mut new_badges);

  let outcome = applied(user, &next, Some(award), None, new_badges);
  Plan::Write { next, outcome }
}

fn credit(next: &mut UserProgress, award: &XpAward, source: XpSource, description: String, at: OffsetDateTime) {
  next.cumulative_xp = next.cumulative_xp.saturating_add(award.total_xp);
  next.xp_history.push(XpHistoryEntry { amount: award.total_xp, source, description, at });
}

/// Re-resolve the tier; a change awards that tier's badge.
fn promote(rules: &Rules<'_>, next: &mut UserProgress, previous: Tier, at: OffsetDateTime, new_badges: &mut Vec<BadgeId>) {
  let tier = tier_for(&rules.rewards.tiers, next.cumulative_xp);
  next.tier = tier;
  if tier == previous {
    return;
  }
  info!(target: "progression", user_id = %next.user_id, from = %previous, to = %tier, xp = next.cumulative_xp, "Tier promotion");
  if let Some(id) = tier.badge_id() {
    if next.award_badge(id.clone(), BadgeAward { awarded_at: at, reason: AwardReason::Promotion { tier } }) {
      new_badges.push(id);
    }
  }
}

fn award_eligible(rules: &Rules<'_>, next: &mut UserProgress, at: OffsetDateTime, new_badges: &mut Vec<BadgeId>) {
  for id in eligible_badges(next, rules.catalog, rules.topics) {
    if next.award_badge(id.clone(), BadgeAward { awarded_at: at, reason: AwardReason::Criteria }) {
      new_badges.push(id);
    }
  }
}

fn applied(
  before: &UserProgress,
  after: &UserProgress,
  xp: Option<XpAward>,
  rewards: Option<SubmissionRewards>,
  mut new_badges: Vec<BadgeId>,
) -> RewardOutcome {
  new_badges.sort();
  new_badges.dedup();
  RewardOutcome {
    user_id: after.user_id.clone(),
    status: RewardStatus::Applied,
    xp,
    rewards,
    previous_tier: before.tier,
    tier: after.tier,
    promoted: after.tier != before.tier,
    new_badges,
    cumulative_xp: after.cumulative_xp,
    attempts: 0,
  }
}

/// Orchestrates reward application against a [`ProgressStore`].
#[derive(Clone)]
pub struct ProgressionEngine {
  store: Arc<dyn ProgressStore>,
  rewards: Arc<RewardTable>,
  catalog: Arc<BadgeCatalog>,
  retry: RetryPolicy,
}

impl ProgressionEngine {
  pub fn new(store: Arc<dyn ProgressStore>, rewards: RewardTable, catalog: BadgeCatalog, retry: RetryPolicy) -> Self {
    Self {
      store,
      rewards: Arc::new(rewards),
      catalog: Arc::new(catalog),
      retry,
    }
  }

  pub fn rewards(&self) -> &RewardTable {
    &self.rewards
  }

  pub fn catalog(&self) -> &BadgeCatalog {
    &self.catalog
  }

  /// Create the zeroed snapshot for a new user.
  #[instrument(level = "info", skip(self))]
  pub async fn register_user(&self, user_id: &str) -> Result<UserProgress, EngineError> {
    let progress = UserProgress::new(user_id);
    if !self.store.insert(progress.clone()).await? {
      return Err(EngineError::UserExists(user_id.to_string()));
    }
    info!(target: "progression", %user_id, "Registered user");
    Ok(progress)
  }

  #[instrument(level = "debug", skip(self))]
  pub async fn progress(&self, user_id: &str) -> Result<ProgressView, EngineError> {
    let user = self
      .store
      .load(user_id)
      .await?
      .ok_or_else(|| EngineError::UnknownUser(user_id.to_string()))?
      .value;
    Ok(ProgressView {
      next_tier: next_tier_info(&self.rewards.tiers, user.cumulative_xp),
      badges: user.badges.keys().cloned().collect(),
      milestones: user.milestones.iter().cloned().collect(),
      user_id: user.user_id,
      cumulative_xp: user.cumulative_xp,
      tier: user.tier,
      current_streak: user.current_streak,
      longest_streak: user.longest_streak,
      challenges_completed: user.challenges_completed,
    })
  }

  /// Apply an approval event exactly once. Replays are a successful no-op.
  #[instrument(
    level = "info",
    skip(self, req, topics),
    fields(%user_id, submission = %req.submission.id, challenge = %req.challenge.id)
  )]
  pub async fn apply_approval(
    &self,
    user_id: &str,
    req: &ApprovalRequest,
    topics: &TopicIndex,
  ) -> Result<RewardOutcome, EngineError> {
    if req.submission.status != SubmissionStatus::Approved {
      return Err(EngineError::SubmissionNotApproved(req.submission.id.clone()));
    }
    if req.submission.user_id != user_id {
      return Err(EngineError::SubmissionUserMismatch {
        submission_id: req.submission.id.clone(),
        owner: req.submission.user_id.clone(),
        user_id: user_id.to_string(),
      });
    }

    let rules = self.rules(topics);
    let outcome = self.commit(user_id, |user| plan_approval(&rules, user, req)).await?;
    match outcome.status {
      RewardStatus::Applied => info!(
        target: "progression",
        %user_id,
        submission = %req.submission.id,
        xp = outcome.xp.as_ref().map(|x| x.total_xp).unwrap_or(0),
        total = outcome.cumulative_xp,
        tier = %outcome.tier,
        badges = ?outcome.new_badges,
        "Approval rewarded"
      ),
      RewardStatus::AlreadyApplied => info!(target: "progression", %user_id, submission = %req.submission.id, "Approval already rewarded; no-op"),
    }
    Ok(outcome)
  }

  /// Award a business milestone once, then re-check badge eligibility.
  #[instrument(level = "info", skip(self, topics))]
  pub async fn award_milestone(
    &self,
    user_id: &str,
    milestone: &str,
    at: OffsetDateTime,
    topics: &TopicIndex,
  ) -> Result<RewardOutcome, EngineError> {
    let rules = self.rules(topics);
    let outcome = self.commit(user_id, |user| plan_milestone(&rules, user, milestone, at)).await?;
    if outcome.status == RewardStatus::Applied {
      info!(target: "progression", %user_id, %milestone, total = outcome.cumulative_xp, badges = ?outcome.new_badges, "Milestone rewarded");
    }
    Ok(outcome)
  }

  fn rules<'a>(&'a self, topics: &'a TopicIndex) -> Rules<'a> {
    Rules { rewards: &self.rewards, catalog: &self.catalog, topics }
  }

  /// Optimistic write loop: load, plan, compare-and-swap, re-plan on conflict.
  async fn commit<F>(&self, user_id: &str, plan: F) -> Result<RewardOutcome, EngineError>
  where
    F: Fn(&UserProgress) -> Plan + Send + Sync,
  {
    let max = self.retry.max_attempts.max(1);
    for attempt in 1..=max {
      let current = self
        .store
        .load(user_id)
        .await?
        .ok_or_else(|| EngineError::UnknownUser(user_id.to_string()))?;

      let (next, mut outcome) = match plan(&current.value) {
        Plan::Replay(mut outcome) => {
          outcome.attempts = attempt;
          return Ok(outcome);
        }
        Plan::Write { next, outcome } => (next, outcome),
      };

      match self.store.compare_and_swap(current.version, next).await {
        Ok(WriteOutcome::Committed { .. }) => {
          outcome.attempts = attempt;
          return Ok(outcome);
        }
        Ok(WriteOutcome::Conflict { current: now }) => {
          warn!(target: "progression", %user_id, attempt, read = current.version, now, "Concurrent update; retrying");
        }
        Err(e) if is_transient(&e) && attempt < max => {
          warn!(target: "progression", %user_id, attempt, error = %e, "Store write failed; retrying");
        }
        Err(e) => return Err(e.into()),
      }
      if attempt < max {
        tokio::time::sleep(self.backoff(attempt)).await;
      }
    }

    error!(target: "progression", %user_id, attempts = max, "Retries exhausted; award not applied");
    Err(EngineError::ConflictRetriesExhausted { user_id: user_id.to_string(), attempts: max })
  }

  fn backoff(&self, attempt: u32) -> Duration {
    let base = self.retry.backoff_ms.saturating_mul(u64::from(attempt));
    let jitter = if self.retry.backoff_ms == 0 { 0 } else { rand::thread_rng().gen_range(0..=self.retry.backoff_ms) };
    Duration::from_millis(base + jitter)
  }
}

fn is_transient(e: &StoreError) -> bool {
  matches!(e, StoreError::Io(_) | StoreError::Unavailable(_))
}
