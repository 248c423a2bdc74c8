//! End-to-end reward application against the in-memory store, including
//! concurrent writers and misbehaving stores.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use time::macros::datetime;
use time::OffsetDateTime;

use tradecraft_progression::badges::{BadgeCatalog, TopicIndex};
use tradecraft_progression::config::RetryPolicy;
use tradecraft_progression::domain::{
  Challenge, ChallengeType, Difficulty, Submission, SubmissionStatus, Tier, UserProgress,
};
use tradecraft_progression::engine::{ApprovalRequest, ProgressionEngine, RewardStatus};
use tradecraft_progression::error::{EngineError, StoreError};
use tradecraft_progression::rewards::RewardTable;
use tradecraft_progression::seeds::{seed_badges, seed_challenges};
use tradecraft_progression::store::{InMemoryProgressStore, ProgressStore, Versioned, WriteOutcome};
use tradecraft_progression::xp::XpComponent;

fn engine_with(store: Arc<dyn ProgressStore>, retry: RetryPolicy) -> ProgressionEngine {
  ProgressionEngine::new(store, RewardTable::default(), BadgeCatalog::new(seed_badges()), retry)
}

fn engine() -> (ProgressionEngine, InMemoryProgressStore) {
  let store = InMemoryProgressStore::new();
  (engine_with(Arc::new(store.clone()), RetryPolicy::default()), store)
}

fn quiz() -> Challenge {
  Challenge {
    id: "plumb-101".into(),
    title: "Pipe sizing basics".into(),
    challenge_type: ChallengeType::Quiz,
    difficulty: Difficulty::Beginner,
    topic: "plumbing".into(),
    base_xp: 20,
    bonus_xp: 5,
    estimated_time: None,
    due_date: None,
  }
}

fn approval(user_id: &str, submission_id: &str, score: u8, at: OffsetDateTime) -> ApprovalRequest {
  ApprovalRequest {
    challenge: quiz(),
    submission: Submission {
      id: submission_id.into(),
      user_id: user_id.into(),
      challenge_id: "plumb-101".into(),
      score,
      time_spent: None,
      attempt_number: 1,
      is_resubmission: false,
      submitted_at: at,
      status: SubmissionStatus::Approved,
      rewards: None,
    },
    granted_badges: vec![],
    approved_at: at,
  }
}

fn topics() -> TopicIndex {
  TopicIndex::from_challenges(&seed_challenges())
}

#[tokio::test]
async fn perfect_first_attempt_with_five_day_streak_earns_fifty() {
  let (engine, store) = engine();
  let mut user = UserProgress::new("ana");
  user.current_streak = 5;
  user.longest_streak = 5;
  user.last_activity = Some(datetime!(2026-03-01 09:00 UTC));
  store.insert(user).await.unwrap();

  let outcome = engine
    .apply_approval("ana", &approval("ana", "s1", 100, datetime!(2026-03-02 09:00 UTC)), &topics())
    .await
    .unwrap();

  let xp = outcome.xp.unwrap();
  assert_eq!(xp.amount_of(XpComponent::Base), 20);
  assert_eq!(xp.amount_of(XpComponent::PerfectScore), 10);
  assert_eq!(xp.amount_of(XpComponent::FirstAttempt), 5);
  assert_eq!(xp.amount_of(XpComponent::Streak), 10);
  assert_eq!(xp.amount_of(XpComponent::ChallengeBonus), 5);
  assert_eq!(xp.total_xp, 50);
  assert_eq!(outcome.cumulative_xp, 50);

  let rewards = outcome.rewards.unwrap();
  assert_eq!(rewards.xp_awarded, 50);
  assert_eq!(rewards.bonus_xp, 30);

  let progress = engine.progress("ana").await.unwrap();
  assert_eq!(progress.current_streak, 6);
  assert_eq!(progress.longest_streak, 6);
}

#[tokio::test]
async fn replayed_approval_is_a_no_op() {
  let (engine, store) = engine();
  engine.register_user("ben").await.unwrap();
  let req = approval("ben", "s1", 85, datetime!(2026-03-02 09:00 UTC));

  let first = engine.apply_approval("ben", &req, &topics()).await.unwrap();
  let after_first = store.load("ben").await.unwrap().unwrap();

  let second = engine.apply_approval("ben", &req, &topics()).await.unwrap();
  let after_second = store.load("ben").await.unwrap().unwrap();

  assert_eq!(first.status, RewardStatus::Applied);
  assert_eq!(second.status, RewardStatus::AlreadyApplied);
  assert!(second.xp.is_none());
  assert_eq!(after_first, after_second);
}

#[tokio::test]
async fn crossing_one_hundred_promotes_to_journeyman() {
  let (engine, store) = engine();
  let mut user = UserProgress::new("cy");
  user.cumulative_xp = 95;
  store.insert(user).await.unwrap();

  // 20 * 0.5 = 10 base, resubmission so no first-attempt bonus: 95 -> 105.
  let mut req = approval("cy", "s1", 50, datetime!(2026-03-02 09:00 UTC));
  req.submission.is_resubmission = true;
  req.submission.attempt_number = 2;
  let outcome = engine.apply_approval("cy", &req, &topics()).await.unwrap();

  assert_eq!(outcome.cumulative_xp, 105);
  assert_eq!(outcome.previous_tier, Tier::Apprentice);
  assert_eq!(outcome.tier, Tier::Journeyman);
  assert!(outcome.promoted);
  let tier_badges: Vec<_> = outcome.new_badges.iter().filter(|b| b.starts_with("tier_")).collect();
  assert_eq!(tier_badges, vec!["tier_journeyman"]);

  let stored = store.load("cy").await.unwrap().unwrap().value;
  assert_eq!(stored.tier, Tier::Journeyman);
  assert!(stored.has_badge("tier_journeyman"));
}

#[tokio::test]
async fn rejects_unapproved_and_foreign_submissions() {
  let (engine, _) = engine();
  engine.register_user("dee").await.unwrap();

  let mut pending = approval("dee", "s1", 90, datetime!(2026-03-02 09:00 UTC));
  pending.submission.status = SubmissionStatus::NeedsRevision;
  assert!(matches!(
    engine.apply_approval("dee", &pending, &topics()).await,
    Err(EngineError::SubmissionNotApproved(_))
  ));

  let foreign = approval("someone-else", "s2", 90, datetime!(2026-03-02 09:00 UTC));
  assert!(matches!(
    engine.apply_approval("dee", &foreign, &topics()).await,
    Err(EngineError::SubmissionUserMismatch { .. })
  ));

  let ghost = approval("ghost", "s3", 90, datetime!(2026-03-02 09:00 UTC));
  assert!(matches!(
    engine.apply_approval("ghost", &ghost, &topics()).await,
    Err(EngineError::UnknownUser(_))
  ));
}

#[tokio::test]
async fn milestone_awards_scaled_xp_and_badge_once() {
  let (engine, _) = engine();
  engine.register_user("eve").await.unwrap();
  let at = datetime!(2026-03-02 09:00 UTC);

  let first = engine.award_milestone("eve", "first_client", at, &topics()).await.unwrap();
  assert_eq!(first.xp.as_ref().map(|x| x.total_xp), Some(100));
  assert!(first.new_badges.contains(&"first_client".to_string()));

  let again = engine.award_milestone("eve", "first_client", at, &topics()).await.unwrap();
  assert_eq!(again.status, RewardStatus::AlreadyApplied);
  assert_eq!(again.cumulative_xp, 100);
}

#[tokio::test]
async fn completing_the_topic_awards_topic_badge() {
  let (engine, _) = engine();
  engine.register_user("fay").await.unwrap();
  let at = datetime!(2026-03-02 09:00 UTC);

  let first = engine.apply_approval("fay", &approval("fay", "s1", 80, at), &topics()).await.unwrap();
  assert!(!first.new_badges.contains(&"plumbing_pro".to_string()));

  let mut second = approval("fay", "s2", 80, at);
  second.challenge = seed_challenges().into_iter().find(|c| c.id == "plumb-201").unwrap();
  second.submission.challenge_id = "plumb-201".into();
  let outcome = engine.apply_approval("fay", &second, &topics()).await.unwrap();
  assert!(outcome.new_badges.contains(&"plumbing_pro".to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_approvals_for_one_user_lose_nothing() {
  let store = InMemoryProgressStore::new();
  let engine = engine_with(Arc::new(store.clone()), RetryPolicy { max_attempts: 1_000, backoff_ms: 1 });
  engine.register_user("gus").await.unwrap();
  let topics = topics();

  let mut handles = Vec::new();
  for i in 0..20 {
    let engine = engine.clone();
    let topics = topics.clone();
    handles.push(tokio::spawn(async move {
      let req = approval("gus", &format!("s{i}"), 70, datetime!(2026-03-02 09:00 UTC));
      engine.apply_approval("gus", &req, &topics).await
    }));
  }

  let mut awarded = 0;
  for h in handles {
    let outcome = h.await.unwrap().unwrap();
    awarded += outcome.xp.unwrap().total_xp;
  }

  let stored = store.load("gus").await.unwrap().unwrap().value;
  assert_eq!(stored.cumulative_xp, awarded);
  assert_eq!(stored.xp_history.len(), 20);
  assert_eq!(stored.rewarded_submissions.len(), 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_users_do_not_interfere() {
  let (engine, store) = engine();
  let topics = topics();
  for i in 0..8 {
    engine.register_user(&format!("user{i}")).await.unwrap();
  }

  let mut handles = Vec::new();
  for i in 0..8 {
    let engine = engine.clone();
    let topics = topics.clone();
    handles.push(tokio::spawn(async move {
      let user = format!("user{i}");
      let req = approval(&user, "s1", 100, datetime!(2026-03-02 09:00 UTC));
      engine.apply_approval(&user, &req, &topics).await
    }));
  }
  for h in handles {
    let outcome = h.await.unwrap().unwrap();
    assert_eq!(outcome.attempts, 1);
    let stored = store.load(&outcome.user_id).await.unwrap().unwrap().value;
    assert_eq!(stored.cumulative_xp, outcome.cumulative_xp);
  }
}

/// Lets another writer sneak in before each of the first `interferences` swaps.
struct InterferingStore {
  inner: InMemoryProgressStore,
  interferences: AtomicU32,
}

#[async_trait]
impl ProgressStore for InterferingStore {
  async fn load(&self, user_id: &str) -> Result<Option<Versioned<UserProgress>>, StoreError> {
    self.inner.load(user_id).await
  }

  async fn insert(&self, progress: UserProgress) -> Result<bool, StoreError> {
    self.inner.insert(progress).await
  }

  async fn compare_and_swap(&self, expected_version: u64, next: UserProgress) -> Result<WriteOutcome, StoreError> {
    let left = self.interferences.load(Ordering::SeqCst);
    if left > 0 {
      self.interferences.store(left - 1, Ordering::SeqCst);
      let current = self.inner.load(&next.user_id).await?.unwrap();
      let mut bumped = current.value;
      bumped.cumulative_xp += 7;
      self.inner.compare_and_swap(current.version, bumped).await?;
    }
    self.inner.compare_and_swap(expected_version, next).await
  }
}

#[tokio::test]
async fn conflicting_write_is_replanned_on_fresh_state() {
  let store = Arc::new(InterferingStore { inner: InMemoryProgressStore::new(), interferences: AtomicU32::new(2) });
  let engine = engine_with(store.clone(), RetryPolicy { max_attempts: 5, backoff_ms: 0 });
  engine.register_user("hal").await.unwrap();

  let outcome = engine
    .apply_approval("hal", &approval("hal", "s1", 100, datetime!(2026-03-02 09:00 UTC)), &topics())
    .await
    .unwrap();

  assert_eq!(outcome.attempts, 3);
  let stored = store.load("hal").await.unwrap().unwrap().value;
  // Both interfering bumps survive alongside the award.
  assert_eq!(stored.cumulative_xp, 14 + outcome.xp.unwrap().total_xp);
}

#[tokio::test]
async fn exhausted_retries_surface_an_error() {
  let store = Arc::new(InterferingStore { inner: InMemoryProgressStore::new(), interferences: AtomicU32::new(u32::MAX) });
  let engine = engine_with(store.clone(), RetryPolicy { max_attempts: 3, backoff_ms: 0 });
  engine.register_user("ivy").await.unwrap();

  let result = engine
    .apply_approval("ivy", &approval("ivy", "s1", 100, datetime!(2026-03-02 09:00 UTC)), &topics())
    .await;
  assert!(matches!(result, Err(EngineError::ConflictRetriesExhausted { attempts: 3, .. })));

  let stored = store.load("ivy").await.unwrap().unwrap().value;
  assert!(stored.rewarded_submissions.is_empty());
  assert!(stored.xp_history.is_empty());
}

/// Fails the first swap with a transient error.
struct FlakyStore {
  inner: InMemoryProgressStore,
  failures: AtomicU32,
}

#[async_trait]
impl ProgressStore for FlakyStore {
  async fn load(&self, user_id: &str) -> Result<Option<Versioned<UserProgress>>, StoreError> {
    self.inner.load(user_id).await
  }

  async fn insert(&self, progress: UserProgress) -> Result<bool, StoreError> {
    self.inner.insert(progress).await
  }

  async fn compare_and_swap(&self, expected_version: u64, next: UserProgress) -> Result<WriteOutcome, StoreError> {
    if self.failures.load(Ordering::SeqCst) > 0 {
      self.failures.fetch_sub(1, Ordering::SeqCst);
      return Err(StoreError::Unavailable("disk busy".into()));
    }
    self.inner.compare_and_swap(expected_version, next).await
  }
}

#[tokio::test]
async fn transient_store_failure_is_retried() {
  let store = Arc::new(FlakyStore { inner: InMemoryProgressStore::new(), failures: AtomicU32::new(1) });
  let engine = engine_with(store.clone(), RetryPolicy { max_attempts: 3, backoff_ms: 0 });
  engine.register_user("jo").await.unwrap();

  let outcome = engine
    .apply_approval("jo", &approval("jo", "s1", 90, datetime!(2026-03-02 09:00 UTC)), &topics())
    .await
    .unwrap();
  assert_eq!(outcome.status, RewardStatus::Applied);
  assert_eq!(outcome.attempts, 2);
}
