//! Badge eligibility: a side-effect-free scan of the catalog against a
//! user snapshot.
//!
//! Every criteria kind is a pure predicate. Kinds that cannot be evaluated
//! (manual grants, names this build does not know) are never satisfied, so
//! a misconfigured catalog withholds badges instead of handing them out.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::domain::{BadgeCriteria, BadgeDefinition, BadgeId, Challenge, UserProgress};
use crate::util::percent_of;

/// Read-only badge catalog, in seeding order.
#[derive(Clone, Debug, Default, Serialize)]
pub struct BadgeCatalog {
  badges: Vec<BadgeDefinition>,
}

impl BadgeCatalog {
  pub fn new(badges: Vec<BadgeDefinition>) -> Self {
    let mut catalog = Self::default();
    for b in badges {
      catalog.upsert(b);
    }
    catalog
  }

  /// Same id replaces the existing definition in place.
  pub fn upsert(&mut self, badge: BadgeDefinition) {
    match self.badges.iter_mut().find(|b| b.id == badge.id) {
      Some(slot) => *slot = badge,
      None => self.badges.push(badge),
    }
  }

  pub fn get(&self, id: &str) -> Option<&BadgeDefinition> {
    self.badges.iter().find(|b| b.id == id)
  }

  pub fn iter(&self) -> impl Iterator<Item = &BadgeDefinition> {
    self.badges.iter()
  }

  pub fn len(&self) -> usize {
    self.badges.len()
  }

  pub fn is_empty(&self) -> bool {
    self.badges.is_empty()
  }
}

/// Number of known challenges per topic.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TopicIndex {
  totals: HashMap<String, usize>,
}

impl TopicIndex {
  pub fn from_challenges<'a>(challenges: impl IntoIterator<Item = &'a Challenge>) -> Self {
    let mut totals = HashMap::new();
    for c in challenges {
      *totals.entry(c.topic.clone()).or_insert(0) += 1;
    }
    Self { totals }
  }

  pub fn total(&self, topic: &str) -> usize {
    self.totals.get(topic).copied().unwrap_or(0)
  }
}

/// Ids of catalog badges the user qualifies for and does not already hold.
pub fn eligible_badges(user: &UserProgress, catalog: &BadgeCatalog, topics: &TopicIndex) -> BTreeSet<BadgeId> {
  catalog
    .iter()
    .filter(|b| !user.has_badge(&b.id))
    .filter(|b| satisfies(user, &b.criteria, topics))
    .map(|b| b.id.clone())
    .collect()
}

pub fn satisfies(user: &UserProgress, criteria: &BadgeCriteria, topics: &TopicIndex) -> bool {
  match criteria {
    BadgeCriteria::ChallengeCompletion { count } => user.challenges_completed >= *count,
    BadgeCriteria::TopicCompletion { topic, percentage } => {
      let done = distinct_in_topic(user, topic);
      percent_of(done, topics.total(topic)).is_some_and(|p| p >= *percentage)
    }
    BadgeCriteria::ChallengeScore { topic, min_score } => {
      user.completed.iter().any(|c| &c.topic == topic && c.score >= *min_score)
    }
    BadgeCriteria::BusinessMilestone { milestone } => user.milestones.contains(milestone),
    BadgeCriteria::PerfectScores { count } => {
      let perfect = user.completed.iter().filter(|c| c.score == 100).count();
      perfect >= *count as usize
    }
    BadgeCriteria::Streak { days } => user.current_streak >= *days,
    BadgeCriteria::AverageScore { challenge_count, min_score } => {
      let window = *challenge_count as usize;
      if window == 0 || user.completed.len() < window {
        return false;
      }
      let recent = &user.completed[user.completed.len() - window..];
      let sum: u32 = recent.iter().map(|c| u32::from(c.score)).sum();
      f64::from(sum) / window as f64 >= *min_score
    }
    BadgeCriteria::Manual | BadgeCriteria::Unrecognized => false,
  }
}

fn distinct_in_topic(user: &UserProgress, topic: &str) -> usize {
  user.completed
    .iter()
    .filter(|c| c.topic == topic)
    .map(|c| c.challenge_id.as_str())
    .collect::<BTreeSet<_>>()
    .len()
}

/// Per-kind counts, for the startup inventory log.
pub fn criteria_inventory(catalog: &BadgeCatalog) -> BTreeMap<&'static str, usize> {
  let mut out = BTreeMap::new();
  for b in catalog.iter() {
    let kind = match b.criteria {
      BadgeCriteria::ChallengeCompletion { .. } => "challenge_completion",
      BadgeCriteria::TopicCompletion { .. } => "topic_completion",
      BadgeCriteria::ChallengeScore { .. } => "challenge_score",
      BadgeCriteria::BusinessMilestone { .. } => "business_milestone",
      BadgeCriteria::PerfectScores { .. } => "perfect_scores",
      BadgeCriteria::Streak { .. } => "streak",
      BadgeCriteria::AverageScore { .. } => "average_score",
      BadgeCriteria::Manual => "manual",
      BadgeCriteria::Unrecognized => "unrecognized",
    };
    *out.entry(kind).or_insert(0) += 1;
  }
  out
}
