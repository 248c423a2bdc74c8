//! Seed data: the built-in badge catalog and a small challenge bank.

use crate::domain::{
  BadgeCategory, BadgeCriteria, BadgeDefinition, BadgeRarity, Challenge, ChallengeType, Difficulty, Tier,
};

fn badge(
  id: &str,
  name: &str,
  description: &str,
  category: BadgeCategory,
  rarity: BadgeRarity,
  criteria: BadgeCriteria,
) -> BadgeDefinition {
  BadgeDefinition {
    id: id.into(),
    name: name.into(),
    description: description.into(),
    category,
    rarity,
    criteria,
  }
}

/// Catalog every deployment starts from. Configuration may add or replace entries.
pub fn seed_badges() -> Vec<BadgeDefinition> {
  use BadgeRarity::*;
  use BadgeCategory as Cat;

  let mut out = vec![
    badge("first_steps", "First Steps", "Completed your first challenge.", Cat::Achievement, Common,
      BadgeCriteria::ChallengeCompletion { count: 1 }),
    badge("dedicated_learner", "Dedicated Learner", "Completed 10 challenges.", Cat::Achievement, Uncommon,
      BadgeCriteria::ChallengeCompletion { count: 10 }),
    badge("tradesperson", "Tradesperson", "Completed 50 challenges.", Cat::Achievement, Epic,
      BadgeCriteria::ChallengeCompletion { count: 50 }),
    badge("plumbing_pro", "Plumbing Pro", "Completed every plumbing challenge.", Cat::Skill, Rare,
      BadgeCriteria::TopicCompletion { topic: "plumbing".into(), percentage: 100.0 }),
    badge("electrical_ace", "Electrical Ace", "Scored 90 or more on an electrical challenge.", Cat::Skill, Uncommon,
      BadgeCriteria::ChallengeScore { topic: "electrical".into(), min_score: 90 }),
    badge("first_client", "First Client", "Landed your first paying client.", Cat::Milestone, Rare,
      BadgeCriteria::BusinessMilestone { milestone: "first_client".into() }),
    badge("licensed", "Licensed", "Obtained a trade license.", Cat::Milestone, Epic,
      BadgeCriteria::BusinessMilestone { milestone: "license_obtained".into() }),
    badge("perfectionist", "Perfectionist", "Five perfect scores.", Cat::Achievement, Rare,
      BadgeCriteria::PerfectScores { count: 5 }),
    badge("week_warrior", "Week Warrior", "Seven days in a row.", Cat::Streak, Uncommon,
      BadgeCriteria::Streak { days: 7 }),
    badge("month_of_grit", "Month of Grit", "Thirty days in a row.", Cat::Streak, Legendary,
      BadgeCriteria::Streak { days: 30 }),
    badge("consistent_performer", "Consistent Performer", "Averaged 85 or more over your last five challenges.",
      Cat::Achievement, Rare, BadgeCriteria::AverageScore { challenge_count: 5, min_score: 85.0 }),
    badge("safety_first", "Safety First", "Recognized by an instructor for safe work habits.", Cat::Special, Uncommon,
      BadgeCriteria::Manual),
  ];

  for tier in Tier::ALL {
    if let Some(id) = tier.badge_id() {
      let rarity = match tier {
        Tier::Apprentice | Tier::Journeyman => Common,
        Tier::Master => Rare,
        Tier::Contractor => Epic,
        Tier::Boss => Legendary,
      };
      let name = format!("Reached {}", tier);
      let description = format!("Promoted to the {} tier.", tier);
      out.push(badge(&id, &name, &description, BadgeCategory::Tier, rarity, BadgeCriteria::Manual));
    }
  }
  out
}

/// Minimal challenge bank so the host is useful without configuration.
pub fn seed_challenges() -> Vec<Challenge> {
  let c = |id: &str, title: &str, challenge_type, difficulty, topic: &str, base_xp, bonus_xp, estimated_time| Challenge {
    id: id.into(),
    title: title.into(),
    challenge_type,
    difficulty,
    topic: topic.into(),
    base_xp,
    bonus_xp,
    estimated_time,
    due_date: None,
  };
  vec![
    c("plumb-101", "Pipe sizing basics", ChallengeType::Quiz, Difficulty::Beginner, "plumbing", 20, 5, Some(15)),
    c("plumb-201", "Fix a leaking trap", ChallengeType::RealWorld, Difficulty::Intermediate, "plumbing", 75, 10, Some(60)),
    c("elec-101", "Circuit safety quiz", ChallengeType::Quiz, Difficulty::Beginner, "electrical", 20, 5, Some(15)),
    c("elec-301", "Panel wiring sim", ChallengeType::MiniGame, Difficulty::Advanced, "electrical", 35, 5, Some(30)),
    c("biz-boss", "Quote a full remodel", ChallengeType::BossBattle, Difficulty::Expert, "business", 300, 50, None),
  ]
}
