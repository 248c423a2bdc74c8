//! Day-granular activity streaks (UTC days).

use time::{OffsetDateTime, UtcOffset};

use crate::domain::UserProgress;

/// Record a qualifying activity at `at`.
///
/// Same day leaves the streak unchanged, the next day extends it, a missed
/// day restarts it at 1. Activity dated before the last one is ignored.
pub fn record_activity(user: &mut UserProgress, at: OffsetDateTime) {
  let today = at.to_offset(UtcOffset::UTC).date();
  match user.last_activity.map(|t| t.to_offset(UtcOffset::UTC).date()) {
    None => user.current_streak = 1,
    Some(last) => {
      let gap = (today - last).whole_days();
      match gap {
        g if g < 0 => return,
        0 => user.current_streak = user.current_streak.max(1),
        1 => user.current_streak += 1,
        _ => user.current_streak = 1,
      }
    }
  }
  user.last_activity = Some(at);
  user.longest_streak = user.longest_streak.max(user.current_streak);
}
