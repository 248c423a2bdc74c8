//! Tier resolution: cumulative XP to tier, multiplier, and next-tier progress.

use serde::Serialize;

use crate::domain::Tier;
use crate::rewards::TierBand;

/// Progress towards the next tier. `next` is `None` at the top tier.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct NextTierInfo {
  pub current: Tier,
  pub next: Option<Tier>,
  pub next_threshold: Option<u64>,
  pub xp_remaining: u64,
  /// 0-100 within the current band; 100 at the top tier.
  pub progress_percent: f64,
}

/// Highest band whose threshold does not exceed `xp`.
fn band_for(bands: &[TierBand], xp: u64) -> Option<(usize, &TierBand)> {
  bands.iter().enumerate().rev().find(|(_, b)| xp >= b.min_xp)
}

pub fn tier_for(bands: &[TierBand], xp: u64) -> Tier {
  band_for(bands, xp).map(|(_, b)| b.tier).unwrap_or_default()
}

pub fn multiplier_for(bands: &[TierBand], xp: u64) -> f64 {
  band_for(bands, xp).map(|(_, b)| b.multiplier).unwrap_or(1.0)
}

pub fn next_tier_info(bands: &[TierBand], xp: u64) -> NextTierInfo {
  let Some((idx, band)) = band_for(bands, xp) else {
    return NextTierInfo {
      current: Tier::default(),
      next: None,
      next_threshold: None,
      xp_remaining: 0,
      progress_percent: 0.0,
    };
  };

  match bands.get(idx + 1) {
    Some(next) => {
      let span = next.min_xp - band.min_xp;
      let into = xp - band.min_xp;
      NextTierInfo {
        current: band.tier,
        next: Some(next.tier),
        next_threshold: Some(next.min_xp),
        xp_remaining: next.min_xp - xp,
        progress_percent: (into as f64 / span as f64) * 100.0,
      }
    }
    None => NextTierInfo {
      current: band.tier,
      next: None,
      next_threshold: None,
      xp_remaining: 0,
      progress_percent: 100.0,
    },
  }
}
