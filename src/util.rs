//! Small numeric helpers used across modules.

/// Ratios are fixed to four decimal places before scaling.
const RATIO_SCALE: i128 = 10_000;

/// `amount * ratio`, rounded half away from zero.
///
/// The product is taken in integer ten-thousandths so exact halves such as
/// `50 * 0.57` round up instead of landing just below `.5`.
pub fn scale_xp(amount: i64, ratio: f64) -> i64 {
  if !ratio.is_finite() {
    return 0;
  }
  let ratio = (ratio * RATIO_SCALE as f64).round() as i128;
  let scaled = i128::from(amount) * ratio;
  let half = RATIO_SCALE / 2;
  let rounded = if scaled >= 0 { (scaled + half) / RATIO_SCALE } else { (scaled - half) / RATIO_SCALE };
  i64::try_from(rounded).unwrap_or(if rounded > 0 { i64::MAX } else { i64::MIN })
}

/// `part / whole` as a percentage; `None` when `whole` is zero.
pub fn percent_of(part: usize, whole: usize) -> Option<f64> {
  if whole == 0 { None } else { Some(part as f64 / whole as f64 * 100.0) }
}
