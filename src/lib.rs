//! Progression & rewards engine for the trade-apprenticeship platform.
//!
//! Given a graded challenge submission or a business milestone, the engine
//! computes the XP earned, resolves tier promotions and awards badges, then
//! persists the user's snapshot with a single compare-and-swap.
//!
//! - [`xp`], [`tier`], [`badges`]: pure calculators over a snapshot
//! - [`engine`]: the write path (`apply_approval`, `award_milestone`)
//! - [`store`]: versioned snapshot persistence
//! - [`routes`]: a thin HTTP adapter used by the bundled binary

pub mod badges;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod rewards;
pub mod routes;
pub mod seeds;
pub mod state;
pub mod store;
pub mod streak;
pub mod telemetry;
pub mod tier;
pub mod util;
pub mod xp;
