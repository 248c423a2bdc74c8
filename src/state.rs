//! Application state: the progression engine plus the challenge bank the
//! grading flow resolves challenge ids against.
//!
//! This module owns:
//!   - the challenge store (by id) and the per-topic totals derived from it
//!   - the engine (reward table, badge catalog, progress store)
//!
//! Configuration comes from TOML when PROGRESSION_CONFIG_PATH is set; the
//! built-in seeds are always present unless an entry with the same id
//! overrides them.

use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::badges::{criteria_inventory, BadgeCatalog, TopicIndex};
use crate::config::{load_engine_config_from_env, EngineConfig};
use crate::domain::Challenge;
use crate::engine::ProgressionEngine;
use crate::seeds::{seed_badges, seed_challenges};
use crate::store::{InMemoryProgressStore, ProgressStore};

#[derive(Clone)]
pub struct AppState {
    pub challenges: Arc<RwLock<HashMap<String, Challenge>>>,
    pub engine: ProgressionEngine,
}

impl AppState {
    /// Build state from env: load config, seed challenges and badges, in-memory store.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_engine_config_from_env().unwrap_or_default();
        Self::from_config(cfg, Arc::new(InMemoryProgressStore::new()))
    }

    pub fn from_config(cfg: EngineConfig, store: Arc<dyn ProgressStore>) -> Self {
        let mut id_map = HashMap::<String, Challenge>::new();
        for c in seed_challenges() {
            id_map.insert(c.id.clone(), c);
        }
        // Config-bank entries win over seeds with the same id.
        for c in cfg.challenges {
            id_map.insert(c.id.clone(), c);
        }

        let mut catalog = BadgeCatalog::new(seed_badges());
        for b in cfg.badges {
            catalog.upsert(b);
        }

        let topics = TopicIndex::from_challenges(id_map.values());
        let mut topic_names: Vec<_> = id_map.values().map(|c| c.topic.as_str()).collect();
        topic_names.sort_unstable();
        topic_names.dedup();
        for topic in topic_names {
            info!(target: "tradecraft", %topic, challenges = topics.total(topic), "Startup challenge inventory");
        }
        for (kind, count) in criteria_inventory(&catalog) {
            info!(target: "badges", %kind, count, "Startup badge inventory");
        }

        Self {
            challenges: Arc::new(RwLock::new(id_map)),
            engine: ProgressionEngine::new(store, cfg.rewards, catalog, cfg.retry),
        }
    }

    /// Read-only access to a challenge by id.
    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn get_challenge(&self, id: &str) -> Option<Challenge> {
        self.challenges.read().await.get(id).cloned()
    }

    /// Per-topic totals of the current bank.
    pub async fn topics(&self) -> TopicIndex {
        TopicIndex::from_challenges(self.challenges.read().await.values())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
