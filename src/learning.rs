//! Experience store and reward learner
//!
//! Every completed cycle leaves one `Experience` behind: the market
//! features the decision saw, the action taken, and the reward the
//! next cycle observed. The store is a fixed-capacity ring buffer;
//! training runs every `train_every_cycles` cycles and is fully
//! decoupled from the trading path, which only ever reads the shared
//! model snapshot.
//!
//! Training produces two things: a refreshed random-forest reward
//! model for the optimizer source, and small weight nudges toward the
//! sources whose votes lined up with realized rewards.

use crate::config::with_config;
use crate::errors::SwarmBotError;
use crate::events::{self, Severity};
use crate::logger::{self, LogTag};
use crate::market::MarketSnapshot;
use crate::paths;
use crate::swarm::{Opinion, SourceWeights, TradeAction};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use serde_json::json;
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub type ForestModel = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Model handle shared between the learner and the optimizer source;
/// None until the first training round completes
pub type SharedModel = Arc<Mutex<Option<ForestModel>>>;

pub fn new_shared_model() -> SharedModel {
    Arc::new(Mutex::new(None))
}

pub const FEATURE_COUNT: usize = 5;

/// Feature vector for one snapshot: short return, window return,
/// fast/slow SMA gap, volatility, spread
pub fn market_features(snapshot: &MarketSnapshot) -> Vec<f64> {
    let closes = &snapshot.closes;
    let last = closes.last().copied().unwrap_or(snapshot.price);

    let ret_short = if closes.len() >= 2 && closes[closes.len() - 2] > 0.0 {
        last / closes[closes.len() - 2] - 1.0
    } else {
        0.0
    };

    let ret_window = match closes.first() {
        Some(first) if *first > 0.0 => last / first - 1.0,
        _ => 0.0,
    };

    let (fast_window, slow_window) =
        with_config(|cfg| (cfg.swarm.sma_fast_window, cfg.swarm.sma_slow_window));
    let sma_gap = match (
        crate::swarm::technical::sma(closes, fast_window),
        crate::swarm::technical::sma(closes, slow_window),
    ) {
        (Some(fast), Some(slow)) if slow > 0.0 => (fast - slow) / slow,
        _ => 0.0,
    };

    vec![
        ret_short,
        ret_window,
        sma_gap,
        snapshot.volatility,
        snapshot.spread,
    ]
}

/// One completed decision cycle, as the learner sees it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    pub symbol: String,
    pub features: Vec<f64>,
    pub action: TradeAction,
    /// Cycle PnL as a fraction of allocated capital
    pub reward: f64,
    /// Features the following cycle observed
    pub next_features: Vec<f64>,
    pub opinions: Vec<Opinion>,
    pub timestamp: DateTime<Utc>,
}

/// Fixed-capacity ring buffer of experiences, oldest evicted first
pub struct ExperienceStore {
    records: VecDeque<Experience>,
    capacity: usize,
}

impl ExperienceStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, experience: Experience) {
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(experience);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Experience> {
        self.records.iter()
    }

    /// Persist the buffer as JSON under the learning directory
    pub fn save_to_disk(&self) -> Result<(), SwarmBotError> {
        let records: Vec<&Experience> = self.records.iter().collect();
        let json = serde_json::to_string(&records)?;
        std::fs::write(paths::experience_snapshot_path(), json)
            .map_err(|e| SwarmBotError::transient(format!("experience snapshot write: {}", e)))?;
        Ok(())
    }

    /// Load a previous snapshot, ignoring a missing file
    pub fn load_from_disk(&mut self) -> Result<usize, SwarmBotError> {
        let path = paths::experience_snapshot_path();
        if !path.exists() {
            return Ok(0);
        }

        let json = std::fs::read_to_string(&path)
            .map_err(|e| SwarmBotError::transient(format!("experience snapshot read: {}", e)))?;
        let records: Vec<Experience> = serde_json::from_str(&json)?;
        let loaded = records.len();
        for record in records {
            self.push(record);
        }
        Ok(loaded)
    }
}

/// Fit the reward forest on (features, reward) pairs
pub fn train_model(features: &[Vec<f64>], rewards: &[f64]) -> Result<ForestModel, SwarmBotError> {
    if features.len() != rewards.len() || features.is_empty() {
        return Err(SwarmBotError::validation("empty or mismatched training set"));
    }

    let matrix = DenseMatrix::from_2d_vec(&features.to_vec())
        .map_err(|e| SwarmBotError::critical(format!("training matrix build: {}", e)))?;
    let targets: Vec<f64> = rewards.to_vec();

    let params = RandomForestRegressorParameters {
        n_trees: 32,
        max_depth: Some(8),
        min_samples_leaf: 2,
        min_samples_split: 4,
        m: Option::None,
        keep_samples: false,
        seed: 42,
    };

    RandomForestRegressor::fit(&matrix, &targets, params)
        .map_err(|e| SwarmBotError::critical(format!("model fit failed: {}", e)))
}

/// Per-source alignment between votes and realized rewards, in [-1, 1]
///
/// A source earns credit for every record where its vote matched the
/// executed action and the reward was positive (or it dissented before
/// a loss); abstentions earn nothing.
pub fn alignment_scores(store: &ExperienceStore, weights: &SourceWeights) -> Vec<(String, f64)> {
    let mut scores: Vec<(String, f64, f64)> = weights
        .all()
        .keys()
        .map(|name| (name.clone(), 0.0, 0.0))
        .collect();

    for record in store.iter() {
        for opinion in &record.opinions {
            if opinion.confidence <= 0.0 {
                continue;
            }
            if let Some(entry) = scores.iter_mut().find(|(name, _, _)| *name == opinion.source) {
                let signed = if opinion.action == record.action {
                    record.reward
                } else {
                    -record.reward
                };
                entry.1 += signed;
                entry.2 += record.reward.abs();
            }
        }
    }

    scores
        .into_iter()
        .map(|(name, signed, mass)| {
            let score = if mass > 0.0 { signed / mass } else { 0.0 };
            (name, score.clamp(-1.0, 1.0))
        })
        .collect()
}

/// Nudge each source weight by `learning_rate * alignment`
fn apply_weight_nudges(weights: &SourceWeights, scores: &[(String, f64)], learning_rate: f64) {
    for (source, score) in scores {
        let delta = learning_rate * score;
        if delta.abs() > f64::EPSILON {
            weights.adjust(source, delta);
            logger::debug(
                LogTag::Learner,
                &format!("Weight {} {:+.4} -> {:.4}", source, delta, weights.get(source)),
            );
        }
    }
}

/// Owns the experience buffer and the periodic training cadence
pub struct Learner {
    store: ExperienceStore,
    model: SharedModel,
    weights: SourceWeights,
    train_every: u64,
    min_records: usize,
    learning_rate: f64,
    persist: bool,
    trainings: Arc<AtomicU64>,
}

impl Learner {
    pub fn from_config(model: SharedModel, weights: SourceWeights) -> Self {
        let (capacity, train_every, min_records, learning_rate, persist) = with_config(|cfg| {
            (
                cfg.learner.experience_capacity,
                cfg.learner.train_every_cycles,
                cfg.learner.min_records_for_training,
                cfg.learner.learning_rate,
                cfg.learner.persist_experience,
            )
        });

        let mut store = ExperienceStore::new(capacity);
        if persist {
            match store.load_from_disk() {
                Ok(0) => {}
                Ok(n) => logger::info(
                    LogTag::Learner,
                    &format!("Restored {} experience records from disk", n),
                ),
                Err(e) => logger::warning(
                    LogTag::Learner,
                    &format!("Could not restore experience snapshot: {}", e),
                ),
            }
        }

        Self {
            store,
            model,
            weights,
            train_every: train_every.max(1),
            min_records,
            learning_rate,
            persist,
            trainings: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record(&mut self, experience: Experience) {
        self.store.push(experience);
    }

    pub fn record_count(&self) -> usize {
        self.store.len()
    }

    pub fn training_rounds(&self) -> u64 {
        self.trainings.load(Ordering::SeqCst)
    }

    /// Kick off a training round if this cycle lands on the cadence
    /// and enough records have accumulated. The fit itself runs on a
    /// blocking worker; the cycle path only snapshots the buffer and
    /// returns, and the refreshed model lands in the shared handle
    /// once the round completes. A failed round is logged and skipped.
    pub fn maybe_train(&mut self, cycle: u64) {
        if cycle == 0 || cycle % self.train_every != 0 {
            return;
        }
        if self.store.len() < self.min_records {
            logger::debug(
                LogTag::Learner,
                &format!(
                    "Skipping training: {} of {} records",
                    self.store.len(),
                    self.min_records
                ),
            );
            return;
        }

        let features: Vec<Vec<f64>> = self.store.iter().map(|e| e.features.clone()).collect();
        let rewards: Vec<f64> = self.store.iter().map(|e| e.reward).collect();
        let record_count = self.store.len();
        // Alignment is scored against the same buffer snapshot the
        // forest is fitted on
        let scores = alignment_scores(&self.store, &self.weights);

        let model = self.model.clone();
        let weights = self.weights.clone();
        let trainings = self.trainings.clone();
        let learning_rate = self.learning_rate;

        tokio::spawn(async move {
            let fit = tokio::task::spawn_blocking(move || train_model(&features, &rewards)).await;
            match fit {
                Ok(Ok(fitted)) => {
                    *model.lock() = Some(fitted);
                    let round = trainings.fetch_add(1, Ordering::SeqCst) + 1;
                    apply_weight_nudges(&weights, &scores, learning_rate);
                    logger::info(
                        LogTag::Learner,
                        &format!(
                            "Training round {} complete on {} records",
                            round, record_count
                        ),
                    );
                    events::record_learner_event(
                        "training_round",
                        Severity::Info,
                        json!({ "round": round, "records": record_count }),
                    );
                }
                Ok(Err(e)) => {
                    logger::warning(LogTag::Learner, &format!("Training round failed: {}", e));
                    events::record_learner_event(
                        "training_failed",
                        Severity::Warning,
                        json!({ "records": record_count, "error": e.to_string() }),
                    );
                }
                Err(e) => {
                    logger::warning(LogTag::Learner, &format!("Training task aborted: {}", e));
                }
            }
        });

        if self.persist {
            if let Err(e) = self.store.save_to_disk() {
                logger::warning(LogTag::Learner, &format!("Snapshot save failed: {}", e));
            }
        }
    }

    /// Flush the buffer to disk on shutdown
    pub fn shutdown(&self) {
        if self.persist {
            if let Err(e) = self.store.save_to_disk() {
                logger::warning(LogTag::Learner, &format!("Final snapshot failed: {}", e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn experience(action: TradeAction, reward: f64) -> Experience {
        Experience {
            symbol: "BTCUSDT".to_string(),
            features: vec![0.001, 0.002, 0.0005, 0.001, 0.0002],
            action,
            reward,
            next_features: vec![0.0; FEATURE_COUNT],
            opinions: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn store_evicts_oldest_at_capacity() {
        let mut store = ExperienceStore::new(1000);
        for i in 0..1001 {
            let mut e = experience(TradeAction::Buy, i as f64);
            e.reward = i as f64;
            store.push(e);
        }
        assert_eq!(store.len(), 1000);
        // Record 0 was evicted; record 1 is now the oldest
        assert_eq!(store.iter().next().unwrap().reward, 1.0);
    }

    #[test]
    fn training_set_shape_is_validated() {
        assert!(train_model(&[], &[]).is_err());
        assert!(train_model(&[vec![0.0; FEATURE_COUNT]], &[0.1, 0.2]).is_err());
    }

    #[test]
    fn forest_learns_a_constant_signal() {
        let features: Vec<Vec<f64>> = (0..80)
            .map(|i| {
                let x = i as f64 / 80.0;
                vec![x, x * 0.5, x * 0.1, 0.001, 0.0002]
            })
            .collect();
        let rewards = vec![0.02; 80];

        let model = train_model(&features, &rewards).expect("fit should succeed");
        let matrix = DenseMatrix::from_2d_vec(&vec![features[40].clone()]).unwrap();
        let prediction = model.predict(&matrix).unwrap()[0];
        assert!((prediction - 0.02).abs() < 0.01);
    }

    #[test]
    fn aligned_source_scores_positive() {
        let weights = SourceWeights::from_config();
        let mut store = ExperienceStore::new(100);

        for _ in 0..10 {
            let mut agree = Opinion::new(crate::swarm::SOURCE_TECHNICAL, TradeAction::Buy, 0.8);
            agree.weight = 0.3;
            let mut dissent = Opinion::new(crate::swarm::SOURCE_SENTIMENT, TradeAction::Sell, 0.8);
            dissent.weight = 0.2;

            let mut record = experience(TradeAction::Buy, 0.01);
            record.opinions = vec![agree, dissent];
            store.push(record);
        }

        let scores = alignment_scores(&store, &weights);
        let technical = scores
            .iter()
            .find(|(n, _)| n == crate::swarm::SOURCE_TECHNICAL)
            .unwrap();
        let sentiment = scores
            .iter()
            .find(|(n, _)| n == crate::swarm::SOURCE_SENTIMENT)
            .unwrap();
        assert!(technical.1 > 0.0);
        assert!(sentiment.1 < 0.0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn training_runs_off_the_cycle_path() {
        let model = new_shared_model();
        let weights = SourceWeights::from_config();
        let mut learner = Learner::from_config(model.clone(), weights);

        for i in 0..60 {
            let x = i as f64 / 60.0;
            let mut record = experience(TradeAction::Buy, 0.01);
            record.features = vec![x, x * 0.5, x * 0.1, 0.001, 0.0002];
            learner.record(record);
        }

        // Returns immediately; the fitted forest lands in the shared
        // handle once the background round completes
        learner.maybe_train(10);

        for _ in 0..200 {
            if learner.training_rounds() > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(25)).await;
        }
        assert_eq!(learner.training_rounds(), 1);
        assert!(model.lock().is_some());
    }

    #[test]
    fn abstentions_do_not_move_scores() {
        let weights = SourceWeights::from_config();
        let mut store = ExperienceStore::new(100);

        let mut record = experience(TradeAction::Buy, 0.01);
        record.opinions = vec![Opinion::abstain(crate::swarm::SOURCE_SENTIMENT)];
        store.push(record);

        let scores = alignment_scores(&store, &weights);
        let sentiment = scores
            .iter()
            .find(|(n, _)| n == crate::swarm::SOURCE_SENTIMENT)
            .unwrap();
        assert_eq!(sentiment.1, 0.0);
    }
}
