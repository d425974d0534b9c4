//! The persisted learning state: every prediction ever recorded plus the statistics
//! derived from resolved ones. Loaded wholesale, mutated in place, saved wholesale.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::factors::canonical_key;
use crate::weights::{WeightVector, round1};

pub const MEMORY_VERSION: u32 = 2;
pub const ROLLING_CAP: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorVote {
    pub favored: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionEntry {
    pub match_id: String,
    pub date: DateTime<Utc>,
    pub player1: String,
    pub player2: String,
    pub predicted_winner: String,
    pub confidence: f64,
    #[serde(default)]
    pub factors: BTreeMap<String, FactorVote>,
    /// Score string once resolved; `None` while pending.
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub actual_winner: Option<String>,
    #[serde(default)]
    pub correct: Option<bool>,
}

impl PredictionEntry {
    pub fn is_pending(&self) -> bool {
        self.result.is_none()
    }

    pub fn is_resolved(&self) -> bool {
        self.correct.is_some()
    }

    pub fn favored_by(&self, factor: &str) -> Option<&str> {
        self.factors.get(factor).map(|v| v.favored.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FactorAccuracy {
    pub correct: u32,
    pub total: u32,
    pub accuracy: f64,
}

impl FactorAccuracy {
    pub fn record(&mut self, hit: bool) {
        self.total += 1;
        if hit {
            self.correct += 1;
        }
        self.recompute();
    }

    pub fn recompute(&mut self) {
        self.correct = self.correct.min(self.total);
        self.accuracy = pct(self.correct, self.total);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub correct: u32,
    pub total: u32,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollingWindows {
    pub last10: WindowStats,
    pub last20: WindowStats,
    pub last50: WindowStats,
    /// Oldest first, 1 = correct.
    pub history: Vec<u8>,
}

impl RollingWindows {
    pub fn push(&mut self, correct: bool) {
        self.history.push(u8::from(correct));
        self.refresh();
    }

    /// Truncates history to the cap and re-derives every sub-window from its suffix.
    pub fn refresh(&mut self) {
        if self.history.len() > ROLLING_CAP {
            let excess = self.history.len() - ROLLING_CAP;
            self.history.drain(..excess);
        }
        for v in self.history.iter_mut() {
            *v = (*v).min(1);
        }
        self.last10 = self.window(10);
        self.last20 = self.window(20);
        self.last50 = self.window(50);
    }

    fn window(&self, n: usize) -> WindowStats {
        let start = self.history.len().saturating_sub(n);
        let tail = &self.history[start..];
        let correct = tail.iter().map(|v| u32::from(*v)).sum();
        let total = tail.len() as u32;
        WindowStats {
            correct,
            total,
            accuracy: pct(correct, total),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Streaks {
    /// Positive for consecutive hits, negative for consecutive misses.
    pub current: i32,
    pub longest_win: u32,
    pub longest_loss: u32,
}

impl Streaks {
    pub fn push(&mut self, correct: bool) {
        self.current = match (correct, self.current) {
            (true, c) if c > 0 => c + 1,
            (true, _) => 1,
            (false, c) if c < 0 => c - 1,
            (false, _) => -1,
        };
        if self.current > 0 {
            self.longest_win = self.longest_win.max(self.current.unsigned_abs());
        } else {
            self.longest_loss = self.longest_loss.max(self.current.unsigned_abs());
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationBucket {
    pub avg_confidence: f64,
    /// Percentage of the bucket's predictions that were correct.
    pub actual_win_rate: f64,
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Calibration {
    pub buckets: BTreeMap<String, CalibrationBucket>,
    pub last_calibrated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpsetLogEntry {
    pub tag: String,
    pub upsets: u32,
    pub total: u32,
    pub rate: f64,
}

impl UpsetLogEntry {
    pub fn recompute(&mut self) {
        self.upsets = self.upsets.min(self.total);
        self.rate = pct(self.upsets, self.total);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct H2HRecord {
    /// Lexicographically smaller name of the pair.
    pub player_a: String,
    pub player_b: String,
    pub wins_a: u32,
    pub wins_b: u32,
    #[serde(default)]
    pub last_meeting: Option<DateTime<Utc>>,
}

impl H2HRecord {
    pub fn new(p1: &str, p2: &str) -> Self {
        let (a, b) = sorted_pair(p1, p2);
        Self {
            player_a: a.to_string(),
            player_b: b.to_string(),
            ..Self::default()
        }
    }

    pub fn wins_for(&self, name: &str) -> u32 {
        let name = name.trim();
        if name == self.player_a {
            self.wins_a
        } else if name == self.player_b {
            self.wins_b
        } else {
            0
        }
    }

    pub fn meetings(&self) -> u32 {
        self.wins_a + self.wins_b
    }

    /// Returns false when `winner` is neither side of the pair.
    pub fn record_win(&mut self, winner: &str, date: DateTime<Utc>) -> bool {
        let winner = winner.trim();
        if winner == self.player_a {
            self.wins_a += 1;
        } else if winner == self.player_b {
            self.wins_b += 1;
        } else {
            return false;
        }
        self.last_meeting = Some(self.last_meeting.map_or(date, |d| d.max(date)));
        true
    }
}

fn sorted_pair<'a>(p1: &'a str, p2: &'a str) -> (&'a str, &'a str) {
    let (p1, p2) = (p1.trim(), p2.trim());
    if p1 <= p2 { (p1, p2) } else { (p2, p1) }
}

/// Canonical key for a player pair, independent of argument order.
pub fn pair_key(p1: &str, p2: &str) -> String {
    let (a, b) = sorted_pair(p1, p2);
    format!("{a}|{b}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    #[serde(default)]
    pub predictions: Vec<PredictionEntry>,
    #[serde(default)]
    pub factor_accuracy: BTreeMap<String, FactorAccuracy>,
    #[serde(default)]
    pub learned_weights: WeightVector,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub total_predictions: u32,
    #[serde(default)]
    pub total_correct: u32,
    #[serde(default)]
    pub accuracy: f64,
    #[serde(default)]
    pub last_weight_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub calibration: Calibration,
    #[serde(default)]
    pub rolling_windows: RollingWindows,
    #[serde(default)]
    pub streaks: Streaks,
    #[serde(default)]
    pub upset_log: Vec<UpsetLogEntry>,
    #[serde(default)]
    pub h2h_results: BTreeMap<String, H2HRecord>,
    #[serde(default = "legacy_version")]
    pub version: u32,
}

fn legacy_version() -> u32 {
    1
}

impl Default for Memory {
    fn default() -> Self {
        Self::fresh(&WeightVector::core_defaults())
    }
}

impl Memory {
    /// Empty state: zeroed counters, the given weights, current schema version.
    pub fn fresh(weights: &WeightVector) -> Self {
        let factor_accuracy = weights
            .keys()
            .map(|k| (k.to_string(), FactorAccuracy::default()))
            .collect();
        Self {
            predictions: Vec::new(),
            factor_accuracy,
            learned_weights: weights.clone(),
            patterns: Vec::new(),
            total_predictions: 0,
            total_correct: 0,
            accuracy: 0.0,
            last_weight_update: None,
            calibration: Calibration::default(),
            rolling_windows: RollingWindows::default(),
            streaks: Streaks::default(),
            upset_log: Vec::new(),
            h2h_results: BTreeMap::new(),
            version: MEMORY_VERSION,
        }
    }

    /// Appends a pending entry. Returns false if the match id is already known.
    pub fn record_prediction(&mut self, entry: PredictionEntry) -> bool {
        if self.predictions.iter().any(|p| p.match_id == entry.match_id) {
            return false;
        }
        self.predictions.push(entry);
        self.total_predictions = self.predictions.len() as u32;
        true
    }

    pub fn contains(&self, match_id: &str) -> bool {
        self.predictions.iter().any(|p| p.match_id == match_id)
    }

    pub fn find_pending(&self, match_id: &str) -> Option<&PredictionEntry> {
        self.predictions
            .iter()
            .find(|p| p.match_id == match_id && p.is_pending())
    }

    pub fn pending(&self) -> impl Iterator<Item = &PredictionEntry> {
        self.predictions.iter().filter(|p| p.is_pending())
    }

    pub fn pending_ids(&self) -> Vec<&str> {
        self.pending().map(|p| p.match_id.as_str()).collect()
    }

    pub fn resolved(&self) -> impl Iterator<Item = &PredictionEntry> {
        self.predictions.iter().filter(|p| p.is_resolved())
    }

    pub fn resolved_count(&self) -> usize {
        self.resolved().count()
    }

    pub fn upset_entry(&self, tag: &str) -> Option<&UpsetLogEntry> {
        self.upset_log.iter().find(|e| e.tag == tag)
    }

    /// Re-derives the global hit counters from every resolved entry.
    pub fn recompute_totals(&mut self) {
        let resolved = self.resolved_count() as u32;
        self.total_correct = self
            .resolved()
            .filter(|p| p.correct == Some(true))
            .count() as u32;
        self.accuracy = pct(self.total_correct, resolved);
        self.total_predictions = self.predictions.len() as u32;
    }
}

/// Brings a loaded blob up to the current schema. Older blobs predate calibration,
/// rolling windows, streaks, the upset log and learned head-to-head; serde fills those
/// with empty defaults and this pass repairs everything derived from them.
pub fn upgrade(mut memory: Memory, defaults: &WeightVector) -> Memory {
    if memory.version < MEMORY_VERSION {
        info!(
            from = memory.version,
            to = MEMORY_VERSION,
            predictions = memory.predictions.len(),
            "upgrading prediction memory"
        );
    }

    // Legacy factor names.
    let mut weights = WeightVector::default();
    for (key, w) in memory.learned_weights.iter() {
        let key = canonical_key(key);
        let merged = weights.get(&key).unwrap_or(0.0) + w;
        weights.set(key, merged);
    }
    let off_unit = (weights.sum() - 1.0).abs() > 1e-9;
    if !weights.is_valid() || (off_unit && !weights.normalize()) {
        weights = defaults.clone();
    }
    memory.learned_weights = weights;

    let mut accuracy: BTreeMap<String, FactorAccuracy> = BTreeMap::new();
    for (key, fa) in std::mem::take(&mut memory.factor_accuracy) {
        let merged = accuracy.entry(canonical_key(&key)).or_default();
        merged.correct += fa.correct;
        merged.total += fa.total;
    }
    for key in memory.learned_weights.keys() {
        accuracy.entry(key.to_string()).or_default();
    }
    for fa in accuracy.values_mut() {
        fa.recompute();
    }
    memory.factor_accuracy = accuracy;

    let mut seen = HashSet::new();
    memory.predictions.retain(|p| seen.insert(p.match_id.clone()));
    for entry in memory.predictions.iter_mut() {
        entry.factors = std::mem::take(&mut entry.factors)
            .into_iter()
            .map(|(k, v)| (canonical_key(&k), v))
            .collect();
        if entry.result.is_none() {
            entry.actual_winner = None;
            entry.correct = None;
        }
    }
    memory.recompute_totals();

    // Blobs from before rolling windows existed get them replayed from resolved entries.
    if memory.rolling_windows.history.is_empty() && memory.streaks == Streaks::default() {
        let outcomes: Vec<bool> = memory.resolved().filter_map(|p| p.correct).collect();
        for hit in outcomes {
            memory.rolling_windows.history.push(u8::from(hit));
            memory.streaks.push(hit);
        }
    }
    memory.rolling_windows.refresh();
    let streaks = &mut memory.streaks;
    if streaks.current > 0 {
        streaks.longest_win = streaks.longest_win.max(streaks.current.unsigned_abs());
    } else {
        streaks.longest_loss = streaks.longest_loss.max(streaks.current.unsigned_abs());
    }
    for entry in memory.upset_log.iter_mut() {
        entry.recompute();
    }

    memory.h2h_results = std::mem::take(&mut memory.h2h_results)
        .into_values()
        .map(|mut r| {
            if r.player_a > r.player_b {
                std::mem::swap(&mut r.player_a, &mut r.player_b);
                std::mem::swap(&mut r.wins_a, &mut r.wins_b);
            }
            (pair_key(&r.player_a, &r.player_b), r)
        })
        .collect();

    memory.version = MEMORY_VERSION;
    memory
}

/// Percentage with one decimal, 0 when there is no sample.
pub(crate) fn pct(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round1(part as f64 / whole as f64 * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streak_sequence() {
        let mut s = Streaks::default();
        for hit in [true, true, true, false, true, true] {
            s.push(hit);
        }
        assert_eq!(s.current, 2);
        assert_eq!(s.longest_win, 3);
        assert_eq!(s.longest_loss, 1);
    }

    #[test]
    fn rolling_windows_cap_history() {
        let mut w = RollingWindows::default();
        for i in 0..60 {
            w.push(i % 3 == 0);
        }
        assert_eq!(w.history.len(), ROLLING_CAP);
        assert_eq!(w.last10.total, 10);
        assert_eq!(w.last50.total, 50);
        let expected: Vec<u8> = (10..60).map(|i| u8::from(i % 3 == 0)).collect();
        assert_eq!(w.history, expected);
    }

    #[test]
    fn pair_key_ignores_order() {
        assert_eq!(pair_key("Sinner", "Alcaraz"), pair_key("Alcaraz", "Sinner"));
        let r = H2HRecord::new("Sinner", "Alcaraz");
        assert_eq!(r.player_a, "Alcaraz");
    }

    #[test]
    fn record_prediction_dedupes() {
        let mut m = Memory::default();
        let entry = PredictionEntry {
            match_id: "m1".to_string(),
            date: Utc::now(),
            player1: "A".to_string(),
            player2: "B".to_string(),
            predicted_winner: "A".to_string(),
            confidence: 60.0,
            factors: BTreeMap::new(),
            result: None,
            actual_winner: None,
            correct: None,
        };
        assert!(m.record_prediction(entry.clone()));
        assert!(!m.record_prediction(entry));
        assert_eq!(m.total_predictions, 1);
    }

    #[test]
    fn upgrade_renames_legacy_factor_keys() {
        let raw = r#"{
            "predictions": [],
            "factorAccuracy": {"surface": {"correct": 2, "total": 4, "accuracy": 50}},
            "learnedWeights": {"ranking": 0.3, "surface": 0.2, "h2h": 0.2, "form": 0.2, "fatigue": 0.1},
            "patterns": [],
            "totalPredictions": 0,
            "totalCorrect": 0,
            "accuracy": 0,
            "lastWeightUpdate": null
        }"#;
        let mem: Memory = serde_json::from_str(raw).unwrap();
        assert_eq!(mem.version, 1);
        let mem = upgrade(mem, &WeightVector::core_defaults());
        assert_eq!(mem.version, MEMORY_VERSION);
        assert!(mem.learned_weights.contains("surface_context"));
        assert!(mem.learned_weights.contains("round_depth"));
        assert!(!mem.learned_weights.contains("fatigue"));
        assert_eq!(mem.factor_accuracy["surface_context"].total, 4);
        assert!(mem.factor_accuracy.contains_key("form"));
    }
}
