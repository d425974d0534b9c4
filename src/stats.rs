use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::calibration;
use crate::memory::Memory;
use crate::resolution::TAG_RANKING_UPSET;
use crate::weights::WeightShare;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningStats {
    pub total_predictions: u32,
    pub total_resolved: u32,
    pub total_correct: u32,
    pub accuracy: f64,
    pub patterns: Vec<String>,
    pub pattern_count: usize,
    pub weights: Vec<WeightShare>,
    pub rolling: RollingSummary,
    pub streaks: StreakSummary,
    /// Positive means stated confidence runs ahead of results.
    pub calibration_drift: Option<f64>,
    /// Share of resolved matches the higher-ranked player lost, once tracked.
    pub upset_rate: f64,
    pub h2h_pairs: usize,
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RollingSummary {
    pub last10: f64,
    pub last20: f64,
    pub last50: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreakSummary {
    pub current: i32,
    pub longest_win: u32,
    pub longest_loss: u32,
}

impl LearningStats {
    pub fn from_memory(memory: &Memory) -> Self {
        let rw = &memory.rolling_windows;
        Self {
            total_predictions: memory.predictions.len() as u32,
            total_resolved: memory.resolved_count() as u32,
            total_correct: memory.total_correct,
            accuracy: memory.accuracy,
            patterns: memory.patterns.clone(),
            pattern_count: memory.patterns.len(),
            weights: memory.learned_weights.sorted_shares(),
            rolling: RollingSummary {
                last10: rw.last10.accuracy,
                last20: rw.last20.accuracy,
                last50: rw.last50.accuracy,
            },
            streaks: StreakSummary {
                current: memory.streaks.current,
                longest_win: memory.streaks.longest_win,
                longest_loss: memory.streaks.longest_loss,
            },
            calibration_drift: calibration::drift(&memory.calibration),
            upset_rate: memory
                .upset_entry(TAG_RANKING_UPSET)
                .map(|e| e.rate)
                .unwrap_or(0.0),
            h2h_pairs: memory.h2h_results.len(),
            last_update: memory.last_weight_update,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_memory_reports_defaults() {
        let stats = LearningStats::from_memory(&Memory::default());
        assert_eq!(stats.total_predictions, 0);
        assert_eq!(stats.total_resolved, 0);
        assert_eq!(stats.weights.len(), 4);
        assert_eq!(stats.weights[0].name, "Ranking");
        assert!(stats.calibration_drift.is_none());
        assert_eq!(stats.upset_rate, 0.0);
        assert!(stats.last_update.is_none());
    }
}
