use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::calibration::{self, MIN_RESOLVED_FOR_CALIBRATION};
use crate::factors::FactorKind;
use crate::memory::{H2HRecord, Memory, PredictionEntry, UpsetLogEntry, pair_key};
use crate::patterns;

pub const LEARNING_RATE: f64 = 0.1;
pub const MIN_RESOLVED_FOR_LEARNING: usize = 5;
pub const MIN_RESOLVED_FOR_PATTERNS: usize = 10;
pub const MIN_RESOLVED_FOR_UPSETS: usize = 20;

pub const TAG_RANKING_UPSET: &str = "ranking_upset";
pub const TAG_HIGH_CONFIDENCE_MISS: &str = "high_confidence_miss";
pub const TAG_SURFACE_UPSET: &str = "surface_upset";

const HIGH_CONFIDENCE: f64 = 70.0;
const DEFAULT_SCORE: &str = "completed";

/// A finished real-world match, already paired with the prediction it settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionEvent {
    pub match_id: String,
    pub winner: String,
    pub score: String,
}

/// Settles the pending prediction for `match_id` and refreshes every derived statistic.
/// Returns false, leaving the memory untouched, when no pending entry exists.
pub fn apply_resolution(
    memory: &mut Memory,
    match_id: &str,
    actual_winner: &str,
    score: &str,
    now: DateTime<Utc>,
) -> bool {
    let Some(entry) = memory
        .predictions
        .iter_mut()
        .find(|p| p.match_id == match_id && p.is_pending())
    else {
        debug!(match_id, "no pending prediction to resolve");
        return false;
    };

    let score = score.trim();
    entry.result = Some(if score.is_empty() { DEFAULT_SCORE } else { score }.to_string());
    entry.actual_winner = Some(actual_winner.to_string());
    let correct = entry.predicted_winner == actual_winner;
    entry.correct = Some(correct);
    let entry = entry.clone();

    update_factor_accuracy(memory, &entry, actual_winner);
    memory.recompute_totals();
    memory.rolling_windows.push(correct);
    memory.streaks.push(correct);

    let resolved = memory.resolved_count();
    if resolved >= MIN_RESOLVED_FOR_CALIBRATION {
        calibration::recalibrate(memory, now);
    }
    if resolved >= MIN_RESOLVED_FOR_UPSETS {
        log_upsets(memory, &entry, actual_winner);
    }
    record_head_to_head(memory, &entry, actual_winner);
    if resolved >= MIN_RESOLVED_FOR_LEARNING {
        adjust_weights(memory, now);
    }
    if resolved >= MIN_RESOLVED_FOR_PATTERNS {
        memory.patterns = patterns::detect_patterns(memory);
    }

    info!(
        match_id,
        correct,
        resolved,
        accuracy = memory.accuracy,
        "resolved prediction"
    );
    true
}

fn update_factor_accuracy(memory: &mut Memory, entry: &PredictionEntry, actual_winner: &str) {
    for (factor, vote) in &entry.factors {
        memory
            .factor_accuracy
            .entry(factor.clone())
            .or_default()
            .record(vote.favored == actual_winner);
    }
}

fn log_upsets(memory: &mut Memory, entry: &PredictionEntry, actual_winner: &str) {
    let checks = [
        (
            TAG_RANKING_UPSET,
            entry
                .favored_by(FactorKind::Ranking.key())
                .map(|fav| fav != actual_winner),
        ),
        (
            TAG_HIGH_CONFIDENCE_MISS,
            (entry.confidence > HIGH_CONFIDENCE).then_some(entry.correct == Some(false)),
        ),
        (
            TAG_SURFACE_UPSET,
            entry
                .favored_by(FactorKind::SurfaceContext.key())
                .map(|fav| fav != actual_winner),
        ),
    ];
    for (tag, outcome) in checks {
        let Some(upset) = outcome else { continue };
        let idx = match memory.upset_log.iter().position(|e| e.tag == tag) {
            Some(idx) => idx,
            None => {
                memory.upset_log.push(UpsetLogEntry {
                    tag: tag.to_string(),
                    ..UpsetLogEntry::default()
                });
                memory.upset_log.len() - 1
            }
        };
        let log = &mut memory.upset_log[idx];
        log.total += 1;
        if upset {
            log.upsets += 1;
        }
        log.recompute();
    }
}

fn record_head_to_head(memory: &mut Memory, entry: &PredictionEntry, actual_winner: &str) {
    let winner = actual_winner.trim();
    if winner != entry.player1.trim() && winner != entry.player2.trim() {
        warn!(
            match_id = %entry.match_id,
            winner = actual_winner,
            "winner matches neither player; head-to-head unchanged"
        );
        return;
    }
    memory
        .h2h_results
        .entry(pair_key(&entry.player1, &entry.player2))
        .or_insert_with(|| H2HRecord::new(&entry.player1, &entry.player2))
        .record_win(winner, entry.date);
}

/// Nudges each sampled factor's weight toward (or away from) the overall hit rate,
/// then renormalizes.
pub fn adjust_weights(memory: &mut Memory, now: DateTime<Utc>) {
    let overall = memory.accuracy;
    let keys: Vec<String> = memory.learned_weights.keys().map(str::to_string).collect();
    for key in keys {
        let Some(fa) = memory.factor_accuracy.get(&key) else {
            continue;
        };
        if fa.total == 0 {
            continue;
        }
        let adjustment = 1.0 + ((fa.accuracy - overall) / 100.0) * LEARNING_RATE;
        memory.learned_weights.scale(&key, adjustment.max(0.0));
    }
    if !memory.learned_weights.normalize() {
        warn!("weight vector collapsed; keeping previous shape");
        return;
    }
    memory.last_weight_update = Some(now);
    debug!(weights = ?memory.learned_weights, "adjusted factor weights");
}
