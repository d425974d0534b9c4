use crate::calibration;
use crate::factors::{FactorKind, factor_label};
use crate::memory::{Memory, pct};

const HIGH_CONFIDENCE: f64 = 70.0;
const CALIBRATION_TOLERANCE: f64 = 3.0;
const TREND_TOLERANCE: f64 = 5.0;
const STREAK_WORTH_NOTING: u32 = 3;
const MIN_UPSET_SAMPLES: u32 = 5;

/// Human-readable observations about the resolved history. Replaces the previous list.
pub fn detect_patterns(memory: &Memory) -> Vec<String> {
    let mut out = Vec::new();
    let resolved: Vec<_> = memory.resolved().collect();
    if resolved.is_empty() {
        return out;
    }

    let ranked: Vec<_> = resolved
        .iter()
        .filter_map(|p| Some((p.favored_by(FactorKind::Ranking.key())?, p.actual_winner.as_deref()?)))
        .collect();
    if !ranked.is_empty() {
        let wins = ranked.iter().filter(|(fav, won)| fav == won).count() as u32;
        let n = ranked.len() as u32;
        out.push(format!(
            "Higher-ranked player wins {}% of the time ({wins}/{n})",
            pct(wins, n)
        ));
    }

    let high: Vec<_> = resolved
        .iter()
        .filter(|p| p.confidence > HIGH_CONFIDENCE)
        .collect();
    if !high.is_empty() {
        let hits = high.iter().filter(|p| p.correct == Some(true)).count() as u32;
        let n = high.len() as u32;
        out.push(format!(
            "High-confidence picks (>70%) hit {}% ({hits}/{n})",
            pct(hits, n)
        ));
    }

    let mut sampled: Vec<_> = memory
        .factor_accuracy
        .iter()
        .filter(|(_, fa)| fa.total > 0)
        .collect();
    sampled.sort_by(|a, b| b.1.accuracy.total_cmp(&a.1.accuracy).then_with(|| a.0.cmp(b.0)));
    if let Some((name, best)) = sampled.first() {
        out.push(format!(
            "Most reliable factor: {} ({}% accurate)",
            factor_label(name),
            best.accuracy
        ));
    }
    if sampled.len() > 1
        && let Some((name, worst)) = sampled.last()
    {
        out.push(format!(
            "Least reliable factor: {} ({}% accurate)",
            factor_label(name),
            worst.accuracy
        ));
    }

    if let Some(drift) = calibration::drift(&memory.calibration) {
        out.push(if drift > CALIBRATION_TOLERANCE {
            format!("Model is over-confident by {drift:.1} pts on average")
        } else if drift < -CALIBRATION_TOLERANCE {
            format!("Model is under-confident by {:.1} pts on average", -drift)
        } else {
            format!("Confidence is well calibrated (within {CALIBRATION_TOLERANCE:.0} pts)")
        });
    }

    let last10 = memory.rolling_windows.last10;
    if last10.total == 10 {
        let delta = last10.accuracy - memory.accuracy;
        let trend = if delta > TREND_TOLERANCE {
            format!("up {delta:.1} pts")
        } else if delta < -TREND_TOLERANCE {
            format!("down {:.1} pts", -delta)
        } else {
            "steady".to_string()
        };
        out.push(format!(
            "Last 10 picks hit {}% ({trend} vs overall {}%)",
            last10.accuracy, memory.accuracy
        ));
    }

    let streaks = memory.streaks;
    let run = streaks.current.unsigned_abs();
    if run >= STREAK_WORTH_NOTING {
        let kind = if streaks.current > 0 { "correct" } else { "missed" };
        out.push(format!(
            "On a {run}-pick {kind} streak (best {}, worst {})",
            streaks.longest_win, streaks.longest_loss
        ));
    }

    if let Some(worst) = memory
        .upset_log
        .iter()
        .filter(|e| e.total >= MIN_UPSET_SAMPLES)
        .max_by(|a, b| a.rate.total_cmp(&b.rate))
    {
        out.push(format!(
            "Most common upset: {} in {}% of cases ({}/{})",
            factor_label(&worst.tag),
            worst.rate,
            worst.upsets,
            worst.total
        ));
    }

    let pairs = memory.h2h_results.len();
    if pairs > 0 {
        let repeats = memory
            .h2h_results
            .values()
            .filter(|r| r.meetings() > 1)
            .count();
        out.push(format!(
            "Head-to-head tracked for {pairs} pairs ({repeats} with repeat meetings)"
        ));
    }

    out
}
