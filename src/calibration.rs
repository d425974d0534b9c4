use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::memory::{Calibration, CalibrationBucket, Memory, PredictionEntry};
use crate::weights::round1;

pub const MIN_RESOLVED_FOR_CALIBRATION: usize = 30;
pub const MIN_BUCKET_SAMPLES: u32 = 3;

const BAND_WIDTH: u32 = 5;
const BAND_MIN: u32 = 50;
const BAND_MAX: u32 = 95;
const RAW_SHARE: f64 = 0.7;

/// Lower edge of the 5-point band a confidence falls in, clamped to [50, 95].
pub fn band_floor(confidence: f64) -> u32 {
    let c = if confidence.is_finite() { confidence.max(0.0) } else { 0.0 };
    let floor = (c as u32 / BAND_WIDTH) * BAND_WIDTH;
    floor.clamp(BAND_MIN, BAND_MAX)
}

pub fn bucket_label(floor: u32) -> String {
    format!("{floor}-{}", floor + BAND_WIDTH)
}

pub fn rebuild_buckets<'a>(
    entries: impl IntoIterator<Item = &'a PredictionEntry>,
) -> BTreeMap<String, CalibrationBucket> {
    let mut sums: BTreeMap<u32, (f64, u32, u32)> = BTreeMap::new();
    for e in entries {
        let Some(correct) = e.correct else { continue };
        let slot = sums.entry(band_floor(e.confidence)).or_insert((0.0, 0, 0));
        slot.0 += e.confidence;
        slot.1 += u32::from(correct);
        slot.2 += 1;
    }
    sums.into_iter()
        .map(|(floor, (conf_sum, hits, n))| {
            (
                bucket_label(floor),
                CalibrationBucket {
                    avg_confidence: round1(conf_sum / n as f64),
                    actual_win_rate: round1(hits as f64 / n as f64 * 100.0),
                    count: n,
                },
            )
        })
        .collect()
}

/// Rebuilds every bucket from all resolved entries once enough have accumulated.
pub fn recalibrate(memory: &mut Memory, now: DateTime<Utc>) -> bool {
    if memory.resolved_count() < MIN_RESOLVED_FOR_CALIBRATION {
        return false;
    }
    memory.calibration.buckets = rebuild_buckets(memory.resolved());
    memory.calibration.last_calibrated = Some(now);
    true
}

/// Count-weighted mean of (stated confidence − observed win rate) over reliable buckets.
/// Positive means over-confident.
pub fn drift(calibration: &Calibration) -> Option<f64> {
    let mut weighted = 0.0;
    let mut n = 0u32;
    for b in calibration.buckets.values() {
        if b.count < MIN_BUCKET_SAMPLES {
            continue;
        }
        weighted += (b.avg_confidence - b.actual_win_rate) * b.count as f64;
        n += b.count;
    }
    (n > 0).then(|| round1(weighted / n as f64))
}

pub fn blend(calibration: &Calibration, raw_confidence: f64) -> Option<f64> {
    let bucket = calibration
        .buckets
        .get(&bucket_label(band_floor(raw_confidence)))?;
    if bucket.count < MIN_BUCKET_SAMPLES {
        return None;
    }
    Some(round1(
        RAW_SHARE * raw_confidence + (1.0 - RAW_SHARE) * bucket.actual_win_rate,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(conf: f64, correct: bool) -> PredictionEntry {
        PredictionEntry {
            match_id: format!("m{conf}{correct}"),
            date: Utc::now(),
            player1: "A".to_string(),
            player2: "B".to_string(),
            predicted_winner: "A".to_string(),
            confidence: conf,
            factors: BTreeMap::new(),
            result: Some("6-4 6-4".to_string()),
            actual_winner: Some(if correct { "A" } else { "B" }.to_string()),
            correct: Some(correct),
        }
    }

    #[test]
    fn bands_are_clamped() {
        assert_eq!(band_floor(12.0), 50);
        assert_eq!(band_floor(57.0), 55);
        assert_eq!(band_floor(88.0), 85);
        assert_eq!(band_floor(100.0), 95);
        assert_eq!(bucket_label(95), "95-100");
    }

    #[test]
    fn buckets_average_confidence_and_hits() {
        let entries = [
            resolved(60.0, true),
            resolved(62.0, false),
            resolved(64.0, true),
            resolved(71.0, true),
        ];
        let buckets = rebuild_buckets(entries.iter());
        let b = &buckets["60-65"];
        assert_eq!(b.count, 3);
        assert_eq!(b.avg_confidence, 62.0);
        assert_eq!(b.actual_win_rate, 66.7);
        assert_eq!(buckets["70-75"].count, 1);
    }

    #[test]
    fn drift_and_blend_ignore_thin_buckets() {
        let entries = [
            resolved(60.0, true),
            resolved(62.0, false),
            resolved(64.0, false),
            resolved(71.0, true),
        ];
        let cal = Calibration {
            buckets: rebuild_buckets(entries.iter()),
            last_calibrated: None,
        };
        // 62.0 stated vs 33.3 observed.
        assert_eq!(drift(&cal), Some(28.7));
        assert_eq!(blend(&cal, 61.0), Some(52.7));
        assert_eq!(blend(&cal, 72.0), None);
    }
}
