use std::borrow::Borrow;
use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;

use crate::calibration;
use crate::factors::{
    FactorKind, HeadToHeadBook, NEUTRAL, PlayerInput, dynamic_h2h, form_prob, head_to_head_prob,
    ranking_prob, round_depth_prob, surface_prob, tour_prob,
};
use crate::feed::MatchRecord;
use crate::memory::{Calibration, FactorVote, H2HRecord};
use crate::weights::WeightVector;

pub const PROB_FLOOR: f64 = 0.12;
pub const PROB_CEIL: f64 = 0.88;
pub const MAX_AMPLIFICATION: f64 = 1.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FactorSet {
    #[default]
    Core,
    Extended,
}

impl FactorSet {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "core" | "default" => Some(FactorSet::Core),
            "extended" | "full" => Some(FactorSet::Extended),
            _ => None,
        }
    }

    pub fn default_weights(self) -> WeightVector {
        match self {
            FactorSet::Core => WeightVector::core_defaults(),
            FactorSet::Extended => WeightVector::extended_defaults(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    /// Used whenever the supplied weights are missing or invalid.
    pub defaults: WeightVector,
    /// Multiplier on the distance from 0.5, applied before clamping. 1.0 disables it.
    pub amplification: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self::for_set(FactorSet::Core)
    }
}

impl ScoringConfig {
    pub fn for_set(set: FactorSet) -> Self {
        Self {
            defaults: set.default_weights(),
            amplification: 1.0,
        }
    }

    pub fn extended() -> Self {
        Self::for_set(FactorSet::Extended)
    }

    pub fn with_amplification(mut self, amplification: f64) -> Self {
        self.amplification = clamp_amplification(amplification);
        self
    }
}

pub fn clamp_amplification(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(1.0, MAX_AMPLIFICATION)
    } else {
        1.0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    pub player1: &'a PlayerInput,
    pub player2: &'a PlayerInput,
    pub surface: &'a str,
    pub round: Option<&'a str>,
    pub tour: &'a str,
}

/// Optional data sources beyond the two players.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringInputs<'a> {
    pub static_h2h: Option<&'a HeadToHeadBook>,
    pub dynamic_h2h: Option<&'a BTreeMap<String, H2HRecord>>,
    pub calibration: Option<&'a Calibration>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorScore {
    pub key: String,
    pub label: String,
    /// Probability for player 1 in [0, 1].
    pub probability: f64,
    pub p1: u8,
    pub p2: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub player1: String,
    pub player2: String,
    pub favorite: String,
    pub p1_win_pct: u8,
    pub p2_win_pct: u8,
    /// Winning side's percentage, `max(p1, p2)`.
    pub confidence: u8,
    pub calibrated_confidence: Option<f64>,
    pub factors: Vec<FactorScore>,
}

impl Prediction {
    /// Which player each factor leaned toward. Factors sitting exactly at 0.5 carry no
    /// signal and are left out.
    pub fn favored_map(&self) -> BTreeMap<String, FactorVote> {
        self.factors
            .iter()
            .filter(|f| (f.probability - NEUTRAL).abs() > 1e-9)
            .map(|f| {
                let favored = if f.probability > NEUTRAL {
                    &self.player1
                } else {
                    &self.player2
                };
                (
                    f.key.clone(),
                    FactorVote {
                        favored: favored.clone(),
                    },
                )
            })
            .collect()
    }

    pub fn factor(&self, key: &str) -> Option<&FactorScore> {
        self.factors.iter().find(|f| f.key == key)
    }
}

/// Core-factor prediction with no head-to-head or calibration data.
pub fn predict(
    player1: &PlayerInput,
    player2: &PlayerInput,
    surface: &str,
    round: Option<&str>,
    tour: &str,
    weights: &WeightVector,
) -> Prediction {
    let ctx = MatchContext {
        player1,
        player2,
        surface,
        round,
        tour,
    };
    predict_with(
        &ctx,
        weights,
        &ScoringConfig::default(),
        &ScoringInputs::default(),
    )
}

pub fn predict_with(
    ctx: &MatchContext<'_>,
    weights: &WeightVector,
    config: &ScoringConfig,
    inputs: &ScoringInputs<'_>,
) -> Prediction {
    let weights = if weights.is_valid() {
        weights
    } else {
        &config.defaults
    };

    let mut factors = Vec::new();
    let mut combined = 0.0;
    let mut used = 0.0;
    for kind in FactorKind::ALL {
        let Some(w) = weights.get(kind.key()) else {
            continue;
        };
        let p = factor_probability(kind, ctx, inputs);
        combined += p * w;
        used += w;
        factors.push(factor_score(kind, p));
    }
    // Unknown keys are skipped, so rescale by the weight that actually applied.
    let combined = if used > 0.0 { combined / used } else { NEUTRAL };

    let amplified = NEUTRAL + (combined - NEUTRAL) * clamp_amplification(config.amplification);
    let p1_final = amplified.clamp(PROB_FLOOR, PROB_CEIL);
    let p1_win_pct = (p1_final * 100.0).round() as u8;
    let p2_win_pct = 100 - p1_win_pct;
    let confidence = p1_win_pct.max(p2_win_pct);

    let favorite = if p1_win_pct >= p2_win_pct {
        ctx.player1.name.clone()
    } else {
        ctx.player2.name.clone()
    };

    Prediction {
        player1: ctx.player1.name.clone(),
        player2: ctx.player2.name.clone(),
        favorite,
        p1_win_pct,
        p2_win_pct,
        confidence,
        calibrated_confidence: inputs
            .calibration
            .and_then(|c| calibration::blend(c, confidence as f64)),
        factors,
    }
}

fn factor_probability(kind: FactorKind, ctx: &MatchContext<'_>, inputs: &ScoringInputs<'_>) -> f64 {
    let p = match kind {
        FactorKind::Ranking => ranking_prob(
            ctx.player1.effective_ranking(),
            ctx.player2.effective_ranking(),
        ),
        FactorKind::SurfaceContext => surface_prob(ctx.surface, ctx.player1, ctx.player2),
        FactorKind::RoundDepth => round_depth_prob(ctx.round),
        FactorKind::TourDynamics => tour_prob(ctx.tour),
        FactorKind::HeadToHead => {
            let (p1, p2) = (ctx.player1.name.as_str(), ctx.player2.name.as_str());
            head_to_head_prob(
                inputs.static_h2h.and_then(|b| b.lookup(p1, p2)),
                inputs.dynamic_h2h.and_then(|r| dynamic_h2h(r, p1, p2)),
            )
        }
        FactorKind::Form => form_prob(ctx.player1, ctx.player2),
    };
    if p.is_finite() { p.clamp(0.0, 1.0) } else { NEUTRAL }
}

fn factor_score(kind: FactorKind, probability: f64) -> FactorScore {
    let p1 = (probability * 100.0).round() as u8;
    FactorScore {
        key: kind.key().to_string(),
        label: kind.label().to_string(),
        probability,
        p1,
        p2: 100 - p1,
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchScores {
    pub scored: Vec<(String, Prediction)>,
    pub skipped: usize,
}

/// Scores every pending match independently; anything else counts as skipped.
pub fn score_batch<M: Borrow<MatchRecord> + Sync>(
    matches: &[M],
    weights: &WeightVector,
    config: &ScoringConfig,
    inputs: &ScoringInputs<'_>,
) -> BatchScores {
    let scored: Vec<(String, Prediction)> = matches
        .par_iter()
        .map(<M as Borrow<MatchRecord>>::borrow)
        .filter(|m| m.is_pending())
        .map(|m| (m.id.clone(), predict_with(&m.context(), weights, config, inputs)))
        .collect();
    let skipped = matches.len() - scored.len();
    BatchScores { scored, skipped }
}
