use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::memory::{H2HRecord, pair_key};

pub const FALLBACK_RANKING: u32 = 999;
pub const NEUTRAL: f64 = 0.5;

// Logistic scale for rank differences: 100 places ≈ 10:1 odds.
const RANKING_SCALE: f64 = 100.0;
const ROUND_UNKNOWN: f64 = 0.55;
const H2H_DYNAMIC_SHARE: f64 = 0.6;

// Longer keys first so substring matching never lets "final" claim a semifinal.
const ROUND_DEPTH: &[(&str, f64)] = &[
    ("round of 128", 0.60),
    ("round of 64", 0.58),
    ("round of 32", 0.56),
    ("round of 16", 0.54),
    ("quarterfinals", 0.48),
    ("quarterfinal", 0.48),
    ("semifinals", 0.45),
    ("semifinal", 0.45),
    ("1st round", 0.58),
    ("2nd round", 0.56),
    ("3rd round", 0.54),
    ("4th round", 0.52),
    ("final", 0.42),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FactorKind {
    Ranking,
    SurfaceContext,
    RoundDepth,
    TourDynamics,
    HeadToHead,
    Form,
}

impl FactorKind {
    pub const ALL: [FactorKind; 6] = [
        FactorKind::Ranking,
        FactorKind::SurfaceContext,
        FactorKind::HeadToHead,
        FactorKind::Form,
        FactorKind::RoundDepth,
        FactorKind::TourDynamics,
    ];

    pub fn key(self) -> &'static str {
        match self {
            FactorKind::Ranking => "ranking",
            FactorKind::SurfaceContext => "surface_context",
            FactorKind::RoundDepth => "round_depth",
            FactorKind::TourDynamics => "tour_dynamics",
            FactorKind::HeadToHead => "h2h",
            FactorKind::Form => "form",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FactorKind::Ranking => "Ranking",
            FactorKind::SurfaceContext => "Surface",
            FactorKind::RoundDepth => "Round Depth",
            FactorKind::TourDynamics => "Tour Dynamics",
            FactorKind::HeadToHead => "Head-to-Head",
            FactorKind::Form => "Form",
        }
    }

    /// Accepts current keys plus the aliases written by older memory blobs.
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "ranking" | "rankings" => Some(FactorKind::Ranking),
            "surface_context" | "surface" => Some(FactorKind::SurfaceContext),
            "round_depth" | "fatigue" => Some(FactorKind::RoundDepth),
            "tour_dynamics" | "tour" => Some(FactorKind::TourDynamics),
            "h2h" | "head_to_head" => Some(FactorKind::HeadToHead),
            "form" => Some(FactorKind::Form),
            _ => None,
        }
    }
}

/// Current key for a possibly-legacy factor name; unknown names pass through.
pub fn canonical_key(key: &str) -> String {
    FactorKind::from_key(key)
        .map(|k| k.key().to_string())
        .unwrap_or_else(|| key.to_string())
}

pub fn factor_label(key: &str) -> String {
    if let Some(kind) = FactorKind::from_key(key) {
        return kind.label().to_string();
    }
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinLoss {
    pub wins: u32,
    pub losses: u32,
}

impl WinLoss {
    pub fn new(wins: u32, losses: u32) -> Self {
        Self { wins, losses }
    }

    pub fn played(&self) -> u32 {
        self.wins + self.losses
    }

    pub fn win_rate(&self) -> Option<f64> {
        let played = self.played();
        (played > 0).then(|| self.wins as f64 / played as f64)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerInput {
    pub name: String,
    /// Tour ranking, lower is better. `None` degrades to [`FALLBACK_RANKING`].
    pub ranking: Option<u32>,
    #[serde(default)]
    pub season: Option<WinLoss>,
    /// Record on the surface of the match being scored.
    #[serde(default)]
    pub on_surface: Option<WinLoss>,
}

impl PlayerInput {
    pub fn new(name: impl Into<String>, ranking: u32) -> Self {
        Self {
            name: name.into(),
            ranking: Some(ranking),
            ..Self::default()
        }
    }

    pub fn unranked(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_season(mut self, record: WinLoss) -> Self {
        self.season = Some(record);
        self
    }

    pub fn with_surface_record(mut self, record: WinLoss) -> Self {
        self.on_surface = Some(record);
        self
    }

    pub fn effective_ranking(&self) -> u32 {
        self.ranking.filter(|r| *r > 0).unwrap_or(FALLBACK_RANKING)
    }
}

pub fn ranking_prob(rank1: u32, rank2: u32) -> f64 {
    let diff = rank2 as f64 - rank1 as f64;
    1.0 / (1.0 + 10f64.powf(-diff / RANKING_SCALE))
}

/// Fixed upset-rate skew per surface. Clay produces the most upsets, grass the fewest.
pub fn surface_adjustment(surface: &str) -> f64 {
    match surface.trim().to_ascii_lowercase().as_str() {
        "clay" => -0.06,
        "grass" => 0.03,
        _ => 0.0,
    }
}

/// Surface win rates when both players have a record on it, otherwise the fixed skew.
pub fn surface_prob(surface: &str, p1: &PlayerInput, p2: &PlayerInput) -> f64 {
    let rates = p1
        .on_surface
        .and_then(|r| r.win_rate())
        .zip(p2.on_surface.and_then(|r| r.win_rate()));
    match rates {
        Some((r1, r2)) => ratio_prob(r1, r2),
        None => NEUTRAL + surface_adjustment(surface),
    }
}

pub fn round_depth_prob(round: Option<&str>) -> f64 {
    let Some(round) = round.map(str::trim).filter(|r| !r.is_empty()) else {
        return NEUTRAL;
    };
    let lower = round.to_ascii_lowercase();
    if let Some((_, p)) = ROUND_DEPTH.iter().find(|(key, _)| *key == lower) {
        return *p;
    }
    ROUND_DEPTH
        .iter()
        .find(|(key, _)| lower.contains(key))
        .map(|(_, p)| *p)
        .unwrap_or(ROUND_UNKNOWN)
}

pub fn tour_adjustment(tour: &str) -> f64 {
    if tour.trim().eq_ignore_ascii_case("wta") {
        -0.04
    } else {
        0.0
    }
}

pub fn tour_prob(tour: &str) -> f64 {
    NEUTRAL + tour_adjustment(tour)
}

pub fn form_prob(p1: &PlayerInput, p2: &PlayerInput) -> f64 {
    match (
        p1.season.and_then(|r| r.win_rate()),
        p2.season.and_then(|r| r.win_rate()),
    ) {
        (Some(r1), Some(r2)) => ratio_prob(r1, r2),
        _ => NEUTRAL,
    }
}

/// Head-to-head win share for player 1. Both arguments are `(p1 wins, p2 wins)`.
pub fn head_to_head_prob(static_record: Option<(u32, u32)>, dynamic: Option<(u32, u32)>) -> f64 {
    let share = |(w1, w2): (u32, u32)| {
        let total = w1 + w2;
        (total > 0).then(|| w1 as f64 / total as f64)
    };
    match (static_record.and_then(share), dynamic.and_then(share)) {
        (Some(s), Some(d)) => H2H_DYNAMIC_SHARE * d + (1.0 - H2H_DYNAMIC_SHARE) * s,
        (None, Some(d)) => d,
        (Some(s), None) => s,
        (None, None) => NEUTRAL,
    }
}

/// Oriented wins from a learned record: `(p1 wins, p2 wins)`.
pub fn dynamic_h2h(
    records: &BTreeMap<String, H2HRecord>,
    p1: &str,
    p2: &str,
) -> Option<(u32, u32)> {
    let record = records.get(&pair_key(p1, p2))?;
    Some((record.wins_for(p1), record.wins_for(p2)))
}

fn ratio_prob(a: f64, b: f64) -> f64 {
    let total = a + b;
    if total <= 0.0 || !total.is_finite() {
        NEUTRAL
    } else {
        (a / total).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticMeeting {
    pub player_a: String,
    pub player_b: String,
    pub wins_a: u32,
    pub wins_b: u32,
}

/// Static head-to-head dataset of historical meetings, keyed by sorted pair.
#[derive(Debug, Clone, Default)]
pub struct HeadToHeadBook {
    meetings: HashMap<String, StaticMeeting>,
}

impl HeadToHeadBook {
    pub fn from_meetings(rows: impl IntoIterator<Item = StaticMeeting>) -> Self {
        let mut meetings = HashMap::new();
        for mut row in rows {
            row.player_a = row.player_a.trim().to_string();
            row.player_b = row.player_b.trim().to_string();
            let key = pair_key(&row.player_a, &row.player_b);
            let entry = meetings.entry(key).or_insert_with(|| StaticMeeting {
                wins_a: 0,
                wins_b: 0,
                ..row.clone()
            });
            if entry.player_a == row.player_a {
                entry.wins_a += row.wins_a;
                entry.wins_b += row.wins_b;
            } else {
                entry.wins_a += row.wins_b;
                entry.wins_b += row.wins_a;
            }
        }
        Self { meetings }
    }

    pub fn parse_json(raw: &str) -> Result<Self> {
        let rows: Vec<StaticMeeting> =
            serde_json::from_str(raw).context("invalid head-to-head json")?;
        Ok(Self::from_meetings(rows))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read head-to-head dataset {}", path.display()))?;
        Self::parse_json(&raw)
    }

    pub fn len(&self) -> usize {
        self.meetings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meetings.is_empty()
    }

    pub fn lookup(&self, p1: &str, p2: &str) -> Option<(u32, u32)> {
        let m = self.meetings.get(&pair_key(p1, p2))?;
        if m.player_a == p1.trim() {
            Some((m.wins_a, m.wins_b))
        } else {
            Some((m.wins_b, m.wins_a))
        }
    }
}
