use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::factors::{FactorKind, factor_label};

/// Factor key → contribution weight. Kept normalized to sum to 1.0 after every adjustment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightVector(BTreeMap<String, f64>);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightShare {
    pub key: String,
    pub name: String,
    pub pct: f64,
}

impl WeightVector {
    pub fn core_defaults() -> Self {
        Self::from_pairs([
            (FactorKind::Ranking, 0.40),
            (FactorKind::SurfaceContext, 0.25),
            (FactorKind::RoundDepth, 0.20),
            (FactorKind::TourDynamics, 0.15),
        ])
    }

    pub fn extended_defaults() -> Self {
        Self::from_pairs([
            (FactorKind::Ranking, 0.30),
            (FactorKind::SurfaceContext, 0.20),
            (FactorKind::HeadToHead, 0.15),
            (FactorKind::Form, 0.15),
            (FactorKind::RoundDepth, 0.10),
            (FactorKind::TourDynamics, 0.10),
        ])
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (FactorKind, f64)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(kind, w)| (kind.key().to_string(), w))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    pub fn set(&mut self, key: impl Into<String>, weight: f64) {
        self.0.insert(key.into(), weight);
    }

    pub fn remove(&mut self, key: &str) -> Option<f64> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, w)| (k.as_str(), *w))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.0.values().sum()
    }

    /// True when at least one known factor is weighted and every weight is finite and non-negative.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self.0.values().all(|w| w.is_finite() && *w >= 0.0)
            && self.sum() > 0.0
            && self.keys().any(|k| FactorKind::from_key(k).is_some())
    }

    /// Rescales so the weights sum to 1.0. Returns false (and leaves the vector untouched)
    /// when there is nothing to scale.
    pub fn normalize(&mut self) -> bool {
        let total = self.sum();
        if !total.is_finite() || total <= 0.0 {
            return false;
        }
        for w in self.0.values_mut() {
            *w /= total;
        }
        true
    }

    /// Scales one weight in place. Unknown keys are ignored.
    pub fn scale(&mut self, key: &str, factor: f64) {
        if let Some(w) = self.0.get_mut(key) {
            *w *= factor;
        }
    }

    pub fn share_of(&self, key: &str) -> f64 {
        let total = self.sum();
        if total <= 0.0 {
            return 0.0;
        }
        self.get(key).unwrap_or(0.0) / total
    }

    /// Display rows sorted by weight, heaviest first.
    pub fn sorted_shares(&self) -> Vec<WeightShare> {
        let mut rows: Vec<WeightShare> = self
            .iter()
            .map(|(key, _)| WeightShare {
                key: key.to_string(),
                name: factor_label(key),
                pct: round1(self.share_of(key) * 100.0),
            })
            .collect();
        rows.sort_by(|a, b| b.pct.total_cmp(&a.pct).then_with(|| a.key.cmp(&b.key)));
        rows
    }
}

pub(crate) fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
