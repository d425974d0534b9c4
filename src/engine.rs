//! Load → mutate → save around the pure scoring and resolution code.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::factors::{HeadToHeadBook, PlayerInput};
use crate::feed::MatchRecord;
use crate::memory::{Memory, PredictionEntry};
use crate::resolution::{ResolutionEvent, apply_resolution};
use crate::scoring::{
    MatchContext, Prediction, ScoringConfig, ScoringInputs, predict_with, score_batch,
};
use crate::stats::LearningStats;
use crate::store::MemoryStore;
use crate::weights::WeightVector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordOutcome {
    Recorded,
    Duplicate,
    /// Not pending; nothing to predict.
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub recorded: usize,
    pub duplicates: usize,
    pub skipped: usize,
}

impl BatchReport {
    fn add(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Recorded => self.recorded += 1,
            RecordOutcome::Duplicate => self.duplicates += 1,
            RecordOutcome::Skipped => self.skipped += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolveReport {
    pub resolved: usize,
    pub skipped: usize,
}

pub struct LearningEngine {
    store: MemoryStore,
    scoring: ScoringConfig,
    h2h: Option<HeadToHeadBook>,
}

impl LearningEngine {
    pub fn new(store: MemoryStore, scoring: ScoringConfig) -> Self {
        Self {
            store,
            scoring,
            h2h: None,
        }
    }

    pub fn from_config(cfg: &EngineConfig) -> Result<Self> {
        let mut engine = Self::new(MemoryStore::from_config(cfg), cfg.scoring());
        if let Some(path) = cfg.h2h_dataset.as_deref() {
            engine = engine.with_h2h_dataset(path)?;
        }
        Ok(engine)
    }

    pub fn with_h2h_book(mut self, book: HeadToHeadBook) -> Self {
        self.h2h = Some(book);
        self
    }

    fn with_h2h_dataset(self, path: &Path) -> Result<Self> {
        let book = HeadToHeadBook::load(path)?;
        info!(path = %path.display(), pairs = book.len(), "loaded head-to-head dataset");
        Ok(self.with_h2h_book(book))
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    pub fn memory(&self) -> Memory {
        self.store.load()
    }

    /// Learned weights, or the configured defaults when the memory holds none usable.
    pub fn weights(&self) -> WeightVector {
        let weights = self.store.load().learned_weights;
        if weights.is_valid() {
            weights
        } else {
            self.scoring.defaults.clone()
        }
    }

    /// Scores a match with the current learned state without recording anything.
    pub fn predict(
        &self,
        player1: &PlayerInput,
        player2: &PlayerInput,
        surface: &str,
        round: Option<&str>,
        tour: &str,
    ) -> Prediction {
        let memory = self.store.load();
        let ctx = MatchContext {
            player1,
            player2,
            surface,
            round,
            tour,
        };
        self.score(&memory, &ctx)
    }

    fn inputs<'a>(&'a self, memory: &'a Memory) -> ScoringInputs<'a> {
        ScoringInputs {
            static_h2h: self.h2h.as_ref(),
            dynamic_h2h: Some(&memory.h2h_results),
            calibration: Some(&memory.calibration),
        }
    }

    fn score(&self, memory: &Memory, ctx: &MatchContext<'_>) -> Prediction {
        predict_with(ctx, &memory.learned_weights, &self.scoring, &self.inputs(memory))
    }

    pub fn record_match(&self, record: &MatchRecord) -> RecordOutcome {
        let mut memory = self.store.load();
        let outcome = self.record_into(&mut memory, record, Utc::now());
        if outcome == RecordOutcome::Recorded && !self.store.save(&memory) {
            warn!(match_id = %record.id, "recorded prediction was not persisted");
        }
        outcome
    }

    /// Scores every pending match not already known, in parallel. One load, one save.
    pub fn record_batch(&self, records: &[MatchRecord]) -> BatchReport {
        let mut memory = self.store.load();
        let now = Utc::now();
        let mut report = BatchReport::default();

        let mut seen = HashSet::new();
        let mut fresh: Vec<&MatchRecord> = Vec::new();
        for record in records {
            if !record.is_pending() {
                report.add(RecordOutcome::Skipped);
            } else if memory.contains(&record.id) || !seen.insert(record.id.as_str()) {
                report.add(RecordOutcome::Duplicate);
            } else {
                fresh.push(record);
            }
        }

        let scores = score_batch(
            &fresh,
            &memory.learned_weights,
            &self.scoring,
            &self.inputs(&memory),
        );
        for (match_id, prediction) in scores.scored {
            let outcome = if memory.record_prediction(new_entry(match_id, &prediction, now)) {
                RecordOutcome::Recorded
            } else {
                RecordOutcome::Duplicate
            };
            report.add(outcome);
        }

        if report.recorded > 0 && !self.store.save(&memory) {
            warn!(recorded = report.recorded, "recorded predictions were not persisted");
        }
        info!(
            recorded = report.recorded,
            duplicates = report.duplicates,
            skipped = report.skipped,
            "recorded match batch"
        );
        report
    }

    /// Adds one match to an already-loaded memory.
    pub fn record_into(
        &self,
        memory: &mut Memory,
        record: &MatchRecord,
        now: DateTime<Utc>,
    ) -> RecordOutcome {
        if !record.is_pending() {
            return RecordOutcome::Skipped;
        }
        if memory.contains(&record.id) {
            return RecordOutcome::Duplicate;
        }
        let prediction = self.score(memory, &record.context());
        if memory.record_prediction(new_entry(record.id.clone(), &prediction, now)) {
            RecordOutcome::Recorded
        } else {
            RecordOutcome::Duplicate
        }
    }

    pub fn resolve(&self, match_id: &str, winner: &str, score: &str) -> bool {
        let event = ResolutionEvent {
            match_id: match_id.to_string(),
            winner: winner.to_string(),
            score: score.to_string(),
        };
        self.resolve_batch(std::slice::from_ref(&event)).resolved == 1
    }

    pub fn resolve_batch(&self, events: &[ResolutionEvent]) -> ResolveReport {
        let mut memory = self.store.load();
        let now = Utc::now();
        let mut report = ResolveReport::default();
        for event in events {
            if apply_resolution(&mut memory, &event.match_id, &event.winner, &event.score, now) {
                report.resolved += 1;
            } else {
                report.skipped += 1;
            }
        }
        if report.resolved > 0 && !self.store.save(&memory) {
            warn!(resolved = report.resolved, "resolutions were not persisted");
        }
        report
    }

    pub fn stats(&self) -> LearningStats {
        LearningStats::from_memory(&self.store.load())
    }

    pub fn reset(&self) -> bool {
        self.store.reset()
    }
}

fn new_entry(match_id: String, prediction: &Prediction, now: DateTime<Utc>) -> PredictionEntry {
    PredictionEntry {
        match_id,
        date: now,
        player1: prediction.player1.clone(),
        player2: prediction.player2.clone(),
        predicted_winner: prediction.favorite.clone(),
        confidence: f64::from(prediction.confidence),
        factors: prediction.favored_map(),
        result: None,
        actual_winner: None,
        correct: None,
    }
}
