use std::fs;
use std::path::PathBuf;

use courtside::engine::{BatchReport, LearningEngine, RecordOutcome, ResolveReport};
use courtside::factors::{HeadToHeadBook, PlayerInput};
use courtside::feed::{MatchRecord, Rankings, Tour, parse_rankings, parse_scoreboard};
use courtside::resolution::ResolutionEvent;
use courtside::scoring::ScoringConfig;
use courtside::store::{InMemoryStore, MemoryStore};
use courtside::weights::WeightVector;

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn fixture_matches() -> Vec<MatchRecord> {
    let ranks: Rankings =
        parse_rankings(&read_fixture("espn_rankings_atp.json")).expect("fixture should parse");
    parse_scoreboard(&read_fixture("espn_scoreboard_atp.json"), Tour::Atp, &ranks)
        .expect("fixture should parse")
}

fn engine() -> LearningEngine {
    LearningEngine::new(
        MemoryStore::single(InMemoryStore::new(), "prediction_memory"),
        ScoringConfig::default(),
    )
}

#[test]
fn records_pending_matches_once() {
    let engine = engine();
    let matches = fixture_matches();
    assert_eq!(
        engine.record_batch(&matches),
        BatchReport {
            recorded: 1,
            duplicates: 0,
            skipped: 2,
        }
    );
    assert_eq!(
        engine.record_batch(&matches),
        BatchReport {
            recorded: 0,
            duplicates: 1,
            skipped: 2,
        }
    );
    assert_eq!(engine.record_match(&matches[0]), RecordOutcome::Duplicate);
    assert_eq!(engine.record_match(&matches[2]), RecordOutcome::Skipped);

    let memory = engine.memory();
    assert_eq!(memory.pending_ids(), vec!["171001"]);
    let entry = &memory.predictions[0];
    // Clay final between the top two: surface and round outweigh the one-place gap.
    assert_eq!(entry.predicted_winner, "Carlos Alcaraz");
    assert_eq!(entry.confidence, 53.0);
    assert_eq!(entry.favored_by("ranking"), Some("Jannik Sinner"));
    assert_eq!(entry.favored_by("surface_context"), Some("Carlos Alcaraz"));
    assert!(entry.favored_by("tour_dynamics").is_none());
}

#[test]
fn resolves_and_reports_stats() {
    let engine = engine();
    engine.record_batch(&fixture_matches());
    assert!(engine.resolve("171001", "Carlos Alcaraz", "6-4 7-6(3)"));
    assert!(!engine.resolve("171001", "Carlos Alcaraz", "6-4 7-6(3)"));

    let stats = engine.stats();
    assert_eq!(stats.total_predictions, 1);
    assert_eq!(stats.total_resolved, 1);
    assert_eq!(stats.total_correct, 1);
    assert_eq!(stats.accuracy, 100.0);
    assert_eq!(stats.h2h_pairs, 1);
    assert_eq!(stats.streaks.current, 1);
    assert_eq!(stats.weights[0].key, "ranking");
    assert_eq!(engine.weights(), WeightVector::core_defaults());
}

#[test]
fn batch_resolution_counts_misses() {
    let engine = engine();
    engine.record_batch(&fixture_matches());
    let events = [
        ResolutionEvent {
            match_id: "171001".to_string(),
            winner: "Jannik Sinner".to_string(),
            score: String::new(),
        },
        ResolutionEvent {
            match_id: "unknown".to_string(),
            winner: "Nobody".to_string(),
            score: String::new(),
        },
    ];
    assert_eq!(
        engine.resolve_batch(&events),
        ResolveReport {
            resolved: 1,
            skipped: 1,
        }
    );
    let memory = engine.memory();
    assert_eq!(memory.predictions[0].result.as_deref(), Some("completed"));
    assert_eq!(memory.total_correct, 0);
}

#[test]
fn reset_clears_history() {
    let engine = engine();
    engine.record_batch(&fixture_matches());
    assert!(engine.reset());
    let stats = engine.stats();
    assert_eq!(stats.total_predictions, 0);
    assert!(stats.patterns.is_empty());
}

#[test]
fn extended_engine_blends_static_head_to_head() {
    let book = HeadToHeadBook::parse_json(&read_fixture("h2h_meetings.json")).expect("fixture should parse");
    assert_eq!(book.len(), 2);
    assert_eq!(book.lookup("Jannik Sinner", "Carlos Alcaraz"), Some((5, 7)));

    let engine = LearningEngine::new(
        MemoryStore::single(InMemoryStore::new(), "prediction_memory")
            .with_defaults(WeightVector::extended_defaults()),
        ScoringConfig::extended(),
    )
    .with_h2h_book(book);
    let p1 = PlayerInput::new("Jannik Sinner", 1);
    let p2 = PlayerInput::new("Carlos Alcaraz", 2);
    let pred = engine.predict(&p1, &p2, "Hard", None, "ATP");
    assert_eq!(pred.factors.len(), 6);
    assert_eq!(pred.factor("h2h").map(|f| f.p1), Some(42));
    assert!(pred.calibrated_confidence.is_none());
}

#[test]
fn batch_counts_repeated_feed_rows_once() {
    let engine = engine();
    let matches = fixture_matches();
    let mut rematch = matches[0].clone();
    rematch.id = "171009".to_string();
    let batch = vec![matches[0].clone(), matches[0].clone(), rematch, matches[1].clone()];
    assert_eq!(
        engine.record_batch(&batch),
        BatchReport {
            recorded: 2,
            duplicates: 1,
            skipped: 1,
        }
    );
    let memory = engine.memory();
    assert_eq!(memory.pending_ids(), vec!["171001", "171009"]);
    assert_eq!(memory.predictions[1].predicted_winner, "Carlos Alcaraz");
}
