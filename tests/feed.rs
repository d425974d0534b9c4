use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use chrono::{Duration, TimeZone, Utc};

use courtside::feed::{
    FeedReport, FinalResult, MatchState, Tour, match_results, parse_rankings, parse_scoreboard,
};
use courtside::memory::PredictionEntry;

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn pending(id: &str, p1: &str, p2: &str) -> PredictionEntry {
    PredictionEntry {
        match_id: id.to_string(),
        date: Utc::now(),
        player1: p1.to_string(),
        player2: p2.to_string(),
        predicted_winner: p1.to_string(),
        confidence: 60.0,
        factors: BTreeMap::new(),
        result: None,
        actual_winner: None,
        correct: None,
    }
}

#[test]
fn parses_rankings_fixture() {
    let ranks = parse_rankings(&read_fixture("espn_rankings_atp.json")).expect("fixture should parse");
    assert_eq!(ranks.len(), 4);
    assert_eq!(ranks.get("jannik sinner"), Some(&1));
    assert_eq!(ranks.get("novak đoković"), Some(&6));
    assert!(!ranks.contains_key("ghost entry"));
}

#[test]
fn parses_scoreboard_fixture() {
    let ranks = parse_rankings(&read_fixture("espn_rankings_atp.json")).expect("fixture should parse");
    let matches = parse_scoreboard(&read_fixture("espn_scoreboard_atp.json"), Tour::Atp, &ranks)
        .expect("fixture should parse");
    assert_eq!(matches.len(), 3);

    let final_match = &matches[0];
    assert_eq!(final_match.id, "171001");
    assert_eq!(final_match.tournament, "Roland Garros");
    assert_eq!(final_match.location, "Paris, France");
    assert_eq!(final_match.surface, "Clay");
    assert_eq!(final_match.round, "Final");
    assert_eq!(final_match.state, MatchState::Pending);
    assert_eq!(final_match.player1.ranking, Some(1));
    assert_eq!(final_match.player2.ranking, Some(2));
    assert_eq!(
        final_match.start_time,
        Some(Utc.with_ymd_and_hms(2025, 6, 8, 13, 0, 0).unwrap())
    );

    let semi = &matches[1];
    assert_eq!(semi.id, "171002");
    assert_eq!(semi.state, MatchState::Final);
    assert_eq!(semi.winner.as_deref(), Some("Jannik Sinner"));
    assert_eq!(semi.player1.ranking, Some(6));
    assert_eq!(semi.sets.len(), 3);
    assert!(semi.final_result().is_some());

    let live = &matches[2];
    assert_eq!(live.tournament, "Halle Open");
    assert_eq!(live.location, "OWL Arena");
    assert_eq!(live.surface, "Grass");
    assert_eq!(live.state, MatchState::Live);
    assert_eq!(live.player2.ranking, None);
    assert_eq!(live.player2.effective_ranking(), 999);
    assert!(live.final_result().is_none());
}

#[test]
fn final_results_carry_score_line() {
    let matches = parse_scoreboard(
        &read_fixture("espn_scoreboard_atp.json"),
        Tour::Atp,
        &Default::default(),
    )
    .expect("fixture should parse");
    let report = FeedReport {
        matches,
        errors: Vec::new(),
    };
    assert_eq!(report.pending().count(), 1);
    let finals = report.finals();
    assert_eq!(finals.len(), 1);
    assert_eq!(finals[0].winner, "Jannik Sinner");
    assert_eq!(finals[0].score, "4-6 7-6(5) 3-6");
}

#[test]
fn results_match_by_normalized_pair() {
    let matches = parse_scoreboard(
        &read_fixture("espn_scoreboard_atp.json"),
        Tour::Atp,
        &Default::default(),
    )
    .expect("fixture should parse");
    let finals = FeedReport {
        matches,
        errors: Vec::new(),
    }
    .finals();

    let entries = [
        pending("db-7", "JANNIK SINNER", "Novak Dokovic"),
        pending("db-8", "Casper Ruud", "Holger Rune"),
    ];
    let events = match_results(entries.iter(), &finals);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].match_id, "db-7");
    assert_eq!(events[0].winner, "JANNIK SINNER");
    assert_eq!(events[0].score, "4-6 7-6(5) 3-6");
}

#[test]
fn results_prefer_feed_ids_and_ignore_resolved() {
    let matches = parse_scoreboard(
        &read_fixture("espn_scoreboard_atp.json"),
        Tour::Atp,
        &Default::default(),
    )
    .expect("fixture should parse");
    let finals = FeedReport {
        matches,
        errors: Vec::new(),
    }
    .finals();

    let mut settled = pending("171002", "Novak Đoković", "Jannik Sinner");
    settled.result = Some("done".to_string());
    assert!(match_results([&settled], &finals).is_empty());

    let open = pending("171002", "Novak Đoković", "Jannik Sinner");
    let events = match_results([&open], &finals);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].winner, "Jannik Sinner");
}

#[test]
fn rematches_resolve_oldest_pending_first() {
    let mut old = pending("old", "A", "B");
    old.date = Utc::now() - Duration::days(7);
    let new = pending("new", "B", "A");
    let final_for = |id: &str, winner: &str| FinalResult {
        match_id: id.to_string(),
        player1: "A".to_string(),
        player2: "B".to_string(),
        winner: winner.to_string(),
        score: "6-4 6-4".to_string(),
    };

    let events = match_results([&new, &old], &[final_for("feed-1", "B")]);
    let ids: Vec<&str> = events.iter().map(|e| e.match_id.as_str()).collect();
    assert_eq!(ids, vec!["old"]);

    let events = match_results(
        [&new, &old],
        &[final_for("feed-1", "B"), final_for("feed-2", "A")],
    );
    let ids: Vec<&str> = events.iter().map(|e| e.match_id.as_str()).collect();
    assert_eq!(ids, vec!["old", "new"]);
    assert_eq!(events[1].winner, "A");
}
