use std::collections::BTreeMap;
use std::hint::black_box;

use chrono::Utc;
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use rand::Rng;

use courtside::factors::PlayerInput;
use courtside::feed::{Rankings, Tour, parse_rankings, parse_scoreboard};
use courtside::memory::{FactorVote, Memory, PredictionEntry};
use courtside::resolution::apply_resolution;
use courtside::scoring::predict;
use courtside::weights::WeightVector;

const SCOREBOARD_JSON: &str = include_str!("../tests/fixtures/espn_scoreboard_atp.json");
const RANKINGS_JSON: &str = include_str!("../tests/fixtures/espn_rankings_atp.json");

const SURFACES: [&str; 3] = ["Hard", "Clay", "Grass"];
const ROUNDS: [&str; 5] = ["1st Round", "Round of 16", "Quarterfinal", "Semifinal", "Final"];

fn bench_predict(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    let pairs: Vec<(PlayerInput, PlayerInput, &str, &str)> = (0..256)
        .map(|i| {
            (
                PlayerInput::new(format!("P{i}"), rng.gen_range(1..500)),
                PlayerInput::new(format!("Q{i}"), rng.gen_range(1..500)),
                SURFACES[rng.gen_range(0..SURFACES.len())],
                ROUNDS[rng.gen_range(0..ROUNDS.len())],
            )
        })
        .collect();
    let weights = WeightVector::core_defaults();

    c.bench_function("predict_256", |b| {
        b.iter(|| {
            for (p1, p2, surface, round) in &pairs {
                let pred = predict(p1, p2, surface, Some(round), "ATP", &weights);
                black_box(pred.p1_win_pct);
            }
        })
    });
}

fn memory_with_pending(n: usize) -> Memory {
    let mut memory = Memory::default();
    for i in 0..n {
        memory.record_prediction(PredictionEntry {
            match_id: format!("m{i}"),
            date: Utc::now(),
            player1: format!("P{}", i % 40),
            player2: format!("Q{}", i % 25),
            predicted_winner: format!("P{}", i % 40),
            confidence: 55.0 + (i % 30) as f64,
            factors: BTreeMap::from([(
                "ranking".to_string(),
                FactorVote {
                    favored: format!("P{}", i % 40),
                },
            )]),
            result: None,
            actual_winner: None,
            correct: None,
        });
    }
    memory
}

fn bench_resolution(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    let outcomes: Vec<bool> = (0..200).map(|_| rng.gen_bool(0.65)).collect();

    c.bench_function("resolve_200", |b| {
        b.iter_batched(
            || memory_with_pending(200),
            |mut memory| {
                let now = Utc::now();
                for (i, hit) in outcomes.iter().enumerate() {
                    let winner = if *hit {
                        format!("P{}", i % 40)
                    } else {
                        format!("Q{}", i % 25)
                    };
                    apply_resolution(&mut memory, &format!("m{i}"), &winner, "6-4 6-4", now);
                }
                black_box(memory.accuracy);
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_feed_parse(c: &mut Criterion) {
    c.bench_function("scoreboard_parse", |b| {
        b.iter(|| {
            let ranks: Rankings = parse_rankings(black_box(RANKINGS_JSON)).unwrap();
            let matches = parse_scoreboard(black_box(SCOREBOARD_JSON), Tour::Atp, &ranks).unwrap();
            black_box(matches.len());
        })
    });
}

criterion_group!(benches, bench_predict, bench_resolution, bench_feed_parse);
criterion_main!(benches);
