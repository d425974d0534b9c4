use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use tracing::{info, warn};

use courtside::config::EngineConfig;
use courtside::engine::LearningEngine;
use courtside::export::export_history;
use courtside::factors::PlayerInput;
use courtside::feed::{self, match_results, season_state};
use courtside::logging;

const USAGE: &str = "\
usage: courtside <command> [args]

commands:
  predict <p1> <rank1> <p2> <rank2> [surface] [round] [tour]
  record                     fetch the feed and store predictions for pending matches
  sweep                      fetch finals and resolve pending predictions
  resolve <match_id> <winner> [score]
  stats                      learning stats as JSON
  reset                      replace the memory with a fresh one
  export <path.xlsx>         write the prediction history workbook";

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        println!("{USAGE}");
        return Ok(());
    };

    let cfg = EngineConfig::from_env();
    let engine = LearningEngine::from_config(&cfg)?;

    match command.as_str() {
        "predict" => cmd_predict(&engine, rest),
        "record" => cmd_record(&engine),
        "sweep" => cmd_sweep(&engine),
        "resolve" => cmd_resolve(&engine, rest),
        "stats" => {
            let stats = engine.stats();
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        "reset" => {
            if !engine.reset() {
                bail!("reset was not persisted");
            }
            println!("memory reset");
            Ok(())
        }
        "export" => {
            let path = rest
                .first()
                .map(PathBuf::from)
                .ok_or_else(|| anyhow!("export needs an output path"))?;
            let report = export_history(&path, &engine.memory())?;
            println!(
                "exported {} predictions ({} resolved) to {}",
                report.predictions,
                report.resolved,
                path.display()
            );
            Ok(())
        }
        "help" | "-h" | "--help" => {
            println!("{USAGE}");
            Ok(())
        }
        other => bail!("unknown command {other:?}\n\n{USAGE}"),
    }
}

fn parse_rank(raw: &str) -> Result<u32> {
    raw.trim()
        .parse::<u32>()
        .with_context(|| format!("ranking must be a positive integer, got {raw:?}"))
}

fn cmd_predict(engine: &LearningEngine, args: &[String]) -> Result<()> {
    let [p1, r1, p2, r2, extra @ ..] = args else {
        bail!("predict needs <p1> <rank1> <p2> <rank2>");
    };
    let player1 = PlayerInput::new(p1.as_str(), parse_rank(r1)?);
    let player2 = PlayerInput::new(p2.as_str(), parse_rank(r2)?);
    let surface = extra.first().map(String::as_str).unwrap_or("Hard");
    let round = extra.get(1).map(String::as_str);
    let tour = extra.get(2).map(String::as_str).unwrap_or("ATP");

    let pred = engine.predict(&player1, &player2, surface, round, tour);
    println!(
        "{} {}% vs {} {}%  favourite: {} (confidence {})",
        pred.player1, pred.p1_win_pct, pred.player2, pred.p2_win_pct, pred.favorite, pred.confidence
    );
    if let Some(cal) = pred.calibrated_confidence {
        println!("calibrated confidence: {cal:.1}");
    }
    for f in &pred.factors {
        println!("  {:<14} {:>3}% / {:>3}%", f.label, f.p1, f.p2);
    }
    Ok(())
}

fn cmd_record(engine: &LearningEngine) -> Result<()> {
    let feed = feed::fetch_matches();
    for err in &feed.errors {
        warn!(error = %err, "feed error");
    }
    let report = engine.record_batch(&feed.matches);
    println!(
        "recorded {} new predictions ({} already known, {} not pending)",
        report.recorded, report.duplicates, report.skipped
    );
    Ok(())
}

fn cmd_sweep(engine: &LearningEngine) -> Result<()> {
    let season = season_state(Utc::now().date_naive());
    if !season.allows_sweep() {
        info!(season = season.as_str(), "sweep skipped");
        println!("season state {}: sweep skipped", season.as_str());
        return Ok(());
    }
    let memory = engine.memory();
    if memory.pending().next().is_none() {
        println!("no pending predictions");
        return Ok(());
    }
    let feed = feed::fetch_matches();
    for err in &feed.errors {
        warn!(error = %err, "feed error");
    }
    let finals = feed.finals();
    let events = match_results(memory.pending(), &finals);
    let report = engine.resolve_batch(&events);
    println!(
        "checked {} finals, resolved {} predictions ({} skipped)",
        finals.len(),
        report.resolved,
        report.skipped
    );
    Ok(())
}

fn cmd_resolve(engine: &LearningEngine, args: &[String]) -> Result<()> {
    let [match_id, winner, score @ ..] = args else {
        bail!("resolve needs <match_id> <winner> [score]");
    };
    let score = score.join(" ");
    if engine.resolve(match_id, winner, &score) {
        println!("resolved {match_id}: {winner}");
    } else {
        println!("no pending prediction for {match_id}");
    }
    Ok(())
}
