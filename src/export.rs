use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::memory::Memory;
use crate::stats::LearningStats;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub predictions: usize,
    pub resolved: usize,
    pub summary_rows: usize,
}

enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Number(v)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Cell::Empty)
    }
}

fn header(names: &[&str]) -> Vec<Cell> {
    names.iter().map(|n| Cell::from(*n)).collect()
}

/// Writes the prediction history and a learning summary to an `.xlsx` workbook.
pub fn export_history(path: &Path, memory: &Memory) -> Result<ExportReport> {
    let stats = LearningStats::from_memory(memory);

    let mut prediction_rows = vec![header(&[
        "Match ID",
        "Date",
        "Player 1",
        "Player 2",
        "Predicted Winner",
        "Confidence",
        "Result",
        "Actual Winner",
        "Correct",
        "Factors",
    ])];
    for p in &memory.predictions {
        let factors = p
            .factors
            .iter()
            .map(|(k, v)| format!("{k}:{}", v.favored))
            .collect::<Vec<_>>()
            .join("; ");
        prediction_rows.push(vec![
            p.match_id.as_str().into(),
            p.date.format("%Y-%m-%d %H:%M").to_string().into(),
            p.player1.as_str().into(),
            p.player2.as_str().into(),
            p.predicted_winner.as_str().into(),
            p.confidence.into(),
            p.result.clone().into(),
            p.actual_winner.clone().into(),
            p.correct.map(|c| if c { "yes" } else { "no" }).into(),
            factors.into(),
        ]);
    }

    let mut summary_rows = vec![header(&["Metric", "Value"])];
    let mut metric = |name: &str, value: Cell| summary_rows.push(vec![name.into(), value]);
    metric("Total predictions", f64::from(stats.total_predictions).into());
    metric("Resolved", f64::from(stats.total_resolved).into());
    metric("Correct", f64::from(stats.total_correct).into());
    metric("Accuracy %", stats.accuracy.into());
    metric("Last 10 %", stats.rolling.last10.into());
    metric("Last 20 %", stats.rolling.last20.into());
    metric("Last 50 %", stats.rolling.last50.into());
    metric("Current streak", f64::from(stats.streaks.current).into());
    metric("Longest win streak", f64::from(stats.streaks.longest_win).into());
    metric("Longest loss streak", f64::from(stats.streaks.longest_loss).into());
    metric("Calibration drift", stats.calibration_drift.into());
    metric("Upset rate %", stats.upset_rate.into());
    metric("Head-to-head pairs", (stats.h2h_pairs as f64).into());
    metric(
        "Last weight update",
        stats.last_update.map(|t| t.to_rfc3339()).into(),
    );
    for share in &stats.weights {
        metric(&format!("Weight: {}", share.name), share.pct.into());
    }
    for pattern in &stats.patterns {
        metric("Pattern", pattern.as_str().into());
    }

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Predictions")?;
        write_rows(sheet, &prediction_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Summary")?;
        write_rows(sheet, &summary_rows)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        predictions: memory.predictions.len(),
        resolved: stats.total_resolved as usize,
        summary_rows: summary_rows.len() - 1,
    })
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<Cell>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            let (r, c) = (row_idx as u32, col_idx as u16);
            match value {
                Cell::Text(s) => worksheet.write_string(r, c, s).map(|_| ()),
                Cell::Number(n) => worksheet.write_number(r, c, *n).map(|_| ()),
                Cell::Empty => Ok(()),
            }
            .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exports_empty_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.xlsx");
        let report = export_history(&path, &Memory::default()).unwrap();
        assert_eq!(report.predictions, 0);
        assert!(report.summary_rows >= 14);
        assert!(path.exists());
    }
}
