use std::fmt::Write;
use std::path::{Path, PathBuf};

use comfy_table::presets::ASCII_MARKDOWN;
use comfy_table::{Cell, CellAlignment, Table};
use log::info;
use tip_ml::evaluation::Evaluation;
use tip_ml::model::ModelSummary;

use crate::error::ReportResult;
use crate::scatter::ScatterPlot;

const REPORT_FILE: &str = "report.md";

/// The outcome of training and evaluating one model.
#[derive(Debug, Clone)]
pub struct ModelReport {
    /// A file-safe identifier, also used as the plot file stem.
    pub name: String,
    pub summary: ModelSummary,
    pub evaluation: Evaluation,
}

impl ModelReport {
    pub fn plot_file(&self) -> String {
        format!("{}.png", self.name)
    }
}

#[derive(Debug, Clone)]
pub struct Report {
    pub title: String,
    pub row_count: usize,
    pub partitions: Vec<(String, usize)>,
    pub models: Vec<ModelReport>,
}

fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else {
        format!("{value:.6}")
    }
}

fn markdown_table(header: [&str; 2], rows: impl IntoIterator<Item = (String, String)>) -> Table {
    let mut table = Table::new();
    table.load_preset(ASCII_MARKDOWN);
    table.set_header(header.map(Cell::new).to_vec());
    for (key, value) in rows {
        table.add_row(vec![
            Cell::new(key),
            Cell::new(value).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

impl Report {
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# {}\n", self.title);
        let _ = writeln!(out, "Loaded {} rows.\n", self.row_count);
        let partitions = markdown_table(
            ["split", "rows"],
            self.partitions
                .iter()
                .map(|(name, rows)| (name.clone(), rows.to_string())),
        );
        let _ = writeln!(out, "{partitions}\n");

        for model in &self.models {
            let summary = &model.summary;
            let _ = writeln!(out, "## {}\n", summary.title);
            if !summary.params.is_empty() {
                let params = markdown_table(["parameter", "value"], summary.params.clone());
                let _ = writeln!(out, "{params}\n");
            }
            let values = markdown_table(
                ["feature", summary.value_header.as_str()],
                summary
                    .rows
                    .iter()
                    .map(|(name, value)| (name.clone(), format_number(*value))),
            );
            let _ = writeln!(out, "{values}\n");

            let metrics = &model.evaluation.metrics;
            let line = &model.evaluation.line;
            let evaluation = markdown_table(
                ["metric", "value"],
                [
                    ("r2".to_string(), format_number(metrics.r2)),
                    ("rmse".to_string(), format_number(metrics.rmse)),
                    ("mae".to_string(), format_number(metrics.mae)),
                    ("test rows".to_string(), metrics.count.to_string()),
                    (
                        "sample rows".to_string(),
                        model.evaluation.sample.len().to_string(),
                    ),
                    ("line slope".to_string(), format_number(line.slope)),
                    ("line intercept".to_string(), format_number(line.intercept)),
                ],
            );
            let _ = writeln!(out, "{evaluation}\n");
            let _ = writeln!(out, "![{}]({})\n", summary.title, model.plot_file());
            if let Some(details) = &summary.details {
                let _ = writeln!(out, "```text\n{}\n```\n", details.trim_end());
            }
        }
        out
    }

    /// Writes `report.md` and one scatter plot per model into `dir`, which is created
    /// if needed. Returns the path of the report.
    pub fn write(&self, dir: &Path, plot: &ScatterPlot) -> ReportResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        for model in &self.models {
            let path = dir.join(model.plot_file());
            plot.save(&path, &model.evaluation.sample, &model.evaluation.line)?;
            info!("wrote {}", path.display());
        }
        let path = dir.join(REPORT_FILE);
        std::fs::write(&path, self.to_markdown())?;
        info!("wrote {}", path.display());
        Ok(path)
    }
}
