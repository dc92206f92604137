//! Human-readable and JSON rendering of pipeline results and dataset profiles.

use std::fmt::Write;

use anyhow::{Context, Result};

use crate::encoder::CategoricalColumn;
use crate::evaluator::{AverageMetrics, ConfusionMatrix, EvaluationReport};
use crate::pipeline::{ModelOutcome, PipelineOutcome};
use crate::profiler::DatasetProfile;
use crate::trainer::FitStatus;
use crate::utils::Drug;

/// Output format selected on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

const RULE_WIDTH: usize = 60;

fn rule(out: &mut String, ch: char) {
    out.push_str(&ch.to_string().repeat(RULE_WIDTH));
    out.push('\n');
}

/// Comparison table, then one classification report and confusion matrix per model.
pub fn render_outcome(outcome: &PipelineOutcome) -> String {
    let mut out = String::new();
    let c = outcome.counts;
    let _ = writeln!(
        out,
        "rows: {}  train: {}  fitted on: {}  test: {}",
        c.dataset, c.train, c.fitted_on, c.test
    );
    for column in CategoricalColumn::ALL {
        if let Some(codes) = outcome.encoder.vocabulary(column) {
            let pairs: Vec<String> = codes.iter().map(|(v, code)| format!("{v}={code}")).collect();
            let _ = writeln!(out, "{:<12} {}", column.name(), pairs.join(" "));
        }
    }
    out.push('\n');
    render_comparison(&mut out, outcome);

    for model in &outcome.models {
        out.push('\n');
        rule(&mut out, '=');
        let _ = writeln!(out, "{} ({})", model.name, model.kind.label());
        rule(&mut out, '=');
        match &model.outcome {
            ModelOutcome::Evaluated { fit, report } => {
                if let Some(warning) = convergence_warning(fit) {
                    let _ = writeln!(out, "{warning}");
                }
                render_classification_report(&mut out, report);
                out.push('\n');
                render_confusion(&mut out, &report.confusion);
            }
            ModelOutcome::Failed { error } => {
                let _ = writeln!(out, "failed: {error}");
            }
        }
    }
    out
}

fn convergence_warning(fit: &FitStatus) -> Option<String> {
    let FitStatus::NotConverged {
        max_iter,
        kept_iter,
        drift,
    } = *fit
    else {
        return None;
    };
    let mut line = format!("warning: did not converge within {max_iter} iterations");
    if kept_iter < max_iter {
        let _ = write!(line, "; solver broke down, kept the {kept_iter}-iteration fit");
    }
    if let Some(drift) = drift {
        let _ = write!(line, " (drift {drift:.2e})");
    }
    Some(line)
}

fn render_comparison(out: &mut String, outcome: &PipelineOutcome) {
    let _ = writeln!(out, "{:<28} {:>10}", "Model", "Accuracy");
    rule(out, '-');
    for (model, accuracy) in outcome.ranking() {
        let _ = writeln!(out, "{:<28} {:>10.4}", model.name, accuracy);
    }
    for model in outcome.models.iter().filter(|m| m.report().is_none()) {
        let _ = writeln!(out, "{:<28} {:>10}", model.name, "failed");
    }
}

/// Per-class precision/recall/F1/support with accuracy and averages.
pub fn render_classification_report(out: &mut String, report: &EvaluationReport) {
    let _ = writeln!(
        out,
        "{:<14} {:>10} {:>10} {:>10} {:>10}",
        "", "precision", "recall", "f1-score", "support"
    );
    for m in &report.per_class {
        let _ = writeln!(
            out,
            "{:<14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
            m.label.as_str(),
            m.precision,
            m.recall,
            m.f1,
            m.support
        );
    }
    out.push('\n');
    let total = report.support();
    let _ = writeln!(
        out,
        "{:<14} {:>10} {:>10} {:>10.2} {:>10}",
        "accuracy", "", "", report.accuracy, total
    );
    average_row(out, "macro avg", &report.macro_avg, total);
    average_row(out, "weighted avg", &report.weighted_avg, total);
}

fn average_row(out: &mut String, name: &str, avg: &AverageMetrics, total: usize) {
    let _ = writeln!(
        out,
        "{:<14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
        name, avg.precision, avg.recall, avg.f1, total
    );
}

/// Rows are true labels, columns predicted labels.
pub fn render_confusion(out: &mut String, confusion: &ConfusionMatrix) {
    let _ = write!(out, "{:<8}", "true\\pred");
    for drug in Drug::ALL {
        let _ = write!(out, "{:>6}", drug.as_str());
    }
    out.push('\n');
    for (drug, row) in Drug::ALL.iter().zip(confusion.rows()) {
        let _ = write!(out, "{:<9}", drug.as_str());
        for count in row {
            let _ = write!(out, "{count:>6}");
        }
        out.push('\n');
    }
}

pub fn render_profile(profile: &DatasetProfile) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "rows: {}", profile.rows);
    out.push('\n');

    let _ = writeln!(
        out,
        "{:<10} {:>6} {:>9} {:>9} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "column", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
    );
    rule(&mut out, '-');
    for s in &profile.numeric {
        let _ = writeln!(
            out,
            "{:<10} {:>6} {:>9.3} {:>9.3} {:>8.2} {:>8.2} {:>8.2} {:>8.2} {:>8.2}",
            s.column, s.count, s.mean, s.std, s.min, s.p25, s.median, s.p75, s.max
        );
    }

    for summary in &profile.categorical {
        out.push('\n');
        let _ = writeln!(out, "{}", summary.column);
        for (value, count) in &summary.counts {
            let _ = writeln!(out, "  {value:<12} {count:>5}");
        }
    }

    out.push('\n');
    match profile.age_na_to_k_correlation {
        Some(r) => {
            let _ = writeln!(out, "corr(Age, Na_to_K): {r:.3}");
        }
        None => {
            let _ = writeln!(out, "corr(Age, Na_to_K): undefined (constant column)");
        }
    }
    out
}

pub fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("failed to serialize report as JSON")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluate;
    use Drug::*;

    #[test]
    fn classification_report_lists_every_class_and_averages() {
        let report = evaluate(&[Y, Y, X, A], &[Y, X, X, A]).unwrap();
        let mut out = String::new();
        render_classification_report(&mut out, &report);
        for label in ["A", "B", "C", "X", "Y", "accuracy", "macro avg", "weighted avg"] {
            assert!(out.contains(label), "missing {label} in\n{out}");
        }
        assert!(out.contains("0.75"));
    }

    #[test]
    fn confusion_rows_follow_label_order() {
        let report = evaluate(&[Y, Y, A], &[Y, X, A]).unwrap();
        let mut out = String::new();
        render_confusion(&mut out, &report.confusion);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[1].starts_with('A'));
        let y_row: Vec<&str> = lines[5].split_whitespace().collect();
        assert_eq!(y_row, vec!["Y", "0", "0", "0", "1", "1"]);
    }

    #[test]
    fn convergence_warning_names_the_kept_budget() {
        assert_eq!(convergence_warning(&FitStatus::Fitted), None);
        let drifting = FitStatus::NotConverged {
            max_iter: 200,
            kept_iter: 200,
            drift: Some(0.5),
        };
        assert_eq!(
            convergence_warning(&drifting).unwrap(),
            "warning: did not converge within 200 iterations (drift 5.00e-1)"
        );
        let broken = FitStatus::NotConverged {
            max_iter: 200,
            kept_iter: 50,
            drift: None,
        };
        assert_eq!(
            convergence_warning(&broken).unwrap(),
            "warning: did not converge within 200 iterations; solver broke down, kept the 50-iteration fit"
        );
    }

    #[test]
    fn json_carries_metrics() {
        let report = evaluate(&[Y, A], &[Y, A]).unwrap();
        let json = to_json(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["accuracy"], 1.0);
        assert_eq!(value["per_class"][4]["label"], "Y");
    }
}
