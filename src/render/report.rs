//! Run report generation.
//!
//! Summarizes a study run as Markdown or JSON: the dataset's columns,
//! frequency tables, derived subsets and every chart produced.

use crate::study::{ChartOutcome, StudyOutcome, SubsetOutcome, ValueCountSummary};
use crate::table::ColumnSummary;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Largest number of entries listed per value-count table.
const MAX_VALUE_COUNT_ENTRIES: usize = 15;

/// Metadata about a run.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Path of the input file.
    pub input: String,
    /// Study that was run.
    pub study: String,
    pub run_date: DateTime<Utc>,
    pub input_rows: usize,
    pub input_columns: usize,
    /// Number of chart artifacts written (zero on a dry run).
    pub charts_rendered: usize,
    pub duration_seconds: f64,
}

/// Everything reported for one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub metadata: ReportMetadata,
    pub columns: Vec<ColumnSummary>,
    pub value_counts: Vec<ValueCountSummary>,
    pub subsets: Vec<SubsetOutcome>,
    pub charts: Vec<ChartOutcome>,
}

impl RunReport {
    pub fn new(metadata: ReportMetadata, columns: Vec<ColumnSummary>, outcome: StudyOutcome) -> Self {
        Self {
            metadata,
            columns,
            value_counts: outcome.value_counts,
            subsets: outcome.subsets,
            charts: outcome.charts,
        }
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &RunReport) -> String {
    let mut output = String::new();

    output.push_str("# chartprep Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_columns_section(&report.columns));
    output.push_str(&generate_value_counts_section(&report.value_counts));
    output.push_str(&generate_subsets_section(&report.subsets));
    output.push_str(&generate_charts_section(&report.charts));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Input:** `{}`\n", metadata.input));
    section.push_str(&format!("- **Study:** {}\n", metadata.study));
    section.push_str(&format!(
        "- **Run Date:** {}\n",
        metadata.run_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Records:** {} ({} columns)\n",
        metadata.input_rows, metadata.input_columns
    ));
    section.push_str(&format!(
        "- **Charts Rendered:** {}\n",
        metadata.charts_rendered
    ));
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

fn generate_columns_section(columns: &[ColumnSummary]) -> String {
    let mut section = String::new();

    section.push_str("## Columns\n\n");
    section.push_str("| Column | Type | Non-missing |\n");
    section.push_str("|:---|:---|---:|\n");
    for column in columns {
        section.push_str(&format!(
            "| `{}` | {} | {} |\n",
            column.name, column.kind, column.non_missing
        ));
    }
    section.push('\n');

    section
}

fn generate_value_counts_section(counts: &[ValueCountSummary]) -> String {
    if counts.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Value Counts\n\n");

    for summary in counts {
        section.push_str(&format!("### {}\n\n", summary.column));
        section.push_str("| Value | Count |\n");
        section.push_str("|:---|---:|\n");

        for (value, count) in summary.entries.iter().take(MAX_VALUE_COUNT_ENTRIES) {
            section.push_str(&format!("| {} | {} |\n", value, count));
        }
        if summary.entries.len() > MAX_VALUE_COUNT_ENTRIES {
            section.push_str(&format!(
                "\n*{} more values not shown*\n",
                summary.entries.len() - MAX_VALUE_COUNT_ENTRIES
            ));
        }
        section.push('\n');
    }

    section
}

fn generate_subsets_section(subsets: &[SubsetOutcome]) -> String {
    if subsets.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Derived Tables\n\n");
    section.push_str("| Table | Source | Records |\n");
    section.push_str("|:---|:---|---:|\n");
    for subset in subsets {
        section.push_str(&format!(
            "| `{}` | `{}` | {} |\n",
            subset.name, subset.source, subset.rows
        ));
    }
    section.push('\n');

    section
}

fn generate_charts_section(charts: &[ChartOutcome]) -> String {
    let mut section = String::new();

    section.push_str("## Charts\n\n");

    if charts.is_empty() {
        section.push_str("No charts were planned for this study.\n\n");
        return section;
    }

    section.push_str("| Chart | Kind | Source | Records | Columns | Artifact |\n");
    section.push_str("|:---|:---|:---|---:|:---|:---|\n");
    for chart in charts {
        let artifact = chart
            .artifact
            .as_deref()
            .map(|a| format!("`{}`", a))
            .unwrap_or_else(|| "-".to_string());
        let records = if chart.rows == 0 {
            "⚠️ 0".to_string()
        } else {
            chart.rows.to_string()
        };

        section.push_str(&format!(
            "| {} | {} | `{}` | {} | {} | {} |\n",
            chart.name,
            chart.kind,
            chart.source,
            records,
            chart.columns.join(", "),
            artifact
        ));
    }
    section.push('\n');

    section
}

fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by chartprep*\n");

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::ChartKind;
    use crate::table::ColumnKind;

    fn create_test_report() -> RunReport {
        let metadata = ReportMetadata {
            input: "use.csv".to_string(),
            study: "usage".to_string(),
            run_date: Utc::now(),
            input_rows: 8760,
            input_columns: 4,
            charts_rendered: 1,
            duration_seconds: 0.4,
        };

        let outcome = StudyOutcome {
            subsets: vec![SubsetOutcome {
                name: "janjul".to_string(),
                source: "input".to_string(),
                rows: 1488,
            }],
            value_counts: vec![ValueCountSummary {
                column: "month".to_string(),
                entries: (1..=20).map(|m| (m.to_string(), 744)).collect(),
            }],
            charts: vec![
                ChartOutcome {
                    name: "f1_usage.png".to_string(),
                    kind: ChartKind::Bar,
                    source: "janjul".to_string(),
                    rows: 48,
                    columns: vec!["month".into(), "hour".into(), "usage".into()],
                    artifact: Some("charts/f1_usage.json".to_string()),
                },
                ChartOutcome {
                    name: "f5_hex.png".to_string(),
                    kind: ChartKind::Hexbin,
                    source: "janjul".to_string(),
                    rows: 0,
                    columns: vec!["day".into(), "hour".into()],
                    artifact: None,
                },
            ],
        };

        let columns = vec![ColumnSummary {
            name: "usage".to_string(),
            kind: ColumnKind::Float,
            non_missing: 8760,
        }];

        RunReport::new(metadata, columns, outcome)
    }

    #[test]
    fn test_generate_markdown_report() {
        let markdown = generate_markdown_report(&create_test_report());

        assert!(markdown.contains("# chartprep Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("- **Records:** 8760 (4 columns)"));
        assert!(markdown.contains("| `usage` | float | 8760 |"));
        assert!(markdown.contains("| `janjul` | `input` | 1488 |"));
        assert!(markdown.contains("`charts/f1_usage.json`"));
        assert!(markdown.contains("| f5_hex.png | hexbin | `janjul` | ⚠️ 0 |"));
        assert!(markdown.contains("*5 more values not shown*"));
    }

    #[test]
    fn test_empty_plan_message() {
        let mut report = create_test_report();
        report.charts.clear();
        report.subsets.clear();
        report.value_counts.clear();

        let markdown = generate_markdown_report(&report);
        assert!(markdown.contains("No charts were planned"));
        assert!(!markdown.contains("## Derived Tables"));
        assert!(!markdown.contains("## Value Counts"));
    }

    #[test]
    fn test_generate_json_report() {
        let json = generate_json_report(&create_test_report()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(doc["metadata"]["study"], "usage");
        assert_eq!(doc["columns"][0]["kind"], "float");
        assert_eq!(doc["charts"][0]["kind"], "bar");
        assert!(doc["charts"][1].get("artifact").is_none());
        assert_eq!(doc["value_counts"][0]["entries"][0][1], 744);
    }
}
