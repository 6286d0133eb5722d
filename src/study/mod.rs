//! Chart studies.
//!
//! A study is a named plan over one input table: derived subsets (such as
//! the January/July slice of the usage data), frequency tables to report,
//! and a list of chart jobs. Executing the plan runs every pipeline and
//! hands each shaped table to a [`Renderer`].

pub mod solar;
pub mod usage;

use crate::config::Config;
use crate::error::PipelineError;
use crate::pipeline::{value_counts, Pipeline, Stage};
use crate::render::{ChartKind, ChartSpec, RenderConfig, Renderer};
use crate::table::Table;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Name under which the loaded dataset is addressable as a source.
pub const INPUT_TABLE: &str = "input";

/// Built-in chart sequences.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum StudyKind {
    /// Hourly household electricity usage.
    #[default]
    Usage,
    /// California Solar Initiative installation records.
    Solar,
    /// Only charts declared in the config file.
    Custom,
}

impl fmt::Display for StudyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StudyKind::Usage => write!(f, "usage"),
            StudyKind::Solar => write!(f, "solar"),
            StudyKind::Custom => write!(f, "custom"),
        }
    }
}

/// A named table derived from another table.
#[derive(Debug, Clone)]
pub struct Subset {
    pub name: String,
    pub source: String,
    pub pipeline: Pipeline,
}

impl Subset {
    pub fn new(name: &str, source: &str, pipeline: Pipeline) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_string(),
            pipeline,
        }
    }
}

/// One chart: where its data comes from and how it is shaped.
#[derive(Debug, Clone)]
pub struct ChartJob {
    pub chart: ChartSpec,
    pub source: String,
    pub pipeline: Pipeline,
}

impl ChartJob {
    pub fn new(chart: ChartSpec, source: &str, pipeline: Pipeline) -> Self {
        Self {
            chart,
            source: source.to_string(),
            pipeline,
        }
    }
}

impl From<&crate::config::ChartConfig> for ChartJob {
    fn from(config: &crate::config::ChartConfig) -> Self {
        Self {
            chart: config.chart.clone(),
            source: config.source.clone(),
            pipeline: config.stages.clone(),
        }
    }
}

/// Everything a study will compute.
#[derive(Debug, Clone)]
pub struct StudyPlan {
    pub name: String,
    pub subsets: Vec<Subset>,
    /// Input columns to summarize with value counts.
    pub value_counts: Vec<String>,
    pub charts: Vec<ChartJob>,
}

impl StudyPlan {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            subsets: Vec::new(),
            value_counts: Vec::new(),
            charts: Vec::new(),
        }
    }
}

/// Build the plan for `kind`, appending charts declared in config.
///
/// `columns` are the loaded dataset's columns; studies use them to skip
/// charts over variables the file does not carry.
pub fn build_plan(kind: StudyKind, config: &Config, columns: &[String]) -> StudyPlan {
    let mut plan = match kind {
        StudyKind::Usage => usage::plan(&config.usage),
        StudyKind::Solar => solar::plan(&config.solar, columns),
        StudyKind::Custom => StudyPlan::new("custom"),
    };

    plan.charts.extend(config.charts.iter().map(ChartJob::from));
    plan
}

/// Row count of a derived table.
#[derive(Debug, Clone, Serialize)]
pub struct SubsetOutcome {
    pub name: String,
    pub source: String,
    pub rows: usize,
}

/// Frequency table of one input column.
#[derive(Debug, Clone, Serialize)]
pub struct ValueCountSummary {
    pub column: String,
    pub entries: Vec<(String, usize)>,
}

/// What happened to one chart job.
#[derive(Debug, Clone, Serialize)]
pub struct ChartOutcome {
    pub name: String,
    pub kind: ChartKind,
    pub source: String,
    pub rows: usize,
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
}

/// Result of executing a [`StudyPlan`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct StudyOutcome {
    pub subsets: Vec<SubsetOutcome>,
    pub value_counts: Vec<ValueCountSummary>,
    pub charts: Vec<ChartOutcome>,
}

impl StudyOutcome {
    /// Charts whose shaped table had no records.
    pub fn empty_charts(&self) -> Vec<&ChartOutcome> {
        self.charts.iter().filter(|c| c.rows == 0).collect()
    }
}

fn resolve<'a>(
    name: &str,
    input: &'a Table,
    derived: &'a BTreeMap<String, Table>,
) -> Result<&'a Table> {
    if name == INPUT_TABLE {
        return Ok(input);
    }

    derived.get(name).ok_or_else(|| {
        let known: Vec<&str> = std::iter::once(INPUT_TABLE)
            .chain(derived.keys().map(String::as_str))
            .collect();
        anyhow::anyhow!(
            "Unknown source table '{}' (known: {})",
            name,
            known.join(", ")
        )
    })
}

/// Run every pipeline of `plan` over `input`.
///
/// With a renderer, each chart's table is rendered; without one (dry run)
/// the tables are only shaped and measured.
pub fn execute(
    plan: &StudyPlan,
    input: &Table,
    mut renderer: Option<&mut dyn Renderer>,
    render_config: &RenderConfig,
    show_progress: bool,
) -> Result<StudyOutcome> {
    let mut outcome = StudyOutcome::default();
    let mut derived: BTreeMap<String, Table> = BTreeMap::new();

    info!("Original records: {}", input.len());

    for subset in &plan.subsets {
        let source = resolve(&subset.source, input, &derived)?;
        let table = subset
            .pipeline
            .run(source)
            .with_context(|| format!("Failed to build table '{}'", subset.name))?;

        info!("{} records: {}", subset.name, table.len());
        outcome.subsets.push(SubsetOutcome {
            name: subset.name.clone(),
            source: subset.source.clone(),
            rows: table.len(),
        });
        derived.insert(subset.name.clone(), table);
    }

    for column in &plan.value_counts {
        match value_counts(input, column) {
            Ok(counts) => outcome.value_counts.push(ValueCountSummary {
                column: column.clone(),
                entries: counts
                    .rows()
                    .iter()
                    .map(|r| (r[0].to_string(), r[1].as_f64().unwrap_or(0.0) as usize))
                    .collect(),
            }),
            Err(e) => warn!("Skipping value counts for '{}': {}", column, e),
        }
    }

    let progress = if show_progress {
        let pb = ProgressBar::new(plan.charts.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    for job in &plan.charts {
        progress.set_message(job.chart.name.clone());
        debug!(
            "{}: {} stages over '{}'",
            job.chart.name,
            job.pipeline.stages().len(),
            job.source
        );

        let source = resolve(&job.source, input, &derived)
            .with_context(|| format!("Chart {} has no data source", job.chart.name))?;
        let data = job
            .pipeline
            .run(source)
            .with_context(|| format!("Failed to shape data for {}", job.chart.name))?;
        if let Err(e) = job.chart.validate_bindings(&data) {
            let missing_pivot = match &e {
                PipelineError::InvalidColumn { column, .. } => {
                    data.is_empty() || pivots_into(&job.pipeline, column)
                }
                _ => false,
            };
            if !missing_pivot {
                return Err(anyhow::Error::from(e).context(format!(
                    "Chart {} binds a column its data lacks",
                    job.chart.name
                )));
            }

            // A pivot only creates columns for values present in its input
            warn!("Chart {} has nothing to plot: {}", job.chart.name, e);
            outcome.charts.push(ChartOutcome {
                name: job.chart.name.clone(),
                kind: job.chart.kind,
                source: job.source.clone(),
                rows: 0,
                columns: data.columns().to_vec(),
                artifact: None,
            });
            progress.inc(1);
            continue;
        }

        if data.is_empty() {
            warn!("Chart {} has no records", job.chart.name);
        }

        let artifact = match renderer.as_deref_mut() {
            Some(r) => Some(r.render(&job.chart, &data, render_config)?),
            None => None,
        };

        outcome.charts.push(ChartOutcome {
            name: job.chart.name.clone(),
            kind: job.chart.kind,
            source: job.source.clone(),
            rows: data.len(),
            columns: data.columns().to_vec(),
            artifact: artifact.map(|p| p.display().to_string()),
        });

        progress.inc(1);
    }

    progress.finish_with_message("Charts complete");

    Ok(outcome)
}

/// Whether `column` is a name some pivot stage of `pipeline` would derive.
fn pivots_into(pipeline: &Pipeline, column: &str) -> bool {
    pipeline.stages().iter().any(|stage| match stage {
        Stage::Pivot { column: pivot, .. } => column
            .strip_prefix(pivot.as_str())
            .map_or(false, |rest| rest.starts_with('_')),
        _ => false,
    })
}
