//! California Solar Initiative study.
//!
//! Count plots for each categorical variable over all installations, then
//! size, cost and third-party-ownership charts over completed residential
//! installs.

use super::{ChartJob, StudyPlan, Subset, INPUT_TABLE};
use crate::config::SolarConfig;
use crate::pipeline::ops::{COUNT_COLUMN, VALUE_COLUMN, VARIABLE_COLUMN};
use crate::pipeline::{Pipeline, Reducer, Stage};
use crate::render::{ChartKind, ChartSpec};
use tracing::warn;

/// Completed residential installations.
pub const RESIDENTIAL_TABLE: &str = "res";
/// Residential installations inside the configured size and cost limits.
pub const TRIMMED_TABLE: &str = "trim";

/// Quote a string literal for a filter query.
fn quote(value: &str) -> String {
    if value.contains('\'') {
        format!("\"{}\"", value)
    } else {
        format!("'{}'", value)
    }
}

fn filter(query: String) -> Stage {
    Stage::Filter { query }
}

fn select(columns: &[&str]) -> Stage {
    Stage::Select {
        columns: columns.iter().map(|c| c.to_string()).collect(),
    }
}

fn count_chart(variable: &str, name: String, source: &str) -> ChartJob {
    ChartJob::new(
        ChartSpec::new(name, ChartKind::Count)
            .x(COUNT_COLUMN)
            .y(variable)
            .horizontal(),
        source,
        Pipeline::new().then(Stage::ValueCounts {
            column: variable.to_string(),
        }),
    )
}

pub fn plan(config: &SolarConfig, columns: &[String]) -> StudyPlan {
    let mut plan = StudyPlan::new("solar");
    let has = |name: &str| columns.iter().any(|c| c == name);

    plan.value_counts = config.categorical.clone();

    for variable in &config.categorical {
        if has(variable) {
            plan.charts.push(count_chart(
                variable,
                format!("csi_{}.png", variable),
                INPUT_TABLE,
            ));
        } else {
            warn!("Column '{}' not in dataset, skipping its count plot", variable);
        }
    }

    plan.subsets.push(Subset::new(
        RESIDENTIAL_TABLE,
        INPUT_TABLE,
        Pipeline::new()
            .then(filter(format!(
                "sector == {} and app_status == {}",
                quote(&config.sector),
                quote(&config.app_status)
            )))
            .then(filter(format!(
                "inst_status == {}",
                quote(&config.inst_status)
            ))),
    ));
    plan.subsets.push(Subset::new(
        TRIMMED_TABLE,
        RESIDENTIAL_TABLE,
        Pipeline::new().then(filter(format!(
            "nameplate < {} and total_cost < {}",
            config.nameplate_max, config.total_cost_max
        ))),
    ));

    plan.charts.push(count_chart(
        "third_party",
        "res_third_party.png".into(),
        RESIDENTIAL_TABLE,
    ));
    plan.charts.push(count_chart("year", "res_year.png".into(), RESIDENTIAL_TABLE));

    plan.charts.push(ChartJob::new(
        ChartSpec::new("res_nameplate.png", ChartKind::Histogram)
            .x("nameplate")
            .labels("Nameplate (kW)", "Installations"),
        TRIMMED_TABLE,
        Pipeline::new().then(select(&["nameplate"])),
    ));
    plan.charts.push(ChartJob::new(
        ChartSpec::new("res_total_cost.png", ChartKind::Histogram)
            .x("total_cost")
            .labels("Total Cost ($)", "Installations"),
        TRIMMED_TABLE,
        Pipeline::new().then(select(&["total_cost"])),
    ));

    plan.charts.push(ChartJob::new(
        ChartSpec::new("res_boxen_all.png", ChartKind::Boxen)
            .x("nameplate")
            .horizontal(),
        TRIMMED_TABLE,
        Pipeline::new().then(select(&["nameplate"])),
    ));
    plan.charts.push(ChartJob::new(
        ChartSpec::new("res_violin.png", ChartKind::Violin)
            .x("nameplate")
            .horizontal(),
        TRIMMED_TABLE,
        Pipeline::new().then(select(&["nameplate"])),
    ));
    plan.charts.push(ChartJob::new(
        ChartSpec::new("res_boxen_year.png", ChartKind::Boxen)
            .x("nameplate")
            .y("year")
            .horizontal()
            .labels("Nameplate (kW)", "Year"),
        TRIMMED_TABLE,
        Pipeline::new().then(select(&["year", "nameplate"])),
    ));
    plan.charts.push(ChartJob::new(
        ChartSpec::new("res_hexbin.png", ChartKind::Hexbin)
            .x("nameplate")
            .y("total_cost")
            .labels("Nameplate (kW)", "Total Cost ($)"),
        TRIMMED_TABLE,
        Pipeline::new().then(select(&["nameplate", "total_cost"])),
    ));

    // Yearly share of installs by third-party ownership
    plan.charts.push(ChartJob::new(
        ChartSpec::new("res_third_party_share.png", ChartKind::Bar)
            .x("year")
            .y(VALUE_COLUMN)
            .hue(VARIABLE_COLUMN)
            .title("Third-Party Ownership by Year")
            .labels("Year", "Percent of Installations"),
        RESIDENTIAL_TABLE,
        Pipeline::new()
            .then(Stage::GroupReduce {
                keys: vec!["year".into(), "third_party".into()],
                target: "nameplate".into(),
                reducer: Reducer::Count,
            })
            .then(Stage::Pivot {
                index: vec!["year".into()],
                column: "third_party".into(),
                values: "nameplate".into(),
            })
            .then(Stage::NormalizeRowPercent {
                group_key: vec!["year".into()],
                columns: Vec::new(),
            })
            .then(Stage::ToLongForm {
                id_columns: vec!["year".into()],
            }),
    ));

    plan
}
