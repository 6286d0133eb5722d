//! Household electricity usage study.
//!
//! Works on hourly readings with `month`, `day`, `hour` and `usage`
//! columns, comparing the months listed in [`UsageConfig`].

use super::{ChartJob, StudyPlan, Subset, INPUT_TABLE};
use crate::config::UsageConfig;
use crate::pipeline::{pivot_column_name, Pipeline, Reducer, Stage};
use crate::render::{ChartKind, ChartSpec};
use crate::table::Value;
use tracing::warn;

/// Name of the derived table holding only the compared months.
pub const MONTHS_TABLE: &str = "janjul";

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

fn month_name(month: i64) -> String {
    usize::try_from(month - 1)
        .ok()
        .and_then(|i| MONTH_NAMES.get(i))
        .map(|name| name.to_string())
        .unwrap_or_else(|| format!("Month {}", month))
}

/// `column in [a, b, ...]`
fn any_of(column: &str, values: &[i64]) -> String {
    let list: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("{} in [{}]", column, list.join(", "))
}

fn select(columns: &[&str]) -> Stage {
    Stage::Select {
        columns: columns.iter().map(|c| c.to_string()).collect(),
    }
}

pub fn plan(config: &UsageConfig) -> StudyPlan {
    let mut plan = StudyPlan::new("usage");

    let months = if config.months.is_empty() {
        warn!("No months configured, comparing every month");
        Pipeline::new()
    } else {
        Pipeline::new().then(Stage::Filter {
            query: any_of("month", &config.months),
        })
    };
    plan.subsets.push(Subset::new(MONTHS_TABLE, INPUT_TABLE, months));

    plan.charts.push(ChartJob::new(
        ChartSpec::new("f1_usage.png", ChartKind::Bar)
            .x("hour")
            .y("usage")
            .hue("month")
            .title("Average Electricity Usage")
            .labels("Hour", "kW"),
        MONTHS_TABLE,
        Pipeline::new().then(Stage::GroupReduce {
            keys: vec!["month".into(), "hour".into()],
            target: "usage".into(),
            reducer: Reducer::Mean,
        }),
    ));

    plan.charts.push(ChartJob::new(
        ChartSpec::new("f2_boxen.png", ChartKind::Boxen)
            .x("month")
            .y("usage")
            .title("Distribution of Hourly Load")
            .labels("Month", "kW"),
        MONTHS_TABLE,
        Pipeline::new().then(select(&["month", "usage"])),
    ));

    plan.charts.push(ChartJob::new(
        ChartSpec::new("f3_violins.png", ChartKind::Violin)
            .x("month")
            .y("usage")
            .title("Distribution of Hourly Load")
            .labels("Month", "kW"),
        MONTHS_TABLE,
        Pipeline::new().then(select(&["month", "usage"])),
    ));

    if config.hours.is_empty() {
        warn!("No hours configured, skipping f4_split-violins.png");
    } else {
        plan.charts.push(ChartJob::new(
            ChartSpec::new("f4_split-violins.png", ChartKind::Violin)
                .x("hour")
                .y("usage")
                .hue("month")
                .split()
                .title("Distribution of Hourly Load")
                .labels("Hour", "kW"),
            MONTHS_TABLE,
            Pipeline::new()
                .then(Stage::Filter {
                    query: any_of("hour", &config.hours),
                })
                .then(select(&["hour", "month", "usage"])),
        ));
    }

    match config.months.as_slice() {
        [first, second, ..] => {
            let x = pivot_column_name("month", &Value::Int(*first));
            let y = pivot_column_name("month", &Value::Int(*second));
            plan.charts.push(ChartJob::new(
                ChartSpec::new("f5_hex.png", ChartKind::Hexbin)
                    .x(x)
                    .y(y)
                    .title("Distribution of Hourly Load")
                    .labels(month_name(*first), month_name(*second)),
                MONTHS_TABLE,
                Pipeline::new().then(Stage::Pivot {
                    index: vec!["day".into(), "hour".into()],
                    column: "month".into(),
                    values: "usage".into(),
                }),
            ));
        }
        _ => warn!("Fewer than two months configured, skipping f5_hex.png"),
    }

    plan
}
