//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.chartprep.toml` files.

use crate::pipeline::Pipeline;
use crate::render::{ChartSpec, RenderConfig};
use crate::study::{StudyKind, INPUT_TABLE};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".chartprep.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Plotting settings passed to the renderer.
    #[serde(default)]
    pub render: RenderConfig,

    /// Usage study settings.
    #[serde(default)]
    pub usage: UsageConfig,

    /// Solar study settings.
    #[serde(default)]
    pub solar: SolarConfig,

    /// Extra charts, appended to whichever study runs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub charts: Vec<ChartConfig>,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory chart artifacts are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Report file name, relative to the output directory.
    #[serde(default = "default_report")]
    pub report: String,

    /// Study run when `--study` is not given.
    #[serde(default)]
    pub study: StudyKind,

    /// Input field delimiter (a single ASCII character).
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Stop reading input after this many records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rows: Option<usize>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            report: default_report(),
            study: StudyKind::default(),
            delimiter: default_delimiter(),
            max_rows: None,
        }
    }
}

impl GeneralConfig {
    /// Delimiter as a byte; falls back to a comma when the setting is not
    /// a single ASCII character.
    pub fn delimiter_byte(&self) -> u8 {
        match self.delimiter.as_bytes() {
            [b] if b.is_ascii() => *b,
            _ => b',',
        }
    }
}

fn default_output_dir() -> String {
    "charts".to_string()
}

fn default_report() -> String {
    "chartprep_report.md".to_string()
}

fn default_delimiter() -> String {
    ",".to_string()
}

/// Usage study settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageConfig {
    /// Months compared; the first two feed the hexbin axes.
    #[serde(default = "default_months")]
    pub months: Vec<i64>,

    /// Hours shown in the split violin plot.
    #[serde(default = "default_hours")]
    pub hours: Vec<i64>,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            months: default_months(),
            hours: default_hours(),
        }
    }
}

fn default_months() -> Vec<i64> {
    vec![1, 7]
}

fn default_hours() -> Vec<i64> {
    vec![8, 12, 20]
}

/// Solar study settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolarConfig {
    /// Variables that get a count plot and a value-count table.
    #[serde(default = "default_categorical")]
    pub categorical: Vec<String>,

    #[serde(default = "default_sector")]
    pub sector: String,

    #[serde(default = "default_app_status")]
    pub app_status: String,

    #[serde(default = "default_inst_status")]
    pub inst_status: String,

    /// Exclusive upper bound on system size (kW).
    #[serde(default = "default_nameplate_max")]
    pub nameplate_max: f64,

    /// Exclusive upper bound on total cost.
    #[serde(default = "default_total_cost_max")]
    pub total_cost_max: f64,
}

impl Default for SolarConfig {
    fn default() -> Self {
        Self {
            categorical: default_categorical(),
            sector: default_sector(),
            app_status: default_app_status(),
            inst_status: default_inst_status(),
            nameplate_max: default_nameplate_max(),
            total_cost_max: default_total_cost_max(),
        }
    }
}

fn default_categorical() -> Vec<String> {
    vec![
        "app_status",
        "sector",
        "state",
        "third_party",
        "inst_status",
        "type",
        "year",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_sector() -> String {
    "Residential".to_string()
}

fn default_app_status() -> String {
    "Completed".to_string()
}

fn default_inst_status() -> String {
    "Installed".to_string()
}

fn default_nameplate_max() -> f64 {
    20.0
}

fn default_total_cost_max() -> f64 {
    160000.0
}

/// A chart declared in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    #[serde(flatten)]
    pub chart: ChartSpec,

    /// Table the stages read: `input` or a study's derived table.
    #[serde(default = "default_source")]
    pub source: String,

    #[serde(default)]
    pub stages: Pipeline,
}

fn default_source() -> String {
    INPUT_TABLE.to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.chartprep.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(CONFIG_FILE);

        if path.exists() {
            Ok(Some(Self::load(&path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were actually given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(study) = args.study {
            self.general.study = study;
        }
        if let Some(ref dir) = args.output_dir {
            self.general.output_dir = dir.display().to_string();
        }
        if let Some(delimiter) = args.delimiter {
            self.general.delimiter = delimiter.to_string();
        }
        if let Some(max_rows) = args.max_rows {
            self.general.max_rows = Some(max_rows);
        }

        if let Some(dpi) = args.dpi {
            self.render.dpi = dpi;
        }
        if let Some(ref style) = args.style {
            self.render.style = style.clone();
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Stage;
    use crate::render::ChartKind;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.output_dir, "charts");
        assert_eq!(config.general.study, StudyKind::Usage);
        assert_eq!(config.render.dpi, 300);
        assert_eq!(config.usage.months, vec![1, 7]);
        assert!(config.solar.categorical.contains(&"third_party".to_string()));
        assert!(config.charts.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output_dir = "out"
study = "solar"
delimiter = ";"

[render]
style = "darkgrid"

[solar]
nameplate_max = 15.0
categorical = ["sector"]

[[charts]]
name = "res_cost_by_year.png"
kind = "box"
x = "year"
y = "total_cost"
source = "res"
stages = [{ op = "select", columns = ["year", "total_cost"] }]
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output_dir, "out");
        assert_eq!(config.general.study, StudyKind::Solar);
        assert_eq!(config.general.delimiter_byte(), b';');
        assert_eq!(config.render.style, "darkgrid");
        assert_eq!(config.render.dpi, 300);
        assert_eq!(config.solar.nameplate_max, 15.0);
        assert_eq!(config.solar.total_cost_max, 160000.0);
        assert_eq!(config.solar.categorical, vec!["sector"]);

        let chart = &config.charts[0];
        assert_eq!(chart.chart.kind, ChartKind::Box);
        assert_eq!(chart.chart.y.as_deref(), Some("total_cost"));
        assert_eq!(chart.source, "res");
        assert!(matches!(chart.stages.stages()[0], Stage::Select { .. }));
    }

    #[test]
    fn test_delimiter_byte_fallback() {
        let mut general = GeneralConfig::default();
        general.delimiter = "\t".to_string();
        assert_eq!(general.delimiter_byte(), b'\t');

        general.delimiter = "||".to_string();
        assert_eq!(general.delimiter_byte(), b',');
    }

    #[test]
    fn test_load_from_dir() {
        let temp_dir = TempDir::new().unwrap();
        assert!(Config::load_from_dir(temp_dir.path()).unwrap().is_none());

        std::fs::write(
            temp_dir.path().join(CONFIG_FILE),
            "[usage]\nmonths = [6, 12]\n",
        )
        .unwrap();
        let config = Config::load_from_dir(temp_dir.path()).unwrap().unwrap();
        assert_eq!(config.usage.months, vec![6, 12]);
        assert_eq!(config.usage.hours, vec![8, 12, 20]);

        std::fs::write(temp_dir.path().join(CONFIG_FILE), "[usage\n").unwrap();
        assert!(Config::load_from_dir(temp_dir.path()).is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[render]"));
        assert!(toml_str.contains("[usage]"));
        assert!(toml_str.contains("[solar]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.solar.sector, "Residential");
        assert!(!toml_str.contains("verbose"));
    }

    #[test]
    fn test_verbosity_is_not_a_config_setting() {
        // Logging is chosen by --verbose / --quiet / RUST_LOG; older files may still carry the key
        let config: Config = toml::from_str("[general]\nverbose = true\noutput_dir = \"out\"\n").unwrap();
        assert_eq!(config.general.output_dir, "out");
    }
}
