//! JSON chart-spec renderer.
//!
//! Writes one `<stem>.json` document per chart holding everything a
//! plotting library needs: the target image name, chart kind, column
//! bindings, render settings and the data rows.

use super::{ChartSpec, RenderConfig, Renderer};
use crate::table::Table;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Document written for each chart.
#[derive(Debug, Serialize)]
struct ChartDocument<'a> {
    image: &'a str,
    chart: &'a ChartSpec,
    render: &'a RenderConfig,
    data: &'a Table,
}

/// Renderer that writes JSON chart specs into a directory.
pub struct JsonSpecWriter {
    output_dir: PathBuf,
}

impl JsonSpecWriter {
    /// Creates the writer, creating `output_dir` if needed.
    pub fn new(output_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(output_dir).with_context(|| {
            format!("Failed to create output directory: {}", output_dir.display())
        })?;

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
        })
    }
}

impl Renderer for JsonSpecWriter {
    fn render(
        &mut self,
        chart: &ChartSpec,
        data: &Table,
        config: &RenderConfig,
    ) -> Result<PathBuf> {
        let path = self.output_dir.join(format!("{}.json", chart.stem()));

        let document = ChartDocument {
            image: &chart.name,
            chart,
            render: config,
            data,
        };

        let content = serde_json::to_string_pretty(&document)
            .with_context(|| format!("Failed to serialize chart {}", chart.name))?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write chart spec to {}", path.display()))?;

        debug!("Wrote {} ({} records)", path.display(), data.len());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::ChartKind;
    use crate::table::{table_of, Value};
    use tempfile::TempDir;

    #[test]
    fn test_writes_spec_document() {
        let temp_dir = TempDir::new().unwrap();
        let out_dir = temp_dir.path().join("charts");
        let mut writer = JsonSpecWriter::new(&out_dir).unwrap();

        let chart = ChartSpec::new("f5_hex.png", ChartKind::Hexbin)
            .x("month_1")
            .y("month_7")
            .title("Distribution of Hourly Load")
            .labels("January", "July");
        let data = table_of(
            &["day", "hour", "month_1", "month_7"],
            vec![vec![Value::Int(1), Value::Int(0), Value::Float(0.5), Value::Missing]],
        );

        let path = writer
            .render(&chart, &data, &RenderConfig::default())
            .unwrap();
        assert_eq!(path, out_dir.join("f5_hex.json"));

        let content = std::fs::read_to_string(&path).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(doc["image"], "f5_hex.png");
        assert_eq!(doc["chart"]["kind"], "hexbin");
        assert_eq!(doc["chart"]["x"], "month_1");
        assert_eq!(doc["render"]["dpi"], 300);
        assert_eq!(doc["data"]["columns"][2], "month_1");
        assert_eq!(doc["data"]["rows"][0][2], 0.5);
        assert!(doc["data"]["rows"][0][3].is_null());
    }
}
