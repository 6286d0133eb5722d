//! Chart descriptions and the renderer seam.
//!
//! The pipeline never draws anything. It hands a shaped [`Table`] plus a
//! [`ChartSpec`] to a [`Renderer`], which produces an artifact.

pub mod report;
pub mod spec_writer;

pub use spec_writer::JsonSpecWriter;

use crate::error::PipelineResult;
use crate::table::Table;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Global plotting settings passed to every render call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Theme name understood by the plotting library.
    #[serde(default = "default_style")]
    pub style: String,

    /// Output resolution in dots per inch.
    #[serde(default = "default_dpi")]
    pub dpi: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            style: default_style(),
            dpi: default_dpi(),
        }
    }
}

fn default_style() -> String {
    "white".to_string()
}

fn default_dpi() -> u32 {
    300
}

/// Kind of statistical chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Count,
    Bar,
    Histogram,
    Box,
    Boxen,
    Violin,
    Hexbin,
    Line,
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChartKind::Count => "count",
            ChartKind::Bar => "bar",
            ChartKind::Histogram => "histogram",
            ChartKind::Box => "box",
            ChartKind::Boxen => "boxen",
            ChartKind::Violin => "violin",
            ChartKind::Hexbin => "hexbin",
            ChartKind::Line => "line",
        };
        write!(f, "{}", name)
    }
}

/// Axis orientation for categorical charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Vertical,
    Horizontal,
}

/// What to draw and which columns feed which channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    /// Output file name, e.g. `f1_usage.png`.
    pub name: String,

    /// Chart kind.
    pub kind: ChartKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,

    /// Column that splits the data into colored series.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hue: Option<String>,

    /// Draw split violins (one half per hue level).
    #[serde(default)]
    pub split: bool,

    #[serde(default)]
    pub orient: Orientation,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_label: Option<String>,
}

impl ChartSpec {
    /// Creates a chart with no bindings.
    pub fn new(name: impl Into<String>, kind: ChartKind) -> Self {
        Self {
            name: name.into(),
            kind,
            x: None,
            y: None,
            hue: None,
            split: false,
            orient: Orientation::Vertical,
            title: None,
            x_label: None,
            y_label: None,
        }
    }

    pub fn x(mut self, column: impl Into<String>) -> Self {
        self.x = Some(column.into());
        self
    }

    pub fn y(mut self, column: impl Into<String>) -> Self {
        self.y = Some(column.into());
        self
    }

    pub fn hue(mut self, column: impl Into<String>) -> Self {
        self.hue = Some(column.into());
        self
    }

    pub fn split(mut self) -> Self {
        self.split = true;
        self
    }

    pub fn horizontal(mut self) -> Self {
        self.orient = Orientation::Horizontal;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn labels(mut self, x: impl Into<String>, y: impl Into<String>) -> Self {
        self.x_label = Some(x.into());
        self.y_label = Some(y.into());
        self
    }

    /// Bound column names (x, y, hue) in that order.
    pub fn bindings(&self) -> Vec<&str> {
        [&self.x, &self.y, &self.hue]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect()
    }

    /// Checks that every bound column exists in `data`.
    pub fn validate_bindings(&self, data: &Table) -> PipelineResult<()> {
        for column in self.bindings() {
            data.require_column(column)?;
        }
        Ok(())
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        match self.name.rfind('.') {
            Some(dot) if dot > 0 => &self.name[..dot],
            _ => &self.name,
        }
    }
}

/// Produces a chart artifact from shaped data.
pub trait Renderer {
    /// Renders one chart and returns the path of the artifact written.
    fn render(&mut self, chart: &ChartSpec, data: &Table, config: &RenderConfig)
        -> Result<PathBuf>;
}
