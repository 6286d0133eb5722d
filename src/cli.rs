//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::study::StudyKind;
use clap::Parser;
use std::path::PathBuf;

/// chartprep - shape tabular data into chart-ready tables
///
/// Loads a delimited file, runs a chart study's aggregation pipelines
/// (filter, group, pivot, percent-normalize, melt) and writes one chart
/// spec per figure plus a run report.
///
/// Examples:
///   chartprep --input use.csv
///   chartprep --input ca_csi.csv --study solar --output-dir figures
///   chartprep --input data.tsv --delimiter '\t' --study custom --config charts.toml
///   chartprep --input use.csv --dry-run
///   chartprep --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Delimited input file with a header row
    #[arg(short, long, value_name = "FILE", required_unless_present = "init_config")]
    pub input: Option<PathBuf>,

    /// Study to run (usage, solar, custom)
    ///
    /// Defaults to the study named in the config file, or usage.
    #[arg(short, long, value_name = "STUDY")]
    pub study: Option<StudyKind>,

    /// Directory chart specs and the report are written to
    #[arg(short, long, value_name = "DIR", env = "CHARTPREP_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .chartprep.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format for the report (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Input field delimiter (a single character, or `\t` / `tab`)
    #[arg(short, long, value_name = "CHAR", value_parser = parse_delimiter)]
    pub delimiter: Option<char>,

    /// Read at most this many records
    #[arg(long, value_name = "COUNT")]
    pub max_rows: Option<usize>,

    /// Output resolution passed to the renderer
    #[arg(long, value_name = "DPI")]
    pub dpi: Option<u32>,

    /// Plot style theme passed to the renderer
    #[arg(long, value_name = "NAME")]
    pub style: Option<String>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: shape every chart table without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Exit with code 2 if any chart table has no records
    #[arg(long)]
    pub fail_on_empty: bool,

    /// Generate a default .chartprep.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// File extension used for reports in this format.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }
}

/// Parses a delimiter argument, accepting the escaped tab a shell passes through.
fn parse_delimiter(s: &str) -> Result<char, String> {
    if s == "\\t" || s == "tab" {
        return Ok('\t');
    }

    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(format!("expected a single character, got '{}'", s)),
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        match self.input {
            Some(ref input) if !input.exists() => {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
            Some(ref input) if !input.is_file() => {
                return Err(format!("Input path is not a file: {}", input.display()));
            }
            Some(_) => {}
            None => return Err("An input file is required (--input)".to_string()),
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.dpi == Some(0) {
            return Err("DPI must be at least 1".to_string());
        }

        if let Some(delimiter) = self.delimiter {
            if !delimiter.is_ascii() {
                return Err("Delimiter must be a single ASCII character".to_string());
            }
        }

        if self.max_rows == Some(0) {
            return Err("Max rows must be at least 1".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn make_args(input: &NamedTempFile) -> Args {
        Args {
            input: Some(input.path().to_path_buf()),
            study: None,
            output_dir: None,
            config: None,
            format: OutputFormat::Markdown,
            delimiter: None,
            max_rows: None,
            dpi: None,
            style: None,
            verbose: false,
            quiet: false,
            dry_run: false,
            fail_on_empty: false,
            init_config: false,
        }
    }

    #[test]
    fn test_validation_ok() {
        let input = NamedTempFile::new().unwrap();
        assert!(make_args(&input).validate().is_ok());
    }

    #[test]
    fn test_validation_missing_input() {
        let input = NamedTempFile::new().unwrap();
        let mut args = make_args(&input);
        args.input = Some(PathBuf::from("does/not/exist.csv"));
        assert!(args.validate().unwrap_err().contains("does not exist"));

        args.input = None;
        assert!(args.validate().is_err());

        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let input = NamedTempFile::new().unwrap();
        let mut args = make_args(&input);
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_dpi_and_delimiter() {
        let input = NamedTempFile::new().unwrap();
        let mut args = make_args(&input);
        args.dpi = Some(0);
        assert!(args.validate().is_err());

        args.dpi = Some(150);
        args.delimiter = Some('é');
        assert!(args.validate().is_err());

        args.delimiter = Some('\t');
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::try_parse_from([
            "chartprep",
            "--input",
            "ca_csi.csv",
            "--study",
            "solar",
            "--format",
            "json",
            "--delimiter",
            ";",
        ])
        .unwrap();

        assert_eq!(args.study, Some(StudyKind::Solar));
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.delimiter, Some(';'));
        assert_eq!(args.format.extension(), "json");
    }

    #[test]
    fn test_tab_delimiter_spellings() {
        for spelling in ["\\t", "tab", "\t"] {
            let args =
                Args::try_parse_from(["chartprep", "--input", "data.tsv", "--delimiter", spelling])
                    .unwrap();
            assert_eq!(args.delimiter, Some('\t'), "{spelling:?}");
        }

        assert!(Args::try_parse_from(["chartprep", "--input", "a.csv", "-d", ";;"]).is_err());
        assert!(Args::try_parse_from(["chartprep", "--input", "a.csv", "-d", ""]).is_err());
    }

    #[test]
    fn test_log_level() {
        let input = NamedTempFile::new().unwrap();
        let mut args = make_args(&input);
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
