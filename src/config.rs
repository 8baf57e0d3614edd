use std::path::Path;
use std::str::FromStr;

use report_tables::{DEFAULT_LINE_SCALE, ExtractOptions, Flavor, PageSelection, QualityMode};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

pub const DEFAULT_KEYWORD: &str = "OncoKids";
pub const DEFAULT_SPECIMEN_PATTERN: &str = r"[A-Z]{1,2}\d{2}-\d+";
pub const DEFAULT_END_MARKER: &str = r"(?i)end\s+of\s+report";
pub const DEFAULT_KEYWORD_WINDOW: usize = 200;
pub const DEFAULT_FILE_TEMPLATE: &str = "OncoKids_{year}_{specimen}.pdf";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PatternConfig {
    /// Literal that opens a report; matched case-insensitively.
    pub keyword: String,
    pub specimen_pattern: String,
    pub end_marker: String,
    /// Maximum distance in bytes between the keyword and the specimen ID.
    pub keyword_window: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            keyword: DEFAULT_KEYWORD.to_string(),
            specimen_pattern: DEFAULT_SPECIMEN_PATTERN.to_string(),
            end_marker: DEFAULT_END_MARKER.to_string(),
            keyword_window: DEFAULT_KEYWORD_WINDOW,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SegmentConfig {
    /// Output file name; `{specimen}` and `{year}` are substituted.
    pub file_template: String,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            file_template: DEFAULT_FILE_TEMPLATE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractionConfig {
    pub flavor: Flavor,
    pub line_scale: u32,
    /// Flavor retried once when the primary flavor finds no table.
    pub fallback_flavor: Option<Flavor>,
    pub min_cols: usize,
    pub pages: Option<String>,
    /// Handling of low-confidence tables.
    pub quality_mode: QualityMode,
    pub write_debug_tables: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            flavor: Flavor::Bordered,
            line_scale: DEFAULT_LINE_SCALE,
            fallback_flavor: None,
            min_cols: 2,
            pages: None,
            quality_mode: QualityMode::BestEffort,
            write_debug_tables: true,
        }
    }
}

impl ExtractionConfig {
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for a malformed page
    /// selection.
    pub fn options(&self) -> Result<ExtractOptions, PipelineError> {
        let pages = self
            .pages
            .as_deref()
            .map(PageSelection::from_str)
            .transpose()
            .map_err(|error| PipelineError::InvalidConfig(format!("extraction.pages: {error}")))?;
        Ok(ExtractOptions {
            pages,
            flavor: self.flavor,
            line_scale: self.line_scale,
            quality_mode: self.quality_mode,
            min_cols: self.min_cols,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub dna_file: String,
    pub rna_file: String,
    pub cma_file: String,
    pub no_tables_file: String,
    pub summary_file: String,
    pub tables_dir: String,
    pub specimens_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dna_file: "dna_variants.csv".to_string(),
            rna_file: "rna_fusions.csv".to_string(),
            cma_file: "cma_cnv.csv".to_string(),
            no_tables_file: "pdfs_with_no_tables.csv".to_string(),
            summary_file: "run_summary.json".to_string(),
            tables_dir: "tables".to_string(),
            specimens_dir: "specimens".to_string(),
        }
    }
}

/// Appends `.csv` unless the name already ends with it (any case).
pub fn csv_file_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.to_ascii_lowercase().ends_with(".csv") {
        trimmed.to_string()
    } else {
        format!("{trimmed}.csv")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub pattern: PatternConfig,
    pub segment: SegmentConfig,
    pub extraction: ExtractionConfig,
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// Reads a JSON config file. Missing sections and fields keep their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read, is not valid JSON, or does not
    /// pass [`PipelineConfig::validate`].
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let raw = std::fs::read_to_string(path).map_err(|error| PipelineError::io(path, error))?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Normalizes output names and checks the values no stage can recover
    /// from.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] describing the first bad
    /// field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.pattern.keyword.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "pattern.keyword cannot be empty".to_string(),
            ));
        }
        if !self.segment.file_template.contains("{specimen}") {
            return Err(PipelineError::InvalidConfig(
                "segment.file_template must contain {specimen}".to_string(),
            ));
        }
        if self.extraction.line_scale == 0 {
            return Err(PipelineError::InvalidConfig(
                "extraction.line_scale must be greater than zero".to_string(),
            ));
        }
        if self.extraction.min_cols < 2 {
            return Err(PipelineError::InvalidConfig(
                "extraction.min_cols must be at least 2".to_string(),
            ));
        }
        if self.extraction.fallback_flavor == Some(self.extraction.flavor) {
            return Err(PipelineError::InvalidConfig(
                "extraction.fallback_flavor must differ from extraction.flavor".to_string(),
            ));
        }
        self.extraction.options()?;
        Ok(())
    }

    #[must_use]
    pub fn normalized(mut self) -> Self {
        let output = &mut self.output;
        for name in [
            &mut output.dna_file,
            &mut output.rna_file,
            &mut output.cma_file,
            &mut output.no_tables_file,
        ] {
            *name = csv_file_name(name);
        }
        self
    }
}
