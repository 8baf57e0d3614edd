use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use report_tables::{ExtractError, PageText, PdfSource};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::issue::{Issue, IssueCode};
use crate::pattern::SpecimenBoundary;

/// A loaded combined document that can write page ranges out.
pub trait PageWriter {
    fn pages(&self) -> &[PageText];

    /// Writes pages `start..=end` (1-based) to `output`.
    ///
    /// # Errors
    ///
    /// Implementations fail for ranges outside the document or when the
    /// output cannot be written.
    fn write_subrange(&self, start: u32, end: u32, output: &Path) -> Result<(), ExtractError>;
}

pub trait PageSource {
    type Document: PageWriter;

    /// # Errors
    ///
    /// Fails when the document cannot be read or parsed.
    fn load_pages(&self, path: &Path) -> Result<Self::Document, ExtractError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfPageSource;

impl PageSource for LopdfPageSource {
    type Document = PdfSource;

    fn load_pages(&self, path: &Path) -> Result<PdfSource, ExtractError> {
        PdfSource::open(path)
    }
}

impl PageWriter for PdfSource {
    fn pages(&self) -> &[PageText] {
        PdfSource::pages(self)
    }

    fn write_subrange(&self, start: u32, end: u32, output: &Path) -> Result<(), ExtractError> {
        self.write_page_range(start, end, output)
    }
}

/// Four-digit year from the two digits following the specimen prefix,
/// e.g. `S22-1234` gives `2022`.
pub fn specimen_year(specimen_id: &str) -> Option<String> {
    let digits = specimen_id
        .trim_start_matches(|ch: char| ch.is_ascii_alphabetic())
        .chars()
        .take_while(char::is_ascii_digit)
        .collect::<String>();
    (digits.len() == 2).then(|| format!("20{digits}"))
}

pub(crate) fn file_safe(value: &str) -> String {
    value
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentedSpecimen {
    pub specimen_id: String,
    pub file_name: String,
    pub start_page: u32,
    pub end_page: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentOutcome {
    pub written: Vec<SegmentedSpecimen>,
    pub issues: Vec<Issue>,
}

impl SegmentOutcome {
    pub fn written_count(&self) -> usize {
        self.written.len()
    }
}

#[derive(Debug, Clone)]
pub struct Segmenter {
    template: String,
    output_dir: PathBuf,
}

impl Segmenter {
    pub fn new(template: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            template: template.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn file_name(&self, specimen_id: &str) -> String {
        let year = specimen_year(specimen_id).unwrap_or_else(|| "unknown".to_string());
        file_safe(
            &self
                .template
                .replace("{specimen}", specimen_id)
                .replace("{year}", &year),
        )
    }

    /// Writes one document per boundary. A file only appears under its
    /// final name once it has been written completely.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] only when the output directory cannot be
    /// created; per-boundary failures are recorded in the outcome.
    pub fn segment(
        &self,
        document: &dyn PageWriter,
        boundaries: &[SpecimenBoundary],
    ) -> Result<SegmentOutcome, PipelineError> {
        fs::create_dir_all(&self.output_dir)
            .map_err(|error| PipelineError::io(&self.output_dir, error))?;

        let mut outcome = SegmentOutcome::default();
        let mut used_names = HashSet::new();

        for boundary in boundaries {
            let file_name = self.file_name(&boundary.specimen_id);
            if !used_names.insert(file_name.clone()) {
                let issue = Issue::new(
                    IssueCode::PatternConflict,
                    format!("output name '{file_name}' already used in this run; range skipped"),
                )
                .with_specimen(&boundary.specimen_id)
                .with_page(boundary.start_page);
                warn!(%issue, "segment skipped");
                outcome.issues.push(issue);
                continue;
            }

            let final_path = self.output_dir.join(&file_name);
            let partial_path = self.output_dir.join(format!("{file_name}.partial"));
            let written = document
                .write_subrange(boundary.start_page, boundary.end_page, &partial_path)
                .map_err(|error| error.to_string())
                .and_then(|()| {
                    fs::rename(&partial_path, &final_path).map_err(|error| error.to_string())
                });

            match written {
                Ok(()) => {
                    debug!(
                        specimen = %boundary.specimen_id,
                        file = %file_name,
                        pages = boundary.page_count(),
                        "specimen document written"
                    );
                    outcome.written.push(SegmentedSpecimen {
                        specimen_id: boundary.specimen_id.clone(),
                        file_name,
                        start_page: boundary.start_page,
                        end_page: boundary.end_page,
                    });
                }
                Err(message) => {
                    let _ = fs::remove_file(&partial_path);
                    let issue = Issue::new(
                        IssueCode::ExtractionFailure,
                        format!("could not write specimen document: {message}"),
                    )
                    .with_specimen(&boundary.specimen_id)
                    .with_file(file_name)
                    .with_page(boundary.start_page);
                    warn!(%issue, "segment failed");
                    outcome.issues.push(issue);
                }
            }
        }

        info!(
            written = outcome.written_count(),
            skipped = outcome.issues.len(),
            "segmentation finished"
        );
        Ok(outcome)
    }
}
