use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use report_tables::{
    ENGINE_NAME, ExtractError, ExtractOptions, Flavor, TableExtraction, WarningCode,
    extract_tables, write_rows_csv,
};
use tracing::{debug, info};

use crate::context::RunContext;
use crate::error::PipelineError;
use crate::issue::{Issue, IssueCode};
use crate::pattern::SpecimenMatcher;
use crate::segment::file_safe;

/// One table as returned by the engine, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub specimen_id: String,
    /// 1-based position of the table within its source document.
    pub source_table_index: usize,
    /// Unknown for tables read back from CSV.
    pub page: Option<u32>,
    pub rows: Vec<Vec<String>>,
}

pub trait TableEngine {
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// Fails when the document cannot be read or the options are invalid.
    fn extract(
        &self,
        input_pdf: &Path,
        options: &ExtractOptions,
    ) -> Result<TableExtraction, ExtractError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfTableEngine;

impl TableEngine for LopdfTableEngine {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn extract(
        &self,
        input_pdf: &Path,
        options: &ExtractOptions,
    ) -> Result<TableExtraction, ExtractError> {
        extract_tables(input_pdf, options)
    }
}

/// The tables of one specimen document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTables {
    pub specimen_id: String,
    pub file_name: String,
    pub tables: Vec<RawTable>,
}

pub fn debug_table_file_name(specimen_id: &str, engine: &str, index: usize) -> String {
    format!("{}_table_{engine}_{index}.csv", file_safe(specimen_id))
}

/// Specimen ID named in the file name, or the file stem when none matches.
pub fn specimen_id_for(path: &Path, matcher: &dyn SpecimenMatcher) -> String {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    matcher
        .specimen_in(&stem)
        .into_iter()
        .next()
        .unwrap_or(stem)
}

/// `*.pdf` files directly inside `dir`, sorted by file name.
///
/// # Errors
///
/// Returns [`PipelineError`] when the directory cannot be listed.
pub fn pdf_files(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    if !dir.is_dir() {
        return Err(PipelineError::InputNotFound(dir.to_path_buf()));
    }
    let entries = fs::read_dir(dir).map_err(|error| PipelineError::io(dir, error))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|error| PipelineError::io(dir, error))?.path();
        let is_pdf = path
            .extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case("pdf"));
        if is_pdf && path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|left, right| left.file_name().cmp(&right.file_name()));
    Ok(files)
}

pub struct TableExtractor<E> {
    engine: E,
    options: ExtractOptions,
    fallback: Option<Flavor>,
    debug_dir: Option<PathBuf>,
}

impl<E: TableEngine> TableExtractor<E> {
    pub fn new(engine: E, options: ExtractOptions) -> Self {
        Self {
            engine,
            options,
            fallback: None,
            debug_dir: None,
        }
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: Option<Flavor>) -> Self {
        self.fallback = fallback.filter(|flavor| *flavor != self.options.flavor);
        self
    }

    #[must_use]
    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = Some(dir.into());
        self
    }

    fn run_engine(&self, input_pdf: &Path) -> Result<TableExtraction, ExtractError> {
        let extraction = self.engine.extract(input_pdf, &self.options)?;
        let Some(fallback) = self.fallback else {
            return Ok(extraction);
        };
        if !extraction.tables.is_empty() {
            return Ok(extraction);
        }

        debug!(
            file = %input_pdf.display(),
            primary = %self.options.flavor,
            %fallback,
            "no tables found, retrying with fallback flavor"
        );
        let options = ExtractOptions {
            flavor: fallback,
            ..self.options.clone()
        };
        self.engine.extract(input_pdf, &options)
    }

    /// Extracts the tables of one specimen document. Engine failures and
    /// empty results are recorded on `context`; only failures to write
    /// debug tables are returned.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when a debug table cannot be written.
    pub fn extract_document(
        &self,
        input_pdf: &Path,
        specimen_id: &str,
        context: &mut RunContext,
    ) -> Result<DocumentTables, PipelineError> {
        let file_name = input_pdf
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut document = DocumentTables {
            specimen_id: specimen_id.to_string(),
            file_name: file_name.clone(),
            tables: Vec::new(),
        };
        context.counts.documents += 1;

        let extraction = match self.run_engine(input_pdf) {
            Ok(extraction) => extraction,
            Err(error) => {
                context.record(
                    Issue::new(
                        IssueCode::ExtractionFailure,
                        format!("table extraction failed: {error}"),
                    )
                    .with_specimen(specimen_id)
                    .with_file(file_name),
                );
                return Ok(document);
            }
        };

        for warning in &extraction.warnings {
            if warning.code != WarningCode::NoTablesDetected {
                debug!(
                    file = %file_name,
                    code = ?warning.code,
                    page = ?warning.page,
                    "{}",
                    warning.message
                );
            }
        }

        if extraction.tables.is_empty() {
            context.no_tables.record(specimen_id, &file_name);
            context.record(
                Issue::new(IssueCode::NoTablesFound, "engine returned no tables")
                    .with_specimen(specimen_id)
                    .with_file(file_name),
            );
            return Ok(document);
        }

        for (index, table) in extraction.tables.into_iter().enumerate() {
            let raw = RawTable {
                specimen_id: specimen_id.to_string(),
                source_table_index: index + 1,
                page: Some(table.page),
                rows: table.rows,
            };
            if let Some(dir) = &self.debug_dir {
                let path = dir.join(debug_table_file_name(
                    specimen_id,
                    self.engine.name(),
                    raw.source_table_index,
                ));
                write_rows_csv(&path, &raw.rows)?;
            }
            document.tables.push(raw);
        }

        context.counts.documents_with_tables += 1;
        context.counts.raw_tables += document.tables.len();
        debug!(
            file = %document.file_name,
            tables = document.tables.len(),
            "tables extracted"
        );
        Ok(document)
    }

    /// Extracts every PDF in `dir`, in file-name order. A file whose
    /// specimen ID was already extracted in this batch is skipped and
    /// reported as a pattern conflict.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when the directory cannot be listed or the
    /// debug directory cannot be written.
    pub fn extract_directory(
        &self,
        dir: &Path,
        matcher: &dyn SpecimenMatcher,
        context: &mut RunContext,
    ) -> Result<Vec<DocumentTables>, PipelineError> {
        if let Some(debug_dir) = &self.debug_dir {
            fs::create_dir_all(debug_dir).map_err(|error| PipelineError::io(debug_dir, error))?;
        }

        let mut documents = Vec::new();
        let mut seen = HashSet::new();
        for path in pdf_files(dir)? {
            let specimen_id = specimen_id_for(&path, matcher);
            if !seen.insert(specimen_id.clone()) {
                let file_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                context.record(
                    Issue::new(
                        IssueCode::PatternConflict,
                        "specimen already extracted from another file in this batch; file skipped",
                    )
                    .with_specimen(specimen_id)
                    .with_file(file_name),
                );
                continue;
            }
            documents.push(self.extract_document(&path, &specimen_id, context)?);
        }

        info!(
            documents = documents.len(),
            tables = documents.iter().map(|doc| doc.tables.len()).sum::<usize>(),
            without_tables = context.no_tables.len(),
            "table extraction finished"
        );
        Ok(documents)
    }
}
