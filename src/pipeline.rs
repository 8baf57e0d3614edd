use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use report_tables::read_rows_csv;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::context::{NO_TABLES_COLUMN, RunContext, RunSummary};
use crate::error::PipelineError;
use crate::extract::{DocumentTables, LopdfTableEngine, RawTable, TableExtractor, specimen_id_for};
use crate::pattern::{
    BoundaryDetection, RegexSpecimenMatcher, SpecimenMarker, SpecimenMatcher, detect_boundaries,
    scan_markers, unique_specimens,
};
use crate::schema::{FindingType, Normalizer};
use crate::segment::{LopdfPageSource, PageSource, PageWriter, SegmentedSpecimen, Segmenter};

/// Marker matches and boundaries found in one combined document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub page_count: usize,
    pub markers: Vec<SpecimenMarker>,
    pub detection: BoundaryDetection,
}

impl ScanReport {
    pub fn unique_specimens(&self) -> BTreeSet<&str> {
        unique_specimens(&self.markers)
    }
}

/// # Errors
///
/// Fails when the patterns are invalid or the document cannot be read.
pub fn scan(input_pdf: &Path, config: &PipelineConfig) -> Result<ScanReport, PipelineError> {
    let matcher = RegexSpecimenMatcher::new(&config.pattern)?;
    let document = LopdfPageSource.load_pages(input_pdf)?;
    let pages = document.pages();
    let report = ScanReport {
        page_count: pages.len(),
        markers: scan_markers(pages, &matcher),
        detection: detect_boundaries(pages, &matcher),
    };
    info!(
        pages = report.page_count,
        markers = report.markers.len(),
        specimens = report.unique_specimens().len(),
        boundaries = report.detection.boundaries.len(),
        "scan finished"
    );
    Ok(report)
}

/// Splits a combined document into one PDF per specimen under `output_dir`.
///
/// # Errors
///
/// Fails when the patterns are invalid, the combined document cannot be
/// read or the output directory cannot be created.
pub fn segment(
    input_pdf: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
    context: &mut RunContext,
) -> Result<Vec<SegmentedSpecimen>, PipelineError> {
    segment_with(&LopdfPageSource, input_pdf, output_dir, config, context)
}

/// [`segment`] with an explicit page source.
///
/// # Errors
///
/// See [`segment`].
pub fn segment_with<S: PageSource>(
    source: &S,
    input_pdf: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
    context: &mut RunContext,
) -> Result<Vec<SegmentedSpecimen>, PipelineError> {
    let matcher = RegexSpecimenMatcher::new(&config.pattern)?;
    let document = source.load_pages(input_pdf)?;
    let detection = detect_boundaries(document.pages(), &matcher);
    context.counts.pages += document.pages().len();
    context.counts.boundaries += detection.boundaries.len();
    context.record_all(detection.conflicts);

    let segmenter = Segmenter::new(&config.segment.file_template, output_dir);
    let outcome = segmenter.segment(&document, &detection.boundaries)?;
    context.counts.specimen_files += outcome.written_count();
    context.issues.extend(outcome.issues);
    Ok(outcome.written)
}

/// Extracts the raw tables of every PDF in `input_dir`. Debug tables go to
/// the configured tables directory under `output_dir`.
///
/// # Errors
///
/// Fails when the configuration is invalid, `input_dir` cannot be listed or
/// a debug table cannot be written.
pub fn extract(
    input_dir: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
    context: &mut RunContext,
) -> Result<Vec<DocumentTables>, PipelineError> {
    let matcher = RegexSpecimenMatcher::new(&config.pattern)?;
    let options = config.extraction.options()?;
    let mut extractor = TableExtractor::new(LopdfTableEngine, options)
        .with_fallback(config.extraction.fallback_flavor);
    if config.extraction.write_debug_tables {
        extractor = extractor.with_debug_dir(output_dir.join(&config.output.tables_dir));
    }
    extractor.extract_directory(input_dir, &matcher, context)
}

/// Normalizes every table and appends the records to the run's tables.
pub fn integrate(documents: &[DocumentTables], context: &mut RunContext) {
    let normalizer = Normalizer::default();
    for document in documents {
        let mut next_row = BTreeMap::<FindingType, usize>::new();
        for table in &document.tables {
            let normalization = normalizer.normalize(table);
            if normalization.finding_type == FindingType::Unrecognized {
                context.counts.unrecognized_tables += 1;
            }
            context.record_all(normalization.issues);
            for mut record in normalization.records {
                let row = next_row.entry(record.finding_type).or_default();
                *row += 1;
                record.row_index = *row;
                context.append(record);
            }
        }
    }
    info!(
        dna = context.dna.len(),
        rna = context.rna.len(),
        cma = context.cma.len(),
        unrecognized = context.counts.unrecognized_tables,
        merged = context.counts.merged_records,
        "integration finished"
    );
}

/// Reads raw-table CSVs named `<specimen>_table_<engine>_<index>.csv`,
/// grouped per specimen and ordered by table index. Other files are ignored.
///
/// # Errors
///
/// Fails when the directory or one of the table files cannot be read.
pub fn read_raw_tables(dir: &Path) -> Result<Vec<DocumentTables>, PipelineError> {
    if !dir.is_dir() {
        return Err(PipelineError::InputNotFound(dir.to_path_buf()));
    }
    let table_file_re = Regex::new(r"^(?P<specimen>.+)_table_(?P<engine>[^_]+)_(?P<index>\d+)\.csv$")
        .expect("hardcoded table file regex is valid");
    let entries = fs::read_dir(dir).map_err(|error| PipelineError::io(dir, error))?;
    let mut grouped = BTreeMap::<String, Vec<(usize, String, PathBuf)>>::new();
    for entry in entries {
        let path = entry.map_err(|error| PipelineError::io(dir, error))?.path();
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let Some(captures) = table_file_re.captures(name) else {
            continue;
        };
        let Ok(index) = captures["index"].parse::<usize>() else {
            continue;
        };
        grouped
            .entry(captures["specimen"].to_string())
            .or_default()
            .push((index, name.to_string(), path.clone()));
    }

    let mut documents = Vec::with_capacity(grouped.len());
    for (specimen_id, mut files) in grouped {
        files.sort();
        let file_name = files
            .first()
            .map(|(_, name, _)| name.clone())
            .unwrap_or_default();
        let mut tables = Vec::with_capacity(files.len());
        for (index, _, path) in files {
            tables.push(RawTable {
                specimen_id: specimen_id.clone(),
                source_table_index: index,
                page: None,
                rows: read_rows_csv(&path)?,
            });
        }
        documents.push(DocumentTables {
            specimen_id,
            file_name,
            tables,
        });
    }
    debug!(dir = %dir.display(), documents = documents.len(), "raw tables read");
    Ok(documents)
}

/// Loads a no-table report written by an earlier run, if `path` exists.
///
/// # Errors
///
/// Fails when the file exists but is not a readable CSV.
pub fn read_no_table_report(
    path: &Path,
    matcher: &dyn SpecimenMatcher,
    context: &mut RunContext,
) -> Result<(), PipelineError> {
    if !path.is_file() {
        return Ok(());
    }
    let mut reader = csv::Reader::from_path(path)?;
    let column = reader
        .headers()?
        .iter()
        .position(|header| header == NO_TABLES_COLUMN)
        .unwrap_or(0);
    for record in reader.records() {
        let record = record?;
        let Some(file_name) = record.get(column).filter(|name| !name.is_empty()) else {
            continue;
        };
        let specimen_id = specimen_id_for(Path::new(file_name), matcher);
        context.no_tables.record(&specimen_id, file_name);
    }
    Ok(())
}

/// Re-runs normalization and integration from a directory of raw-table
/// CSVs. A no-table report beside the CSVs, or one level up, is carried
/// over.
///
/// # Errors
///
/// Fails when the inputs cannot be read.
pub fn integrate_from_csv(
    tables_dir: &Path,
    config: &PipelineConfig,
    context: &mut RunContext,
) -> Result<(), PipelineError> {
    let matcher = RegexSpecimenMatcher::new(&config.pattern)?;
    let documents = read_raw_tables(tables_dir)?;
    context.counts.documents += documents.len();
    context.counts.documents_with_tables += documents.len();
    context.counts.raw_tables += documents.iter().map(|doc| doc.tables.len()).sum::<usize>();

    let report_name = &config.output.no_tables_file;
    let candidates = [
        Some(tables_dir.join(report_name)),
        tables_dir.parent().map(|parent| parent.join(report_name)),
    ];
    if let Some(report) = candidates.into_iter().flatten().find(|path| path.is_file()) {
        read_no_table_report(&report, &matcher, context)?;
    }

    integrate(&documents, context);
    Ok(())
}

/// Writes the three integrated tables and the no-table report.
///
/// # Errors
///
/// Fails when the output directory or a file cannot be written.
pub fn write_outputs(
    output_dir: &Path,
    config: &PipelineConfig,
    context: &RunContext,
) -> Result<(), PipelineError> {
    fs::create_dir_all(output_dir).map_err(|error| PipelineError::io(output_dir, error))?;
    let output = &config.output;
    context.dna.write_csv(&output_dir.join(&output.dna_file))?;
    context.rna.write_csv(&output_dir.join(&output.rna_file))?;
    context.cma.write_csv(&output_dir.join(&output.cma_file))?;
    context
        .no_tables
        .write_csv(&output_dir.join(&output.no_tables_file))?;
    Ok(())
}

/// Writes the run summary next to the outputs.
///
/// # Errors
///
/// Fails when the summary cannot be written.
pub fn finish(
    input: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
    context: &RunContext,
) -> Result<RunSummary, PipelineError> {
    fs::create_dir_all(output_dir).map_err(|error| PipelineError::io(output_dir, error))?;
    let summary = context.summary(input, output_dir);
    summary.write_json(&output_dir.join(&config.output.summary_file))?;
    Ok(summary)
}

/// All stages. A PDF input is split into specimen documents under the
/// configured specimens directory first; a directory input is taken as
/// already split.
///
/// # Errors
///
/// Fails on invalid configuration, missing input, or output that cannot be
/// written. Problems with individual reports are recorded on the returned
/// context instead.
pub fn run(
    input: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
) -> Result<(RunContext, RunSummary), PipelineError> {
    let config = config.clone().normalized();
    config.validate()?;
    let mut context = RunContext::default();

    let documents_dir = if input.is_file() {
        let specimens_dir = output_dir.join(&config.output.specimens_dir);
        segment(input, &specimens_dir, &config, &mut context)?;
        specimens_dir
    } else if input.is_dir() {
        input.to_path_buf()
    } else {
        return Err(PipelineError::InputNotFound(input.to_path_buf()));
    };

    let documents = extract(&documents_dir, output_dir, &config, &mut context)?;
    integrate(&documents, &mut context);
    write_outputs(output_dir, &config, &context)?;
    let summary = finish(input, output_dir, &config, &context)?;

    info!(
        rows = summary.integrated_rows(),
        issues = context.issues.len(),
        output = %output_dir.display(),
        "run finished"
    );
    Ok((context, summary))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;
    use report_tables::write_rows_csv;

    use super::{integrate, integrate_from_csv, read_raw_tables};
    use crate::config::PipelineConfig;
    use crate::context::RunContext;
    use crate::extract::{DocumentTables, RawTable};

    fn rows(values: &[&[&str]]) -> Vec<Vec<String>> {
        values
            .iter()
            .map(|row| row.iter().map(|cell| (*cell).to_string()).collect())
            .collect()
    }

    #[test]
    fn raw_tables_are_grouped_by_specimen_and_ordered_by_index() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let table = rows(&[&["Gene", "Mutation"], &["TP53", "p.R175H"]]);
        for name in [
            "S22-2_table_lopdf_10.csv",
            "S22-2_table_lopdf_2.csv",
            "S22-1_table_lopdf_1.csv",
        ] {
            write_rows_csv(&dir.path().join(name), &table).expect("table should be written");
        }
        fs::write(dir.path().join("notes.csv"), "a,b\n").expect("file should be written");

        let documents = read_raw_tables(dir.path()).expect("tables should be read");
        let summary = documents
            .iter()
            .map(|doc| {
                (
                    doc.specimen_id.as_str(),
                    doc.tables
                        .iter()
                        .map(|table| table.source_table_index)
                        .collect::<Vec<_>>(),
                )
            })
            .collect::<Vec<_>>();
        assert_eq!(summary, vec![("S22-1", vec![1]), ("S22-2", vec![2, 10])]);
        assert_eq!(documents[0].tables[0].rows, table);
    }

    #[test]
    fn rows_are_numbered_across_the_tables_of_a_specimen() {
        let table = |index: usize, gene: &str| RawTable {
            specimen_id: "S22-1".to_string(),
            source_table_index: index,
            page: Some(1),
            rows: rows(&[&["Gene", "Mutation", "VAF"], &[gene, "p.G12D", "30%"]]),
        };
        let document = DocumentTables {
            specimen_id: "S22-1".to_string(),
            file_name: "OncoKids_2022_S22-1.pdf".to_string(),
            tables: vec![table(1, "KRAS"), table(2, "NRAS")],
        };

        let mut context = RunContext::default();
        integrate(&[document], &mut context);

        let indices = context
            .dna
            .rows()
            .iter()
            .map(|row| row.record.row_index)
            .collect::<Vec<_>>();
        assert_eq!(indices, vec![1, 2]);
    }

    #[test]
    fn integrating_from_csv_carries_the_no_table_report_over() {
        let output = tempfile::tempdir().expect("tempdir should be created");
        let tables_dir = output.path().join("tables");
        fs::create_dir_all(&tables_dir).expect("tables dir should be created");
        write_rows_csv(
            &tables_dir.join("S22-1234_table_lopdf_1.csv"),
            &rows(&[
                &["Gene", "Mutation", "VAF", "Classification"],
                &["TP53", "p.R175H", "12.5%", "Likely Pathogenic"],
            ]),
        )
        .expect("table should be written");
        fs::write(
            output.path().join("pdfs_with_no_tables.csv"),
            "PDF_Filename\nOncoKids_2022_S22-4649.pdf\n",
        )
        .expect("report should be written");

        let mut context = RunContext::default();
        integrate_from_csv(&tables_dir, &PipelineConfig::default(), &mut context)
            .expect("integration should succeed");

        assert_eq!(context.dna.len(), 1);
        assert!(context.no_tables.contains_specimen("S22-4649"));
        assert_eq!(context.counts.raw_tables, 1);
    }
}
