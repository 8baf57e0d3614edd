//! Table recovery from text-based PDF reports.
//!
//! Two detection flavors are offered: [`Flavor::Bordered`] reads ruling lines
//! from the page content stream and fills the grid they form, and
//! [`Flavor::Whitespace`] splits the page text on runs of spaces. Page text
//! loading and page-range writing live in [`PdfSource`].

mod csv_out;
mod error;
mod lattice;
mod model;
mod options;
mod page_io;
mod pdf_reader;
mod table_detect;
mod table_parse;
mod warning;

use std::path::Path;

use lopdf::Document;
use lopdf::content::Content;

use crate::lattice::{detect_grid_tables, page_box};
use crate::pdf_reader::{page_font_encodings, read_document_pages, whole_document_text};
use crate::table_detect::{LOW_CONFIDENCE_THRESHOLD, detect_whitespace_tables};

pub use csv_out::{read_rows_csv, write_rows_csv};
pub use error::ExtractError;
pub use model::{DetectedTable, PageText, TableOrigin};
pub use options::{DEFAULT_LINE_SCALE, ExtractOptions, Flavor, PageSelection, QualityMode};
pub use page_io::PdfSource;
pub use warning::{ExtractWarning, WarningCode};

/// Name recorded in debug artifacts for tables produced by this crate.
pub const ENGINE_NAME: &str = "lopdf";

#[derive(Debug, Clone, PartialEq)]
pub struct TableExtraction {
    pub tables: Vec<DetectedTable>,
    pub warnings: Vec<ExtractWarning>,
}

fn apply_quality_mode(
    tables: Vec<DetectedTable>,
    options: &ExtractOptions,
    warnings: &mut Vec<ExtractWarning>,
) -> Result<Vec<DetectedTable>, ExtractError> {
    let mut out = Vec::new();

    for table in tables {
        if table.confidence >= LOW_CONFIDENCE_THRESHOLD {
            out.push(table);
            continue;
        }

        match options.quality_mode {
            QualityMode::BestEffort => {
                warnings.push(
                    ExtractWarning::new(
                        WarningCode::LowConfidence,
                        "table confidence is low; kept in best-effort mode",
                    )
                    .with_page(table.page)
                    .with_confidence(table.confidence),
                );
                out.push(table);
            }
            QualityMode::Strict => {
                return Err(ExtractError::AmbiguousTable {
                    page: table.page,
                    confidence: table.confidence,
                });
            }
            QualityMode::SkipAmbiguous => {
                warnings.push(
                    ExtractWarning::new(WarningCode::LowConfidence, "skipping low-confidence table")
                        .with_page(table.page)
                        .with_confidence(table.confidence),
                );
            }
        }
    }

    Ok(out)
}

fn detect_bordered(
    document: &Document,
    options: &ExtractOptions,
    warnings: &mut Vec<ExtractWarning>,
) -> Result<Vec<DetectedTable>, ExtractError> {
    let mut tables = Vec::new();
    let mut selected = 0_usize;
    for (page_no, page_id) in document.get_pages() {
        if let Some(selection) = &options.pages {
            if !selection.contains(page_no) {
                continue;
            }
        }
        selected += 1;

        let operations = match document
            .get_page_content(page_id)
            .and_then(|raw| Content::decode(&raw))
        {
            Ok(content) => content.operations,
            Err(error) => {
                warnings.push(
                    ExtractWarning::new(
                        WarningCode::UnreadableContent,
                        format!("page content could not be decoded: {error}"),
                    )
                    .with_page(page_no),
                );
                continue;
            }
        };
        let encodings = page_font_encodings(document, page_id);
        tables.extend(detect_grid_tables(
            page_no,
            &operations,
            &encodings,
            page_box(document, page_id),
            options.line_scale,
            options.min_cols,
        ));
    }

    if selected == 0 {
        return Err(ExtractError::NoPagesSelected);
    }
    Ok(tables)
}

fn detect_whitespace(
    document: &Document,
    input_pdf: &[u8],
    options: &ExtractOptions,
) -> Result<Vec<DetectedTable>, ExtractError> {
    let whole_text = whole_document_text(input_pdf);
    let pages = read_document_pages(document, whole_text.as_deref(), options.pages.as_ref())?;
    Ok(pages
        .iter()
        .flat_map(|page| detect_whitespace_tables(page, options.min_cols))
        .collect())
}

/// Recovers every table in the (selected pages of the) document, in page
/// order. Rows are returned untouched, header row included.
///
/// # Errors
///
/// Returns [`ExtractError`] for invalid options, unreadable PDFs, an empty
/// page selection, or an ambiguous table under [`QualityMode::Strict`].
pub fn extract_tables_from_bytes(
    input_pdf: &[u8],
    options: &ExtractOptions,
) -> Result<TableExtraction, ExtractError> {
    options.validate().map_err(ExtractError::InvalidOption)?;

    let document = Document::load_mem(input_pdf)?;
    let mut warnings = Vec::new();
    let detected = match options.flavor {
        Flavor::Bordered => detect_bordered(&document, options, &mut warnings)?,
        Flavor::Whitespace => detect_whitespace(&document, input_pdf, options)?,
    };
    let tables = apply_quality_mode(detected, options, &mut warnings)?;

    if tables.is_empty() {
        warnings.push(ExtractWarning::new(
            WarningCode::NoTablesDetected,
            format!("no {} tables detected in the selected pages", options.flavor),
        ));
    }

    Ok(TableExtraction { tables, warnings })
}

/// # Errors
///
/// See [`extract_tables_from_bytes`]; additionally fails when the file
/// cannot be read.
pub fn extract_tables(
    input_pdf: &Path,
    options: &ExtractOptions,
) -> Result<TableExtraction, ExtractError> {
    let bytes = std::fs::read(input_pdf)?;
    extract_tables_from_bytes(&bytes, options)
}
