use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use lopdf::Document;

use crate::error::ExtractError;
use crate::model::PageText;
use crate::options::PageSelection;
use crate::pdf_reader::{read_document_pages, whole_document_text};

/// A loaded PDF with its per-page text, used to cut page ranges out of a
/// combined document.
#[derive(Debug, Clone)]
pub struct PdfSource {
    document: Document,
    pages: Vec<PageText>,
}

impl PdfSource {
    /// Loads the document and the text of every page.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] when the file cannot be read or parsed.
    pub fn open(input_pdf: &Path) -> Result<Self, ExtractError> {
        let bytes = std::fs::read(input_pdf)?;
        Self::from_bytes(&bytes)
    }

    /// # Errors
    ///
    /// Returns [`ExtractError`] when the bytes are not a readable PDF.
    pub fn from_bytes(input_pdf: &[u8]) -> Result<Self, ExtractError> {
        let document = Document::load_mem(input_pdf)?;
        let whole_text = whole_document_text(input_pdf);
        let pages = read_document_pages(&document, whole_text.as_deref(), None)?;
        Ok(Self { document, pages })
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn pages(&self) -> &[PageText] {
        &self.pages
    }

    /// Writes pages `start..=end` (1-based) to `output_pdf` as a standalone
    /// document.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::InvalidPageRange`] for a range outside the
    /// document, or an I/O error when the output cannot be written.
    pub fn write_page_range(
        &self,
        start: u32,
        end: u32,
        output_pdf: &Path,
    ) -> Result<(), ExtractError> {
        let page_numbers = self.document.get_pages().into_keys().collect::<Vec<_>>();
        let selection = PageSelection::range(start, end)
            .filter(|_| page_numbers.contains(&start) && page_numbers.contains(&end))
            .ok_or(ExtractError::InvalidPageRange {
                start,
                end,
                page_count: page_numbers.len(),
            })?;

        let mut document = self.document.clone();
        let dropped = page_numbers
            .into_iter()
            .filter(|page| !selection.contains(*page))
            .collect::<Vec<_>>();
        document.delete_pages(&dropped);
        document.prune_objects();
        document.compress();

        let mut writer = BufWriter::new(File::create(output_pdf)?);
        document.save_to(&mut writer)?;
        writer.flush()?;
        tracing::debug!(
            start,
            end,
            output = %output_pdf.display(),
            "page range written"
        );
        Ok(())
    }
}
