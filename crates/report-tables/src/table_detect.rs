use crate::model::{DetectedTable, PageText, TableOrigin};
use crate::table_parse::{modal_width, pad_rows, soft_split_line_into_cells, split_line_into_cells};

pub(crate) const LOW_CONFIDENCE_THRESHOLD: f32 = 0.60;

#[allow(clippy::cast_precision_loss)]
fn table_confidence(rows: &[Vec<String>]) -> f32 {
    if rows.len() < 2 {
        return 0.0;
    }

    let modal = modal_width(rows);
    if modal == 0 {
        return 0.0;
    }

    let consistent =
        rows.iter().filter(|row| row.len() == modal).count() as f32 / rows.len() as f32;
    let max_width = rows.iter().map(Vec::len).max().unwrap_or(modal);
    let min_width = rows.iter().map(Vec::len).min().unwrap_or(modal);
    let uniformity = if max_width == 0 {
        0.0
    } else {
        1.0 - ((max_width - min_width) as f32 / max_width as f32)
    };

    (consistent * 0.75 + uniformity * 0.25).clamp(0.0, 1.0)
}

fn line_cells(line: &str, min_cols: usize) -> Vec<String> {
    let cells = split_line_into_cells(line);
    if cells.len() >= min_cols {
        return cells;
    }

    let soft_cells = soft_split_line_into_cells(line);
    let has_numeric = soft_cells
        .iter()
        .any(|cell| cell.chars().any(|ch| ch.is_ascii_digit()));
    let looks_like_sentence = ['.', '!', '?']
        .iter()
        .any(|punctuation| line.trim_end().ends_with(*punctuation));
    if soft_cells.len() >= min_cols
        && !looks_like_sentence
        && (has_numeric || soft_cells.len() <= 6)
    {
        soft_cells
    } else {
        cells
    }
}

/// Whitespace-flavor detection: consecutive lines that split into at least
/// `min_cols` cells form one table.
pub(crate) fn detect_whitespace_tables(page: &PageText, min_cols: usize) -> Vec<DetectedTable> {
    let mut tables = Vec::new();
    let mut current_rows: Vec<Vec<String>> = Vec::new();

    let flush_current = |rows: &mut Vec<Vec<String>>, tables: &mut Vec<DetectedTable>| {
        if rows.len() >= 2 {
            let confidence = table_confidence(rows);
            let mut rows = std::mem::take(rows);
            let width = rows.iter().map(Vec::len).max().unwrap_or(0);
            pad_rows(&mut rows, width);
            tables.push(DetectedTable {
                page: page.page_number,
                rows,
                confidence,
                origin: TableOrigin::Whitespace,
            });
        } else {
            rows.clear();
        }
    };

    for line in page.text.lines() {
        let cells = line_cells(line, min_cols);
        if cells.len() >= min_cols {
            current_rows.push(cells);
        } else {
            flush_current(&mut current_rows, &mut tables);
        }
    }

    flush_current(&mut current_rows, &mut tables);
    tracing::debug!(
        page = page.page_number,
        tables = tables.len(),
        "whitespace tables detected"
    );
    tables
}

#[cfg(test)]
mod tests {
    use super::{LOW_CONFIDENCE_THRESHOLD, detect_whitespace_tables};
    use crate::model::PageText;

    fn page(text: &str) -> PageText {
        PageText {
            page_number: 3,
            text: text.to_string(),
        }
    }

    #[test]
    fn groups_consecutive_cell_lines_into_one_table() {
        let tables = detect_whitespace_tables(
            &page(
                "Results of the OncoKids panel.\nGene  Mutation  VAF\nTP53  p.R175H  12.5%\nNRAS  p.Q61K  40%\nInterpretation follows.",
            ),
            2,
        );
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].page, 3);
        assert_eq!(tables[0].rows.len(), 3);
        assert_eq!(tables[0].rows[1], vec!["TP53", "p.R175H", "12.5%"]);
        assert!(tables[0].confidence >= LOW_CONFIDENCE_THRESHOLD);
    }

    #[test]
    fn single_row_is_not_a_table() {
        let tables = detect_whitespace_tables(&page("Gene  Fusion\nnarrative line."), 2);
        assert!(tables.is_empty());
    }

    #[test]
    fn ragged_rows_are_padded_and_scored_lower() {
        let tables = detect_whitespace_tables(&page("A  B  C\n1  2\n3  4  5  6\n7  8"), 2);
        assert_eq!(tables.len(), 1);
        assert!(tables[0].rows.iter().all(|row| row.len() == 4));
        assert!(tables[0].confidence < 1.0);
    }
}
