use std::collections::HashMap;

/// Splits a text line into cells on tabs, runs of two or more spaces, and
/// `|` rule characters left behind by some report generators.
pub(crate) fn split_line_into_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim().trim_matches('|');
    if trimmed.trim().is_empty() {
        return Vec::new();
    }

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut whitespace_run = 0_usize;

    let flush = |current: &mut String, cells: &mut Vec<String>| {
        if !current.trim().is_empty() {
            cells.push(current.trim().to_string());
        }
        current.clear();
    };

    for ch in trimmed.chars() {
        if ch == '\t' || ch == '|' {
            flush(&mut current, &mut cells);
            whitespace_run = 0;
            continue;
        }

        if ch.is_whitespace() {
            whitespace_run += 1;
            if whitespace_run >= 2 {
                flush(&mut current, &mut cells);
                continue;
            }
            current.push(' ');
            continue;
        }

        whitespace_run = 0;
        current.push(ch);
    }

    flush(&mut current, &mut cells);
    cells
}

pub(crate) fn soft_split_line_into_cells(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

/// Pads every row to `width` so ragged text rows line up with the header.
pub(crate) fn pad_rows(rows: &mut [Vec<String>], width: usize) {
    for row in rows {
        if row.len() < width {
            row.resize(width, String::new());
        }
    }
}

pub(crate) fn modal_width(rows: &[Vec<String>]) -> usize {
    let mut freq = HashMap::new();
    for width in rows.iter().map(Vec::len) {
        *freq.entry(width).or_insert(0_usize) += 1;
    }

    freq.into_iter()
        .max_by_key(|(width, count)| (*count, *width))
        .map_or(0, |(width, _)| width)
}

#[cfg(test)]
mod tests {
    use super::{modal_width, pad_rows, soft_split_line_into_cells, split_line_into_cells};

    #[test]
    fn splits_double_space_separated_cells() {
        let cells = split_line_into_cells("TP53  p.R175H  12.5%");
        assert_eq!(cells, vec!["TP53", "p.R175H", "12.5%"]);
    }

    #[test]
    fn keeps_single_spaces_inside_a_cell() {
        let cells = split_line_into_cells("TP53  Likely Pathogenic");
        assert_eq!(cells, vec!["TP53", "Likely Pathogenic"]);
    }

    #[test]
    fn splits_on_tabs_and_pipes() {
        assert_eq!(split_line_into_cells("A\tB\tC"), vec!["A", "B", "C"]);
        assert_eq!(
            split_line_into_cells("| chr7 | 138,123,456 | Gain |"),
            vec!["chr7", "138,123,456", "Gain"]
        );
    }

    #[test]
    fn soft_splits_single_space_cells() {
        let cells = soft_split_line_into_cells("Gene Fusion Reads");
        assert_eq!(cells, vec!["Gene", "Fusion", "Reads"]);
    }

    #[test]
    fn pads_ragged_rows() {
        let mut rows = vec![
            vec!["EWSR1".to_string()],
            vec!["FLI1".to_string(), "52".to_string()],
        ];
        pad_rows(&mut rows, 3);
        assert_eq!(rows[0], vec!["EWSR1", "", ""]);
        assert_eq!(rows[1], vec!["FLI1", "52", ""]);
    }

    #[test]
    fn detects_modal_width() {
        let rows = vec![
            vec!["a".to_string(), "b".to_string()],
            vec!["1".to_string(), "2".to_string()],
            vec!["x".to_string()],
        ];
        assert_eq!(modal_width(&rows), 2);
    }
}
