use std::path::Path;

use csv::WriterBuilder;

use crate::error::ExtractError;

/// Writes raw table rows as-is; the first row is whatever the table's first
/// row was, so header rows survive for later classification.
pub fn write_rows_csv(path: &Path, rows: &[Vec<String>]) -> Result<(), ExtractError> {
    let mut writer = WriterBuilder::new().flexible(true).from_path(path)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads a raw table CSV back into rows without treating any row as a header.
pub fn read_rows_csv(path: &Path) -> Result<Vec<Vec<String>>, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::{read_rows_csv, write_rows_csv};

    #[test]
    fn rows_with_embedded_newlines_survive_a_write_and_read() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("S22-1234_table_lopdf_1.csv");
        let rows = vec![
            vec!["Gene".to_string(), "Fusion".to_string()],
            vec!["EWSR1".to_string(), "EWSR1-FLI1\nexon 7".to_string()],
            vec!["single".to_string()],
        ];

        write_rows_csv(&path, &rows).expect("csv should be written");
        let read = read_rows_csv(&path).expect("csv should be read");
        assert_eq!(read, rows);
    }
}
