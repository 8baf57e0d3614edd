use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::Serialize;
use tracing::warn;

use crate::error::PipelineError;
use crate::integrate::{Appended, IntegratedTable};
use crate::issue::{Issue, IssueCode};
use crate::schema::{FindingType, NormalizedRecord};

pub const NO_TABLES_COLUMN: &str = "PDF_Filename";

/// Documents for which the engine returned no table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoTableReport {
    /// File name to specimen ID.
    entries: BTreeMap<String, String>,
}

impl NoTableReport {
    pub fn record(&mut self, specimen_id: &str, file_name: &str) {
        self.entries
            .insert(file_name.to_string(), specimen_id.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn file_names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn specimen_ids(&self) -> BTreeSet<&str> {
        self.entries.values().map(String::as_str).collect()
    }

    pub fn contains_specimen(&self, specimen_id: &str) -> bool {
        self.entries.values().any(|entry| entry == specimen_id)
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::Csv`] when the file cannot be written.
    pub fn write_csv(&self, path: &Path) -> Result<(), PipelineError> {
        let mut writer = WriterBuilder::new().from_path(path)?;
        writer.write_record([NO_TABLES_COLUMN])?;
        for file_name in self.entries.keys() {
            writer.write_record([file_name])?;
        }
        writer.flush().map_err(|error| PipelineError::io(path, error))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageCounts {
    pub pages: usize,
    pub boundaries: usize,
    pub specimen_files: usize,
    pub documents: usize,
    pub documents_with_tables: usize,
    pub raw_tables: usize,
    pub unrecognized_tables: usize,
    pub merged_records: usize,
}

/// Accumulated state of one run, passed explicitly through the stages.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub issues: Vec<Issue>,
    pub no_tables: NoTableReport,
    pub counts: StageCounts,
    pub dna: IntegratedTable,
    pub rna: IntegratedTable,
    pub cma: IntegratedTable,
}

impl Default for RunContext {
    fn default() -> Self {
        Self {
            issues: Vec::new(),
            no_tables: NoTableReport::default(),
            counts: StageCounts::default(),
            dna: IntegratedTable::new(FindingType::DnaVariant),
            rna: IntegratedTable::new(FindingType::RnaFusion),
            cma: IntegratedTable::new(FindingType::CmaCnv),
        }
    }
}

impl RunContext {
    pub fn record(&mut self, issue: Issue) {
        warn!(%issue, "issue recorded");
        self.issues.push(issue);
    }

    pub fn record_all(&mut self, issues: impl IntoIterator<Item = Issue>) {
        for issue in issues {
            self.record(issue);
        }
    }

    pub fn table(&self, finding_type: FindingType) -> Option<&IntegratedTable> {
        match finding_type {
            FindingType::DnaVariant => Some(&self.dna),
            FindingType::RnaFusion => Some(&self.rna),
            FindingType::CmaCnv => Some(&self.cma),
            FindingType::Unrecognized => None,
        }
    }

    /// Routes a record to the table of its finding type. Unrecognized
    /// records are dropped.
    pub fn append(&mut self, record: NormalizedRecord) -> Option<Appended> {
        let table = match record.finding_type {
            FindingType::DnaVariant => &mut self.dna,
            FindingType::RnaFusion => &mut self.rna,
            FindingType::CmaCnv => &mut self.cma,
            FindingType::Unrecognized => return None,
        };
        let appended = table.append(record);
        if appended == Appended::Merged {
            self.counts.merged_records += 1;
        }
        Some(appended)
    }

    pub fn integrated_rows(&self) -> usize {
        self.dna.len() + self.rna.len() + self.cma.len()
    }

    pub fn issue_counts(&self) -> BTreeMap<&'static str, usize> {
        IssueCode::ALL
            .into_iter()
            .map(|code| {
                let count = self.issues.iter().filter(|issue| issue.code == code).count();
                (code.as_str(), count)
            })
            .collect()
    }

    pub fn summary(&self, input: &Path, output_dir: &Path) -> RunSummary {
        RunSummary {
            generated_at: Utc::now(),
            input: input.display().to_string(),
            output_dir: output_dir.display().to_string(),
            counts: self.counts.clone(),
            records: FindingType::INTEGRATED
                .into_iter()
                .filter_map(|finding_type| {
                    self.table(finding_type).map(|table| {
                        (
                            finding_type.as_str(),
                            TableCounts {
                                rows: table.len(),
                                conflicts: table.conflict_count(),
                                specimens: table.specimen_ids().len(),
                            },
                        )
                    })
                })
                .collect(),
            issue_counts: self.issue_counts(),
            no_table_files: self
                .no_tables
                .file_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            issues: self.issues.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub rows: usize,
    pub conflicts: usize,
    pub specimens: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub generated_at: DateTime<Utc>,
    pub input: String,
    pub output_dir: String,
    pub counts: StageCounts,
    pub records: BTreeMap<&'static str, TableCounts>,
    pub issue_counts: BTreeMap<&'static str, usize>,
    pub no_table_files: Vec<String>,
    pub issues: Vec<Issue>,
}

impl RunSummary {
    pub fn integrated_rows(&self) -> usize {
        self.records.values().map(|counts| counts.rows).sum()
    }

    /// # Errors
    ///
    /// Returns [`PipelineError`] when the file cannot be created or
    /// serialized.
    pub fn write_json(&self, path: &Path) -> Result<(), PipelineError> {
        let file = File::create(path).map_err(|error| PipelineError::io(path, error))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer
            .write_all(b"\n")
            .and_then(|()| writer.flush())
            .map_err(|error| PipelineError::io(path, error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use pretty_assertions::assert_eq;

    use super::{NoTableReport, RunContext};
    use crate::issue::{Issue, IssueCode};
    use crate::schema::{FieldValue, FindingType, NormalizedRecord};

    #[test]
    fn no_table_report_lists_file_names_in_order() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("pdfs_with_no_tables.csv");
        let mut report = NoTableReport::default();
        report.record("S22-4649", "OncoKids_2022_S22-4649.pdf");
        report.record("S21-0007", "OncoKids_2021_S21-0007.pdf");

        report.write_csv(&path).expect("report should be written");
        assert_eq!(
            std::fs::read_to_string(&path).expect("report should be readable"),
            "PDF_Filename\nOncoKids_2021_S21-0007.pdf\nOncoKids_2022_S22-4649.pdf\n"
        );
        assert!(report.contains_specimen("S22-4649"));
    }

    #[test]
    fn summary_counts_rows_and_issues() {
        let mut context = RunContext::default();
        let mut record = NormalizedRecord::new("S22-1234", FindingType::DnaVariant, 1);
        record
            .fields
            .insert("gene", FieldValue::Text("TP53".to_string()));
        context.append(record);
        assert!(
            context
                .append(NormalizedRecord::new("S22-1234", FindingType::Unrecognized, 1))
                .is_none()
        );
        context.record(Issue::new(IssueCode::NoTablesFound, "engine returned no tables"));

        let summary = context.summary(Path::new("in.pdf"), Path::new("out"));
        assert_eq!(summary.integrated_rows(), 1);
        assert_eq!(summary.records["DNA_VARIANT"].specimens, 1);
        assert_eq!(summary.issue_counts["NoTablesFound"], 1);
        assert_eq!(summary.issue_counts["PatternConflict"], 0);

        let json = serde_json::to_value(&summary).expect("summary should serialize");
        assert_eq!(json["counts"]["rawTables"], 0);
        assert!(json["generatedAt"].is_string());
    }
}
