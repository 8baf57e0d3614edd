use std::collections::BTreeSet;
use std::path::Path;

use csv::WriterBuilder;

use crate::error::PipelineError;
use crate::schema::{FindingType, NormalizedRecord};

#[derive(Debug, Clone, PartialEq)]
pub struct IntegratedRow {
    pub record: NormalizedRecord,
    pub conflict: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Appended {
    Added,
    Merged,
    Conflict,
}

/// Identity of a finding within its specimen, or `None` when a key field is
/// missing. Fusion partners are sorted so that 5'/3' swaps share a key.
fn dedup_key(record: &NormalizedRecord) -> Option<Vec<String>> {
    let mut parts = record
        .finding_type
        .key_fields()
        .iter()
        .map(|field| {
            let value = record.get(field);
            value.is_present().then(|| value.to_string())
        })
        .collect::<Option<Vec<_>>>()?;
    if parts.is_empty() {
        return None;
    }
    if record.finding_type == FindingType::RnaFusion {
        parts.sort();
    }
    parts.insert(0, record.specimen_id.clone());
    Some(parts)
}

/// No non-key field carries two different values.
fn compatible(left: &NormalizedRecord, right: &NormalizedRecord) -> bool {
    let key_fields = left.finding_type.key_fields();
    left.finding_type
        .fields()
        .iter()
        .filter(|field| !key_fields.contains(*field))
        .all(|field| {
            let (a, b) = (left.get(field), right.get(field));
            !(a.is_present() && b.is_present()) || a == b
        })
}

/// All records of one finding type across specimens.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegratedTable {
    finding_type: FindingType,
    rows: Vec<IntegratedRow>,
}

impl IntegratedTable {
    pub fn new(finding_type: FindingType) -> Self {
        Self {
            finding_type,
            rows: Vec::new(),
        }
    }

    pub fn finding_type(&self) -> FindingType {
        self.finding_type
    }

    /// Adds a record, merging it into an earlier compatible duplicate. The
    /// merged row keeps whichever record has more non-null fields. A
    /// duplicate with conflicting values is kept and every row sharing its
    /// key is flagged.
    pub fn append(&mut self, record: NormalizedRecord) -> Appended {
        let Some(key) = dedup_key(&record) else {
            self.rows.push(IntegratedRow {
                record,
                conflict: false,
            });
            return Appended::Added;
        };

        let same_key = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| dedup_key(&row.record).as_ref() == Some(&key))
            .map(|(index, _)| index)
            .collect::<Vec<_>>();

        if same_key.is_empty() {
            self.rows.push(IntegratedRow {
                record,
                conflict: false,
            });
            return Appended::Added;
        }

        if let Some(&index) = same_key
            .iter()
            .find(|index| compatible(&self.rows[**index].record, &record))
        {
            let existing = &mut self.rows[index];
            if record.present_count() > existing.record.present_count() {
                existing.record = record;
            }
            return Appended::Merged;
        }

        for index in same_key {
            self.rows[index].conflict = true;
        }
        self.rows.push(IntegratedRow {
            record,
            conflict: true,
        });
        Appended::Conflict
    }

    pub fn rows(&self) -> &[IntegratedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn conflict_count(&self) -> usize {
        self.rows.iter().filter(|row| row.conflict).count()
    }

    pub fn specimen_ids(&self) -> BTreeSet<&str> {
        self.rows
            .iter()
            .map(|row| row.record.specimen_id.as_str())
            .collect()
    }

    /// Rows grouped by specimen ID, otherwise in insertion order.
    pub fn sorted_rows(&self) -> Vec<&IntegratedRow> {
        let mut rows = self.rows.iter().collect::<Vec<_>>();
        rows.sort_by(|left, right| left.record.specimen_id.cmp(&right.record.specimen_id));
        rows
    }

    /// Writes `specimenId`, the canonical fields and `conflict`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Csv`] when the file cannot be written.
    pub fn write_csv(&self, path: &Path) -> Result<(), PipelineError> {
        let mut writer = WriterBuilder::new().from_path(path)?;
        let fields = self.finding_type.fields();

        let mut header = Vec::with_capacity(fields.len() + 2);
        header.push("specimenId");
        header.extend_from_slice(fields);
        header.push("conflict");
        writer.write_record(&header)?;

        for row in self.sorted_rows() {
            let mut record = Vec::with_capacity(fields.len() + 2);
            record.push(row.record.specimen_id.clone());
            record.extend(fields.iter().map(|field| row.record.get(field).to_string()));
            record.push(row.conflict.to_string());
            writer.write_record(&record)?;
        }
        writer.flush().map_err(|error| PipelineError::io(path, error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{Appended, IntegratedTable};
    use crate::schema::{FieldValue, FindingType, NormalizedRecord};

    fn record(
        specimen_id: &str,
        finding_type: FindingType,
        fields: &[(&'static str, FieldValue)],
    ) -> NormalizedRecord {
        let mut record = NormalizedRecord::new(specimen_id, finding_type, 1);
        for (field, value) in fields {
            record.fields.insert(*field, value.clone());
        }
        record
    }

    fn text(value: &str) -> FieldValue {
        FieldValue::Text(value.to_string())
    }

    fn fusion(specimen_id: &str, five: &str, three: &str, reads: Option<f64>) -> NormalizedRecord {
        record(
            specimen_id,
            FindingType::RnaFusion,
            &[
                ("gene5prime", text(five)),
                ("gene3prime", text(three)),
                ("readSupport", reads.map_or(FieldValue::Null, FieldValue::Number)),
            ],
        )
    }

    #[test]
    fn swapped_fusion_partners_integrate_to_one_record() {
        let mut table = IntegratedTable::new(FindingType::RnaFusion);
        assert_eq!(table.append(fusion("S22-1", "EWSR1", "FLI1", None)), Appended::Added);
        assert_eq!(
            table.append(fusion("S22-1", "FLI1", "EWSR1", Some(88.0))),
            Appended::Merged
        );
        assert_eq!(table.append(fusion("S22-2", "EWSR1", "FLI1", None)), Appended::Added);

        assert_eq!(table.len(), 2);
        assert_eq!(
            table.rows()[0].record.get("readSupport"),
            &FieldValue::Number(88.0)
        );
    }

    #[test]
    fn conflicting_duplicates_are_both_kept_and_flagged() {
        let mut table = IntegratedTable::new(FindingType::DnaVariant);
        let variant = |vaf: f64| {
            record(
                "S22-1",
                FindingType::DnaVariant,
                &[
                    ("gene", text("TP53")),
                    ("mutation", text("p.R175H")),
                    ("variantAlleleFrequency", FieldValue::Number(vaf)),
                ],
            )
        };
        table.append(variant(12.5));
        assert_eq!(table.append(variant(30.0)), Appended::Conflict);
        assert_eq!(table.len(), 2);
        assert_eq!(table.conflict_count(), 2);
    }

    #[test]
    fn records_without_a_complete_key_are_never_merged() {
        let mut table = IntegratedTable::new(FindingType::DnaVariant);
        let partial = record("S22-1", FindingType::DnaVariant, &[("gene", text("NF1"))]);
        table.append(partial.clone());
        assert_eq!(table.append(partial), Appended::Added);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn writes_rows_sorted_by_specimen() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("rna_fusions.csv");
        let mut table = IntegratedTable::new(FindingType::RnaFusion);
        table.append(fusion("S22-9", "KIAA1549", "BRAF", Some(1204.0)));
        table.append(fusion("S22-1", "EWSR1", "FLI1", None));

        table.write_csv(&path).expect("csv should be written");
        let written = std::fs::read_to_string(&path).expect("csv should be readable");
        assert_eq!(
            written,
            "specimenId,gene5prime,gene3prime,fusionType,readSupport,conflict\n\
             S22-1,EWSR1,FLI1,NA,,false\n\
             S22-9,KIAA1549,BRAF,NA,1204,false\n"
        );
    }
}
