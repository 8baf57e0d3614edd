//! Classification of raw tables into the three finding types and mapping of
//! their columns onto canonical fields.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::cells::{
    CellPatterns, clean_cell, gene_symbol, is_gene_like, normalize_chromosome,
    normalize_copy_state, parse_number, split_fusion,
};
use crate::extract::RawTable;
use crate::issue::{Issue, IssueCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingType {
    DnaVariant,
    RnaFusion,
    CmaCnv,
    Unrecognized,
}

pub const DNA_FIELDS: &[&str] = &[
    "gene",
    "transcript",
    "mutation",
    "variantAlleleFrequency",
    "classification",
];
pub const RNA_FIELDS: &[&str] = &["gene5prime", "gene3prime", "fusionType", "readSupport"];
pub const CMA_FIELDS: &[&str] = &[
    "chromosome",
    "startPosition",
    "endPosition",
    "copyNumberState",
    "size",
];

impl FindingType {
    pub const INTEGRATED: [Self; 3] = [Self::DnaVariant, Self::RnaFusion, Self::CmaCnv];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DnaVariant => "DNA_VARIANT",
            Self::RnaFusion => "RNA_FUSION",
            Self::CmaCnv => "CMA_CNV",
            Self::Unrecognized => "UNRECOGNIZED",
        }
    }

    /// Canonical field names, in output column order.
    pub const fn fields(self) -> &'static [&'static str] {
        match self {
            Self::DnaVariant => DNA_FIELDS,
            Self::RnaFusion => RNA_FIELDS,
            Self::CmaCnv => CMA_FIELDS,
            Self::Unrecognized => &[],
        }
    }

    /// Fields that identify the same finding within a specimen.
    pub const fn key_fields(self) -> &'static [&'static str] {
        match self {
            Self::DnaVariant => &["gene", "mutation"],
            Self::RnaFusion => &["gene5prime", "gene3prime"],
            Self::CmaCnv => &["chromosome", "startPosition", "endPosition"],
            Self::Unrecognized => &[],
        }
    }
}

impl fmt::Display for FindingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    /// The column exists but the cell is empty or could not be parsed.
    Null,
    /// The source table has no column for this field.
    NotReported,
}

impl FieldValue {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Text(_) | Self::Number(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    fn text_or_null(value: String) -> Self {
        if value.is_empty() {
            Self::Null
        } else {
            Self::Text(value)
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(value) => f.write_str(value),
            Self::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                write!(f, "{value:.0}")
            }
            Self::Number(value) => write!(f, "{value}"),
            Self::Null => Ok(()),
            Self::NotReported => f.write_str("NA"),
        }
    }
}

static NOT_REPORTED: FieldValue = FieldValue::NotReported;

/// One finding row mapped onto the canonical fields of its type. Every
/// canonical field is present in `fields`.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub specimen_id: String,
    pub finding_type: FindingType,
    /// 1-based position of the finding among all findings of its specimen.
    pub row_index: usize,
    pub fields: BTreeMap<&'static str, FieldValue>,
}

impl NormalizedRecord {
    pub fn new(specimen_id: impl Into<String>, finding_type: FindingType, row_index: usize) -> Self {
        Self {
            specimen_id: specimen_id.into(),
            finding_type,
            row_index,
            fields: finding_type
                .fields()
                .iter()
                .map(|field| (*field, FieldValue::NotReported))
                .collect(),
        }
    }

    pub fn get(&self, field: &str) -> &FieldValue {
        self.fields.get(field).unwrap_or(&NOT_REPORTED)
    }

    fn set(&mut self, field: &'static str, value: FieldValue) {
        self.fields.insert(field, value);
    }

    pub fn present_count(&self) -> usize {
        self.fields.values().filter(|value| value.is_present()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordGroup {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub finding_type: FindingType,
    pub groups: &'static [KeywordGroup],
    /// Groups a header must hit before the signature is considered.
    pub min_groups: usize,
}

const DNA_SIGNATURE: &[KeywordGroup] = &[
    KeywordGroup {
        name: "gene",
        keywords: &["gene"],
    },
    KeywordGroup {
        name: "mutation",
        keywords: &[
            "mutation",
            "variant",
            "protein",
            "amino acid",
            "alteration",
            "dna change",
            "cdna",
        ],
    },
    KeywordGroup {
        name: "frequency",
        keywords: &["vaf", "allele freq", "allele fraction", "frequency"],
    },
    KeywordGroup {
        name: "significance",
        keywords: &[
            "classification",
            "significance",
            "interpretation",
            "pathogenicity",
            "tier",
        ],
    },
];

const RNA_SIGNATURE: &[KeywordGroup] = &[
    KeywordGroup {
        name: "fusion",
        keywords: &["fusion", "rearrangement", "translocation"],
    },
    KeywordGroup {
        name: "partner",
        keywords: &["partner", "5'", "3'", "5′", "3′", "5 prime", "3 prime"],
    },
    KeywordGroup {
        name: "breakpoint",
        keywords: &["breakpoint", "junction", "exon"],
    },
    KeywordGroup {
        name: "reads",
        keywords: &["reads", "read support", "read count", "supporting", "spanning"],
    },
];

const CMA_SIGNATURE: &[KeywordGroup] = &[
    KeywordGroup {
        name: "chromosome",
        keywords: &["chromosome", "chr", "cytoband"],
    },
    KeywordGroup {
        name: "coordinate",
        keywords: &[
            "position",
            "start",
            "end",
            "coordinate",
            "genomic",
            "array",
            "cma",
        ],
    },
    KeywordGroup {
        name: "copy number",
        keywords: &["copy", "gain", "loss", "cnv"],
    },
];

pub const DEFAULT_SIGNATURES: &[Signature] = &[
    Signature {
        finding_type: FindingType::DnaVariant,
        groups: DNA_SIGNATURE,
        min_groups: 2,
    },
    Signature {
        finding_type: FindingType::RnaFusion,
        groups: RNA_SIGNATURE,
        min_groups: 1,
    },
    Signature {
        finding_type: FindingType::CmaCnv,
        groups: CMA_SIGNATURE,
        min_groups: 2,
    },
];

/// True when `keyword` starts a word of `header` (already lowercased).
fn mentions(header: &str, keyword: &str) -> bool {
    header.match_indices(keyword).any(|(index, _)| {
        header[..index]
            .chars()
            .next_back()
            .is_none_or(|previous| !previous.is_alphanumeric())
    })
}

fn header_key(cell: &str) -> String {
    clean_cell(cell).to_lowercase()
}

/// Ranked header signatures; earlier entries win ties.
#[derive(Debug, Clone)]
pub struct SignatureTable {
    signatures: Vec<Signature>,
}

impl Default for SignatureTable {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNATURES.to_vec())
    }
}

impl SignatureTable {
    pub fn new(signatures: Vec<Signature>) -> Self {
        Self { signatures }
    }

    pub fn classify(&self, header: &[String]) -> FindingType {
        let header = header.iter().map(|cell| header_key(cell)).collect::<Vec<_>>();
        let mut best: Option<(usize, FindingType)> = None;

        for signature in &self.signatures {
            let matched = signature
                .groups
                .iter()
                .filter(|group| {
                    header.iter().any(|cell| {
                        group
                            .keywords
                            .iter()
                            .any(|keyword| mentions(cell, keyword))
                    })
                })
                .count();
            if matched < signature.min_groups.max(1) {
                continue;
            }
            if best.is_none_or(|(score, _)| matched > score) {
                best = Some((matched, signature.finding_type));
            }
        }

        best.map_or(FindingType::Unrecognized, |(_, finding_type)| finding_type)
    }
}

/// Maps header keywords to a column role. Rules are applied in order; each
/// role and each column is used at most once.
struct ColumnRule {
    role: &'static str,
    keywords: &'static [&'static str],
}

const DNA_RULES: &[ColumnRule] = &[
    ColumnRule {
        role: "variantAlleleFrequency",
        keywords: &[
            "vaf",
            "allele freq",
            "allele fraction",
            "variant allele",
            "frequency",
            "%",
        ],
    },
    ColumnRule {
        role: "classification",
        keywords: &[
            "classification",
            "clinical significance",
            "significance",
            "interpretation",
            "pathogenicity",
            "tier",
        ],
    },
    ColumnRule {
        role: "transcript",
        keywords: &["transcript", "refseq", "nm_", "accession"],
    },
    ColumnRule {
        role: "mutation",
        keywords: &[
            "protein",
            "amino acid",
            "aa change",
            "p.",
            "mutation",
            "variant",
            "alteration",
        ],
    },
    ColumnRule {
        role: "dnaChange",
        keywords: &["dna change", "cdna", "c.", "nucleotide", "coding", "hgvs"],
    },
    ColumnRule {
        role: "gene",
        keywords: &["gene", "symbol"],
    },
];

const RNA_RULES: &[ColumnRule] = &[
    ColumnRule {
        role: "readSupport",
        keywords: &[
            "junction reads",
            "read support",
            "read count",
            "reads",
            "supporting",
            "spanning",
        ],
    },
    ColumnRule {
        role: "fusionType",
        keywords: &["fusion type", "type", "reading frame", "frame", "in-frame"],
    },
    ColumnRule {
        role: "gene5prime",
        keywords: &[
            "5'", "5′", "5 prime", "5prime", "gene 1", "gene a", "partner 1", "upstream",
        ],
    },
    ColumnRule {
        role: "gene3prime",
        keywords: &[
            "3'",
            "3′",
            "3 prime",
            "3prime",
            "gene 2",
            "gene b",
            "partner 2",
            "downstream",
        ],
    },
    ColumnRule {
        role: "fusion",
        keywords: &["fusion", "rearrangement", "translocation", "gene"],
    },
];

const CMA_RULES: &[ColumnRule] = &[
    ColumnRule {
        role: "size",
        keywords: &["size", "length"],
    },
    ColumnRule {
        role: "startPosition",
        keywords: &["start", "begin"],
    },
    ColumnRule {
        role: "endPosition",
        keywords: &["end", "stop"],
    },
    ColumnRule {
        role: "copyNumberState",
        keywords: &[
            "copy number state",
            "copy number",
            "copy",
            "state",
            "gain/loss",
            "cnv",
            "call",
            "type",
        ],
    },
    ColumnRule {
        role: "chromosome",
        keywords: &["chromosome", "chr", "cytoband", "band"],
    },
    ColumnRule {
        role: "region",
        keywords: &[
            "coordinate",
            "position",
            "location",
            "region",
            "iscn",
            "nomenclature",
            "genomic",
            "microarray",
            "array",
            "cma",
            "result",
            "finding",
        ],
    },
];

const fn rules_for(finding_type: FindingType) -> &'static [ColumnRule] {
    match finding_type {
        FindingType::DnaVariant => DNA_RULES,
        FindingType::RnaFusion => RNA_RULES,
        FindingType::CmaCnv => CMA_RULES,
        FindingType::Unrecognized => &[],
    }
}

type Roles = Vec<Option<&'static str>>;

fn map_columns(header: &[String], rules: &[ColumnRule]) -> Roles {
    let header = header.iter().map(|cell| header_key(cell)).collect::<Vec<_>>();
    let mut roles = vec![None; header.len()];

    for rule in rules {
        let column = rule.keywords.iter().find_map(|keyword| {
            header
                .iter()
                .enumerate()
                .find(|(index, cell)| roles[*index].is_none() && mentions(cell, keyword))
                .map(|(index, _)| index)
        });
        if let Some(index) = column {
            roles[index] = Some(rule.role);
        }
    }
    roles
}

const SIGNIFICANCE_WORDS: &[&str] = &["signif", "pathogenic", "benign", "uncertain", "vus"];

/// Roles only a value cell can have; a header cell never looks like these.
const VALUE_ROLES: &[&str] = &[
    "region",
    "mutation",
    "dnaChange",
    "transcript",
    "variantAlleleFrequency",
    "fusion",
];

fn looks_like_data_row(row: &[String], patterns: &CellPatterns) -> bool {
    row.iter().any(|cell| {
        content_role(&clean_cell(cell), patterns).is_some_and(|role| VALUE_ROLES.contains(&role))
    })
}

fn content_role(cell: &str, patterns: &CellPatterns) -> Option<&'static str> {
    let lower = cell.to_lowercase();
    if patterns.parse_region(cell).is_some() {
        Some("region")
    } else if SIGNIFICANCE_WORDS.iter().any(|word| lower.contains(word)) {
        Some("classification")
    } else if lower.starts_with("p.") {
        Some("mutation")
    } else if lower.starts_with("c.") {
        Some("dnaChange")
    } else if lower.starts_with("nm_") {
        Some("transcript")
    } else if patterns.is_percent(cell) {
        Some("variantAlleleFrequency")
    } else if split_fusion(cell).is_some() {
        Some("fusion")
    } else if is_gene_like(cell) && cell.len() <= 6 {
        Some("gene")
    } else {
        None
    }
}

/// Profiles each column by its cell contents when the table has no header
/// row. A role is assigned when at least half of a column's non-empty cells
/// agree on it.
fn infer_roles(rows: &[Vec<String>], patterns: &CellPatterns) -> Option<(FindingType, Roles)> {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut roles: Roles = vec![None; width];

    for (column, role) in roles.iter_mut().enumerate() {
        let cells = rows
            .iter()
            .filter_map(|row| row.get(column))
            .map(|cell| clean_cell(cell))
            .filter(|cell| !cell.is_empty())
            .collect::<Vec<_>>();
        let mut votes = BTreeMap::<&'static str, usize>::new();
        for cell in &cells {
            if let Some(found) = content_role(cell, patterns) {
                *votes.entry(found).or_default() += 1;
            }
        }
        *role = votes
            .into_iter()
            .filter(|(_, count)| count * 2 >= cells.len())
            .max_by_key(|(_, count)| *count)
            .map(|(found, _)| found);
    }

    let has = |wanted: &str| roles.iter().flatten().any(|role| *role == wanted);
    let finding_type = if has("region") {
        FindingType::CmaCnv
    } else if has("mutation") || has("dnaChange") || has("transcript") || has("variantAlleleFrequency")
    {
        FindingType::DnaVariant
    } else if has("fusion") {
        FindingType::RnaFusion
    } else {
        return None;
    };

    let allowed = rules_for(finding_type);
    for role in &mut roles {
        if role.is_some_and(|found| !allowed.iter().any(|rule| rule.role == found)) {
            *role = None;
        }
    }
    Some((finding_type, roles))
}

fn first_cell<'a>(row: &'a [String], roles: &[Option<&'static str>], role: &str) -> Option<&'a str> {
    roles
        .iter()
        .zip(row)
        .find(|(found, _)| **found == Some(role))
        .map(|(_, cell)| cell.as_str())
}

fn has_role(roles: &[Option<&'static str>], role: &str) -> bool {
    roles.iter().any(|found| *found == Some(role))
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableNormalization {
    pub finding_type: FindingType,
    pub records: Vec<NormalizedRecord>,
    pub issues: Vec<Issue>,
    pub headerless: bool,
}

/// Turns raw tables into typed records.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    signatures: SignatureTable,
    patterns: CellPatterns,
}

impl Normalizer {
    pub fn new(signatures: SignatureTable) -> Self {
        Self {
            signatures,
            patterns: CellPatterns::new(),
        }
    }

    /// Finds the header row (first or second row) and the column roles, or
    /// falls back to content profiling for headerless tables.
    fn layout(&self, rows: &[Vec<String>]) -> Option<(FindingType, Roles, usize, bool)> {
        for header_row in 0..rows.len().min(2) {
            let header = &rows[header_row];
            let finding_type = self.signatures.classify(header);
            if finding_type == FindingType::Unrecognized || looks_like_data_row(header, &self.patterns)
            {
                continue;
            }
            let roles = map_columns(header, rules_for(finding_type));
            return Some((finding_type, roles, header_row + 1, false));
        }

        if rows.first().is_some_and(|row| looks_like_data_row(row, &self.patterns)) {
            return infer_roles(rows, &self.patterns)
                .map(|(finding_type, roles)| (finding_type, roles, 0, true));
        }
        None
    }

    pub fn normalize(&self, table: &RawTable) -> TableNormalization {
        let rows = table
            .rows
            .iter()
            .map(|row| row.iter().map(|cell| clean_cell(cell)).collect::<Vec<_>>())
            .collect::<Vec<_>>();

        let Some((finding_type, roles, data_start, headerless)) = self.layout(&rows) else {
            let preview = rows.first().map(|row| row.join(" | ")).unwrap_or_default();
            let mut issue = Issue::new(
                IssueCode::UnrecognizedSchema,
                format!("table matched no signature (first row: {preview})"),
            )
            .with_specimen(&table.specimen_id)
            .with_table(table.source_table_index);
            if let Some(page) = table.page {
                issue = issue.with_page(page);
            }
            return TableNormalization {
                finding_type: FindingType::Unrecognized,
                records: Vec::new(),
                issues: vec![issue],
                headerless: false,
            };
        };

        debug!(
            specimen = %table.specimen_id,
            table = table.source_table_index,
            %finding_type,
            headerless,
            roles = ?roles,
            "table classified"
        );

        let header_key_row = data_start
            .checked_sub(1)
            .map(|index| rows[index].iter().map(|cell| header_key(cell)).collect::<Vec<_>>());
        let mut normalization = TableNormalization {
            finding_type,
            records: Vec::new(),
            issues: Vec::new(),
            headerless,
        };

        let data_rows = rows[data_start..].iter().filter(|row| {
            let blank = row.iter().all(String::is_empty);
            let repeated_header = header_key_row.as_ref().is_some_and(|header| {
                row.iter().map(|cell| header_key(cell)).collect::<Vec<_>>() == *header
            });
            !blank && !repeated_header
        });

        for row in data_rows {
            let row_index = normalization.records.len() + 1;
            let mut builder = RecordBuilder {
                record: NormalizedRecord::new(&table.specimen_id, finding_type, row_index),
                row,
                roles: &roles,
                table,
                issues: &mut normalization.issues,
            };
            match finding_type {
                FindingType::DnaVariant => builder.fill_dna(&self.patterns),
                FindingType::RnaFusion => builder.fill_rna(),
                FindingType::CmaCnv => builder.fill_cma(&self.patterns),
                FindingType::Unrecognized => {}
            }
            if builder.record.present_count() > 0 {
                normalization.records.push(builder.record);
            }
        }

        normalization
    }
}

struct RecordBuilder<'a> {
    record: NormalizedRecord,
    row: &'a [String],
    roles: &'a [Option<&'static str>],
    table: &'a RawTable,
    issues: &'a mut Vec<Issue>,
}

impl RecordBuilder<'_> {
    fn cell(&self, role: &str) -> Option<&str> {
        first_cell(self.row, self.roles, role).filter(|cell| !cell.is_empty())
    }

    fn has(&self, role: &str) -> bool {
        has_role(self.roles, role)
    }

    /// Null when the column exists but the cell is empty; untouched
    /// (`NotReported`) when the column is missing.
    fn set_text(&mut self, field: &'static str, value: Option<String>) {
        match value {
            Some(value) => self.record.set(field, FieldValue::text_or_null(value)),
            None if self.has(field) => self.record.set(field, FieldValue::Null),
            None => {}
        }
    }

    fn set_number(&mut self, field: &'static str) {
        if !self.has(field) {
            return;
        }
        let raw = self.cell(field).unwrap_or_default().to_string();
        let value = match parse_number(&raw) {
            Ok(Some(value)) => FieldValue::Number(value),
            Ok(None) => FieldValue::Null,
            Err(text) => {
                self.warn(format!("{field}: '{text}' is not a number"));
                FieldValue::Null
            }
        };
        self.record.set(field, value);
    }

    /// Standardized symbol, or `None` with a warning when the cell holds
    /// something other than a gene.
    fn gene(&mut self, field: &str, raw: &str) -> Option<String> {
        match gene_symbol(raw) {
            Ok(symbol) => symbol,
            Err(text) => {
                self.warn(format!("{field}: '{text}' is not a gene symbol"));
                None
            }
        }
    }

    fn warn(&mut self, message: String) {
        let mut issue = Issue::new(IssueCode::FieldParseWarning, message)
            .with_specimen(&self.record.specimen_id)
            .with_table(self.table.source_table_index);
        if let Some(page) = self.table.page {
            issue = issue.with_page(page);
        }
        self.issues.push(issue);
    }

    fn fill_dna(&mut self, patterns: &CellPatterns) {
        let gene = self
            .cell("gene")
            .map(str::to_string)
            .map(|raw| self.gene("gene", &raw).unwrap_or_default());
        self.set_text("gene", gene);
        let transcript = self.cell("transcript").map(str::to_string);
        self.set_text("transcript", transcript);

        let mutation = self
            .cell("mutation")
            .or_else(|| self.cell("dnaChange"))
            .map(|cell| patterns.standardize_protein(cell));
        if mutation.is_some() || self.has("mutation") || self.has("dnaChange") {
            self.record
                .set("mutation", mutation.map_or(FieldValue::Null, FieldValue::text_or_null));
        }

        self.set_number("variantAlleleFrequency");
        let classification = self.cell("classification").map(str::to_string);
        self.set_text("classification", classification);
    }

    fn fill_rna(&mut self) {
        let combined = self.cell("fusion").map(str::to_string);
        let split = combined.as_deref().and_then(split_fusion);

        for (field, from_combined) in [
            ("gene5prime", split.as_ref().map(|(five, _)| five.clone())),
            ("gene3prime", split.as_ref().map(|(_, three)| three.clone())),
        ] {
            let value = match self.cell(field).map(str::to_string) {
                Some(raw) => self.gene(field, &raw),
                None => from_combined,
            };
            match value {
                Some(value) => self.record.set(field, FieldValue::text_or_null(value)),
                None if self.has(field) || self.has("fusion") => {
                    self.record.set(field, FieldValue::Null);
                }
                None => {}
            }
        }
        if split.is_none() && !self.has("gene5prime") {
            if let Some(symbol) = combined.and_then(|combined| self.gene("fusion", &combined)) {
                self.record.set("gene5prime", FieldValue::Text(symbol));
            }
        }

        let fusion_type = self.cell("fusionType").map(str::to_string);
        self.set_text("fusionType", fusion_type);
        self.set_number("readSupport");
    }

    fn fill_cma(&mut self, patterns: &CellPatterns) {
        let region = self
            .cell("region")
            .or_else(|| self.cell("chromosome"))
            .and_then(|cell| patterns.parse_region(cell));

        let chromosome = match (&region, self.cell("chromosome")) {
            (Some(region), _) => Some(region.chromosome.clone()),
            (None, Some(cell)) => Some(normalize_chromosome(cell)),
            (None, None) => None,
        };
        if chromosome.is_some() || self.has("chromosome") || self.has("region") {
            self.record
                .set("chromosome", chromosome.map_or(FieldValue::Null, FieldValue::text_or_null));
        }

        for (field, from_region) in [
            ("startPosition", region.as_ref().map(|region| region.start)),
            ("endPosition", region.as_ref().map(|region| region.end)),
        ] {
            if self.cell(field).is_some() {
                self.set_number(field);
            } else if let Some(position) = from_region {
                #[allow(clippy::cast_precision_loss)]
                let position = position as f64;
                self.record.set(field, FieldValue::Number(position));
            } else if self.has(field) || self.has("region") {
                self.record.set(field, FieldValue::Null);
            }
        }

        let state = self
            .cell("copyNumberState")
            .map(normalize_copy_state)
            .or_else(|| region.as_ref().and_then(|region| region.copy_state.clone()));
        if state.is_some() || self.has("copyNumberState") || self.has("region") {
            self.record
                .set("copyNumberState", state.map_or(FieldValue::Null, FieldValue::text_or_null));
        }

        let size = self.cell("size").map(str::to_string);
        self.set_text("size", size);
    }
}
