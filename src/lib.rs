//! Splits combined OncoKids pathology PDFs into per-specimen reports,
//! extracts their tables and consolidates the findings into DNA variant,
//! RNA fusion and CMA copy-number tables.

pub mod cells;
pub mod config;
pub mod context;
pub mod error;
pub mod extract;
pub mod integrate;
pub mod issue;
pub mod pattern;
pub mod pipeline;
pub mod schema;
pub mod segment;

pub use config::PipelineConfig;
pub use context::{NoTableReport, RunContext, RunSummary, StageCounts};
pub use error::PipelineError;
pub use extract::{DocumentTables, LopdfTableEngine, RawTable, TableEngine, TableExtractor};
pub use integrate::{IntegratedRow, IntegratedTable};
pub use issue::{Issue, IssueCode};
pub use pattern::{RegexSpecimenMatcher, SpecimenBoundary, SpecimenMatcher};
pub use schema::{FieldValue, FindingType, NormalizedRecord, Normalizer, SignatureTable};
pub use segment::{LopdfPageSource, PageSource, PageWriter, Segmenter};
