use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum IssueCode {
    PatternConflict,
    NoTablesFound,
    ExtractionFailure,
    UnrecognizedSchema,
    FieldParseWarning,
}

impl IssueCode {
    pub const ALL: [Self; 5] = [
        Self::PatternConflict,
        Self::NoTablesFound,
        Self::ExtractionFailure,
        Self::UnrecognizedSchema,
        Self::FieldParseWarning,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PatternConflict => "PatternConflict",
            Self::NoTablesFound => "NoTablesFound",
            Self::ExtractionFailure => "ExtractionFailure",
            Self::UnrecognizedSchema => "UnrecognizedSchema",
            Self::FieldParseWarning => "FieldParseWarning",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A content-level problem found while processing one report. Issues are
/// collected on the run and never stop sibling work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub code: IssueCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specimen_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<usize>,
}

impl Issue {
    #[must_use]
    pub fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            specimen_id: None,
            file: None,
            page: None,
            table: None,
        }
    }

    #[must_use]
    pub fn with_specimen(mut self, specimen_id: impl Into<String>) -> Self {
        self.specimen_id = Some(specimen_id.into());
        self
    }

    #[must_use]
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    #[must_use]
    pub fn with_table(mut self, table: usize) -> Self {
        self.table = Some(table);
        self
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)?;
        if let Some(specimen_id) = &self.specimen_id {
            write!(f, " specimen={specimen_id}")?;
        }
        if let Some(file) = &self.file {
            write!(f, " file={file}")?;
        }
        if let Some(page) = self.page {
            write!(f, " page={page}")?;
        }
        if let Some(table) = self.table {
            write!(f, " table={table}")?;
        }
        write!(f, ": {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::{Issue, IssueCode};

    #[test]
    fn display_lists_only_present_locations() {
        let issue = Issue::new(IssueCode::FieldParseWarning, "'n/a' is not a number")
            .with_specimen("S22-1234")
            .with_table(2);
        assert_eq!(
            issue.to_string(),
            "FieldParseWarning specimen=S22-1234 table=2: 'n/a' is not a number"
        );
    }

    #[test]
    fn serializes_without_empty_locations() {
        let issue = Issue::new(IssueCode::NoTablesFound, "engine returned no tables")
            .with_file("OncoKids_2022_S22-4649.pdf");
        let json = serde_json::to_value(&issue).expect("issue should serialize");
        assert_eq!(json["code"], "NoTablesFound");
        assert_eq!(json["file"], "OncoKids_2022_S22-4649.pdf");
        assert!(json.get("page").is_none());
    }
}
