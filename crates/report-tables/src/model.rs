/// Text of one PDF page. `page_number` is 1-based, as in the page tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub page_number: u32,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableOrigin {
    RulingGrid,
    Whitespace,
}

/// A table as recovered from one page, header row included.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedTable {
    pub page: u32,
    pub rows: Vec<Vec<String>>,
    pub confidence: f32,
    pub origin: TableOrigin,
}
