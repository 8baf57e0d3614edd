use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How table cells are located on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    /// Cells are bounded by drawn ruling lines.
    #[serde(alias = "lattice")]
    Bordered,
    /// Cells are separated by runs of whitespace in the page text.
    #[serde(alias = "stream")]
    Whitespace,
}

impl Flavor {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bordered => "bordered",
            Self::Whitespace => "whitespace",
        }
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Flavor {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bordered" | "lattice" => Ok(Self::Bordered),
            "whitespace" | "stream" => Ok(Self::Whitespace),
            other => Err(format!(
                "unknown flavor '{other}', expected bordered or whitespace"
            )),
        }
    }
}

/// What to do with tables whose detection confidence is low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QualityMode {
    /// Keep them and warn.
    BestEffort,
    /// Fail the document.
    Strict,
    /// Drop them and warn.
    SkipAmbiguous,
}

impl QualityMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BestEffort => "best-effort",
            Self::Strict => "strict",
            Self::SkipAmbiguous => "skip-ambiguous",
        }
    }
}

impl fmt::Display for QualityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "best-effort" => Ok(Self::BestEffort),
            "strict" => Ok(Self::Strict),
            "skip-ambiguous" | "skip" => Ok(Self::SkipAmbiguous),
            other => Err(format!(
                "unknown quality mode '{other}', expected best-effort, strict or skip-ambiguous"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSelection {
    pages: BTreeSet<u32>,
}

impl PageSelection {
    /// Inclusive 1-based range. Returns `None` when the range is empty or
    /// starts at page 0.
    #[must_use]
    pub fn range(start: u32, end: u32) -> Option<Self> {
        if start == 0 || end < start {
            return None;
        }
        Some(Self {
            pages: (start..=end).collect(),
        })
    }

    #[must_use]
    pub fn contains(&self, page: u32) -> bool {
        self.pages.contains(&page)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.pages.iter().copied()
    }
}

impl FromStr for PageSelection {
    type Err = String;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let mut pages = BTreeSet::new();
        for token in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if let Some((start, end)) = token.split_once('-') {
                let start: u32 = start
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid page range start: '{start}'"))?;
                let end: u32 = end
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid page range end: '{end}'"))?;
                if start == 0 || end == 0 {
                    return Err("pages are 1-based".to_string());
                }
                if end < start {
                    return Err(format!(
                        "invalid range '{token}': end is smaller than start"
                    ));
                }
                pages.extend(start..=end);
            } else {
                let page: u32 = token
                    .parse()
                    .map_err(|_| format!("invalid page number: '{token}'"))?;
                if page == 0 {
                    return Err("pages are 1-based".to_string());
                }
                pages.insert(page);
            }
        }

        if pages.is_empty() {
            return Err("page selection cannot be empty".to_string());
        }

        Ok(Self { pages })
    }
}

pub const DEFAULT_LINE_SCALE: u32 = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractOptions {
    pub pages: Option<PageSelection>,
    pub flavor: Flavor,
    /// Ruling-line sensitivity. A segment counts as a ruling line when it is
    /// at least `page_dimension / line_scale` long; larger values accept
    /// shorter lines.
    pub line_scale: u32,
    pub quality_mode: QualityMode,
    pub min_cols: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            pages: None,
            flavor: Flavor::Bordered,
            line_scale: DEFAULT_LINE_SCALE,
            quality_mode: QualityMode::BestEffort,
            min_cols: 2,
        }
    }
}

impl ExtractOptions {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.min_cols < 2 {
            return Err("min_cols must be at least 2".to_string());
        }
        if self.line_scale == 0 {
            return Err("line_scale must be greater than zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ExtractOptions, Flavor, PageSelection, QualityMode};
    use std::str::FromStr;

    #[test]
    fn parse_page_selection_range_and_single() {
        let selection = PageSelection::from_str("1-3,5").expect("selection should parse");
        assert!(selection.contains(1));
        assert!(selection.contains(2));
        assert!(selection.contains(3));
        assert!(selection.contains(5));
        assert!(!selection.contains(4));
    }

    #[test]
    fn reject_invalid_page_selection() {
        let err = PageSelection::from_str("3-1").expect_err("invalid range should fail");
        assert!(err.contains("invalid range"));
    }

    #[test]
    fn range_constructor_rejects_zero_and_reversed() {
        assert!(PageSelection::range(0, 2).is_none());
        assert!(PageSelection::range(3, 2).is_none());
        let selection = PageSelection::range(2, 4).expect("valid range");
        assert_eq!(selection.iter().collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn parses_flavor_names_and_aliases() {
        assert_eq!(Flavor::from_str("lattice"), Ok(Flavor::Bordered));
        assert_eq!(Flavor::from_str("Stream"), Ok(Flavor::Whitespace));
        assert_eq!(Flavor::from_str(" whitespace "), Ok(Flavor::Whitespace));
        assert!(Flavor::from_str("grid").is_err());
    }

    #[test]
    fn parses_quality_modes() {
        assert_eq!(QualityMode::from_str("strict"), Ok(QualityMode::Strict));
        assert_eq!(
            QualityMode::from_str("Skip_Ambiguous"),
            Ok(QualityMode::SkipAmbiguous)
        );
        assert_eq!(QualityMode::BestEffort.to_string(), "best-effort");
        assert!(QualityMode::from_str("lenient").is_err());
    }

    #[test]
    fn rejects_zero_line_scale() {
        let options = ExtractOptions {
            line_scale: 0,
            ..ExtractOptions::default()
        };
        assert!(options.validate().is_err());
    }
}
