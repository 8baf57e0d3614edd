use std::collections::{BTreeSet, HashSet};

use regex::{Regex, RegexBuilder};
use report_tables::PageText;
use serde::Serialize;
use tracing::debug;

use crate::config::PatternConfig;
use crate::error::PipelineError;
use crate::issue::{Issue, IssueCode};

/// Recognizes where a specimen report starts and ends in page text.
pub trait SpecimenMatcher {
    /// The specimen ID of a report starting on this page, if any.
    fn find_start(&self, text: &str) -> Option<String>;

    fn is_end(&self, text: &str) -> bool;

    /// Every specimen ID mentioned in the text, in order of appearance.
    fn specimen_in(&self, text: &str) -> Vec<String>;
}

#[derive(Debug, Clone)]
pub struct RegexSpecimenMatcher {
    keyword: Regex,
    specimen: Regex,
    end_marker: Regex,
    window: usize,
}

impl RegexSpecimenMatcher {
    /// # Errors
    ///
    /// Returns [`PipelineError::Pattern`] when the specimen or end-marker
    /// pattern does not compile.
    pub fn new(config: &PatternConfig) -> Result<Self, PipelineError> {
        let keyword = RegexBuilder::new(&regex::escape(config.keyword.trim()))
            .case_insensitive(true)
            .build()?;
        Ok(Self {
            keyword,
            specimen: Regex::new(&config.specimen_pattern)?,
            end_marker: Regex::new(&config.end_marker)?,
            window: config.keyword_window,
        })
    }
}

impl SpecimenMatcher for RegexSpecimenMatcher {
    fn find_start(&self, text: &str) -> Option<String> {
        self.keyword.find_iter(text).find_map(|keyword| {
            let rest = &text[keyword.end()..];
            self.specimen
                .find(rest)
                .filter(|found| found.start() <= self.window)
                .map(|found| found.as_str().to_string())
        })
    }

    fn is_end(&self, text: &str) -> bool {
        self.end_marker.is_match(text)
    }

    fn specimen_in(&self, text: &str) -> Vec<String> {
        self.specimen
            .find_iter(text)
            .map(|found| found.as_str().to_string())
            .collect()
    }
}

/// A specimen ID seen on a page, from a raw scan of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecimenMarker {
    pub page: u32,
    pub specimen_id: String,
}

/// Every specimen-ID match on every page, without boundary logic.
pub fn scan_markers(pages: &[PageText], matcher: &dyn SpecimenMatcher) -> Vec<SpecimenMarker> {
    pages
        .iter()
        .flat_map(|page| {
            matcher
                .specimen_in(&page.text)
                .into_iter()
                .map(move |specimen_id| SpecimenMarker {
                    page: page.page_number,
                    specimen_id,
                })
        })
        .collect()
}

pub fn unique_specimens(markers: &[SpecimenMarker]) -> BTreeSet<&str> {
    markers
        .iter()
        .map(|marker| marker.specimen_id.as_str())
        .collect()
}

/// Inclusive, 1-based page range of one specimen report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecimenBoundary {
    pub specimen_id: String,
    pub start_page: u32,
    pub end_page: u32,
}

impl SpecimenBoundary {
    pub fn page_count(&self) -> u32 {
        self.end_page - self.start_page + 1
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundaryDetection {
    pub boundaries: Vec<SpecimenBoundary>,
    pub conflicts: Vec<Issue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeState {
    Clean,
    RepeatedStart(u32),
    SeenBefore,
}

#[derive(Debug)]
struct OpenRange {
    specimen_id: String,
    start_page: u32,
    state: RangeState,
}

fn close_range(
    open: OpenRange,
    end_page: u32,
    seen: &mut HashSet<String>,
    detection: &mut BoundaryDetection,
) {
    let issue = match open.state {
        RangeState::Clean => {
            debug!(
                specimen = %open.specimen_id,
                start = open.start_page,
                end = end_page,
                "specimen boundary detected"
            );
            seen.insert(open.specimen_id.clone());
            detection.boundaries.push(SpecimenBoundary {
                specimen_id: open.specimen_id,
                start_page: open.start_page,
                end_page,
            });
            return;
        }
        RangeState::RepeatedStart(page) => Issue::new(
            IssueCode::PatternConflict,
            format!(
                "report start repeated on page {page} before an end marker; pages {}-{end_page} skipped",
                open.start_page
            ),
        ),
        RangeState::SeenBefore => Issue::new(
            IssueCode::PatternConflict,
            format!(
                "specimen already has a report earlier in the document; pages {}-{end_page} skipped",
                open.start_page
            ),
        ),
    };
    seen.insert(open.specimen_id.clone());
    detection.conflicts.push(
        issue
            .with_specimen(open.specimen_id)
            .with_page(open.start_page),
    );
}

/// Splits a document into specimen page ranges.
///
/// A range opens on a page carrying a report-start marker and closes on a
/// page carrying the end marker, on the page before the next start marker,
/// or at the last page. Ranges whose specimen ID is ambiguous are reported
/// as conflicts and left out.
pub fn detect_boundaries(pages: &[PageText], matcher: &dyn SpecimenMatcher) -> BoundaryDetection {
    let mut detection = BoundaryDetection::default();
    let mut seen = HashSet::new();
    let mut open: Option<OpenRange> = None;

    for page in pages {
        if let Some(specimen_id) = matcher.find_start(&page.text) {
            match open.as_mut() {
                Some(range) if range.specimen_id == specimen_id => {
                    if range.state == RangeState::Clean {
                        range.state = RangeState::RepeatedStart(page.page_number);
                    }
                }
                _ => {
                    if let Some(previous) = open.take() {
                        close_range(
                            previous,
                            page.page_number.saturating_sub(1),
                            &mut seen,
                            &mut detection,
                        );
                    }
                    let state = if seen.contains(&specimen_id) {
                        RangeState::SeenBefore
                    } else {
                        RangeState::Clean
                    };
                    open = Some(OpenRange {
                        specimen_id,
                        start_page: page.page_number,
                        state,
                    });
                }
            }
        }

        if matcher.is_end(&page.text) {
            if let Some(range) = open.take() {
                close_range(range, page.page_number, &mut seen, &mut detection);
            }
        }
    }

    if let (Some(range), Some(last)) = (open, pages.last()) {
        close_range(range, last.page_number, &mut seen, &mut detection);
    }

    detection
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use report_tables::PageText;

    use super::{
        RegexSpecimenMatcher, SpecimenBoundary, SpecimenMatcher, detect_boundaries, scan_markers,
        unique_specimens,
    };
    use crate::config::PatternConfig;
    use crate::issue::IssueCode;

    fn pages(texts: &[&str]) -> Vec<PageText> {
        texts
            .iter()
            .zip(1..)
            .map(|(text, page_number)| PageText {
                page_number,
                text: (*text).to_string(),
            })
            .collect()
    }

    fn matcher() -> RegexSpecimenMatcher {
        RegexSpecimenMatcher::new(&PatternConfig::default()).expect("default patterns compile")
    }

    fn boundary(specimen_id: &str, start_page: u32, end_page: u32) -> SpecimenBoundary {
        SpecimenBoundary {
            specimen_id: specimen_id.to_string(),
            start_page,
            end_page,
        }
    }

    #[test]
    fn single_report_runs_to_document_end() {
        let detection = detect_boundaries(
            &pages(&[
                "OncoKids Cancer Panel  Specimen: S22-1234",
                "Methodology and limitations",
            ]),
            &matcher(),
        );
        assert_eq!(detection.boundaries, vec![boundary("S22-1234", 1, 2)]);
        assert!(detection.conflicts.is_empty());
    }

    #[test]
    fn next_start_or_end_marker_closes_a_report() {
        let detection = detect_boundaries(
            &pages(&[
                "ONCOKIDS report for S22-1234",
                "results",
                "oncokids report for SH23-77",
                "END OF REPORT",
                "billing appendix",
                "OncoKids report for S22-9000",
            ]),
            &matcher(),
        );
        assert_eq!(
            detection.boundaries,
            vec![
                boundary("S22-1234", 1, 2),
                boundary("SH23-77", 3, 4),
                boundary("S22-9000", 6, 6),
            ]
        );
    }

    #[test]
    fn specimen_id_must_follow_the_keyword_within_the_window() {
        let config = PatternConfig {
            keyword_window: 10,
            ..PatternConfig::default()
        };
        let matcher = RegexSpecimenMatcher::new(&config).expect("patterns compile");
        assert_eq!(
            matcher.find_start("OncoKids S22-1"),
            Some("S22-1".to_string())
        );
        assert_eq!(
            matcher.find_start("OncoKids comprehensive panel S22-1"),
            None
        );
        assert_eq!(matcher.find_start("S22-1 OncoKids"), None);
    }

    #[test]
    fn repeated_start_before_end_marker_is_a_conflict() {
        let detection = detect_boundaries(
            &pages(&[
                "OncoKids S22-1234",
                "OncoKids S22-1234",
                "End of report",
                "OncoKids S22-5555",
            ]),
            &matcher(),
        );
        assert_eq!(detection.boundaries, vec![boundary("S22-5555", 4, 4)]);
        assert_eq!(detection.conflicts.len(), 1);
        assert_eq!(detection.conflicts[0].code, IssueCode::PatternConflict);
        assert_eq!(detection.conflicts[0].specimen_id.as_deref(), Some("S22-1234"));
    }

    #[test]
    fn reappearing_specimen_keeps_the_first_range() {
        let detection = detect_boundaries(
            &pages(&[
                "OncoKids S22-1234",
                "OncoKids S22-2000",
                "OncoKids S22-1234",
                "trailing page",
            ]),
            &matcher(),
        );
        assert_eq!(
            detection.boundaries,
            vec![boundary("S22-1234", 1, 1), boundary("S22-2000", 2, 2)]
        );
        assert_eq!(detection.conflicts.len(), 1);
        assert_eq!(detection.conflicts[0].page, Some(3));
    }

    #[test]
    fn boundaries_never_overlap_or_exceed_the_document() {
        let texts = [
            "cover",
            "OncoKids S22-1",
            "OncoKids S22-2",
            "end of report",
            "OncoKids S22-3",
            "end of report",
            "OncoKids S22-2",
            "notes",
        ];
        let document = pages(&texts);
        let detection = detect_boundaries(&document, &matcher());

        let mut previous_end = 0;
        let mut covered = 0;
        for boundary in &detection.boundaries {
            assert!(boundary.start_page > previous_end);
            assert!(boundary.start_page <= boundary.end_page);
            assert!(boundary.end_page as usize <= document.len());
            previous_end = boundary.end_page;
            covered += boundary.page_count() as usize;
        }
        assert!(covered <= document.len());
    }

    #[test]
    fn raw_scan_reports_every_match() {
        let markers = scan_markers(
            &pages(&["S22-1 and S22-2", "no ids", "again S22-1"]),
            &matcher(),
        );
        assert_eq!(markers.len(), 3);
        assert_eq!(markers[2].page, 3);
        assert_eq!(
            unique_specimens(&markers).into_iter().collect::<Vec<_>>(),
            vec!["S22-1", "S22-2"]
        );
    }
}
