use regex::{Captures, Regex};

/// Historical gene symbols and their current names. No target appears as a
/// key, so lookups are idempotent.
pub const GENE_ALIASES: &[(&str, &str)] = &[
    ("C11ORF95", "ZFTA"),
    ("FAM123B", "AMER1"),
    ("FAM22A", "NUTM2A"),
    ("GPR124", "ADGRA2"),
    ("H3F3A", "H3-3A"),
    ("H3F3B", "H3-3B"),
    ("HIST1H3B", "H3C2"),
    ("HIST1H3C", "H3C3"),
    ("MKL1", "MRTFA"),
    ("MKL2", "MRTFB"),
    ("MLL", "KMT2A"),
    ("MLL2", "KMT2D"),
    ("MLL3", "KMT2C"),
    ("WHSC1", "NSD2"),
    ("WHSC1L1", "NSD3"),
];

const AMINO_ACIDS: &[(&str, &str)] = &[
    ("ala", "A"),
    ("arg", "R"),
    ("asn", "N"),
    ("asp", "D"),
    ("cys", "C"),
    ("gln", "Q"),
    ("glu", "E"),
    ("gly", "G"),
    ("his", "H"),
    ("ile", "I"),
    ("leu", "L"),
    ("lys", "K"),
    ("met", "M"),
    ("phe", "F"),
    ("pro", "P"),
    ("ser", "S"),
    ("thr", "T"),
    ("trp", "W"),
    ("tyr", "Y"),
    ("val", "V"),
    ("ter", "*"),
];

const NULL_PLACEHOLDERS: &[&str] = &["na", "n/a", "nd", "none", "-", "--", "–", "—"];

const NEGATIVE_RESULT_WORDS: &[&str] = &["no", "not", "negative", "detected", "none"];

/// Collapses every whitespace run, line breaks included, into one space.
pub fn clean_cell(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses a numeric cell, tolerating thousands separators and `%`.
/// Empty cells and placeholders such as `N/A` give `Ok(None)`.
///
/// # Errors
///
/// Returns the cleaned text when it is not a number.
pub fn parse_number(raw: &str) -> Result<Option<f64>, String> {
    let cleaned = clean_cell(raw);
    if cleaned.is_empty() || NULL_PLACEHOLDERS.contains(&cleaned.to_ascii_lowercase().as_str()) {
        return Ok(None);
    }
    let digits = cleaned
        .chars()
        .filter(|ch| !matches!(ch, ',' | '%') && !ch.is_whitespace())
        .collect::<String>();
    match digits.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(cleaned),
    }
}

pub fn standardize_gene(raw: &str) -> String {
    let symbol = raw
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();
    GENE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == symbol)
        .map_or(symbol, |(_, current)| (*current).to_string())
}

/// Rough shape of a gene symbol as printed in reports: uppercase letters,
/// digits, `-` and `.`, with `orf` the only lowercase allowed.
pub fn is_gene_like(token: &str) -> bool {
    let symbol = token.replace("orf", "");
    symbol.chars().next().is_some_and(|ch| ch.is_ascii_uppercase())
        && token.len() <= 20
        && symbol
            .chars()
            .all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit() || ch == '-' || ch == '.')
}

/// Reads a gene cell. Empty cells and placeholders give `Ok(None)`.
/// A cell split across words is accepted only when every word already
/// looks like part of a symbol, as in `T P53`.
///
/// # Errors
///
/// Returns the cleaned text when the cell is a sentence such as
/// `No reportable variants detected` rather than a gene symbol.
pub fn gene_symbol(raw: &str) -> Result<Option<String>, String> {
    let cleaned = clean_cell(raw);
    if cleaned.is_empty() || NULL_PLACEHOLDERS.contains(&cleaned.to_ascii_lowercase().as_str()) {
        return Ok(None);
    }
    let words = cleaned.split(' ').collect::<Vec<_>>();
    let negative = words
        .iter()
        .any(|word| NEGATIVE_RESULT_WORDS.contains(&word.to_ascii_lowercase().as_str()));
    if negative || (words.len() > 1 && !words.iter().all(|word| is_gene_like(word))) {
        return Err(cleaned);
    }
    let symbol = standardize_gene(&cleaned);
    if is_gene_like(&symbol) {
        Ok(Some(symbol))
    } else {
        Err(cleaned)
    }
}

/// Splits a combined fusion cell such as `EWSR1-FLI1`, `EWSR1::FLI1` or
/// `EWSR1/FLI1` into standardized 5' and 3' partners.
pub fn split_fusion(raw: &str) -> Option<(String, String)> {
    let cleaned = clean_cell(raw);
    let token = cleaned
        .split_whitespace()
        .next()?
        .trim_matches(|ch: char| matches!(ch, '(' | ')' | '[' | ']' | ',' | ';'));

    for separator in ["::", "--", "/"] {
        if let Some((left, right)) = token.split_once(separator) {
            return (is_gene_like(left) && is_gene_like(right))
                .then(|| (standardize_gene(left), standardize_gene(right)));
        }
    }

    token.match_indices('-').find_map(|(index, _)| {
        let (left, right) = (&token[..index], &token[index + 1..]);
        let right_starts_alpha = right.chars().next().is_some_and(|ch| ch.is_ascii_alphabetic());
        (right_starts_alpha && is_gene_like(left) && is_gene_like(right))
            .then(|| (standardize_gene(left), standardize_gene(right)))
    })
}

pub fn copy_state_from_count(copies: u32) -> &'static str {
    match copies {
        0 => "loss (homozygous)",
        1 => "loss",
        2 => "neutral",
        3 => "gain",
        _ => "amplification",
    }
}

pub fn normalize_copy_state(raw: &str) -> String {
    let cleaned = clean_cell(raw);
    if let Ok(copies) = cleaned.parse::<u32>() {
        return copy_state_from_count(copies).to_string();
    }
    let lower = cleaned.to_ascii_lowercase();
    let state = if lower.contains("amplif") {
        "amplification"
    } else if lower.contains("homozygous") && (lower.contains("loss") || lower.contains("del")) {
        "loss (homozygous)"
    } else if lower.contains("gain") || lower.contains("dup") {
        "gain"
    } else if lower.contains("loss") || lower.contains("del") {
        "loss"
    } else if lower.contains("loh") || lower.contains("neutral") {
        "neutral"
    } else {
        return cleaned;
    };
    state.to_string()
}

pub fn normalize_chromosome(raw: &str) -> String {
    let cleaned = clean_cell(raw);
    let has_prefix = cleaned.len() > 3
        && cleaned
            .get(..3)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("chr"));
    let without_prefix = if has_prefix {
        cleaned[3..].trim_start().to_string()
    } else {
        cleaned
    };
    if without_prefix.eq_ignore_ascii_case("x") || without_prefix.eq_ignore_ascii_case("y") {
        without_prefix.to_ascii_uppercase()
    } else {
        without_prefix
    }
}

fn parse_position(raw: &str) -> Option<u64> {
    raw.replace(',', "").parse().ok()
}

/// A genomic segment read from a coordinate or ISCN microarray string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmaRegion {
    pub chromosome: String,
    pub start: u64,
    pub end: u64,
    pub copy_state: Option<String>,
}

/// Compiled patterns for the cell formats that need more than string
/// matching.
#[derive(Debug, Clone)]
pub struct CellPatterns {
    protein_token: Regex,
    three_letter: Regex,
    iscn: Regex,
    coordinate: Regex,
    percent: Regex,
}

impl Default for CellPatterns {
    fn default() -> Self {
        Self::new()
    }
}

impl CellPatterns {
    pub fn new() -> Self {
        Self {
            protein_token: Regex::new(r"(?i)(?:^|[\s(;,])(p\.\(?[A-Za-z*?][^\s,;]*)")
                .expect("hardcoded protein token regex is valid"),
            three_letter: Regex::new(
                r"(?i)ala|arg|asn|asp|cys|gln|glu|gly|his|ile|leu|lys|met|phe|pro|ser|thr|trp|tyr|val|ter",
            )
            .expect("hardcoded amino acid regex is valid"),
            iscn: Regex::new(
                r"(?i)arr(?:\[[^\]]*\])?\s*(\d{1,2}|X|Y)(?:[pq][\d.]*)*\s*\(\s*([\d,]+)\s*[-_]\s*([\d,]+)\s*\)\s*x\s*(\d+)",
            )
            .expect("hardcoded ISCN regex is valid"),
            coordinate: Regex::new(r"(?i)\bchr\s*(\d{1,2}|X|Y)\s*:\s*([\d,]+)\s*[-–_]\s*([\d,]+)")
                .expect("hardcoded coordinate regex is valid"),
            percent: Regex::new(r"^\d+(?:\.\d+)?\s*%$").expect("hardcoded percent regex is valid"),
        }
    }

    /// Normalizes protein nomenclature: `p.(Arg175His)` and `P.ARG175HIS`
    /// both become `p.R175H`. Cells without a `p.` token are only cleaned.
    pub fn standardize_protein(&self, raw: &str) -> String {
        let cleaned = clean_cell(raw);
        let Some(token) = self
            .protein_token
            .captures(&cleaned)
            .and_then(|captures| captures.get(1))
        else {
            return cleaned;
        };

        let body = token.as_str()[2..]
            .chars()
            .filter(|ch| !matches!(ch, '(' | ')'))
            .collect::<String>();
        let converted = self.three_letter.replace_all(&body, |captures: &Captures<'_>| {
            let code = captures[0].to_ascii_lowercase();
            AMINO_ACIDS
                .iter()
                .find(|(three, _)| *three == code)
                .map_or_else(|| captures[0].to_string(), |(_, one)| (*one).to_string())
        });
        format!("p.{converted}")
    }

    pub fn parse_region(&self, raw: &str) -> Option<CmaRegion> {
        if let Some(captures) = self.iscn.captures(raw) {
            let copies = captures[4].parse::<u32>().ok()?;
            return Some(CmaRegion {
                chromosome: captures[1].to_ascii_uppercase(),
                start: parse_position(&captures[2])?,
                end: parse_position(&captures[3])?,
                copy_state: Some(copy_state_from_count(copies).to_string()),
            });
        }

        let captures = self.coordinate.captures(raw)?;
        let lower = raw.to_ascii_lowercase();
        let mentions_state = ["gain", "loss", "amplif", "del", "dup", "loh"]
            .iter()
            .any(|word| lower.contains(word));
        Some(CmaRegion {
            chromosome: captures[1].to_ascii_uppercase(),
            start: parse_position(&captures[2])?,
            end: parse_position(&captures[3])?,
            copy_state: mentions_state.then(|| normalize_copy_state(raw)),
        })
    }

    pub fn is_percent(&self, cell: &str) -> bool {
        self.percent.is_match(cell)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{
        CellPatterns, CmaRegion, GENE_ALIASES, clean_cell, gene_symbol, normalize_chromosome,
        normalize_copy_state, parse_number, split_fusion, standardize_gene,
    };

    #[test]
    fn collapses_line_breaks_inside_cells() {
        assert_eq!(clean_cell(" Likely\nPathogenic \r\n"), "Likely Pathogenic");
    }

    #[test]
    fn parses_percentages_and_thousands_separators() {
        assert_eq!(parse_number("12.5%"), Ok(Some(12.5)));
        assert_eq!(parse_number("138,123,456"), Ok(Some(138_123_456.0)));
        assert_eq!(parse_number(" 40 % "), Ok(Some(40.0)));
        assert_eq!(parse_number("N/A"), Ok(None));
        assert_eq!(parse_number(""), Ok(None));
        assert_eq!(parse_number("<1%"), Err("<1%".to_string()));
    }

    #[test]
    fn gene_standardization_is_idempotent() {
        for raw in ["tp53", " h3f3a ", "MLL", "C11orf95", "KMT2A", "nkx2-1"] {
            let once = standardize_gene(raw);
            assert_eq!(standardize_gene(&once), once, "input {raw:?}");
        }
        assert_eq!(standardize_gene("h3f3a"), "H3-3A");
        assert_eq!(standardize_gene("T P53"), "TP53");
        for (_, current) in GENE_ALIASES {
            assert!(GENE_ALIASES.iter().all(|(alias, _)| alias != current));
        }
    }

    #[test]
    fn gene_cells_reject_negative_result_sentences() {
        assert_eq!(gene_symbol(" tp53 "), Ok(Some("TP53".to_string())));
        assert_eq!(gene_symbol("T P53"), Ok(Some("TP53".to_string())));
        assert_eq!(gene_symbol("C11orf95"), Ok(Some("ZFTA".to_string())));
        assert_eq!(gene_symbol("N/A"), Ok(None));
        assert_eq!(
            gene_symbol("No reportable\nvariants detected"),
            Err("No reportable variants detected".to_string())
        );
        assert_eq!(
            gene_symbol("NONE DETECTED"),
            Err("NONE DETECTED".to_string())
        );
        assert_eq!(gene_symbol("Negative"), Err("Negative".to_string()));
    }

    #[test]
    fn splits_combined_fusion_cells() {
        let expected = Some(("EWSR1".to_string(), "FLI1".to_string()));
        assert_eq!(split_fusion("EWSR1-FLI1"), expected);
        assert_eq!(split_fusion("EWSR1::FLI1 (exon 7::exon 6)"), expected);
        assert_eq!(split_fusion("EWSR1/FLI1"), expected);
        assert_eq!(
            split_fusion("KIAA1549-BRAF"),
            Some(("KIAA1549".to_string(), "BRAF".to_string()))
        );
        assert_eq!(
            split_fusion("NKX2-1-FOXA1"),
            Some(("NKX2-1".to_string(), "FOXA1".to_string()))
        );
        assert_eq!(split_fusion("NKX2-1"), None);
        assert_eq!(split_fusion("in-frame"), None);
    }

    #[test]
    fn converts_three_letter_protein_changes() {
        let patterns = CellPatterns::new();
        assert_eq!(patterns.standardize_protein("p.(Arg175His)"), "p.R175H");
        assert_eq!(patterns.standardize_protein("P.ARG175HIS"), "p.R175H");
        assert_eq!(patterns.standardize_protein("p.Arg213Ter"), "p.R213*");
        assert_eq!(
            patterns.standardize_protein("c.524G>A (p.Arg175His)"),
            "p.R175H"
        );
        assert_eq!(patterns.standardize_protein("c.524G>A"), "c.524G>A");
        for raw in ["p.(Gly12Asp)", "p.V600E", "p.Lys27Met"] {
            let once = patterns.standardize_protein(raw);
            assert_eq!(patterns.standardize_protein(&once), once);
        }
    }

    #[test]
    fn reads_iscn_and_coordinate_regions() {
        let patterns = CellPatterns::new();
        assert_eq!(
            patterns.parse_region("arr[GRCh37] 7q34(138123456_140234567)x3"),
            Some(CmaRegion {
                chromosome: "7".to_string(),
                start: 138_123_456,
                end: 140_234_567,
                copy_state: Some("gain".to_string()),
            })
        );
        assert_eq!(
            patterns
                .parse_region("arr[hg19] 9p21.3(21,800,000-22,100,000)x0")
                .and_then(|region| region.copy_state),
            Some("loss (homozygous)".to_string())
        );
        assert_eq!(
            patterns.parse_region("chr7:138,123,456-140,234,567"),
            Some(CmaRegion {
                chromosome: "7".to_string(),
                start: 138_123_456,
                end: 140_234_567,
                copy_state: None,
            })
        );
        assert_eq!(
            patterns
                .parse_region("chrX:100-200 loss")
                .map(|region| (region.chromosome, region.copy_state)),
            Some(("X".to_string(), Some("loss".to_string())))
        );
        assert_eq!(patterns.parse_region("no region here"), None);
    }

    #[test]
    fn normalizes_copy_states_and_chromosomes() {
        assert_eq!(normalize_copy_state("4"), "amplification");
        assert_eq!(normalize_copy_state("Homozygous deletion"), "loss (homozygous)");
        assert_eq!(normalize_copy_state("Duplication"), "gain");
        assert_eq!(normalize_copy_state("mosaic"), "mosaic");
        assert_eq!(normalize_chromosome("chr7"), "7");
        assert_eq!(normalize_chromosome("chrx"), "X");
        assert_eq!(normalize_chromosome("17"), "17");
    }
}
