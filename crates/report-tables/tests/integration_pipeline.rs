mod common;

use common::{FixturePage, create_fixture_pdf};
use report_tables::{
    ExtractError, ExtractOptions, Flavor, PageSelection, PdfSource, TableOrigin, WarningCode,
    extract_tables, extract_tables_from_bytes,
};
use tempfile::tempdir;

#[test]
fn bordered_flavor_recovers_ruled_variant_table() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("OncoKids_2022_S22-1234.pdf");

    create_fixture_pdf(
        &input,
        &[FixturePage::text(&["OncoKids Cancer Panel  S22-1234"]).with_table(&[
            vec!["Gene", "Mutation", "VAF", "Classification"],
            vec!["TP53", "p.R175H", "12.5%", "Likely Pathogenic"],
        ])],
    )
    .expect("PDF fixture should be created");

    let extraction =
        extract_tables(&input, &ExtractOptions::default()).expect("extraction should succeed");

    assert_eq!(extraction.tables.len(), 1, "warnings: {:?}", extraction.warnings);
    let table = &extraction.tables[0];
    assert_eq!(table.page, 1);
    assert_eq!(table.origin, TableOrigin::RulingGrid);
    assert_eq!(
        table.rows,
        vec![
            vec!["Gene", "Mutation", "VAF", "Classification"],
            vec!["TP53", "p.R175H", "12.5%", "Likely Pathogenic"],
        ]
    );
}

#[test]
fn bordered_flavor_reports_no_tables_for_unruled_text() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("narrative.pdf");

    create_fixture_pdf(
        &input,
        &[FixturePage::text(&["Gene  Mutation  VAF", "TP53  p.R175H  12.5%"])],
    )
    .expect("PDF fixture should be created");

    let extraction =
        extract_tables(&input, &ExtractOptions::default()).expect("extraction should succeed");
    assert!(extraction.tables.is_empty());
    assert!(
        extraction
            .warnings
            .iter()
            .any(|warning| warning.code == WarningCode::NoTablesDetected)
    );
}

#[test]
fn whitespace_flavor_reads_tables_from_page_text() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("stream.pdf");

    create_fixture_pdf(
        &input,
        &[
            FixturePage::text(&["Gene  Mutation  VAF", "TP53  p.R175H  12.5%", "NRAS  p.Q61K  40%"]),
            FixturePage::text(&["No findings on this page."]),
        ],
    )
    .expect("PDF fixture should be created");

    let options = ExtractOptions {
        flavor: Flavor::Whitespace,
        ..ExtractOptions::default()
    };
    let extraction = extract_tables(&input, &options).expect("extraction should succeed");

    assert_eq!(extraction.tables.len(), 1, "tables: {:?}", extraction.tables);
    assert_eq!(extraction.tables[0].origin, TableOrigin::Whitespace);
    assert!(
        extraction.tables[0]
            .rows
            .iter()
            .any(|row| row.iter().any(|cell| cell == "p.R175H")),
        "tables: {:?}",
        extraction.tables
    );
}

#[test]
fn page_selection_limits_detection() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("two-tables.pdf");

    create_fixture_pdf(
        &input,
        &[
            FixturePage::default().with_table(&[vec!["Gene", "Fusion"], vec!["EWSR1", "FLI1"]]),
            FixturePage::default().with_table(&[vec!["Chromosome", "Copy State"], vec!["7", "Gain"]]),
        ],
    )
    .expect("PDF fixture should be created");

    let options = ExtractOptions {
        pages: Some("2".parse::<PageSelection>().expect("selection should parse")),
        ..ExtractOptions::default()
    };
    let extraction = extract_tables(&input, &options).expect("extraction should succeed");
    assert_eq!(extraction.tables.len(), 1);
    assert_eq!(extraction.tables[0].page, 2);
    assert_eq!(extraction.tables[0].rows[1], vec!["7", "Gain"]);
}

#[test]
fn malformed_bytes_fail_to_load() {
    let err = extract_tables_from_bytes(b"%PDF-1.5 not really a pdf", &ExtractOptions::default())
        .expect_err("garbage should not parse");
    assert!(matches!(err, ExtractError::PdfLoad(_)), "error: {err:?}");
}

#[test]
fn writes_page_ranges_as_standalone_documents() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("combined.pdf");
    let output = dir.path().join("S22-1234.pdf");

    create_fixture_pdf(
        &input,
        &[
            FixturePage::text(&["Cover sheet"]),
            FixturePage::text(&["OncoKids  S22-1234"]),
            FixturePage::text(&["Results continued"]),
        ],
    )
    .expect("PDF fixture should be created");

    let source = PdfSource::open(&input).expect("combined PDF should load");
    assert_eq!(source.page_count(), 3);
    assert!(source.pages()[1].text.contains("S22-1234"));

    source
        .write_page_range(2, 3, &output)
        .expect("range should be written");

    let written = PdfSource::open(&output).expect("written PDF should load");
    assert_eq!(written.page_count(), 2);
    assert!(written.pages()[0].text.contains("S22-1234"));
    assert!(written.pages()[1].text.contains("Results continued"));
}

#[test]
fn rejects_page_ranges_outside_the_document() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("short.pdf");

    create_fixture_pdf(&input, &[FixturePage::text(&["only page"])])
        .expect("PDF fixture should be created");
    let source = PdfSource::open(&input).expect("PDF should load");

    let err = source
        .write_page_range(1, 4, &dir.path().join("out.pdf"))
        .expect_err("range past the end should fail");
    assert!(matches!(
        err,
        ExtractError::InvalidPageRange {
            start: 1,
            end: 4,
            page_count: 1
        }
    ));
}
