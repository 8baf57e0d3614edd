use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

pub const CELL_WIDTH: i64 = 120;
pub const ROW_HEIGHT: i64 = 20;
const LEFT: i64 = 50;
const TOP: i64 = 700;

/// One fixture page: free text lines from the top of the page and an
/// optional ruled table drawn below them.
#[derive(Default)]
pub struct FixturePage<'a> {
    pub lines: Vec<&'a str>,
    pub table: Vec<Vec<&'a str>>,
}

impl<'a> FixturePage<'a> {
    pub fn text(lines: &[&'a str]) -> Self {
        Self {
            lines: lines.to_vec(),
            table: Vec::new(),
        }
    }

    pub fn with_table(mut self, rows: &[Vec<&'a str>]) -> Self {
        self.table = rows.to_vec();
        self
    }
}

fn text_operations(lines: &[&str]) -> Vec<Operation> {
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), Object::Integer(12)]),
        Operation::new("TL", vec![Object::Integer(16)]),
        Operation::new("Td", vec![Object::Integer(50), Object::Integer(780)]),
    ];
    for (index, line) in lines.iter().enumerate() {
        operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        if index + 1 < lines.len() {
            operations.push(Operation::new("T*", vec![]));
        }
    }
    operations.push(Operation::new("ET", vec![]));
    operations
}

fn rule(operations: &mut Vec<Operation>, from: (i64, i64), to: (i64, i64)) {
    operations.push(Operation::new(
        "m",
        vec![Object::Integer(from.0), Object::Integer(from.1)],
    ));
    operations.push(Operation::new(
        "l",
        vec![Object::Integer(to.0), Object::Integer(to.1)],
    ));
    operations.push(Operation::new("S", vec![]));
}

fn table_operations(rows: &[Vec<&str>]) -> Vec<Operation> {
    let mut operations = Vec::new();
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    if rows.is_empty() || columns == 0 {
        return operations;
    }

    let row_count = i64::try_from(rows.len()).expect("fixture row count fits");
    let column_count = i64::try_from(columns).expect("fixture column count fits");
    let right = LEFT + column_count * CELL_WIDTH;
    let bottom = TOP - row_count * ROW_HEIGHT;

    operations.push(Operation::new("w", vec![Object::Integer(1)]));
    for row in 0..=row_count {
        let y = TOP - row * ROW_HEIGHT;
        rule(&mut operations, (LEFT, y), (right, y));
    }
    for column in 0..=column_count {
        let x = LEFT + column * CELL_WIDTH;
        rule(&mut operations, (x, TOP), (x, bottom));
    }

    for (row_index, row) in rows.iter().enumerate() {
        let row_index = i64::try_from(row_index).expect("fixture row index fits");
        for (column_index, cell) in row.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            let column_index = i64::try_from(column_index).expect("fixture column index fits");
            operations.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), Object::Integer(9)]),
                Operation::new(
                    "Td",
                    vec![
                        Object::Integer(LEFT + column_index * CELL_WIDTH + 4),
                        Object::Integer(TOP - row_index * ROW_HEIGHT - 14),
                    ],
                ),
                Operation::new("Tj", vec![Object::string_literal(*cell)]),
                Operation::new("ET", vec![]),
            ]);
        }
    }
    operations
}

pub fn create_fixture_pdf(
    path: &Path,
    pages: &[FixturePage<'_>],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut page_ids = Vec::new();
    for page in pages {
        let mut operations = text_operations(&page.lines);
        operations.extend(table_operations(&page.table));

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id);
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|id| (*id).into()).collect::<Vec<_>>(),
            "Count" => i64::try_from(page_ids.len())?,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    doc.save(path)?;
    Ok(())
}
