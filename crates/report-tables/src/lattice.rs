//! Bordered-table detection from drawn ruling lines.
//!
//! The page content stream is walked once. Stroked or filled path segments
//! that are horizontal or vertical become ruling lines; shown strings become
//! text runs anchored at their starting point. Rulings that touch each other
//! form one grid, and every text run is placed into the grid cell that
//! contains its anchor.

use std::collections::BTreeMap;

use lopdf::content::Operation;
use lopdf::{Document, Object, ObjectId};

use crate::model::{DetectedTable, TableOrigin};
use crate::pdf_reader::collect_shown_text;

const SNAP_TOLERANCE: f32 = 2.0;
const ORIENTATION_TOLERANCE: f32 = 1.0;
/// Rough glyph advance in em units, used only to keep consecutive shows on
/// one line moving rightwards.
const APPROX_GLYPH_ADVANCE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PageBox {
    pub width: f32,
    pub height: f32,
}

impl PageBox {
    pub(crate) const LETTER: Self = Self {
        width: 612.0,
        height: 792.0,
    };
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

fn pair(operands: &[Object], at: usize) -> Option<(f32, f32)> {
    Some((number(operands.get(at)?)?, number(operands.get(at + 1)?)?))
}

/// Resolves the page's `MediaBox`, following inherited values up the page
/// tree.
pub(crate) fn page_box(document: &Document, page_id: ObjectId) -> PageBox {
    let mut current = Some(page_id);
    let mut hops = 0;
    while let Some(id) = current {
        let Ok(dict) = document.get_dictionary(id) else {
            break;
        };
        if let Ok(object) = dict.get(b"MediaBox") {
            let resolved = match object {
                Object::Reference(reference) => document.get_object(*reference).ok(),
                other => Some(other),
            };
            if let Some(Object::Array(values)) = resolved {
                let coords = values.iter().filter_map(number).collect::<Vec<_>>();
                if coords.len() == 4 {
                    return PageBox {
                        width: (coords[2] - coords[0]).abs(),
                        height: (coords[3] - coords[1]).abs(),
                    };
                }
            }
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        hops += 1;
        if hops > 32 {
            break;
        }
    }
    PageBox::LETTER
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn translation(tx: f32, ty: f32) -> Self {
        Self {
            e: tx,
            f: ty,
            ..Self::IDENTITY
        }
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        let values = operands.iter().filter_map(number).collect::<Vec<_>>();
        if values.len() != 6 {
            return None;
        }
        Some(Self {
            a: values[0],
            b: values[1],
            c: values[2],
            d: values[3],
            e: values[4],
            f: values[5],
        })
    }

    /// `self × other` in PDF's row-vector convention: apply `self` first.
    fn then(self, other: Self) -> Self {
        Self {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn apply(self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Ruling {
    Horizontal { y: f32, from: f32, to: f32 },
    Vertical { x: f32, from: f32, to: f32 },
}

impl Ruling {
    fn from_points((x1, y1): (f32, f32), (x2, y2): (f32, f32)) -> Option<Self> {
        if (y2 - y1).abs() <= ORIENTATION_TOLERANCE {
            Some(Self::Horizontal {
                y: (y1 + y2) / 2.0,
                from: x1.min(x2),
                to: x1.max(x2),
            })
        } else if (x2 - x1).abs() <= ORIENTATION_TOLERANCE {
            Some(Self::Vertical {
                x: (x1 + x2) / 2.0,
                from: y1.min(y2),
                to: y1.max(y2),
            })
        } else {
            None
        }
    }

    fn span(self) -> (f32, f32, f32) {
        match self {
            Self::Horizontal { y, from, to } => (y, from, to),
            Self::Vertical { x, from, to } => (x, from, to),
        }
    }

    fn length(self) -> f32 {
        let (_, from, to) = self.span();
        to - from
    }

    fn touches(self, other: Self) -> bool {
        let within = |value: f32, from: f32, to: f32| {
            value >= from - SNAP_TOLERANCE && value <= to + SNAP_TOLERANCE
        };
        match (self, other) {
            (Self::Horizontal { y, from, to }, Self::Vertical { x, from: bottom, to: top })
            | (Self::Vertical { x, from: bottom, to: top }, Self::Horizontal { y, from, to }) => {
                within(x, from, to) && within(y, bottom, top)
            }
            _ => {
                let (position, from, to) = self.span();
                let (other_position, other_from, other_to) = other.span();
                (position - other_position).abs() <= SNAP_TOLERANCE
                    && from <= other_to + SNAP_TOLERANCE
                    && other_from <= to + SNAP_TOLERANCE
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct TextRun {
    x: f32,
    y: f32,
    text: String,
}

#[derive(Debug, Default)]
struct PageScan {
    segments: Vec<((f32, f32), (f32, f32))>,
    runs: Vec<TextRun>,
}

struct TextState<'a> {
    matrix: Matrix,
    line_matrix: Matrix,
    leading: f32,
    font_size: f32,
    encoding: Option<&'a str>,
}

impl TextState<'_> {
    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translation(tx, ty).then(self.line_matrix);
        self.matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }
}

#[allow(clippy::cast_precision_loss)]
fn show_text(text: &mut TextState<'_>, ctm: Matrix, operands: &[Object], runs: &mut Vec<TextRun>) {
    let mut shown = String::new();
    collect_shown_text(&mut shown, text.encoding, operands);
    let (x, y) = text.matrix.then(ctm).apply(0.0, 0.0);
    let trimmed = shown.trim();
    if !trimmed.is_empty() {
        runs.push(TextRun {
            x,
            y,
            text: trimmed.to_string(),
        });
    }
    let advance = shown.chars().count() as f32 * text.font_size * APPROX_GLYPH_ADVANCE;
    text.matrix = Matrix::translation(advance, 0.0).then(text.matrix);
}

#[allow(clippy::too_many_lines)]
fn scan_operations(operations: &[Operation], encodings: &BTreeMap<Vec<u8>, &str>) -> PageScan {
    let mut scan = PageScan::default();
    let mut ctm = Matrix::IDENTITY;
    let mut saved = Vec::new();
    let mut path: Vec<((f32, f32), (f32, f32))> = Vec::new();
    let mut current: Option<(f32, f32)> = None;
    let mut subpath_start: Option<(f32, f32)> = None;
    let mut text = TextState {
        matrix: Matrix::IDENTITY,
        line_matrix: Matrix::IDENTITY,
        leading: 0.0,
        font_size: 12.0,
        encoding: None,
    };

    for operation in operations {
        let operands = operation.operands.as_slice();
        match operation.operator.as_str() {
            "q" => saved.push(ctm),
            "Q" => {
                if let Some(matrix) = saved.pop() {
                    ctm = matrix;
                }
            }
            "cm" => {
                if let Some(matrix) = Matrix::from_operands(operands) {
                    ctm = matrix.then(ctm);
                }
            }
            "m" => {
                if let Some((x, y)) = pair(operands, 0) {
                    let point = ctm.apply(x, y);
                    current = Some(point);
                    subpath_start = Some(point);
                }
            }
            "l" => {
                if let (Some(from), Some((x, y))) = (current, pair(operands, 0)) {
                    let to = ctm.apply(x, y);
                    path.push((from, to));
                    current = Some(to);
                }
            }
            "re" => {
                if let (Some((x, y)), Some((w, h))) = (pair(operands, 0), pair(operands, 2)) {
                    let corners = [
                        ctm.apply(x, y),
                        ctm.apply(x + w, y),
                        ctm.apply(x + w, y + h),
                        ctm.apply(x, y + h),
                    ];
                    for index in 0..corners.len() {
                        path.push((corners[index], corners[(index + 1) % corners.len()]));
                    }
                    current = Some(corners[0]);
                    subpath_start = Some(corners[0]);
                }
            }
            "h" => {
                if let (Some(from), Some(to)) = (current, subpath_start) {
                    path.push((from, to));
                    current = Some(to);
                }
            }
            "s" | "b" | "b*" => {
                if let (Some(from), Some(to)) = (current, subpath_start) {
                    path.push((from, to));
                }
                scan.segments.append(&mut path);
                current = None;
            }
            "S" | "f" | "F" | "f*" | "B" | "B*" => {
                scan.segments.append(&mut path);
                current = None;
            }
            "n" => {
                path.clear();
                current = None;
            }
            "BT" => {
                text.matrix = Matrix::IDENTITY;
                text.line_matrix = Matrix::IDENTITY;
            }
            "Tf" => {
                text.encoding = operands
                    .first()
                    .and_then(|operand| operand.as_name().ok())
                    .and_then(|name| encodings.get(name).copied());
                if let Some(size) = operands.get(1).and_then(number) {
                    text.font_size = size;
                }
            }
            "TL" => {
                if let Some(leading) = operands.first().and_then(number) {
                    text.leading = leading;
                }
            }
            "Td" => {
                if let Some((tx, ty)) = pair(operands, 0) {
                    text.move_line(tx, ty);
                }
            }
            "TD" => {
                if let Some((tx, ty)) = pair(operands, 0) {
                    text.leading = -ty;
                    text.move_line(tx, ty);
                }
            }
            "T*" => text.next_line(),
            "Tm" => {
                if let Some(matrix) = Matrix::from_operands(operands) {
                    text.matrix = matrix;
                    text.line_matrix = matrix;
                }
            }
            "Tj" | "TJ" => show_text(&mut text, ctm, operands, &mut scan.runs),
            "'" => {
                text.next_line();
                show_text(&mut text, ctm, operands, &mut scan.runs);
            }
            "\"" => {
                text.next_line();
                show_text(&mut text, ctm, operands.get(2..).unwrap_or(&[]), &mut scan.runs);
            }
            _ => {}
        }
    }

    scan
}

#[allow(clippy::cast_precision_loss)]
fn rulings(
    segments: &[((f32, f32), (f32, f32))],
    page: PageBox,
    line_scale: u32,
) -> Vec<Ruling> {
    let scale = line_scale.max(1) as f32;
    let min_horizontal = page.width / scale;
    let min_vertical = page.height / scale;
    segments
        .iter()
        .filter_map(|(from, to)| Ruling::from_points(*from, *to))
        .filter(|ruling| match ruling {
            Ruling::Horizontal { .. } => ruling.length() >= min_horizontal,
            Ruling::Vertical { .. } => ruling.length() >= min_vertical,
        })
        .collect()
}

fn connected_groups(rulings: &[Ruling]) -> Vec<Vec<Ruling>> {
    fn root(parent: &mut [usize], mut index: usize) -> usize {
        while parent[index] != index {
            parent[index] = parent[parent[index]];
            index = parent[index];
        }
        index
    }

    let mut parent = (0..rulings.len()).collect::<Vec<_>>();
    for left in 0..rulings.len() {
        for right in left + 1..rulings.len() {
            if rulings[left].touches(rulings[right]) {
                let a = root(&mut parent, left);
                let b = root(&mut parent, right);
                if a != b {
                    parent[b] = a;
                }
            }
        }
    }

    let mut groups: BTreeMap<usize, Vec<Ruling>> = BTreeMap::new();
    for (index, ruling) in rulings.iter().enumerate() {
        let group = root(&mut parent, index);
        groups.entry(group).or_default().push(*ruling);
    }
    groups.into_values().collect()
}

#[allow(clippy::cast_precision_loss)]
fn cluster_positions(mut values: Vec<f32>) -> Vec<f32> {
    values.sort_by(f32::total_cmp);
    let mut clusters: Vec<(f32, usize, f32)> = Vec::new();
    for value in values {
        if let Some((sum, count, last)) = clusters.last_mut() {
            if value - *last <= SNAP_TOLERANCE {
                *sum += value;
                *count += 1;
                *last = value;
                continue;
            }
        }
        clusters.push((value, 1, value));
    }
    clusters
        .into_iter()
        .map(|(sum, count, _)| sum / count as f32)
        .collect()
}

fn cell_text(mut runs: Vec<&TextRun>) -> String {
    runs.sort_by(|left, right| right.y.total_cmp(&left.y).then(left.x.total_cmp(&right.x)));
    let mut out = String::new();
    let mut previous_y: Option<f32> = None;
    for run in runs {
        if let Some(y) = previous_y {
            out.push(if (y - run.y).abs() <= SNAP_TOLERANCE {
                ' '
            } else {
                '\n'
            });
        }
        out.push_str(&run.text);
        previous_y = Some(run.y);
    }
    out
}

fn grid_table(
    page_number: u32,
    group: &[Ruling],
    runs: &[TextRun],
    min_cols: usize,
) -> Option<(f32, f32, DetectedTable)> {
    let xs = cluster_positions(
        group
            .iter()
            .filter_map(|ruling| match ruling {
                Ruling::Vertical { x, .. } => Some(*x),
                Ruling::Horizontal { .. } => None,
            })
            .collect(),
    );
    let mut ys = cluster_positions(
        group
            .iter()
            .filter_map(|ruling| match ruling {
                Ruling::Horizontal { y, .. } => Some(*y),
                Ruling::Vertical { .. } => None,
            })
            .collect(),
    );
    ys.reverse();

    if xs.len() < 2 || ys.len() < 2 || xs.len() - 1 < min_cols {
        return None;
    }

    let cols = xs.len() - 1;
    let rows = ys.len() - 1;
    let mut cells: Vec<Vec<Vec<&TextRun>>> = vec![vec![Vec::new(); cols]; rows];
    for run in runs {
        let column = (0..cols).find(|&c| run.x >= xs[c] - SNAP_TOLERANCE && run.x < xs[c + 1]);
        let row = (0..rows).find(|&r| run.y <= ys[r] + SNAP_TOLERANCE && run.y > ys[r + 1]);
        if let (Some(column), Some(row)) = (column, row) {
            cells[row][column].push(run);
        }
    }

    let table_rows = cells
        .into_iter()
        .map(|row| row.into_iter().map(cell_text).collect::<Vec<_>>())
        .filter(|row| row.iter().any(|cell| !cell.is_empty()))
        .collect::<Vec<_>>();
    if table_rows.is_empty() {
        return None;
    }

    Some((
        ys[0],
        xs[0],
        DetectedTable {
            page: page_number,
            rows: table_rows,
            confidence: 1.0,
            origin: TableOrigin::RulingGrid,
        },
    ))
}

/// Detects every ruled table on one page, top to bottom.
pub(crate) fn detect_grid_tables(
    page_number: u32,
    operations: &[Operation],
    encodings: &BTreeMap<Vec<u8>, &str>,
    page: PageBox,
    line_scale: u32,
    min_cols: usize,
) -> Vec<DetectedTable> {
    let scan = scan_operations(operations, encodings);
    let rulings = rulings(&scan.segments, page, line_scale);
    if rulings.is_empty() {
        tracing::debug!(page = page_number, "no ruling lines on page");
        return Vec::new();
    }

    let mut tables = connected_groups(&rulings)
        .iter()
        .filter_map(|group| grid_table(page_number, group, &scan.runs, min_cols))
        .collect::<Vec<_>>();
    tables.sort_by(|left, right| right.0.total_cmp(&left.0).then(left.1.total_cmp(&right.1)));

    tracing::debug!(
        page = page_number,
        rulings = rulings.len(),
        tables = tables.len(),
        "ruled tables detected"
    );
    tables.into_iter().map(|(_, _, table)| table).collect()
}
