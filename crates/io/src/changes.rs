// The "changes" workbook: one block per event, rebuilt on every write
//
// Layout: № | event name | term | item name | amount | one column per
// category | total. A block is a header row (number, name, term, totals)
// followed by its item rows; the header columns are merged down the block.
// Rows already in the file are read back and written after the new blocks.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use log::{debug, info};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use zalyshok_engine::CellValue;
use zalyshok_recon::config::CategoryConfig;
use zalyshok_recon::{OutputBlock, RowKind};

use crate::error::IoError;

pub const SHEET_NAME: &str = "Зміни";
const FONT_NAME: &str = "Times New Roman";
const FONT_SIZE: f64 = 12.0;
const AMOUNT_FORMAT: &str = "#,##0.00";
const LEFTOVER_FILL: u32 = 0xFFFF00;

const COL_NUMBER: u16 = 0;
const COL_NAME: u16 = 1;
const COL_TERM: u16 = 2;
const COL_ITEM: u16 = 3;
const COL_AMOUNT: u16 = 4;
const FIRST_CATEGORY_COL: u16 = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub blocks_written: usize,
    pub rows_written: usize,
    pub rows_preserved: usize,
}

/// A block read back from an existing changes workbook.
#[derive(Debug, Clone, PartialEq)]
struct PreservedBlock {
    rows: Vec<Vec<Option<CellValue>>>,
}

struct Styles {
    header: Format,
    text: Format,
    amount: Format,
    merged_text: Format,
    merged_amount: Format,
    leftover_text: Format,
    leftover_amount: Format,
}

impl Styles {
    fn new() -> Self {
        let base = Format::new()
            .set_border(FormatBorder::Thin)
            .set_font_name(FONT_NAME)
            .set_font_size(FONT_SIZE)
            .set_text_wrap();
        let amount = base.clone().set_num_format(AMOUNT_FORMAT);
        Self {
            header: base.clone().set_bold().set_align(FormatAlign::Center),
            merged_text: base.clone().set_align(FormatAlign::VerticalCenter),
            merged_amount: amount.clone().set_align(FormatAlign::VerticalCenter),
            leftover_text: base.clone().set_background_color(Color::RGB(LEFTOVER_FILL)),
            leftover_amount: amount.clone().set_background_color(Color::RGB(LEFTOVER_FILL)),
            text: base,
            amount,
        }
    }
}

/// Column headers for the configured categories.
pub fn header_row(categories: &[CategoryConfig]) -> Vec<String> {
    let mut header: Vec<String> = ["№", "Назва заходу", "Термін та місце проведення", "Назва предмета", "Сума"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    header.extend(categories.iter().map(|c| c.label.clone()));
    header.push("Загальна сума видатків".to_string());
    header
}

fn total_col(categories: &[CategoryConfig]) -> u16 {
    FIRST_CATEGORY_COL + categories.len() as u16
}

/// Columns merged down a block.
fn merged_cols(categories: &[CategoryConfig]) -> Vec<u16> {
    let mut cols = vec![COL_NUMBER, COL_NAME, COL_TERM];
    cols.extend(FIRST_CATEGORY_COL..=total_col(categories));
    cols
}

fn is_amount_col(col: u16) -> bool {
    col == COL_AMOUNT || col >= FIRST_CATEGORY_COL
}

fn cents(amount_cents: i64) -> f64 {
    amount_cents as f64 / 100.0
}

/// Write `blocks` to `path`, keeping the data rows of an existing file after them.
pub fn write_changes(
    path: &Path,
    blocks: &[OutputBlock],
    categories: &[CategoryConfig],
) -> Result<WriteSummary, IoError> {
    let width = total_col(categories) as usize + 1;
    let preserved = if path.exists() { read_existing(path, width)? } else { Vec::new() };
    let write_err = |e: rust_xlsxwriter::XlsxError| IoError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let styles = Styles::new();
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet().set_name(SHEET_NAME).map_err(write_err)?;
    set_column_widths(worksheet, categories).map_err(write_err)?;

    for (col, title) in header_row(categories).iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, title, &styles.header)
            .map_err(write_err)?;
    }

    let mut summary = WriteSummary::default();
    let mut row: u32 = 1;
    for block in blocks {
        write_block(worksheet, row, block, categories, &styles).map_err(write_err)?;
        row += block.height() as u32;
        summary.blocks_written += 1;
        summary.rows_written += block.height();
    }
    for block in &preserved {
        write_preserved(worksheet, row, block, categories, &styles).map_err(write_err)?;
        row += block.rows.len() as u32;
        summary.rows_preserved += block.rows.len();
    }

    workbook.save(path).map_err(write_err)?;
    info!(
        "wrote {}: {} blocks, {} rows, {} preserved",
        path.display(),
        summary.blocks_written,
        summary.rows_written,
        summary.rows_preserved
    );
    Ok(summary)
}

fn set_column_widths(
    worksheet: &mut Worksheet,
    categories: &[CategoryConfig],
) -> Result<(), rust_xlsxwriter::XlsxError> {
    for (col, width) in [(COL_NUMBER, 6.0), (COL_NAME, 40.0), (COL_TERM, 28.0), (COL_ITEM, 45.0), (COL_AMOUNT, 16.0)] {
        worksheet.set_column_width(col, width)?;
    }
    for col in FIRST_CATEGORY_COL..=total_col(categories) {
        worksheet.set_column_width(col, 18.0)?;
    }
    Ok(())
}

fn write_block(
    worksheet: &mut Worksheet,
    first_row: u32,
    block: &OutputBlock,
    categories: &[CategoryConfig],
    styles: &Styles,
) -> Result<(), rust_xlsxwriter::XlsxError> {
    let last_row = first_row + block.rows.len() as u32;
    let merged = last_row > first_row;

    // merge_range() blanks the whole range; the origin cell is written after.
    if merged {
        for col in merged_cols(categories) {
            let format = if is_amount_col(col) { &styles.merged_amount } else { &styles.merged_text };
            worksheet.merge_range(first_row, col, last_row, col, "", format)?;
        }
    }
    let (text, amount) = if merged {
        (&styles.merged_text, &styles.merged_amount)
    } else {
        (&styles.text, &styles.amount)
    };

    match block.number {
        Some(n) => worksheet.write_number_with_format(first_row, COL_NUMBER, n as f64, text)?,
        None => worksheet.write_blank(first_row, COL_NUMBER, text)?,
    };
    worksheet.write_string_with_format(first_row, COL_NAME, &block.name, text)?;
    worksheet.write_string_with_format(first_row, COL_TERM, &block.term, text)?;
    worksheet.write_blank(first_row, COL_ITEM, &styles.text)?;
    worksheet.write_blank(first_row, COL_AMOUNT, &styles.amount)?;
    for (i, total) in block.category_totals.iter().enumerate() {
        worksheet.write_number_with_format(first_row, FIRST_CATEGORY_COL + i as u16, cents(*total), amount)?;
    }
    worksheet.write_number_with_format(first_row, total_col(categories), cents(block.total_cents), amount)?;

    for (offset, item) in block.rows.iter().enumerate() {
        let row = first_row + 1 + offset as u32;
        let (text, amount) = match item.kind {
            RowKind::Leftover => (&styles.leftover_text, &styles.leftover_amount),
            RowKind::Item => (&styles.text, &styles.amount),
        };
        worksheet.write_string_with_format(row, COL_ITEM, &item.name, text)?;
        worksheet.write_number_with_format(row, COL_AMOUNT, cents(item.amount_cents), amount)?;
    }
    debug!("block '{}' at row {}: {} items", block.name, first_row + 1, block.rows.len());
    Ok(())
}

fn write_preserved(
    worksheet: &mut Worksheet,
    first_row: u32,
    block: &PreservedBlock,
    categories: &[CategoryConfig],
    styles: &Styles,
) -> Result<(), rust_xlsxwriter::XlsxError> {
    let last_row = first_row + block.rows.len() as u32 - 1;
    let merged = last_row > first_row && starts_block(&block.rows[0]);
    if merged {
        for col in merged_cols(categories) {
            let format = if is_amount_col(col) { &styles.merged_amount } else { &styles.merged_text };
            worksheet.merge_range(first_row, col, last_row, col, "", format)?;
        }
    }

    let merged_set = merged_cols(categories);
    for (offset, cells) in block.rows.iter().enumerate() {
        let row = first_row + offset as u32;
        let leftover = matches!(
            cells.get(COL_ITEM as usize),
            Some(Some(CellValue::Text(name))) if categories.iter().any(|c| &c.leftover_name == name)
        );
        for (col, cell) in cells.iter().enumerate() {
            let col = col as u16;
            let covered = merged && offset > 0 && merged_set.contains(&col);
            if covered {
                continue;
            }
            let format = match (leftover && !merged_set.contains(&col), is_amount_col(col)) {
                (true, true) => &styles.leftover_amount,
                (true, false) => &styles.leftover_text,
                (false, true) if merged && merged_set.contains(&col) => &styles.merged_amount,
                (false, false) if merged && merged_set.contains(&col) => &styles.merged_text,
                (false, true) => &styles.amount,
                (false, false) => &styles.text,
            };
            match cell {
                Some(CellValue::Number(n)) => worksheet.write_number_with_format(row, col, *n, format)?,
                Some(value) => worksheet.write_string_with_format(row, col, value.as_text(), format)?,
                None => worksheet.write_blank(row, col, format)?,
            };
        }
    }
    Ok(())
}

fn starts_block(cells: &[Option<CellValue>]) -> bool {
    cells.get(COL_NUMBER as usize).is_some_and(Option::is_some)
        || cells.get(COL_NAME as usize).is_some_and(Option::is_some)
}

/// Data rows of an existing changes workbook, grouped back into blocks.
fn read_existing(path: &Path, width: usize) -> Result<Vec<PreservedBlock>, IoError> {
    let read_err = |message: String| IoError::Read { path: path.to_path_buf(), message };
    let mut workbook = open_workbook_auto(path).map_err(|e| read_err(e.to_string()))?;
    let Some(name) = workbook.sheet_names().first().cloned() else {
        return Ok(Vec::new());
    };
    let range = workbook.worksheet_range(&name).map_err(|e| read_err(e.to_string()))?;
    let Some((start_row, start_col)) = range.start() else {
        return Ok(Vec::new());
    };

    let mut blocks: Vec<PreservedBlock> = Vec::new();
    for (offset, source) in range.rows().enumerate() {
        let row = start_row as usize + offset;
        if row == 0 {
            continue; // header
        }
        let mut cells: Vec<Option<CellValue>> = vec![None; width];
        for (i, cell) in source.iter().enumerate() {
            let col = start_col as usize + i;
            if col < width {
                cells[col] = preserved_value(cell);
            }
        }
        if cells.iter().all(Option::is_none) {
            continue;
        }
        match blocks.last_mut() {
            Some(block) if !starts_block(&cells) => block.rows.push(cells),
            _ => blocks.push(PreservedBlock { rows: vec![cells] }),
        }
    }

    debug!("{}: {} existing blocks read back", path.display(), blocks.len());
    Ok(blocks)
}

fn preserved_value(cell: &Data) -> Option<CellValue> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Some(CellValue::Text(s.clone())),
        Data::Float(n) => Some(CellValue::Number(*n)),
        Data::Int(n) => Some(CellValue::Number(*n as f64)),
        Data::Bool(b) => Some(CellValue::Bool(*b)),
        Data::DateTime(dt) => Some(CellValue::Number(dt.as_f64())),
    }
}
