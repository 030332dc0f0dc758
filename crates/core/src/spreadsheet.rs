use crate::row::Row;
use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{NaiveDateTime, Timelike};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Reads the first worksheet (or a CSV/TSV file). The first line is the header; blank cells are omitted.
pub fn read_rows(path: &Path) -> Result<Vec<Row>> {
    let ext = path
        .extension()
        .map(|v| v.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "csv" => read_delimited_file(path, b','),
        "tsv" => read_delimited_file(path, b'\t'),
        _ => read_workbook(path),
    }
}

pub fn read_workbook(path: &Path) -> Result<Vec<Row>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("无法打开表格文件: {}", path.display()))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .with_context(|| format!("工作簿中没有工作表: {}", path.display()))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("无法读取工作表: {sheet_name}"))?;

    let mut lines = range.rows();
    let Some(header) = lines.next() else {
        return Ok(Vec::new());
    };
    let columns = header_names(header.iter().map(cell_text));

    Ok(lines
        .filter_map(|cells| build_row(&columns, cells.iter().map(cell_text)))
        .collect())
}

pub fn read_delimited_file(path: &Path, delimiter: u8) -> Result<Vec<Row>> {
    let file = File::open(path)
        .with_context(|| format!("无法打开表格文件: {}", path.display()))?;
    read_delimited(file, delimiter)
        .with_context(|| format!("表格文件解析失败: {}", path.display()))
}

pub fn read_delimited<R: Read>(reader: R, delimiter: u8) -> Result<Vec<Row>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(reader);

    let columns = header_names(
        csv_reader
            .headers()
            .context("无法读取表头")?
            .iter()
            .map(str::to_string),
    );

    let mut rows = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record.with_context(|| format!("第{}行解析失败", index + 2))?;
        if let Some(row) = build_row(&columns, record.iter().map(str::to_string)) {
            rows.push(row);
        }
    }
    Ok(rows)
}

fn build_row(columns: &[String], cells: impl Iterator<Item = String>) -> Option<Row> {
    let row: Row = columns
        .iter()
        .zip(cells)
        .filter(|(_, value)| !value.is_empty())
        .map(|(column, value)| (column.clone(), value))
        .collect();
    (!row.is_empty()).then_some(row)
}

// Blank headers become `__EMPTY`; repeated headers get `_1`, `_2`, ... suffixes.
fn header_names(raw: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.map(|name| {
        let base = if name.trim().is_empty() {
            "__EMPTY".to_string()
        } else {
            name
        };
        let mut candidate = base.clone();
        let mut n = 1usize;
        while !seen.insert(candidate.clone()) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        candidate
    })
    .collect()
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(v) | Data::DateTimeIso(v) | Data::DurationIso(v) => v.clone(),
        Data::Int(v) => v.to_string(),
        Data::Float(v) => v.to_string(),
        Data::Bool(true) => "TRUE".to_string(),
        Data::Bool(false) => "FALSE".to_string(),
        Data::DateTime(v) => v
            .as_datetime()
            .map(format_datetime)
            .unwrap_or_else(|| v.as_f64().to_string()),
        Data::Error(e) => e.to_string(),
    }
}

fn format_datetime(value: NaiveDateTime) -> String {
    if value.hour() == 0 && value.minute() == 0 && value.second() == 0 {
        value.format("%Y-%m-%d").to_string()
    } else {
        value.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}
