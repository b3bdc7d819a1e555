//! TSV reading and cell conversion
//!
//! Cells are converted according to the declared SQL type of their column.
//! Empty cells are treated as absent so database defaults apply.

use chrono::{NaiveDate, NaiveDateTime};
use rareindex_common::db::ColumnDefinition;
use std::path::Path;

/// Accepted date layouts, tried in order
pub const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d.%m.%Y", "%d-%m-%Y"];

/// Accepted datetime layouts, tried in order
pub const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d.%m.%Y %H:%M:%S"];

/// Header plus data rows of one file
#[derive(Debug, Clone)]
pub struct TsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Read a tab-separated file with a header row; short rows are padded
pub fn read_tsv(path: &Path) -> Result<TsvTable, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .from_path(path)?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let mut row: Vec<String> = record.iter().map(|c| c.trim().to_string()).collect();
        row.resize(headers.len(), String::new());
        rows.push(row);
    }

    Ok(TsvTable { headers, rows })
}

/// Bindable SQLite value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Integer(i64),
    Real(f64),
    Text(String),
}

/// Outcome of converting one cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Store this value
    Value(SqlValue),
    /// Leave the column out (empty cell)
    Absent,
    /// Leave the column out and warn (unparseable date)
    Dropped(String),
    /// The row cannot be imported
    Invalid(String),
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| parse_date(raw).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" => Some(true),
        "0" | "false" | "f" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Convert a non-FK cell by the column's declared type
pub fn convert_cell(column: &ColumnDefinition, raw: &str) -> Cell {
    let raw = raw.trim();
    if raw.is_empty() {
        return Cell::Absent;
    }

    match column.sql_type.to_ascii_uppercase().as_str() {
        "DATE" => match parse_date(raw) {
            Some(date) => Cell::Value(SqlValue::Text(date.format("%Y-%m-%d").to_string())),
            None => Cell::Dropped(format!("unrecognized date '{}' for {}", raw, column.name)),
        },
        "TIMESTAMP" => match parse_datetime(raw) {
            Some(dt) => Cell::Value(SqlValue::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string())),
            None => Cell::Dropped(format!("unrecognized datetime '{}' for {}", raw, column.name)),
        },
        "BOOLEAN" => match parse_bool(raw) {
            Some(b) => Cell::Value(SqlValue::Integer(i64::from(b))),
            None => Cell::Invalid(format!("{} expects a boolean, got '{}'", column.name, raw)),
        },
        "INTEGER" => match raw.parse::<i64>() {
            Ok(i) => Cell::Value(SqlValue::Integer(i)),
            Err(_) => Cell::Invalid(format!("{} expects an integer, got '{}'", column.name, raw)),
        },
        "REAL" => match raw.parse::<f64>() {
            Ok(f) => Cell::Value(SqlValue::Real(f)),
            Err(_) => Cell::Invalid(format!("{} expects a number, got '{}'", column.name, raw)),
        },
        "JSON" => match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(v) => Cell::Value(SqlValue::Text(v.to_string())),
            Err(e) => Cell::Invalid(format!("{} is not valid JSON: {}", column.name, e)),
        },
        _ => Cell::Value(SqlValue::Text(raw.to_string())),
    }
}
