//! Column role resolution for loosely-specified datasets.
//!
//! Uploaded retail datasets arrive under several naming conventions at once:
//! Japanese and English headers, separate year/month/day columns, product
//! family columns (`Mens_*`, `WOMEN'S_*`) standing in for a category
//! dimension. This module resolves the role a caller needs (date, metric,
//! category, store) through priority-ordered candidate tables rather than
//! per-function name checks.

use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::dataset::{ColumnData, Dataset};
use crate::error::{AnalysisError, Result};

/// Date column candidates, highest priority first.
pub const DATE_CANDIDATES: &[&str] = &["営業日付", "Date", "date"];

/// Store/shop column candidates, highest priority first.
pub const STORE_CANDIDATES: &[&str] = &["店舗名", "shop"];

/// Named category column candidates, highest priority first.
pub const CATEGORY_CANDIDATES: &[&str] = &["カテゴリ", "category", "product_category", "カテゴリ名"];

/// Prefixes marking product-family columns that together form a synthetic
/// category dimension.
pub const FAMILY_PREFIXES: &[&str] = &["Mens_", "Womens_", "WOMEN'S_", "LADIES_"];

/// Column names that never qualify as a category fallback.
const RESERVED_COLUMNS: &[&str] = &["店舗名", "shop", "year", "month", "day", "年", "月", "日"];

/// Year/month/day column triples used to synthesize a date when no date
/// column parses.
const YMD_TRIPLES: &[[&str; 3]] = &[["年", "月", "日"], ["year", "month", "day"]];

/// Where category labels come from for a Pareto aggregation.
///
/// `Named` groups rows by the values of one column. `ColumnFamily` treats
/// each member column as a category of its own, with the per-column sum as
/// that category's total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategorySource {
    Named(String),
    ColumnFamily(Vec<String>),
}

/// Parse a date or datetime string, trying common formats in order.
/// Date-only inputs resolve to midnight.
pub fn parse_datetime_lenient(s: &str) -> Option<NaiveDateTime> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }

    let datetime_formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y/%m/%d %H:%M:%S",
    ];
    for fmt in &datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
    }

    let date_formats = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%m/%d/%Y", "%Y年%m月%d日"];
    for fmt in &date_formats {
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }

    None
}

/// Resolve a per-row datetime index for the dataset.
///
/// Tries the named date candidates in priority order and accepts the first
/// column where at least one value parses. Falls back to composing dates
/// from year/month/day columns. Unparseable cells stay `None` so callers
/// drop those rows rather than guessing.
pub fn resolve_dates(dataset: &Dataset) -> Result<Vec<Option<NaiveDateTime>>> {
    for candidate in DATE_CANDIDATES {
        if let Some(column) = dataset.column(candidate) {
            let parsed = parse_date_column(&column.data);
            if parsed.iter().any(|v| v.is_some()) {
                debug!("Resolved date column '{}'", candidate);
                return Ok(parsed);
            }
        }
    }

    for triple in YMD_TRIPLES {
        if triple.iter().all(|name| dataset.has_column(name)) {
            debug!("Synthesizing dates from {:?} columns", triple);
            return synthesize_ymd(dataset, triple);
        }
    }

    Err(AnalysisError::Schema(
        "Datetime column not found in dataset".to_string(),
    ))
}

fn parse_date_column(data: &ColumnData) -> Vec<Option<NaiveDateTime>> {
    match data {
        ColumnData::Datetime(v) => v.clone(),
        ColumnData::Text(v) => v
            .iter()
            .map(|cell| cell.as_deref().and_then(parse_datetime_lenient))
            .collect(),
        // A purely numeric column is not a date; the ymd fallback handles
        // split year/month/day layouts.
        ColumnData::Numeric(v) => vec![None; v.len()],
    }
}

/// Compose calendar dates from separate year/month/day columns. Every row
/// must coerce to a valid date; a single bad row fails resolution, matching
/// the strictness of integer coercion on the whole columns.
fn synthesize_ymd(dataset: &Dataset, triple: &[&str; 3]) -> Result<Vec<Option<NaiveDateTime>>> {
    let invalid = || {
        AnalysisError::Schema("Failed to construct datetime from year/month/day columns".to_string())
    };

    let years = dataset.numeric_values(triple[0]).ok_or_else(invalid)?;
    let months = dataset.numeric_values(triple[1]).ok_or_else(invalid)?;
    let days = dataset.numeric_values(triple[2]).ok_or_else(invalid)?;

    let mut dates = Vec::with_capacity(years.len());
    for i in 0..years.len() {
        let (y, m, d) = match (years[i], months[i], days[i]) {
            (Some(y), Some(m), Some(d)) => (y, m, d),
            _ => return Err(invalid()),
        };
        let date = NaiveDate::from_ymd_opt(y as i32, m as u32, d as u32)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .ok_or_else(invalid)?;
        dates.push(Some(date));
    }
    Ok(dates)
}

/// Resolve the category dimension when the caller did not name one.
///
/// Priority: a named candidate column, then the product-family columns as a
/// synthetic dimension, then the first non-numeric, non-reserved column.
pub fn resolve_category(dataset: &Dataset) -> Result<CategorySource> {
    for candidate in CATEGORY_CANDIDATES {
        if dataset.has_column(candidate) {
            return Ok(CategorySource::Named((*candidate).to_string()));
        }
    }

    let family = family_columns(dataset);
    if !family.is_empty() {
        debug!("Using {} product-family columns as category dimension", family.len());
        return Ok(CategorySource::ColumnFamily(family));
    }

    for column in dataset.columns() {
        if RESERVED_COLUMNS.contains(&column.name.as_str()) {
            continue;
        }
        if !column.is_numeric() {
            return Ok(CategorySource::Named(column.name.clone()));
        }
    }

    Err(AnalysisError::Schema(
        "No suitable category column found in dataset".to_string(),
    ))
}

/// All columns carrying a product-family prefix, in dataset order.
pub fn family_columns(dataset: &Dataset) -> Vec<String> {
    dataset
        .columns()
        .iter()
        .filter(|c| FAMILY_PREFIXES.iter().any(|p| c.name.starts_with(p)))
        .map(|c| c.name.clone())
        .collect()
}

/// Resolve the metric column: the caller's choice when present, otherwise
/// the first numeric column.
pub fn resolve_metric(dataset: &Dataset, requested: Option<&str>) -> Result<String> {
    if let Some(name) = requested {
        if dataset.has_column(name) {
            return Ok(name.to_string());
        }
        debug!("Requested metric '{}' not in dataset, falling back", name);
    }
    dataset
        .first_numeric_column()
        .map(|name| name.to_string())
        .ok_or_else(|| AnalysisError::Schema("No numeric metric column found in dataset".to_string()))
}

/// First matching store/shop column name, if any.
pub fn find_store_column(dataset: &Dataset) -> Option<&'static str> {
    STORE_CANDIDATES
        .iter()
        .find(|candidate| dataset.has_column(candidate))
        .copied()
}
