//! In-memory tabular dataset model.
//!
//! A [`Dataset`] is an ordered set of named, typed columns loaded once per
//! session and shared read-only across analyses. Filters never mutate in
//! place: row selection produces a fresh `Dataset`, so concurrent requests
//! against the same session can never observe partial mutation.

use chrono::NaiveDateTime;
use crate::error::{AnalysisError, Result};

/// Typed column storage. Missing cells are `None`, never a sentinel value.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
    Datetime(Vec<Option<NaiveDateTime>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Text(v) => v.len(),
            ColumnData::Datetime(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A single named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Whether the column carries inferred-numeric storage.
    pub fn is_numeric(&self) -> bool {
        matches!(self.data, ColumnData::Numeric(_))
    }
}

/// An in-memory tabular dataset: ordered named columns of equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Dataset {
    /// Build a dataset from columns, validating that all lengths agree.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map(|c| c.data.len()).unwrap_or(0);
        for col in &columns {
            if col.data.len() != n_rows {
                return Err(AnalysisError::DatasetLoad(format!(
                    "Column '{}' has {} rows, expected {}",
                    col.name,
                    col.data.len(),
                    n_rows
                )));
            }
        }
        Ok(Self { columns, n_rows })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    /// Column names in original order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns in original order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// First column with inferred-numeric storage, if any.
    pub fn first_numeric_column(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.is_numeric())
            .map(|c| c.name.as_str())
    }

    /// Coerce a column to numeric values. Numeric columns pass through;
    /// text cells are parsed leniently (thousands separators stripped) and
    /// unparseable entries become `None` rather than zero. Datetime columns
    /// yield all-`None`.
    pub fn numeric_values(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let col = self.column(name)?;
        Some(match &col.data {
            ColumnData::Numeric(v) => v.clone(),
            ColumnData::Text(v) => v
                .iter()
                .map(|cell| cell.as_deref().and_then(parse_numeric_cell))
                .collect(),
            ColumnData::Datetime(v) => vec![None; v.len()],
        })
    }

    /// Column values rendered as display strings. Used for category labels.
    pub fn string_values(&self, name: &str) -> Option<Vec<Option<String>>> {
        let col = self.column(name)?;
        Some(match &col.data {
            ColumnData::Text(v) => v.clone(),
            ColumnData::Numeric(v) => v.iter().map(|cell| cell.map(format_numeric)).collect(),
            ColumnData::Datetime(v) => v
                .iter()
                .map(|cell| cell.map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string()))
                .collect(),
        })
    }

    /// Produce a new dataset keeping only the rows whose indices appear in
    /// `rows` (in the given order). This is the only way to "filter" a
    /// dataset; the source is left untouched.
    pub fn select_rows(&self, rows: &[usize]) -> Dataset {
        let columns = self
            .columns
            .iter()
            .map(|col| {
                let data = match &col.data {
                    ColumnData::Numeric(v) => {
                        ColumnData::Numeric(rows.iter().map(|&i| v[i]).collect())
                    }
                    ColumnData::Text(v) => {
                        ColumnData::Text(rows.iter().map(|&i| v[i].clone()).collect())
                    }
                    ColumnData::Datetime(v) => {
                        ColumnData::Datetime(rows.iter().map(|&i| v[i]).collect())
                    }
                };
                Column::new(col.name.clone(), data)
            })
            .collect();
        Dataset {
            columns,
            n_rows: rows.len(),
        }
    }
}

/// Parse one text cell as a number. Strips surrounding whitespace and comma
/// thousands separators.
pub(crate) fn parse_numeric_cell(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = trimmed.replace(',', "");
    normalized.parse::<f64>().ok()
}

/// Render a numeric value as a category label, dropping a trailing `.0`
/// for whole numbers so labels match their CSV source text.
fn format_numeric(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
