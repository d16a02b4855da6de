//! Store and date-range filtering.
//!
//! Filters never mutate the input dataset; they select rows into a fresh
//! copy. Date bounds are deliberately lenient: an unparseable bound string
//! is ignored (with a warning) rather than failing the request, and a
//! dataset without a resolvable date index skips the date filter entirely.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dataset::Dataset;
use crate::error::{AnalysisError, Result};
use crate::schema::{self, parse_datetime_lenient};

/// Caller-supplied filter parameters for one analysis request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetFilter {
    /// Exact store name to keep, if any.
    pub store: Option<String>,
    /// Inclusive start date string (lenient formats).
    pub start_date: Option<String>,
    /// Inclusive end date string; extends to the end of that calendar day.
    pub end_date: Option<String>,
}

impl DatasetFilter {
    pub fn store(store: impl Into<String>) -> Self {
        Self {
            store: Some(store.into()),
            ..Self::default()
        }
    }

    pub fn is_noop(&self) -> bool {
        self.store.is_none() && self.start_date.is_none() && self.end_date.is_none()
    }

    /// Apply store then date-range filtering, producing a new dataset.
    pub fn apply(&self, dataset: &Dataset) -> Result<Dataset> {
        let filtered = filter_store(dataset, self.store.as_deref())?;
        Ok(filter_date_range(
            &filtered,
            self.start_date.as_deref(),
            self.end_date.as_deref(),
        ))
    }
}

/// Keep only rows whose store column matches `store` exactly.
///
/// Requesting a store filter on a dataset without a store column is a schema
/// error; requesting a store that matches no rows is an empty-result error.
/// The two are reported distinctly.
pub fn filter_store(dataset: &Dataset, store: Option<&str>) -> Result<Dataset> {
    let store = match store {
        Some(s) => s,
        None => return Ok(dataset.clone()),
    };

    let column = schema::find_store_column(dataset).ok_or_else(|| {
        AnalysisError::Schema("Store column not present in dataset".to_string())
    })?;

    let values = dataset
        .string_values(column)
        .unwrap_or_else(|| vec![None; dataset.n_rows()]);
    let rows: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.as_deref() == Some(store))
        .map(|(i, _)| i)
        .collect();

    if rows.is_empty() {
        return Err(AnalysisError::EmptyResult(
            "No records found for specified store".to_string(),
        ));
    }
    Ok(dataset.select_rows(&rows))
}

/// Keep only rows inside the inclusive date range.
///
/// The end bound covers the entire calendar day when given as a date-only
/// value, so a range ending "2023-03-31" includes every instant of March
/// 31st. Bounds that fail to parse are skipped per-bound, and a
/// dataset with no resolvable date index passes through unfiltered.
pub fn filter_date_range(
    dataset: &Dataset,
    start: Option<&str>,
    end: Option<&str>,
) -> Dataset {
    if start.is_none() && end.is_none() {
        return dataset.clone();
    }

    let start_bound = parse_bound(start, "start");
    let end_bound = parse_bound(end, "end").map(end_bound_of);
    if start_bound.is_none() && end_bound.is_none() {
        return dataset.clone();
    }

    let dates = match schema::resolve_dates(dataset) {
        Ok(dates) => dates,
        Err(e) => {
            warn!("Date filter requested but no date index resolved, skipping: {}", e);
            return dataset.clone();
        }
    };

    let rows: Vec<usize> = dates
        .iter()
        .enumerate()
        .filter(|(_, date)| match date {
            Some(d) => {
                start_bound.map_or(true, |s| *d >= s) && end_bound.map_or(true, |e| e.admits(*d))
            }
            // Rows without a parseable date cannot satisfy a date bound.
            None => false,
        })
        .map(|(i, _)| i)
        .collect();

    dataset.select_rows(&rows)
}

fn parse_bound(raw: Option<&str>, which: &str) -> Option<NaiveDateTime> {
    let raw = raw?;
    match parse_datetime_lenient(raw) {
        Some(dt) => Some(dt),
        None => {
            warn!("Ignoring unparseable {} date bound '{}'", which, raw);
            None
        }
    }
}

/// Upper bound of a date range. Explicit timestamps are inclusive of that
/// instant; date-only bounds become an exclusive next-day midnight so the
/// whole end day is admitted, sub-second timestamps included.
#[derive(Debug, Clone, Copy)]
enum EndBound {
    Inclusive(NaiveDateTime),
    Exclusive(NaiveDateTime),
}

impl EndBound {
    fn admits(self, d: NaiveDateTime) -> bool {
        match self {
            EndBound::Inclusive(e) => d <= e,
            EndBound::Exclusive(e) => d < e,
        }
    }
}

fn end_bound_of(bound: NaiveDateTime) -> EndBound {
    if bound.time() == chrono::NaiveTime::MIN {
        match bound.date().succ_opt() {
            Some(next_day) => EndBound::Exclusive(next_day.and_time(chrono::NaiveTime::MIN)),
            // NaiveDate::MAX has no successor; nothing lies beyond it anyway.
            None => EndBound::Inclusive(NaiveDateTime::MAX),
        }
    } else {
        EndBound::Inclusive(bound)
    }
}
