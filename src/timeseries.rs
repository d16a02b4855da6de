//! Time-series aggregation with linear trend fitting.
//!
//! Resamples a metric to a fixed calendar frequency by summation, then fits
//! an ordinary least-squares line over the bucket index. Bucket timestamps
//! serialize as ISO-8601 without a timezone offset; the source data's local
//! calendar is taken at face value.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::dataset::Dataset;
use crate::error::{AnalysisError, Result};
use crate::filter::DatasetFilter;
use crate::schema;
use crate::stats;

/// Calendar frequency for resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Day,
    Week,
    Month,
    Year,
}

impl TimeUnit {
    /// Parse from either the English or the Japanese token used by the
    /// upload frontend.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "day" | "d" | "日" => Some(TimeUnit::Day),
            "week" | "w" | "週" => Some(TimeUnit::Week),
            "month" | "m" | "月" => Some(TimeUnit::Month),
            "year" | "y" | "年" => Some(TimeUnit::Year),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Day => "day",
            TimeUnit::Week => "week",
            TimeUnit::Month => "month",
            TimeUnit::Year => "year",
        }
    }

    /// Bucket identity for a timestamp at this frequency.
    fn bucket_key(&self, dt: NaiveDateTime) -> i64 {
        match self {
            TimeUnit::Day => dt.date().num_days_from_ce() as i64,
            TimeUnit::Week => {
                let iso = dt.date().iso_week();
                iso.year() as i64 * 100 + iso.week() as i64
            }
            TimeUnit::Month => dt.year() as i64 * 12 + dt.month() as i64,
            TimeUnit::Year => dt.year() as i64,
        }
    }

    /// Start-of-bucket timestamp used as the bucket label.
    fn bucket_start(&self, dt: NaiveDateTime) -> NaiveDateTime {
        let date = match self {
            TimeUnit::Day => dt.date(),
            TimeUnit::Week => {
                let iso = dt.date().iso_week();
                NaiveDate::from_isoywd_opt(iso.year(), iso.week(), chrono::Weekday::Mon)
                    .unwrap_or_else(|| dt.date())
            }
            TimeUnit::Month => {
                NaiveDate::from_ymd_opt(dt.year(), dt.month(), 1).unwrap_or_else(|| dt.date())
            }
            TimeUnit::Year => {
                NaiveDate::from_ymd_opt(dt.year(), 1, 1).unwrap_or_else(|| dt.date())
            }
        };
        date.and_hms_opt(0, 0, 0).unwrap_or(dt)
    }
}

/// Summary statistics over the resampled buckets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeriesStats {
    pub count: usize,
    pub total: f64,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation (N-1); 0.0 when a single bucket remains.
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// ISO-8601 timestamp of the latest bucket.
    pub latest_timestamp: String,
}

/// Time-series analysis payload. Field names are the wire contract with the
/// presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeriesResult {
    pub metric: String,
    pub time_unit: TimeUnit,
    /// Bucket start timestamps, ISO-8601, ascending.
    pub dates: Vec<String>,
    /// Per-bucket metric sums, aligned with `dates`.
    pub values: Vec<f64>,
    /// OLS fitted value per bucket, aligned with `dates`.
    pub trend_values: Vec<f64>,
    pub statistics: TimeSeriesStats,
}

/// Executes time-series aggregations against one dataset.
pub struct TimeSeriesAnalyzer<'a> {
    dataset: &'a Dataset,
}

impl<'a> TimeSeriesAnalyzer<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        Self { dataset }
    }

    /// Resample `metric` to `unit` buckets by summation and fit a trend.
    pub fn analyze(
        &self,
        metric: &str,
        unit: TimeUnit,
        filter: &DatasetFilter,
    ) -> Result<TimeSeriesResult> {
        let filtered = filter.apply(self.dataset)?;
        let metric_column = schema::resolve_metric(&filtered, Some(metric))?;
        let series = build_metric_series(&filtered, &metric_column)?;

        let mut buckets: HashMap<i64, (NaiveDateTime, f64)> = HashMap::new();
        for (ts, value) in &series {
            let key = unit.bucket_key(*ts);
            let entry = buckets
                .entry(key)
                .or_insert_with(|| (unit.bucket_start(*ts), 0.0));
            entry.1 += value;
        }

        let mut resampled: Vec<(NaiveDateTime, f64)> = buckets.into_values().collect();
        resampled.sort_by_key(|(ts, _)| *ts);

        if resampled.is_empty() {
            return Err(AnalysisError::EmptyResult(
                "No data points available after resampling".to_string(),
            ));
        }

        let values: Vec<f64> = resampled.iter().map(|(_, v)| *v).collect();
        let dates: Vec<String> = resampled
            .iter()
            .map(|(ts, _)| ts.format("%Y-%m-%dT%H:%M:%S").to_string())
            .collect();

        let fit = stats::linear_fit(&values);
        let trend_values: Vec<f64> = (0..values.len())
            .map(|i| fit.slope * i as f64 + fit.intercept)
            .collect();

        let statistics = TimeSeriesStats {
            count: values.len(),
            total: values.iter().sum(),
            mean: stats::mean(&values),
            median: stats::median(&values),
            std: stats::sample_std(&values),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            slope: fit.slope,
            intercept: fit.intercept,
            r_squared: fit.r_squared,
            latest_timestamp: dates.last().cloned().unwrap_or_default(),
        };

        Ok(TimeSeriesResult {
            metric: metric_column,
            time_unit: unit,
            dates,
            values,
            trend_values,
            statistics,
        })
    }
}

/// Pair each row's datetime with its numeric metric value, dropping rows
/// where either side is missing or non-finite. Sorted ascending by time.
fn build_metric_series(dataset: &Dataset, metric: &str) -> Result<Vec<(NaiveDateTime, f64)>> {
    let dates = schema::resolve_dates(dataset)?;
    let values = dataset.numeric_values(metric).ok_or_else(|| {
        AnalysisError::Schema(format!("Metric column '{}' not found in dataset", metric))
    })?;

    let mut series: Vec<(NaiveDateTime, f64)> = dates
        .iter()
        .zip(values.iter())
        .filter_map(|(date, value)| match (date, value) {
            (Some(d), Some(v)) if v.is_finite() => Some((*d, *v)),
            _ => None,
        })
        .collect();

    if series.is_empty() {
        return Err(AnalysisError::EmptyResult(
            "Metric column contains no valid numeric data".to_string(),
        ));
    }
    series.sort_by_key(|(ts, _)| *ts);
    Ok(series)
}
