//! Histogram and distribution analysis.
//!
//! Bins a metric into equal-width buckets and reports distributional
//! statistics including a Shapiro-Wilk normality verdict. Pathological
//! inputs (single value, single row) degrade to a one-bucket histogram
//! instead of an error: the endpoint contract is that valid finite data
//! always produces a histogram.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::Dataset;
use crate::error::{AnalysisError, Result};
use crate::filter::DatasetFilter;
use crate::schema;
use crate::stats;

/// Significance threshold for the normality verdict.
const NORMALITY_ALPHA: f64 = 0.05;

/// Distribution statistics for the binned metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation (N-1); 0.0 when n <= 1.
    pub std: f64,
    pub min: f64,
    pub max: f64,
    /// Population skewness; 0.0 under the degenerate-distribution policy.
    pub skewness: f64,
    /// Excess kurtosis; 0.0 under the degenerate-distribution policy.
    pub kurtosis: f64,
    /// Shapiro-Wilk W; neutral 0.0 when the test is not computable (n < 3
    /// or zero variance).
    pub shapiro_statistic: f64,
    /// Shapiro-Wilk p-value; neutral 1.0 when the test is not computable.
    pub shapiro_p_value: f64,
    /// True when the test ran and failed to reject normality at alpha 0.05.
    /// The neutral default reports false by convention.
    pub is_normal: bool,
}

/// Histogram analysis payload. Field names are the wire contract with the
/// presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramResult {
    pub metric: String,
    /// Bucket boundaries, length = frequencies.len() + 1.
    pub bin_edges: Vec<f64>,
    /// Midpoint of each bucket, aligned with `frequencies`.
    pub bin_centers: Vec<f64>,
    /// Count of values per bucket.
    pub frequencies: Vec<u64>,
    pub statistics: HistogramStats,
}

/// Executes histogram analysis against one dataset.
pub struct HistogramAnalyzer<'a> {
    dataset: &'a Dataset,
}

impl<'a> HistogramAnalyzer<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        Self { dataset }
    }

    /// Bin `metric` into `bins` equal-width buckets over the filtered rows.
    pub fn analyze(
        &self,
        metric: &str,
        bins: usize,
        filter: &DatasetFilter,
    ) -> Result<HistogramResult> {
        let filtered = filter.apply(self.dataset)?;
        let metric_column = schema::resolve_metric(&filtered, Some(metric))?;

        let values: Vec<f64> = filtered
            .numeric_values(&metric_column)
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .filter(|v| v.is_finite())
            .collect();

        if values.is_empty() {
            return Err(AnalysisError::EmptyResult(
                "Metric column contains no valid numeric data".to_string(),
            ));
        }

        let (bin_edges, frequencies) = bin_values(&values, bins);
        let bin_centers: Vec<f64> = bin_edges
            .windows(2)
            .map(|edge| (edge[0] + edge[1]) / 2.0)
            .collect();

        Ok(HistogramResult {
            metric: metric_column,
            bin_edges,
            bin_centers,
            frequencies,
            statistics: compute_statistics(&values),
        })
    }
}

/// Equal-width binning over [min, max]. The final bucket's upper edge is
/// inclusive so the maximum value is always counted.
///
/// Degenerate-input policy: a zero-width range (all values identical)
/// collapses to a single bucket spanning a synthetic unit-width range
/// centered on the value, with every observation inside it.
fn bin_values(values: &[f64], bins: usize) -> (Vec<f64>, Vec<u64>) {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if max - min <= f64::EPSILON * min.abs().max(1.0) {
        debug!("Zero-width metric range, falling back to a single unit-width bucket");
        return (vec![min - 0.5, min + 0.5], vec![values.len() as u64]);
    }

    let width = (max - min) / bins as f64;
    let edges: Vec<f64> = (0..=bins).map(|i| min + width * i as f64).collect();

    let mut frequencies = vec![0u64; bins];
    for &v in values {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        frequencies[idx] += 1;
    }
    (edges, frequencies)
}

fn compute_statistics(values: &[f64]) -> HistogramStats {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    // Named fallback policies: each degenerate statistic independently
    // reports its neutral value instead of failing the analysis.
    let skewness = stats::skewness(values).unwrap_or_else(|| {
        debug!("Degenerate distribution, reporting skewness 0.0");
        0.0
    });
    let kurtosis = stats::excess_kurtosis(values).unwrap_or_else(|| {
        debug!("Degenerate distribution, reporting kurtosis 0.0");
        0.0
    });
    let (shapiro_statistic, shapiro_p_value, is_normal) = match stats::shapiro_wilk(values) {
        Some((w, p)) => (w, p, p > NORMALITY_ALPHA),
        None => {
            debug!("Shapiro-Wilk not computable, reporting neutral default");
            (0.0, 1.0, false)
        }
    };

    HistogramStats {
        count: values.len(),
        mean: stats::mean(values),
        median: stats::median(values),
        std: stats::sample_std(values),
        min,
        max,
        skewness,
        kurtosis,
        shapiro_statistic,
        shapiro_p_value,
        is_normal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Column, ColumnData};

    fn numeric_dataset(values: &[f64]) -> Dataset {
        Dataset::new(vec![Column::new(
            "売上金額",
            ColumnData::Numeric(values.iter().map(|v| Some(*v)).collect()),
        )])
        .unwrap()
    }

    fn analyze(values: &[f64], bins: usize) -> HistogramResult {
        let ds = numeric_dataset(values);
        HistogramAnalyzer::new(&ds)
            .analyze("売上金額", bins, &DatasetFilter::default())
            .unwrap()
    }

    #[test]
    fn test_frequencies_sum_to_count() {
        let values: Vec<f64> = (0..100).map(|i| i as f64 * 1.7).collect();
        let result = analyze(&values, 10);
        assert_eq!(result.frequencies.iter().sum::<u64>(), 100);
        assert_eq!(result.bin_edges.len(), 11);
        assert_eq!(result.bin_centers.len(), 10);
    }

    #[test]
    fn test_maximum_value_lands_in_last_bucket() {
        let result = analyze(&[0.0, 5.0, 10.0], 2);
        assert_eq!(result.frequencies, vec![1, 2]);
    }

    #[test]
    fn test_single_distinct_value_degenerates_to_one_bucket() {
        let result = analyze(&[42.0, 42.0, 42.0, 42.0], 20);
        assert_eq!(result.frequencies, vec![4]);
        assert_eq!(result.bin_edges, vec![41.5, 42.5]);
        assert_eq!(result.statistics.skewness, 0.0);
        assert_eq!(result.statistics.kurtosis, 0.0);
        assert_eq!(result.statistics.shapiro_statistic, 0.0);
        assert_eq!(result.statistics.shapiro_p_value, 1.0);
        assert!(!result.statistics.is_normal);
    }

    #[test]
    fn test_single_row_does_not_error() {
        let result = analyze(&[7.5], 50);
        assert_eq!(result.frequencies, vec![1]);
        assert_eq!(result.statistics.count, 1);
        assert_eq!(result.statistics.std, 0.0);
    }

    #[test]
    fn test_non_finite_values_are_dropped() {
        let ds = Dataset::new(vec![Column::new(
            "売上金額",
            ColumnData::Numeric(vec![
                Some(1.0),
                Some(f64::NAN),
                Some(f64::INFINITY),
                Some(f64::NEG_INFINITY),
                Some(2.0),
                None,
            ]),
        )])
        .unwrap();
        let result = HistogramAnalyzer::new(&ds)
            .analyze("売上金額", 2, &DatasetFilter::default())
            .unwrap();
        assert_eq!(result.statistics.count, 2);
        assert_eq!(result.frequencies.iter().sum::<u64>(), 2);
    }

    #[test]
    fn test_all_invalid_is_empty_result() {
        let ds = Dataset::new(vec![Column::new(
            "売上金額",
            ColumnData::Numeric(vec![Some(f64::NAN), None]),
        )])
        .unwrap();
        let err = HistogramAnalyzer::new(&ds)
            .analyze("売上金額", 10, &DatasetFilter::default())
            .unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyResult(_)));
    }

    #[test]
    fn test_normality_verdict_on_skewed_data() {
        let values: Vec<f64> = (1..=60).map(|i| (i * i) as f64).collect();
        let result = analyze(&values, 10);
        assert!(!result.statistics.is_normal);
        assert!(result.statistics.skewness > 0.0);
        assert!(result.statistics.shapiro_p_value < NORMALITY_ALPHA);
    }

    #[test]
    fn test_two_values_report_neutral_shapiro() {
        let result = analyze(&[1.0, 2.0], 2);
        assert_eq!(result.statistics.shapiro_statistic, 0.0);
        assert_eq!(result.statistics.shapiro_p_value, 1.0);
        assert!(!result.statistics.is_normal);
    }
}
