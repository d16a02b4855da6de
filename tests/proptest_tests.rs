//! Property-based tests for the analyzers and statistics kernels.
//!
//! These verify structural invariants that must hold for any input:
//! 1. Histogram binning conserves the observation count
//! 2. Pareto cumulative shares are monotone and terminate near 100%
//! 3. Resampling conserves the metric total across bucket sizes
//! 4. Statistics kernels stay within their mathematical ranges

use proptest::prelude::*;

use qstorm::dataset::{Column, ColumnData, Dataset};
use qstorm::filter::DatasetFilter;
use qstorm::histogram::HistogramAnalyzer;
use qstorm::pareto::ParetoAnalyzer;
use qstorm::stats;
use qstorm::timeseries::{TimeSeriesAnalyzer, TimeUnit};

fn metric_dataset(values: &[f64]) -> Dataset {
    Dataset::new(vec![Column::new(
        "売上金額",
        ColumnData::Numeric(values.iter().map(|v| Some(*v)).collect()),
    )])
    .unwrap()
}

proptest! {
    #[test]
    fn histogram_conserves_observation_count(
        values in prop::collection::vec(-1.0e6..1.0e6f64, 1..200),
        bins in 2..=200usize,
    ) {
        let ds = metric_dataset(&values);
        let result = HistogramAnalyzer::new(&ds)
            .analyze("売上金額", bins, &DatasetFilter::default())
            .unwrap();

        prop_assert_eq!(result.frequencies.iter().sum::<u64>(), values.len() as u64);
        prop_assert_eq!(result.bin_edges.len(), result.frequencies.len() + 1);
        prop_assert_eq!(result.bin_centers.len(), result.frequencies.len());
        prop_assert_eq!(result.statistics.count, values.len());

        // Edges are ordered and span a positive range.
        for pair in result.bin_edges.windows(2) {
            prop_assert!(pair[0] <= pair[1]);
        }
        prop_assert!(result.bin_edges.first().unwrap() < result.bin_edges.last().unwrap());
    }

    #[test]
    fn pareto_cumulative_is_monotone_to_hundred(
        values in prop::collection::vec(0.01..1.0e6f64, 1..40),
    ) {
        let categories: Vec<Option<String>> = (0..values.len())
            .map(|i| Some(format!("カテゴリ{:02}", i)))
            .collect();
        let ds = Dataset::new(vec![
            Column::new("カテゴリ", ColumnData::Text(categories)),
            Column::new(
                "売上金額",
                ColumnData::Numeric(values.iter().map(|v| Some(*v)).collect()),
            ),
        ])
        .unwrap();

        let result = ParetoAnalyzer::new(&ds)
            .analyze("売上金額", Some("カテゴリ"), 100, &DatasetFilter::default())
            .unwrap();

        for pair in result.cumulative_percentage.windows(2) {
            prop_assert!(pair[0] <= pair[1] + 1e-9);
        }
        // Rounded shares accumulate at most 0.005 error per category.
        let last = result.cumulative_percentage.last().copied().unwrap();
        prop_assert!((last - 100.0).abs() <= 0.005 * values.len() as f64 + 0.01);

        for pair in result.values.windows(2) {
            prop_assert!(pair[0] >= pair[1]);
        }

        let stats = &result.statistics;
        prop_assert_eq!(
            stats.abc_counts.a + stats.abc_counts.b + stats.abc_counts.c,
            stats.category_count
        );
    }

    #[test]
    fn resampling_conserves_metric_total(
        day_values in prop::collection::vec((0..365i64, -1.0e4..1.0e4f64), 1..120),
    ) {
        let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates: Vec<Option<String>> = day_values
            .iter()
            .map(|(offset, _)| {
                Some((start + chrono::Duration::days(*offset)).format("%Y-%m-%d").to_string())
            })
            .collect();
        let values: Vec<Option<f64>> = day_values.iter().map(|(_, v)| Some(*v)).collect();
        let ds = Dataset::new(vec![
            Column::new("営業日付", ColumnData::Text(dates)),
            Column::new("売上金額", ColumnData::Numeric(values)),
        ])
        .unwrap();

        let expected: f64 = day_values.iter().map(|(_, v)| v).sum();
        for unit in [TimeUnit::Day, TimeUnit::Week, TimeUnit::Month, TimeUnit::Year] {
            let result = TimeSeriesAnalyzer::new(&ds)
                .analyze("売上金額", unit, &DatasetFilter::default())
                .unwrap();
            let bucket_sum: f64 = result.values.iter().sum();
            prop_assert!(
                (bucket_sum - expected).abs() < 1e-6 * (1.0 + expected.abs()),
                "unit {:?}: bucket sum {} vs expected {}",
                unit,
                bucket_sum,
                expected
            );
            prop_assert_eq!(result.dates.len(), result.values.len());
        }
    }

    #[test]
    fn linear_fit_r_squared_in_unit_range(
        ys in prop::collection::vec(-1.0e5..1.0e5f64, 2..60),
    ) {
        let fit = stats::linear_fit(&ys);
        prop_assert!((0.0..=1.0).contains(&fit.r_squared));
        prop_assert!(fit.slope.is_finite());
        prop_assert!(fit.intercept.is_finite());
    }

    #[test]
    fn shapiro_wilk_statistics_in_range(
        values in prop::collection::vec(-1.0e3..1.0e3f64, 3..500),
    ) {
        // Shapiro-Wilk requires non-degenerate data; skip all-equal samples.
        prop_assume!(values.iter().any(|v| (v - values[0]).abs() > 1e-9));

        if let Some((w, p)) = stats::shapiro_wilk(&values) {
            prop_assert!(w > 0.0 && w <= 1.0, "W out of range: {}", w);
            prop_assert!((0.0..=1.0).contains(&p), "p out of range: {}", p);
        }
    }

    #[test]
    fn sample_std_is_nonnegative(
        values in prop::collection::vec(-1.0e6..1.0e6f64, 0..100),
    ) {
        prop_assert!(stats::sample_std(&values) >= 0.0);
        if values.len() >= 2 {
            let mean = stats::mean(&values);
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(mean >= min - 1e-9 && mean <= max + 1e-9);
        }
    }
}
