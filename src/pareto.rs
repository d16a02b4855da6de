//! Pareto analysis with ABC classification (80/20 rule).
//!
//! Aggregates a metric by category, ranks descending, and classifies
//! categories into A/B/C tiers by cumulative contribution share. The
//! category dimension either names a column or spans a product-family
//! column set ([`CategorySource`]); aggregation branches on that typed
//! variant, not on a sentinel label.
//!
//! Percentage shares are rounded to 2 decimals before the cumulative sum is
//! taken, and the cumulative value is rounded again. Rounding error
//! therefore accumulates additively across categories. This matches the
//! behavior existing report consumers were built against and is kept
//! deliberately.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::dataset::Dataset;
use crate::error::{AnalysisError, Result};
use crate::filter::DatasetFilter;
use crate::schema::{self, CategorySource};

/// Cumulative-share boundaries for the ABC tiers. Upper bounds inclusive.
const TIER_A_MAX: f64 = 80.0;
const TIER_B_MAX: f64 = 95.0;

/// Tolerance absorbing the 2-decimal rounding of cumulative shares.
const TIER_EPSILON: f64 = 1e-9;

/// Category labels per ABC tier, in ranked order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AbcClassification {
    pub a: Vec<String>,
    pub b: Vec<String>,
    pub c: Vec<String>,
}

/// Tier sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbcCounts {
    pub a: usize,
    pub b: usize,
    pub c: usize,
}

/// Summary statistics over the full (untruncated) category set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParetoStats {
    pub total: f64,
    pub category_count: usize,
    /// Number of tier-A ("vital few") categories.
    pub vital_few_count: usize,
    /// Vital-few share of all categories, percent, rounded to 2 decimals.
    pub vital_few_ratio: f64,
    pub abc_counts: AbcCounts,
    /// Whether the vital few stayed within 30% of categories, i.e. the
    /// 80/20 concentration held approximately.
    pub pareto_rule_achieved: bool,
}

/// Pareto analysis payload. Field names are the wire contract with the
/// presentation layer. The display vectors are truncated to `top_n`;
/// classification and statistics cover the full category set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParetoResult {
    pub metric: String,
    pub categories: Vec<String>,
    pub values: Vec<f64>,
    /// Per-category share of total, percent, rounded to 2 decimals.
    pub ratios: Vec<f64>,
    /// Running sum of the rounded shares, rounded to 2 decimals.
    pub cumulative_percentage: Vec<f64>,
    pub abc_classification: AbcClassification,
    pub statistics: ParetoStats,
}

/// Executes Pareto/ABC analysis against one dataset.
pub struct ParetoAnalyzer<'a> {
    dataset: &'a Dataset,
}

impl<'a> ParetoAnalyzer<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        Self { dataset }
    }

    /// Aggregate `metric` by category, rank, and classify.
    ///
    /// `category` overrides automatic category resolution when given.
    pub fn analyze(
        &self,
        metric: &str,
        category: Option<&str>,
        top_n: usize,
        filter: &DatasetFilter,
    ) -> Result<ParetoResult> {
        let filtered = filter.apply(self.dataset)?;

        let source = match category {
            Some(name) => {
                if !filtered.has_column(name) {
                    return Err(AnalysisError::Schema(format!(
                        "Category column '{}' not found in dataset",
                        name
                    )));
                }
                CategorySource::Named(name.to_string())
            }
            None => schema::resolve_category(&filtered)?,
        };
        let metric_column = schema::resolve_metric(&filtered, Some(metric))?;

        let mut totals = aggregate_by_category(&filtered, &source, &metric_column)?;

        // Non-positive and non-finite totals never contribute to a Pareto
        // ranking; drop them before computing shares.
        totals.retain(|(_, v)| v.is_finite() && *v > 0.0);
        if totals.is_empty() {
            return Err(AnalysisError::EmptyResult(
                "No valid data for Pareto analysis".to_string(),
            ));
        }

        let total: f64 = totals.iter().map(|(_, v)| v).sum();
        if total <= 0.0 {
            return Err(AnalysisError::EmptyResult(
                "No data after filtering: category totals sum to zero".to_string(),
            ));
        }

        // Stable descending sort: ties keep first-seen order.
        totals.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let ratios: Vec<f64> = totals.iter().map(|(_, v)| round2(v / total * 100.0)).collect();
        let mut cumulative = Vec::with_capacity(ratios.len());
        let mut running = 0.0;
        for r in &ratios {
            running += r;
            cumulative.push(round2(running));
        }

        let abc_classification = classify_abc(&totals, &cumulative);
        let category_count = totals.len();
        let vital_few_count = abc_classification.a.len();
        let vital_few_ratio = if category_count > 0 {
            round2(vital_few_count as f64 / category_count as f64 * 100.0)
        } else {
            0.0
        };

        let statistics = ParetoStats {
            total,
            category_count,
            vital_few_count,
            vital_few_ratio,
            abc_counts: AbcCounts {
                a: abc_classification.a.len(),
                b: abc_classification.b.len(),
                c: abc_classification.c.len(),
            },
            pareto_rule_achieved: vital_few_ratio <= 30.0,
        };

        let shown = top_n.min(totals.len());
        Ok(ParetoResult {
            metric: metric_column,
            categories: totals[..shown].iter().map(|(c, _)| c.clone()).collect(),
            values: totals[..shown].iter().map(|(_, v)| *v).collect(),
            ratios: ratios[..shown].to_vec(),
            cumulative_percentage: cumulative[..shown].to_vec(),
            abc_classification,
            statistics,
        })
    }
}

/// Sum the metric per category label.
///
/// For a named column this is a group-by over row values. For a column
/// family each member column is one category and its total is the column
/// sum, not a group-by.
fn aggregate_by_category(
    dataset: &Dataset,
    source: &CategorySource,
    metric: &str,
) -> Result<Vec<(String, f64)>> {
    match source {
        CategorySource::Named(column) => {
            let labels = dataset.string_values(column).ok_or_else(|| {
                AnalysisError::Schema(format!("Category column '{}' not found in dataset", column))
            })?;
            let values = dataset.numeric_values(metric).ok_or_else(|| {
                AnalysisError::Schema(format!("Metric column '{}' not found in dataset", metric))
            })?;

            // Preserve first-seen label order for deterministic tie handling.
            let mut order: Vec<String> = Vec::new();
            let mut sums: HashMap<String, f64> = HashMap::new();
            for (label, value) in labels.iter().zip(values.iter()) {
                let (label, value) = match (label, value) {
                    (Some(l), Some(v)) if v.is_finite() => (l, v),
                    _ => continue,
                };
                if !sums.contains_key(label) {
                    order.push(label.clone());
                }
                *sums.entry(label.clone()).or_insert(0.0) += value;
            }
            Ok(order
                .into_iter()
                .map(|label| {
                    let total = sums[&label];
                    (label, total)
                })
                .collect())
        }
        CategorySource::ColumnFamily(columns) => {
            if columns.is_empty() {
                return Err(AnalysisError::Schema(
                    "No product category columns found".to_string(),
                ));
            }
            let mut totals = Vec::with_capacity(columns.len());
            for column in columns {
                let sum: f64 = dataset
                    .numeric_values(column)
                    .unwrap_or_default()
                    .into_iter()
                    .flatten()
                    .filter(|v| v.is_finite())
                    .sum();
                totals.push((column.clone(), sum));
            }
            Ok(totals)
        }
    }
}

/// Assign each ranked category to its tier by cumulative share.
/// A: <= 80.00, B: <= 95.00, C: above. Upper bounds inclusive.
fn classify_abc(totals: &[(String, f64)], cumulative: &[f64]) -> AbcClassification {
    let mut abc = AbcClassification::default();
    for ((label, _), &cum) in totals.iter().zip(cumulative.iter()) {
        if cum <= TIER_A_MAX + TIER_EPSILON {
            abc.a.push(label.clone());
        } else if cum <= TIER_B_MAX + TIER_EPSILON {
            abc.b.push(label.clone());
        } else {
            abc.c.push(label.clone());
        }
    }
    abc
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Column, ColumnData};

    fn grouped_dataset() -> Dataset {
        // Category totals: A=800, B=150, C=30, D=20 (total 1000).
        Dataset::new(vec![
            Column::new(
                "カテゴリ",
                ColumnData::Text(
                    ["A", "B", "C", "D", "A"]
                        .iter()
                        .map(|s| Some((*s).to_string()))
                        .collect(),
                ),
            ),
            Column::new(
                "売上金額",
                ColumnData::Numeric(vec![
                    Some(500.0),
                    Some(150.0),
                    Some(30.0),
                    Some(20.0),
                    Some(300.0),
                ]),
            ),
        ])
        .unwrap()
    }

    fn analyze(ds: &Dataset, top_n: usize) -> ParetoResult {
        ParetoAnalyzer::new(ds)
            .analyze("売上金額", None, top_n, &DatasetFilter::default())
            .unwrap()
    }

    #[test]
    fn test_grouped_aggregation_ranks_descending() {
        let result = analyze(&grouped_dataset(), 20);
        assert_eq!(result.categories, vec!["A", "B", "C", "D"]);
        assert_eq!(result.values, vec![800.0, 150.0, 30.0, 20.0]);
        assert_eq!(result.ratios, vec![80.0, 15.0, 3.0, 2.0]);
        assert_eq!(result.cumulative_percentage, vec![80.0, 95.0, 98.0, 100.0]);
    }

    #[test]
    fn test_abc_tier_boundaries_inclusive() {
        let result = analyze(&grouped_dataset(), 20);
        // 80.00 exactly is tier A; 95.00 exactly is tier B; above is C.
        assert_eq!(result.abc_classification.a, vec!["A"]);
        assert_eq!(result.abc_classification.b, vec!["B"]);
        assert_eq!(result.abc_classification.c, vec!["C", "D"]);
    }

    #[test]
    fn test_just_over_boundary_moves_tier() {
        // A cumulative share of 80.01 sits past the tier-A bound, so even
        // the top-ranked category lands in tier B.
        let ds = Dataset::new(vec![
            Column::new(
                "カテゴリ",
                ColumnData::Text(vec![Some("X".to_string()), Some("Y".to_string())]),
            ),
            Column::new(
                "売上金額",
                ColumnData::Numeric(vec![Some(8001.0), Some(1999.0)]),
            ),
        ])
        .unwrap();
        let result = analyze(&ds, 20);
        assert_eq!(result.cumulative_percentage[0], 80.01);
        assert!(result.abc_classification.a.is_empty());
        assert_eq!(result.abc_classification.b, vec!["X"]);
    }

    #[test]
    fn test_just_over_b_boundary_moves_to_c() {
        // Cumulative 95.01 sits past the tier-B bound, so the second-ranked
        // category lands in tier C.
        let ds = Dataset::new(vec![
            Column::new(
                "カテゴリ",
                ColumnData::Text(vec![
                    Some("X".to_string()),
                    Some("Y".to_string()),
                    Some("Z".to_string()),
                ]),
            ),
            Column::new(
                "売上金額",
                ColumnData::Numeric(vec![Some(8000.0), Some(1501.0), Some(499.0)]),
            ),
        ])
        .unwrap();
        let result = analyze(&ds, 20);
        assert_eq!(result.cumulative_percentage, vec![80.0, 95.01, 100.0]);
        assert_eq!(result.abc_classification.a, vec!["X"]);
        assert!(result.abc_classification.b.is_empty());
        assert_eq!(result.abc_classification.c, vec!["Y", "Z"]);
    }

    #[test]
    fn test_final_cumulative_reaches_one_hundred() {
        let result = analyze(&grouped_dataset(), 20);
        let last = *result.cumulative_percentage.last().unwrap();
        assert!((last - 100.0).abs() < 0.05, "last = {}", last);
    }

    #[test]
    fn test_truncation_keeps_full_classification() {
        let result = analyze(&grouped_dataset(), 2);
        assert_eq!(result.categories.len(), 2);
        assert_eq!(result.values.len(), 2);
        assert_eq!(result.statistics.category_count, 4);
        let tiers = result.abc_classification;
        assert_eq!(tiers.a.len() + tiers.b.len() + tiers.c.len(), 4);
    }

    #[test]
    fn test_column_family_aggregation_sums_columns() {
        let ds = Dataset::new(vec![
            Column::new(
                "Mens_KNIT",
                ColumnData::Numeric(vec![Some(100.0), Some(200.0)]),
            ),
            Column::new(
                "WOMEN'S_TOPS",
                ColumnData::Numeric(vec![Some(400.0), Some(300.0)]),
            ),
            Column::new(
                "売上金額",
                ColumnData::Numeric(vec![Some(500.0), Some(500.0)]),
            ),
        ])
        .unwrap();
        let result = analyze(&ds, 20);
        assert_eq!(result.categories, vec!["WOMEN'S_TOPS", "Mens_KNIT"]);
        assert_eq!(result.values, vec![700.0, 300.0]);
    }

    #[test]
    fn test_zero_total_is_empty_result_not_division_error() {
        let ds = Dataset::new(vec![
            Column::new(
                "カテゴリ",
                ColumnData::Text(vec![Some("A".to_string()), Some("B".to_string())]),
            ),
            Column::new("売上金額", ColumnData::Numeric(vec![Some(0.0), Some(0.0)])),
        ])
        .unwrap();
        let err = ParetoAnalyzer::new(&ds)
            .analyze("売上金額", None, 20, &DatasetFilter::default())
            .unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyResult(_)));
    }

    #[test]
    fn test_negative_and_nonfinite_totals_excluded() {
        let ds = Dataset::new(vec![
            Column::new(
                "カテゴリ",
                ColumnData::Text(vec![
                    Some("pos".to_string()),
                    Some("neg".to_string()),
                ]),
            ),
            Column::new(
                "売上金額",
                ColumnData::Numeric(vec![Some(100.0), Some(-50.0)]),
            ),
        ])
        .unwrap();
        let result = analyze(&ds, 20);
        assert_eq!(result.categories, vec!["pos"]);
        assert_eq!(result.statistics.category_count, 1);
    }

    #[test]
    fn test_explicit_category_column_override() {
        let ds = Dataset::new(vec![
            Column::new(
                "region",
                ColumnData::Text(vec![Some("east".to_string()), Some("west".to_string())]),
            ),
            Column::new(
                "カテゴリ",
                ColumnData::Text(vec![Some("A".to_string()), Some("A".to_string())]),
            ),
            Column::new(
                "売上金額",
                ColumnData::Numeric(vec![Some(10.0), Some(20.0)]),
            ),
        ])
        .unwrap();
        let result = ParetoAnalyzer::new(&ds)
            .analyze("売上金額", Some("region"), 20, &DatasetFilter::default())
            .unwrap();
        assert_eq!(result.categories, vec!["west", "east"]);
    }

    #[test]
    fn test_unknown_explicit_category_is_schema_error() {
        let err = ParetoAnalyzer::new(&grouped_dataset())
            .analyze("売上金額", Some("missing"), 20, &DatasetFilter::default())
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Schema(_)));
    }

    #[test]
    fn test_vital_few_statistics() {
        let result = analyze(&grouped_dataset(), 20);
        assert_eq!(result.statistics.vital_few_count, 1);
        assert_eq!(result.statistics.vital_few_ratio, 25.0);
        assert!(result.statistics.pareto_rule_achieved);
        assert_eq!(result.statistics.total, 1000.0);
    }
}
