//! Store-comparison evidence aggregation.
//!
//! Produces the structured per-store category evidence consumed by the
//! narrative generator. Supports both layouts an upload may arrive in:
//! pre-aggregated category/value pairs per store, and raw rows where the
//! category dimension is a family of product columns. The aggregator never
//! produces prose; that is the narrative collaborator's job.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::dataset::Dataset;
use crate::error::{AnalysisError, Result};
use crate::schema;

/// Category/value column pairs that mark a pre-aggregated layout,
/// highest priority first.
const PREAGGREGATED_CANDIDATES: &[(&str, &str)] = &[
    ("pareto_category", "pareto_value"),
    ("category", "value"),
    ("category", "total"),
];

/// Display labels for the well-known product-family columns.
const CATEGORY_LABELS: &[(&str, &str)] = &[
    ("Mens_JACKETS&OUTER2", "メンズ ジャケット・アウター"),
    ("Mens_KNIT", "メンズ ニット"),
    ("Mens_PANTS", "メンズ パンツ"),
    ("WOMEN'S_JACKETS2", "レディース ジャケット"),
    ("WOMEN'S_TOPS", "レディース トップス"),
    ("WOMEN'S_ONEPIECE", "レディース ワンピース"),
    ("WOMEN'S_bottoms", "レディース ボトムス"),
    ("WOMEN'S_SCARF & STOLES", "レディース スカーフ・ストール"),
];

/// How many top categories and differences the evidence carries per store.
const TOP_CATEGORIES: usize = 5;
const TOP_DIFFERENCES: usize = 5;

/// One category's contribution within a store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryShare {
    pub category: String,
    pub value: f64,
    /// Share of the store's total, percent, rounded to 1 decimal.
    pub share_pct: f64,
}

/// Per-store summary: overall total and the leading categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreEvidence {
    pub total: f64,
    pub top_categories: Vec<CategoryShare>,
}

/// Signed per-category gap between the two stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryDifference {
    pub category: String,
    pub store_a: f64,
    pub store_b: f64,
    /// store_a minus store_b, rounded to 2 decimals.
    pub difference: f64,
}

/// The full evidence payload handed to the narrative generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonEvidence {
    pub stores: BTreeMap<String, StoreEvidence>,
    /// The largest-magnitude category gaps, descending by |difference|.
    pub differences: Vec<CategoryDifference>,
}

/// Compare two stores' category mix and produce structured evidence.
pub fn compare_stores(
    dataset: &Dataset,
    store_a: &str,
    store_b: &str,
) -> Result<ComparisonEvidence> {
    if dataset.is_empty() {
        return Err(AnalysisError::EmptyResult(
            "Dataset contains no rows to compare".to_string(),
        ));
    }

    let store_column = schema::find_store_column(dataset).ok_or_else(|| {
        AnalysisError::Schema("Store column not present in dataset".to_string())
    })?;

    let labels = dataset
        .string_values(store_column)
        .unwrap_or_else(|| vec![None; dataset.n_rows()]);
    let rows: Vec<usize> = labels
        .iter()
        .enumerate()
        .filter(|(_, v)| {
            matches!(v.as_deref(), Some(s) if s == store_a || s == store_b)
        })
        .map(|(i, _)| i)
        .collect();
    if rows.is_empty() {
        return Err(AnalysisError::EmptyResult(
            "No records found for the requested stores".to_string(),
        ));
    }
    let working = dataset.select_rows(&rows);

    let totals = collect_category_totals(&working, store_column, store_a, store_b)?;
    let empty = HashMap::new();
    let totals_a = totals.get(store_a).unwrap_or(&empty);
    let totals_b = totals.get(store_b).unwrap_or(&empty);
    if totals_a.is_empty() || totals_b.is_empty() {
        return Err(AnalysisError::EmptyResult(
            "Per-store category aggregation produced no data".to_string(),
        ));
    }

    let mut stores = BTreeMap::new();
    for (store, store_totals) in [(store_a, totals_a), (store_b, totals_b)] {
        stores.insert(store.to_string(), build_store_evidence(store_totals));
    }

    Ok(ComparisonEvidence {
        differences: build_differences(totals_a, totals_b),
        stores,
    })
}

/// Category totals per store, pre-aggregated layout first.
fn collect_category_totals(
    dataset: &Dataset,
    store_column: &str,
    store_a: &str,
    store_b: &str,
) -> Result<HashMap<String, HashMap<String, f64>>> {
    if let Some(totals) = extract_preaggregated(dataset, store_column) {
        debug!("Using pre-aggregated category/value columns");
        return Ok(totals);
    }
    aggregate_from_columns(dataset, store_column, store_a, store_b)
}

/// Grouped store x category sum over an explicit category/value column
/// pair, keeping only positive totals. Returns None when no candidate pair
/// yields any data.
fn extract_preaggregated(
    dataset: &Dataset,
    store_column: &str,
) -> Option<HashMap<String, HashMap<String, f64>>> {
    for (category_col, value_col) in PREAGGREGATED_CANDIDATES {
        if !dataset.has_column(category_col) || !dataset.has_column(value_col) {
            continue;
        }
        let stores = dataset.string_values(store_column)?;
        let categories = dataset.string_values(category_col)?;
        let values = dataset.numeric_values(value_col)?;

        let mut grouped: HashMap<String, HashMap<String, f64>> = HashMap::new();
        for i in 0..dataset.n_rows() {
            let (store, category, value) = match (&stores[i], &categories[i], values[i]) {
                (Some(s), Some(c), Some(v)) if v.is_finite() => (s, c, v),
                _ => continue,
            };
            *grouped
                .entry(store.clone())
                .or_default()
                .entry(category.clone())
                .or_insert(0.0) += value;
        }
        for totals in grouped.values_mut() {
            totals.retain(|_, v| *v > 0.0);
        }
        if grouped.values().any(|t| !t.is_empty()) {
            return Some(grouped);
        }
    }
    None
}

/// Per-store sums over category columns: the product-family columns when
/// present, otherwise every numeric column except the store/date roles.
/// Only positive totals are kept.
fn aggregate_from_columns(
    dataset: &Dataset,
    store_column: &str,
    store_a: &str,
    store_b: &str,
) -> Result<HashMap<String, HashMap<String, f64>>> {
    let mut candidates = schema::family_columns(dataset);
    if candidates.is_empty() {
        candidates = dataset
            .columns()
            .iter()
            .filter(|c| c.is_numeric())
            .map(|c| c.name.clone())
            .filter(|name| {
                name != store_column && !schema::DATE_CANDIDATES.contains(&name.as_str())
            })
            .collect();
    }

    let stores = dataset
        .string_values(store_column)
        .unwrap_or_else(|| vec![None; dataset.n_rows()]);

    let mut results: HashMap<String, HashMap<String, f64>> = HashMap::new();
    for store in [store_a, store_b] {
        let rows: Vec<usize> = stores
            .iter()
            .enumerate()
            .filter(|(_, v)| v.as_deref() == Some(store))
            .map(|(i, _)| i)
            .collect();
        let store_rows = dataset.select_rows(&rows);

        let mut totals = HashMap::new();
        for column in &candidates {
            let sum: f64 = store_rows
                .numeric_values(column)
                .unwrap_or_default()
                .into_iter()
                .flatten()
                .filter(|v| v.is_finite())
                .sum();
            if sum > 0.0 {
                totals.insert(display_label(column), round2(sum));
            }
        }
        results.insert(store.to_string(), totals);
    }
    Ok(results)
}

fn build_store_evidence(totals: &HashMap<String, f64>) -> StoreEvidence {
    let total: f64 = totals.values().sum();

    let mut ranked: Vec<(&String, &f64)> = totals.iter().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));

    let top_categories = ranked
        .into_iter()
        .take(TOP_CATEGORIES)
        .map(|(category, value)| CategoryShare {
            category: category.clone(),
            value: round2(*value),
            share_pct: if total > 0.0 {
                round1(value / total * 100.0)
            } else {
                0.0
            },
        })
        .collect();

    StoreEvidence {
        total: round2(total),
        top_categories,
    }
}

fn build_differences(
    totals_a: &HashMap<String, f64>,
    totals_b: &HashMap<String, f64>,
) -> Vec<CategoryDifference> {
    let mut categories: Vec<&String> = totals_a.keys().chain(totals_b.keys()).collect();
    categories.sort();
    categories.dedup();

    let mut differences: Vec<CategoryDifference> = categories
        .into_iter()
        .map(|category| {
            let value_a = totals_a.get(category).copied().unwrap_or(0.0);
            let value_b = totals_b.get(category).copied().unwrap_or(0.0);
            CategoryDifference {
                category: category.clone(),
                store_a: round2(value_a),
                store_b: round2(value_b),
                difference: round2(value_a - value_b),
            }
        })
        .collect();

    differences.sort_by(|a, b| {
        b.difference
            .abs()
            .partial_cmp(&a.difference.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    differences.truncate(TOP_DIFFERENCES);
    differences
}

fn display_label(column: &str) -> String {
    CATEGORY_LABELS
        .iter()
        .find(|(name, _)| *name == column)
        .map(|(_, label)| (*label).to_string())
        .unwrap_or_else(|| column.to_string())
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
