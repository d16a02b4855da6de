//! Caller-input validation.
//!
//! Every analysis request passes through these checks before any file or
//! database access. Failures are [`AnalysisError::Validation`] and carry
//! messages safe to surface to the caller.

use crate::config::AppConfig;
use crate::error::{AnalysisError, Result};
use crate::timeseries::TimeUnit;

/// Histogram bin bounds and default.
pub const MIN_BINS: usize = 2;
pub const MAX_BINS: usize = 200;
pub const DEFAULT_BINS: usize = 20;

/// Pareto top-N bounds and default.
pub const MIN_TOP_N: usize = 5;
pub const MAX_TOP_N: usize = 100;
pub const DEFAULT_TOP_N: usize = 20;

/// History query limit bounds and default.
pub const MIN_LIMIT: usize = 1;
pub const MAX_LIMIT: usize = 500;
pub const DEFAULT_LIMIT: usize = 50;

const MAX_STORE_LEN: usize = 100;

/// Validate a session identifier: `session_` prefix followed by ASCII
/// alphanumerics, underscores, or hyphens. Path separators and traversal
/// sequences are rejected outright.
pub fn validate_session_id(session_id: Option<&str>) -> Result<String> {
    let session_id = session_id
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AnalysisError::Validation("session_id is required".to_string()))?;

    if session_id.contains("..") || session_id.contains('/') || session_id.contains('\\') {
        return Err(AnalysisError::Validation(
            "Invalid session_id: path traversal detected".to_string(),
        ));
    }

    let suffix = session_id
        .strip_prefix("session_")
        .filter(|rest| !rest.is_empty());
    let valid = suffix
        .map(|rest| {
            rest.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        })
        .unwrap_or(false);
    if !valid {
        return Err(AnalysisError::Validation(
            "Invalid session_id format".to_string(),
        ));
    }
    Ok(session_id.to_string())
}

/// Validate the requested metric against the configured allow-list.
/// Defaults to the first allowed metric when absent.
pub fn validate_metric(config: &AppConfig, metric: Option<&str>) -> Result<String> {
    let metric = match metric.map(str::trim).filter(|m| !m.is_empty()) {
        Some(m) => m.to_string(),
        None => config
            .valid_metrics
            .first()
            .cloned()
            .ok_or_else(|| AnalysisError::Config("No metrics configured".to_string()))?,
    };
    if !config.valid_metrics.iter().any(|m| m == &metric) {
        return Err(AnalysisError::Validation(format!(
            "Invalid metric. Must be one of: {}",
            config.valid_metrics.join(", ")
        )));
    }
    Ok(metric)
}

/// Validate the aggregation unit. Defaults to monthly.
pub fn validate_time_unit(time_unit: Option<&str>) -> Result<TimeUnit> {
    match time_unit.map(str::trim).filter(|u| !u.is_empty()) {
        None => Ok(TimeUnit::Month),
        Some(raw) => TimeUnit::parse(raw).ok_or_else(|| {
            AnalysisError::Validation(
                "Invalid time_unit. Must be one of: day, week, month, year".to_string(),
            )
        }),
    }
}

/// Validate the histogram bin count. Defaults to 20.
pub fn validate_bins(bins: Option<i64>) -> Result<usize> {
    match bins {
        None => Ok(DEFAULT_BINS),
        Some(b) if (MIN_BINS as i64..=MAX_BINS as i64).contains(&b) => Ok(b as usize),
        Some(_) => Err(AnalysisError::Validation(format!(
            "bins must be between {} and {}",
            MIN_BINS, MAX_BINS
        ))),
    }
}

/// Validate the Pareto top-N. Out-of-range values fall back to the default
/// rather than failing; the truncation is display-only.
pub fn validate_top_n(top_n: Option<i64>) -> usize {
    match top_n {
        Some(n) if (MIN_TOP_N as i64..=MAX_TOP_N as i64).contains(&n) => n as usize,
        _ => DEFAULT_TOP_N,
    }
}

/// Validate a history query limit. Out-of-range values fall back to the
/// default.
pub fn validate_limit(limit: Option<i64>) -> usize {
    match limit {
        Some(n) if (MIN_LIMIT as i64..=MAX_LIMIT as i64).contains(&n) => n as usize,
        _ => DEFAULT_LIMIT,
    }
}

/// Validate an optional store name: bounded length and a character class
/// covering word characters, hyphens, spaces, and the Japanese scripts
/// store names are written in. Empty input means "no store filter".
pub fn validate_store(store: Option<&str>) -> Result<Option<String>> {
    let store = match store.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s,
        None => return Ok(None),
    };
    if store.chars().count() > MAX_STORE_LEN {
        return Err(AnalysisError::Validation(
            "store value is too long".to_string(),
        ));
    }
    if !store.chars().all(is_store_char) {
        return Err(AnalysisError::Validation(
            "store contains invalid characters".to_string(),
        ));
    }
    Ok(Some(store.to_string()))
}

fn is_store_char(c: char) -> bool {
    c.is_alphanumeric()
        || c == '_'
        || c == '-'
        || c == ' '
        || c == 'ー'
        || c == '・'
        || ('ぁ'..='ゔ').contains(&c)
        || ('ァ'..='ヺ').contains(&c)
        || ('一'..='龥').contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_accepts_valid_format() {
        assert_eq!(
            validate_session_id(Some("session_abc-123")).unwrap(),
            "session_abc-123"
        );
    }

    #[test]
    fn test_session_id_rejects_traversal() {
        assert!(validate_session_id(Some("session_../etc")).is_err());
        assert!(validate_session_id(Some("session_a/b")).is_err());
        assert!(validate_session_id(Some("session_a\\b")).is_err());
    }

    #[test]
    fn test_session_id_rejects_bad_format() {
        assert!(validate_session_id(None).is_err());
        assert!(validate_session_id(Some("")).is_err());
        assert!(validate_session_id(Some("mysession_1")).is_err());
        assert!(validate_session_id(Some("session_")).is_err());
        assert!(validate_session_id(Some("session_日本")).is_err());
    }

    #[test]
    fn test_metric_allow_list() {
        let config = AppConfig::default();
        assert_eq!(
            validate_metric(&config, Some("売上金額")).unwrap(),
            "売上金額"
        );
        assert_eq!(validate_metric(&config, None).unwrap(), "売上金額");
        assert!(validate_metric(&config, Some("revenue")).is_err());
    }

    #[test]
    fn test_time_unit_defaults_to_month() {
        assert_eq!(validate_time_unit(None).unwrap(), TimeUnit::Month);
        assert_eq!(validate_time_unit(Some("週")).unwrap(), TimeUnit::Week);
        assert!(validate_time_unit(Some("decade")).is_err());
    }

    #[test]
    fn test_bins_bounds() {
        assert_eq!(validate_bins(None).unwrap(), DEFAULT_BINS);
        assert_eq!(validate_bins(Some(2)).unwrap(), 2);
        assert_eq!(validate_bins(Some(200)).unwrap(), 200);
        assert!(validate_bins(Some(1)).is_err());
        assert!(validate_bins(Some(201)).is_err());
        assert!(validate_bins(Some(-5)).is_err());
    }

    #[test]
    fn test_top_n_falls_back_on_out_of_range() {
        assert_eq!(validate_top_n(Some(10)), 10);
        assert_eq!(validate_top_n(Some(4)), DEFAULT_TOP_N);
        assert_eq!(validate_top_n(Some(101)), DEFAULT_TOP_N);
        assert_eq!(validate_top_n(None), DEFAULT_TOP_N);
    }

    #[test]
    fn test_store_character_class() {
        assert_eq!(
            validate_store(Some("恵比寿")).unwrap(),
            Some("恵比寿".to_string())
        );
        assert_eq!(
            validate_store(Some("ヨコハマ-1")).unwrap(),
            Some("ヨコハマ-1".to_string())
        );
        assert_eq!(validate_store(None).unwrap(), None);
        assert_eq!(validate_store(Some("  ")).unwrap(), None);
        assert!(validate_store(Some("a;drop table")).is_err());
        let long: String = "x".repeat(101);
        assert!(validate_store(Some(&long)).is_err());
    }
}
