//! Q-Storm - a retail analytics engine for store performance data.
//!
//! # Overview
//!
//! Q-Storm analyzes retail point-of-sale exports with bilingual (Japanese /
//! English) column names. It resolves the schema automatically, filters by
//! store and date range, and runs four analyses over any configured metric:
//!
//! - **Time series**: resampling to day/week/month/year buckets with an OLS
//!   trend line
//! - **Histogram**: equal-width binning with skewness, kurtosis, and a
//!   Shapiro-Wilk normality verdict
//! - **Pareto**: category ranking with cumulative shares and ABC
//!   classification
//! - **Store comparison**: two-store category mix evidence with a narrated
//!   summary
//!
//! Results are persisted to SQLite per session and exportable as Markdown
//! reports.
//!
//! # Quick Start
//!
//! ```no_run
//! use qstorm::{
//!     config::AppConfig,
//!     service::{AnalysisRequest, AnalysisService},
//! };
//!
//! let service = AnalysisService::new(AppConfig::default()).unwrap();
//!
//! let request = AnalysisRequest {
//!     session_id: Some("session_demo".to_string()),
//!     metric: Some("売上金額".to_string()),
//!     time_unit: Some("month".to_string()),
//!     ..Default::default()
//! };
//! let response = service.analyze_timeseries(&request).unwrap();
//!
//! println!("Buckets: {}", response.result.values.len());
//! println!("Trend slope: {:.2}", response.result.statistics.slope);
//! ```
//!
//! # Modules
//!
//! - [`dataset`]: Columnar in-memory dataset (numeric, text, datetime)
//! - [`data`]: CSV and Parquet loading, session file resolution
//! - [`schema`]: Bilingual column-role resolution (dates, store, category, metric)
//! - [`filter`]: Store and date-range row filtering
//! - [`stats`]: Descriptive statistics, OLS fit, Shapiro-Wilk test
//! - [`timeseries`], [`histogram`], [`pareto`]: The analyzers
//! - [`comparison`]: Two-store category mix evidence
//! - [`narrative`]: Narrative generation seam with a templated fallback
//! - [`validate`]: Caller-input validation
//! - [`db`]: SQLite persistence of sessions and analysis history
//! - [`export`]: Markdown rendering of stored results
//! - [`service`]: Request orchestration
//! - [`config`]: TOML configuration file support

pub mod comparison;
pub mod config;
pub mod data;
pub mod dataset;
pub mod db;
pub mod error;
pub mod export;
pub mod filter;
pub mod histogram;
pub mod narrative;
pub mod pareto;
pub mod schema;
pub mod service;
pub mod stats;
pub mod timeseries;
pub mod validate;

// Re-exports for convenience
pub use comparison::{compare_stores, CategoryDifference, CategoryShare, ComparisonEvidence};
pub use config::AppConfig;
pub use data::{load_csv, load_dataset, load_parquet, load_session_dataset};
pub use dataset::{Column, ColumnData, Dataset};
pub use db::{AnalysisRecord, HistoryFilter, ResultStore, SessionSummary};
pub use error::{AnalysisError, Result};
pub use export::MarkdownExporter;
pub use filter::DatasetFilter;
pub use histogram::{HistogramAnalyzer, HistogramResult, HistogramStats};
pub use narrative::{NarrativeGenerator, TemplateNarrative};
pub use pareto::{AbcClassification, ParetoAnalyzer, ParetoResult, ParetoStats};
pub use service::{AnalysisRequest, AnalysisResponse, AnalysisService, ComparisonRequest};
pub use timeseries::{TimeSeriesAnalyzer, TimeSeriesResult, TimeSeriesStats, TimeUnit};
