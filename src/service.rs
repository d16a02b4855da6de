//! Request orchestration for the analysis engine.
//!
//! [`AnalysisService`] is the seam the HTTP layer calls into: it validates
//! caller input, loads the session dataset, runs the requested analyzer, and
//! persists the outcome. Persistence is best-effort by contract: a computed
//! analysis is returned to the caller even when the history write fails.

use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::comparison::{self, ComparisonEvidence};
use crate::config::AppConfig;
use crate::data;
use crate::db::{AnalysisRecord, HistoryFilter, ResultStore, SessionSummary};
use crate::error::{AnalysisError, Result};
use crate::export::MarkdownExporter;
use crate::filter::DatasetFilter;
use crate::histogram::{HistogramAnalyzer, HistogramResult};
use crate::narrative::{NarrativeGenerator, TemplateNarrative};
use crate::pareto::{ParetoAnalyzer, ParetoResult};
use crate::timeseries::{TimeSeriesAnalyzer, TimeSeriesResult};
use crate::validate;

/// Common request body shared by the analysis endpoints. Fields not used by
/// a given analysis kind are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisRequest {
    pub session_id: Option<String>,
    pub metric: Option<String>,
    pub store: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Time-series only.
    pub time_unit: Option<String>,
    /// Histogram only.
    pub bins: Option<i64>,
    /// Pareto only: explicit category column.
    pub category: Option<String>,
    /// Pareto only.
    pub top_n: Option<i64>,
}

/// Store comparison request body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComparisonRequest {
    pub session_id: Option<String>,
    pub store_a: Option<String>,
    pub store_b: Option<String>,
}

/// Analysis payload plus run metadata.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResponse<T> {
    /// History row id; None when persistence failed or was skipped.
    pub analysis_id: Option<i64>,
    pub session_id: String,
    /// Wall-clock seconds, rounded to milliseconds.
    pub execution_time: f64,
    pub result: T,
}

/// Store comparison payload: structured evidence plus a prose summary.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonResult {
    pub store_a: String,
    pub store_b: String,
    #[serde(flatten)]
    pub evidence: ComparisonEvidence,
    pub summary: String,
}

/// Session history payload.
#[derive(Debug, Clone, Serialize)]
pub struct SessionHistory {
    pub session: Option<SessionSummary>,
    pub analyses: Vec<AnalysisRecord>,
}

/// Validated and orchestrated access to the analysis engine.
pub struct AnalysisService {
    config: AppConfig,
    store: ResultStore,
    narrative: Box<dyn NarrativeGenerator + Send + Sync>,
}

impl AnalysisService {
    /// Open the service with the default templated narrative generator.
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate()?;
        let store = ResultStore::new(&config.db_path)?;
        Ok(Self {
            config,
            store,
            narrative: Box::new(TemplateNarrative),
        })
    }

    /// Replace the narrative generator, e.g. with an LLM-backed one.
    pub fn with_narrative(
        mut self,
        narrative: Box<dyn NarrativeGenerator + Send + Sync>,
    ) -> Self {
        self.narrative = narrative;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run a time-series analysis: validate, load, resample, persist.
    pub fn analyze_timeseries(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResponse<TimeSeriesResult>> {
        let session_id = validate::validate_session_id(request.session_id.as_deref())?;
        let metric = validate::validate_metric(&self.config, request.metric.as_deref())?;
        let unit = validate::validate_time_unit(request.time_unit.as_deref())?;
        let filter = self.build_filter(request)?;

        self.touch_session(&session_id, filter.store.as_deref());
        let dataset = self.load_dataset(&session_id)?;

        let started = Instant::now();
        let result = TimeSeriesAnalyzer::new(&dataset).analyze(&metric, unit, &filter)?;
        let execution_time = round3(started.elapsed().as_secs_f64());

        let parameters = json!({
            "metric": metric,
            "time_unit": unit.as_str(),
            "store": filter.store,
            "start_date": filter.start_date,
            "end_date": filter.end_date,
        });
        let analysis_id = self.persist(
            &session_id,
            "timeseries",
            filter.store.as_deref(),
            Some(&result.metric),
            parameters,
            serde_json::to_value(&result)?,
            execution_time,
        );

        info!(
            "timeseries analysis for {} completed in {:.3}s",
            session_id, execution_time
        );
        Ok(AnalysisResponse {
            analysis_id,
            session_id,
            execution_time,
            result,
        })
    }

    /// Run a histogram analysis.
    pub fn analyze_histogram(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResponse<HistogramResult>> {
        let session_id = validate::validate_session_id(request.session_id.as_deref())?;
        let metric = validate::validate_metric(&self.config, request.metric.as_deref())?;
        let bins = validate::validate_bins(request.bins)?;
        let filter = self.build_filter(request)?;

        self.touch_session(&session_id, filter.store.as_deref());
        let dataset = self.load_dataset(&session_id)?;

        let started = Instant::now();
        let result = HistogramAnalyzer::new(&dataset).analyze(&metric, bins, &filter)?;
        let execution_time = round3(started.elapsed().as_secs_f64());

        let parameters = json!({
            "metric": metric,
            "bins": bins,
            "store": filter.store,
            "start_date": filter.start_date,
            "end_date": filter.end_date,
        });
        let analysis_id = self.persist(
            &session_id,
            "histogram",
            filter.store.as_deref(),
            Some(&result.metric),
            parameters,
            serde_json::to_value(&result)?,
            execution_time,
        );

        info!(
            "histogram analysis for {} completed in {:.3}s",
            session_id, execution_time
        );
        Ok(AnalysisResponse {
            analysis_id,
            session_id,
            execution_time,
            result,
        })
    }

    /// Run a Pareto / ABC analysis.
    pub fn analyze_pareto(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResponse<ParetoResult>> {
        let session_id = validate::validate_session_id(request.session_id.as_deref())?;
        let metric = validate::validate_metric(&self.config, request.metric.as_deref())?;
        let top_n = validate::validate_top_n(request.top_n);
        let filter = self.build_filter(request)?;

        self.touch_session(&session_id, filter.store.as_deref());
        let dataset = self.load_dataset(&session_id)?;

        let started = Instant::now();
        let result = ParetoAnalyzer::new(&dataset).analyze(
            &metric,
            request.category.as_deref(),
            top_n,
            &filter,
        )?;
        let execution_time = round3(started.elapsed().as_secs_f64());

        let parameters = json!({
            "metric": metric,
            "category": request.category,
            "top_n": top_n,
            "store": filter.store,
            "start_date": filter.start_date,
            "end_date": filter.end_date,
        });
        let analysis_id = self.persist(
            &session_id,
            "pareto",
            filter.store.as_deref(),
            Some(&result.metric),
            parameters,
            serde_json::to_value(&result)?,
            execution_time,
        );

        info!(
            "pareto analysis for {} completed in {:.3}s",
            session_id, execution_time
        );
        Ok(AnalysisResponse {
            analysis_id,
            session_id,
            execution_time,
            result,
        })
    }

    /// Compare two stores' category mix and narrate the evidence.
    pub fn compare_stores(
        &self,
        request: &ComparisonRequest,
    ) -> Result<AnalysisResponse<ComparisonResult>> {
        let session_id = validate::validate_session_id(request.session_id.as_deref())?;
        let store_a = validate::validate_store(request.store_a.as_deref())?
            .ok_or_else(|| AnalysisError::Validation("store_a is required".to_string()))?;
        let store_b = validate::validate_store(request.store_b.as_deref())?
            .ok_or_else(|| AnalysisError::Validation("store_b is required".to_string()))?;
        if store_a == store_b {
            return Err(AnalysisError::Validation(
                "store_a and store_b must differ".to_string(),
            ));
        }

        self.touch_session(&session_id, None);
        let dataset = self.load_dataset(&session_id)?;

        let started = Instant::now();
        let evidence = comparison::compare_stores(&dataset, &store_a, &store_b)?;
        let summary = match self.narrative.generate(&store_a, &store_b, &evidence) {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Narrative generation failed, using template fallback: {}", e);
                TemplateNarrative.generate(&store_a, &store_b, &evidence)?
            }
        };
        let execution_time = round3(started.elapsed().as_secs_f64());

        let result = ComparisonResult {
            store_a: store_a.clone(),
            store_b: store_b.clone(),
            evidence,
            summary,
        };
        let parameters = json!({"store_a": store_a, "store_b": store_b});
        let analysis_id = self.persist(
            &session_id,
            "comparison",
            None,
            None,
            parameters,
            serde_json::to_value(&result)?,
            execution_time,
        );

        info!(
            "comparison of {} vs {} for {} completed in {:.3}s",
            store_a, store_b, session_id, execution_time
        );
        Ok(AnalysisResponse {
            analysis_id,
            session_id,
            execution_time,
            result,
        })
    }

    /// Most recent analyses across all sessions.
    pub fn recent_analyses(
        &self,
        analysis_type: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<AnalysisRecord>> {
        self.store.get_results(&HistoryFilter {
            analysis_type: analysis_type.map(|t| t.to_string()),
            limit: validate::validate_limit(limit),
            ..Default::default()
        })
    }

    /// Session metadata plus its analysis history, newest first.
    pub fn session_history(
        &self,
        session_id: &str,
        limit: Option<i64>,
    ) -> Result<SessionHistory> {
        let session_id = validate::validate_session_id(Some(session_id))?;
        let session = self.store.session_summary(&session_id)?;
        let analyses = self.store.get_results(&HistoryFilter {
            session_id: Some(session_id),
            limit: validate::validate_limit(limit),
            ..Default::default()
        })?;
        Ok(SessionHistory { session, analyses })
    }

    /// Markdown export of one stored analysis.
    pub fn export_analysis_markdown(&self, analysis_id: i64) -> Result<String> {
        MarkdownExporter::new(&self.store).export_analysis(analysis_id)
    }

    /// Markdown export of a whole session.
    pub fn export_session_markdown(&self, session_id: &str) -> Result<String> {
        let session_id = validate::validate_session_id(Some(session_id))?;
        MarkdownExporter::new(&self.store).export_session(&session_id)
    }

    fn build_filter(&self, request: &AnalysisRequest) -> Result<DatasetFilter> {
        Ok(DatasetFilter {
            store: validate::validate_store(request.store.as_deref())?,
            start_date: request.start_date.clone(),
            end_date: request.end_date.clone(),
        })
    }

    fn load_dataset(&self, session_id: &str) -> Result<crate::dataset::Dataset> {
        data::load_session_dataset(Path::new(&self.config.data_dir), session_id)
    }

    /// Best-effort session upsert; history must never block an analysis.
    fn touch_session(&self, session_id: &str, store: Option<&str>) {
        if let Err(e) = self.store.save_session(session_id, store, None) {
            warn!("Failed to record session {}: {}", session_id, e);
        }
    }

    /// Best-effort history write; returns the row id when it succeeded.
    #[allow(clippy::too_many_arguments)]
    fn persist(
        &self,
        session_id: &str,
        analysis_type: &str,
        store: Option<&str>,
        target_column: Option<&str>,
        parameters: serde_json::Value,
        results: serde_json::Value,
        execution_time: f64,
    ) -> Option<i64> {
        let record = AnalysisRecord {
            id: None,
            session_id: session_id.to_string(),
            analysis_type: analysis_type.to_string(),
            store: store.map(|s| s.to_string()),
            target_column: target_column.map(|c| c.to_string()),
            created_at: None,
            parameters,
            results,
            execution_time,
        };
        match self.store.save_result(&record) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Failed to persist {} result: {}", analysis_type, e);
                None
            }
        }
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
