//! Markdown export of stored analysis results.
//!
//! Renders the JSON payloads persisted by [`ResultStore`] into reports the
//! presentation layer serves as `text/markdown`. Section layout depends on
//! the analysis kind; unknown kinds still get the common header plus a raw
//! JSON block so nothing stored becomes unexportable.

use serde_json::Value;

use crate::db::{AnalysisRecord, HistoryFilter, ResultStore};
use crate::error::{AnalysisError, Result};

/// Renders stored analysis records as Markdown.
pub struct MarkdownExporter<'a> {
    store: &'a ResultStore,
}

impl<'a> MarkdownExporter<'a> {
    pub fn new(store: &'a ResultStore) -> Self {
        Self { store }
    }

    /// Export a single stored analysis by id.
    pub fn export_analysis(&self, analysis_id: i64) -> Result<String> {
        let record = self.store.get_result(analysis_id)?.ok_or_else(|| {
            AnalysisError::Validation(format!("Analysis result {} not found", analysis_id))
        })?;
        Ok(render_record(&record))
    }

    /// Export every stored analysis for a session as one report.
    pub fn export_session(&self, session_id: &str) -> Result<String> {
        let summary = self.store.session_summary(session_id)?;
        let mut records = self.store.get_results(&HistoryFilter {
            session_id: Some(session_id.to_string()),
            limit: 500,
            ..Default::default()
        })?;
        if summary.is_none() && records.is_empty() {
            return Err(AnalysisError::DatasetNotFound(session_id.to_string()));
        }
        // Chronological order reads better in a report.
        records.reverse();

        let mut out = String::new();
        out.push_str("# Q-Storm 分析レポート\n\n");
        out.push_str(&format!("- セッションID: {}\n", session_id));
        if let Some(summary) = &summary {
            out.push_str(&format!(
                "- 店舗: {}\n",
                summary.store.as_deref().unwrap_or("全店舗")
            ));
            out.push_str(&format!("- 作成日時: {}\n", summary.created_at));
        } else {
            out.push_str("- 店舗: 全店舗\n");
        }
        out.push_str(&format!("- 分析件数: {}\n", records.len()));

        for record in &records {
            out.push_str("\n---\n\n");
            out.push_str(&render_record(record));
        }
        Ok(out)
    }
}

fn render_record(record: &AnalysisRecord) -> String {
    let title = match record.analysis_type.as_str() {
        "timeseries" => "時系列分析",
        "histogram" => "ヒストグラム分析",
        "pareto" => "パレート分析",
        "comparison" => "店舗比較分析",
        other => other,
    };

    let mut out = String::new();
    out.push_str(&format!("## {}\n\n", title));
    out.push_str(&format!(
        "- 分析ID: {}\n",
        record.id.map(|id| id.to_string()).unwrap_or_default()
    ));
    out.push_str(&format!("- セッションID: {}\n", record.session_id));
    out.push_str(&format!(
        "- 実行日時: {}\n",
        record.created_at.as_deref().unwrap_or("-")
    ));
    out.push_str(&format!("- 実行時間: {:.3}秒\n", record.execution_time));
    if let Some(store) = &record.store {
        out.push_str(&format!("- 店舗: {}\n", store));
    }
    if let Some(column) = &record.target_column {
        out.push_str(&format!("- 対象指標: {}\n", column));
    }

    if let Value::Object(params) = &record.parameters {
        if !params.is_empty() {
            out.push_str("\n### パラメータ\n\n");
            out.push_str("| パラメータ | 値 |\n|---|---|\n");
            for (key, value) in params {
                out.push_str(&format!("| {} | {} |\n", key, scalar(value)));
            }
        }
    }

    out.push_str("\n### 結果\n\n");
    match record.analysis_type.as_str() {
        "timeseries" => render_timeseries(&mut out, &record.results),
        "histogram" => render_histogram(&mut out, &record.results),
        "pareto" => render_pareto(&mut out, &record.results),
        "comparison" => render_comparison(&mut out, &record.results),
        _ => {
            out.push_str("```json\n");
            out.push_str(&serde_json::to_string_pretty(&record.results).unwrap_or_default());
            out.push_str("\n```\n");
        }
    }
    out
}

fn render_timeseries(out: &mut String, results: &Value) {
    let stats = &results["statistics"];
    out.push_str("| 統計量 | 値 |\n|---|---|\n");
    push_stat(out, "データ点数", &stats["count"]);
    push_stat(out, "合計", &stats["total"]);
    push_stat(out, "平均", &stats["mean"]);
    push_stat(out, "中央値", &stats["median"]);
    push_stat(out, "標準偏差", &stats["std"]);
    push_stat(out, "最小値", &stats["min"]);
    push_stat(out, "最大値", &stats["max"]);
    push_stat(out, "トレンド傾き", &stats["slope"]);
    push_stat(out, "決定係数 R²", &stats["r_squared"]);
}

fn render_histogram(out: &mut String, results: &Value) {
    let stats = &results["statistics"];
    out.push_str("| 統計量 | 値 |\n|---|---|\n");
    push_stat(out, "データ点数", &stats["count"]);
    push_stat(out, "平均", &stats["mean"]);
    push_stat(out, "中央値", &stats["median"]);
    push_stat(out, "標準偏差", &stats["std"]);
    push_stat(out, "歪度", &stats["skewness"]);
    push_stat(out, "尖度", &stats["kurtosis"]);
    push_stat(out, "Shapiro-Wilk W", &stats["shapiro_statistic"]);
    push_stat(out, "Shapiro-Wilk p値", &stats["shapiro_p_value"]);
    let verdict = if stats["is_normal"].as_bool().unwrap_or(false) {
        "正規分布とみなせる"
    } else {
        "正規分布とみなせない"
    };
    out.push_str(&format!("| 正規性判定 | {} |\n", verdict));
}

fn render_pareto(out: &mut String, results: &Value) {
    let stats = &results["statistics"];
    out.push_str("| 統計量 | 値 |\n|---|---|\n");
    push_stat(out, "合計", &stats["total"]);
    push_stat(out, "カテゴリ数", &stats["category_count"]);
    push_stat(out, "上位カテゴリ数 (80%)", &stats["vital_few_count"]);
    push_stat(out, "上位カテゴリ比率 (%)", &stats["vital_few_ratio"]);

    let counts = &stats["abc_counts"];
    out.push_str("\n#### ABC分類\n\n");
    out.push_str("| ランク | カテゴリ数 |\n|---|---|\n");
    push_stat(out, "A", &counts["a"]);
    push_stat(out, "B", &counts["b"]);
    push_stat(out, "C", &counts["c"]);

    if let (Some(categories), Some(values)) =
        (results["categories"].as_array(), results["values"].as_array())
    {
        out.push_str("\n#### 上位カテゴリ\n\n");
        out.push_str("| カテゴリ | 値 |\n|---|---|\n");
        for (category, value) in categories.iter().zip(values).take(10) {
            out.push_str(&format!(
                "| {} | {} |\n",
                category.as_str().unwrap_or("-"),
                scalar(value)
            ));
        }
    }
}

fn render_comparison(out: &mut String, results: &Value) {
    if let Some(stores) = results["stores"].as_object() {
        out.push_str("| 店舗 | 合計 |\n|---|---|\n");
        for (store, info) in stores {
            out.push_str(&format!("| {} | {} |\n", store, scalar(&info["total"])));
        }
    }
    if let Some(differences) = results["differences"].as_array() {
        out.push_str("\n#### カテゴリ差分\n\n");
        out.push_str("| カテゴリ | 差分 |\n|---|---|\n");
        for diff in differences {
            out.push_str(&format!(
                "| {} | {} |\n",
                diff["category"].as_str().unwrap_or("-"),
                scalar(&diff["difference"])
            ));
        }
    }
    if let Some(summary) = results["summary"].as_str() {
        out.push_str("\n#### 要約\n\n");
        out.push_str(summary);
        out.push('\n');
    }
}

fn push_stat(out: &mut String, label: &str, value: &Value) {
    out.push_str(&format!("| {} | {} |\n", label, scalar(value)));
}

/// Render a JSON scalar for a table cell. Whole numbers drop the fraction;
/// other floats are rounded to two decimals.
fn scalar(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            Some(f) => format!("{:.2}", f),
            None => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::AnalysisRecord;
    use serde_json::json;
    use tempfile::TempDir;

    fn store_with_records() -> (TempDir, ResultStore, i64) {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::new(dir.path().join("results.db")).unwrap();
        store.save_session("session_exp", Some("恵比寿"), None).unwrap();

        let ts = AnalysisRecord {
            id: None,
            session_id: "session_exp".to_string(),
            analysis_type: "timeseries".to_string(),
            store: Some("恵比寿".to_string()),
            target_column: Some("売上金額".to_string()),
            created_at: None,
            parameters: json!({"time_unit": "month"}),
            results: json!({"statistics": {
                "count": 12, "total": 120000.0, "mean": 10000.0, "median": 9800.0,
                "std": 1500.0, "min": 7200.0, "max": 13100.0,
                "slope": 120.5, "r_squared": 0.82
            }}),
            execution_time: 0.031,
        };
        let id = store.save_result(&ts).unwrap();

        let pareto = AnalysisRecord {
            analysis_type: "pareto".to_string(),
            parameters: json!({"top_n": 20}),
            results: json!({
                "categories": ["トップス", "ボトムス"],
                "values": [900.0, 100.0],
                "statistics": {
                    "total": 1000.0, "category_count": 2,
                    "vital_few_count": 1, "vital_few_ratio": 50.0,
                    "abc_counts": {"a": 1, "b": 1, "c": 0}
                }
            }),
            ..ts.clone()
        };
        store.save_result(&pareto).unwrap();

        (dir, store, id)
    }

    #[test]
    fn test_export_single_analysis_has_required_fields() {
        let (_dir, store, id) = store_with_records();
        let md = MarkdownExporter::new(&store).export_analysis(id).unwrap();
        assert!(md.contains("時系列分析"));
        assert!(md.contains("分析ID"));
        assert!(md.contains("セッションID"));
        assert!(md.contains("実行日時"));
        assert!(md.contains("実行時間: 0.031秒"));
        assert!(md.contains("| 合計 | 120000 |"));
        assert!(md.contains("| 決定係数 R² | 0.82 |"));
    }

    #[test]
    fn test_export_pareto_includes_abc_table() {
        let (_dir, store, _) = store_with_records();
        let md = MarkdownExporter::new(&store).export_session("session_exp").unwrap();
        assert!(md.contains("ABC分類"));
        assert!(md.contains("| トップス | 900 |"));
    }

    #[test]
    fn test_export_session_header_and_count() {
        let (_dir, store, _) = store_with_records();
        let md = MarkdownExporter::new(&store).export_session("session_exp").unwrap();
        assert!(md.starts_with("# Q-Storm 分析レポート"));
        assert!(md.contains("- セッションID: session_exp"));
        assert!(md.contains("- 店舗: 恵比寿"));
        assert!(md.contains("- 分析件数: 2"));
    }

    #[test]
    fn test_export_missing_ids_error() {
        let (_dir, store, _) = store_with_records();
        let exporter = MarkdownExporter::new(&store);
        assert!(matches!(
            exporter.export_analysis(99_999).unwrap_err(),
            AnalysisError::Validation(_)
        ));
        assert!(matches!(
            exporter.export_session("session_nonexistent").unwrap_err(),
            AnalysisError::DatasetNotFound(_)
        ));
    }
}
