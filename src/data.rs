//! Dataset loading from session directories.
//!
//! Each session owns a directory under the data root containing one prepared
//! dataset file. CSV and Parquet are supported; format is determined by file
//! extension. CSV columns are typed by inference: a column is numeric only
//! when every non-empty cell parses as a number.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::dataset::{parse_numeric_cell, Column, ColumnData, Dataset};
use crate::error::{AnalysisError, Result};

/// Dataset file names checked first, in priority order.
const PREFERRED_NAMES: [&str; 10] = [
    "cleaned_data.parquet",
    "analysis_ready.parquet",
    "prepared_dataset.parquet",
    "dataframe.parquet",
    "cleaned_data.csv",
    "analysis_ready.csv",
    "dataset.csv",
    "data.csv",
    "original_file.csv",
    "original_file.xlsx",
];

/// Extension fallback order when no preferred name is present.
const EXTENSION_PRIORITY: [&str; 5] = ["parquet", "feather", "csv", "xlsx", "xls"];

/// Supported dataset file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Csv,
    Parquet,
}

impl DataFormat {
    /// Detect format from file extension.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "csv" => Some(DataFormat::Csv),
            "parquet" | "pq" => Some(DataFormat::Parquet),
            _ => None,
        }
    }
}

/// Load a dataset file, dispatching on extension.
pub fn load_dataset(path: impl AsRef<Path>) -> Result<Dataset> {
    let path = path.as_ref();
    match DataFormat::from_path(path) {
        Some(DataFormat::Csv) => load_csv(path),
        Some(DataFormat::Parquet) => load_parquet(path),
        None => Err(AnalysisError::DatasetLoad(format!(
            "Unsupported dataset format: {}. Supported: .csv, .parquet",
            path.display()
        ))),
    }
}

/// Locate the dataset file inside a session directory: preferred names
/// first, then any file in extension-priority order (alphabetical within
/// an extension).
pub fn locate_session_file(session_dir: &Path) -> Option<PathBuf> {
    for name in PREFERRED_NAMES {
        let candidate = session_dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    let mut entries: Vec<PathBuf> = std::fs::read_dir(session_dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    entries.sort();

    for ext in EXTENSION_PRIORITY {
        let found = entries.iter().find(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case(ext))
                .unwrap_or(false)
        });
        if let Some(path) = found {
            return Some(path.clone());
        }
    }
    None
}

/// Load the dataset for a session from `<data_root>/<session_id>/`.
pub fn load_session_dataset(data_root: &Path, session_id: &str) -> Result<Dataset> {
    let session_dir = data_root.join(session_id);
    if !session_dir.is_dir() {
        return Err(AnalysisError::DatasetNotFound(session_id.to_string()));
    }
    let data_file = locate_session_file(&session_dir)
        .ok_or_else(|| AnalysisError::DatasetNotFound(session_id.to_string()))?;
    debug!("Session {} resolved to {}", session_id, data_file.display());
    load_dataset(&data_file)
}

/// Load a dataset from a CSV file.
///
/// All cells are read as text, then each column is typed: numeric when every
/// non-empty cell parses (comma thousands separators allowed), text
/// otherwise. Empty cells become missing values either way.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Dataset> {
    let path = path.as_ref();
    info!("Loading CSV data from: {}", path.display());

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    if headers.is_empty() {
        return Err(AnalysisError::DatasetLoad(format!(
            "Dataset file has no columns: {}",
            path.display()
        )));
    }

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        for (i, column) in cells.iter_mut().enumerate() {
            let cell = record.get(i).map(str::trim).filter(|s| !s.is_empty());
            column.push(cell.map(|s| s.to_string()));
        }
    }

    if cells[0].is_empty() {
        return Err(AnalysisError::DatasetLoad(format!(
            "Dataset file is empty: {}",
            path.display()
        )));
    }

    let columns: Vec<Column> = headers
        .into_iter()
        .zip(cells)
        .map(|(name, column)| Column::new(name, type_column(column)))
        .collect();

    let dataset = Dataset::new(columns)?;
    info!(
        "Loaded {} rows x {} columns from CSV",
        dataset.n_rows(),
        dataset.n_columns()
    );
    Ok(dataset)
}

/// A column is numeric only when every non-empty cell parses as a number
/// and at least one cell is non-empty.
fn type_column(cells: Vec<Option<String>>) -> ColumnData {
    let mut any_value = false;
    let all_numeric = cells.iter().all(|cell| match cell {
        None => true,
        Some(text) => {
            any_value = true;
            parse_numeric_cell(text).is_some()
        }
    });

    if any_value && all_numeric {
        ColumnData::Numeric(
            cells
                .into_iter()
                .map(|cell| cell.as_deref().and_then(parse_numeric_cell))
                .collect(),
        )
    } else {
        ColumnData::Text(cells)
    }
}

/// Load a dataset from a Parquet file.
///
/// Column typing follows the Arrow schema: integer and floating types become
/// numeric columns, UTF-8 becomes text, timestamp and date types become
/// datetime. Columns of any other type are kept as all-missing text so the
/// schema stays intact.
pub fn load_parquet(path: impl AsRef<Path>) -> Result<Dataset> {
    use arrow::array::RecordBatchReader;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    let path = path.as_ref();
    info!("Loading Parquet data from: {}", path.display());

    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| AnalysisError::DatasetLoad(format!("Failed to open parquet file: {}", e)))?;
    let reader = builder
        .build()
        .map_err(|e| AnalysisError::DatasetLoad(format!("Failed to build parquet reader: {}", e)))?;

    let schema = reader.schema();
    debug!("Parquet schema: {:?}", schema);

    let names: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
    let mut columns: Vec<ColumnData> = schema
        .fields()
        .iter()
        .map(|field| empty_column_for(field.data_type()))
        .collect();

    for batch_result in reader {
        let batch = batch_result
            .map_err(|e| AnalysisError::DatasetLoad(format!("Failed to read parquet batch: {}", e)))?;
        for (idx, column) in columns.iter_mut().enumerate() {
            append_arrow_column(column, batch.column(idx).as_ref(), &names[idx]);
        }
    }

    let n_rows = columns.first().map(|c| c.len()).unwrap_or(0);
    if n_rows == 0 {
        return Err(AnalysisError::DatasetLoad(format!(
            "Dataset file is empty: {}",
            path.display()
        )));
    }

    let dataset = Dataset::new(
        names
            .into_iter()
            .zip(columns)
            .map(|(name, data)| Column::new(name, data))
            .collect(),
    )?;
    info!(
        "Loaded {} rows x {} columns from Parquet",
        dataset.n_rows(),
        dataset.n_columns()
    );
    Ok(dataset)
}

fn empty_column_for(data_type: &arrow::datatypes::DataType) -> ColumnData {
    use arrow::datatypes::DataType;

    match data_type {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64
        | DataType::Float32
        | DataType::Float64 => ColumnData::Numeric(Vec::new()),
        DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64 => {
            ColumnData::Datetime(Vec::new())
        }
        _ => ColumnData::Text(Vec::new()),
    }
}

fn append_arrow_column(column: &mut ColumnData, array: &dyn arrow::array::Array, name: &str) {
    use arrow::array::{
        Array, BooleanArray, Date32Array, Date64Array, Float32Array, Float64Array, Int16Array,
        Int32Array, Int64Array, Int8Array, LargeStringArray, StringArray,
        TimestampMicrosecondArray, TimestampMillisecondArray, TimestampNanosecondArray,
        TimestampSecondArray, UInt16Array, UInt32Array, UInt64Array, UInt8Array,
    };
    use chrono::DateTime;

    macro_rules! push_numeric {
        ($arr:expr, $target:expr) => {
            for i in 0..$arr.len() {
                $target.push(if $arr.is_null(i) {
                    None
                } else {
                    Some($arr.value(i) as f64)
                });
            }
        };
    }

    match column {
        ColumnData::Numeric(values) => {
            if let Some(arr) = array.as_any().downcast_ref::<Float64Array>() {
                push_numeric!(arr, values);
            } else if let Some(arr) = array.as_any().downcast_ref::<Float32Array>() {
                push_numeric!(arr, values);
            } else if let Some(arr) = array.as_any().downcast_ref::<Int64Array>() {
                push_numeric!(arr, values);
            } else if let Some(arr) = array.as_any().downcast_ref::<Int32Array>() {
                push_numeric!(arr, values);
            } else if let Some(arr) = array.as_any().downcast_ref::<Int16Array>() {
                push_numeric!(arr, values);
            } else if let Some(arr) = array.as_any().downcast_ref::<Int8Array>() {
                push_numeric!(arr, values);
            } else if let Some(arr) = array.as_any().downcast_ref::<UInt64Array>() {
                push_numeric!(arr, values);
            } else if let Some(arr) = array.as_any().downcast_ref::<UInt32Array>() {
                push_numeric!(arr, values);
            } else if let Some(arr) = array.as_any().downcast_ref::<UInt16Array>() {
                push_numeric!(arr, values);
            } else if let Some(arr) = array.as_any().downcast_ref::<UInt8Array>() {
                push_numeric!(arr, values);
            } else {
                warn!("Column {} has unexpected numeric type, filling missing", name);
                values.extend(std::iter::repeat(None).take(array.len()));
            }
        }
        ColumnData::Datetime(values) => {
            if let Some(arr) = array.as_any().downcast_ref::<TimestampMillisecondArray>() {
                for i in 0..arr.len() {
                    values.push((!arr.is_null(i)).then(|| arr.value(i)).and_then(|v| {
                        DateTime::from_timestamp_millis(v).map(|dt| dt.naive_utc())
                    }));
                }
            } else if let Some(arr) = array.as_any().downcast_ref::<TimestampMicrosecondArray>() {
                for i in 0..arr.len() {
                    values.push((!arr.is_null(i)).then(|| arr.value(i)).and_then(|v| {
                        DateTime::from_timestamp_micros(v).map(|dt| dt.naive_utc())
                    }));
                }
            } else if let Some(arr) = array.as_any().downcast_ref::<TimestampNanosecondArray>() {
                for i in 0..arr.len() {
                    values.push(
                        (!arr.is_null(i))
                            .then(|| DateTime::from_timestamp_nanos(arr.value(i)).naive_utc()),
                    );
                }
            } else if let Some(arr) = array.as_any().downcast_ref::<TimestampSecondArray>() {
                for i in 0..arr.len() {
                    values.push((!arr.is_null(i)).then(|| arr.value(i)).and_then(|v| {
                        DateTime::from_timestamp(v, 0).map(|dt| dt.naive_utc())
                    }));
                }
            } else if let Some(arr) = array.as_any().downcast_ref::<Date32Array>() {
                // Days since the Unix epoch.
                for i in 0..arr.len() {
                    values.push((!arr.is_null(i)).then(|| arr.value(i)).and_then(|days| {
                        DateTime::from_timestamp(days as i64 * 86_400, 0).map(|dt| dt.naive_utc())
                    }));
                }
            } else if let Some(arr) = array.as_any().downcast_ref::<Date64Array>() {
                for i in 0..arr.len() {
                    values.push((!arr.is_null(i)).then(|| arr.value(i)).and_then(|v| {
                        DateTime::from_timestamp_millis(v).map(|dt| dt.naive_utc())
                    }));
                }
            } else {
                warn!("Column {} has unexpected timestamp type, filling missing", name);
                values.extend(std::iter::repeat(None).take(array.len()));
            }
        }
        ColumnData::Text(values) => {
            if let Some(arr) = array.as_any().downcast_ref::<StringArray>() {
                for i in 0..arr.len() {
                    values.push((!arr.is_null(i)).then(|| arr.value(i).to_string()));
                }
            } else if let Some(arr) = array.as_any().downcast_ref::<LargeStringArray>() {
                for i in 0..arr.len() {
                    values.push((!arr.is_null(i)).then(|| arr.value(i).to_string()));
                }
            } else if let Some(arr) = array.as_any().downcast_ref::<BooleanArray>() {
                for i in 0..arr.len() {
                    values.push((!arr.is_null(i)).then(|| arr.value(i).to_string()));
                }
            } else {
                warn!(
                    "Column {} has unsupported type {:?}, filling missing",
                    name,
                    array.data_type()
                );
                values.extend(std::iter::repeat(None).take(array.len()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_csv(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    const SAMPLE_CSV: &str = "\
営業日付,店舗名,売上金額,備考
2024-01-05,恵比寿,\"12,000\",初売り
2024-01-06,横浜元町,8500,
2024-01-07,恵比寿,,棚卸し
";

    #[test]
    fn test_csv_column_typing() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(dir.path(), "data.csv", SAMPLE_CSV);
        let ds = load_csv(&path).unwrap();
        assert_eq!(ds.n_rows(), 3);
        assert_eq!(ds.n_columns(), 4);

        // Comma separators parse, empty cells are missing.
        let sales = ds.numeric_values("売上金額").unwrap();
        assert_eq!(sales, vec![Some(12000.0), Some(8500.0), None]);

        assert!(!ds.column("店舗名").unwrap().is_numeric());
        assert!(!ds.column("営業日付").unwrap().is_numeric());
    }

    #[test]
    fn test_csv_mixed_column_stays_text() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(dir.path(), "data.csv", "v\n10\nabc\n20\n");
        let ds = load_csv(&path).unwrap();
        assert!(!ds.column("v").unwrap().is_numeric());
        let strings = ds.string_values("v").unwrap();
        assert_eq!(strings[1].as_deref(), Some("abc"));
    }

    #[test]
    fn test_empty_csv_is_load_error() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(dir.path(), "data.csv", "a,b\n");
        let err = load_csv(&path).unwrap_err();
        assert!(matches!(err, AnalysisError::DatasetLoad(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = load_dataset("session/original_file.xlsx").unwrap_err();
        assert!(matches!(err, AnalysisError::DatasetLoad(_)));
    }

    #[test]
    fn test_locate_prefers_named_files() {
        let dir = TempDir::new().unwrap();
        write_csv(dir.path(), "zzz.csv", "a\n1\n");
        write_csv(dir.path(), "cleaned_data.csv", "a\n2\n");
        let found = locate_session_file(dir.path()).unwrap();
        assert_eq!(found.file_name().unwrap(), "cleaned_data.csv");
    }

    #[test]
    fn test_locate_falls_back_to_extension_priority() {
        let dir = TempDir::new().unwrap();
        write_csv(dir.path(), "notes.txt", "ignored");
        write_csv(dir.path(), "b_export.csv", "a\n1\n");
        write_csv(dir.path(), "a_export.csv", "a\n1\n");
        let found = locate_session_file(dir.path()).unwrap();
        assert_eq!(found.file_name().unwrap(), "a_export.csv");
    }

    #[test]
    fn test_load_session_dataset_missing_session() {
        let dir = TempDir::new().unwrap();
        let err = load_session_dataset(dir.path(), "session_missing").unwrap_err();
        assert!(matches!(err, AnalysisError::DatasetNotFound(_)));
    }

    #[test]
    fn test_load_session_dataset_roundtrip() {
        let dir = TempDir::new().unwrap();
        let session_dir = dir.path().join("session_ok");
        std::fs::create_dir(&session_dir).unwrap();
        write_csv(&session_dir, "dataset.csv", SAMPLE_CSV);
        let ds = load_session_dataset(dir.path(), "session_ok").unwrap();
        assert_eq!(ds.n_rows(), 3);
        assert!(ds.has_column("営業日付"));
    }
}
