use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, Float32Array, Float64Array, Int32Array, Int64Array};
use arrow::datatypes::DataType;
use ndarray::Array2;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::model::{FeatureIndex, Modality, ModalityRange};
use crate::config::MatrixFormat;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load one phase matrix (rows = samples, columns = features).
///
/// Supported formats:
/// * `parquet` – one numeric column per feature, in schema order
/// * `csv`     – headerless, one comma-separated row per sample
/// * `json`    – `[[f, f, ...], [f, f, ...], ...]`
pub fn load_matrix(path: &Path, format: MatrixFormat) -> Result<Array2<f64>> {
    match format {
        MatrixFormat::Parquet => load_parquet(path),
        MatrixFormat::Csv => load_csv(path),
        MatrixFormat::Json => load_json(path),
    }
}

/// Load the feature-index sidecar.
///
/// Expected JSON schema:
///
/// ```json
/// {
///   "otb_indices": [0, 112],
///   "myo_indices": [112, 117],
///   "kin_hand_indices": [117, 180],
///   "phase1_trial_lengths": [412, 398, ...],
///   "phase2_trial_lengths": [605, 577, ...]
/// }
/// ```
///
/// Any further `<name>_indices` pair becomes an extra modality; other keys
/// are ignored.
pub fn load_feature_index(path: &Path) -> Result<FeatureIndex> {
    let text = std::fs::read_to_string(path).context("reading feature index")?;
    parse_feature_index(&text)
}

pub fn parse_feature_index(text: &str) -> Result<FeatureIndex> {
    let raw: RawFeatureIndex = serde_json::from_str(text).context("parsing feature index JSON")?;

    let required = [raw.otb_indices, raw.myo_indices, raw.kin_hand_indices];
    let mut modalities: Vec<ModalityRange> = Modality::REQUIRED
        .iter()
        .zip(required)
        .map(|(m, pair)| ModalityRange { name: m.as_str().to_string(), range: pair.into() })
        .collect();

    for (key, value) in &raw.extra {
        match key.strip_suffix("_indices") {
            Some(name) => {
                let pair: (usize, usize) = serde_json::from_value(value.clone())
                    .with_context(|| format!("'{key}' is not a [start, end] pair"))?;
                modalities.push(ModalityRange { name: name.to_string(), range: pair.into() });
            }
            None => log::debug!("Ignoring feature index key '{key}'"),
        }
    }

    FeatureIndex::new(modalities, raw.phase1_trial_lengths, raw.phase2_trial_lengths)
        .map_err(anyhow::Error::msg)
}

#[derive(Debug, Deserialize)]
struct RawFeatureIndex {
    otb_indices: (usize, usize),
    myo_indices: (usize, usize),
    kin_hand_indices: (usize, usize),
    phase1_trial_lengths: Vec<usize>,
    phase2_trial_lengths: Vec<usize>,
    #[serde(flatten)]
    extra: BTreeMap<String, JsonValue>,
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

fn load_json(path: &Path) -> Result<Array2<f64>> {
    let text = std::fs::read_to_string(path).context("reading JSON matrix")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let rows = root.as_array().context("Expected top-level JSON array of rows")?;

    let mut width = None;
    let mut flat = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let values = row
            .as_array()
            .with_context(|| format!("Row {i} is not a JSON array"))?;
        check_width(&mut width, values.len(), i)?;
        for (j, v) in values.iter().enumerate() {
            // NaN is serialized as null by most writers.
            let x = if v.is_null() {
                f64::NAN
            } else {
                v.as_f64()
                    .with_context(|| format!("Row {i}, column {j}: not a number"))?
            };
            flat.push(x);
        }
    }

    let shape = (rows.len(), width.unwrap_or(0));
    Array2::from_shape_vec(shape, flat).context("assembling JSON matrix")
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path) -> Result<Array2<f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .context("opening CSV")?;

    let mut width = None;
    let mut n_rows = 0;
    let mut flat = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        check_width(&mut width, record.len(), row_no)?;
        for (j, tok) in record.iter().enumerate() {
            let x = parse_float(tok)
                .with_context(|| format!("CSV row {row_no}, column {j}: '{tok}' is not a number"))?;
            flat.push(x);
        }
        n_rows += 1;
    }

    Array2::from_shape_vec((n_rows, width.unwrap_or(0)), flat).context("assembling CSV matrix")
}

fn parse_float(tok: &str) -> Result<f64> {
    let tok = tok.trim();
    if tok.is_empty() || tok.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    Ok(tok.parse::<f64>()?)
}

fn check_width(width: &mut Option<usize>, found: usize, row: usize) -> Result<()> {
    match *width {
        None => *width = Some(found),
        Some(w) if w != found => bail!("Row {row}: expected {w} values, found {found}"),
        Some(_) => {}
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file holding one phase matrix.
///
/// Every column must be numeric (Float64, Float32, Int64 or Int32); column
/// order in the schema is feature order. Works with files written by
/// **Pandas** (`pd.DataFrame(matrix).to_parquet()`) and **Polars**.
fn load_parquet(path: &Path) -> Result<Array2<f64>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let n_cols = builder.schema().fields().len();
    let reader = builder.build().context("building parquet reader")?;

    let mut n_rows = 0;
    let mut flat = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let columns: Vec<Vec<f64>> = batch
            .columns()
            .iter()
            .zip(schema.fields().iter())
            .map(|(col, field)| {
                extract_f64_column(col).with_context(|| format!("column '{}'", field.name()))
            })
            .collect::<Result<_>>()?;

        // Arrow batches are columnar; the matrix is row-major.
        flat.reserve(batch.num_rows() * n_cols);
        for row in 0..batch.num_rows() {
            flat.extend(columns.iter().map(|c| c[row]));
        }
        n_rows += batch.num_rows();
    }

    Array2::from_shape_vec((n_rows, n_cols), flat).context("assembling parquet matrix")
}

// -- Parquet / Arrow helpers --

/// Read a whole numeric column as `f64`, nulls become NaN.
fn extract_f64_column(col: &Arc<dyn Array>) -> Result<Vec<f64>> {
    let values = match col.data_type() {
        DataType::Float64 => {
            let arr = col
                .as_any()
                .downcast_ref::<Float64Array>()
                .context("expected Float64Array")?;
            arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect()
        }
        DataType::Float32 => {
            let arr = col
                .as_any()
                .downcast_ref::<Float32Array>()
                .context("expected Float32Array")?;
            arr.iter().map(|v| v.map_or(f64::NAN, f64::from)).collect()
        }
        DataType::Int64 => {
            let arr = col
                .as_any()
                .downcast_ref::<Int64Array>()
                .context("expected Int64Array")?;
            arr.iter().map(|v| v.map_or(f64::NAN, |i| i as f64)).collect()
        }
        DataType::Int32 => {
            let arr = col
                .as_any()
                .downcast_ref::<Int32Array>()
                .context("expected Int32Array")?;
            arr.iter().map(|v| v.map_or(f64::NAN, f64::from)).collect()
        }
        other => bail!("Expected a numeric column, got {other:?}"),
    };
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_index_accepts_extra_modalities_and_ignores_other_keys() {
        let text = r#"{
            "otb_indices": [0, 4],
            "myo_indices": [4, 6],
            "kin_hand_indices": [6, 9],
            "kin_arm_indices": [9, 12],
            "phase1_trial_lengths": [3, 2],
            "phase2_trial_lengths": [5],
            "combined": [[1.0, 2.0]]
        }"#;
        let index = parse_feature_index(text).unwrap();
        assert_eq!(index.total_columns(), 12);
        assert_eq!(index.range_of("kin_arm").unwrap().as_range(), 9..12);
        assert_eq!(index.modality_names(), vec!["otb", "myo", "kin_hand", "kin_arm"]);
    }

    #[test]
    fn feature_index_missing_key_fails() {
        let text = r#"{ "otb_indices": [0, 4], "myo_indices": [4, 6],
                        "phase1_trial_lengths": [], "phase2_trial_lengths": [] }"#;
        let err = parse_feature_index(text).unwrap_err();
        assert!(format!("{err:#}").contains("kin_hand_indices"));
    }

    #[test]
    fn feature_index_non_covering_ranges_fail() {
        let text = r#"{ "otb_indices": [0, 4], "myo_indices": [5, 6], "kin_hand_indices": [6, 9],
                        "phase1_trial_lengths": [], "phase2_trial_lengths": [] }"#;
        assert!(parse_feature_index(text).is_err());
    }

    #[test]
    fn csv_tokens_parse_with_nan_support() {
        assert_eq!(parse_float(" 1.5 ").unwrap(), 1.5);
        assert!(parse_float("NaN").unwrap().is_nan());
        assert!(parse_float("").unwrap().is_nan());
        assert!(parse_float("abc").is_err());
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let mut width = None;
        check_width(&mut width, 3, 0).unwrap();
        check_width(&mut width, 3, 1).unwrap();
        assert!(check_width(&mut width, 2, 2).is_err());
    }
}
