use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use ndarray::{Array2, ArrayView2};
use parquet::arrow::ArrowWriter;
use serde_json::{json, Map, Value as JsonValue};

use super::model::{FeatureIndex, Phase};
use crate::config::{MatrixFormat, ParticipantPaths};

// ---------------------------------------------------------------------------
// Matrix writers – the inverse of `loader::load_matrix`
// ---------------------------------------------------------------------------

pub fn write_matrix(path: &Path, matrix: ArrayView2<'_, f64>, format: MatrixFormat) -> Result<()> {
    match format {
        MatrixFormat::Parquet => write_parquet(path, matrix),
        MatrixFormat::Csv => write_csv(path, matrix),
        MatrixFormat::Json => write_json(path, matrix),
    }
}

/// One non-nullable Float64 column per feature, named `"0"`, `"1"`, ...
fn write_parquet(path: &Path, matrix: ArrayView2<'_, f64>) -> Result<()> {
    let fields: Vec<Field> = (0..matrix.ncols())
        .map(|j| Field::new(j.to_string(), DataType::Float64, false))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let columns: Vec<ArrayRef> = matrix
        .columns()
        .into_iter()
        .map(|col| Arc::new(Float64Array::from(col.to_vec())) as ArrayRef)
        .collect();

    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;

    let file = std::fs::File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

/// Headerless CSV, one sample per line.
pub fn write_csv(path: &Path, matrix: ArrayView2<'_, f64>) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .context("creating CSV file")?;
    for row in matrix.rows() {
        writer
            .write_record(row.iter().map(|v| v.to_string()))
            .context("writing CSV row")?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

fn write_json(path: &Path, matrix: ArrayView2<'_, f64>) -> Result<()> {
    let rows: Vec<Vec<f64>> = matrix.rows().into_iter().map(|r| r.to_vec()).collect();
    let text = serde_json::to_string(&rows).context("serializing JSON matrix")?;
    std::fs::write(path, text).context("writing JSON matrix")
}

// ---------------------------------------------------------------------------
// Feature index writer
// ---------------------------------------------------------------------------

/// Serialize an index in the sidecar layout read by `loader::load_feature_index`.
pub fn feature_index_to_json(index: &FeatureIndex) -> JsonValue {
    let mut map = Map::new();
    for m in index.modalities() {
        map.insert(format!("{}_indices", m.name), json!([m.range.start, m.range.end]));
    }
    for phase in Phase::ALL {
        map.insert(
            format!("{phase}_trial_lengths"),
            json!(index.trial_lengths(phase)),
        );
    }
    JsonValue::Object(map)
}

pub fn write_feature_index(path: &Path, index: &FeatureIndex) -> Result<()> {
    let text = serde_json::to_string_pretty(&feature_index_to_json(index))
        .context("serializing feature index")?;
    std::fs::write(path, text).context("writing feature index")
}

/// Write a complete participant folder: both phases plus the index.
pub fn write_participant(
    paths: &ParticipantPaths,
    format: MatrixFormat,
    phase1: &Array2<f64>,
    phase2: &Array2<f64>,
    index: &FeatureIndex,
) -> Result<()> {
    std::fs::create_dir_all(&paths.dir)
        .with_context(|| format!("creating {}", paths.dir.display()))?;
    for (phase, matrix) in [(Phase::One, phase1), (Phase::Two, phase2)] {
        let path = paths.matrix(phase);
        write_matrix(path, matrix.view(), format)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    write_feature_index(&paths.feature_indices, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::parse_feature_index;
    use crate::data::model::ModalityRange;

    #[test]
    fn feature_index_json_reparses_identically() {
        let index = FeatureIndex::new(
            vec![
                ModalityRange { name: "otb".into(), range: (0, 2).into() },
                ModalityRange { name: "myo".into(), range: (2, 3).into() },
                ModalityRange { name: "kin_hand".into(), range: (3, 5).into() },
            ],
            vec![1, 2],
            vec![3],
        )
        .unwrap();
        let json = feature_index_to_json(&index);
        assert_eq!(json["myo_indices"], json!([2, 3]));
        assert_eq!(json["phase2_trial_lengths"], json!([3]));

        let reparsed = parse_feature_index(&json.to_string()).unwrap();
        assert_eq!(reparsed, index);
    }
}
