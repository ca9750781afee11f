use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    LargeListArray, ListArray, StringArray,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{MetadataValue, SpectralDataset, Spectrum};

/// Column holding the record identifier.
pub const ID_COLUMN: &str = "id";

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a spectral dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – Parquet file with `y` (and optionally `x`) list columns
/// * `.json`    – `[{ "id": ..., "x": [...], "y": [...], ...meta }, ...]`
/// * `.csv`     – columns `x` and `y` containing semicolon-separated floats
///
/// `y` holds the amplitudes and is required; a missing `x` defaults to the
/// index axis.
pub fn load_file(path: &Path) -> Result<SpectralDataset> {
    let ext = extension(path);
    let dataset = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading spectra from {}", path.display()))?;

    log::debug!("Loaded {} spectra from {}", dataset.len(), path.display());
    Ok(dataset)
}

pub(crate) fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// Assemble a spectrum, pulling the identifier out of the metadata.
fn build_spectrum(
    row: usize,
    x: Option<Vec<f64>>,
    y: Vec<f64>,
    mut metadata: BTreeMap<String, MetadataValue>,
) -> Result<Spectrum> {
    let x = match x {
        Some(x) => {
            if x.len() != y.len() {
                bail!("Row {row}: x has {} values but y has {}", x.len(), y.len());
            }
            x
        }
        None => (0..y.len()).map(|i| i as f64).collect(),
    };

    let id = match metadata.remove(ID_COLUMN) {
        Some(MetadataValue::String(s)) => s,
        Some(MetadataValue::Integer(i)) => i.to_string(),
        Some(other) => {
            // keep non-identifier values as plain metadata
            metadata.insert(ID_COLUMN.to_string(), other);
            format!("spectrum-{row}")
        }
        None => format!("spectrum-{row}"),
    };

    Ok(Spectrum { id, x, y, metadata })
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   {
///     "id": "A-1",
///     "x": [4000.0, 3999.0, ...],
///     "y": [0.12,   0.14,  ...],
///     "concentration": 1.5
///   },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<SpectralDataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let mut spectra = Vec::with_capacity(records.len());

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let x = match obj.get("x") {
            Some(val) => Some(json_array_to_f64(Some(val), i, "x")?),
            None => None,
        };
        let y = json_array_to_f64(obj.get("y"), i, "y")?;

        let mut metadata = BTreeMap::new();
        for (key, val) in obj {
            if key == "x" || key == "y" {
                continue;
            }
            metadata.insert(key.clone(), json_to_metadata(val));
        }

        spectra.push(build_spectrum(i, x, y, metadata)?);
    }

    Ok(SpectralDataset::from_spectra(spectra))
}

fn json_array_to_f64(val: Option<&JsonValue>, row: usize, col: &str) -> Result<Vec<f64>> {
    let arr = val
        .and_then(|v| v.as_array())
        .with_context(|| format!("Row {row}: missing or invalid '{col}' array"))?;

    arr.iter()
        .enumerate()
        .map(|(j, v)| {
            v.as_f64()
                .with_context(|| format!("Row {row}, {col}[{j}]: not a number"))
        })
        .collect()
}

fn json_to_metadata(val: &JsonValue) -> MetadataValue {
    match val {
        JsonValue::String(s) => MetadataValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                MetadataValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                MetadataValue::Float(f)
            } else {
                MetadataValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => MetadataValue::Bool(*b),
        JsonValue::Null => MetadataValue::Null,
        other => MetadataValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout:  header row with column names.
/// `x` and `y` columns contain semicolon-separated floats:
///   `"4000.0;3999.0;3998.0"`, `"0.12;0.14;0.11"`
/// All other columns are treated as metadata.
fn load_csv(path: &Path) -> Result<SpectralDataset> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let x_idx = headers.iter().position(|h| h == "x");
    let y_idx = headers
        .iter()
        .position(|h| h == "y")
        .context("CSV missing 'y' column")?;

    let mut spectra = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        let x = match x_idx {
            Some(idx) => Some(parse_semicolon_floats(
                record.get(idx).unwrap_or(""),
                row_no,
                "x",
            )?),
            None => None,
        };
        let y = parse_semicolon_floats(record.get(y_idx).unwrap_or(""), row_no, "y")?;

        let mut metadata = BTreeMap::new();
        for (col_idx, value) in record.iter().enumerate() {
            if Some(col_idx) == x_idx || col_idx == y_idx {
                continue;
            }
            let col_name = &headers[col_idx];
            metadata.insert(col_name.clone(), guess_metadata_type(value));
        }

        spectra.push(build_spectrum(row_no, x, y, metadata)?);
    }

    Ok(SpectralDataset::from_spectra(spectra))
}

fn parse_semicolon_floats(s: &str, row: usize, col: &str) -> Result<Vec<f64>> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    s.split(';')
        .enumerate()
        .map(|(j, tok)| {
            tok.trim()
                .parse::<f64>()
                .with_context(|| format!("Row {row}, {col}[{j}]: '{tok}' is not a number"))
        })
        .collect()
}

fn guess_metadata_type(s: &str) -> MetadataValue {
    if s.is_empty() {
        return MetadataValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return MetadataValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return MetadataValue::Float(f);
    }
    if s == "true" || s == "false" {
        return MetadataValue::Bool(s == "true");
    }
    MetadataValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file containing spectral data.
///
/// Expected schema:
/// - `y`: List<Float64> or LargeList<Float64> – amplitude arrays
/// - `x`: optional List<Float64> or LargeList<Float64> – wavenumber arrays
/// - Any other columns are treated as metadata (strings, ints, floats, bools)
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<SpectralDataset> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut spectra = Vec::new();
    let mut row_offset = 0;

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        let n_rows = batch.num_rows();

        let x_idx = schema.index_of("x").ok();
        let y_idx = schema
            .index_of("y")
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'y' column"))?;

        let y_col = batch.column(y_idx);

        // Collect metadata column indices (everything except x, y)
        let meta_cols: Vec<(usize, String)> = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != x_idx && *i != y_idx)
            .map(|(i, f)| (i, f.name().clone()))
            .collect();

        for row in 0..n_rows {
            let x = match x_idx {
                Some(idx) => Some(
                    extract_f64_list(batch.column(idx), row)
                        .with_context(|| format!("Row {row}: failed to read 'x'"))?,
                ),
                None => None,
            };
            let y = extract_f64_list(y_col, row)
                .with_context(|| format!("Row {row}: failed to read 'y'"))?;

            let mut metadata = BTreeMap::new();
            for (col_idx, col_name) in &meta_cols {
                let col_array = batch.column(*col_idx);
                let value = extract_metadata_value(col_array, row);
                metadata.insert(col_name.clone(), value);
            }

            spectra.push(build_spectrum(row_offset + row, x, y, metadata)?);
        }
        row_offset += n_rows;
    }

    Ok(SpectralDataset::from_spectra(spectra))
}

// -- Parquet / Arrow helpers --

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
        DataType::List(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<ListArray>()
                .context("expected ListArray")?;
            list_arr.value(row)
        }
        DataType::LargeList(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<LargeListArray>()
                .context("expected LargeListArray")?;
            list_arr.value(row)
        }
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };

    // The inner array can be Float64 or Float32
    if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.iter().map(|v| v.unwrap_or(f32::NAN) as f64).collect())
    } else {
        bail!(
            "List inner type is {:?}, expected Float64 or Float32",
            values_array.data_type()
        )
    }
}

/// Extract a single metadata value from an Arrow column at a given row.
fn extract_metadata_value(col: &Arc<dyn Array>, row: usize) -> MetadataValue {
    if col.is_null(row) {
        return MetadataValue::Null;
    }
    let any = col.as_any();
    match col.data_type() {
        DataType::Utf8 => match any.downcast_ref::<StringArray>() {
            Some(s) => MetadataValue::String(s.value(row).to_string()),
            None => MetadataValue::Null,
        },
        DataType::LargeUtf8 => {
            MetadataValue::String(col.as_string::<i64>().value(row).to_string())
        }
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map_or(MetadataValue::Null, |a| MetadataValue::Integer(a.value(row) as i64)),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map_or(MetadataValue::Null, |a| MetadataValue::Integer(a.value(row))),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map_or(MetadataValue::Null, |a| MetadataValue::Float(a.value(row) as f64)),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map_or(MetadataValue::Null, |a| MetadataValue::Float(a.value(row))),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map_or(MetadataValue::Null, |a| MetadataValue::Bool(a.value(row))),
        _ => MetadataValue::String(format!("{:?}", col.data_type())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_json_records_with_ids() {
        let file = write_temp(
            ".json",
            r#"[{"id": "s1", "x": [1, 2], "y": [0.5, 0.6], "value": 1.5},
                {"y": [0.1, 0.2], "value": 2}]"#,
        );
        let ds = load_file(file.path()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.spectra[0].id, "s1");
        assert_eq!(ds.spectra[0].amplitudes(), &[0.5, 0.6]);
        assert_eq!(ds.spectra[1].id, "spectrum-1");
        assert_eq!(ds.spectra[1].x, vec![0.0, 1.0]);
        assert_eq!(
            ds.spectra[1].metadata.get("value"),
            Some(&MetadataValue::Integer(2))
        );
        assert!(!ds.spectra[0].metadata.contains_key(ID_COLUMN));
    }

    #[test]
    fn loads_csv_with_semicolon_arrays() {
        let file = write_temp(".csv", "id,y,value,operator\n7,1;2;3,0.5,Alice\n8,4;5;6,,Bob\n");
        let ds = load_file(file.path()).unwrap();
        assert_eq!(ds.spectra[0].id, "7");
        assert_eq!(ds.spectra[1].amplitudes(), &[4.0, 5.0, 6.0]);
        assert_eq!(ds.spectra[1].metadata.get("value"), Some(&MetadataValue::Null));
        assert_eq!(ds.column_names, vec!["operator".to_string(), "value".to_string()]);
    }

    #[test]
    fn rejects_mismatched_axes() {
        let file = write_temp(".json", r#"[{"x": [1, 2, 3], "y": [0.5, 0.6]}]"#);
        assert!(load_file(file.path()).is_err());
    }

    #[test]
    fn rejects_unknown_extension() {
        let file = write_temp(".txt", "");
        let err = load_file(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Unsupported file extension"));
    }
}
