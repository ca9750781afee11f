use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value as JsonValue};

use super::loader::{ID_COLUMN, extension};
use super::model::{MetadataValue, Spectrum};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Save spectra to a file.  Dispatch by extension, mirroring [`super::loader::load_file`].
///
/// * `.json` – records array, readable by the JSON loader
/// * `.csv`  – `id,x,y` plus the union of all metadata columns
pub fn save_file(path: &Path, spectra: &[Spectrum]) -> Result<()> {
    match extension(path).as_str() {
        "json" => save_json(path, spectra),
        "csv" => save_csv(path, spectra),
        other => bail!("Unsupported output extension: .{other}"),
    }
    .with_context(|| format!("saving spectra to {}", path.display()))?;

    log::debug!("Wrote {} spectra to {}", spectra.len(), path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// JSON writer
// ---------------------------------------------------------------------------

fn spectrum_to_json(sp: &Spectrum) -> JsonValue {
    let mut obj = Map::new();
    obj.insert(ID_COLUMN.to_string(), JsonValue::String(sp.id.clone()));
    obj.insert("x".to_string(), floats_to_json(&sp.x));
    obj.insert("y".to_string(), floats_to_json(&sp.y));
    for (key, val) in &sp.metadata {
        obj.insert(key.clone(), val.to_json());
    }
    JsonValue::Object(obj)
}

fn floats_to_json(values: &[f64]) -> JsonValue {
    JsonValue::Array(
        values
            .iter()
            .map(|v| {
                serde_json::Number::from_f64(*v)
                    .map(JsonValue::Number)
                    .unwrap_or(JsonValue::Null)
            })
            .collect(),
    )
}

fn save_json(path: &Path, spectra: &[Spectrum]) -> Result<()> {
    let records: Vec<JsonValue> = spectra.iter().map(spectrum_to_json).collect();
    let mut writer = BufWriter::new(File::create(path).context("creating JSON file")?);
    serde_json::to_writer_pretty(&mut writer, &records).context("writing JSON")?;
    writer.flush().context("flushing JSON")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV writer
// ---------------------------------------------------------------------------

fn save_csv(path: &Path, spectra: &[Spectrum]) -> Result<()> {
    let columns: BTreeSet<&String> = spectra.iter().flat_map(|sp| sp.metadata.keys()).collect();

    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;

    let mut header = vec![ID_COLUMN.to_string(), "x".to_string(), "y".to_string()];
    header.extend(columns.iter().map(|c| c.to_string()));
    writer.write_record(&header).context("writing CSV header")?;

    for sp in spectra {
        let mut row = vec![sp.id.clone(), join_floats(&sp.x), join_floats(&sp.y)];
        for col in &columns {
            // missing and null fields stay empty, which the loader reads back as null
            let cell = match sp.metadata.get(*col) {
                None | Some(MetadataValue::Null) => String::new(),
                Some(value) => value.to_string(),
            };
            row.push(cell);
        }
        writer
            .write_record(&row)
            .with_context(|| format!("writing CSV row for {}", sp.id))?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

fn join_floats(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(";")
}
