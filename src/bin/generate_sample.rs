use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Float64Builder, Int64Array, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use clap::Parser;
use parquet::arrow::ArrowWriter;

use spectral_models::data::model::{MetadataValue, Spectrum};
use spectral_models::data::writer::save_file;

/// Writes synthetic spectra whose peak heights scale with `concentration`,
/// ready for `spectral-models fit --target concentration`.
#[derive(Parser, Debug)]
#[command(name = "generate_sample")]
struct Args {
    /// Output file (.parquet, .json or .csv).
    #[arg(short, long, default_value = "sample_data.parquet")]
    output: PathBuf,
    /// Seed of the noise generator.
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Number of points per spectrum.
    #[arg(long, default_value_t = 200)]
    points: usize,
}

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

fn generate_spectrum(
    wavenumbers: &[f64],
    peaks: &[(f64, f64, f64)],
    noise_level: f64,
    rng: &mut SimpleRng,
) -> Vec<f64> {
    wavenumbers
        .iter()
        .map(|&wn| {
            let signal: f64 = peaks
                .iter()
                .map(|&(mu, sigma, amp)| gaussian(wn, mu, sigma, amp))
                .sum();
            signal + rng.gauss(0.0, noise_level)
        })
        .collect()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn build_spectra(args: &Args) -> Vec<Spectrum> {
    let mut rng = SimpleRng::new(args.seed);

    // 4000 → 2000 cm⁻¹, evenly spaced
    let step = 2000.0 / args.points.max(1) as f64;
    let wavenumbers: Vec<f64> = (0..args.points).map(|i| 4000.0 - i as f64 * step).collect();

    let sample_peaks: [(&str, [(f64, f64, f64); 3]); 3] = [
        ("Sample_A", [(3400.0, 80.0, 0.8), (2900.0, 40.0, 0.5), (2350.0, 30.0, 0.3)]),
        ("Sample_B", [(3200.0, 60.0, 0.6), (2800.0, 50.0, 0.7), (2500.0, 35.0, 0.4)]),
        ("Sample_C", [(3600.0, 70.0, 0.9), (3000.0, 45.0, 0.4), (2200.0, 25.0, 0.5)]),
    ];
    let concentrations = [0.1, 0.5, 1.0, 2.0, 5.0];
    let operators = ["Alice", "Bob"];

    let mut spectra = Vec::new();
    for (sample, peaks_base) in &sample_peaks {
        for &conc in &concentrations {
            let peaks: Vec<(f64, f64, f64)> = peaks_base
                .iter()
                .map(|&(mu, sigma, amp)| (mu, sigma, amp * conc))
                .collect();

            for &operator in &operators {
                let id = spectra.len();
                let y = generate_spectrum(&wavenumbers, &peaks, 0.005 * conc, &mut rng);
                let mut sp = Spectrum::new(format!("m{id:03}"), y)
                    .with_field("sample", *sample)
                    .with_field("concentration", conc)
                    .with_field("operator", operator);
                sp.x = wavenumbers.clone();
                sp.metadata
                    .insert("measurement_id".into(), MetadataValue::Integer(id as i64));
                spectra.push(sp);
            }
        }
    }
    spectra
}

fn text_column(spectra: &[Spectrum], key: &str) -> StringArray {
    StringArray::from(
        spectra
            .iter()
            .map(|sp| sp.metadata.get(key).map(|v| v.to_string()))
            .collect::<Vec<_>>(),
    )
}

fn list_column<'a>(rows: impl Iterator<Item = &'a Vec<f64>>) -> arrow::array::ListArray {
    let mut builder = ListBuilder::new(Float64Builder::new());
    for row in rows {
        builder.values().append_slice(row);
        builder.append(true);
    }
    builder.finish()
}

fn write_parquet(path: &Path, spectra: &[Spectrum]) -> Result<()> {
    let item = Arc::new(Field::new("item", DataType::Float64, true));
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("x", DataType::List(item.clone()), false),
        Field::new("y", DataType::List(item), false),
        Field::new("sample", DataType::Utf8, true),
        Field::new("concentration", DataType::Float64, true),
        Field::new("operator", DataType::Utf8, true),
        Field::new("measurement_id", DataType::Int64, true),
    ]));

    let ids = StringArray::from(spectra.iter().map(|sp| sp.id.as_str()).collect::<Vec<_>>());
    let concentration = Float64Array::from(
        spectra
            .iter()
            .map(|sp| sp.metadata.get("concentration").and_then(MetadataValue::as_f64))
            .collect::<Vec<_>>(),
    );
    let measurement_id = Int64Array::from(
        spectra
            .iter()
            .map(|sp| match sp.metadata.get("measurement_id") {
                Some(MetadataValue::Integer(i)) => Some(*i),
                _ => None,
            })
            .collect::<Vec<_>>(),
    );

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(ids),
            Arc::new(list_column(spectra.iter().map(|sp| &sp.x))),
            Arc::new(list_column(spectra.iter().map(|sp| &sp.y))),
            Arc::new(text_column(spectra, "sample")),
            Arc::new(concentration),
            Arc::new(text_column(spectra, "operator")),
            Arc::new(measurement_id),
        ],
    )
    .context("building record batch")?;

    let file = std::fs::File::create(path).context("creating output file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let spectra = build_spectra(&args);

    let ext = args
        .output
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "parquet" | "pq" => write_parquet(&args.output, &spectra)?,
        _ => save_file(&args.output, &spectra)?,
    }

    println!(
        "Wrote {} spectra ({} points each) to {}",
        spectra.len(),
        args.points,
        args.output.display()
    );
    Ok(())
}
