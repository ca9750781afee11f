/// Data layer: spectrum types, loading and saving.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → SpectralDataset
///   └──────────┘
///        │
///        ▼
///   ┌────────────────┐
///   │ SpectralDataset │  Vec<Spectrum>, column index
///   └────────────────┘
///        │   (filters / writers)
///        ▼
///   ┌──────────┐
///   │  writer   │  annotated spectra → .json / .csv
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod writer;
