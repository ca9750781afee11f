//! Train regression models on spectral data and annotate spectra with
//! their predictions.
//!
//! Two plugins do the work:
//! * [`writer::fit::FitWriter`] trains a model on a batch of spectra and saves it,
//! * [`filter::predict::PredictFilter`] loads a saved model and stores its
//!   prediction in each spectrum's sample data.

pub mod data;
pub mod estimator;
pub mod filter;
pub mod plugin;
pub mod session;
pub mod writer;
