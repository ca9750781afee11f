use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use spectral_models::data::loader::load_file;
use spectral_models::data::writer::save_file;
use spectral_models::estimator::registry::{ModelRegistry, Role};
use spectral_models::filter::predict::PredictFilter;
use spectral_models::plugin::{BatchWriter, Filter, Plugin};
use spectral_models::session::Session;
use spectral_models::writer::fit::FitWriter;

#[derive(Parser, Debug)]
#[command(
    name = "spectral-models",
    version,
    about = "Train models on spectral data and add their predictions to spectra"
)]
struct Cli {
    /// The logging level to use (RUST_LOG takes precedence).
    #[arg(long, value_enum, default_value_t = LogLevel::Warn, global = true)]
    logging_level: LogLevel,

    /// Placeholder definition KEY=VALUE, usable as {KEY} in paths.
    #[arg(long = "placeholder", value_name = "KEY=VALUE", global = true)]
    placeholders: Vec<String>,

    /// File with KEY=VALUE placeholder definitions, one per line.
    #[arg(long = "placeholders", value_name = "FILE", global = true)]
    placeholder_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Builds a model on the spectra of the input file and saves it.
    Fit(FitArgs),
    /// Loads a saved model and adds its predictions to the spectra of the input file.
    Predict(PredictArgs),
    /// Saves an untrained model, for use as a fit template.
    Template(TemplateArgs),
    /// Lists the available model classes.
    Models,
}

#[derive(Args, Debug)]
struct FitArgs {
    /// Spectra to train on (.parquet, .json or .csv).
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,
    /// The class name of the model to build.
    #[arg(short = 'm', long)]
    model: Option<String>,
    /// The parameters of the model as JSON string.
    #[arg(short = 'p', long = "model-params", alias = "model_params", value_name = "JSON")]
    model_params: Option<String>,
    /// The saved model template to load and train instead of class name/parameters.
    #[arg(short = 'T', long, value_name = "FILE")]
    template: Option<String>,
    /// The name of the sample data field to use as output variable.
    #[arg(short = 't', long)]
    target: String,
    /// The file to save the model to.
    #[arg(short = 'o', long = "output-file", alias = "output_file", value_name = "FILE")]
    output_file: String,
}

#[derive(Args, Debug)]
struct PredictArgs {
    /// Spectra to annotate (.parquet, .json or .csv).
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,
    /// The saved model to load and use.
    #[arg(short = 'm', long = "model-file", alias = "model_file", value_name = "FILE")]
    model_file: String,
    /// The sample data field to store the predictions under.
    #[arg(short = 't', long)]
    target: String,
    /// Where to write the annotated spectra (.json or .csv).
    #[arg(short = 'o', long, value_name = "FILE")]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct TemplateArgs {
    /// The class name of the model to build.
    #[arg(short = 'm', long)]
    model: String,
    /// The parameters of the model as JSON string.
    #[arg(short = 'p', long = "model-params", alias = "model_params", value_name = "JSON")]
    model_params: Option<String>,
    /// The file to save the untrained model to.
    #[arg(short = 'o', long = "output-file", alias = "output_file", value_name = "FILE")]
    output_file: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.logging_level.into())
        .parse_env(env_logger::Env::default())
        .init();

    let mut session = Session::default();
    if let Some(path) = &cli.placeholder_file {
        session.load_placeholders(path)?;
    }
    for definition in &cli.placeholders {
        session.set_from_definition(definition)?;
    }

    match cli.command {
        Commands::Fit(args) => run_fit(args, &session),
        Commands::Predict(args) => run_predict(args, &session),
        Commands::Template(args) => run_template(args, &session),
        Commands::Models => {
            for entry in ModelRegistry::with_defaults().entries() {
                let role = match entry.role {
                    Role::Predictor => "predictor",
                    Role::Transformer => "transformer",
                };
                println!("{:<22} {:<12} {}", entry.name, role, entry.description);
            }
            Ok(())
        }
    }
}

fn run_fit(args: FitArgs, session: &Session) -> Result<()> {
    let mut writer = FitWriter {
        model: args.model,
        model_params: args.model_params,
        template: args.template,
        target: Some(args.target),
        output_file: Some(args.output_file),
        ..FitWriter::default()
    };
    writer.initialize()?;

    let dataset = load_file(&args.input)?;
    log::info!("Training on {} spectra from {}", dataset.len(), args.input.display());
    log::debug!("Sample data fields: {:?}", dataset.column_names);
    writer
        .write_batch(&dataset.spectra, session)
        .with_context(|| format!("{} failed", writer.name()))?;
    Ok(())
}

fn run_predict(args: PredictArgs, session: &Session) -> Result<()> {
    let mut filter = PredictFilter::new(Some(args.model_file), Some(args.target));
    filter.initialize()?;

    let dataset = load_file(&args.input)?;
    let annotated = filter.process(dataset.spectra.into(), session);
    save_file(&args.output, &annotated)?;
    Ok(())
}

fn run_template(args: TemplateArgs, session: &Session) -> Result<()> {
    let registry = ModelRegistry::with_defaults();
    let component = registry
        .instantiate(&args.model, args.model_params.as_deref())
        .with_context(|| format!("instantiating '{}'", args.model))?;
    let path = session.expand_placeholders(&args.output_file);
    registry
        .save(&path, component.as_ref())
        .context("saving template")?;
    log::info!("Saved {} template to {}", component.kind(), path.display());
    Ok(())
}
