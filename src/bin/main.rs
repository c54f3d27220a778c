//! smosvm command line interface
//!
//! Train, apply and inspect SVM models stored in the libsvm text format.
//! Training options follow the libsvm flags and can be passed after `--`:
//!
//! ```text
//! smosvm train --data heart.txt --output heart.model -- -s 0 -t 2 -c 10 -b 1
//! smosvm train --data heart.txt -- -v 5
//! smosvm predict --model heart.model --data test.txt --probability
//! smosvm info heart.model --json
//! ```

use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use smosvm::core::{Parameters, Result, SVMError};
use smosvm::{cross_validation, persistence, CrossValidationReport, LibSVMDataset, Model};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "smosvm")]
#[command(about = "Support Vector Machines trained with SMO")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model, or cross-validate with `-v <folds>`
    Train(TrainArgs),
    /// Predict a data file with a trained model
    Predict(PredictArgs),
    /// Display model information
    Info(InfoArgs),
}

#[derive(Args)]
struct TrainArgs {
    /// Training data in the sparse text format
    #[arg(long)]
    data: PathBuf,

    /// Output model file; required unless cross-validating
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Parameters as JSON instead of libsvm options
    #[arg(long, conflicts_with = "options")]
    config: Option<PathBuf>,

    /// Number of cross-validation folds
    #[arg(long)]
    folds: Option<usize>,

    /// libsvm training options, e.g. `-s 0 -t 2 -c 1`
    #[arg(last = true, allow_hyphen_values = true)]
    options: Vec<String>,
}

#[derive(Args)]
struct PredictArgs {
    /// Trained model file
    #[arg(short, long)]
    model: PathBuf,

    /// Input data file
    #[arg(long)]
    data: PathBuf,

    /// Output predictions file (prints to stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write per-class probability estimates
    #[arg(short = 'b', long)]
    probability: bool,
}

#[derive(Args)]
struct InfoArgs {
    /// Model file
    model: PathBuf,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Train(args) => train_command(args),
        Commands::Predict(args) => predict_command(args),
        Commands::Info(args) => info_command(args),
    };

    if let Err(e) = result {
        error!("Error: {e}");
        process::exit(1);
    }
}

/// Parameters and fold count from `--config` or the trailing options
fn training_parameters(args: &TrainArgs) -> Result<(Parameters, Option<usize>)> {
    match &args.config {
        Some(path) => Ok((Parameters::from_json_file(path)?, args.folds)),
        None => {
            let parsed = Parameters::parse_options(&args.options.join(" "))?;
            Ok((parsed.params, args.folds.or(parsed.cross_validation)))
        }
    }
}

fn train_command(args: TrainArgs) -> Result<()> {
    let (params, folds) = training_parameters(&args)?;

    info!("Loading training data from: {:?}", args.data);
    let dataset = LibSVMDataset::from_file(&args.data)?;
    let problem = dataset.problem();
    info!(
        "Loaded {} examples, max index {}",
        problem.len(),
        problem.max_index()
    );

    let params = params.with_default_gamma(problem);

    if let Some(nr_fold) = folds {
        let target = cross_validation(problem, &params, nr_fold)?;
        let report = CrossValidationReport::new(params.svm_type, problem.labels(), &target)?;
        print_report(&report);
        return Ok(());
    }

    let output = args.output.ok_or_else(|| {
        SVMError::InvalidParameter("--output is required unless cross-validating".to_string())
    })?;

    let model = smosvm::train(problem, &params)?;
    info!(
        "Training completed: {} support vectors",
        model.total_sv()
    );
    persistence::save(&model, &output)?;
    info!("Model saved to: {output:?}");
    Ok(())
}

fn print_report(report: &CrossValidationReport) {
    match report {
        CrossValidationReport::Classification(report) => {
            let total = report.confusion.iter().flatten().sum::<usize>();
            let correct = total - report.misclassified.len();
            println!(
                "Cross Validation Accuracy = {}% ({correct}/{total})",
                report.accuracy * 100.0
            );
            println!("Labels: {:?}", report.labels);
            println!("Confusion matrix (rows: predicted, columns: expected):");
            for row in &report.confusion {
                let cells: Vec<String> = row.iter().map(usize::to_string).collect();
                println!("  {}", cells.join(" "));
            }
        }
        CrossValidationReport::Regression(report) => {
            println!(
                "Cross Validation Mean squared error = {}",
                report.mean_squared_error
            );
            println!(
                "Cross Validation Squared correlation coefficient = {}",
                report.squared_correlation
            );
        }
    }
}

fn open_output(path: &Option<PathBuf>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    })
}

fn predict_command(args: PredictArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let model = persistence::load(&args.model)?;
    if args.probability && !model.check_probability_model() {
        return Err(SVMError::UnsupportedConfiguration(
            "model does not support probability estimates".to_string(),
        ));
    }

    let dataset = LibSVMDataset::from_file(&args.data)?;
    let problem = dataset.problem();
    let mut writer = open_output(&args.output)?;

    let classification = model.svm_type().is_classification();
    if args.probability && classification {
        if let Some(labels) = model.labels() {
            let labels: Vec<String> = labels.iter().map(i32::to_string).collect();
            writeln!(writer, "labels {}", labels.join(" "))?;
        }
    }

    let mut predictions = Vec::with_capacity(problem.len());
    for x in problem.vectors() {
        if args.probability && classification {
            let (label, estimates) = model.predict_probability(x)?;
            let estimates: Vec<String> = estimates.iter().map(|p| p.to_string()).collect();
            writeln!(writer, "{label} {}", estimates.join(" "))?;
            predictions.push(label);
        } else {
            let target = model.predict(x);
            writeln!(writer, "{target}")?;
            predictions.push(target);
        }
    }
    writer.flush()?;
    drop(writer);

    if args.probability && !classification {
        if let Some(sigma) = model.svr_probability() {
            println!(
                "Prob. model for test data: target value = predicted value + z, \
                 z: Laplace distribution e^(-|z|/sigma)/(2sigma), sigma={sigma}"
            );
        }
    }
    print_accuracy(&model, problem.labels(), &predictions)
}

fn print_accuracy(model: &Model, labels: &[f64], predictions: &[f64]) -> Result<()> {
    match CrossValidationReport::new(model.svm_type(), labels, predictions)? {
        CrossValidationReport::Classification(report) => {
            let correct = labels.len() - report.misclassified.len();
            println!(
                "Accuracy = {}% ({correct}/{}) (classification)",
                report.accuracy * 100.0,
                labels.len()
            );
        }
        CrossValidationReport::Regression(report) => {
            println!(
                "Mean squared error = {} (regression)",
                report.mean_squared_error
            );
            println!(
                "Squared correlation coefficient = {} (regression)",
                report.squared_correlation
            );
        }
    }
    Ok(())
}

fn info_command(args: InfoArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let model = persistence::load(&args.model)?;
    let summary = model.summary();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("=== SVM Model Summary ===");
    println!("SVM Type: {}", summary.svm_type);
    println!("Kernel Type: {}", summary.kernel_type);
    println!("Classes: {}", summary.nr_class);
    println!("Support Vectors: {}", summary.total_sv);
    if let (Some(labels), Some(n_sv)) = (&summary.labels, &summary.n_sv) {
        for (label, count) in labels.iter().zip(n_sv) {
            println!("  label {label}: {count} support vectors");
        }
    }
    println!("Rho: {:?}", summary.rho);
    println!("Probability: {}", summary.probability);
    Ok(())
}
