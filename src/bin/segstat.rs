//! segstat CLI - Command-line interface for segstat
//!
//! Commands:
//! - preview: Load a spreadsheet and print the canonical table
//! - summarize: Run the full pipeline and write a summary spreadsheet
//! - outliers: Detect outliers and print the flagged records

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use segstat::export::{export_filename, summary_to_csv, table_to_csv};
use segstat::{
    analyze_table, load_with, AnalysisError, AnalysisRequest, HeaderLayout, LoadOptions,
    OutlierMethod, OutlierOptions, OutlierPolicy, SubjectFilter, SummaryOptions,
    SEGSTAT_VERSION,
};

/// segstat - summary statistics for repeated-measures spreadsheets
#[derive(Parser)]
#[command(name = "segstat")]
#[command(version = SEGSTAT_VERSION)]
#[command(about = "Filter, outlier-check and summarize repeated-measures spreadsheets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a spreadsheet and print the canonical table as CSV
    Preview {
        /// Input file path (use - for stdin)
        input: PathBuf,

        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Run the full pipeline and write a summary spreadsheet
    Summarize {
        /// Input file path (use - for stdin)
        input: PathBuf,

        /// Output file path (use - for stdout); defaults to a name
        /// derived from the selected metrics
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Metric to summarize (repeatable)
        #[arg(short, long = "metric", required = true)]
        metrics: Vec<String>,

        /// Segment to include (repeatable; default: all segments)
        #[arg(short, long = "segment")]
        segments: Vec<String>,

        /// Subject to exclude (repeatable)
        #[arg(long)]
        exclude: Vec<String>,

        /// Keep only this subject (overrides --exclude)
        #[arg(long)]
        isolate: Option<String>,

        /// What to do with outliers
        #[arg(long, value_enum, default_value = "ignore")]
        outliers: OutlierMode,

        #[command(flatten)]
        detector: DetectorArgs,

        /// Multiplier for the summary's out_high/out_low bounds
        #[arg(long, default_value_t = segstat::summary::DEFAULT_BOUND_MULTIPLIER)]
        bound_multiplier: f64,

        /// Also print the full structured result as JSON to stdout
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Detect outliers and print the flagged records
    Outliers {
        /// Input file path (use - for stdin)
        input: PathBuf,

        /// Metric to check (repeatable)
        #[arg(short, long = "metric", required = true)]
        metrics: Vec<String>,

        /// Segment to include (repeatable; default: all segments)
        #[arg(short, long = "segment")]
        segments: Vec<String>,

        #[command(flatten)]
        detector: DetectorArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        layout: LayoutArgs,
    },
}

#[derive(clap::Args)]
struct LayoutArgs {
    /// Input carries a units/descriptor row between the header rows
    #[arg(long)]
    units_row: bool,

    /// Header name of the subject column (default: leftmost column)
    #[arg(long)]
    subject_column: Option<String>,
}

impl LayoutArgs {
    fn to_options(&self) -> LoadOptions {
        LoadOptions {
            layout: if self.units_row {
                HeaderLayout::MetricUnitsSegment
            } else {
                HeaderLayout::MetricSegment
            },
            subject_column: self.subject_column.clone(),
        }
    }
}

#[derive(clap::Args)]
struct DetectorArgs {
    /// Outlier rule
    #[arg(long, value_enum, default_value = "std")]
    method: MethodArg,

    /// Standard-deviation multiplier for the STD rule
    #[arg(long, default_value_t = segstat::outlier::DEFAULT_STD_MULTIPLIER)]
    std_multiplier: f64,

    /// Fence multiplier for the IQR rule
    #[arg(long, default_value_t = segstat::outlier::DEFAULT_IQR_FENCE)]
    iqr_fence: f64,
}

impl DetectorArgs {
    fn to_options(&self) -> OutlierOptions {
        OutlierOptions {
            method: match self.method {
                MethodArg::Iqr => OutlierMethod::Iqr,
                MethodArg::Std => OutlierMethod::Std,
            },
            std_multiplier: self.std_multiplier,
            iqr_fence: self.iqr_fence,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum MethodArg {
    /// Interquartile-range fences
    Iqr,
    /// Mean plus/minus k standard deviations
    Std,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutlierMode {
    /// No detection
    Ignore,
    /// Report flags, keep all rows
    Flag,
    /// Report flags and drop flagged subjects before summarizing
    Exclude,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliErrorReport::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), SegstatCliError> {
    match cli.command {
        Commands::Preview { input, layout } => cmd_preview(&input, &layout),

        Commands::Summarize {
            input,
            output,
            metrics,
            segments,
            exclude,
            isolate,
            outliers,
            detector,
            bound_multiplier,
            json,
            layout,
        } => cmd_summarize(
            &input,
            output.as_deref(),
            metrics,
            segments,
            exclude,
            isolate,
            outliers,
            &detector,
            bound_multiplier,
            json,
            &layout,
        ),

        Commands::Outliers {
            input,
            metrics,
            segments,
            detector,
            json,
            layout,
        } => cmd_outliers(&input, metrics, segments, &detector, json, &layout),
    }
}

fn cmd_preview(input: &Path, layout: &LayoutArgs) -> Result<(), SegstatCliError> {
    let bytes = read_input(input)?;
    let table = load_with(&bytes, &layout.to_options())?;
    let csv = table_to_csv(&table)?;
    io::stdout().write_all(&csv)?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_summarize(
    input: &Path,
    output: Option<&Path>,
    metrics: Vec<String>,
    segments: Vec<String>,
    exclude: Vec<String>,
    isolate: Option<String>,
    outliers: OutlierMode,
    detector: &DetectorArgs,
    bound_multiplier: f64,
    json: bool,
    layout: &LayoutArgs,
) -> Result<(), SegstatCliError> {
    let bytes = read_input(input)?;
    let table = load_with(&bytes, &layout.to_options())?;

    let request = AnalysisRequest {
        metrics: metrics.clone(),
        segments,
        filter: SubjectFilter {
            isolate,
            exclude: exclude.into_iter().collect(),
        },
        outliers: match outliers {
            OutlierMode::Ignore => OutlierPolicy::Ignore,
            OutlierMode::Flag => OutlierPolicy::Flag(detector.to_options()),
            OutlierMode::Exclude => OutlierPolicy::Exclude(detector.to_options()),
        },
        summary: SummaryOptions { bound_multiplier },
    };

    let result = analyze_table(&table, &request)?;

    if !result.outliers.is_empty() {
        eprintln!(
            "{} outlier flag(s) across {} subject(s)",
            result.outliers.len(),
            result.outliers.subjects().len()
        );
    }

    let csv = summary_to_csv(&result.summary)?;
    let default_name = PathBuf::from(export_filename(&metrics));
    let target = output.unwrap_or(default_name.as_path());
    if target.to_string_lossy() == "-" {
        io::stdout().write_all(&csv)?;
    } else {
        fs::write(target, csv)?;
        eprintln!("wrote {}", target.display());
    }

    if json {
        println!("{}", result.to_json()?);
    }

    Ok(())
}

fn cmd_outliers(
    input: &Path,
    metrics: Vec<String>,
    segments: Vec<String>,
    detector: &DetectorArgs,
    json: bool,
    layout: &LayoutArgs,
) -> Result<(), SegstatCliError> {
    let bytes = read_input(input)?;
    let table = load_with(&bytes, &layout.to_options())?;

    let mut flags = segstat::OutlierSet::default();
    for metric in &metrics {
        flags.extend(segstat::outlier::detect(
            &table,
            metric,
            &segments,
            &detector.to_options(),
        ));
    }

    if json {
        let records: Vec<&segstat::OutlierRecord> = flags.iter().collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else if flags.is_empty() {
        println!("no outliers");
    } else {
        for record in flags.iter() {
            println!(
                "{}\t{}/{}\t({})",
                record.subject,
                record.metric,
                record.segment,
                record.method.as_str()
            );
        }
    }

    Ok(())
}

fn read_input(input: &Path) -> Result<Vec<u8>, SegstatCliError> {
    if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            eprintln!("reading spreadsheet from stdin (pipe a CSV or pass a file path)");
        }
        let mut buffer = Vec::new();
        io::stdin().read_to_end(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read(input)?)
    }
}

#[derive(Debug)]
enum SegstatCliError {
    Io(io::Error),
    Analysis(AnalysisError),
    Json(serde_json::Error),
}

impl From<io::Error> for SegstatCliError {
    fn from(e: io::Error) -> Self {
        SegstatCliError::Io(e)
    }
}

impl From<AnalysisError> for SegstatCliError {
    fn from(e: AnalysisError) -> Self {
        SegstatCliError::Analysis(e)
    }
}

impl From<serde_json::Error> for SegstatCliError {
    fn from(e: serde_json::Error) -> Self {
        SegstatCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliErrorReport {
    error_type: String,
    message: String,
}

impl From<SegstatCliError> for CliErrorReport {
    fn from(e: SegstatCliError) -> Self {
        match e {
            SegstatCliError::Io(e) => CliErrorReport {
                error_type: "io".to_string(),
                message: e.to_string(),
            },
            SegstatCliError::Analysis(e) => CliErrorReport {
                error_type: match e {
                    AnalysisError::EmptySelection(_) => "empty_selection".to_string(),
                    _ => "analysis".to_string(),
                },
                message: e.to_string(),
            },
            SegstatCliError::Json(e) => CliErrorReport {
                error_type: "json".to_string(),
                message: e.to_string(),
            },
        }
    }
}
