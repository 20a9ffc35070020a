//! DocBench CLI: thin binding over the benchmark engine.
//!
//! Usage:
//!   docbench run -w traverse -a seqscan -a hashjump -i 1000
//!   docbench run --all-workloads -a seqscan --seed 42 -f json -o results/
//!   docbench compare results/a.json results/b.json --metric traverse
//!   docbench list all --verbose
//!   docbench validate bench-config.json

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde::Deserialize;

use docbench::adapter::AdapterRegistry;
use docbench::error::{BenchError, BenchResult};
use docbench::executor::{BenchmarkExecutor, BenchmarkResult};
use docbench::report::{self, HtmlOptions, ReportFormat};
use docbench::workload::{ParamValue, WorkloadConfig, WorkloadRegistry};

#[derive(Parser, Debug)]
#[command(
    name = "docbench",
    about = "Document database benchmark with overhead decomposition",
    version
)]
struct Cli {
    /// Verbose diagnostics.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute benchmark workloads against database adapters.
    Run(RunArgs),
    /// Compare benchmark results across runs or adapters.
    Compare(CompareArgs),
    /// Render saved result files into reports.
    Report(ReportArgs),
    /// List available workloads, adapters, or metrics.
    List(ListArgs),
    /// Validate a workload configuration file.
    Validate(ValidateArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Workload to execute (repeatable).
    #[arg(short, long = "workload")]
    workloads: Vec<String>,

    /// Database adapter (repeatable, required).
    #[arg(short, long = "adapter", required = true)]
    adapters: Vec<String>,

    /// Run all registered workloads.
    #[arg(long)]
    all_workloads: bool,

    /// Measurement iterations.
    #[arg(short, long, default_value_t = 1000)]
    iterations: u32,

    /// Warmup iterations (metrics discarded).
    #[arg(long, default_value_t = 100)]
    warmup: u32,

    /// Concurrent threads (must be 1 in this release).
    #[arg(long, default_value_t = 1)]
    concurrency: u32,

    /// Document nesting depth.
    #[arg(long, default_value_t = 5)]
    nesting_depth: u32,

    /// Fields per document.
    #[arg(long, default_value_t = 20)]
    field_count: u32,

    /// Number of test documents.
    #[arg(long, default_value_t = 100)]
    doc_count: u32,

    /// Target document size in bytes.
    #[arg(long, default_value_t = 5000)]
    doc_size: u32,

    /// Output directory for rendered reports.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format: console, json, csv, html (repeatable).
    #[arg(short, long = "format")]
    formats: Vec<String>,

    /// Random seed for reproducibility.
    #[arg(long)]
    seed: Option<u64>,

    /// Validate configuration without executing.
    #[arg(long)]
    dry_run: bool,

    /// Connection URI passed through to the adapters.
    #[arg(long)]
    uri: Option<String>,

    /// Database host.
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Database port (0 = adapter-chosen).
    #[arg(long, default_value_t = 0)]
    port: u16,

    /// Database name.
    #[arg(long, default_value = "docbench")]
    database: String,
}

#[derive(Args, Debug)]
struct CompareArgs {
    /// Result files (JSON) to compare.
    #[arg(required = true)]
    result_files: Vec<PathBuf>,

    /// Baseline result file; defaults to the first.
    #[arg(long)]
    baseline: Option<PathBuf>,

    /// Metrics to compare (repeatable).
    #[arg(long = "metric")]
    metrics: Vec<String>,

    /// Output format: table, json.
    #[arg(long, default_value = "table")]
    format: String,

    /// Sort result files by this metric's mean.
    #[arg(long)]
    sort: Option<String>,

    /// Highlight differences above this percentage.
    #[arg(long, default_value_t = 10.0)]
    threshold: f64,
}

#[derive(Args, Debug)]
struct ReportArgs {
    /// Result files (JSON) to render.
    #[arg(required = true)]
    result_files: Vec<PathBuf>,

    /// Output format: console, json, csv, html.
    #[arg(short, long, default_value = "console")]
    format: String,

    /// Output file; stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Report title (HTML).
    #[arg(long)]
    title: Option<String>,

    /// Include latency bar charts (HTML).
    #[arg(long)]
    include_charts: bool,

    /// Embed the raw JSON result (HTML).
    #[arg(long)]
    include_raw: bool,

    /// HTML template file with {{title}} and {{body}} placeholders.
    #[arg(long)]
    template: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// What to list: workloads, adapters, metrics, all.
    #[arg(default_value = "all")]
    what: String,

    /// Include descriptions and capabilities.
    #[arg(long)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Workload configuration file (JSON).
    config_file: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = match cli.command {
        Command::Run(args) => run(args),
        Command::Compare(args) => compare(args),
        Command::Report(args) => report_cmd(args),
        Command::List(args) => list(args),
        Command::Validate(args) => validate(args),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "docbench=debug" } else { "docbench=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ────────────────────────────────────────────────────────────────────────────
// run
// ────────────────────────────────────────────────────────────────────────────

fn run(args: RunArgs) -> BenchResult<()> {
    if !args.all_workloads && args.workloads.is_empty() {
        return Err(BenchError::config(
            "either --workload or --all-workloads must be specified",
        ));
    }

    let workloads = if args.all_workloads {
        WorkloadRegistry::available()
    } else {
        args.workloads.clone()
    };
    let formats: Vec<ReportFormat> = if args.formats.is_empty() {
        vec![ReportFormat::Console]
    } else {
        args.formats
            .iter()
            .map(|f| ReportFormat::parse(f))
            .collect::<BenchResult<_>>()?
    };

    // All configuration errors surface before any benchmark activity.
    for workload in &workloads {
        if !WorkloadRegistry::exists(workload) {
            return Err(BenchError::config(format!(
                "unknown workload: {workload} (available: {})",
                WorkloadRegistry::available().join(", ")
            )));
        }
    }
    for adapter in &args.adapters {
        if !AdapterRegistry::exists(adapter) {
            return Err(BenchError::config(format!(
                "unknown adapter: {adapter} (available: {})",
                AdapterRegistry::available().join(", ")
            )));
        }
    }
    let configs: Vec<WorkloadConfig> = workloads
        .iter()
        .map(|w| build_workload_config(w, &args))
        .collect::<BenchResult<_>>()?;

    print_header(&args, &workloads);

    if args.dry_run {
        for config in &configs {
            let diagnostics = config.validate();
            if !diagnostics.is_empty() {
                return Err(BenchError::config(diagnostics.join("; ")));
            }
        }
        println!("{}", "Configuration is valid.".green());
        return Ok(());
    }

    let executor = BenchmarkExecutor::new();

    for config in configs {
        println!(
            "\n{}",
            format!("═══ Workload: {} ═══", config.name()).bold()
        );
        let mut builder = BenchmarkResult::builder(config.name()).config(config.clone());

        for adapter_id in &args.adapters {
            println!("▸ running on {adapter_id}...");
            let mut adapter = AdapterRegistry::create(adapter_id)?;
            let mut workload = WorkloadRegistry::create(config.name())?;

            match executor.execute(workload.as_mut(), adapter.as_mut(), &config) {
                Ok(result) => {
                    println!(
                        "  {} completed in {}ms",
                        "✓".green(),
                        result.duration.as_millis()
                    );
                    builder = builder.add_adapter_result(result);
                }
                Err(err) => {
                    // A failed adapter aborts its own run only.
                    eprintln!("  {} {err}", "✗".red());
                }
            }
            adapter.close();
        }

        let result = builder.build();
        emit_reports(&result, &formats, args.output.as_deref())?;
    }

    Ok(())
}

fn print_header(args: &RunArgs, workloads: &[String]) {
    println!("{}", "DocBench - overhead decomposition benchmark".bold().blue());
    println!(
        "  workloads: {}  adapters: {}",
        workloads.join(", "),
        args.adapters.join(", ")
    );
    println!(
        "  iterations: {}  warmup: {}  documents: {}",
        args.iterations, args.warmup, args.doc_count
    );
    if let Some(seed) = args.seed {
        println!("  seed: {seed}");
    }
}

fn build_workload_config(workload: &str, args: &RunArgs) -> BenchResult<WorkloadConfig> {
    let mut builder = WorkloadConfig::builder(workload)
        .iterations(args.iterations)
        .warmup_iterations(args.warmup)
        .concurrency(args.concurrency)
        .parameter("documentCount", args.doc_count as i64)
        .parameter("nestingDepth", args.nesting_depth as i64)
        .parameter("fieldCount", args.field_count as i64)
        .parameter("documentSizeBytes", args.doc_size as i64)
        .parameter("host", args.host.as_str())
        .parameter("port", args.port as i64)
        .parameter("database", args.database.as_str());
    if let Some(seed) = args.seed {
        builder = builder.seed(seed);
    }
    if let Some(uri) = &args.uri {
        builder = builder.parameter("uri", uri.as_str());
    }
    builder.build()
}

fn emit_reports(
    result: &BenchmarkResult,
    formats: &[ReportFormat],
    output: Option<&Path>,
) -> BenchResult<()> {
    for format in formats {
        if *format == ReportFormat::Console {
            print!("{}", report::render_console(result));
            continue;
        }
        let Some(dir) = output else {
            // Non-console formats need somewhere to land.
            print!("{}", report::render(result, *format)?);
            continue;
        };
        std::fs::create_dir_all(dir)?;
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let path = dir.join(format!(
            "{}_{millis}.{}",
            result.workload_name(),
            format.extension()
        ));
        report::write(result, *format, &path)?;
        println!("  report written to {}", path.display());
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// compare / report
// ────────────────────────────────────────────────────────────────────────────

fn compare(args: CompareArgs) -> BenchResult<()> {
    let mut files = args.result_files.clone();
    let baseline_index = match &args.baseline {
        Some(baseline) => match files.iter().position(|f| f == baseline) {
            Some(index) => index,
            None => {
                files.insert(0, baseline.clone());
                0
            }
        },
        None => 0,
    };

    let mut results: Vec<(String, BenchmarkResult)> = Vec::with_capacity(files.len());
    for file in &files {
        let name = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());
        results.push((name, report::load_json(file)?));
    }

    let metrics = if args.metrics.is_empty() {
        vec!["total_latency".to_string()]
    } else {
        args.metrics.clone()
    };

    if let Some(sort_metric) = &args.sort {
        let baseline_name = results[baseline_index].0.clone();
        results.sort_by(|a, b| {
            let mean = |r: &BenchmarkResult| {
                r.adapter_results()
                    .values()
                    .filter_map(|ar| ar.metrics.histogram(sort_metric))
                    .map(|h| h.mean)
                    .fold(f64::INFINITY, f64::min)
            };
            mean(&a.1).total_cmp(&mean(&b.1))
        });
        // Keep the baseline reference stable across the sort.
        let new_index = results
            .iter()
            .position(|(name, _)| *name == baseline_name)
            .unwrap_or(0);
        return finish_compare(&args, &results, new_index, &metrics);
    }

    finish_compare(&args, &results, baseline_index, &metrics)
}

fn finish_compare(
    args: &CompareArgs,
    results: &[(String, BenchmarkResult)],
    baseline_index: usize,
    metrics: &[String],
) -> BenchResult<()> {
    match args.format.as_str() {
        "table" => {
            print!(
                "{}",
                report::render_comparison(results, baseline_index, metrics, args.threshold)
            );
            Ok(())
        }
        "json" => {
            let loaded: Vec<&BenchmarkResult> = results.iter().map(|(_, r)| r).collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&loaded)
                    .map_err(|e| BenchError::config(e.to_string()))?
            );
            Ok(())
        }
        other => Err(BenchError::config(format!(
            "unknown comparison format: {other} (available: table, json)"
        ))),
    }
}

fn report_cmd(args: ReportArgs) -> BenchResult<()> {
    let format = ReportFormat::parse(&args.format)?;
    let template = match &args.template {
        Some(path) => Some(std::fs::read_to_string(path)?),
        None => None,
    };

    for (index, file) in args.result_files.iter().enumerate() {
        let result = report::load_json(file)?;
        let rendered = match format {
            ReportFormat::Html => report::render_html_with(
                &result,
                &HtmlOptions {
                    title: args.title.clone(),
                    include_raw: args.include_raw,
                    include_charts: args.include_charts,
                    template: template.clone(),
                },
            ),
            other => report::render(&result, other)?,
        };

        match &args.output {
            None => print!("{rendered}"),
            Some(output) => {
                let path = if args.result_files.len() == 1 {
                    output.clone()
                } else {
                    output.with_file_name(format!(
                        "{}_{index}.{}",
                        output
                            .file_stem()
                            .map(|s| s.to_string_lossy().into_owned())
                            .unwrap_or_else(|| "report".to_string()),
                        format.extension()
                    ))
                };
                std::fs::write(&path, rendered)?;
                println!("report written to {}", path.display());
            }
        }
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// list / validate
// ────────────────────────────────────────────────────────────────────────────

/// Conventional accumulator bucket names with what each one measures.
const METRIC_DESCRIPTIONS: &[(&str, &str)] = &[
    ("total_latency", "end-to-end wall time per operation"),
    ("connection_acquisition", "pool checkout"),
    ("connection_release", "pool return"),
    ("serialization", "request encoding to wire format"),
    ("wire_transmit", "request bytes onto the network"),
    ("server_execution", "server-reported total execution"),
    ("server_parse", "server-side request parsing"),
    ("server_traversal", "server-side document navigation"),
    ("server_index", "server-side index lookup"),
    ("server_fetch", "server-side storage read"),
    ("wire_receive", "response bytes off the network"),
    ("deserialization", "response decoding on the client"),
    ("client_traversal", "client-side field access"),
    ("total_traversal", "server + client traversal"),
    ("total_overhead", "total latency minus storage fetch"),
    ("network_overhead", "transmit + receive"),
    ("serialization_overhead", "encode + decode"),
    ("connection_overhead", "acquire + release"),
];

fn list(args: ListArgs) -> BenchResult<()> {
    let what = args.what.as_str();
    if !matches!(what, "workloads" | "adapters" | "metrics" | "all") {
        return Err(BenchError::config(format!(
            "unknown list target: {what} (available: workloads, adapters, metrics, all)"
        )));
    }

    if what == "workloads" || what == "all" {
        println!("{}", "Workloads:".bold());
        for (id, description) in WorkloadRegistry::describe_all() {
            if args.verbose {
                println!("  {id:<12} {description}");
            } else {
                println!("  {id}");
            }
        }
    }

    if what == "adapters" || what == "all" {
        println!("{}", "Adapters:".bold());
        for (id, name) in AdapterRegistry::describe_all() {
            if args.verbose {
                let adapter = AdapterRegistry::create(&id)?;
                let capabilities: Vec<String> = adapter
                    .capabilities()
                    .iter()
                    .map(|c| c.to_string())
                    .collect();
                println!("  {id:<12} {name} [{}]", capabilities.join(", "));
            } else {
                println!("  {id}");
            }
        }
    }

    if what == "metrics" || what == "all" {
        println!("{}", "Metrics:".bold());
        for (name, description) in METRIC_DESCRIPTIONS {
            if args.verbose {
                println!("  {name:<24} {description}");
            } else {
                println!("  {name}");
            }
        }
    }

    Ok(())
}

/// On-disk workload configuration schema.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkloadConfigFile {
    name: String,
    iterations: Option<u32>,
    warmup_iterations: Option<u32>,
    seed: Option<u64>,
    concurrency: Option<u32>,
    #[serde(default)]
    parameters: BTreeMap<String, ParamValue>,
}

fn validate(args: ValidateArgs) -> BenchResult<()> {
    let raw = std::fs::read_to_string(&args.config_file)?;
    let file: WorkloadConfigFile = serde_json::from_str(&raw).map_err(|e| {
        BenchError::config(format!(
            "failed to parse {}: {e}",
            args.config_file.display()
        ))
    })?;

    let mut builder = WorkloadConfig::builder(&file.name)
        .iterations(file.iterations.unwrap_or(1000))
        .warmup_iterations(file.warmup_iterations.unwrap_or(100))
        .concurrency(file.concurrency.unwrap_or(1));
    if let Some(seed) = file.seed {
        builder = builder.seed(seed);
    }
    for (key, value) in file.parameters {
        builder = builder.parameter(key, value);
    }
    let config = builder.build()?;

    if !WorkloadRegistry::exists(config.name()) {
        return Err(BenchError::config(format!(
            "unknown workload: {} (available: {})",
            config.name(),
            WorkloadRegistry::available().join(", ")
        )));
    }

    let diagnostics = config.validate();
    if diagnostics.is_empty() {
        println!("{} {}", "valid:".green().bold(), args.config_file.display());
        Ok(())
    } else {
        for diagnostic in &diagnostics {
            eprintln!("  {diagnostic}");
        }
        Err(BenchError::config(format!(
            "{} validation error(s)",
            diagnostics.len()
        )))
    }
}
