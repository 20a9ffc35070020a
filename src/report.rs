//! Renderers for [`BenchmarkResult`]: console tables, JSON, CSV, and a
//! self-contained HTML page. Reporters consume the result aggregate only;
//! nothing here reaches back into the engine.

use std::path::Path;

use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};

use crate::error::{BenchError, BenchResult};
use crate::executor::{AdapterResult, BenchmarkResult};
use crate::metrics::HistogramSummary;

/// Output format for rendered reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Console,
    Json,
    Csv,
    Html,
}

impl ReportFormat {
    pub fn parse(name: &str) -> BenchResult<Self> {
        match name {
            "console" => Ok(ReportFormat::Console),
            "json" => Ok(ReportFormat::Json),
            "csv" => Ok(ReportFormat::Csv),
            "html" => Ok(ReportFormat::Html),
            other => Err(BenchError::config(format!(
                "unknown format: {other} (available: console, json, csv, html)"
            ))),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Console => "txt",
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
            ReportFormat::Html => "html",
        }
    }
}

/// Renders a result in the requested format.
pub fn render(result: &BenchmarkResult, format: ReportFormat) -> BenchResult<String> {
    match format {
        ReportFormat::Console => Ok(render_console(result)),
        ReportFormat::Json => render_json(result),
        ReportFormat::Csv => render_csv(result),
        ReportFormat::Html => Ok(render_html(result, None, false)),
    }
}

/// Renders and writes a result to `path`.
pub fn write(result: &BenchmarkResult, format: ReportFormat, path: &Path) -> BenchResult<()> {
    let rendered = render(result, format)?;
    std::fs::write(path, rendered)?;
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Console
// ────────────────────────────────────────────────────────────────────────────

/// Metrics shown first, in this order; everything else follows
/// alphabetically.
const PREFERRED_METRICS: &[&str] = &[
    "traverse",
    "deserialize",
    "total_latency",
    "server_traversal",
    "client_traversal",
    "total_traversal",
    "deserialization",
    "serialization",
    "server_fetch",
    "server_execution",
    "total_overhead",
    "network_overhead",
    "serialization_overhead",
    "connection_overhead",
];

fn ordered_metrics(adapter_result: &AdapterResult) -> Vec<String> {
    let mut names: Vec<String> = adapter_result.metrics.histograms.keys().cloned().collect();
    names.sort_by_key(|name| {
        (
            PREFERRED_METRICS
                .iter()
                .position(|p| p == name)
                .unwrap_or(PREFERRED_METRICS.len()),
            name.clone(),
        )
    });
    names
}

pub fn render_console(result: &BenchmarkResult) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "\n{}\n",
        format!("━━━ {} ━━━", result.workload_name()).bold().cyan()
    ));

    if let Some(config) = result.config() {
        out.push_str(&format!(
            "  iterations: {}  warmup: {}",
            config.iterations(),
            config.warmup_iterations()
        ));
        if let Some(seed) = config.seed() {
            out.push_str(&format!("  seed: {seed}"));
        }
        out.push('\n');
    }
    out.push_str(&format!(
        "  total: {:.2}s\n",
        result.total_duration().as_secs_f64()
    ));

    for adapter_result in result.adapter_results().values() {
        out.push_str(&format!(
            "\n{} {} ({})  ok: {}  errors: {}\n",
            "▸".bold().green(),
            adapter_result.adapter_name.bold(),
            adapter_result.adapter_id,
            adapter_result.success_count,
            adapter_result.error_count
        ));

        let mut table = Table::new();
        table.load_preset(UTF8_FULL).apply_modifier(UTF8_ROUND_CORNERS);
        table.set_header(vec![
            "Metric", "Count", "Mean (μs)", "P50 (μs)", "P90 (μs)", "P95 (μs)", "P99 (μs)",
            "P99.9 (μs)",
        ]);
        for name in ordered_metrics(adapter_result) {
            let Some(h) = adapter_result.metrics.histogram(&name) else {
                continue;
            };
            table.add_row(vec![
                Cell::new(&name),
                Cell::new(h.count),
                Cell::new(format!("{:.1}", h.mean / 1_000.0)),
                Cell::new(format!("{:.1}", h.p50 as f64 / 1_000.0)),
                Cell::new(format!("{:.1}", h.p90 as f64 / 1_000.0)),
                Cell::new(format!("{:.1}", h.p95 as f64 / 1_000.0)),
                Cell::new(format!("{:.1}", h.p99 as f64 / 1_000.0)),
                Cell::new(format!("{:.1}", h.p999 as f64 / 1_000.0)),
            ]);
        }
        out.push_str(&format!("{table}\n"));

        if !adapter_result.metrics.counters.is_empty() {
            let counters: Vec<String> = adapter_result
                .metrics
                .counters
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            out.push_str(&format!("  {}\n", counters.join(", ").dimmed()));
        }
    }

    if result.adapter_results().len() > 1 {
        out.push_str(&render_pairwise_comparison(result));
    }

    out
}

/// Head-to-head comparison of the first two adapters on their common
/// metrics.
fn render_pairwise_comparison(result: &BenchmarkResult) -> String {
    let adapters: Vec<&AdapterResult> = result.adapter_results().values().collect();
    let (first, second) = (adapters[0], adapters[1]);

    let mut out = format!("\n{}\n", "── Comparison ──".bold().yellow());
    for name in ordered_metrics(first) {
        let (Some(h1), Some(h2)) = (
            first.metrics.histogram(&name),
            second.metrics.histogram(&name),
        ) else {
            continue;
        };
        if h1.mean <= 0.0 || h2.mean <= 0.0 {
            continue;
        }
        let ratio = h1.mean / h2.mean;
        let (faster, speedup) = if ratio > 1.0 {
            (second.adapter_name.as_str(), ratio)
        } else {
            (first.adapter_name.as_str(), 1.0 / ratio)
        };
        out.push_str(&format!(
            "  {}: {} is {} faster  ({:.0} ns vs {:.0} ns mean)\n",
            name,
            faster.bold(),
            format!("{speedup:.2}x").green(),
            h1.mean,
            h2.mean
        ));
    }
    out
}

// ────────────────────────────────────────────────────────────────────────────
// JSON / CSV
// ────────────────────────────────────────────────────────────────────────────

pub fn render_json(result: &BenchmarkResult) -> BenchResult<String> {
    serde_json::to_string_pretty(result)
        .map_err(|e| BenchError::config(format!("JSON serialization failed: {e}")))
}

pub fn load_json(path: &Path) -> BenchResult<BenchmarkResult> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| {
        BenchError::config(format!("failed to parse result file {}: {e}", path.display()))
    })
}

pub fn render_csv(result: &BenchmarkResult) -> BenchResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "workload",
            "adapter_id",
            "adapter_name",
            "metric",
            "count",
            "mean_ns",
            "min_ns",
            "max_ns",
            "std_dev_ns",
            "p50_ns",
            "p90_ns",
            "p95_ns",
            "p99_ns",
            "p999_ns",
        ])
        .map_err(csv_error)?;

    for adapter_result in result.adapter_results().values() {
        for name in ordered_metrics(adapter_result) {
            let Some(h) = adapter_result.metrics.histogram(&name) else {
                continue;
            };
            writer
                .write_record([
                    result.workload_name(),
                    &adapter_result.adapter_id,
                    &adapter_result.adapter_name,
                    &name,
                    &h.count.to_string(),
                    &format!("{:.2}", h.mean),
                    &h.min.to_string(),
                    &h.max.to_string(),
                    &format!("{:.2}", h.std_dev),
                    &h.p50.to_string(),
                    &h.p90.to_string(),
                    &h.p95.to_string(),
                    &h.p99.to_string(),
                    &h.p999.to_string(),
                ])
                .map_err(csv_error)?;
        }
    }

    let bytes = writer.into_inner().map_err(|e| BenchError::config(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| BenchError::config(e.to_string()))
}

fn csv_error(e: csv::Error) -> BenchError {
    BenchError::config(format!("CSV rendering failed: {e}"))
}

// ────────────────────────────────────────────────────────────────────────────
// HTML
// ────────────────────────────────────────────────────────────────────────────

/// Options for the HTML renderer.
#[derive(Debug, Default)]
pub struct HtmlOptions {
    pub title: Option<String>,
    pub include_raw: bool,
    pub include_charts: bool,
    /// Template with `{{title}}` and `{{body}}` placeholders; the
    /// built-in page is used when absent.
    pub template: Option<String>,
}

pub fn render_html_with(result: &BenchmarkResult, options: &HtmlOptions) -> String {
    let title = options.title.as_deref().unwrap_or("DocBench Results");
    let mut body = String::new();

    body.push_str(&format!(
        "<h2>Workload: {}</h2>\n<p>total {:.2}s</p>\n",
        escape(result.workload_name()),
        result.total_duration().as_secs_f64()
    ));

    for adapter_result in result.adapter_results().values() {
        body.push_str(&format!(
            "<h3>{} <small>({})</small></h3>\n<p>ok: {} errors: {}</p>\n",
            escape(&adapter_result.adapter_name),
            escape(&adapter_result.adapter_id),
            adapter_result.success_count,
            adapter_result.error_count
        ));
        body.push_str(
            "<table><thead><tr><th>Metric</th><th>Count</th><th>Mean (ns)</th>\
             <th>P50</th><th>P90</th><th>P95</th><th>P99</th><th>P99.9</th></tr></thead><tbody>\n",
        );
        for name in ordered_metrics(adapter_result) {
            let Some(h) = adapter_result.metrics.histogram(&name) else {
                continue;
            };
            body.push_str(&html_metric_row(&name, h));
        }
        body.push_str("</tbody></table>\n");
    }

    if options.include_charts {
        body.push_str(&html_charts(result));
    }

    if options.include_raw {
        if let Ok(json) = render_json(result) {
            body.push_str(&format!("<h3>Raw data</h3>\n<pre>{}</pre>\n", escape(&json)));
        }
    }

    match &options.template {
        Some(template) => template
            .replace("{{title}}", &escape(title))
            .replace("{{body}}", &body),
        None => format!(
            "<!doctype html>\n<html><head><meta charset=\"utf-8\">\n<title>{title}</title>\n\
             <style>\n\
             body {{ font-family: sans-serif; margin: 2rem; }}\n\
             table {{ border-collapse: collapse; margin-bottom: 1.5rem; }}\n\
             th, td {{ border: 1px solid #ccc; padding: 4px 10px; text-align: right; }}\n\
             th:first-child, td:first-child {{ text-align: left; }}\n\
             .bar {{ background: #4a7fb5; height: 14px; display: inline-block; }}\n\
             .bar-label {{ display: inline-block; width: 14rem; }}\n\
             </style></head><body>\n<h1>{title}</h1>\n{body}</body></html>\n",
            title = escape(title),
            body = body
        ),
    }
}

/// Horizontal mean-latency bars for the workload's primary metric, one
/// per adapter, scaled against the slowest.
fn html_charts(result: &BenchmarkResult) -> String {
    let metric = result.workload_name().to_string();
    let means: Vec<(&str, f64)> = result
        .adapter_results()
        .values()
        .filter_map(|r| {
            r.metrics
                .histogram(&metric)
                .map(|h| (r.adapter_name.as_str(), h.mean))
        })
        .collect();
    let max = means.iter().map(|(_, m)| *m).fold(0.0f64, f64::max);
    if means.is_empty() || max <= 0.0 {
        return String::new();
    }

    let mut out = format!("<h3>Mean latency: {}</h3>\n", escape(&metric));
    for (name, mean) in means {
        let width = (mean / max * 400.0).round() as u64;
        out.push_str(&format!(
            "<div><span class=\"bar-label\">{}</span>\
             <span class=\"bar\" style=\"width:{width}px\"></span> {:.0} ns</div>\n",
            escape(name),
            mean
        ));
    }
    out
}

pub fn render_html(result: &BenchmarkResult, title: Option<&str>, include_raw: bool) -> String {
    render_html_with(
        result,
        &HtmlOptions {
            title: title.map(str::to_string),
            include_raw,
            ..Default::default()
        },
    )
}

fn html_metric_row(name: &str, h: &HistogramSummary) -> String {
    format!(
        "<tr><td>{}</td><td>{}</td><td>{:.0}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
        escape(name),
        h.count,
        h.mean,
        h.p50,
        h.p90,
        h.p95,
        h.p99,
        h.p999
    )
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// ────────────────────────────────────────────────────────────────────────────
// Comparison across result files
// ────────────────────────────────────────────────────────────────────────────

/// Compares a metric across result files against a baseline (the first
/// file unless one is named). Differences beyond `threshold_percent` are
/// highlighted.
pub fn render_comparison(
    results: &[(String, BenchmarkResult)],
    baseline_index: usize,
    metrics: &[String],
    threshold_percent: f64,
) -> String {
    let mut out = String::new();
    let Some((baseline_name, baseline)) = results.get(baseline_index) else {
        return "no results to compare\n".to_string();
    };
    out.push_str(&format!(
        "{} (baseline: {})\n",
        "── Result Comparison ──".bold().yellow(),
        baseline_name
    ));

    for metric in metrics {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL).apply_modifier(UTF8_ROUND_CORNERS);
        table.set_header(vec!["Result", "Adapter", "Mean (ns)", "P99 (ns)", "vs baseline"]);

        for (name, result) in results {
            for adapter_result in result.adapter_results().values() {
                let Some(h) = adapter_result.metrics.histogram(metric) else {
                    continue;
                };
                let baseline_mean = baseline
                    .adapter_results()
                    .get(&adapter_result.adapter_id)
                    .and_then(|r| r.metrics.histogram(metric))
                    .map(|b| b.mean);
                let delta = match baseline_mean {
                    Some(b) if b > 0.0 => {
                        let pct = (h.mean - b) / b * 100.0;
                        let text = format!("{pct:+.1}%");
                        if pct.abs() >= threshold_percent {
                            if pct > 0.0 {
                                Cell::new(text).fg(Color::Red)
                            } else {
                                Cell::new(text).fg(Color::Green)
                            }
                        } else {
                            Cell::new(text)
                        }
                    }
                    _ => Cell::new("-"),
                };
                table.add_row(vec![
                    Cell::new(name),
                    Cell::new(&adapter_result.adapter_id),
                    Cell::new(format!("{:.0}", h.mean)),
                    Cell::new(h.p99),
                    delta,
                ]);
            }
        }
        out.push_str(&format!("\n{}\n{table}\n", metric.bold()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsSummary;
    use std::time::Duration;

    fn summary_with(metric: &str, mean: f64) -> MetricsSummary {
        let mut summary = MetricsSummary::default();
        summary.histograms.insert(
            metric.to_string(),
            HistogramSummary {
                count: 100,
                mean,
                min: 10,
                max: 100_000,
                std_dev: 5.0,
                p50: 40_000,
                p90: 80_000,
                p95: 90_000,
                p99: 99_000,
                p999: 100_000,
            },
        );
        summary
    }

    fn sample_result() -> BenchmarkResult {
        BenchmarkResult::builder("traverse")
            .add_adapter_result(AdapterResult {
                adapter_id: "seqscan".into(),
                adapter_name: "Sequential Scan".into(),
                metrics: summary_with("traverse", 50_000.0),
                iterations: 100,
                warmup_iterations: 10,
                success_count: 100,
                error_count: 0,
                duration: Duration::from_millis(42),
            })
            .add_adapter_result(AdapterResult {
                adapter_id: "hashjump".into(),
                adapter_name: "Hash Jump".into(),
                metrics: summary_with("traverse", 25_000.0),
                iterations: 100,
                warmup_iterations: 10,
                success_count: 100,
                error_count: 0,
                duration: Duration::from_millis(21),
            })
            .build()
    }

    #[test]
    fn console_report_includes_comparison() {
        let rendered = render_console(&sample_result());
        assert!(rendered.contains("traverse"));
        assert!(rendered.contains("Sequential Scan"));
        assert!(rendered.contains("faster"));
    }

    #[test]
    fn csv_has_one_row_per_metric() {
        let csv = render_csv(&sample_result()).unwrap();
        let lines: Vec<&str> = csv.trim().lines().collect();
        assert_eq!(lines.len(), 3); // header + one metric per adapter
        assert!(lines[0].starts_with("workload,adapter_id"));
        assert!(lines[1].contains("seqscan"));
    }

    #[test]
    fn json_round_trips() {
        let json = render_json(&sample_result()).unwrap();
        let parsed: BenchmarkResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.adapter_results().len(), 2);
    }

    #[test]
    fn html_escapes_content() {
        let html = render_html(&sample_result(), Some("A <title>"), false);
        assert!(html.contains("A &lt;title&gt;"));
        assert!(html.contains("<table>"));
    }

    #[test]
    fn format_parsing() {
        assert_eq!(ReportFormat::parse("json").unwrap(), ReportFormat::Json);
        assert!(ReportFormat::parse("yaml").is_err());
        assert_eq!(ReportFormat::Html.extension(), "html");
    }

    #[test]
    fn comparison_highlights_deltas() {
        let a = ("run_a".to_string(), sample_result());
        let b = ("run_b".to_string(), sample_result());
        let rendered =
            render_comparison(&[a, b], 0, &["traverse".to_string()], 10.0);
        assert!(rendered.contains("run_a"));
        assert!(rendered.contains("traverse"));
    }
}
