//! CLI binary for md2docx.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use md2docx::{
    convert_to_file, inspect, restyle, ConversionConfig, ConversionOutput,
    ConversionProgressCallback, ImageSize, PageLayout, ProgressCallback, Stage, SvgStatus,
    ToolCommand,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner for the pipeline stages that turns
/// into a bar while diagrams render, plus one log line per diagram and SVG.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-diagram wall-clock start times; diagrams may finish out of order.
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading markdown…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} diagrams  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
    }

    fn back_to_spinner(&self) {
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        self.bar.set_style(spinner_style);
    }

    fn elapsed_secs(&self, n: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&n))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_stage(&self, stage: Stage) {
        match stage {
            Stage::Diagrams => {}
            _ => {
                self.back_to_spinner();
                self.bar.set_prefix("Working");
                self.bar.set_message(format!("{stage}…"));
            }
        }
    }

    fn on_conversion_start(&self, total_diagrams: usize) {
        if total_diagrams == 0 {
            return;
        }
        self.activate_bar(total_diagrams);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendering {total_diagrams} Mermaid diagrams…"))
        ));
    }

    fn on_diagram_start(&self, n: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(n, Instant::now());
        }
        self.bar.set_message(format!("diagram {n}"));
    }

    fn on_diagram_complete(&self, n: usize, total: usize, size: Option<&ImageSize>) {
        let secs = self.elapsed_secs(n);
        let size = size.map_or_else(String::new, |s| s.to_string());
        self.bar.println(format!(
            "  {} Diagram {:>3}/{:<3}  {:<14}  {}",
            green("✓"),
            n,
            total,
            dim(&size),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_diagram_error(&self, n: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(n);
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Keep the first line only; mmdc stack traces are long.
        let first = error.lines().next().unwrap_or_default();
        let msg: String = if first.chars().count() > 80 {
            format!("{}\u{2026}", first.chars().take(79).collect::<String>())
        } else {
            first.to_string()
        };

        self.bar.println(format!(
            "  {} Diagram {:>3}/{:<3}  {}  {}",
            red("✗"),
            n,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_svg_converted(&self, name: &str, status: &SvgStatus) {
        let mark = match status {
            SvgStatus::Converted | SvgStatus::Reused => green("✓"),
            SvgStatus::Failed(_) => red("✗"),
            SvgStatus::Missing => yellow("?"),
        };
        self.bar
            .println(format!("  {} SVG {}  {}", mark, name, dim(&status.to_string())));
    }

    fn on_conversion_complete(&self, _output: &Path, _bytes: u64) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert next to the source (docs/guide.docx)
  md2docx docs/guide.md

  # Choose the output path and a house style
  md2docx guide.md out/guide.docx --reference-doc template.docx

  # Render four diagrams at a time, keep the intermediate markdown
  md2docx -j 4 --keep-temp guide.md

  # What would be converted? (no tools needed)
  md2docx --inspect-only guide.md

  # Re-apply table/heading formatting to an existing document
  md2docx --restyle report.docx

  # Which external tools can be found?
  md2docx --check-tools

EXTERNAL TOOLS:
  pandoc       required          https://pandoc.org/installing.html
  mmdc         Mermaid diagrams  npm install -g @mermaid-js/mermaid-cli
  svgexport    SVG images        npm install -g svgexport

  Each is looked up on PATH, in npm's global bin directories, then via npx.

ENVIRONMENT VARIABLES:
  MD2DOCX_PANDOC      Command used for pandoc (e.g. "/opt/pandoc/bin/pandoc")
  MD2DOCX_MMDC        Command used for mermaid-cli (e.g. "npx -y @mermaid-js/mermaid-cli")
  MD2DOCX_SVGEXPORT   Command used for svgexport
  RUST_LOG            Log filter, overrides -v / -q
"#;

/// Convert Markdown with Mermaid diagrams and SVG images to Word.
#[derive(Parser, Debug)]
#[command(
    name = "md2docx",
    version,
    about = "Convert Markdown with Mermaid diagrams and SVG images to Word",
    long_about = "Convert a Markdown file into a print-ready .docx. Mermaid blocks are rendered \
to PNG with mermaid-cli, referenced SVGs are rasterised with svgexport, pandoc builds the \
document, and tables, headings, code blocks and images are then restyled for print.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown source (or a .docx with --restyle).
    #[arg(required_unless_present = "check_tools")]
    source: Option<PathBuf>,

    /// Output .docx (default: source with a .docx extension).
    output: Option<PathBuf>,

    /// Directory for generated images, relative to the source.
    #[arg(long, env = "MD2DOCX_IMAGES_DIR", default_value = "images")]
    images_dir: String,

    /// Page size used to fit images.
    #[arg(long, env = "MD2DOCX_PAPER", value_enum, default_value = "letter")]
    paper: PaperArg,

    /// Leave tables as pandoc wrote them.
    #[arg(long, env = "MD2DOCX_NO_FORMAT_TABLES")]
    no_format_tables: bool,

    /// Skip all post-processing of the generated document.
    #[arg(long, env = "MD2DOCX_NO_FORMAT")]
    no_format: bool,

    /// Keep the intermediate markdown next to the source.
    #[arg(long, env = "MD2DOCX_KEEP_TEMP")]
    keep_temp: bool,

    /// Style template passed to pandoc as --reference-doc.
    #[arg(long, env = "MD2DOCX_REFERENCE_DOC")]
    reference_doc: Option<PathBuf>,

    /// Number of diagrams rendered concurrently.
    #[arg(short = 'j', long, env = "MD2DOCX_JOBS", default_value_t = 1,
          value_parser = clap::value_parser!(u16).range(1..=64))]
    jobs: u16,

    /// Timeout for each external tool run, in seconds.
    #[arg(long, env = "MD2DOCX_TOOL_TIMEOUT", default_value_t = 120)]
    tool_timeout: u64,

    /// pandoc command line (overrides discovery).
    #[arg(long)]
    pandoc: Option<String>,

    /// mermaid-cli command line (overrides discovery).
    #[arg(long)]
    mmdc: Option<String>,

    /// svgexport command line (overrides discovery).
    #[arg(long)]
    svgexport: Option<String>,

    /// Summarise the source without converting.
    #[arg(long, conflicts_with = "restyle")]
    inspect_only: bool,

    /// Apply only the document formatting to an existing .docx, in place.
    #[arg(long)]
    restyle: bool,

    /// Report which external tools are available and exit.
    #[arg(long)]
    check_tools: bool,

    /// Print results as JSON on stdout.
    #[arg(long, env = "MD2DOCX_JSON")]
    json: bool,

    /// Disable the progress display.
    #[arg(long, env = "MD2DOCX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MD2DOCX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MD2DOCX_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum PaperArg {
    Letter,
    A4,
}

impl From<PaperArg> for PageLayout {
    fn from(v: PaperArg) -> Self {
        match v {
            PaperArg::Letter => PageLayout::LETTER,
            PaperArg::A4 => PageLayout::A4,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would fight with the progress bar for the terminal.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Tool check ───────────────────────────────────────────────────────
    if cli.check_tools {
        return check_tools(cli.json);
    }

    let source = cli
        .source
        .clone()
        .context("A source file is required")?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let summary = inspect(&source).await.context("Failed to inspect markdown")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
            );
        } else {
            println!("File:         {}", summary.path.display());
            println!("Size:         {} bytes, {} lines", summary.bytes, summary.lines);
            println!("Preprocess:   +{} lines", summary.preprocess_added_lines);
            println!("Diagrams:     {}", summary.diagrams.len());
            for d in &summary.diagrams {
                println!(
                    "  {:>3}. {:<16} {:>4} lines  fallback {}",
                    d.number,
                    d.kind.to_string(),
                    d.lines,
                    d.fallback_size
                );
            }
            println!("SVG images:   {}", summary.svg_references.len());
            for s in &summary.svg_references {
                let mark = if s.exists { green("✓") } else { red("✗ missing") };
                println!("  {} {}", s.path, mark);
            }
        }
        return Ok(());
    }

    let progress_cb: Option<ProgressCallback> = if show_progress && !cli.restyle {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Restyle mode ─────────────────────────────────────────────────────
    if cli.restyle {
        let report = restyle(&source, &config)
            .await
            .context("Restyling failed")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialise report")?
            );
        } else if !cli.quiet {
            eprintln!(
                "{}  {} tables, {} headings, {} code blocks, {} images  →  {}",
                green("✔"),
                report.tables,
                report.headings,
                report.code_blocks,
                report.images_centred,
                bold(&source.display().to_string()),
            );
        }
        return Ok(());
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| source.with_extension("docx"));
    let output = convert_to_file(&source, &output_path, &config)
        .await
        .context("Conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&output);
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .images_dir(cli.images_dir.clone())
        .layout(cli.paper.clone().into())
        .format(!cli.no_format)
        .format_tables(!cli.no_format_tables)
        .keep_temp(cli.keep_temp)
        .concurrency(cli.jobs as usize)
        .tool_timeout_secs(cli.tool_timeout);

    if let Some(ref path) = cli.reference_doc {
        builder = builder.reference_doc(path.clone());
    }
    if let Some(cmd) = parse_command("--pandoc", cli.pandoc.as_deref())? {
        builder = builder.pandoc(cmd);
    }
    if let Some(cmd) = parse_command("--mmdc", cli.mmdc.as_deref())? {
        builder = builder.mermaid(cmd);
    }
    if let Some(cmd) = parse_command("--svgexport", cli.svgexport.as_deref())? {
        builder = builder.svgexport(cmd);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse a `--pandoc`-style command line such as `npx -y svgexport`.
fn parse_command(flag: &str, value: Option<&str>) -> Result<Option<ToolCommand>> {
    match value {
        None => Ok(None),
        Some(line) => ToolCommand::parse(line)
            .map(Some)
            .with_context(|| format!("{flag}: not a usable command line: {line:?}")),
    }
}

fn print_summary(output: &ConversionOutput) {
    let stats = &output.stats;
    let clean = stats.failed_diagrams == 0 && stats.svg_failed == 0 && stats.svg_missing == 0;

    eprintln!(
        "{}  {}/{} diagrams  {} SVGs  {}ms  →  {}",
        if clean { green("✔") } else { cyan("⚠") },
        stats.rendered_diagrams,
        stats.total_diagrams,
        stats.svg_converted + stats.svg_reused,
        stats.total_duration_ms,
        bold(&output.output_path.display().to_string()),
    );

    for d in output.diagrams.iter().filter(|d| !d.is_rendered()) {
        if let Some(ref e) = d.error {
            eprintln!("   {} {}", red("✗"), e);
        }
    }
    for s in &output.svg_assets {
        match s.status {
            SvgStatus::Failed(_) | SvgStatus::Missing => {
                eprintln!("   {} {}: {}", red("✗"), s.svg_path.display(), s.status)
            }
            _ => {}
        }
    }
    if let Some(ref f) = stats.formatting {
        eprintln!(
            "   {}",
            dim(&format!(
                "{} tables ({} rows), {} headings, {} code blocks, {} images centred",
                f.tables, f.table_rows, f.headings, f.code_blocks, f.images_centred
            ))
        );
    }
    if let Some(ref p) = output.temp_markdown {
        eprintln!("   {}", dim(&format!("intermediate markdown kept: {}", p.display())));
    }
}

fn check_tools(json: bool) -> Result<()> {
    let report = tool_locate::availability_report();

    if json {
        let entries: Vec<serde_json::Value> = report
            .iter()
            .map(|(tool, res)| match res {
                Ok(found) => serde_json::json!({
                    "tool": tool.to_string(),
                    "available": true,
                    "command": found.command.to_string(),
                    "resolution": found.resolution.to_string(),
                }),
                Err(e) => serde_json::json!({
                    "tool": tool.to_string(),
                    "available": false,
                    "error": e.to_string(),
                }),
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&entries).context("Failed to serialise report")?
        );
    } else {
        for (tool, res) in &report {
            match res {
                Ok(found) => println!(
                    "{} {:<12} {}  {}",
                    green("✓"),
                    tool.to_string(),
                    found.command,
                    dim(&format!("({})", found.resolution))
                ),
                Err(e) => println!("{} {:<12} {}", red("✗"), tool.to_string(), e),
            }
        }
    }

    let pandoc_missing = report
        .iter()
        .any(|(tool, res)| *tool == md2docx::ExternalTool::Pandoc && res.is_err());
    if pandoc_missing {
        anyhow::bail!("pandoc is required but was not found");
    }
    Ok(())
}
