//! CLI binary for edgequake-ocrpdf.
//!
//! A thin shim over the library crate that maps CLI flags to `OcrConfig`,
//! writes the searchable PDFs and prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_ocrpdf::{
    check_tools, resolve_input, write_outputs, BatchPipeline, BatchProgressCallback, BatchResult,
    OcrConfig, ProgressCallback, RasterBackend,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
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
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar across the batch plus a log line per
/// document.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-document wall-clock start times, keyed by upload name.
    start_times: Mutex<HashMap<String, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("OCR");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn elapsed(&self, name: &str) -> String {
        let ms = self
            .start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(name))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        dim(&format!("{:.1}s", ms as f64 / 1000.0))
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total} documents…"))
        ));
    }

    fn on_document_start(&self, _index: usize, _total: usize, name: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(name.to_string(), Instant::now());
        }
        self.bar.set_message(name.to_string());
    }

    fn on_document_complete(&self, completed: usize, total: usize, name: &str, pages: usize) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            green("✓"),
            completed,
            total,
            name,
            dim(&format!("{pages} pages")),
            self.elapsed(name),
        ));
        self.bar.inc(1);
    }

    fn on_document_skipped(&self, completed: usize, total: usize, name: &str) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            dim("–"),
            completed,
            total,
            name,
            dim("already searchable, skipped"),
        ));
        self.elapsed(name);
        self.bar.inc(1);
    }

    fn on_document_error(&self, completed: usize, total: usize, name: &str, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg: String = if error.chars().count() > 100 {
            format!("{}\u{2026}", error.chars().take(99).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            red("✗"),
            completed,
            total,
            red(&msg),
            self.elapsed(name),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _total: usize, _succeeded: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # OCR a scan into ./invoice-ocr.pdf
  ocrpdf invoice.pdf

  # Several uploads; also writes All_OCR_PDFs.pdf
  ocrpdf invoice.pdf photo.jpg receipt.png -o out/

  # German + English, higher resolution, poppler rasteriser
  ocrpdf --lang deu+eng --dpi 300 --backend pdftoppm scan.pdf

  # Download and process a remote PDF
  ocrpdf https://example.com/scan.pdf

  # Machine-readable summary
  ocrpdf --json a.pdf b.pdf > summary.json

  # Check that tesseract and the rasteriser are installed
  ocrpdf --check-tools

OUTPUT:
  <name>-ocr.pdf     one per input; files whose name already ends in -ocr are skipped
  All_OCR_PDFs.pdf   every successful output merged in input order (2+ successes)

ENVIRONMENT VARIABLES:
  OCRPDF_*            every flag can be set this way, e.g. OCRPDF_LANG=fra
  PDFIUM_LIB_PATH     Path to libpdfium (file or directory)
  RUST_LOG            Override log filter (e.g. RUST_LOG=edgequake_ocrpdf=debug)

EXIT STATUS:
  0  at least one document succeeded or was skipped
  1  every document failed, an input could not be read, or a tool is missing
"#;

/// Turn scanned PDFs and images into text-searchable PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "ocrpdf",
    version,
    about = "Turn scanned PDFs and images into text-searchable PDFs",
    long_about = "Rasterise each page of a PDF (or take a PNG/JPEG as a single page), run \
Tesseract over it and write a PDF that looks exactly like the scan but has a selectable, \
searchable text layer. With several inputs, a combined All_OCR_PDFs.pdf is written too.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF/PNG/JPEG paths or HTTP/HTTPS URLs.
    #[arg(required_unless_present = "check_tools")]
    inputs: Vec<String>,

    /// Directory for the output PDFs.
    #[arg(short, long, env = "OCRPDF_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Rasterisation DPI (72–600).
    #[arg(long, env = "OCRPDF_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Tesseract language(s), e.g. eng or eng+fra.
    #[arg(short, long, env = "OCRPDF_LANG", default_value = "eng")]
    lang: String,

    /// PDF rasteriser: pdfium or pdftoppm.
    #[arg(long, env = "OCRPDF_BACKEND", default_value = "pdfium")]
    backend: RasterBackend,

    /// Tesseract executable.
    #[arg(long, env = "OCRPDF_TESSERACT", default_value = "tesseract")]
    tesseract: PathBuf,

    /// pdftoppm executable (with --backend pdftoppm).
    #[arg(long, env = "OCRPDF_PDFTOPPM", default_value = "pdftoppm")]
    pdftoppm: PathBuf,

    /// pdfium shared library, file or directory.
    #[arg(long, env = "OCRPDF_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// Per-invocation timeout for external tools, in seconds.
    #[arg(long, env = "OCRPDF_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// Documents processed at once.
    #[arg(short, long, env = "OCRPDF_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Do not write All_OCR_PDFs.pdf.
    #[arg(long, env = "OCRPDF_NO_COMBINE")]
    no_combine: bool,

    /// Largest accepted input, in MiB.
    #[arg(long, env = "OCRPDF_MAX_INPUT_MB", default_value_t = 256)]
    max_input_mb: u64,

    /// Largest accepted page count per document.
    #[arg(long, env = "OCRPDF_MAX_PAGES", default_value_t = 2000)]
    max_pages: usize,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "OCRPDF_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print a JSON summary on stdout.
    #[arg(long, env = "OCRPDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "OCRPDF_NO_PROGRESS")]
    no_progress: bool,

    /// Probe tesseract and the rasteriser, then exit.
    #[arg(long)]
    check_tools: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OCRPDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OCRPDF_QUIET")]
    quiet: bool,
}

/// `--json` output.
#[derive(Serialize)]
struct Summary<'a> {
    #[serde(flatten)]
    batch: &'a BatchResult,
    written: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.check_tools;
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Tool check mode ──────────────────────────────────────────────────
    if cli.check_tools {
        let checks = check_tools(&config).await;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&checks).context("Failed to serialise tool checks")?
            );
        } else {
            for c in &checks {
                let mark = if c.available { green("✓") } else { red("✗") };
                println!("{} {:<10} {}", mark, c.tool, c.detail);
            }
        }
        let all_ok = checks.iter().all(|c| c.available);
        return Ok(if all_ok {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    // ── Resolve inputs ───────────────────────────────────────────────────
    let mut documents = Vec::with_capacity(cli.inputs.len());
    for input in &cli.inputs {
        let doc = resolve_input(input, config.download_timeout_secs)
            .await
            .with_context(|| format!("Failed to read input '{input}'"))?;
        documents.push(doc);
    }

    // ── Run batch ────────────────────────────────────────────────────────
    let batch = BatchPipeline::new(config).run(documents).await;
    let written = write_outputs(&batch, &cli.output_dir)
        .await
        .context("Failed to write output PDFs")?;

    let stats = &batch.stats;
    if cli.json {
        let summary = Summary {
            batch: &batch,
            written,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        if !show_progress {
            for (name, err) in batch.failures() {
                eprintln!("  {} {}  {}", red("✗"), name, err);
            }
        }
        if let Some(ref e) = batch.combined_error {
            eprintln!("  {} {}  {}", red("✗"), edgequake_ocrpdf::COMBINED_FILE_NAME, e);
        }
        for path in &written {
            eprintln!("  {} {}", dim("→"), path.display());
        }
        eprintln!(
            "{}  {}/{} documents  {} pages  {}ms{}",
            if stats.failed == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            bold(&stats.succeeded.to_string()),
            stats.total_documents,
            stats.total_pages,
            stats.total_duration_ms,
            match (stats.skipped, stats.failed) {
                (0, 0) => String::new(),
                (s, f) => dim(&format!("  ({s} skipped, {f} failed)")),
            },
        );
    }

    let all_failed = stats.total_documents > 0 && stats.failed == stats.total_documents;
    Ok(if all_failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Map CLI args to `OcrConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<OcrConfig> {
    let mut builder = OcrConfig::builder()
        .dpi(cli.dpi)
        .language(cli.lang.clone())
        .raster_backend(cli.backend)
        .tesseract_path(cli.tesseract.clone())
        .pdftoppm_path(cli.pdftoppm.clone())
        .tool_timeout_secs(cli.timeout)
        .concurrency(cli.concurrency)
        .combine(!cli.no_combine)
        .max_input_bytes(cli.max_input_mb.saturating_mul(1024 * 1024))
        .max_pages(cli.max_pages)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
