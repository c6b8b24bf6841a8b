//! CLI binary for promissoria.
//!
//! A thin shim over the library crate that maps CLI flags to `BatchConfig`,
//! drives a progress bar, and writes the archive.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use promissoria::{
    preview, render_batch_to_file, BatchConfig, BatchProgressCallback, NormalizedRecord,
    ProgressCallback,
};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback. Notes finish out of order, so elapsed times
/// are tracked per index.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading spreadsheet…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>4}/{len} notes  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Rendering");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendering {total} promissory notes…"))
        ));
    }

    fn on_job_start(&self, index: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(format!("note {index}"));
    }

    fn on_job_complete(&self, index: usize, total: usize, bytes: u64) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} Note {:>4}/{:<4}  {:<10}  {}",
            green("✓"),
            index,
            total,
            dim(&format!("{:>6} KiB", bytes / 1024)),
            dim(&format!("{secs:.2}s")),
        ));
        self.bar.inc(1);
    }

    fn on_job_error(&self, index: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(index);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['…']).collect()
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Note {:>4}/{:<4}  {}  {}",
            red("✗"),
            index,
            total,
            red(&msg),
            dim(&format!("{secs:.2}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, succeeded: usize) {
        let failed = total.saturating_sub(succeeded);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} notes rendered",
                green("✔"),
                bold(&succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} notes rendered  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&succeeded.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Render every row into documentos.zip
  promissoria notas.xlsx

  # Choose the output file and background form
  promissoria notas.xlsx -o lote-marco.zip --template assets/nota-promissoria.png

  # Check how rows will be filled in, without rendering
  promissoria --preview notas.xlsx

  # Machine-readable batch statistics
  promissoria --json notas.xlsx -o lote.zip

INPUT COLUMNS (first sheet, header row, all optional):
  id  Vencimento  Valor  NomeRecebedor  CPFRecebedor  Cidade
  NomeEmitente  Emissao  CPFEmitente  Endereco

ENVIRONMENT VARIABLES:
  PROMISSORIA_TEMPLATE      Background template image
  PROMISSORIA_SCRATCH_DIR   Where per-batch scratch files are created
  PROMISSORIA_CONCURRENCY   Notes rendered at once
  PROMISSORIA_TIMEOUT       Batch deadline in seconds (0 disables)
  RUST_LOG                  Override log filtering (e.g. promissoria=debug)
"#;

/// Render promissory notes in bulk from a spreadsheet.
#[derive(Parser, Debug)]
#[command(
    name = "promissoria",
    version,
    about = "Render promissory notes in bulk from a spreadsheet into a ZIP of PDFs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Spreadsheet (xlsx, xls, xlsb, ods) with one note per row.
    input: PathBuf,

    /// Write the archive to this file.
    #[arg(short, long, env = "PROMISSORIA_OUTPUT", default_value = "documentos.zip")]
    output: PathBuf,

    /// Background template image drawn under every note.
    #[arg(long, env = "PROMISSORIA_TEMPLATE")]
    template: Option<PathBuf>,

    /// Directory for per-batch scratch storage (default: OS temp dir).
    #[arg(long, env = "PROMISSORIA_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Number of notes rendered concurrently.
    #[arg(short, long, env = "PROMISSORIA_CONCURRENCY", default_value_t = 8)]
    concurrency: usize,

    /// Batch deadline in seconds; 0 disables it.
    #[arg(long, env = "PROMISSORIA_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// Deflate level for archive entries (1–9).
    #[arg(long, env = "PROMISSORIA_COMPRESSION_LEVEL", default_value_t = 9,
          value_parser = clap::value_parser!(i64).range(1..=9))]
    compression_level: i64,

    /// Font size in points.
    #[arg(long, env = "PROMISSORIA_FONT_SIZE", default_value_t = 12.0)]
    font_size: f32,

    /// Print the normalised records and exit without rendering.
    #[arg(long, env = "PROMISSORIA_PREVIEW")]
    preview: bool,

    /// Print batch statistics (or preview records) as JSON.
    #[arg(long, env = "PROMISSORIA_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PROMISSORIA_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PROMISSORIA_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PROMISSORIA_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would interleave with the progress bar; keep only
    // errors while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.preview;
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

    // ── Preview mode ─────────────────────────────────────────────────────
    if cli.preview {
        let bytes = tokio::fs::read(&cli.input)
            .await
            .with_context(|| format!("Failed to read {}", cli.input.display()))?;
        let records = preview(&bytes).await.context("Failed to read spreadsheet")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&records).context("Failed to serialise records")?
            );
        } else {
            print_preview(&records);
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new();
        Some(cb as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Run batch ────────────────────────────────────────────────────────
    let stats = render_batch_to_file(&cli.input, &cli.output, &config)
        .await
        .context("Batch failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&stats).context("Failed to serialise stats")?
        );
    } else if !cli.quiet {
        eprintln!(
            "{}  {}/{} notes  {} KiB  {}ms  →  {}",
            if stats.failed == 0 { green("✔") } else { cyan("⚠") },
            stats.rendered,
            stats.total_records,
            stats.archive_bytes / 1024,
            stats.total_duration_ms,
            bold(&cli.output.display().to_string()),
        );
        eprintln!(
            "   {}",
            dim(&format!(
                "render {}ms  /  package {}ms",
                stats.render_duration_ms, stats.package_duration_ms
            )),
        );
    }

    Ok(())
}

/// Map CLI args to `BatchConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<BatchConfig> {
    let timeout = (cli.timeout > 0).then(|| Duration::from_secs(cli.timeout));

    let mut builder = BatchConfig::builder()
        .concurrency(cli.concurrency)
        .timeout(timeout)
        .compression_level(cli.compression_level)
        .font_size(cli.font_size)
        .archive_name(
            cli.output
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "documentos.zip".to_string()),
        );

    if let Some(ref template) = cli.template {
        builder = builder.template_path(template);
    }
    if let Some(ref dir) = cli.scratch_dir {
        builder = builder.scratch_root(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_preview(records: &[NormalizedRecord]) {
    for (i, r) in records.iter().enumerate() {
        println!("{}", bold(&format!("usuario_{}.pdf", i + 1)));
        println!("  Nº           {}", r.instrument_id);
        println!("  Vencimento   {}", r.due_date);
        println!("  Valor        R$ {}", r.amount_display);
        println!("  Extenso      {}", r.amount_in_words);
        println!("  Recebedor    {} ({})", r.payee_name, r.payee_tax_id);
        println!("  Pagável em   {}", r.payment_city);
        println!("  Emitente     {} ({})", r.issuer_name, r.issuer_tax_id);
        println!("  Emissão      {}", r.issue_date);
        println!("  Endereço     {}", r.issuer_address);
    }
}
