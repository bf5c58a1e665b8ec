//! CLI binary for appropriation-extract.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, writes the workbook and prints a preview.

use anyhow::{Context, Result};
use appropriation_extract::config::{DEFAULT_PROVIDER, DEFAULT_SHEET_NAME};
use appropriation_extract::{
    extract_files, load_credentials, write_xlsx, BatchOutput, Column, ExtractError,
    ExtractionConfig, ExtractionProgressCallback, FileError, LlmExtractionClient, PdfPageMode,
    ProgressCallback, ResultTable, DEFAULT_OUTPUT_FILENAME,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Renders one bar for the batch plus a log line per sheet.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} sheets  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        self.bar.set_length(total_files as u64);
        self.bar.reset_eta();
    }

    fn on_file_start(&self, _index: usize, _total: usize, file: &str) {
        self.bar.set_message(file.to_string());
    }

    fn on_document_complete(&self, label: &str) {
        self.bar.println(format!("  {} {}", green("✓"), label));
    }

    fn on_document_error(&self, label: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        // FileError's Display already leads with the label
        let msg = error
            .strip_prefix(label)
            .map(|s| s.trim_start_matches(':').trim())
            .unwrap_or(error);
        let msg = if msg.chars().count() > 80 {
            format!("{}\u{2026}", msg.chars().take(79).collect::<String>())
        } else {
            msg.to_string()
        };
        self.bar
            .println(format!("  {} {}  {}", red("✗"), label, red(&msg)));
    }

    fn on_file_complete(&self, completed: usize, _total: usize, _file: &str) {
        self.bar.set_position(completed as u64);
    }

    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = total_documents.saturating_sub(success_count);
        if failed == 0 {
            eprintln!(
                "{} {} sheets extracted",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} sheets extracted  ({} failed)",
                if success_count == 0 {
                    red("✘")
                } else {
                    yellow("⚠")
                },
                bold(&success_count.to_string()),
                total_documents,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Photos of sheets to a workbook in the current directory
  sheet2xlsx ficha_01.jpg ficha_02.jpg

  # Choose the output file
  sheet2xlsx scans/*.jpg -o obra_marco.xlsx

  # A PDF with one sheet per page
  sheet2xlsx --pdf-pages each lote.pdf

  # Another provider
  sheet2xlsx --provider openai --model gpt-4.1 ficha.png

  # Print the rows as JSON as well
  sheet2xlsx --json --no-progress ficha.jpg > rows.json

COLUMNS (in order):
  DATE, SERVICE_FRONT, DIRECTION, STATION, MATERIAL, UNIT, QUANTITY,
  SERVICE, START_STATION, END_STATION, LENGTH_M, WIDTH_M, HEIGHT_M, NOTES

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (GOOGLE_API_KEY also accepted)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  MISTRAL_API_KEY         Mistral API key
  PDFIUM_LIB_PATH         Directory containing libpdfium (PDF inputs only)
  RUST_LOG                Log filter, e.g. appropriation_extract=debug

  Keys may also be placed in a .env file in the working directory.
"#;

/// Extract handwritten appropriation sheets into a spreadsheet.
#[derive(Parser, Debug)]
#[command(
    name = "sheet2xlsx",
    version,
    about = "Extract handwritten appropriation sheets into an XLSX spreadsheet using a vision LLM",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Sheet images (PNG/JPEG) or PDFs: local paths or HTTP/HTTPS URLs.
    inputs: Vec<String>,

    /// Workbook to write.
    #[arg(short, long, env = "SHEET2XLSX_OUTPUT", default_value = DEFAULT_OUTPUT_FILENAME)]
    output: PathBuf,

    /// LLM provider: gemini, openai, anthropic, mistral, azure, openrouter, ollama, lmstudio.
    #[arg(long, env = "SHEET2XLSX_PROVIDER", default_value = DEFAULT_PROVIDER)]
    provider: String,

    /// Vision model ID. Defaults to the provider's default vision model.
    #[arg(long, env = "SHEET2XLSX_MODEL")]
    model: Option<String>,

    /// Which PDF pages to read: first (one sheet per file) or each.
    #[arg(long, env = "SHEET2XLSX_PDF_PAGES", value_enum, default_value = "first")]
    pdf_pages: PdfPagesArg,

    /// Worksheet name in the output workbook.
    #[arg(long, env = "SHEET2XLSX_SHEET_NAME", default_value = DEFAULT_SHEET_NAME)]
    sheet_name: String,

    /// Path to a text file replacing the built-in extraction instruction.
    #[arg(long, env = "SHEET2XLSX_INSTRUCTION")]
    instruction: Option<PathBuf>,

    /// Max LLM output tokens per sheet.
    #[arg(long, env = "SHEET2XLSX_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "SHEET2XLSX_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Longest image edge sent to the model, in pixels.
    #[arg(long, env = "SHEET2XLSX_MAX_IMAGE_PIXELS", default_value_t = 2000,
          value_parser = clap::value_parser!(u32).range(100..=8000))]
    max_image_pixels: u32,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, env = "SHEET2XLSX_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print the extracted rows as JSON on stdout.
    #[arg(long, env = "SHEET2XLSX_JSON")]
    json: bool,

    /// Do not print the table preview.
    #[arg(long, env = "SHEET2XLSX_NO_PREVIEW")]
    no_preview: bool,

    /// Disable progress bar.
    #[arg(long, env = "SHEET2XLSX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SHEET2XLSX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SHEET2XLSX_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PdfPagesArg {
    First,
    Each,
}

impl From<PdfPagesArg> for PdfPageMode {
    fn from(v: PdfPagesArg) -> Self {
        match v {
            PdfPagesArg::First => PdfPageMode::FirstPage,
            PdfPagesArg::Each => PdfPageMode::EachPage,
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the per-sheet feedback, so library INFO logs
    // are muted while it is shown.
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

    if cli.inputs.is_empty() {
        eprintln!(
            "{} {}",
            yellow("⚠"),
            ExtractError::EmptyInput
        );
        return Ok(ExitCode::SUCCESS);
    }

    // ── Credentials & client ─────────────────────────────────────────────
    // Loaded before the runtime starts: the key may be exported to the
    // process environment for the provider factory.
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let credentials = load_credentials(&config.provider_name)?;
    // still single-threaded: the runtime is built below
    credentials.export_to_env();
    let client = LlmExtractionClient::from_credentials(&credentials, &config)?;

    // ── Run batch ────────────────────────────────────────────────────────
    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    let result = runtime.block_on(async {
        let output = extract_files(&cli.inputs, &client, &config).await?;
        write_xlsx(&output.table, &cli.output, &config.sheet_name).await?;
        Ok::<BatchOutput, ExtractError>(output)
    });

    let output = match result {
        Ok(output) => output,
        Err(ExtractError::NoRecords { failures, .. }) => {
            report_failures(&failures);
            eprintln!(
                "{} No data extracted; {} was not written.",
                red("✘"),
                cli.output.display()
            );
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e).context("Extraction failed"),
    };

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        let json = serde_json::to_string_pretty(&output.table.to_json())
            .context("Failed to serialise rows")?;
        println!("{json}");
    } else if !cli.quiet && !cli.no_preview {
        print_preview(&output.table);
    }

    if !cli.quiet {
        report_failures(&output.failures);
        eprintln!(
            "{}  {}/{} sheets  {}ms  →  {}",
            if output.has_failures() {
                yellow("⚠")
            } else {
                green("✔")
            },
            output.stats.succeeded,
            output.stats.documents,
            output.stats.total_duration_ms,
            bold(&cli.output.display().to_string()),
        );
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&output.stats.total_input_tokens.to_string()),
            dim(&output.stats.total_output_tokens.to_string()),
        );
    }

    Ok(ExitCode::SUCCESS)
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .provider_name(cli.provider.as_str())
        .pdf_pages(cli.pdf_pages.into())
        .sheet_name(cli.sheet_name.as_str())
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_image_pixels(cli.max_image_pixels)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.as_str());
    }
    if let Some(ref path) = cli.instruction {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read instruction from {:?}", path))?;
        builder = builder.instruction(text);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn report_failures(failures: &[FileError]) {
    if failures.is_empty() {
        return;
    }
    eprintln!("{}", bold("Skipped sheets:"));
    for f in failures {
        eprintln!("  {} {}", red("✗"), f);
    }
}

/// Print the table as aligned text: one column per field, width capped.
fn print_preview(table: &ResultTable) {
    const MAX_WIDTH: usize = 18;

    let cell = |s: &str| -> String {
        if s.chars().count() > MAX_WIDTH {
            format!("{}\u{2026}", s.chars().take(MAX_WIDTH - 1).collect::<String>())
        } else {
            s.to_string()
        }
    };

    let rows: Vec<Vec<String>> = table
        .rows()
        .iter()
        .map(|r| r.values().iter().map(|v| cell(&v.to_string())).collect())
        .collect();
    let widths: Vec<usize> = Column::ALL
        .iter()
        .enumerate()
        .map(|(i, c)| {
            rows.iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(cell(c.name()).chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |cells: Vec<String>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<w$}", c, w = *w))
            .collect::<Vec<_>>()
            .join(" │ ")
    };

    println!(
        "{}",
        bold(&line(Column::ALL.iter().map(|c| cell(c.name())).collect()))
    );
    for row in rows {
        println!("{}", line(row));
    }
}
