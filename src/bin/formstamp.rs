//! CLI binary for formstamp.
//!
//! A thin shim over the library crate: flags map to `StampConfig`, inputs map
//! to a `DocumentSource`, and every capture flag becomes one confirmed field.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use formstamp::capture::StrokeSet;
use formstamp::config::{DEFAULT_ZOOM, FOLDER_ENV};
use formstamp::pipeline::encode;
use formstamp::{
    engine, save_atomic, BundledFile, CaptureSurface, CapturedSignature, DocumentSource, DriveClient,
    DriveFile, FieldRegistry, FormSession, SourceSpec, StampConfig, UploadedBytes,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Show page sizes and where each field lands at 2x zoom
  formstamp inspect form.pdf

  # Replay stroke files into two fields and write previews
  formstamp preview form.pdf --strokes sign=sign.json --strokes name=name.json --out-dir preview/

  # Stamp a PNG signature and keep a local copy
  formstamp stamp form.pdf --capture sign=signature.png -o signed.pdf

  # Fetch from Drive, stamp, and upload into a folder
  formstamp stamp drive:1AbCdEf --capture sign=signature.png --upload --folder-id 0BxYz

  # Read the form from stdin
  cat form.pdf | formstamp stamp - --capture sign=signature.png -o signed.pdf

INPUT:
  path             a local PDF (default: form.pdf)
  -                read the PDF from standard input
  drive:<FILE_ID>  download from Google Drive

STROKE FILES:
  JSON list of strokes, each a list of [x, y] points in surface pixels:
  [[[10,60],[80,40],[200,45]], [[30,20],[30,70]]]

ENVIRONMENT VARIABLES:
  GOOGLE_CREDENTIALS_JSON  Service-account key file contents (Drive access)
  DRIVE_FOLDER_ID          Default upload folder (id or folders/ URL)
  PDFIUM_LIB_PATH          Path to libpdfium (file or directory)
  PDFIUM_AUTO_CACHE_DIR    Where the downloaded pdfium library is cached
  RUST_LOG                 Override log filter
"#;

/// Stamp handwritten signatures into fixed fields of a PDF form.
#[derive(Parser, Debug)]
#[command(
    name = "formstamp",
    version,
    about = "Stamp handwritten signatures into fixed fields of a PDF form",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON file with the field table (default: built-in form).
    #[arg(long, global = true, env = "FORMSTAMP_FIELDS")]
    fields: Option<PathBuf>,

    /// Render zoom (1.0–3.0).
    #[arg(long, global = true, env = "FORMSTAMP_ZOOM", default_value_t = DEFAULT_ZOOM)]
    zoom: f32,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "FORMSTAMP_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "FORMSTAMP_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print page geometry and field placement.
    Inspect {
        /// PDF path, `-` for stdin, or `drive:<FILE_ID>` (default: form.pdf).
        input: Option<String>,

        /// Output JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Write composited page previews as PNG files.
    Preview {
        input: Option<String>,

        #[command(flatten)]
        captures: CaptureArgs,

        /// Directory for `page-N.png` files.
        #[arg(long, default_value = "preview")]
        out_dir: PathBuf,

        /// Also write `index.html` with every page inlined as a data URI.
        #[arg(long)]
        html: bool,
    },

    /// Embed captures into the document, then save and/or upload it.
    Stamp {
        input: Option<String>,

        #[command(flatten)]
        captures: CaptureArgs,

        /// Write the stamped PDF here.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Upload the stamped PDF to Google Drive.
        #[arg(long)]
        upload: bool,

        /// Drive folder for the upload.
        #[arg(long, env = FOLDER_ENV)]
        folder_id: Option<String>,

        /// Remote filename (default: form_stamped.pdf).
        #[arg(long)]
        filename: Option<String>,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct CaptureArgs {
    /// `KEY=FILE.png`: use a PNG drawing for field KEY. Repeatable.
    #[arg(long = "capture", value_name = "KEY=PNG")]
    capture: Vec<String>,

    /// `KEY=FILE.json`: replay strokes onto field KEY's surface. Repeatable.
    #[arg(long = "strokes", value_name = "KEY=JSON")]
    strokes: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    ensure_pdfium(cli.quiet);

    let config = StampConfig::builder()
        .zoom(cli.zoom)
        .build()
        .context("Invalid configuration")?;
    let registry = match cli.fields {
        Some(ref path) => FieldRegistry::from_path(path)
            .with_context(|| format!("Failed to load field table from {}", path.display()))?,
        None => FieldRegistry::default_form(),
    };
    let mut session = FormSession::new(Arc::new(registry), config);

    match cli.command {
        Command::Inspect { ref input, json } => {
            load(&mut session, input.as_deref(), cli.quiet).await?;
            print_inspect(&session, json)?;
        }
        Command::Preview {
            ref input,
            ref captures,
            ref out_dir,
            html,
        } => {
            load(&mut session, input.as_deref(), cli.quiet).await?;
            apply_captures(&mut session, captures)?;
            let images = session.preview().context("Preview failed")?;
            let mut index = String::from("<!doctype html>\n<html><body style=\"background:#888\">\n");
            for (page, img) in session.pages().iter().zip(&images) {
                let png = encode::encode_png(img).context("Failed to encode preview")?;
                let path = out_dir.join(format!("page-{}.png", page.page));
                save_atomic(&path, &png)?;
                if html {
                    index.push_str(&format!(
                        "<p><img alt=\"page {}\" width=\"{}\" src=\"{}\"></p>\n",
                        page.page,
                        page.w_pt.round(),
                        encode::png_data_uri(&png)
                    ));
                }
                if !cli.quiet {
                    eprintln!("{} {}", green("✓"), path.display());
                }
            }
            if html {
                index.push_str("</body></html>\n");
                let path = out_dir.join("index.html");
                save_atomic(&path, index.as_bytes())?;
                if !cli.quiet {
                    eprintln!("{} {}", green("✓"), path.display());
                }
            }
        }
        Command::Stamp {
            ref input,
            ref captures,
            ref output,
            upload,
            ref folder_id,
            ref filename,
            json,
        } => {
            load(&mut session, input.as_deref(), cli.quiet).await?;
            apply_captures(&mut session, captures)?;
            run_stamp(
                &session,
                output.as_deref(),
                upload,
                folder_id.as_deref(),
                filename.as_deref(),
                json,
                cli.quiet,
            )
            .await?;
        }
    }

    Ok(())
}

/// Download pdfium into the pdfium-auto cache on first run, with a progress
/// bar. A failed download is not fatal: binding still tries the system
/// library and reports its own error if that is missing too.
fn ensure_pdfium(quiet: bool) {
    let local = pdfium_render::prelude::Pdfium::pdfium_platform_library_name_at_path("./");
    if std::env::var_os(engine::PDFIUM_LIB_PATH_ENV).is_some()
        || local.exists()
        || pdfium_auto::is_pdfium_cached()
    {
        return;
    }

    let result = if quiet {
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
    } else {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {bytes}/{total_bytes}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        bar.set_prefix("PDF engine");
        bar.enable_steady_tick(Duration::from_millis(80));
        let progress = bar.clone();
        let result = tokio::task::block_in_place(|| {
            pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
                if let Some(t) = total {
                    if progress.length().unwrap_or(0) != t {
                        progress.set_length(t);
                    }
                }
                progress.set_position(downloaded);
            }))
        });
        bar.finish_and_clear();
        result
    };

    if let Err(e) = result {
        tracing::warn!("pdfium download failed: {e}");
    }
}

/// Resolve `input` to a source and load it into the session. No input means
/// the bundled document.
async fn load(session: &mut FormSession, input: Option<&str>, quiet: bool) -> Result<()> {
    let spec = match input {
        Some(input) => SourceSpec::parse(input)?,
        None => SourceSpec::Bundled(session.config().bundled_path.clone()),
    };
    let source: Box<dyn DocumentSource> = match spec {
        SourceSpec::Bundled(path) => Box::new(BundledFile::new(path)),
        SourceSpec::Stdin => Box::new(
            UploadedBytes::read_from("stdin", tokio::io::stdin())
                .await
                .context("Failed to read PDF from stdin")?,
        ),
        SourceSpec::Drive(id) => {
            let client = DriveClient::from_config(session.config())
                .context("Drive access is not configured")?;
            Box::new(DriveFile::new(id, client))
        }
    };
    let label = source.describe();
    with_spinner(quiet, format!("Loading {label}…"), session.load(source.as_ref()))
        .await
        .with_context(|| format!("Failed to load {label}"))?;
    Ok(())
}

/// Confirm every `--capture` and `--strokes` argument in order.
fn apply_captures(session: &mut FormSession, args: &CaptureArgs) -> Result<()> {
    for arg in &args.capture {
        let (key, path) = split_key_value(arg)?;
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read {path}"))?;
        let signature = CapturedSignature::from_png(bytes)
            .with_context(|| format!("{path} is not a readable image"))?;
        session
            .confirm(key, signature)
            .with_context(|| format!("Cannot apply {path} to '{key}'"))?;
    }
    for arg in &args.strokes {
        let (key, path) = split_key_value(arg)?;
        let json = std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
        let strokes = StrokeSet::from_json(&json)
            .with_context(|| format!("{path} is not a valid stroke list"))?;
        let blank = session.surface_for(key)?;
        let surface = CaptureSurface::from_strokes(
            blank.width(),
            blank.height(),
            session.config().stroke_width,
            &strokes,
        );
        session
            .confirm_surface(key, &surface)
            .with_context(|| format!("Cannot apply {path} to '{key}'"))?;
    }
    Ok(())
}

fn split_key_value(arg: &str) -> Result<(&str, &str)> {
    match arg.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() && !v.trim().is_empty() => Ok((k.trim(), v.trim())),
        _ => bail!("Expected KEY=FILE, got '{arg}'"),
    }
}

async fn run_stamp(
    session: &FormSession,
    output: Option<&Path>,
    upload: bool,
    folder_id: Option<&str>,
    filename: Option<&str>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    // Without an upload there must be somewhere for the result to go.
    let output = match output {
        Some(p) => Some(p.to_path_buf()),
        None if !upload => Some(PathBuf::from(&session.config().output_filename)),
        None => None,
    };

    let (document, receipt) = if upload {
        let client = DriveClient::from_config(session.config())
            .context("Drive access is not configured")?;
        // A requested local copy is written before the upload starts.
        let outcome = match output {
            Some(ref path) => {
                with_spinner(
                    quiet,
                    "Stamping, saving and uploading…".to_string(),
                    session.finalize_with_copy(&client, filename, folder_id, path),
                )
                .await
            }
            None => {
                with_spinner(
                    quiet,
                    "Stamping and uploading…".to_string(),
                    session.finalize(&client, filename, folder_id),
                )
                .await
            }
        }
        .context("Upload failed")?;
        (outcome.document, Some(outcome.receipt))
    } else {
        let document = session.stamp().await.context("Stamping failed")?;
        if let Some(ref path) = output {
            save_atomic(path, &document.bytes)?;
        }
        (document, None)
    };

    if json {
        let value = serde_json::json!({
            "stamped_keys": document.stamped_keys,
            "bytes": document.bytes.len(),
            "output": output.as_ref().map(|p| p.display().to_string()),
            "upload": receipt,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&value).context("Failed to serialise result")?
        );
    } else if !quiet {
        eprintln!(
            "{} stamped {} field(s): {}",
            green("✔"),
            bold(&document.stamped_keys.len().to_string()),
            document.stamped_keys.join(", ")
        );
        if let Some(ref path) = output {
            eprintln!("   {}", bold(&path.display().to_string()));
        }
        if let Some(ref r) = receipt {
            eprintln!("   Drive file {} ({})", bold(&r.id), r.name);
            if let Some(ref link) = r.web_view_link {
                eprintln!("   {}", dim(link));
            }
        }
    }
    Ok(())
}

fn print_inspect(session: &FormSession, json: bool) -> Result<()> {
    let config = session.config();
    if json {
        let pages: Vec<_> = session.pages().iter().map(|p| p.info()).collect();
        let fields: Vec<_> = session
            .registry()
            .iter()
            .map(|f| {
                let rect = session.page(f.page).map(|p| p.field_rect(f));
                let surface = session.surface_for(&f.key).ok().map(|s| (s.width(), s.height()));
                serde_json::json!({
                    "field": f,
                    "pixel_rect": rect,
                    "surface": surface,
                })
            })
            .collect();
        let value = serde_json::json!({ "pages": pages, "fields": fields });
        println!(
            "{}",
            serde_json::to_string_pretty(&value).context("Failed to serialise metadata")?
        );
        return Ok(());
    }

    println!("Zoom:   {}", config.zoom);
    println!("Pages:  {}", session.pages().len());
    for p in session.pages() {
        println!(
            "  page {:>3}  {:>7.1} × {:<7.1} pt  →  {} × {} px",
            p.page,
            p.w_pt,
            p.h_pt,
            p.img_w(),
            p.img_h()
        );
    }
    println!("Fields: {}", session.registry().len());
    for f in session.registry().iter() {
        let placement = match session.page(f.page) {
            Some(p) => {
                let r = p.field_rect(f);
                format!("({}, {}) {}×{} px", r.x, r.y, r.width, r.height)
            }
            None => "page not in document".to_string(),
        };
        let surface = session
            .surface_for(&f.key)
            .map(|s| format!("{}×{}", s.width(), s.height()))
            .unwrap_or_default();
        println!(
            "  {:<10} p{:<3} {:<28} surface {:<9} {}",
            f.key,
            f.page,
            placement,
            surface,
            dim(&f.label)
        );
    }
    Ok(())
}

/// Run `fut` behind an indicatif spinner unless output is suppressed.
async fn with_spinner<T, F>(quiet: bool, message: String, fut: F) -> T
where
    F: Future<Output = T>,
{
    if quiet {
        return fut.await;
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(80));
    let out = fut.await;
    bar.finish_and_clear();
    out
}
