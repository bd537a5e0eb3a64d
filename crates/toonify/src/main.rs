//! toonify: turn a photograph into a comic, anime, or pencil-sketch image.
//!
//! Reads one image file, runs the cartoonify pipeline with the given
//! parameters, and writes the result under a generated name (or an
//! explicit path). Optionally prints per-stage diagnostics and dumps the
//! intermediate images.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin toonify -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use toonify_export::OutputFormat;
use toonify_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use toonify_pipeline::params::{
    KEY_BOLD_EDGES, KEY_COLOR_SIMPLIFICATION, KEY_EDGE_STRENGTH, KEY_LINE_THICKNESS, KEY_SATURATION,
    KEY_SEED, KEY_SMOOTHING_LEVEL, KEY_STYLE,
};
use toonify_pipeline::{StagedResult, StyleParameters};
use tracing_subscriber::EnvFilter;

/// Cartoonify a photograph.
///
/// Numeric parameters are taken as given and clamped into range; values
/// that do not parse fall back to their defaults.
#[derive(Parser)]
#[command(name = "toonify", version, allow_negative_numbers = true)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Edge strength, 1-100.
    #[arg(long)]
    edge_strength: Option<String>,

    /// Palette size for k-means, 2-32.
    #[arg(long)]
    color_simplification: Option<String>,

    /// Smoothing level, 1-20.
    #[arg(long)]
    smoothing_level: Option<String>,

    /// Style: comic, anime, or pencil. Anything else renders as comic.
    #[arg(long)]
    style: Option<String>,

    /// Line thickness for bold edges, 1-10.
    #[arg(long)]
    line_thickness: Option<String>,

    /// Saturation boost in percent, 50-150.
    #[arg(long)]
    saturation: Option<String>,

    /// Thicken comic edges (true/false).
    #[arg(long)]
    bold_edges: Option<String>,

    /// Quantizer seed. Omit for a fresh seed per run.
    #[arg(long)]
    seed: Option<String>,

    /// Full style parameters as a JSON string.
    ///
    /// When provided, all other style flags are ignored. Missing fields
    /// take their defaults and out-of-range values are clamped.
    #[arg(long)]
    config_json: Option<String>,

    /// Write the result to this file instead of a generated name.
    #[arg(short, long, conflicts_with = "output_dir")]
    output: Option<PathBuf>,

    /// Directory for generated output names.
    #[arg(long, default_value = "static")]
    output_dir: PathBuf,

    /// Output encoding. Defaults to the `--output` extension, else PNG.
    #[arg(long, value_enum)]
    format: Option<Format>,

    /// JPEG quality (ignored for PNG).
    #[arg(long, default_value_t = OutputFormat::DEFAULT_JPEG_QUALITY, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Also write grayscale, edge mask, and quantized intermediates here.
    #[arg(long)]
    stages_dir: Option<PathBuf>,

    /// Print a human-readable per-stage report.
    #[arg(long)]
    report: bool,

    /// Print diagnostics as JSON.
    #[arg(long, conflicts_with = "report")]
    json: bool,

    /// Debug-level logging (overridden by `RUST_LOG`).
    #[arg(short, long)]
    verbose: bool,
}

/// Output encoding selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Lossless PNG.
    Png,
    /// Baseline JPEG.
    Jpeg,
}

impl Format {
    const fn with_quality(self, quality: u8) -> OutputFormat {
        match self {
            Self::Png => OutputFormat::Png,
            Self::Jpeg => OutputFormat::Jpeg { quality },
        }
    }

    const fn of(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Png => Self::Png,
            OutputFormat::Jpeg { .. } => Self::Jpeg,
        }
    }
}

/// Pick the output encoding from `--format` and the `--output` extension.
///
/// An explicit `--format` must agree with a recognized extension. An
/// output path with an unrecognized extension needs an explicit
/// `--format`. Generated names always carry the matching extension.
fn output_format(cli: &Cli) -> Result<OutputFormat, String> {
    let extension = cli
        .output
        .as_deref()
        .and_then(Path::extension)
        .map(|ext| ext.to_string_lossy().into_owned());
    let implied = extension.as_deref().map(OutputFormat::from_extension);

    match (cli.format, implied) {
        (Some(explicit), Some(Some(by_extension))) if Format::of(by_extension) != explicit => {
            Err(format!(
                "--format {} does not match output extension .{}",
                explicit.with_quality(cli.quality).extension(),
                extension.unwrap_or_default(),
            ))
        }
        (Some(explicit), _) => Ok(explicit.with_quality(cli.quality)),
        (None, Some(Some(by_extension))) => Ok(Format::of(by_extension).with_quality(cli.quality)),
        (None, Some(None)) => Err(format!(
            "cannot infer an image format from output extension .{}; pass --format",
            extension.unwrap_or_default(),
        )),
        (None, None) => Ok(OutputFormat::Png),
    }
}

/// Collect the style flags that were given as raw key/value pairs.
fn raw_pairs(cli: &Cli) -> Vec<(&'static str, &str)> {
    [
        (KEY_EDGE_STRENGTH, &cli.edge_strength),
        (KEY_COLOR_SIMPLIFICATION, &cli.color_simplification),
        (KEY_SMOOTHING_LEVEL, &cli.smoothing_level),
        (KEY_STYLE, &cli.style),
        (KEY_LINE_THICKNESS, &cli.line_thickness),
        (KEY_SATURATION, &cli.saturation),
        (KEY_BOLD_EDGES, &cli.bold_edges),
        (KEY_SEED, &cli.seed),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.as_deref().map(|v| (key, v)))
    .collect()
}

/// Build [`StyleParameters`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual style flags are ignored.
fn params_from_cli(cli: &Cli) -> Result<StyleParameters, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str::<StyleParameters>(json)
            .map(|p| p.normalized())
            .map_err(|e| format!("Error parsing --config-json: {e}"));
    }
    Ok(StyleParameters::from_raw(raw_pairs(cli)))
}

/// Where the rendered image goes: the explicit `--output`, or a fresh
/// `<uuid>.<ext>` under `--output-dir`.
fn output_path(cli: &Cli, format: OutputFormat) -> PathBuf {
    cli.output.clone().unwrap_or_else(|| {
        cli.output_dir
            .join(format!("{}.{}", uuid::Uuid::new_v4(), format.extension()))
    })
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let params = match params_from_cli(&cli) {
        Ok(p) => p,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let format = match output_format(&cli) {
        Ok(f) => f,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    tracing::debug!(
        path = %cli.image_path.display(),
        bytes = image_bytes.len(),
        ?params,
        "input loaded"
    );

    let (staged, diagnostics) = match toonify_pipeline::diagnostics::process_staged_with_diagnostics(
        &image_bytes,
        &params,
        &StdClock,
    ) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Pipeline error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(msg) = print_diagnostics(&cli, &diagnostics) {
        eprintln!("{msg}");
        return ExitCode::FAILURE;
    }

    let encoded = match toonify_export::encode_rgb(&staged.output, format) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Export error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let path = output_path(&cli, format);
    if let Err(e) = write_file(&path, &encoded) {
        eprintln!("Error writing {}: {e}", path.display());
        return ExitCode::FAILURE;
    }
    eprintln!("{format} written to {} ({} bytes)", path.display(), encoded.len());

    if let Some(ref dir) = cli.stages_dir
        && let Err(msg) = write_stages(dir, &path, &staged)
    {
        eprintln!("{msg}");
        return ExitCode::FAILURE;
    }

    println!("{}", path.display());
    ExitCode::SUCCESS
}

fn print_diagnostics(cli: &Cli, diagnostics: &PipelineDiagnostics) -> Result<(), String> {
    if cli.json {
        let json = serde_json::to_string_pretty(diagnostics)
            .map_err(|e| format!("Error serializing diagnostics: {e}"))?;
        eprintln!("{json}");
    } else if cli.report {
        eprintln!("{}", diagnostics.report());
    }
    Ok(())
}

/// Write `bytes` to `path`, creating parent directories as needed.
///
/// The whole encoding is in memory before this runs, so a failed pipeline
/// never leaves a file behind.
fn write_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)
}

/// Dump the intermediates as PNGs named after the output file.
fn write_stages(dir: &Path, output: &Path, staged: &StagedResult) -> Result<(), String> {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("toonify");

    let mut files = vec![(
        "grayscale",
        toonify_export::encode_gray(&staged.grayscale, OutputFormat::Png),
    )];
    if let Some(ref edges) = staged.edges {
        files.push(("edges", toonify_export::encode_gray(edges, OutputFormat::Png)));
    }
    if let Some(ref quantized) = staged.quantized {
        files.push((
            "quantized",
            toonify_export::encode_rgb(quantized, OutputFormat::Png),
        ));
    }

    for (name, encoded) in files {
        let bytes = encoded.map_err(|e| format!("Export error ({name}): {e}"))?;
        let path = dir.join(format!("{stem}-{name}.png"));
        write_file(&path, &bytes).map_err(|e| format!("Error writing {}: {e}", path.display()))?;
        eprintln!("Stage {name} written to {}", path.display());
    }
    Ok(())
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}
