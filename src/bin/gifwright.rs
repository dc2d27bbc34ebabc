use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use gifwright::pipeline::{ProgressEvent, ProgressSink};

#[derive(Parser, Debug)]
#[command(name = "gifwright", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply an edit config to an existing GIF.
    Edit(EditArgs),
    /// Compose still images into a GIF.
    Compose(ComposeArgs),
}

#[derive(Parser, Debug)]
struct EditArgs {
    /// Input GIF path.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output GIF path.
    #[arg(long)]
    out: PathBuf,

    /// Edit config JSON (see EditConfig).
    #[arg(long)]
    config: PathBuf,

    /// Font file for the text overlay (required when the config sets text).
    #[arg(long)]
    font: Option<PathBuf>,

    /// Print a progress line per pipeline step.
    #[arg(long)]
    progress: bool,
}

#[derive(Parser, Debug)]
struct ComposeArgs {
    /// Input image paths, in output order.
    #[arg(long = "in", num_args = 1..)]
    in_paths: Vec<PathBuf>,

    /// Output GIF path.
    #[arg(long)]
    out: PathBuf,

    /// Per-frame delay in centiseconds.
    #[arg(long, default_value_t = 10)]
    delay_cs: u16,

    /// Optional edit config JSON; defaults to a plain 480px pipeline.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Font file for the text overlay (required when the config sets text).
    #[arg(long)]
    font: Option<PathBuf>,

    /// Print a progress line per pipeline step.
    #[arg(long)]
    progress: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Edit(args) => cmd_edit(args),
        Command::Compose(args) => cmd_compose(args),
    }
}

fn read_config_json(path: &std::path::Path) -> anyhow::Result<gifwright::EditConfig> {
    let f = std::fs::File::open(path)
        .with_context(|| format!("open edit config '{}'", path.display()))?;
    let cfg: gifwright::EditConfig =
        serde_json::from_reader(std::io::BufReader::new(f)).with_context(|| "parse edit config JSON")?;
    Ok(cfg)
}

fn make_rasterizer(
    font: Option<&PathBuf>,
) -> anyhow::Result<Option<Box<dyn gifwright::TextRasterizer>>> {
    match font {
        Some(path) => {
            let rasterizer = gifwright::CpuTextRasterizer::from_font_file(path)?;
            Ok(Some(Box::new(rasterizer)))
        }
        None => Ok(None),
    }
}

struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn emit(&mut self, event: ProgressEvent) {
        eprintln!(
            "{} {}/{}",
            event.step.as_str(),
            event.index + 1,
            event.total
        );
    }
}

fn progress_sink(enabled: bool) -> Box<dyn ProgressSink> {
    if enabled {
        Box::new(StderrProgress)
    } else {
        Box::new(gifwright::NullProgress)
    }
}

fn print_summary(summary: &gifwright::EncodeSummary) {
    eprintln!(
        "wrote {} ({}x{}, {} frames, {} bytes, {:.1} fps)",
        summary.out_path.display(),
        summary.width,
        summary.height,
        summary.frames,
        summary.size_bytes,
        summary.fps
    );
}

fn cmd_edit(args: EditArgs) -> anyhow::Result<()> {
    let cfg = read_config_json(&args.config)?;
    let rasterizer = make_rasterizer(args.font.as_ref())?;
    let mut progress = progress_sink(args.progress);
    let cancel = gifwright::CancelToken::new();

    let summary = gifwright::run_edit(
        &args.in_path,
        &args.out,
        &cfg,
        rasterizer,
        progress.as_mut(),
        &cancel,
    )?;
    print_summary(&summary);
    Ok(())
}

fn cmd_compose(args: ComposeArgs) -> anyhow::Result<()> {
    let cfg = match args.config.as_ref() {
        Some(path) => read_config_json(path)?,
        None => gifwright::EditConfig::new(480),
    };
    let rasterizer = make_rasterizer(args.font.as_ref())?;
    let mut progress = progress_sink(args.progress);
    let cancel = gifwright::CancelToken::new();

    let summary = gifwright::compose_images(
        &args.in_paths,
        args.delay_cs,
        &args.out,
        &cfg,
        rasterizer,
        progress.as_mut(),
        &cancel,
    )?;
    print_summary(&summary);
    Ok(())
}
