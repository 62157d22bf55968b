//! tilesplit CLI: split annotated rasters into tiles, inspect catalogs.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};
use tilesplit::{format_entry, list_catalog, split, OutputFormat, RunMode, SplitConfig};
use tilesplit::core::Stride;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "tilesplit")]
#[command(about = "Split large annotated images into overlapping tiles with remapped boxes")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[cfg(feature = "tracing")]
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tile every image of the input directories.
    Split(SplitArgs),

    /// Print `<tile>.xml:<category>` for every annotation in a catalog.
    ListCatalog {
        /// Catalog JSON written by a `split --catalog` run.
        catalog: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
struct SplitArgs {
    /// JSON config used as the base; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Input directory holding `images/` and `annotations/` (repeatable).
    #[arg(short, long = "input")]
    inputs: Vec<PathBuf>,

    /// Output directory.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Requested tile edge in pixels.
    #[arg(long)]
    size: Option<u32>,

    /// Overlap between neighbouring tiles in pixels.
    #[arg(long, conflicts_with = "stride_frac")]
    stride_px: Option<u32>,

    /// Overlap between neighbouring tiles as a fraction of the tile edge.
    #[arg(long)]
    stride_frac: Option<f64>,

    /// Image file extension to pick up.
    #[arg(long)]
    ext: Option<String>,

    /// Inset from each tile edge a box edge must clear.
    #[arg(long)]
    margin: Option<u32>,

    /// Keep boxes that cross one tile edge, clipped to the tile.
    #[arg(long, overrides_with = "no_truncated")]
    truncated: bool,

    /// Drop boxes that cross one tile edge instead of clipping them.
    #[arg(long, overrides_with = "truncated")]
    no_truncated: bool,

    /// Inject a placeholder object into tiles without boxes (XML output).
    #[arg(long, overrides_with = "no_dummy")]
    dummy: bool,

    /// Leave tiles without boxes empty.
    #[arg(long, overrides_with = "dummy")]
    no_dummy: bool,

    /// Fit the crop size per image so one axis holds whole tiles.
    #[arg(long, overrides_with = "no_remainder")]
    remainder: bool,

    /// Keep the requested crop size instead of fitting it per image.
    #[arg(long, overrides_with = "remainder")]
    no_remainder: bool,

    /// Write one catalog JSON instead of per-tile XML.
    #[arg(long, overrides_with = "xml")]
    catalog: bool,

    /// Write one VOC XML record per tile.
    #[arg(long, overrides_with = "catalog")]
    xml: bool,

    /// Tile pixels only; annotations are neither read nor written.
    #[arg(long, overrides_with = "train")]
    predict: bool,

    /// Read source annotations and write tile annotations.
    #[arg(long, overrides_with = "predict")]
    train: bool,

    /// Write the resolved config to this file before running.
    #[arg(long)]
    dump_config: Option<PathBuf>,

    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    summary_json: bool,
}

impl SplitArgs {
    fn resolve(&self) -> CliResult<SplitConfig> {
        let mut cfg = match &self.config {
            Some(path) => SplitConfig::load_json(path)?,
            None => SplitConfig::default(),
        };
        if !self.inputs.is_empty() {
            cfg.input_dirs = self.inputs.clone();
        }
        if let Some(output) = &self.output {
            cfg.output_dir = output.clone();
        }
        if let Some(size) = self.size {
            cfg.crop_size = size;
        }
        if let Some(px) = self.stride_px {
            cfg.stride = Stride::Pixels(px);
        }
        if let Some(f) = self.stride_frac {
            cfg.stride = Stride::Fraction(f);
        }
        if let Some(ext) = &self.ext {
            cfg.extension = ext.clone();
        }
        if let Some(margin) = self.margin {
            cfg.margin = margin;
        }
        if let Some(on) = switch(self.truncated, self.no_truncated) {
            cfg.include_truncated = on;
        }
        if let Some(on) = switch(self.dummy, self.no_dummy) {
            cfg.dummy_object = on;
        }
        if let Some(on) = switch(self.remainder, self.no_remainder) {
            cfg.eliminate_remainder = on;
        }
        if let Some(catalog) = switch(self.catalog, self.xml) {
            cfg.output = if catalog {
                OutputFormat::Catalog
            } else {
                OutputFormat::Xml
            };
        }
        if let Some(predict) = switch(self.predict, self.train) {
            cfg.mode = if predict {
                RunMode::Predict
            } else {
                RunMode::Train
            };
        }
        Ok(cfg)
    }
}

/// Resolve an `--x` / `--no-x` pair; `None` leaves the config value alone.
/// clap's `overrides_with` guarantees at most one of the two is set.
fn switch(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "tracing")]
fn init_logging(cli: &Cli) {
    let level = tilesplit::core::level_from_verbosity(cli.verbose);
    tilesplit::core::init_tracing(level, cli.log_json);
}

#[cfg(not(feature = "tracing"))]
fn init_logging(cli: &Cli) {
    let level = tilesplit::core::level_from_verbosity(cli.verbose);
    if let Err(err) = tilesplit::core::init_with_level(level) {
        eprintln!("warning: logger already installed: {err}");
    }
}

fn run(command: Commands) -> CliResult<()> {
    match command {
        Commands::Split(args) => run_split(&args),
        Commands::ListCatalog { catalog } => {
            for entry in list_catalog(&catalog)? {
                println!("{}", format_entry(&entry));
            }
            Ok(())
        }
    }
}

fn run_split(args: &SplitArgs) -> CliResult<()> {
    let cfg = args.resolve()?;
    if let Some(path) = &args.dump_config {
        cfg.write_json(path)?;
        log::info!("config written to {}", path.display());
    }

    let report = split(cfg)?;
    let s = &report.summary;
    log::info!(
        "{} tiles written ({} blank, {} partial skipped), {} dummy objects",
        s.tiles_written,
        s.blank_tiles,
        s.partial_tiles,
        s.dummy_objects
    );
    let warnings = tilesplit::core::warning_count();
    if warnings > 0 {
        eprintln!("finished with {warnings} warnings");
    }
    if args.summary_json {
        println!("{}", serde_json::to_string_pretty(&report.summary)?);
    }
    Ok(())
}
