//! Multimedia Art Station - command-line front end
//!
//! Runs one conversion per invocation on a worker thread and renders its
//! slot (label, progress, status text) until the job finishes.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use directories::ProjectDirs;

use mas_core::config::{ConfigManager, Settings};
use mas_core::converters::{
    Ascheatfy, Asciify, GenerativeImage, GenerativeVideo, GlyphArtOptions, GlyphSource,
    ModelLoader, ProceduralModelLoader, Sonify,
};
use mas_core::glyph::{FontRasterizer, WeightTable};
use mas_core::jobs::{
    Conversion, Dataset, Job, JobServices, RenderMode, Resolution, Speed, Transition,
};
use mas_core::logging::init_tracing_with_file;
use mas_core::slots::SlotPhase;

#[derive(Parser, Debug)]
#[command(name = "mas")]
#[command(about = "Turn images into music, text art and generated pictures", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Print the job summary as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Image to music (WAV)
    Sonify {
        input: PathBuf,
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Image to text art
    Asciify(GlyphArgs),
    /// Image or animated GIF to glyph art
    Ascheatfy(GlyphArgs),
    /// Generate a picture, optionally seeded by an input image
    GanImage {
        #[arg(short, long, default_value = "abstract art 1")]
        dataset: Dataset,
        /// PNG used as the latent instead of random noise
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Generate an animation
    GanVideo {
        #[arg(short, long, default_value = "abstract art 1")]
        dataset: Dataset,
        #[arg(short, long, default_value = "medium")]
        speed: Speed,
        #[arg(short, long, default_value = "random")]
        transition: Transition,
        /// Length in minutes
        #[arg(long, default_value = "0.1")]
        duration: String,
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Measure glyph darkness from a font and write a weight file
    Weights {
        /// Font file (defaults to the configured glyph font)
        #[arg(long)]
        font: Option<PathBuf>,
        /// First code point to measure
        #[arg(long, default_value_t = 32)]
        first: u32,
        /// Last code point to measure (inclusive)
        #[arg(long, default_value_t = 126)]
        last: u32,
        output: PathBuf,
    },
}

#[derive(Args, Debug)]
struct GlyphArgs {
    input: PathBuf,
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,
    #[arg(short, long, default_value = "medium")]
    resolution: Resolution,
    #[arg(short, long, default_value = "black on white")]
    mode: RenderMode,
    /// One glyph per brightness level
    #[arg(long)]
    static_palette: bool,
    /// Weight file (defaults to the configured one)
    #[arg(long)]
    weights: Option<PathBuf>,
    #[arg(long)]
    seed: Option<u64>,
}

impl GlyphArgs {
    fn options(&self, default_weights: &str) -> GlyphArtOptions {
        let weights = self
            .weights
            .clone()
            .unwrap_or_else(|| PathBuf::from(default_weights));
        let mut options = GlyphArtOptions::new(weights);
        options.resolution = self.resolution;
        options.mode = self.mode;
        options.static_palette = self.static_palette;
        options.seed = self.seed;
        options
    }
}

/// Config path: `--config`, else the platform config dir, else `.config/settings.toml`.
fn config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| {
        ProjectDirs::from("io.github", "mas", "mas")
            .map(|dirs| dirs.config_dir().join("settings.toml"))
            .unwrap_or_else(|| PathBuf::from(".config").join("settings.toml"))
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = config_path(cli.config);
    let mut config = ConfigManager::new(&config_path);
    if let Err(e) = config.load_or_create() {
        eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
    }
    let settings = config.settings().clone();

    let _log_guard = init_tracing_with_file(settings.logging.level, &settings.logs_folder());
    tracing::info!("MAS starting");
    tracing::info!("Config: {}", config_path.display());
    tracing::info!("Core version: {}", mas_core::version());

    if let Err(e) = config.ensure_dirs_exist() {
        tracing::error!("Failed to create directories: {}", e);
    }

    let planned = match cli.command {
        Command::Weights {
            font,
            first,
            last,
            output,
        } => return write_weights(&settings, font, first, last, &output),
        command => build_conversion(command, &settings)?,
    };

    let services = Arc::new(JobServices::from_settings(&settings));
    let mut job = Job::new(planned.conversion, planned.output_dir, Arc::clone(&services));
    if let Some(input) = planned.input {
        job = job.with_input(input);
    }

    let handle = job.spawn().context("failed to start job thread")?;
    let mut seen = 0;
    let mut last_status = None;
    while !handle.is_finished() {
        let revision = services.slots.revision();
        if revision != seen {
            seen = revision;
            render_slots(&services);
        }
        if let Some(status) = services.status.current() {
            last_status = Some(status);
        }
        thread::sleep(Duration::from_millis(50));
    }
    let report = handle.join();
    eprintln!();

    // The message may have expired during the drain.
    if let Some(status) = services.status.current().or(last_status) {
        if status.is_error() {
            eprintln!("error: {}", status.text);
        } else {
            println!("{}", status.text);
        }
    }
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report.summary())?);
    }
    if let Some(e) = report.error() {
        bail!("{} did not complete: {}", report.kind, e);
    }
    Ok(())
}

/// Conversion to run, its input and the output directory.
struct Planned {
    conversion: Box<dyn Conversion>,
    input: Option<PathBuf>,
    output_dir: PathBuf,
}

impl Planned {
    fn new(
        conversion: impl Conversion + 'static,
        input: Option<PathBuf>,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            conversion: Box::new(conversion),
            input,
            output_dir,
        }
    }
}

fn build_conversion(command: Command, settings: &Settings) -> Result<Planned> {
    let loader: Arc<dyn ModelLoader> =
        Arc::new(ProceduralModelLoader::new(Some(settings.models_folder())));
    let planned = match command {
        Command::Sonify { input, output_dir } => Planned::new(Sonify::new(), Some(input), output_dir),
        Command::Asciify(args) => {
            let options = args.options(&settings.paths.asciify_weights);
            let conversion = Asciify::new(options, settings.glyph.text_cell());
            Planned::new(conversion, Some(args.input), args.output_dir)
        }
        Command::Ascheatfy(args) => {
            let options = args.options(&settings.paths.ascheatfy_weights);
            let glyphs = GlyphSource::Font {
                path: PathBuf::from(&settings.paths.glyph_font),
                px: settings.glyph.font_px,
                cell: settings.glyph.art_cell(),
            };
            Planned::new(Ascheatfy::new(options, glyphs), Some(args.input), args.output_dir)
        }
        Command::GanImage {
            dataset,
            input,
            output_dir,
            seed,
        } => {
            let mut conversion = GenerativeImage::new(dataset, loader);
            if let Some(seed) = seed {
                conversion = conversion.with_seed(seed);
            }
            Planned::new(conversion, input, output_dir)
        }
        Command::GanVideo {
            dataset,
            speed,
            transition,
            duration,
            output_dir,
            seed,
        } => {
            let mut conversion = GenerativeVideo::new(dataset, speed, transition, duration, loader)
                .with_fps(settings.video.fps)
                .with_max_minutes(settings.video.max_duration_minutes);
            if let Some(seed) = seed {
                conversion = conversion.with_seed(seed);
            }
            Planned::new(conversion, None, output_dir)
        }
        Command::Weights { .. } => bail!("weights does not run as a job"),
    };
    Ok(planned)
}

fn render_slots(services: &JobServices) {
    let mut err = io::stderr().lock();
    for slot in services.slots.snapshots() {
        let state = match (slot.phase, slot.succeeded) {
            (SlotPhase::Draining, Some(true)) => "done",
            (SlotPhase::Draining, _) => "failed",
            (SlotPhase::Active, _) => "",
        };
        let _ = write!(
            err,
            "\r\x1b[2K[{}] {} {:>5.1}% {} {}",
            slot.id, slot.label, slot.progress, slot.status_text, state
        );
    }
    let _ = err.flush();
}

fn write_weights(
    settings: &Settings,
    font: Option<PathBuf>,
    first: u32,
    last: u32,
    output: &Path,
) -> Result<()> {
    if first > last {
        bail!("first code point {} is after last {}", first, last);
    }
    let font = font.unwrap_or_else(|| PathBuf::from(&settings.paths.glyph_font));
    let rasterizer =
        FontRasterizer::from_file(&font, settings.glyph.font_px, settings.glyph.art_cell())
            .with_context(|| format!("failed to load font {}", font.display()))?;

    let codes: Vec<u32> = (first..=last).filter(|c| char::from_u32(*c).is_some()).collect();
    let table = WeightTable::measure(&rasterizer, &codes)?;
    tracing::info!(
        glyphs = table.glyph_count(),
        levels = table.populated_levels(),
        "measured weights"
    );

    save_weights(&table, output)?;
    println!(
        "wrote {} glyphs over {} levels to {}",
        table.glyph_count(),
        table.populated_levels(),
        output.display()
    );
    Ok(())
}

/// Write `table` to `output`, surfacing errors from the final flush.
fn save_weights(table: &WeightTable, output: &Path) -> Result<()> {
    let file = File::create(output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    table.write_to(&mut writer)?;
    writer
        .flush()
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_round_trip_through_file() {
        let path = std::env::temp_dir().join(format!("mas_weights_{}.txt", std::process::id()));
        let table = WeightTable::parse("0: 32\n255: 35 64\n").unwrap();

        save_weights(&table, &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(written, "0: 32\n255: 35 64\n");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_flush_is_an_error() {
        // Writes to /dev/full fail with ENOSPC; the small table sits in the
        // buffer until the flush.
        let table = WeightTable::parse("0: 32\n").unwrap();
        let err = save_weights(&table, Path::new("/dev/full")).unwrap_err();
        assert!(err.to_string().contains("failed to write"));
    }

    #[test]
    fn cli_parses_glyph_options() {
        let cli = Cli::try_parse_from([
            "mas",
            "asciify",
            "cat.png",
            "--resolution",
            "big",
            "--mode",
            "white-on-black",
        ])
        .unwrap();
        let Command::Asciify(args) = cli.command else {
            panic!("expected asciify");
        };
        assert_eq!(args.resolution, Resolution::Big);
        assert_eq!(args.mode, RenderMode::WhiteOnBlack);
    }
}
