use anyhow::Context;
use clap::Parser;
use photomap::render::{self, RenderOptions};
use photomap::source::local::{LocalCacheFile, LocalFolderSource};
use photomap::{IconConfig, Pipeline, PipelineConfig, PreviewConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Photomap - plots geotagged photos on a static Leaflet map, incrementally.
#[derive(Parser, Debug)]
#[command(name = "photomap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Folder holding the photos
    #[arg(long)]
    photos: PathBuf,

    /// Cache file; created on first run
    #[arg(long, default_value = "photomap_cache.json")]
    cache: PathBuf,

    /// Output HTML page
    #[arg(long, default_value = "index.html")]
    out: PathBuf,

    /// Diameter of the circular marker icon, in pixels
    #[arg(long, default_value_t = 50)]
    icon_diameter: u32,

    /// Width of the white frame around the icon; 0 disables it
    #[arg(long, default_value_t = 4)]
    icon_border: u32,

    /// Upper bound on the popup preview's long edge, in pixels
    #[arg(long, default_value_t = 480)]
    preview_size: u32,

    /// Multiplier on the native size before bounding; above 1.0 small
    /// photos are enlarged on purpose
    #[arg(long, default_value_t = 1.0)]
    upscale_factor: f32,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = PipelineConfig {
        icon: IconConfig {
            diameter: cli.icon_diameter,
            border: cli.icon_border,
            ..Default::default()
        },
        preview: PreviewConfig {
            long_edge: cli.preview_size,
            upscale_factor: cli.upscale_factor,
            ..Default::default()
        },
    };

    let source = LocalFolderSource::new(&cli.photos);
    let store = LocalCacheFile::new(&cli.cache);
    let run = Pipeline::new(source, store, config).run()?;

    let options = RenderOptions {
        icon_size: cli.icon_diameter + 2 * cli.icon_border,
        preview_width: cli.preview_size,
    };
    let html = render::map_html(&run.records, &options);
    std::fs::write(&cli.out, html)
        .with_context(|| format!("cannot write {}", cli.out.display()))?;

    let stats = &run.stats;
    println!("{} file(s) listed, {} fetched this run", stats.listed, stats.downloaded);
    println!(
        "{} mapped, {} without coordinates, {} skipped",
        stats.mapped,
        stats.no_coordinate,
        stats.skipped()
    );
    for line in &stats.error_log {
        println!("  skipped: {}", line);
    }
    println!("map written to {}", cli.out.display());
    Ok(())
}

fn init_logging(verbose: bool) {
    // Logs go to stderr; stdout carries the run summary.
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
