mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use gallery_core::ProjectPaths;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gallery")]
#[command(about = "Photo gallery data tools: EXIF, colour palettes and derivatives", long_about = None)]
struct Cli {
    /// Project root containing src/_data/gallery.json
    #[arg(short, long, global = true, env = "GALLERY_ROOT", default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write camera metadata for every image to exif.json
    ExtractExif,

    /// Write dominant colour treemaps for every image to colorTreemap.json
    ExtractColors,

    /// Write the tag and lens index to galleryThemes.json
    Themes,

    /// Rebuild resized derivatives
    Regenerate {
        /// Only these image sources (default: all)
        sources: Vec<String>,
    },

    /// Copy images into the gallery and add them to the manifest
    Import {
        /// Directories or files to import
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Target directory under /images/
        #[arg(short, long, default_value = "/images/")]
        img_dir: String,
    },

    /// Show every manifest entry with its file size and modification time
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gallery_cli=info,gallery_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let paths = ProjectPaths::new(cli.root);

    match cli.command {
        Commands::ExtractExif => commands::extract_exif::execute(&paths).await?,
        Commands::ExtractColors => commands::extract_colors::execute(&paths).await?,
        Commands::Themes => commands::themes::execute(&paths).await?,
        Commands::Regenerate { sources } => commands::regenerate::execute(&paths, sources).await?,
        Commands::Import { paths: inputs, img_dir } => {
            commands::import::execute(&paths, inputs, img_dir).await?;
        }
        Commands::List => commands::list::execute(&paths).await?,
    }

    Ok(())
}
