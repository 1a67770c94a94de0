use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use flexi_logger::{Logger, WriteMode};
use log::{error, info, warn};

use thumbcache::{
    CacheSettings, Collaborators, Config, FileBlobStoreProvider, MediaKind, StoreLock,
    ThumbnailCache, checksum, dirs::Dirs, utils,
};

#[derive(Debug, Parser)]
#[command(name = "thumbcache", version, about = "Persistent thumbnail cache")]
struct Cli {
    /// Directory holding the cache store. Overrides the config file.
    #[arg(long, env = "THUMBCACHE_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    #[arg(long, env = "THUMBCACHE_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print (and optionally write out) thumbnails, computing the missing ones.
    Extract {
        #[arg(long)]
        size: Option<u32>,

        #[arg(long)]
        video: bool,

        /// Write each thumbnail to DIR/<file stem>.jpg
        #[arg(long)]
        out: Option<PathBuf>,

        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Look a path up without computing anything.
    Lookup { path: PathBuf },
    /// Delete the persisted cache files.
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _logger = Logger::try_with_env_or_str(&cli.log_level)?
        .write_mode(WriteMode::Direct)
        .start()?;

    checksum::init();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => {
            Dirs::initialize_dirs()?;
            Config::load()?
        }
    };
    let mut settings = config.cache.clone();
    if let Some(cache_dir) = cli.cache_dir {
        settings.directory = cache_dir;
    }

    match cli.command {
        Command::Extract {
            size,
            video,
            out,
            paths,
        } => {
            let size = size.unwrap_or(settings.thumbnail_size);
            let kind = if video {
                MediaKind::Video
            } else {
                MediaKind::Image
            };
            let cache = Arc::new(ThumbnailCache::open(
                &settings,
                &mut config,
                Collaborators::default(),
            ));
            let result = extract_all(&cache, paths, size, kind, out).await;
            cache.close();
            result
        }
        Command::Lookup { path } => {
            let cache = ThumbnailCache::open(&settings, &mut config, Collaborators::default());
            match cache.get_image_data(&path) {
                Some(payload) => println!("{}: {} bytes", path.display(), payload.len()),
                None => println!("{}: not cached", path.display()),
            }
            cache.close();
            Ok(())
        }
        Command::Clear => clear(&settings),
    }
}

async fn extract_all(
    cache: &Arc<ThumbnailCache>,
    paths: Vec<PathBuf>,
    size: u32,
    kind: MediaKind,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    if let Some(out) = &out {
        std::fs::create_dir_all(out)
            .with_context(|| format!("Failed to create {}", out.display()))?;
    }

    let partitions = utils::partition_iterator(paths.into_iter(), num_cpus::get());
    let mut tasks = Vec::with_capacity(partitions.len());

    for partition in partitions {
        let cache = cache.clone();
        let out = out.clone();
        tasks.push(tokio::task::spawn_blocking(move || -> usize {
            let mut failures = 0;
            for path in partition {
                match cache.get(&path, size, kind) {
                    Some(payload) => {
                        println!("{}: {} bytes", path.display(), payload.len());
                        if let Some(out) = &out
                            && let Err(e) = write_thumbnail(out, &path, &payload)
                        {
                            error!("Failed to write thumbnail for {}: {:?}", path.display(), e);
                            failures += 1;
                        }
                    }
                    None => {
                        println!("{}: no thumbnail", path.display());
                        failures += 1;
                    }
                }
            }
            failures
        }));
    }

    let mut failures = 0;
    for task in tasks {
        failures += task.await?;
    }

    if failures > 0 {
        warn!("{} path(s) produced no thumbnail", failures);
    }
    Ok(())
}

fn write_thumbnail(out: &Path, source: &Path, payload: &[u8]) -> anyhow::Result<()> {
    let stem = source
        .file_stem()
        .ok_or(anyhow::anyhow!("No file name in {}", source.display()))?;
    let mut file_name = stem.to_os_string();
    file_name.push(".jpg");
    let target = out.join(file_name);
    std::fs::write(&target, payload)?;
    info!("Thumbnail written: {}", target.display());
    Ok(())
}

fn clear(settings: &CacheSettings) -> anyhow::Result<()> {
    ThumbnailCache::delete_files(settings, &FileBlobStoreProvider, &StoreLock::global())?;
    println!("Cleared {}", settings.store_path().display());
    Ok(())
}
