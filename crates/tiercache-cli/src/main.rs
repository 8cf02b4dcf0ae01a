//! tiercache - operator tool for a tiered cache directory.
//!
//! `recover` opens a cache directory the same way an application would,
//! re-uploading any content left behind by an interrupted upload, and prints
//! what it found. `object` talks to the object store directly, which is handy
//! when checking credentials or connectivity before pointing a cache at it.

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;
use tiercache::{
    CacheDefaults, CacheManager, DynObjectStore, ObjectStore, StoreConfig, TierCacheConfig,
};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "tiercache")]
#[command(about = "Recovery and object store tooling for tiercache")]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open a cache directory, finishing any interrupted uploads
    Recover {
        #[command(flatten)]
        target: CacheTarget,
    },
    /// Operate on the object store directly
    Object {
        #[command(flatten)]
        store: StoreTarget,

        #[command(subcommand)]
        action: ObjectAction,
    },
}

#[derive(Subcommand, Debug)]
enum ObjectAction {
    /// Download an object to a local file
    Get { name: String, dest: PathBuf },
    /// Upload a local file as an object
    Put { src: PathBuf, name: String },
    /// Delete an object
    Rm { name: String },
}

/// Object store selection shared by every subcommand.
#[derive(ClapArgs, Debug)]
struct StoreTarget {
    /// Use a directory as the object store
    #[arg(long, conflicts_with = "store_url")]
    store_dir: Option<PathBuf>,

    /// Use an HTTP endpoint as the object store
    #[arg(long)]
    store_url: Option<String>,

    /// HTTP request timeout in seconds
    #[arg(long, requires = "store_url")]
    timeout_secs: Option<u64>,
}

impl StoreTarget {
    fn to_config(&self) -> Result<StoreConfig> {
        match (&self.store_dir, &self.store_url) {
            (Some(root), None) => Ok(StoreConfig::LocalDir { root: root.clone() }),
            (None, Some(base_url)) => Ok(StoreConfig::Http {
                base_url: base_url.clone(),
                timeout_secs: self.timeout_secs,
            }),
            _ => bail!("Exactly one of --store-dir or --store-url is required"),
        }
    }

    fn build(&self) -> Result<DynObjectStore> {
        Ok(self.to_config()?.build()?)
    }
}

/// A cache described either by a config file or by flags.
#[derive(ClapArgs, Debug)]
struct CacheTarget {
    /// JSON config file; overrides the other cache flags
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Cache directory
    #[arg(long, required_unless_present = "config")]
    cache_dir: Option<PathBuf>,

    /// Local capacity in bytes
    #[arg(long, default_value_t = CacheDefaults::DEFAULT_MAX_SIZE_BYTES)]
    max_size: u64,

    #[command(flatten)]
    store: StoreTarget,
}

impl CacheTarget {
    fn resolve(&self) -> Result<TierCacheConfig> {
        if let Some(path) = &self.config {
            return TierCacheConfig::load(path)
                .with_context(|| format!("Failed to load {}", path.display()));
        }

        let cache_dir = self
            .cache_dir
            .clone()
            .context("--cache-dir is required without --config")?;
        let config = TierCacheConfig {
            cache_dir,
            max_size_bytes: self.max_size,
            store: self.store.to_config()?,
        };
        config.validate()?;
        Ok(config)
    }
}

async fn recover(target: &CacheTarget) -> Result<()> {
    let config = target.resolve()?;
    info!("Recovering cache at {}", config.cache_dir.display());

    let manager = CacheManager::from_config(&config)
        .await
        .with_context(|| format!("Recovery failed for {}", config.cache_dir.display()))?;

    let report = manager.recovery_report();
    // Machine-readable summary on stdout
    println!("{}", serde_json::to_string_pretty(report)?);

    info!(
        "Recovered {} upload(s), discarded {} orphan sentinel(s)",
        report.recovered.len(),
        report.discarded.len()
    );
    Ok(())
}

async fn object(store: &StoreTarget, action: &ObjectAction) -> Result<()> {
    let store = store.build()?;
    debug!("Using object store {}", store.describe());

    match action {
        ObjectAction::Get { name, dest } => {
            store.get(name, dest).await?;
            info!("Downloaded {} to {}", name, dest.display());
        }
        ObjectAction::Put { src, name } => {
            if !src.is_file() {
                bail!("{} is not a file", src.display());
            }
            store.put(name, src).await?;
            info!("Uploaded {} as {}", src.display(), name);
        }
        ObjectAction::Rm { name } => {
            store.remove(name).await?;
            info!("Removed {}", name);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let started = Instant::now();
    match &args.command {
        Command::Recover { target } => recover(target).await?,
        Command::Object { store, action } => object(store, action).await?,
    }
    debug!("Done in {:?}", started.elapsed());

    Ok(())
}
