//! Command-line interface.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use exn::ResultExt;
use novelsync_config::Config;
use novelsync_sync::provider::Registry;
use novelsync_sync::{EpisodeListOptions, Series, SeriesOptions, UpdateSummary};

use crate::error::{ErrorKind, Result};

/// Incrementally mirror serialized novels into a local directory tree.
#[derive(Parser, Debug)]
#[command(name = "novelsync")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON) layered over the defaults.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download new and updated chapters of one or more novels.
    Get(GetArgs),
}

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Manifest paths, `manifest:<path>` sources, or existing novel folders.
    #[arg(required = true, value_name = "SOURCE")]
    pub sources: Vec<String>,

    /// Directory new novel folders are created in.
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Folder name for the novel; only valid with a single source.
    #[arg(short, long)]
    pub name: Option<String>,

    /// Migrate metadata written in the legacy format.
    #[arg(long)]
    pub overwrite: bool,

    /// Remove chapter files that the cache doesn't account for.
    #[arg(long)]
    pub check_fs: bool,
}

impl GetArgs {
    /// Merge flags over the configuration.
    pub fn options(&self, config: &Config) -> Result<(PathBuf, SeriesOptions)> {
        if self.name.is_some() && self.sources.len() > 1 {
            exn::bail!(ErrorKind::Arguments("--name requires exactly one source".to_string()));
        }
        let output_dir = self.output_dir.clone().unwrap_or_else(|| config.output_dir.clone());
        let options = SeriesOptions {
            basename: self.name.clone(),
            overwrite: self.overwrite,
            episodes: EpisodeListOptions {
                compression: config.cache_compression,
                check_fs: self.check_fs || config.check_fs,
                fetch_delay: config.request_delay(),
            },
        };
        Ok((output_dir, options))
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = Config::load(self.config.as_deref()).or_raise(|| ErrorKind::Config)?;
        tracing::debug!(?config, "Loaded configuration");
        match self.command {
            Command::Get(args) => get(args, &config).await,
        }
    }
}

async fn get(args: GetArgs, config: &Config) -> Result<()> {
    let (output_dir, options) = args.options(config)?;
    let registry = Registry::with_defaults();
    for source in &args.sources {
        let (name, summary) = sync_one(&registry, &output_dir, source, options.clone())
            .await
            .or_raise(|| ErrorKind::Sync(source.clone()))?;
        println!("{name}: {summary}");
    }
    Ok(())
}

async fn sync_one(
    registry: &Registry,
    output_dir: &Path,
    source: &str,
    options: SeriesOptions,
) -> novelsync_sync::error::Result<(String, UpdateSummary)> {
    let mut series = Series::from_source(registry.clone(), output_dir, source, options).await?;
    series.load().await?;
    let summary = series.update_index().await?;
    Ok((series.name(), summary))
}
