use crate::services::object_store::DEFAULT_MAX_SIZE;
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, path::PathBuf};

pub const DEFAULT_LISTEN: &str = "127.0.0.1:14641";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Addresses to listen on; every listener shares one store.
    pub listen: Vec<String>,
    pub max_upload_size: usize,
    /// Public base URL for returned links. Derived per request when unset.
    pub base_url: Option<String>,
    /// Shared state directory. Objects are kept in memory when unset.
    pub state_dir: Option<PathBuf>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "YODO - You Only Download Once")]
pub struct Args {
    /// Address to listen on, repeatable (overrides YODO_LISTEN)
    #[arg(long)]
    pub listen: Vec<String>,

    /// Maximum upload size in bytes (overrides YODO_MAX_UPLOAD_SIZE)
    #[arg(long)]
    pub max_upload_size: Option<usize>,

    /// Base URL used in returned links (overrides YODO_BASE_URL)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Keep objects in this directory so several processes can share them
    /// (overrides YODO_STATE_DIR and STATE_DIRECTORY)
    #[arg(long)]
    pub state_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::from_sources(Args::parse(), |key| env::var(key).ok())
    }

    /// Merge CLI args over environment lookups over defaults.
    pub fn from_sources(args: Args, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let listen = if !args.listen.is_empty() {
            args.listen
        } else if let Some(value) = env("YODO_LISTEN") {
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        } else {
            vec![DEFAULT_LISTEN.to_string()]
        };
        if listen.is_empty() {
            bail!("no listen address configured");
        }

        let max_upload_size = match args.max_upload_size {
            Some(size) => size,
            None => match env("YODO_MAX_UPLOAD_SIZE") {
                Some(value) => value
                    .trim()
                    .parse::<usize>()
                    .with_context(|| format!("parsing YODO_MAX_UPLOAD_SIZE value `{}`", value))?,
                None => 0,
            },
        };
        // Zero means "use the default", matching an unset variable.
        let max_upload_size = if max_upload_size == 0 {
            DEFAULT_MAX_SIZE
        } else {
            max_upload_size
        };

        let base_url = args
            .base_url
            .or_else(|| env("YODO_BASE_URL"))
            .map(|url| normalize_base_url(&url))
            .transpose()?;

        let state_dir = args
            .state_dir
            .or_else(|| env("YODO_STATE_DIR").map(PathBuf::from))
            .or_else(|| env("STATE_DIRECTORY").map(PathBuf::from));

        Ok(Self {
            listen,
            max_upload_size,
            base_url,
            state_dir,
        })
    }
}

fn normalize_base_url(url: &str) -> Result<String> {
    let url = url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("base URL `{}` must start with http:// or https://", url);
    }
    Ok(url.trim_end_matches('/').to_string())
}
