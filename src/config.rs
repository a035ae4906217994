// src/config.rs
use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ignore::IgnoreSet;

/// Default HTTP listen port.
pub const DEFAULT_PORT: u16 = 8703;

/// Default document root, relative to the working directory.
pub const DEFAULT_MARKDOWN_DIR: &str = "./markdown-files";

/// Command-line arguments. Every flag overrides the corresponding file or
/// environment value.
#[derive(Parser, Debug, Default)]
#[clap(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Listen port for the HTTP server
    #[clap(short, long, value_parser, help = "Listen port for the HTTP server")]
    pub port: Option<u16>,

    /// Directory of markdown documents to serve and watch
    #[clap(
        short,
        long,
        value_parser,
        help = "Directory of markdown documents to serve and watch"
    )]
    pub dir: Option<PathBuf>,

    /// Comma-separated name substrings to exclude from watching and listing
    #[clap(
        short,
        long,
        value_parser,
        help = "Comma-separated name substrings to exclude from watching and listing"
    )]
    pub ignore: Option<String>,

    /// Path to a configuration file (e.g., marklive.toml)
    #[clap(
        short,
        long,
        value_parser,
        help = "Path to a configuration file (e.g., marklive.toml)"
    )]
    pub config: Option<PathBuf>,

    /// Log level (e.g., trace, debug, info, warn, error)
    #[clap(
        long,
        value_parser,
        help = "Log level (e.g., trace, debug, info, warn, error)"
    )]
    pub log_level: Option<String>,
}

/// Configuration as read from file, environment, or defaults, before
/// CLI overrides are applied.
#[derive(Deserialize, Serialize, Debug, Default)]
pub struct FileConfig {
    /// Listen port (`PORT`)
    pub port: Option<u16>,
    /// Document root (`MARKDOWN_DIR`)
    pub markdown_dir: Option<String>,
    /// Comma-separated ignore patterns (`IGNORE_PATTERNS`)
    pub ignore_patterns: Option<String>,
    /// Log level (`LOG_LEVEL`)
    pub log_level: Option<String>,
}

/// Final application configuration after merging all sources.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Listen port for the HTTP server.
    pub port: u16,
    /// Absolute path of the document root to serve and watch.
    pub markdown_dir: PathBuf,
    /// Names excluded from watching and listing.
    pub ignore: IgnoreSet,
    /// Log level.
    pub log_level: String,
}

impl AppConfig {
    /// Loads the configuration by merging defaults, an optional TOML file,
    /// the environment, and CLI arguments (highest precedence).
    pub fn load() -> Result<Self, figment::Error> {
        Self::from_sources(CliArgs::parse())
    }

    /// Merge step, separated from argument parsing so tests can inject
    /// their own `CliArgs`.
    pub fn from_sources(cli: CliArgs) -> Result<Self, figment::Error> {
        let config_file = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from("marklive.toml"));

        let fig = Figment::new()
            .merge(Serialized::defaults(FileConfig {
                port: Some(DEFAULT_PORT),
                markdown_dir: Some(DEFAULT_MARKDOWN_DIR.to_string()),
                ignore_patterns: None,
                log_level: Some("info".to_string()),
            }))
            .merge(Toml::file(config_file))
            .merge(
                Env::raw()
                    .only(&["PORT", "MARKDOWN_DIR", "IGNORE_PATTERNS", "LOG_LEVEL"])
                    .lowercase(true),
            );

        let mut merged: FileConfig = fig.extract()?;

        // CLI flags win over every other source.
        if let Some(port) = cli.port {
            merged.port = Some(port);
        }
        if let Some(dir) = cli.dir {
            merged.markdown_dir = Some(dir.to_string_lossy().into_owned());
        }
        if let Some(patterns) = cli.ignore {
            merged.ignore_patterns = Some(patterns);
        }
        if let Some(level) = cli.log_level {
            merged.log_level = Some(level);
        }

        let markdown_dir = absolutize(Path::new(
            merged.markdown_dir.as_deref().unwrap_or(DEFAULT_MARKDOWN_DIR),
        ));
        let ignore = match merged.ignore_patterns.as_deref() {
            Some(patterns) => IgnoreSet::parse(patterns),
            None => IgnoreSet::default(),
        };

        Ok(AppConfig {
            port: merged.port.unwrap_or(DEFAULT_PORT),
            markdown_dir,
            ignore,
            log_level: merged.log_level.unwrap_or_else(|| "info".to_string()),
        })
    }
}

/// Resolves a path against the working directory. Falls back to the raw
/// path if the working directory is unavailable.
fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_take_precedence() {
        let cli = CliArgs::parse_from([
            "marklive",
            "--port",
            "9100",
            "--dir",
            "/srv/docs",
            "--ignore",
            "drafts, tmp",
        ]);
        let config = AppConfig::from_sources(cli).expect("config should load");

        assert_eq!(config.port, 9100);
        assert_eq!(config.markdown_dir, PathBuf::from("/srv/docs"));
        assert!(config.ignore.should_ignore("drafts-2024"));
        assert!(config.ignore.should_ignore("tmp"));
        assert!(!config.ignore.should_ignore("node_modules"));
    }

    #[test]
    fn relative_directories_are_resolved_to_absolute_paths() {
        let cli = CliArgs::parse_from(["marklive", "--dir", "relative/docs"]);
        let config = AppConfig::from_sources(cli).expect("config should load");
        assert!(config.markdown_dir.is_absolute());
        assert!(config.markdown_dir.ends_with("relative/docs"));
    }

    #[test]
    fn defaults_apply_without_overrides() {
        let cli = CliArgs::parse_from(["marklive", "--config", "/nonexistent/marklive.toml"]);
        let config = AppConfig::from_sources(cli).expect("config should load");
        // PORT may be present in the environment of some CI setups; the
        // directory default and ignore default are stable either way.
        assert!(config.markdown_dir.is_absolute());
        assert!(config.ignore.should_ignore(".git"));
    }
}
