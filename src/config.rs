use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub sources: SourcesConfig,
  /// Default tracing level; `RUST_LOG` still wins
  #[serde(default)]
  pub log_level: LogLevel,
}

/// Upper bound for `cache.ttl_hours` (one year)
pub const MAX_TTL_HOURS: i64 = 24 * 366;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// How long fetched items stay fresh
  pub ttl_hours: i64,
  /// Items requested per remote page
  pub page_size: u32,
  /// Rows from the tail at which the next page is requested
  pub prefetch_distance: usize,
  /// Database file (defaults to $XDG_DATA_HOME/dealdeck/cache.db)
  pub database: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      ttl_hours: 8,
      page_size: 20,
      prefetch_distance: 5,
      database: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
  pub deals_url: String,
  pub giveaways_url: String,
  pub releases_url: String,
  /// Per-request timeout
  pub timeout_secs: u64,
}

impl Default for SourcesConfig {
  fn default() -> Self {
    Self {
      deals_url: "https://www.cheapshark.com/api/1.0".to_string(),
      giveaways_url: "https://www.gamerpower.com/api".to_string(),
      releases_url: "https://api.rawg.io/api".to_string(),
      timeout_secs: 15,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
  Error,
  Warn,
  #[default]
  Info,
  Debug,
  Trace,
}

impl LogLevel {
  pub fn as_str(&self) -> &'static str {
    match self {
      LogLevel::Error => "error",
      LogLevel::Warn => "warn",
      LogLevel::Info => "info",
      LogLevel::Debug => "debug",
      LogLevel::Trace => "trace",
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./dealdeck.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/dealdeck/config.yaml
  ///
  /// Every setting has a default, so no file at all is fine.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("dealdeck.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("dealdeck").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    if self.cache.ttl_hours <= 0 {
      return Err(eyre!("cache.ttl_hours must be positive"));
    }
    if self.cache.ttl_hours > MAX_TTL_HOURS {
      return Err(eyre!("cache.ttl_hours must be at most {}", MAX_TTL_HOURS));
    }
    if self.cache.page_size == 0 {
      return Err(eyre!("cache.page_size must be positive"));
    }
    Ok(())
  }

  /// Get the release-calendar API key from environment variables.
  ///
  /// Checks DEALDECK_RAWG_KEY first, then RAWG_API_KEY as fallback.
  pub fn get_releases_api_key() -> Result<String> {
    std::env::var("DEALDECK_RAWG_KEY")
      .or_else(|_| std::env::var("RAWG_API_KEY"))
      .map_err(|_| {
        eyre!("Release calendar API key not found. Set DEALDECK_RAWG_KEY or RAWG_API_KEY environment variable.")
      })
  }
}
