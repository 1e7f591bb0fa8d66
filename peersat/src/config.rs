//! Portfolio configuration.
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Errors while loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid configuration")]
    Parse(#[from] toml::de::Error),
}

/// Configurable parameters of a portfolio run.
///
/// Deserializable so a TOML configuration file can be merged over the
/// defaults by the command line frontend.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Number of solver threads. (Default: 24)
    pub cpus: usize,

    /// Wall-clock limit in seconds, no limit when zero or negative.
    /// (Default: 0)
    pub timeout: i64,

    /// Local sharing strategy in `1..=5`, `0` picks one at random.
    /// (Default: 0)
    pub shr_strat: u32,

    /// Sharer round period in microseconds. (Default: 500000)
    pub shr_sleep: u64,

    /// Local per-round literal budget. (Default: 1500)
    pub shr_lit: usize,

    /// Enable duplicate detection and promotion. (Default: false)
    pub dup: bool,

    /// Maximum LBD of exported clauses. (Default: 2)
    pub lbd_limit: u32,

    /// Enable inter-process sharing. (Default: false)
    pub dist: bool,

    /// Global per-round literal budget, `0` means `1500 * cpus`.
    /// (Default: 0)
    pub gshr_lit: usize,

    /// Global sharing strategy: 1 all-gather, 2 tree, 3 ring. (Default: 1)
    pub gshr_strat: u32,

    /// Maximum clause size accepted into the global databases.
    /// (Default: 50)
    pub max_cls_size: usize,

    /// Drive all strategies from a single multi-sharer thread.
    /// (Default: false)
    pub one_sharer: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            cpus: 24,
            timeout: 0,
            shr_strat: 0,
            shr_sleep: 500_000,
            shr_lit: 1500,
            dup: false,
            lbd_limit: 2,
            dist: false,
            gshr_lit: 0,
            gshr_strat: 1,
            max_cls_size: 50,
            one_sharer: false,
        }
    }
}

impl Config {
    /// Parse a TOML configuration.
    ///
    /// Absent fields keep their defaults; unknown fields are rejected.
    pub fn from_toml(contents: &str) -> Result<Config, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Load a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Config::from_toml(&contents)
    }

    /// Sharer round period as a duration.
    pub fn sharer_sleep(&self) -> Duration {
        Duration::from_micros(self.shr_sleep)
    }

    /// Effective global literal budget.
    pub fn global_literals_per_round(&self) -> usize {
        if self.gshr_lit > 0 {
            self.gshr_lit
        } else {
            1500 * self.cpus
        }
    }

    /// Wall-clock limit, `None` when unlimited.
    pub fn timeout_duration(&self) -> Option<Duration> {
        if self.timeout > 0 {
            Some(Duration::from_secs(self.timeout as u64))
        } else {
            None
        }
    }
}
