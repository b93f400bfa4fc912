use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::error::{RagError, Result};

pub type Number = f32;

pub const EPSILON: f32 = 1e-6;

const DEFAULT_DIMENSIONS: usize = 384;
const DEFAULT_CHUNK_SIZE: usize = 500;
const DEFAULT_OVERLAP: usize = 50;
const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMethod {
    #[default]
    Exact,
    Ann,
}

impl FromStr for SearchMethod {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "ann" => Ok(Self::Ann),
            other => Err(RagError::invalid_config(format!(
                "unknown search method: {other}"
            ))),
        }
    }
}

impl fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => f.write_str("exact"),
            Self::Ann => f.write_str("ann"),
        }
    }
}

/// Raw values as read from `ragcore_config.*` and `RAGCORE_*` variables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RagConfig {
    pub dimensions: Option<usize>,
    pub chunk_size: Option<usize>,
    pub overlap: Option<usize>,
    pub top_k: Option<usize>,
    pub search_method: Option<String>,
    pub ann_num_projections: Option<usize>,
    pub ann_num_tables: Option<usize>,
    pub verbose: Option<bool>,
}

impl RagConfig {
    pub fn try_from(config: &Config) -> std::result::Result<Self, ConfigError> {
        Ok(RagConfig {
            dimensions: config.get("dimensions").ok(),
            chunk_size: config.get("chunk_size").ok(),
            overlap: config.get("overlap").ok(),
            top_k: config.get("top_k").ok(),
            search_method: config.get("search_method").ok(),
            ann_num_projections: config.get("ann_num_projections").ok(),
            ann_num_tables: config.get("ann_num_tables").ok(),
            verbose: config.get("verbose").ok(),
        })
    }

    pub fn load() -> std::result::Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(ConfigFile::with_name("ragcore_config").required(false))
            .add_source(Environment::with_prefix("RAGCORE"))
            .build()?;
        Self::try_from(&config)
    }

    /// Layer `overrides` on top: every value it sets wins. Nothing is
    /// validated until the merged result reaches [`State::from_config`].
    pub fn merge(self, overrides: RagConfig) -> RagConfig {
        RagConfig {
            dimensions: overrides.dimensions.or(self.dimensions),
            chunk_size: overrides.chunk_size.or(self.chunk_size),
            overlap: overrides.overlap.or(self.overlap),
            top_k: overrides.top_k.or(self.top_k),
            search_method: overrides.search_method.or(self.search_method),
            ann_num_projections: overrides.ann_num_projections.or(self.ann_num_projections),
            ann_num_tables: overrides.ann_num_tables.or(self.ann_num_tables),
            verbose: overrides.verbose.or(self.verbose),
        }
    }
}

/// Validated settings shared by the CLI and the retrieval pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    pub dimensions: usize,
    pub chunk_size: usize,
    pub overlap: usize,
    pub top_k: usize,
    pub search_method: SearchMethod,
    /// `None` lets the ANN index size its hash from the data.
    pub ann_num_projections: Option<usize>,
    pub ann_num_tables: Option<usize>,
    pub verbose: bool,
}

impl Default for State {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
            top_k: DEFAULT_TOP_K,
            search_method: SearchMethod::Exact,
            ann_num_projections: None,
            ann_num_tables: None,
            verbose: false,
        }
    }
}

impl State {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_overrides(RagConfig::default())
    }

    /// Load file and environment values, apply `overrides`, then validate the
    /// combined settings once.
    pub fn with_overrides(overrides: RagConfig) -> anyhow::Result<Self> {
        let raw = RagConfig::load()?.merge(overrides);
        Ok(Self::from_config(raw)?)
    }

    pub fn from_config(raw: RagConfig) -> Result<Self> {
        let defaults = Self::default();
        let search_method = match raw.search_method {
            Some(method) => method.parse()?,
            None => defaults.search_method,
        };

        let state = Self {
            dimensions: raw.dimensions.unwrap_or(defaults.dimensions),
            chunk_size: raw.chunk_size.unwrap_or(defaults.chunk_size),
            overlap: raw.overlap.unwrap_or(defaults.overlap),
            top_k: raw.top_k.unwrap_or(defaults.top_k),
            search_method,
            ann_num_projections: raw.ann_num_projections,
            ann_num_tables: raw.ann_num_tables,
            verbose: raw.verbose.unwrap_or(defaults.verbose),
        };
        state.validate()?;
        Ok(state)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimensions == 0 {
            return Err(RagError::invalid_config("dimensions must be positive"));
        }
        if self.chunk_size == 0 || self.overlap >= self.chunk_size {
            return Err(RagError::invalid_config(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        if matches!(self.ann_num_projections, Some(n) if n == 0 || n > 64) {
            return Err(RagError::invalid_config(
                "ann_num_projections must be between 1 and 64",
            ));
        }
        if self.ann_num_tables == Some(0) {
            return Err(RagError::invalid_config("ann_num_tables must be positive"));
        }
        Ok(())
    }

    pub fn print_config(&self) {
        println!("dimensions={}", self.dimensions);
        println!("chunk_size={}", self.chunk_size);
        println!("overlap={}", self.overlap);
        println!("top_k={}", self.top_k);
        println!("search_method={}", self.search_method);
        match self.ann_num_projections {
            Some(n) => println!("ann_num_projections={n}"),
            None => println!("ann_num_projections=auto"),
        }
        match self.ann_num_tables {
            Some(n) => println!("ann_num_tables={n}"),
            None => println!("ann_num_tables=auto"),
        }
        println!("verbose={}", self.verbose);
    }
}
