//! World configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::WorldError;

#[derive(Debug, Clone, Deserialize)]
pub struct WorldConfig {
    /// Directory holding one file per chunk.
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// `"empty"` or `"flat"`.
    #[serde(default = "default_generator")]
    pub generator: String,
    /// Layers for the flat generator, one block name per world Y.
    #[serde(default)]
    pub flat_layers: Vec<FlatLayer>,
    /// Horizontal radius of the resident window, in chunks.
    #[serde(default = "default_load_radius")]
    pub load_radius: i32,
    /// Lowest chunk Y kept resident.
    #[serde(default)]
    pub min_chunk_y: i32,
    /// One past the highest chunk Y kept resident.
    #[serde(default = "default_max_chunk_y")]
    pub max_chunk_y: i32,
    #[serde(default = "default_per_step")]
    pub loads_per_step: usize,
    #[serde(default = "default_per_step")]
    pub evictions_per_step: usize,
    /// How long an evicted chunk stays rescuable.
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
    /// A chunk saved more recently than this is not saved again yet.
    #[serde(default = "default_min_dirty_age_ms")]
    pub min_dirty_age_ms: u64,
    /// Positions processed per queue per flush.
    #[serde(default = "default_update_budget")]
    pub update_budget: usize,
    #[serde(default = "default_worker_interval_ms")]
    pub worker_interval_ms: u64,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FlatLayer {
    pub y: i32,
    pub block: String,
}

fn default_directory() -> PathBuf {
    "world".into()
}

fn default_generator() -> String {
    "empty".into()
}

fn default_load_radius() -> i32 {
    5
}

fn default_max_chunk_y() -> i32 {
    16
}

fn default_per_step() -> usize {
    1
}

fn default_grace_period_ms() -> u64 {
    1000
}

fn default_min_dirty_age_ms() -> u64 {
    5000
}

fn default_update_budget() -> usize {
    100_000
}

fn default_worker_interval_ms() -> u64 {
    10
}

fn default_tick_interval_ms() -> u64 {
    50
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            generator: default_generator(),
            flat_layers: Vec::new(),
            load_radius: default_load_radius(),
            min_chunk_y: 0,
            max_chunk_y: default_max_chunk_y(),
            loads_per_step: default_per_step(),
            evictions_per_step: default_per_step(),
            grace_period_ms: default_grace_period_ms(),
            min_dirty_age_ms: default_min_dirty_age_ms(),
            update_budget: default_update_budget(),
            worker_interval_ms: default_worker_interval_ms(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl WorldConfig {
    /// Defaults with the chunk directory replaced.
    pub fn with_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn min_dirty_age(&self) -> Duration {
        Duration::from_millis(self.min_dirty_age_ms)
    }

    pub fn worker_interval(&self) -> Duration {
        Duration::from_millis(self.worker_interval_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> Result<(), WorldError> {
        if self.load_radius < 0 {
            return Err(WorldError::Config(format!(
                "load_radius must not be negative, got {}",
                self.load_radius
            )));
        }
        if self.min_chunk_y >= self.max_chunk_y {
            return Err(WorldError::Config(format!(
                "empty vertical range [{}, {})",
                self.min_chunk_y, self.max_chunk_y
            )));
        }
        if self.update_budget == 0 {
            return Err(WorldError::Config("update_budget must be positive".into()));
        }
        match self.generator.as_str() {
            "empty" | "flat" => Ok(()),
            other => Err(WorldError::Config(format!("unknown generator {other:?}"))),
        }
    }
}
