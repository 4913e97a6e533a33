//! Configuration for the point scheduler and driver.

use serde::{Deserialize, Serialize};

use crate::types::OutOfBoundsPolicy;

/// Execution mode forced by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForcedMode {
    /// Load all points and run one day loop.
    Memory,
    /// Sequential partitions.
    Partitioned,
    /// Partitions fanned out to the worker pool.
    Parallel,
}

impl ForcedMode {
    /// Parse from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "in-memory" | "in_memory" => Some(Self::Memory),
            "partitioned" | "sequential" => Some(Self::Partitioned),
            "parallel" => Some(Self::Parallel),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Partitioned => "partitioned",
            Self::Parallel => "parallel",
        }
    }
}

impl std::fmt::Display for ForcedMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration for the adaptive point scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Point count at or above which in-memory mode is never chosen.
    pub max_in_memory_points: usize,

    /// Maximum points per partition.
    pub partition_size: usize,

    /// Free memory must exceed this multiple of the input size for in-memory mode.
    pub memory_factor: u64,

    /// Assumed inflation of a compressed point file once decompressed.
    pub compression_factor: u64,

    /// Worker threads for parallel mode.
    pub workers: usize,

    /// In-flight partitions per worker before the producer blocks.
    pub queue_factor: usize,

    /// Memory budget for the daily layer cache in megabytes (0 disables).
    pub layer_cache_mb: usize,

    /// Skip automatic mode selection.
    pub forced_mode: Option<ForcedMode>,

    /// Handling of points outside the raster.
    pub out_of_bounds: OutOfBoundsPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_in_memory_points: 1_000_000,
            partition_size: 50_000,
            memory_factor: 3,
            compression_factor: 15,
            workers: num_cpus::get(),
            queue_factor: 2,
            layer_cache_mb: 1024,
            forced_mode: None,
            out_of_bounds: OutOfBoundsPolicy::Fail,
        }
    }
}

impl SchedulerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_parse("GRIDMET_MAX_IN_MEMORY_POINTS") {
            config.max_in_memory_points = v;
        }

        if let Some(v) = env_parse("GRIDMET_PARTITION_SIZE") {
            config.partition_size = v;
        }

        if let Some(v) = env_parse("GRIDMET_MEMORY_FACTOR") {
            config.memory_factor = v;
        }

        if let Some(v) = env_parse("GRIDMET_COMPRESSION_FACTOR") {
            config.compression_factor = v;
        }

        if let Some(v) = env_parse("GRIDMET_WORKERS") {
            config.workers = v;
        }

        if let Some(v) = env_parse("GRIDMET_QUEUE_FACTOR") {
            config.queue_factor = v;
        }

        if let Some(v) = env_parse("GRIDMET_LAYER_CACHE_MB") {
            config.layer_cache_mb = v;
        }

        if let Ok(val) = std::env::var("GRIDMET_FORCE_MODE") {
            config.forced_mode = ForcedMode::parse(&val);
        }

        if let Ok(val) = std::env::var("GRIDMET_OUT_OF_BOUNDS") {
            if let Ok(policy) = val.parse() {
                config.out_of_bounds = policy;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.partition_size == 0 {
            return Err("partition_size must be > 0".to_string());
        }

        if self.workers == 0 {
            return Err("workers must be > 0".to_string());
        }

        if self.queue_factor == 0 {
            return Err("queue_factor must be > 0".to_string());
        }

        if self.memory_factor == 0 || self.compression_factor == 0 {
            return Err("memory_factor and compression_factor must be > 0".to_string());
        }

        Ok(())
    }

    /// Partitions allowed in flight before the producer blocks, for a
    /// pool of `workers` threads.
    pub fn max_in_flight(&self, workers: usize) -> usize {
        (self.queue_factor * workers).max(1)
    }

    /// Get the layer cache size in bytes.
    pub fn layer_cache_bytes(&self) -> usize {
        self.layer_cache_mb * 1024 * 1024
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.max_in_memory_points, 1_000_000);
        assert_eq!(config.partition_size, 50_000);
        assert_eq!(config.memory_factor, 3);
        assert_eq!(config.compression_factor, 15);
        assert!(config.workers >= 1);
        assert_eq!(config.max_in_flight(config.workers), 2 * config.workers);
        assert_eq!(config.max_in_flight(0), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero() {
        let config = SchedulerConfig {
            partition_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SchedulerConfig {
            workers: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_forced_mode_parse() {
        assert_eq!(ForcedMode::parse("Memory"), Some(ForcedMode::Memory));
        assert_eq!(ForcedMode::parse("parallel"), Some(ForcedMode::Parallel));
        assert_eq!(ForcedMode::parse("bogus"), None);
    }
}
