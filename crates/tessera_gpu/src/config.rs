//! Batch configuration

/// Parse a usize from an environment variable
pub(crate) fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
}

/// Staging capacities of a [`crate::SpriteBatch`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpriteBatchConfig {
    /// Maximum vertices per flush
    pub vertex_capacity: usize,
    /// Maximum indices per flush
    pub index_capacity: usize,
    /// Maximum gradient/scissor uniform blocks per flush
    pub block_capacity: usize,
}

impl Default for SpriteBatchConfig {
    fn default() -> Self {
        Self {
            vertex_capacity: 8192,
            index_capacity: 16384,
            block_capacity: 64,
        }
    }
}

impl SpriteBatchConfig {
    /// Defaults with `TESSERA_BATCH_MAX_*` overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_usize("TESSERA_BATCH_MAX_VERTICES") {
            config.vertex_capacity = v;
        }
        if let Some(v) = env_usize("TESSERA_BATCH_MAX_INDICES") {
            config.index_capacity = v;
        }
        if let Some(v) = env_usize("TESSERA_BATCH_MAX_BLOCKS") {
            config.block_capacity = v;
        }
        config
    }

    pub fn with_capacity(vertex_capacity: usize, index_capacity: usize) -> Self {
        Self {
            vertex_capacity,
            index_capacity,
            ..Self::default()
        }
    }

    /// # Panics
    ///
    /// Panics if a capacity cannot hold a single triangle or block.
    pub fn validate(&self) {
        assert!(
            self.vertex_capacity >= 3 && self.index_capacity >= 3,
            "batch capacities must hold at least one triangle"
        );
        assert!(self.block_capacity > 0, "batch needs at least one uniform block");
    }
}

pub(crate) fn log_batch_config(config: &SpriteBatchConfig) {
    tracing::info!(
        "sprite batch config: vertex_capacity={}, index_capacity={}, block_capacity={}",
        config.vertex_capacity,
        config.index_capacity,
        config.block_capacity
    );
}
