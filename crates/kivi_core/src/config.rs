//! Store configuration.

/// Configuration for opening a store.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the store directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Maximum size of the active segment before rotation.
    ///
    /// A write that would push the active segment past this size rotates
    /// first. A single record larger than this still fits in a segment of
    /// its own.
    pub max_segment_size: u64,

    /// Whether to fsync the active segment after every put.
    ///
    /// Off by default: writes reach the OS but are not forced to disk.
    pub sync_on_put: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            max_segment_size: 256 * 1024 * 1024, // 256 MB
            sync_on_put: false,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the store directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the maximum active-segment size.
    #[must_use]
    pub const fn max_segment_size(mut self, size: u64) -> Self {
        self.max_segment_size = size;
        self
    }

    /// Sets whether to fsync after every put.
    #[must_use]
    pub const fn sync_on_put(mut self, value: bool) -> Self {
        self.sync_on_put = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.create_if_missing);
        assert!(!config.sync_on_put);
        assert_eq!(config.max_segment_size, 256 * 1024 * 1024);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .create_if_missing(false)
            .max_segment_size(1024)
            .sync_on_put(true);

        assert!(!config.create_if_missing);
        assert!(config.sync_on_put);
        assert_eq!(config.max_segment_size, 1024);
    }
}
