//! Tuning knobs for both engines.

use crate::error::{Error, Result};

/// Hard cap on skip-list levels. Enough for 2^64 entries at p = 1/4.
pub const MAX_LEVELS: usize = 64;

/// How many active-table buckets a single rehash step migrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RehashStep {
    /// Migrate at most `n` buckets per triggering operation.
    Fixed(usize),
    /// Finish the whole migration in the first triggering operation.
    Full,
    /// Spread the migration over as many operations as the resize factor
    /// (a 4 -> 16 grow completes in four steps).
    Auto,
}

impl Default for RehashStep {
    fn default() -> Self {
        RehashStep::Fixed(2)
    }
}

/// Configuration for [`HashIndex`](crate::HashIndex).
#[derive(Debug, Clone)]
pub struct HashConfig {
    /// Initial and minimum bucket count. Rounded up to a power of two.
    pub min_buckets: usize,
    /// Grow once `len > buckets * load_factor`.
    pub load_factor: f64,
    /// Shrink once `len < buckets * shrink_factor` (and `len > min_buckets`).
    /// At most half of `load_factor`.
    pub shrink_factor: f64,
    /// Migration step used by triggering operations.
    pub rehash_step: RehashStep,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            min_buckets: 4,
            load_factor: 1.0,
            shrink_factor: 0.1,
            rehash_step: RehashStep::default(),
        }
    }
}

impl HashConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_buckets == 0 {
            return Err(Error::InvalidConfig("min_buckets must be non-zero".into()));
        }
        if !self.load_factor.is_finite() || self.load_factor <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "load_factor must be positive and finite, got {}",
                self.load_factor
            )));
        }
        // A shrunk table must not be immediately due for a grow or another
        // shrink.
        let max_shrink = self.load_factor / 2.0;
        if !(0.0..=max_shrink).contains(&self.shrink_factor) {
            return Err(Error::InvalidConfig(format!(
                "shrink_factor must be in [0, {max_shrink}], got {}",
                self.shrink_factor
            )));
        }
        if self.rehash_step == RehashStep::Fixed(0) {
            return Err(Error::InvalidConfig("rehash step must be non-zero".into()));
        }
        Ok(())
    }
}

/// Configuration for [`OrderedIndex`](crate::OrderedIndex).
#[derive(Debug, Clone)]
pub struct OrderedConfig {
    /// Number of levels a node may participate in, `1..=64`.
    pub max_level: usize,
    /// Each extra level is drawn with probability `1 / level_ratio`.
    ///
    /// - 2: p = 0.5, ~2 links per node
    /// - 4: p = 0.25, ~1.33 links per node
    pub level_ratio: u32,
    /// Seed for level selection. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for OrderedConfig {
    fn default() -> Self {
        Self {
            max_level: MAX_LEVELS,
            level_ratio: 4,
            seed: None,
        }
    }
}

impl OrderedConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_LEVELS).contains(&self.max_level) {
            return Err(Error::InvalidConfig(format!(
                "max_level must be in 1..={MAX_LEVELS}, got {}",
                self.max_level
            )));
        }
        if self.level_ratio < 2 {
            return Err(Error::InvalidConfig(format!(
                "level_ratio must be at least 2, got {}",
                self.level_ratio
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        HashConfig::default().validate().unwrap();
        OrderedConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_bad_hash_config() {
        let bad = [
            HashConfig {
                min_buckets: 0,
                ..HashConfig::default()
            },
            HashConfig {
                load_factor: 0.0,
                ..HashConfig::default()
            },
            HashConfig {
                load_factor: f64::NAN,
                ..HashConfig::default()
            },
            HashConfig {
                shrink_factor: 0.6,
                ..HashConfig::default()
            },
            HashConfig {
                shrink_factor: -0.5,
                ..HashConfig::default()
            },
            HashConfig {
                rehash_step: RehashStep::Fixed(0),
                ..HashConfig::default()
            },
        ];
        for cfg in bad {
            assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))), "{cfg:?}");
        }
    }

    #[test]
    fn test_rejects_bad_ordered_config() {
        let too_tall = OrderedConfig {
            max_level: 65,
            ..OrderedConfig::default()
        };
        assert!(too_tall.validate().is_err());
        let flat = OrderedConfig {
            max_level: 0,
            ..OrderedConfig::default()
        };
        assert!(flat.validate().is_err());
        let ratio = OrderedConfig {
            level_ratio: 1,
            ..OrderedConfig::default()
        };
        assert!(ratio.validate().is_err());
    }
}
