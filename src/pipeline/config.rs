use crate::ops::conv2d::{TilePolicy, Traversal};
use crate::utils::error::FxnnError;

/// Controller configuration, validated by `build` before a pipeline accepts
/// it.
#[derive(Clone, Copy, Debug)]
pub struct PipelineConfig {
    /// Scratch elements available for staging one weight tile.
    pub weight_capacity: usize,
    pub tiling: TilePolicy,
    pub traversal: Traversal,
    /// Run the fire expand branches on scoped threads.
    pub parallel_expand: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            weight_capacity: 8192,
            tiling: TilePolicy::Bounded,
            traversal: Traversal::ChannelMajor,
            parallel_expand: true,
        }
    }
}

impl PipelineConfig {
    pub fn build(self) -> Result<Self, FxnnError> {
        if self.tiling == TilePolicy::Bounded && self.weight_capacity == 0 {
            return Err(FxnnError::Configuration(
                "bounded tiling needs a non-zero weight capacity".to_string(),
            ));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds() {
        let config = PipelineConfig::default().build().unwrap();
        assert_eq!(config.weight_capacity, 8192);
        assert_eq!(config.tiling, TilePolicy::Bounded);
        assert!(config.parallel_expand);
    }

    #[test]
    fn zero_capacity_needs_single_pass() {
        let bounded = PipelineConfig {
            weight_capacity: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            bounded.build(),
            Err(FxnnError::Configuration(_))
        ));

        let single = PipelineConfig {
            weight_capacity: 0,
            tiling: TilePolicy::SinglePass,
            ..PipelineConfig::default()
        };
        assert!(single.build().is_ok());
    }
}
