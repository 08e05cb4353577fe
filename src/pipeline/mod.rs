mod config;
pub use config::PipelineConfig;
mod executor;
pub use executor::{LayerRunStats, Pipeline};
mod state;
pub use state::{BufferRole, PipelinePhase};
mod stats;
pub use stats::print_pipeline_stats;
