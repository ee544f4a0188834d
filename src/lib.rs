pub mod config;
pub mod errors;
pub mod features;
pub mod grid_search;
pub mod holidays;
pub mod io;
pub mod loader;
pub mod merge;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod preprocessing;
pub mod records;
pub mod split;
pub mod submission;
pub mod weather;

pub use config::PipelineConfig;
pub use errors::{ConfigError, PipelineError};
pub use pipeline::{BikeCountPipeline, RunReport};

#[cfg(test)]
mod tests;
