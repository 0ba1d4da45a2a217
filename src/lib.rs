pub mod analyzers;
pub mod calendar;
pub mod config;
pub mod error;
pub mod loader;
pub mod metrics;
pub mod output;
pub mod pipeline;
