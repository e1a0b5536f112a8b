//! Observability
//!
//! - Structured logging via `tracing`, initialised from `LogConfig`
//! - Span helpers for scrapes and script runs
//! - Observation sinks the classification pipeline writes into
//!
//! # Usage
//!
//! ```rust,ignore
//! use script_exporter::config::LogConfig;
//! use script_exporter::observability::{init_tracing, CollectingSink};
//!
//! init_tracing(&LogConfig::default()).expect("Failed to initialize tracing");
//! let sink = CollectingSink::new();
//! ```

pub mod recorder;
pub mod spans;
pub mod tracing_setup;

pub use recorder::{CollectingSink, MetricObservation, ObservationSink};
pub use tracing_setup::{init as init_tracing, LogFormat};
