//! Span helpers for scrapes and script runs

use tracing::{span, Level, Span};

/// Span covering one collect of the exporter
#[inline]
pub fn scrape_span(scripts: usize) -> Span {
    span!(Level::DEBUG, "exporter.scrape", scripts = scripts)
}

/// Span covering one script evaluation and its classification
#[inline]
pub fn script_span(filename: &str) -> Span {
    span!(Level::INFO, "script.eval", filename = %filename)
}

/// Span covering one HTTP exposition request
#[inline]
pub fn exposition_span(path: &str) -> Span {
    span!(Level::DEBUG, "http.exposition", http.path = %path)
}
