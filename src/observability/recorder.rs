//! Observation sinks
//!
//! The pipeline never talks to Prometheus directly. It hands every
//! `MetricObservation` to an `ObservationSink`:
//! `CollectingSink` buffers one script run's observations. Each run gets its own sink, so concurrent scrapes never share
//! an output buffer.

use parking_lot::Mutex;

/// One metric sample produced by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricObservation {
    /// Metric family name, without namespace
    pub name: String,
    pub value: f64,
    /// Ordered label pairs
    pub labels: Vec<(String, String)>,
}

impl MetricObservation {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        MetricObservation {
            name: name.into(),
            value,
            labels: Vec::new(),
        }
    }

    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((name.into(), value.into()));
        self
    }

    /// Value of the first label called `name`.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn label_names(&self) -> Vec<&str> {
        self.labels.iter().map(|(n, _)| n.as_str()).collect()
    }
}

/// Receives observations as the pipeline produces them.
pub trait ObservationSink: Send + Sync {
    fn record(&self, observation: MetricObservation);
}

/// Buffers observations in memory, in the order they were recorded.
#[derive(Default)]
pub struct CollectingSink {
    recorded: Mutex<Vec<MetricObservation>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn get_recorded(&self) -> Vec<MetricObservation> {
        self.recorded.lock().clone()
    }

    /// Observations of one family
    pub fn get_by_name(&self, name: &str) -> Vec<MetricObservation> {
        self.recorded
            .lock()
            .iter()
            .filter(|o| o.name == name)
            .cloned()
            .collect()
    }

    /// Observations of one family whose `label` equals `value`
    pub fn find(&self, name: &str, label: &str, value: &str) -> Vec<MetricObservation> {
        self.recorded
            .lock()
            .iter()
            .filter(|o| o.name == name && o.label(label) == Some(value))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.recorded.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.recorded.lock().is_empty()
    }

    /// Move the buffered observations out, leaving the sink empty
    pub fn take(&self) -> Vec<MetricObservation> {
        std::mem::take(&mut *self.recorded.lock())
    }
}

impl ObservationSink for CollectingSink {
    fn record(&self, observation: MetricObservation) {
        self.recorded.lock().push(observation);
    }
}
