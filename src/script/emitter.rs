use crate::observability::{MetricObservation, ObservationSink};

/// Family for numeric, boolean and enum values.
pub const SCRIPT_VALUES: &str = "script_values";
/// Family for values that are neither numeric nor boolean.
pub const SCRIPT_VALUES_AS_STRING: &str = "script_values_as_string";
/// Family reporting how a script run ended.
pub const SCRIPT_RESULT: &str = "script_result";

pub const KEY_LABEL: &str = "key";
pub const FILENAME_LABEL: &str = "filename";
pub const VALUE_LABEL: &str = "value";
pub const TAG_LABEL: &str = "tag";

/// How a script run ended, as reported by `script_result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Failure,
    Success,
    EmptyResult,
}

impl ExecutionStatus {
    pub fn as_f64(self) -> f64 {
        match self {
            ExecutionStatus::Failure => 0.0,
            ExecutionStatus::Success => 1.0,
            ExecutionStatus::EmptyResult => 2.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Failure => "failure",
            ExecutionStatus::Success => "success",
            ExecutionStatus::EmptyResult => "empty_result",
        }
    }
}

/// Builds observations for one script and hands them to a sink.
///
/// Every observation carries the script's `filename` label. The `tag` label
/// is appended only when the key carried a non-empty extra label, so no
/// series is exported with an empty label value.
pub struct MetricEmitter<'a, S: ObservationSink + ?Sized> {
    filename: &'a str,
    sink: &'a S,
}

impl<'a, S: ObservationSink + ?Sized> MetricEmitter<'a, S> {
    pub fn new(filename: &'a str, sink: &'a S) -> Self {
        MetricEmitter { filename, sink }
    }

    pub fn value(&self, key: &str, value: f64, extra_label: &str) {
        let observation = MetricObservation::new(SCRIPT_VALUES, value)
            .with_label(KEY_LABEL, key)
            .with_label(FILENAME_LABEL, self.filename);
        self.sink.record(with_tag(observation, extra_label));
    }

    pub fn string(&self, key: &str, value: &str, extra_label: &str) {
        let observation = MetricObservation::new(SCRIPT_VALUES_AS_STRING, 1.0)
            .with_label(KEY_LABEL, key)
            .with_label(FILENAME_LABEL, self.filename)
            .with_label(VALUE_LABEL, value);
        self.sink.record(with_tag(observation, extra_label));
    }

    pub fn status(&self, status: ExecutionStatus) {
        self.sink.record(
            MetricObservation::new(SCRIPT_RESULT, status.as_f64())
                .with_label(FILENAME_LABEL, self.filename),
        );
    }
}

fn with_tag(observation: MetricObservation, extra_label: &str) -> MetricObservation {
    if extra_label.is_empty() {
        observation
    } else {
        observation.with_label(TAG_LABEL, extra_label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::CollectingSink;

    #[test]
    fn test_value_without_extra_label() {
        let sink = CollectingSink::new();
        MetricEmitter::new("players.lua", &sink).value("players:online", 12.0, "");

        let recorded = sink.get_recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].name, SCRIPT_VALUES);
        assert_eq!(recorded[0].value, 12.0);
        assert_eq!(recorded[0].label_names(), vec![KEY_LABEL, FILENAME_LABEL]);
        assert_eq!(recorded[0].label(FILENAME_LABEL), Some("players.lua"));
    }

    #[test]
    fn test_value_with_extra_label() {
        let sink = CollectingSink::new();
        MetricEmitter::new("players.lua", &sink).value("players:online", 3.0, "Lobby");

        let recorded = sink.get_recorded();
        assert_eq!(
            recorded[0].label_names(),
            vec![KEY_LABEL, FILENAME_LABEL, TAG_LABEL]
        );
        assert_eq!(recorded[0].label(TAG_LABEL), Some("Lobby"));
    }

    #[test]
    fn test_string_observation() {
        let sink = CollectingSink::new();
        MetricEmitter::new("s.lua", &sink).string("motd", "hello", "");

        let recorded = sink.get_by_name(SCRIPT_VALUES_AS_STRING);
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].value, 1.0);
        assert_eq!(recorded[0].label(VALUE_LABEL), Some("hello"));
    }

    #[test]
    fn test_status_values() {
        let sink = CollectingSink::new();
        let emitter = MetricEmitter::new("s.lua", &sink);
        emitter.status(ExecutionStatus::Failure);
        emitter.status(ExecutionStatus::Success);
        emitter.status(ExecutionStatus::EmptyResult);

        let values: Vec<f64> = sink.get_by_name(SCRIPT_RESULT).iter().map(|o| o.value).collect();
        assert_eq!(values, vec![0.0, 1.0, 2.0]);
    }
}
