//! One script run: evaluate, classify every entry, emit, report status.

use std::path::Path;
use tracing::{debug, error, trace, warn};

use super::classify::{Classification, Classifier};
use super::emitter::{ExecutionStatus, MetricEmitter};
use super::keys::{parse_key, ParsedKey};
use crate::observability::{spans, ObservationSink};
use crate::store::{ScriptError, ScriptExecutor, ScriptResult};

/// A script and the identifier exported as its `filename` label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    filename: String,
    source: String,
}

impl Script {
    pub fn new(filename: impl Into<String>, source: impl Into<String>) -> Self {
        Script {
            filename: filename.into(),
            source: source.into(),
        }
    }

    /// Read a script from disk. The path as given becomes the filename.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ScriptError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Script::new(path.display().to_string(), source))
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// One entry of a script result, with its key already split.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry<'a> {
    pub key: ParsedKey<'a>,
    pub raw_key: &'a str,
    pub value: &'a str,
}

/// Split every key of `result`, ordered by raw key.
pub fn raw_entries(result: &ScriptResult) -> Vec<RawEntry<'_>> {
    let mut entries: Vec<RawEntry<'_>> = result
        .iter()
        .map(|(raw_key, value)| RawEntry {
            key: parse_key(raw_key),
            raw_key: raw_key.as_str(),
            value: value.as_str(),
        })
        .collect();
    entries.sort_unstable_by(|a, b| a.raw_key.cmp(b.raw_key));
    entries
}

/// Summary of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptOutcome {
    pub status: ExecutionStatus,
    /// Entries returned by the script
    pub entries: usize,
    /// Value and string observations emitted, status excluded
    pub emitted: usize,
    /// Entries dropped because they could not be classified
    pub skipped: usize,
}

impl ScriptOutcome {
    fn new(status: ExecutionStatus) -> Self {
        ScriptOutcome {
            status,
            entries: 0,
            emitted: 0,
            skipped: 0,
        }
    }
}

/// Evaluate `script` and emit its observations into `sink`.
///
/// Exactly one `script_result` observation is emitted per call, always
/// last. An evaluation error is reported as `Failure` and returned; problems
/// with single keys are logged and never fail the run.
pub fn run_script<E, S>(
    executor: &E,
    script: &Script,
    classifier: &Classifier,
    sink: &S,
) -> Result<ScriptOutcome, ScriptError>
where
    E: ScriptExecutor + ?Sized,
    S: ObservationSink + ?Sized,
{
    let span = spans::script_span(script.filename());
    let _guard = span.enter();

    debug!("Evaluating script: {}", script.filename());
    let emitter = MetricEmitter::new(script.filename(), sink);

    let result = match executor.eval(script.source()) {
        Ok(result) => result,
        Err(e) => {
            error!("Script error: {}", e);
            emitter.status(ExecutionStatus::Failure);
            return Err(e);
        }
    };

    if result.is_empty() {
        debug!("Script returned no results");
        emitter.status(ExecutionStatus::EmptyResult);
        return Ok(ScriptOutcome::new(ExecutionStatus::EmptyResult));
    }

    let entries = raw_entries(&result);
    let mut outcome = ScriptOutcome::new(ExecutionStatus::Success);
    outcome.entries = entries.len();

    for entry in &entries {
        match classifier.classify(&entry.key, entry.value) {
            Ok(classification) => {
                outcome.emitted += emit(&emitter, entry, classification);
            }
            Err(e) => {
                if e.degrades_status() {
                    outcome.status = ExecutionStatus::EmptyResult;
                }
                warn!(key = %entry.raw_key, "Skipping key: {}", e);
                outcome.skipped += 1;
            }
        }
    }

    emitter.status(outcome.status);
    debug!(
        status = outcome.status.as_str(),
        entries = outcome.entries,
        emitted = outcome.emitted,
        skipped = outcome.skipped,
        "Script processed"
    );
    Ok(outcome)
}

/// Emit the observations for one classified entry; returns how many.
fn emit<S: ObservationSink + ?Sized>(
    emitter: &MetricEmitter<'_, S>,
    entry: &RawEntry<'_>,
    classification: Classification,
) -> usize {
    let key = &entry.key;
    match classification {
        Classification::Value { value, source } => {
            trace!(key = %key.semantic_key, ?source, value, "value");
            emitter.value(key.semantic_key, value, key.extra_label);
            1
        }
        Classification::Flags(flags) => {
            let mut emitted = 0;
            for flag in flags {
                match flag.value {
                    Ok(value) => {
                        emitter.value(&flag.sub_key(key.semantic_key), value, key.extra_label);
                        emitted += 1;
                    }
                    Err(ref e) => warn!(key = %entry.raw_key, "Skipping skin flag: {}", e),
                }
            }
            emitted
        }
        Classification::Label => {
            emitter.string(key.semantic_key, entry.value, key.extra_label);
            1
        }
        Classification::Suppressed | Classification::Excluded => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::CollectingSink;
    use crate::script::emitter::{SCRIPT_RESULT, SCRIPT_VALUES};
    use crate::store::MemoryExecutor;

    fn script() -> Script {
        Script::new("players.lua", "return {}")
    }

    #[test]
    fn test_raw_entries_are_sorted_and_split() {
        let mut result = ScriptResult::new();
        result.insert("b+++x".to_string(), "1".to_string());
        result.insert("a".to_string(), "2".to_string());

        let entries = raw_entries(&result);
        assert_eq!(entries[0].raw_key, "a");
        assert_eq!(entries[1].key.semantic_key, "b");
        assert_eq!(entries[1].key.extra_label, "x");
    }

    #[test]
    fn test_status_is_emitted_last_and_once() {
        let sink = CollectingSink::new();
        let executor = MemoryExecutor::from_pairs([("a", "1"), ("b", "2")]);

        let outcome = run_script(&executor, &script(), &Classifier::new(), &sink).unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Success);
        assert_eq!(outcome.entries, 2);
        assert_eq!(outcome.emitted, 2);

        let recorded = sink.get_recorded();
        assert_eq!(recorded.len(), 3);
        assert_eq!(recorded[2].name, SCRIPT_RESULT);
        assert_eq!(sink.get_by_name(SCRIPT_RESULT).len(), 1);
        assert_eq!(sink.get_by_name(SCRIPT_VALUES).len(), 2);
    }

    #[test]
    fn test_skipped_keys_do_not_change_status() {
        let sink = CollectingSink::new();
        let executor = MemoryExecutor::from_pairs([
            ("metrics:players:version:name", "snapshot"),
            ("players:online", "5"),
        ]);

        let outcome = run_script(&executor, &script(), &Classifier::new(), &sink).unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Success);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.emitted, 1);
    }

    #[test]
    fn test_partial_skin_emits_valid_flags() {
        let sink = CollectingSink::new();
        let executor = MemoryExecutor::from_pairs([(
            "metrics:players:skin",
            r#"{"cape":true,"jacket":"no","hat":false}"#,
        )]);

        let outcome = run_script(&executor, &script(), &Classifier::new(), &sink).unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Success);
        assert_eq!(outcome.emitted, 2);
        assert_eq!(
            sink.find(SCRIPT_VALUES, "key", "metrics:players:skin++cape")[0].value,
            1.0
        );
        assert!(sink
            .find(SCRIPT_VALUES, "key", "metrics:players:skin++jacket")
            .is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let err = Script::load("/definitely/not/here.lua").unwrap_err();
        assert!(matches!(err, ScriptError::Load { .. }));
    }
}
