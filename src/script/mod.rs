//! Script result classification pipeline
//!
//! Turns the flat key/value map returned by a collect script into metric
//! observations:
//!
//! - **keys**: split `+++` extra labels off raw keys
//! - **classify**: pick a rule per key (special keys, numeric, boolean, string)
//! - **enums** / **skin**: the static tables and the JSON flag expansion
//! - **emitter**: build observations with `filename` and optional `tag` labels
//! - **pipeline**: run a script end to end and report `script_result`

pub mod classify;
pub mod emitter;
pub mod enums;
pub mod keys;
mod pipeline;
pub mod skin;

pub use classify::{Classification, Classifier, ClassifyError, Rule, StringValuePolicy};
pub use emitter::{ExecutionStatus, MetricEmitter};
pub use keys::{parse_key, ParsedKey};
pub use pipeline::{raw_entries, run_script, RawEntry, Script, ScriptOutcome};
