pub mod cli;
pub mod collector;
pub mod config;
pub mod observability;
pub mod script;
pub mod server;
pub mod store;

pub use collector::ScriptCollector;
pub use config::ExporterConfig;
pub use script::{run_script, Classifier, ExecutionStatus, Script, ScriptOutcome};
pub use store::{RedisScriptExecutor, ScriptError, ScriptExecutor};
