//! Script evaluation against Redis
//!
//! `ScriptExecutor` is the only contract the pipeline needs from the data
//! store: evaluate a script and return a flat string map. The Redis-backed
//! implementation opens a fresh connection per evaluation, so concurrent
//! scrapes never share a connection.

use redis::{Client, ErrorKind, RedisError, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::warn;

/// Flat result mapping returned by a script.
pub type ScriptResult = HashMap<String, String>;

/// Error returned when a script cannot be evaluated
#[derive(Debug)]
pub enum ScriptError {
    /// No connection to the server could be established
    Connect(RedisError),
    /// The server rejected the script or returned a non-map reply
    Eval(RedisError),
    /// The script file could not be read
    Load { path: PathBuf, source: std::io::Error },
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::Connect(e) => write!(f, "Redis connection failed: {}", e),
            ScriptError::Eval(e) => write!(f, "Script evaluation failed: {}", e),
            ScriptError::Load { path, source } => {
                write!(f, "Failed to read script {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ScriptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScriptError::Connect(e) | ScriptError::Eval(e) => Some(e),
            ScriptError::Load { source, .. } => Some(source),
        }
    }
}

/// Evaluates a script and returns its key/value result.
pub trait ScriptExecutor: Send + Sync {
    fn eval(&self, source: &str) -> Result<ScriptResult, ScriptError>;
}

/// Runs scripts with `EVAL <script> 0 0` on a Redis server.
pub struct RedisScriptExecutor {
    client: Client,
    timeout: Duration,
}

impl RedisScriptExecutor {
    /// `url` is a `redis://` or `rediss://` URL, credentials included.
    pub fn open(url: &str, timeout: Duration) -> Result<Self, ScriptError> {
        let client = Client::open(url).map_err(ScriptError::Connect)?;
        Ok(RedisScriptExecutor { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl ScriptExecutor for RedisScriptExecutor {
    fn eval(&self, source: &str) -> Result<ScriptResult, ScriptError> {
        let mut conn = self
            .client
            .get_connection_with_timeout(self.timeout)
            .map_err(ScriptError::Connect)?;
        conn.set_read_timeout(Some(self.timeout))
            .map_err(ScriptError::Connect)?;
        conn.set_write_timeout(Some(self.timeout))
            .map_err(ScriptError::Connect)?;

        let reply = redis::cmd("EVAL")
            .arg(source)
            .arg(0)
            .arg(0)
            .query::<Value>(&mut conn)
            .map_err(ScriptError::Eval)?;
        decode_reply(reply).map_err(ScriptError::Eval)
    }
}

/// Decode an `EVAL` reply into a flat key/value map.
///
/// The reply must be an array of alternating keys and values. A `nil` reply
/// is an error, not an empty result. Invalid UTF-8 is replaced rather than
/// failing the whole reply.
pub fn decode_reply(reply: Value) -> Result<ScriptResult, RedisError> {
    let items = match reply {
        Value::Bulk(items) => items,
        Value::Nil => {
            return Err(RedisError::from((
                ErrorKind::TypeError,
                "Script returned nil",
            )))
        }
        other => {
            return Err(RedisError::from((
                ErrorKind::TypeError,
                "Script reply is not an array",
                format!("{:?}", other),
            )))
        }
    };

    if items.len() % 2 != 0 {
        return Err(RedisError::from((
            ErrorKind::TypeError,
            "Script reply has an odd number of elements",
            format!("{} elements", items.len()),
        )));
    }

    let mut result = ScriptResult::with_capacity(items.len() / 2);
    let mut items = items.into_iter();
    while let (Some(key), Some(value)) = (items.next(), items.next()) {
        result.insert(scalar_to_string(key)?, scalar_to_string(value)?);
    }
    Ok(result)
}

fn scalar_to_string(value: Value) -> Result<String, RedisError> {
    match value {
        Value::Data(bytes) => Ok(String::from_utf8(bytes).unwrap_or_else(|e| {
            warn!("Replacing invalid UTF-8 in script reply: {}", e.utf8_error());
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        })),
        Value::Int(i) => Ok(i.to_string()),
        Value::Status(s) => Ok(s),
        Value::Okay => Ok("OK".to_string()),
        other => Err(RedisError::from((
            ErrorKind::TypeError,
            "Script reply element is not a scalar",
            format!("{:?}", other),
        ))),
    }
}

/// In-memory executor returning a fixed result, for tests and dry runs.
#[derive(Default)]
pub struct MemoryExecutor {
    result: Option<ScriptResult>,
    failure: Option<String>,
    eval_count: AtomicU64,
}

impl MemoryExecutor {
    pub fn new(result: ScriptResult) -> Self {
        MemoryExecutor {
            result: Some(result),
            ..Default::default()
        }
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self::new(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    pub fn empty() -> Self {
        Self::new(ScriptResult::new())
    }

    /// Every evaluation fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        MemoryExecutor {
            failure: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn eval_count(&self) -> u64 {
        self.eval_count.load(Ordering::SeqCst)
    }
}

impl ScriptExecutor for MemoryExecutor {
    fn eval(&self, _source: &str) -> Result<ScriptResult, ScriptError> {
        self.eval_count.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            return Err(ScriptError::Eval(RedisError::from((
                ErrorKind::ResponseError,
                "script failed",
                message.clone(),
            ))));
        }
        Ok(self.result.clone().unwrap_or_default())
    }
}
