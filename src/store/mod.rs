mod executor;

pub use executor::{
    decode_reply, MemoryExecutor, RedisScriptExecutor, ScriptError, ScriptExecutor, ScriptResult,
};
