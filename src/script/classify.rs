//! Key classification
//!
//! Decides, per semantic key and raw string value, what the pipeline emits.
//! Rules are tried in order and the first match wins:
//!
//! 1. **Special keys** from a static dispatch table (skin expansion, enum
//!    tables, version strings) and the excluded keys/prefixes
//! 2. **Numeric** values that parse as `f64`
//! 3. **Boolean** literals `true` / `false`
//! 4. **String** fallback, exported as a label unless suppressed

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseFloatError;
use std::sync::LazyLock;

use super::enums::{self, EnumTable};
use super::keys::ParsedKey;
use super::skin::{self, SkinError, SkinFlag};

/// Key whose value is a dotted version string (`1.20.4`).
pub const VERSION_KEY: &str = "metrics:players:version:name";

/// Keys starting with one of these never produce an observation.
pub const EXCLUDED_PREFIXES: [&str; 4] = [
    "metrics:players:ip",
    "metrics:players:labymod",
    "moderation",
    "metrics:players:modded",
];

/// Keys that never produce an observation.
pub const EXCLUDED_KEYS: [&str; 2] = ["metrics:players:version:brand", "metrics:players:name"];

/// Special handling for a semantic key.
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    Skin,
    Enum(&'static EnumTable),
    Version,
    Excluded,
}

static EXACT_RULES: LazyLock<AHashMap<&'static str, Rule>> = LazyLock::new(|| {
    let mut rules = AHashMap::new();
    rules.insert(skin::SKIN_KEY, Rule::Skin);
    for table in enums::ALL_TABLES {
        rules.insert(table.key, Rule::Enum(table));
    }
    rules.insert(VERSION_KEY, Rule::Version);
    for key in EXCLUDED_KEYS {
        rules.insert(key, Rule::Excluded);
    }
    rules
});

/// Special rule for `semantic_key`, if any. Exact keys win over prefixes.
pub fn rule_for(semantic_key: &str) -> Option<Rule> {
    if let Some(rule) = EXACT_RULES.get(semantic_key) {
        return Some(*rule);
    }
    EXCLUDED_PREFIXES
        .iter()
        .any(|prefix| semantic_key.starts_with(prefix))
        .then_some(Rule::Excluded)
}

/// What happens to values that are neither numeric nor boolean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StringValuePolicy {
    /// Export as `script_values_as_string` with the value as a label
    #[default]
    Emit,
    /// Drop silently
    Suppress,
}

/// Which rule produced a numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Enum,
    Version,
    Numeric,
    Boolean,
}

/// Outcome of classifying one entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// A single value under the semantic key
    Value { value: f64, source: ValueSource },
    /// Skin flags, one sub-metric each
    Flags(Vec<SkinFlag>),
    /// Non-numeric value exported as a label
    Label,
    /// Non-numeric value dropped by `StringValuePolicy::Suppress`
    Suppressed,
    /// Key is excluded from export
    Excluded,
}

/// Per-key failure. The key is skipped; other keys are unaffected.
#[derive(Debug)]
pub enum ClassifyError {
    Skin(SkinError),
    InvalidNumber {
        value: String,
        source: ParseFloatError,
    },
}

impl ClassifyError {
    /// Whether this failure downgrades the run status to `EmptyResult`.
    pub fn degrades_status(&self) -> bool {
        matches!(self, ClassifyError::Skin(_))
    }
}

impl fmt::Display for ClassifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassifyError::Skin(e) => write!(f, "{}", e),
            ClassifyError::InvalidNumber { value, source } => {
                write!(f, "'{}' is not a number: {}", value, source)
            }
        }
    }
}

impl std::error::Error for ClassifyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClassifyError::Skin(e) => Some(e),
            ClassifyError::InvalidNumber { source, .. } => Some(source),
        }
    }
}

impl From<SkinError> for ClassifyError {
    fn from(e: SkinError) -> Self {
        ClassifyError::Skin(e)
    }
}

/// Applies the dispatch rules with the configured fallbacks.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    string_values: StringValuePolicy,
    strict_numeric_keys: AHashSet<String>,
}

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_string_values(mut self, policy: StringValuePolicy) -> Self {
        self.string_values = policy;
        self
    }

    /// Keys expected to always be numeric; a non-numeric value is logged
    /// at error level before the fallbacks run.
    pub fn with_strict_numeric_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.strict_numeric_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn string_values(&self) -> StringValuePolicy {
        self.string_values
    }

    pub fn classify(
        &self,
        key: &ParsedKey<'_>,
        value: &str,
    ) -> Result<Classification, ClassifyError> {
        if let Some(rule) = rule_for(key.semantic_key) {
            return apply_rule(rule, value);
        }

        match value.parse::<f64>() {
            Ok(v) => {
                return Ok(Classification::Value {
                    value: v,
                    source: ValueSource::Numeric,
                })
            }
            Err(e) if self.strict_numeric_keys.contains(key.semantic_key) => {
                tracing::error!(
                    key = %key.semantic_key,
                    value = %value,
                    "{} failed to parse as float: {}",
                    key.semantic_key,
                    e
                );
            }
            Err(_) => {}
        }

        match value {
            "true" => Ok(Classification::Value {
                value: 1.0,
                source: ValueSource::Boolean,
            }),
            "false" => Ok(Classification::Value {
                value: 0.0,
                source: ValueSource::Boolean,
            }),
            _ => Ok(match self.string_values {
                StringValuePolicy::Emit => Classification::Label,
                StringValuePolicy::Suppress => Classification::Suppressed,
            }),
        }
    }
}

fn apply_rule(rule: Rule, value: &str) -> Result<Classification, ClassifyError> {
    match rule {
        Rule::Skin => Ok(Classification::Flags(skin::expand(value)?)),
        Rule::Enum(table) => Ok(Classification::Value {
            value: table.resolve(value),
            source: ValueSource::Enum,
        }),
        Rule::Version => parse_version(value).map(|v| Classification::Value {
            value: v,
            source: ValueSource::Version,
        }),
        Rule::Excluded => Ok(Classification::Excluded),
    }
}

/// `1.20.4` becomes `1204`.
pub fn parse_version(value: &str) -> Result<f64, ClassifyError> {
    let cleaned = value.replace('.', "");
    cleaned
        .parse::<f64>()
        .map_err(|source| ClassifyError::InvalidNumber {
            value: value.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::keys::parse_key;

    fn classify(key: &str, value: &str) -> Classification {
        Classifier::new().classify(&parse_key(key), value).unwrap()
    }

    fn value_of(c: Classification) -> f64 {
        match c {
            Classification::Value { value, .. } => value,
            other => panic!("expected a value, got {:?}", other),
        }
    }

    #[test]
    fn test_enum_keys() {
        assert_eq!(value_of(classify("bungee:servers:state", "INGAME")), 9.0);
        assert_eq!(value_of(classify("lobby:visibility", "NONE")), 3.0);
        assert_eq!(value_of(classify("metrics:players:chatmode", "HIDDEN")), 3.0);
        assert_eq!(value_of(classify("metrics:players:locale", "de_DE")), 2.0);
        assert_eq!(value_of(classify("metrics:players:server", "KFFA-1")), 3.0);
        assert_eq!(value_of(classify("players:chat:target", "ADMIN")), 3.0);
    }

    #[test]
    fn test_enum_unknown_value_is_zero() {
        assert_eq!(value_of(classify("metrics:players:locale", "fr_FR")), 0.0);
        assert_eq!(value_of(classify("bungee:servers:state", "CRASHED")), 0.0);
        // Enum keys never fall through to numeric parsing
        assert_eq!(value_of(classify("lobby:visibility", "2")), 0.0);
    }

    #[test]
    fn test_enum_key_with_extra_label() {
        let c = classify("metrics:players:server+++uuid-1", "Survival");
        assert_eq!(value_of(c), 2.0);
    }

    #[test]
    fn test_version_key() {
        assert_eq!(value_of(classify(VERSION_KEY, "1.20.4")), 1204.0);
        assert_eq!(value_of(classify(VERSION_KEY, "1.8")), 18.0);

        let err = Classifier::new()
            .classify(&parse_key(VERSION_KEY), "1.20-pre1")
            .unwrap_err();
        assert!(matches!(err, ClassifyError::InvalidNumber { .. }));
        assert!(!err.degrades_status());

        assert!(Classifier::new()
            .classify(&parse_key(VERSION_KEY), "...")
            .is_err());
    }

    #[test]
    fn test_excluded_keys_and_prefixes() {
        for key in [
            "metrics:players:ip",
            "metrics:players:ip:country",
            "metrics:players:labymod:version",
            "moderation:bans",
            "metrics:players:modded",
            "metrics:players:version:brand",
            "metrics:players:name",
        ] {
            assert_eq!(classify(key, "42"), Classification::Excluded, "{}", key);
        }
        // Exact excluded keys do not act as prefixes
        assert_eq!(value_of(classify("metrics:players:name:length", "7")), 7.0);
    }

    #[test]
    fn test_numeric_fallback() {
        let c = classify("foo", "2.5");
        assert_eq!(
            c,
            Classification::Value {
                value: 2.5,
                source: ValueSource::Numeric
            }
        );
        assert_eq!(value_of(classify("foo", "-2")), -2.0);
        assert_eq!(value_of(classify("foo", "1e3")), 1000.0);
    }

    #[test]
    fn test_boolean_fallback() {
        assert_eq!(value_of(classify("foo", "true")), 1.0);
        assert_eq!(value_of(classify("foo", "false")), 0.0);
        // Case-sensitive
        assert_eq!(classify("foo", "TRUE"), Classification::Label);
    }

    #[test]
    fn test_string_fallback_policy() {
        assert_eq!(classify("foo", "hello"), Classification::Label);

        let suppressing = Classifier::new().with_string_values(StringValuePolicy::Suppress);
        assert_eq!(
            suppressing.classify(&parse_key("foo"), "hello").unwrap(),
            Classification::Suppressed
        );
        // Suppression does not affect numbers or booleans
        assert_eq!(
            value_of(suppressing.classify(&parse_key("foo"), "true").unwrap()),
            1.0
        );
    }

    #[test]
    fn test_strict_numeric_key_still_falls_back() {
        let classifier = Classifier::new().with_strict_numeric_keys(["weather:skip"]);
        assert_eq!(
            classifier.classify(&parse_key("weather:skip"), "false").unwrap(),
            Classification::Value {
                value: 0.0,
                source: ValueSource::Boolean
            }
        );
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Run `f` with a subscriber that records error-level events.
    fn capture_errors<T>(f: impl FnOnce() -> T) -> (T, String) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::ERROR)
            .finish();
        let result = tracing::subscriber::with_default(subscriber, f);
        let output = String::from_utf8_lossy(&logs.0.lock()).into_owned();
        (result, output)
    }

    #[test]
    fn test_strict_numeric_key_logs_error() {
        let classifier = Classifier::new().with_strict_numeric_keys(["weather:skip"]);

        let (_, output) =
            capture_errors(|| classifier.classify(&parse_key("weather:skip"), "false"));
        assert!(output.contains("ERROR"), "got: {}", output);
        assert!(output.contains("weather:skip failed to parse as float"));

        let (_, output) = capture_errors(|| classifier.classify(&parse_key("weather:skip"), "4"));
        assert!(output.is_empty(), "numeric values are not logged: {}", output);

        let (_, output) = capture_errors(|| classifier.classify(&parse_key("weather:rain"), "false"));
        assert!(output.is_empty(), "only strict keys are logged: {}", output);
    }

    #[test]
    fn test_skin_key() {
        let c = classify(
            "metrics:players:skin",
            r#"{"cape":true,"jacket":true,"hat":false,"right_pants":true,
                "left_pants":true,"left_sleeve":true,"right_sleeve":false}"#,
        );
        match c {
            Classification::Flags(flags) => assert_eq!(flags.len(), 7),
            other => panic!("expected flags, got {:?}", other),
        }

        let err = Classifier::new()
            .classify(&parse_key("metrics:players:skin"), "not json")
            .unwrap_err();
        assert!(err.degrades_status());
    }

    #[test]
    fn test_rule_lookup() {
        assert!(matches!(rule_for("metrics:players:skin"), Some(Rule::Skin)));
        assert!(matches!(rule_for(VERSION_KEY), Some(Rule::Version)));
        assert!(matches!(
            rule_for("players:chat:target"),
            Some(Rule::Enum(t)) if t.key == "players:chat:target"
        ));
        assert!(rule_for("players:online").is_none());
    }
}
