//! Raw key parsing.
//!
//! A script can pack an extra label value into a result key after a `+++`
//! delimiter (`players:online+++Lobby`). The split happens once, when the
//! mapping is received, so the rest of the pipeline only sees `ParsedKey`.

/// Delimiter separating the semantic key from the extra label.
pub const EXTRA_LABEL_DELIMITER: &str = "+++";

/// A result key split into the part that selects a rule and the optional
/// extra label value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey<'a> {
    pub semantic_key: &'a str,
    pub extra_label: &'a str,
}

impl<'a> ParsedKey<'a> {
    pub fn has_extra_label(&self) -> bool {
        !self.extra_label.is_empty()
    }
}

/// Split a raw key on the first `+++`. Keys without the delimiter get an
/// empty extra label.
pub fn parse_key(raw: &str) -> ParsedKey<'_> {
    match raw.split_once(EXTRA_LABEL_DELIMITER) {
        Some((semantic_key, extra_label)) => ParsedKey {
            semantic_key,
            extra_label,
        },
        None => ParsedKey {
            semantic_key: raw,
            extra_label: "",
        },
    }
}
