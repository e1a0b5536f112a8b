//! Static enum tables
//!
//! Categorical values reported by the scripts are turned into ordinals so
//! Prometheus can store them. The tables are constant data; nothing here is
//! allocated per scrape.

/// Ordinal reported for values a table does not know.
pub const UNKNOWN_ORDINAL: f64 = 0.0;

/// Fixed mapping from known string values to ordinals.
#[derive(Debug)]
pub struct EnumTable {
    /// Semantic key the table is registered under
    pub key: &'static str,
    entries: &'static [(&'static str, f64)],
    /// Value used when the input is not in `entries`
    unknown: f64,
}

impl EnumTable {
    pub const fn new(key: &'static str, entries: &'static [(&'static str, f64)]) -> Self {
        EnumTable {
            key,
            entries,
            unknown: UNKNOWN_ORDINAL,
        }
    }

    /// Same as `new`, but names the value reported for unknown input.
    pub const fn with_unknown(
        key: &'static str,
        entries: &'static [(&'static str, f64)],
        unknown: f64,
    ) -> Self {
        EnumTable {
            key,
            entries,
            unknown,
        }
    }

    /// Exact, case-sensitive lookup.
    pub fn get(&self, value: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(name, _)| *name == value)
            .map(|(_, ordinal)| *ordinal)
    }

    /// Lookup falling back to the table's unknown ordinal.
    pub fn resolve(&self, value: &str) -> f64 {
        self.get(value).unwrap_or(self.unknown)
    }

    pub fn unknown(&self) -> f64 {
        self.unknown
    }

    pub fn entries(&self) -> &'static [(&'static str, f64)] {
        self.entries
    }
}

pub static SERVER_STATE: EnumTable = EnumTable::new(
    "bungee:servers:state",
    &[
        ("INVISIBLE", 1.0),
        ("MAP", 2.0),
        ("MAP_EMPTY", 3.0),
        ("MAP_FULL", 4.0),
        ("LOBBY", 5.0),
        ("LOBBY_EMPTY", 6.0),
        ("LOBBY_FULL", 7.0),
        ("STARTING", 8.0),
        ("INGAME", 9.0),
        ("ENDING", 10.0),
    ],
);

pub static LOBBY_VISIBILITY: EnumTable = EnumTable::new(
    "lobby:visibility",
    &[("ALL", 1.0), ("TEAM", 2.0), ("NONE", 3.0)],
);

pub static CHAT_MODE: EnumTable = EnumTable::new(
    "metrics:players:chatmode",
    &[("SHOWN", 1.0), ("COMMANDS_ONLY", 2.0), ("HIDDEN", 3.0)],
);

/// Ordinal reported for a locale the table does not list.
pub const UNKNOWN_LOCALE: f64 = 0.0;

pub static LOCALE: EnumTable = EnumTable::with_unknown(
    "metrics:players:locale",
    &[("en_US", 1.0), ("de_DE", 2.0)],
    UNKNOWN_LOCALE,
);

pub static SERVER_NAME: EnumTable = EnumTable::new(
    "metrics:players:server",
    &[
        ("Lobby", 1.0),
        ("Survival", 2.0),
        ("KFFA-1", 3.0),
        ("Spread-1", 4.0),
        ("Spread-2", 5.0),
        ("Spread-3", 6.0),
    ],
);

pub static CHAT_TARGET: EnumTable = EnumTable::new(
    "players:chat:target",
    &[("NORMAL", 1.0), ("TEAM", 2.0), ("ADMIN", 3.0)],
);

/// Every table, in registration order.
pub static ALL_TABLES: [&EnumTable; 6] = [
    &SERVER_STATE,
    &LOBBY_VISIBILITY,
    &CHAT_MODE,
    &LOCALE,
    &SERVER_NAME,
    &CHAT_TARGET,
];
