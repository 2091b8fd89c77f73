//! Data contracts for structured dump markers emitted into game process logs.
//!
//! A dump marker is a `##Key:payload` fragment appended to an ordinary debug
//! log line. This crate only names the closed set of keys and the token shape;
//! extraction and aggregation live in `dump_runtime`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix that introduces a dump marker inside a log line.
pub const MARKER_PREFIX: &str = "##";

/// Semantic category of a dump marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DumpKey {
    /// Empire identity: `empire_id`, `name`, `turn`.
    EmpireID,
    /// Empire display colour: `empire_id`, `r`, `g`, `b`, optional `a`.
    EmpireColors,
    /// Capital planet of an empire: `empire_id`, `capital_id`.
    CapitalID,
    /// Per-turn output figures for the current empire.
    Output,
}

impl DumpKey {
    pub const ALL: [DumpKey; 4] = [
        DumpKey::EmpireID,
        DumpKey::EmpireColors,
        DumpKey::CapitalID,
        DumpKey::Output,
    ];

    /// Identifier as it appears after `##` in a log line.
    pub const fn as_str(self) -> &'static str {
        match self {
            DumpKey::EmpireID => "EmpireID",
            DumpKey::EmpireColors => "EmpireColors",
            DumpKey::CapitalID => "CapitalID",
            DumpKey::Output => "Output",
        }
    }
}

impl fmt::Display for DumpKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DumpKey {
    type Err = UnknownDumpKey;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        DumpKey::ALL
            .into_iter()
            .find(|key| key.as_str() == name)
            .ok_or_else(|| UnknownDumpKey(name.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDumpKey(pub String);

impl fmt::Display for UnknownDumpKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown dump key '{}'", self.0)
    }
}

impl std::error::Error for UnknownDumpKey {}

/// A recognized dump marker together with its unparsed payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpToken {
    pub key: DumpKey,
    pub payload: String,
}

impl DumpToken {
    pub fn new(key: DumpKey, payload: impl Into<String>) -> Self {
        Self {
            key,
            payload: payload.into(),
        }
    }

    pub fn into_pair(self) -> (DumpKey, String) {
        (self.key, self.payload)
    }
}

impl From<DumpToken> for (DumpKey, String) {
    fn from(token: DumpToken) -> Self {
        token.into_pair()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_names_round_trip_through_from_str() {
        for key in DumpKey::ALL {
            assert_eq!(key.as_str().parse::<DumpKey>(), Ok(key));
        }
    }

    #[test]
    fn key_lookup_is_case_sensitive() {
        assert_eq!(
            "empireid".parse::<DumpKey>(),
            Err(UnknownDumpKey("empireid".to_string()))
        );
        assert!("EmpireId".parse::<DumpKey>().is_err());
        assert!("".parse::<DumpKey>().is_err());
    }

    #[test]
    fn token_serializes_key_by_identifier() {
        let token = DumpToken::new(DumpKey::CapitalID, "empire_id: 1, capital_id: 7");
        let json = serde_json::to_value(&token).unwrap();
        assert_eq!(json["key"], "CapitalID");
        assert_eq!(json["payload"], "empire_id: 1, capital_id: 7");
    }

    #[test]
    fn token_converts_into_pair() {
        let (key, payload): (DumpKey, String) = DumpToken::new(DumpKey::Output, "turn: 3").into();
        assert_eq!(key, DumpKey::Output);
        assert_eq!(payload, "turn: 3");
    }
}
