//! Per-empire aggregation of dump tokens into chartable series.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::payload::{PayloadError, PayloadFields};
use crate::{DumpKey, DumpToken};

const FIELD_EMPIRE_ID: &str = "empire_id";
const FIELD_TURN: &str = "turn";

pub type EmpireId = i32;

#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("invalid {key} payload: {source}")]
    Payload {
        key: DumpKey,
        #[source]
        source: PayloadError,
    },
    #[error("{key} refers to unknown empire {empire_id}")]
    UnknownEmpire { key: DumpKey, empire_id: EmpireId },
    #[error("output dump before any empire was identified")]
    NoCurrentEmpire,
    #[error("colour component {field}={value} is out of range")]
    ColorOutOfRange { field: &'static str, value: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmpireColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmpireRecord {
    pub empire_id: EmpireId,
    pub name: String,
    pub first_turn: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<EmpireColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capital_id: Option<i32>,
    /// metric name -> turn -> value
    #[serde(default)]
    pub series: BTreeMap<String, BTreeMap<u32, f64>>,
}

impl EmpireRecord {
    fn new(empire_id: EmpireId, name: String, first_turn: u32) -> Self {
        Self {
            empire_id,
            name,
            first_turn,
            color: None,
            capital_id: None,
            series: BTreeMap::new(),
        }
    }

    fn merge_from(&mut self, other: EmpireRecord) {
        self.name = other.name;
        self.first_turn = self.first_turn.min(other.first_turn);
        if other.color.is_some() {
            self.color = other.color;
        }
        if other.capital_id.is_some() {
            self.capital_id = other.capital_id;
        }
        for (metric, points) in other.series {
            self.series.entry(metric).or_default().extend(points);
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub accepted: usize,
    pub rejected: usize,
}

/// Empire records keyed by id, plus the stream cursor used to attribute
/// `Output` dumps that omit their empire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DumpLedger {
    empires: BTreeMap<EmpireId, EmpireRecord>,
    #[serde(skip)]
    current_empire: Option<EmpireId>,
}

impl DumpLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&mut self, token: &DumpToken) -> Result<(), LedgerError> {
        let with_key = |source| LedgerError::Payload {
            key: token.key,
            source,
        };
        let fields = PayloadFields::parse(&token.payload).map_err(with_key)?;

        match token.key {
            DumpKey::EmpireID => {
                let empire_id = fields.get_i32(FIELD_EMPIRE_ID).map_err(with_key)?;
                let name = fields.get("name").map_err(with_key)?.to_string();
                let turn = fields.get_u32(FIELD_TURN).map_err(with_key)?;
                self.empires
                    .entry(empire_id)
                    .and_modify(|record| {
                        record.name.clone_from(&name);
                        record.first_turn = record.first_turn.min(turn);
                    })
                    .or_insert_with(|| EmpireRecord::new(empire_id, name, turn));
                self.current_empire = Some(empire_id);
            }
            DumpKey::EmpireColors => {
                let empire_id = fields.get_i32(FIELD_EMPIRE_ID).map_err(with_key)?;
                let color = EmpireColor {
                    r: color_component(&fields, "r", None)?,
                    g: color_component(&fields, "g", None)?,
                    b: color_component(&fields, "b", None)?,
                    a: color_component(&fields, "a", Some(u8::MAX))?,
                };
                self.record_mut(token.key, empire_id)?.color = Some(color);
            }
            DumpKey::CapitalID => {
                let empire_id = fields.get_i32(FIELD_EMPIRE_ID).map_err(with_key)?;
                let capital_id = fields.get_i32("capital_id").map_err(with_key)?;
                self.record_mut(token.key, empire_id)?.capital_id = Some(capital_id);
            }
            DumpKey::Output => {
                let turn = fields.get_u32(FIELD_TURN).map_err(with_key)?;
                let empire_id = match fields.opt_i32(FIELD_EMPIRE_ID).map_err(with_key)? {
                    Some(id) => id,
                    None => self.current_empire.ok_or(LedgerError::NoCurrentEmpire)?,
                };
                let record = self.record_mut(token.key, empire_id)?;
                for (metric, raw) in fields.iter() {
                    if metric == FIELD_TURN || metric == FIELD_EMPIRE_ID {
                        continue;
                    }
                    // NaN and infinities cannot survive a JSON export.
                    match raw.parse::<f64>() {
                        Ok(value) if value.is_finite() => {
                            record
                                .series
                                .entry(metric.to_string())
                                .or_default()
                                .insert(turn, value);
                        }
                        _ => {
                            debug!(
                                target: "empire_dump::ledger",
                                metric,
                                value = raw,
                                "output.non_numeric_skipped"
                            );
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Ingests every token, logging and counting the ones that are rejected.
    pub fn ingest_all<'a, I>(&mut self, tokens: I) -> IngestReport
    where
        I: IntoIterator<Item = &'a DumpToken>,
    {
        let mut report = IngestReport::default();
        for token in tokens {
            match self.ingest(token) {
                Ok(()) => report.accepted += 1,
                Err(err) => {
                    warn!(
                        target: "empire_dump::ledger",
                        key = %token.key,
                        error = %err,
                        "ledger.token_rejected"
                    );
                    report.rejected += 1;
                }
            }
        }
        report
    }

    /// Folds another ledger into this one; `other` wins on conflicting points.
    pub fn merge(&mut self, other: DumpLedger) {
        for (empire_id, record) in other.empires {
            match self.empires.get_mut(&empire_id) {
                Some(existing) => existing.merge_from(record),
                None => {
                    self.empires.insert(empire_id, record);
                }
            }
        }
    }

    /// Drops every metric not named in `metrics`; an empty list keeps all.
    pub fn retain_metrics(&mut self, metrics: &[String]) {
        if metrics.is_empty() {
            return;
        }
        for record in self.empires.values_mut() {
            record.series.retain(|metric, _| metrics.contains(metric));
        }
    }

    pub fn empire(&self, empire_id: EmpireId) -> Option<&EmpireRecord> {
        self.empires.get(&empire_id)
    }

    pub fn empires(&self) -> impl Iterator<Item = &EmpireRecord> {
        self.empires.values()
    }

    pub fn current_empire(&self) -> Option<EmpireId> {
        self.current_empire
    }

    pub fn metrics(&self, empire_id: EmpireId) -> Vec<&str> {
        self.empires
            .get(&empire_id)
            .map(|record| record.series.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// `(turn, value)` points for one metric, ordered by turn.
    pub fn series(&self, empire_id: EmpireId, metric: &str) -> Vec<(u32, f64)> {
        self.empires
            .get(&empire_id)
            .and_then(|record| record.series.get(metric))
            .map(|points| points.iter().map(|(turn, value)| (*turn, *value)).collect())
            .unwrap_or_default()
    }

    pub fn last_turn(&self) -> Option<u32> {
        self.empires
            .values()
            .flat_map(|record| {
                record
                    .series
                    .values()
                    .filter_map(|points| points.keys().next_back().copied())
                    .chain(std::iter::once(record.first_turn))
            })
            .max()
    }

    fn record_mut(
        &mut self,
        key: DumpKey,
        empire_id: EmpireId,
    ) -> Result<&mut EmpireRecord, LedgerError> {
        self.empires
            .get_mut(&empire_id)
            .ok_or(LedgerError::UnknownEmpire { key, empire_id })
    }
}

fn color_component(
    fields: &PayloadFields,
    field: &'static str,
    default: Option<u8>,
) -> Result<u8, LedgerError> {
    let value = match default {
        Some(fallback) => fields.opt_u32(field).map(|v| v.unwrap_or(u32::from(fallback))),
        None => fields.get_u32(field),
    }
    .map_err(|source| LedgerError::Payload {
        key: DumpKey::EmpireColors,
        source,
    })?;
    u8::try_from(value).map_err(|_| LedgerError::ColorOutOfRange { field, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(key: DumpKey, payload: &str) -> DumpToken {
        DumpToken::new(key, payload)
    }

    fn seeded() -> DumpLedger {
        let mut ledger = DumpLedger::new();
        ledger
            .ingest(&token(
                DumpKey::EmpireID,
                "empire_id: 2, name: Binding_2_pid_2_AI_1_RIdx_4_Aggressive, turn: 1",
            ))
            .unwrap();
        ledger
    }

    #[test]
    fn empire_dump_registers_and_selects_empire() {
        let ledger = seeded();
        let record = ledger.empire(2).unwrap();
        assert_eq!(record.name, "Binding_2_pid_2_AI_1_RIdx_4_Aggressive");
        assert_eq!(record.first_turn, 1);
        assert_eq!(ledger.current_empire(), Some(2));
    }

    #[test]
    fn output_is_attributed_to_current_empire_and_sorted() {
        let mut ledger = seeded();
        ledger
            .ingest(&token(DumpKey::Output, "turn: 3, PP: 7.5, RP: 2"))
            .unwrap();
        ledger
            .ingest(&token(DumpKey::Output, "turn: 2, PP: 6.0, RP: 1.5"))
            .unwrap();
        assert_eq!(ledger.series(2, "PP"), vec![(2, 6.0), (3, 7.5)]);
        assert_eq!(ledger.metrics(2), vec!["PP", "RP"]);
        assert_eq!(ledger.last_turn(), Some(3));
    }

    #[test]
    fn output_with_explicit_empire_overrides_cursor() {
        let mut ledger = seeded();
        ledger
            .ingest(&token(DumpKey::EmpireID, "empire_id: 5, name: Other, turn: 1"))
            .unwrap();
        ledger
            .ingest(&token(DumpKey::Output, "empire_id: 2, turn: 4, PP: 1"))
            .unwrap();
        assert_eq!(ledger.series(2, "PP"), vec![(4, 1.0)]);
        assert!(ledger.series(5, "PP").is_empty());
    }

    #[test]
    fn non_numeric_output_fields_are_skipped() {
        let mut ledger = seeded();
        ledger
            .ingest(&token(DumpKey::Output, "turn: 1, PP: 2, status: at_war"))
            .unwrap();
        assert_eq!(ledger.metrics(2), vec!["PP"]);
    }

    #[test]
    fn non_finite_output_values_are_skipped() {
        let mut ledger = seeded();
        ledger
            .ingest(&token(
                DumpKey::Output,
                "turn: 2, PP: NaN, RP: inf, FLEET: -infinity, SHIP_CONT: 1",
            ))
            .unwrap();
        assert_eq!(ledger.metrics(2), vec!["SHIP_CONT"]);

        let json = serde_json::to_string(&ledger).unwrap();
        let restored: DumpLedger = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.series(2, "SHIP_CONT"), vec![(2, 1.0)]);
    }

    #[test]
    fn output_before_empire_is_rejected() {
        let mut ledger = DumpLedger::new();
        assert_eq!(
            ledger.ingest(&token(DumpKey::Output, "turn: 1, PP: 2")),
            Err(LedgerError::NoCurrentEmpire)
        );
    }

    #[test]
    fn colors_and_capital_require_known_empire() {
        let mut ledger = seeded();
        ledger
            .ingest(&token(DumpKey::EmpireColors, "empire_id: 2, r: 10, g: 20, b: 30"))
            .unwrap();
        ledger
            .ingest(&token(DumpKey::CapitalID, "empire_id: 2, capital_id: 118"))
            .unwrap();
        let record = ledger.empire(2).unwrap();
        assert_eq!(
            record.color,
            Some(EmpireColor {
                r: 10,
                g: 20,
                b: 30,
                a: 255
            })
        );
        assert_eq!(record.capital_id, Some(118));

        assert_eq!(
            ledger.ingest(&token(DumpKey::CapitalID, "empire_id: 9, capital_id: 1")),
            Err(LedgerError::UnknownEmpire {
                key: DumpKey::CapitalID,
                empire_id: 9
            })
        );
        assert_eq!(
            ledger.ingest(&token(DumpKey::EmpireColors, "empire_id: 2, r: 300, g: 0, b: 0")),
            Err(LedgerError::ColorOutOfRange {
                field: "r",
                value: 300
            })
        );
    }

    #[test]
    fn malformed_payload_carries_key() {
        let mut ledger = DumpLedger::new();
        let err = ledger
            .ingest(&token(DumpKey::EmpireID, "empire_id: x, name: a, turn: 1"))
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Payload {
                key: DumpKey::EmpireID,
                source: PayloadError::InvalidInteger { .. }
            }
        ));
    }

    #[test]
    fn ingest_all_counts_rejections() {
        let tokens = vec![
            token(DumpKey::Output, "turn: 1, PP: 1"),
            token(DumpKey::EmpireID, "empire_id: 1, name: A, turn: 1"),
            token(DumpKey::Output, "turn: 1, PP: 1"),
            token(DumpKey::Output, "garbage"),
        ];
        let mut ledger = DumpLedger::new();
        let report = ledger.ingest_all(&tokens);
        assert_eq!(
            report,
            IngestReport {
                accepted: 2,
                rejected: 2
            }
        );
    }

    #[test]
    fn merge_combines_empires_and_prefers_other_points() {
        let mut left = seeded();
        left.ingest(&token(DumpKey::Output, "turn: 1, PP: 1, RP: 1"))
            .unwrap();

        let mut right = seeded();
        right
            .ingest(&token(DumpKey::Output, "turn: 1, PP: 9"))
            .unwrap();
        right
            .ingest(&token(DumpKey::EmpireID, "empire_id: 3, name: C, turn: 2"))
            .unwrap();

        left.merge(right);
        assert_eq!(left.series(2, "PP"), vec![(1, 9.0)]);
        assert_eq!(left.series(2, "RP"), vec![(1, 1.0)]);
        assert_eq!(left.empires().count(), 2);
    }

    #[test]
    fn retain_metrics_filters_series() {
        let mut ledger = seeded();
        ledger
            .ingest(&token(DumpKey::Output, "turn: 1, PP: 1, RP: 2, SHIP_CONT: 3"))
            .unwrap();
        ledger.retain_metrics(&[]);
        assert_eq!(ledger.metrics(2).len(), 3);
        ledger.retain_metrics(&["RP".to_string()]);
        assert_eq!(ledger.metrics(2), vec!["RP"]);
    }

    #[test]
    fn ledger_exports_as_json() {
        let mut ledger = DumpLedger::new();
        ledger
            .ingest(&token(DumpKey::EmpireID, "empire_id: 1, name: A, turn: 1"))
            .unwrap();
        ledger
            .ingest(&token(DumpKey::Output, "turn: 2, PP: 4.5"))
            .unwrap();
        let json = serde_json::to_string_pretty(&ledger).unwrap();
        insta::assert_snapshot!(json, @r###"
        {
          "empires": {
            "1": {
              "empire_id": 1,
              "name": "A",
              "first_turn": 1,
              "series": {
                "PP": {
                  "2": 4.5
                }
              }
            }
          }
        }
        "###);
    }
}
