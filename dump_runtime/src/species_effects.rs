//! Declarative species effects data: typed records plus a validating loader.
//!
//! The records mirror how the game scripts describe effects groups (scope,
//! activation predicate, priority, effect). Nothing here evaluates them; the
//! simulation's effects engine owns ordering and accumulation.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config_loader::load_with_env_path;

pub const BUILTIN_SPECIES_INDUSTRY: &str = include_str!("data/species_industry.json");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    Source,
}

/// Position of an effects group in the engine's accumulation order.
///
/// Variants are declared in execution order, so the derived `Ord` matches
/// [`EffectPriority::rank`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum EffectPriority {
    TargetEarlyBeforeScaling,
    TargetScaling,
    TargetAfterScaling,
}

impl EffectPriority {
    pub const fn rank(self) -> u32 {
        match self {
            EffectPriority::TargetEarlyBeforeScaling => 110,
            EffectPriority::TargetScaling => 120,
            EffectPriority::TargetAfterScaling => 130,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

/// Activation predicate tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    Planet,
    IsHuman,
    All {
        conditions: Vec<Condition>,
    },
    Any {
        conditions: Vec<Condition>,
    },
    Not {
        condition: Box<Condition>,
    },
    TargetIndustry {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        low: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        high: Option<f64>,
    },
    Happiness {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        low: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        high: Option<f64>,
    },
    Focus {
        types: Vec<String>,
    },
    GalaxyMaxAiAggression {
        comparison: Comparison,
        value: i32,
    },
}

impl Condition {
    fn validate(&self) -> Result<(), String> {
        match self {
            Condition::Planet | Condition::IsHuman | Condition::GalaxyMaxAiAggression { .. } => {
                Ok(())
            }
            Condition::All { conditions } | Condition::Any { conditions } => {
                if conditions.is_empty() {
                    return Err("all/any condition has no operands".to_string());
                }
                conditions.iter().try_for_each(Condition::validate)
            }
            Condition::Not { condition } => condition.validate(),
            Condition::TargetIndustry { low, high } | Condition::Happiness { low, high } => {
                match (low, high) {
                    (Some(low), Some(high)) if low > high => {
                        Err(format!("range low {low} exceeds high {high}"))
                    }
                    _ => Ok(()),
                }
            }
            Condition::Focus { types } => {
                if types.is_empty() || types.iter().any(|focus| focus.trim().is_empty()) {
                    Err("focus condition needs non-empty focus types".to_string())
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Value expression tree; `value` is the meter's current value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueExpr {
    Value,
    TargetPopulation,
    Constant { value: f64 },
    NamedReal { name: String, value: f64 },
    Add { terms: Vec<ValueExpr> },
    Mul { factors: Vec<ValueExpr> },
}

impl ValueExpr {
    fn validate(&self) -> Result<(), String> {
        match self {
            ValueExpr::Value | ValueExpr::TargetPopulation | ValueExpr::Constant { .. } => Ok(()),
            ValueExpr::NamedReal { name, .. } => {
                if name.trim().is_empty() {
                    Err("named_real needs a name".to_string())
                } else {
                    Ok(())
                }
            }
            ValueExpr::Add { terms: operands } | ValueExpr::Mul { factors: operands } => {
                if operands.is_empty() {
                    return Err("add/mul expression has no operands".to_string());
                }
                operands.iter().try_for_each(ValueExpr::validate)
            }
        }
    }

    fn visit_named_reals<'a>(&'a self, out: &mut Vec<(&'a str, f64)>) {
        match self {
            ValueExpr::NamedReal { name, value } => out.push((name.as_str(), *value)),
            ValueExpr::Add { terms: operands } | ValueExpr::Mul { factors: operands } => {
                for operand in operands {
                    operand.visit_named_reals(out);
                }
            }
            ValueExpr::Value | ValueExpr::TargetPopulation | ValueExpr::Constant { .. } => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Effect {
    SetTargetIndustry { value: ValueExpr },
}

impl Effect {
    fn value(&self) -> &ValueExpr {
        match self {
            Effect::SetTargetIndustry { value } => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EffectsGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub scope: Scope,
    pub activation: Condition,
    pub accounting_label: String,
    pub priority: EffectPriority,
    pub effects: Vec<Effect>,
}

impl EffectsGroup {
    fn validate(&self) -> Result<(), String> {
        if self.accounting_label.trim().is_empty() {
            return Err("accounting_label must not be empty".to_string());
        }
        if self.effects.is_empty() {
            return Err("group has no effects".to_string());
        }
        self.activation.validate()?;
        self.effects
            .iter()
            .try_for_each(|effect| effect.value().validate())
    }

    pub fn named_reals(&self) -> Vec<(&str, f64)> {
        let mut out = Vec::new();
        for effect in &self.effects {
            effect.value().visit_named_reals(&mut out);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SpeciesEffectsTier {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Tier whose groups are applied before this tier's own groups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default)]
    pub groups: Vec<EffectsGroup>,
}

impl SpeciesEffectsTier {
    fn normalize(&mut self) {
        self.id.make_ascii_lowercase();
        if let Some(parent) = self.extends.as_mut() {
            parent.make_ascii_lowercase();
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SpeciesEffectsCatalog {
    pub version: u32,
    pub tiers: Vec<SpeciesEffectsTier>,
}

#[derive(Debug, Error)]
pub enum SpeciesEffectsError {
    #[error("failed to parse species effects catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read species effects catalog from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("duplicate species effects tier {id}")]
    DuplicateTier { id: String },
    #[error("tier {id} extends unknown tier {parent}")]
    UnknownParent { id: String, parent: String },
    #[error("tier {id} is part of an inheritance cycle")]
    InheritanceCycle { id: String },
    #[error("tier {tier} group #{index}: {reason}")]
    InvalidGroup {
        tier: String,
        index: usize,
        reason: String,
    },
    #[error("named real {name} has conflicting values {first} and {second}")]
    ConflictingNamedReal { name: String, first: f64, second: f64 },
    #[error("unknown species effects tier {id}")]
    UnknownTier { id: String },
}

impl SpeciesEffectsCatalog {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            Self::from_json_str(BUILTIN_SPECIES_INDUSTRY)
                .expect("builtin species effects catalog should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, SpeciesEffectsError> {
        let mut catalog: SpeciesEffectsCatalog = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_file(path: &Path) -> Result<Self, SpeciesEffectsError> {
        let contents = fs::read_to_string(path).map_err(|source| SpeciesEffectsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn tier(&self, id: &str) -> Option<&SpeciesEffectsTier> {
        let id = id.to_ascii_lowercase();
        self.tiers.iter().find(|tier| tier.id == id)
    }

    pub fn tier_ids(&self) -> impl Iterator<Item = &str> {
        self.tiers.iter().map(|tier| tier.id.as_str())
    }

    /// Groups of `id` with inherited groups first, root ancestor leading.
    pub fn resolved_groups(&self, id: &str) -> Result<Vec<&EffectsGroup>, SpeciesEffectsError> {
        let mut chain = Vec::new();
        let mut cursor = Some(self.tier(id).ok_or_else(|| SpeciesEffectsError::UnknownTier {
            id: id.to_string(),
        })?);
        while let Some(tier) = cursor {
            if chain.len() == self.tiers.len() {
                return Err(SpeciesEffectsError::InheritanceCycle {
                    id: id.to_string(),
                });
            }
            chain.push(tier);
            cursor = tier.extends.as_deref().and_then(|parent| self.tier(parent));
        }
        Ok(chain
            .into_iter()
            .rev()
            .flat_map(|tier| tier.groups.iter())
            .collect())
    }

    /// Every named constant referenced by the catalog, by name.
    pub fn named_reals(&self) -> BTreeMap<&str, f64> {
        self.tiers
            .iter()
            .flat_map(|tier| tier.groups.iter())
            .flat_map(EffectsGroup::named_reals)
            .collect()
    }

    fn validate(&mut self) -> Result<(), SpeciesEffectsError> {
        let mut seen = HashSet::new();
        for tier in &mut self.tiers {
            tier.normalize();
            if !seen.insert(tier.id.clone()) {
                return Err(SpeciesEffectsError::DuplicateTier {
                    id: tier.id.clone(),
                });
            }
        }

        let parents: HashMap<&str, Option<&str>> = self
            .tiers
            .iter()
            .map(|tier| (tier.id.as_str(), tier.extends.as_deref()))
            .collect();
        for tier in &self.tiers {
            if let Some(parent) = tier.extends.as_deref() {
                if !parents.contains_key(parent) {
                    return Err(SpeciesEffectsError::UnknownParent {
                        id: tier.id.clone(),
                        parent: parent.to_string(),
                    });
                }
            }
            let mut visited = HashSet::from([tier.id.as_str()]);
            let mut cursor = tier.extends.as_deref();
            while let Some(parent) = cursor {
                if !visited.insert(parent) {
                    return Err(SpeciesEffectsError::InheritanceCycle {
                        id: tier.id.clone(),
                    });
                }
                cursor = parents.get(parent).copied().flatten();
            }

            for (index, group) in tier.groups.iter().enumerate() {
                group
                    .validate()
                    .map_err(|reason| SpeciesEffectsError::InvalidGroup {
                        tier: tier.id.clone(),
                        index,
                        reason,
                    })?;
            }
        }

        let mut named: HashMap<&str, f64> = HashMap::new();
        for (name, value) in self
            .tiers
            .iter()
            .flat_map(|tier| tier.groups.iter())
            .flat_map(EffectsGroup::named_reals)
        {
            if let Some(first) = named.insert(name, value) {
                if first != value {
                    return Err(SpeciesEffectsError::ConflictingNamedReal {
                        name: name.to_string(),
                        first,
                        second: value,
                    });
                }
            }
        }
        Ok(())
    }
}

pub fn catalog_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(SpeciesEffectsCatalog)
}

#[derive(Debug, Clone)]
pub struct SpeciesEffectsMetadata {
    path: Option<PathBuf>,
}

impl SpeciesEffectsMetadata {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

/// Loads the catalog named by `SPECIES_EFFECTS_PATH`, falling back to the
/// builtin data when the variable is unset or the file does not load.
pub fn load_species_effects_from_env() -> (Arc<SpeciesEffectsCatalog>, SpeciesEffectsMetadata) {
    load_with_env_path(
        "SPECIES_EFFECTS_PATH",
        "species_effects",
        SpeciesEffectsCatalog::builtin,
        SpeciesEffectsCatalog::from_file,
        SpeciesEffectsMetadata::new,
    )
}
