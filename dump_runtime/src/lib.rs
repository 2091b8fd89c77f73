//! Runtime helpers for structured game log dumps.
//!
//! This crate re-exports the data contracts from `dump_schema` and adds the
//! operations built on them: marker extraction, payload splitting, per-empire
//! aggregation, plus the species effects catalog that the charts annotate.

pub use dump_schema::*;

pub mod charting_config;
mod config_loader;
pub mod ledger;
pub mod payload;
pub mod species_effects;
pub mod tokenizer;

pub use charting_config::{
    load_charting_config_from_env, ChartingConfig, ChartingConfigError, ChartingConfigMetadata,
};
pub use ledger::{DumpLedger, EmpireColor, EmpireId, EmpireRecord, IngestReport, LedgerError};
pub use payload::{PayloadError, PayloadFields};
pub use species_effects::{
    catalog_schema, load_species_effects_from_env, Condition, Effect, EffectPriority, EffectsGroup,
    SpeciesEffectsCatalog, SpeciesEffectsError, SpeciesEffectsMetadata, SpeciesEffectsTier,
    ValueExpr,
};
pub use tokenizer::{
    extract_token, tokenize_file, tokenize_files, tokenize_str, LogTokenizer, TokenizeError,
};
