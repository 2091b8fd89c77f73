use std::{
    collections::BTreeMap,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dump_runtime::{
    load_charting_config_from_env, load_species_effects_from_env, tokenize_file, tokenize_files,
    DumpLedger, DumpToken, EffectsGroup, SpeciesEffectsCatalog,
};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Chart data from structured game log dumps", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every dump token found in the given logs as JSON lines.
    Tokens {
        /// Log files to scan.
        paths: Vec<PathBuf>,
    },
    /// Aggregate dumps into per-empire series.
    Ledger {
        /// Log files to aggregate.
        paths: Vec<PathBuf>,
        /// Directory searched with the configured log globs.
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Write the ledger here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Fail on the first rejected dump instead of skipping it.
        #[arg(long)]
        strict: bool,
        /// Restrict exported metrics (repeatable); overrides the config list.
        #[arg(long = "metric")]
        metrics: Vec<String>,
    },
    /// Show the species effects catalog.
    Species {
        /// Catalog file; defaults to SPECIES_EFFECTS_PATH or the builtin data.
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Only show the resolved groups of this tier.
        #[arg(long)]
        tier: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Command::Tokens { paths } => print_tokens(&paths, &mut out),
        Command::Ledger {
            paths,
            dir,
            out: out_path,
            strict,
            metrics,
        } => {
            let (config, config_meta) = load_charting_config_from_env();
            let source = config_source(config_meta.path().map(PathBuf::as_path));
            let mut inputs = paths;
            if let Some(dir) = dir.as_deref() {
                inputs.extend(collect_log_paths(dir, &config.log_globs)?);
            }
            if inputs.is_empty() {
                bail!("no log files given; pass paths or --dir");
            }
            let metrics = if metrics.is_empty() {
                config.metrics.clone()
            } else {
                metrics
            };
            let options = LedgerOptions {
                strict: strict || !config.skip_rejected,
                metrics,
            };
            let ledger = build_ledger(&inputs, &options)?;
            let json = serde_json::to_string_pretty(&ledger)?;
            match out_path {
                Some(path) => {
                    fs::write(&path, json)
                        .with_context(|| format!("Failed to write ledger to {}", path.display()))?;
                    info!(
                        target: "empire_dump::charts",
                        path = %path.display(),
                        empires = ledger.empires().count(),
                        config = %source,
                        "ledger.written"
                    );
                }
                None => writeln!(out, "{json}")?,
            }
            Ok(())
        }
        Command::Species { catalog, tier } => {
            let catalog = match catalog {
                Some(path) => SpeciesEffectsCatalog::from_file(&path).with_context(|| {
                    format!("Failed to load species effects from {}", path.display())
                })?,
                None => load_species_effects_from_env().0.as_ref().clone(),
            };
            let report = species_report(&catalog, tier.as_deref())?;
            writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
            Ok(())
        }
    }
}

/// Where the charting config came from, for log output.
fn config_source(path: Option<&Path>) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None => "builtin".to_string(),
    }
}

fn print_tokens(paths: &[PathBuf], out: &mut impl Write) -> Result<()> {
    for path in paths {
        let tokens = tokenize_file(path)?;
        for token in tokens {
            writeln!(out, "{}", serde_json::to_string(&token)?)?;
        }
    }
    Ok(())
}

/// Files in `dir` matching any of `patterns`, sorted and de-duplicated.
fn collect_log_paths(dir: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        let full = dir.join(pattern);
        let full = full.to_string_lossy();
        for entry in glob::glob(&full).with_context(|| format!("Invalid log glob '{pattern}'"))? {
            let path = entry.with_context(|| format!("Unreadable match for '{pattern}'"))?;
            if path.is_file() {
                paths.push(path);
            }
        }
    }
    paths.sort();
    paths.dedup();
    Ok(paths)
}

#[derive(Debug, Default)]
struct LedgerOptions {
    strict: bool,
    metrics: Vec<String>,
}

fn build_ledger(paths: &[PathBuf], options: &LedgerOptions) -> Result<DumpLedger> {
    let mut tokenized = Vec::with_capacity(paths.len());
    for (path, result) in paths.iter().zip(tokenize_files(paths)) {
        tokenized.push((path, result?));
    }

    // Each log is its own stream: the current-empire cursor must not leak
    // from one AI's log into the next.
    let ledgers = tokenized
        .par_iter()
        .map(|(path, tokens)| ledger_for_log(path, tokens, options.strict))
        .collect::<Result<Vec<_>>>()?;

    let mut merged = DumpLedger::new();
    for ledger in ledgers {
        merged.merge(ledger);
    }
    merged.retain_metrics(&options.metrics);
    Ok(merged)
}

fn ledger_for_log(path: &Path, tokens: &[DumpToken], strict: bool) -> Result<DumpLedger> {
    let mut ledger = DumpLedger::new();
    if strict {
        for (index, token) in tokens.iter().enumerate() {
            ledger.ingest(token).with_context(|| {
                format!("{}: dump #{} ({}) rejected", path.display(), index + 1, token.key)
            })?;
        }
    } else {
        let report = ledger.ingest_all(tokens);
        if report.rejected > 0 {
            warn!(
                target: "empire_dump::charts",
                path = %path.display(),
                accepted = report.accepted,
                rejected = report.rejected,
                "ledger.partial_log"
            );
        }
    }
    Ok(ledger)
}

#[derive(Debug, Serialize)]
struct SpeciesReport<'a> {
    tiers: Vec<TierReport<'a>>,
    named_reals: BTreeMap<&'a str, f64>,
}

#[derive(Debug, Serialize)]
struct TierReport<'a> {
    id: &'a str,
    groups: Vec<&'a EffectsGroup>,
}

fn species_report<'a>(
    catalog: &'a SpeciesEffectsCatalog,
    tier: Option<&str>,
) -> Result<SpeciesReport<'a>> {
    let ids: Vec<&str> = match tier {
        Some(id) => vec![catalog
            .tier(id)
            .map(|tier| tier.id.as_str())
            .with_context(|| format!("Unknown species effects tier '{id}'"))?],
        None => catalog.tier_ids().collect(),
    };
    let tiers = ids
        .into_iter()
        .map(|id| -> Result<TierReport<'a>> {
            Ok(TierReport {
                id,
                groups: catalog.resolved_groups(id)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(SpeciesReport {
        tiers,
        named_reals: catalog.named_reals(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dump_runtime::ChartingConfig;

    const AI_LOG: &str = "\
12:06:13.179169 {0x00002e80} [debug] python : dumper.py:30 : ##EmpireID:empire_id: 2, name: Binding_2, turn: 1
12:06:13.179201 {0x00002e80} [debug] python : dumper.py:41 : ##Output:turn: 1, PP: 5.0, RP: 2.0
12:06:14.000000 {0x00002e80} [debug] python : dumper.py:41 : ##Output:turn: 2, PP: oops
12:06:14.100000 {0x00002e80} [debug] python : dumper.py:41 : ##Output:turn 3
";

    fn write_log(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn lenient_ledger_skips_rejected_dumps() {
        let dir = tempfile::tempdir().unwrap();
        let log = write_log(dir.path(), "AI_1.log", AI_LOG);
        let ledger = build_ledger(&[log], &LedgerOptions::default()).unwrap();
        assert_eq!(ledger.series(2, "PP"), vec![(1, 5.0)]);
    }

    #[test]
    fn strict_ledger_fails_on_rejected_dump() {
        let dir = tempfile::tempdir().unwrap();
        let log = write_log(dir.path(), "AI_1.log", AI_LOG);
        let options = LedgerOptions {
            strict: true,
            metrics: Vec::new(),
        };
        let err = build_ledger(&[log], &options).unwrap_err();
        assert!(format!("{err:#}").contains("dump #4 (Output) rejected"));
    }

    #[test]
    fn empire_cursor_does_not_cross_logs() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_log(dir.path(), "AI_1.log", AI_LOG);
        let second = write_log(dir.path(), "AI_2.log", "##Output:turn: 1, PP: 9\n");
        let options = LedgerOptions {
            strict: true,
            metrics: Vec::new(),
        };
        assert!(build_ledger(&[second.clone()], &options).is_err());

        let ledger = build_ledger(&[first, second], &LedgerOptions::default()).unwrap();
        assert_eq!(ledger.series(2, "PP"), vec![(1, 5.0)]);
    }

    #[test]
    fn metric_filter_applies_after_merge() {
        let dir = tempfile::tempdir().unwrap();
        let log = write_log(dir.path(), "AI_1.log", AI_LOG);
        let options = LedgerOptions {
            strict: false,
            metrics: vec!["RP".to_string()],
        };
        let ledger = build_ledger(&[log], &options).unwrap();
        assert_eq!(ledger.metrics(2), vec!["RP"]);
    }

    #[test]
    fn log_globs_select_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        write_log(dir.path(), "AI_1.log", "");
        write_log(dir.path(), "AI_2.log", "");
        write_log(dir.path(), "freeorion.log", "");
        write_log(dir.path(), "notes.txt", "");
        let config = ChartingConfig::default();
        let paths = collect_log_paths(dir.path(), &config.log_globs).unwrap();
        let names: Vec<String> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["AI_1.log", "AI_2.log", "freeorion.log"]);
    }

    #[test]
    fn tokens_are_printed_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = write_log(dir.path(), "AI_1.log", AI_LOG);
        let mut buffer = Vec::new();
        print_tokens(&[log], &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let first = text.lines().next().unwrap();
        assert_eq!(
            first,
            r#"{"key":"EmpireID","payload":"empire_id: 2, name: Binding_2, turn: 1"}"#
        );
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn config_source_names_file_or_builtin() {
        assert_eq!(config_source(None), "builtin");
        let path = Path::new("configs").join("charting_config.json");
        assert_eq!(config_source(Some(&path)), path.display().to_string());
    }

    #[test]
    fn species_report_resolves_single_tier() {
        let catalog = SpeciesEffectsCatalog::builtin();
        let report = species_report(&catalog, Some("great_industry")).unwrap();
        assert_eq!(report.tiers.len(), 1);
        assert_eq!(report.tiers[0].groups.len(), 3);
        assert!(species_report(&catalog, Some("no_such_tier")).is_err());
    }
}
