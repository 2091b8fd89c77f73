use std::env;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use dump_runtime::species_effects::{catalog_schema, SpeciesEffectsCatalog};
use jsonschema::JSONSchema;
use serde_json::Value;

const SCHEMA_PATH: &str = "dump_runtime/schemas/species_effects.schema.json";
const DATA_GLOBS: &[&str] = &[
    "dump_runtime/src/data/species_*.json",
    "integration_tests/tests/fixtures/species_*.json",
];

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("species-schema") => write_species_schema(),
        Some("validate-data") => validate_data(),
        Some("help") | None => {
            print_usage();
            Ok(())
        }
        Some(cmd) => {
            eprintln!("Unknown xtask '{cmd}'.");
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!("Usage: cargo xtask species-schema");
    eprintln!("       cargo xtask validate-data");
    eprintln!("       cargo xtask help");
}

fn schema_value() -> Result<Value, Box<dyn Error>> {
    Ok(serde_json::to_value(catalog_schema())?)
}

fn write_species_schema() -> Result<(), Box<dyn Error>> {
    let schema = schema_value()?;
    let path = Path::new(SCHEMA_PATH);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(&schema)? + "\n")?;
    println!("Wrote species effects schema to {}", path.display());
    Ok(())
}

fn validate_data() -> Result<(), Box<dyn Error>> {
    let schema = schema_value()?;
    let compiled = JSONSchema::compile(&schema)
        .map_err(|err| format!("species effects schema does not compile: {err}"))?;

    let mut files: Vec<PathBuf> = Vec::new();
    for pattern in DATA_GLOBS {
        for entry in glob::glob(pattern)? {
            files.push(entry?);
        }
    }
    if files.is_empty() {
        return Err("no species effects data files found".into());
    }

    let mut failures = 0usize;
    for file in &files {
        let problems = check_file(&compiled, file)?;
        if problems.is_empty() {
            println!("ok    {}", file.display());
        } else {
            failures += 1;
            println!("FAIL  {}", file.display());
            for problem in problems {
                println!("      {problem}");
            }
        }
    }

    if failures > 0 {
        return Err(format!("{failures} of {} data files failed validation", files.len()).into());
    }
    Ok(())
}

/// Schema violations plus loader rejections for one data file.
fn check_file(schema: &JSONSchema, path: &Path) -> Result<Vec<String>, Box<dyn Error>> {
    let contents = fs::read_to_string(path)?;
    let instance: Value = serde_json::from_str(&contents)?;

    let mut problems: Vec<String> = match schema.validate(&instance) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|err| format!("{}: {err}", err.instance_path))
            .collect(),
    };
    if problems.is_empty() {
        if let Err(err) = SpeciesEffectsCatalog::from_json_str(&contents) {
            problems.push(err.to_string());
        }
    }
    Ok(problems)
}
