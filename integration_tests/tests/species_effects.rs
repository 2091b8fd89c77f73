mod common;

use anyhow::Result;
use dump_runtime::{
    load_species_effects_from_env, Condition, EffectPriority, SpeciesEffectsCatalog,
};

#[test]
fn env_override_replaces_builtin_catalog() {
    common::ensure_test_species_effects();
    let (catalog, metadata) = load_species_effects_from_env();
    assert_eq!(catalog.version, 2);
    assert!(metadata.path().is_some());
    let ids: Vec<&str> = catalog.tier_ids().collect();
    assert_eq!(ids, ["bad_industry"]);
}

#[test]
fn builtin_industry_tiers_share_basic_groups() -> Result<()> {
    let catalog = SpeciesEffectsCatalog::builtin();
    let basic = catalog.resolved_groups("basic_industry")?;
    let great = catalog.resolved_groups("great_industry")?;
    assert_eq!(&great[..basic.len()], &basic[..]);

    let priorities: Vec<EffectPriority> = great.iter().map(|group| group.priority).collect();
    assert_eq!(
        priorities,
        [
            EffectPriority::TargetEarlyBeforeScaling,
            EffectPriority::TargetAfterScaling,
            EffectPriority::TargetScaling,
        ]
    );
    Ok(())
}

#[test]
fn focus_activation_is_preserved() -> Result<()> {
    let catalog = SpeciesEffectsCatalog::builtin();
    let groups = catalog.resolved_groups("basic_industry")?;
    let Condition::All { conditions } = &groups[0].activation else {
        panic!("expected an all-of activation");
    };
    assert!(conditions.contains(&Condition::Focus {
        types: vec!["FOCUS_INDUSTRY".to_string()]
    }));
    Ok(())
}

#[test]
fn catalog_serializes_back_to_equivalent_json() -> Result<()> {
    let catalog = SpeciesEffectsCatalog::builtin();
    let json = serde_json::to_string(catalog.as_ref())?;
    let reparsed = SpeciesEffectsCatalog::from_json_str(&json)?;
    assert_eq!(&reparsed, catalog.as_ref());
    Ok(())
}
