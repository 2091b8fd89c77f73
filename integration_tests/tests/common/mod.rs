use std::path::PathBuf;
use std::sync::Once;

static INIT: Once = Once::new();
static CHARTING_INIT: Once = Once::new();

pub fn fixture(name: &str) -> PathBuf {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    debug_assert!(path.exists(), "missing fixture at {}", path.display());
    path
}

pub fn ensure_test_species_effects() {
    INIT.call_once(|| {
        std::env::set_var("SPECIES_EFFECTS_PATH", fixture("species_override.json"));
    });
}

pub fn ensure_test_charting_config() {
    CHARTING_INIT.call_once(|| {
        std::env::set_var("CHARTING_CONFIG_PATH", fixture("charting_config.json"));
    });
}
