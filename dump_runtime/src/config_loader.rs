//! Shared env-path-or-builtin loading for the JSON data files.

use std::{
    env,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Loads `T` from the file named by `env_var`, falling back to `builtin`
/// when the variable is unset or the file does not load. The metadata
/// records the path only when the file was used.
pub(crate) fn load_with_env_path<T, E, M>(
    env_var: &str,
    label: &'static str,
    builtin: fn() -> Arc<T>,
    from_file: fn(&Path) -> Result<T, E>,
    metadata_ctor: fn(Option<PathBuf>) -> M,
) -> (Arc<T>, M)
where
    E: std::fmt::Display,
{
    if let Some(path) = env::var_os(env_var).map(PathBuf::from) {
        match from_file(&path) {
            Ok(value) => {
                tracing::info!(
                    target: "empire_dump::config",
                    path = %path.display(),
                    "{label}.loaded=file"
                );
                return (Arc::new(value), metadata_ctor(Some(path)));
            }
            Err(err) => {
                tracing::warn!(
                    target: "empire_dump::config",
                    path = %path.display(),
                    error = %err,
                    "{label}.load_failed"
                );
            }
        }
    }

    tracing::info!(
        target: "empire_dump::config",
        "{label}.loaded=builtin"
    );
    (builtin(), metadata_ctor(None))
}
