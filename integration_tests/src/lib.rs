//! Cross-crate tests for the dump tooling live under `tests/`.
