//! Shared helpers for integration tests that need a real Postgres.
//!
//! Tests call [`runtime::container_runtime_available`] first and return early
//! when no Docker or Podman socket is reachable.

pub mod postgres;
pub mod runtime;

use uuid::Uuid;

pub(crate) fn unique_name(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_names_keep_prefix_and_differ() {
        let first = unique_name("postgres");
        let second = unique_name("postgres");
        assert!(first.starts_with("postgres-"));
        assert_ne!(first, second);
    }
}
