//! Helpers shared by the network drivers.

#[cfg(feature = "postgres")]
pub mod tls;

#[cfg(feature = "postgres")]
pub use tls::{connector, SslMode};

/// Match a table name against the working-set prefix.
///
/// Filtering happens client side: `_` is a wildcard in `LIKE`, and most
/// prefixes end in one.
pub fn matches_prefix(name: &str, prefix: &str) -> bool {
    name.starts_with(prefix)
}

/// Keep and sort the names that match `prefix`.
pub fn filter_prefixed(names: impl IntoIterator<Item = String>, prefix: &str) -> Vec<String> {
    let mut out: Vec<String> = names
        .into_iter()
        .filter(|n| matches_prefix(n, prefix))
        .collect();
    out.sort();
    out
}
