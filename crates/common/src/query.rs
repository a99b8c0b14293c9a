//! Query-string helpers for tracking pixel URLs.

use std::borrow::Borrow;

/// Percent-encode each key and value and join the pairs with `&`.
///
/// Pair order is preserved, so callers control the parameter layout.
pub fn format_qs<I, K, V>(pairs: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: Borrow<str>,
    V: Borrow<str>,
{
    pairs
        .into_iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                urlencoding::encode(key.borrow()),
                urlencoding::encode(value.borrow())
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Appends a query string to `base`, respecting an existing `?`.
#[must_use]
pub fn append_query(base: &str, query: &str) -> String {
    if query.is_empty() {
        return base.to_string();
    }
    if base.contains('?') {
        format!("{base}&{query}")
    } else {
        format!("{base}?{query}")
    }
}
