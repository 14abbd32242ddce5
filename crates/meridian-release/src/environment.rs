//! Release environment expansion.

use std::collections::BTreeMap;

/// Expand an environment blob into variables.
///
/// The blob holds one `KEY=VALUE` pair per line. Blank lines, `#` comments
/// and lines without `=` are skipped. Keys are trimmed, values are kept
/// verbatim after the first `=`. A later duplicate key wins.
#[must_use]
pub fn parse_environment(blob: &str) -> BTreeMap<String, String> {
    blob.lines()
        .map(str::trim_start)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim_end_matches('\r')))
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect()
}
