//! Heuristic calculation flags. These are hints for display and filtering,
//! not a formula-language classification.

const LOD_KEYWORDS: [&str; 3] = ["FIXED", "INCLUDE", "EXCLUDE"];
const TABLE_CALC_MARKERS: [&str; 5] = ["WINDOW_", "RUNNING_", "LOOKUP", "INDEX", "RANK"];

/// True when the formula has a `{ ... }` scope that opens with `FIXED`,
/// `INCLUDE` or `EXCLUDE` (case-insensitive).
#[must_use]
pub fn is_lod(formula: &str) -> bool {
    let upper = formula.to_uppercase();
    let mut rest = upper.as_str();
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            return false;
        };
        let scope = after[..close].trim_start();
        if LOD_KEYWORDS.iter().any(|kw| starts_with_word(scope, kw)) {
            return true;
        }
        rest = &after[close + 1..];
    }
    false
}

/// True when the formula mentions a table-calculation function.
#[must_use]
pub fn is_table_calc(formula: &str) -> bool {
    let upper = formula.to_uppercase();
    TABLE_CALC_MARKERS.iter().any(|marker| upper.contains(marker))
}

fn starts_with_word(text: &str, word: &str) -> bool {
    text.strip_prefix(word)
        .is_some_and(|tail| !tail.starts_with(|c: char| c.is_alphanumeric() || c == '_'))
}
