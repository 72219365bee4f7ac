//! String utility functions.

use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_]\w*$").unwrap());
static TEMPLATE_VAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{(\w+)\}").unwrap());

/// Fills `{name}` placeholders in a message template.
///
/// Placeholders with no matching entry are left untouched so a template
/// can be reused by callers that only know some of the values. The template
/// is scanned once, so substituted values are never expanded again.
///
/// # Examples
///
/// ```
/// use quarry_core::utils::text::format_template;
///
/// let msg = format_template(
///     "Invalid {shape} argument for \"{method}\"",
///     &[("method", "where"), ("shape", "array")],
/// );
/// assert_eq!(msg, "Invalid array argument for \"where\"");
/// ```
pub fn format_template(template: &str, vars: &[(&str, &str)]) -> String {
    TEMPLATE_VAR
        .replace_all(template, |caps: &regex::Captures<'_>| {
            vars.iter()
                .find(|(name, _)| *name == &caps[1])
                .map_or_else(|| caps[0].to_string(), |(_, value)| (*value).to_string())
        })
        .into_owned()
}

/// Returns `true` if `s` is a plain identifier (`[A-Za-z_][A-Za-z0-9_]*`).
///
/// # Examples
///
/// ```
/// use quarry_core::utils::text::is_identifier;
///
/// assert!(is_identifier("user_id"));
/// assert!(!is_identifier("9lives"));
/// assert!(!is_identifier(""));
/// ```
pub fn is_identifier(s: &str) -> bool {
    IDENTIFIER.is_match(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_template_repeats() {
        assert_eq!(format_template("{a}-{a}", &[("a", "x")]), "x-x");
    }

    #[test]
    fn test_format_template_unknown_left_alone() {
        assert_eq!(format_template("{a} {b}", &[("a", "1")]), "1 {b}");
    }

    #[test]
    fn test_format_template_values_not_reexpanded() {
        assert_eq!(
            format_template("{arg} has {n} items", &[("arg", "[{n}]"), ("n", "2")]),
            "[{n}] has 2 items"
        );
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("_private"));
        assert!(is_identifier("orderBy"));
        assert!(!is_identifier("has space"));
        assert!(!is_identifier("dotted.name"));
    }
}
