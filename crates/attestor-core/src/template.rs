//! Explanation templates with named placeholders.
//!
//! Templates use `{name}` placeholders. Known names are substituted,
//! unknown ones are left verbatim so a typo in a rule file shows up in the
//! report instead of silently disappearing.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
}

/// Substitute `values` into `template`.
pub fn render(template: &str, values: &[(&str, String)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let key = &caps[1];
            values
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.clone())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Render a template, falling back to `default` when it renders blank.
pub fn render_or(template: &str, values: &[(&str, String)], default: impl FnOnce() -> String) -> String {
    let rendered = render(template, values);
    if rendered.trim().is_empty() {
        default()
    } else {
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_placeholders_substituted() {
        let out = render(
            "Found {found_count} of {required_count}",
            &[("found_count", "2".into()), ("required_count", "3".into())],
        );
        assert_eq!(out, "Found 2 of 3");
    }

    #[test]
    fn test_unknown_placeholder_left_verbatim() {
        let out = render("Value: {found_vlaue}", &[("found_value", "SOC 2".into())]);
        assert_eq!(out, "Value: {found_vlaue}");
    }

    #[test]
    fn test_substituted_value_is_not_reexpanded() {
        let out = render("{found_value}", &[("found_value", "{found_value}".into())]);
        assert_eq!(out, "{found_value}");
    }

    #[test]
    fn test_blank_template_uses_default() {
        let out = render_or("  ", &[], || "generated".to_string());
        assert_eq!(out, "generated");
    }
}
