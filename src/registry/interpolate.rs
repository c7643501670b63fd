//! `${name}` placeholder substitution.
//!
//! Both entry points make a single pass over the input: text produced by a
//! substitution is never scanned again, and unknown placeholders are left as is.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::config::environment::Environment;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("Invalid placeholder pattern"));

/// Substitute placeholders using `lookup`; `None` keeps the placeholder.
pub fn substitute<'a, F>(value: &'a str, lookup: F) -> Cow<'a, str>
where
    F: Fn(&str) -> Option<String>,
{
    if !value.contains("${") {
        return Cow::Borrowed(value);
    }
    PLACEHOLDER.replace_all(value, |caps: &Captures<'_>| {
        lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
    })
}

/// Merge-time interpolation against process properties.
pub fn interpolate_environment(value: &str, env: &Environment) -> String {
    substitute(value, |name| env.get(name)).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_interpolation() {
        let env = Environment::empty()
            .with_property("cc.home", "/opt/cc")
            .with_property("nested", "${cc.home}");

        assert_eq!(
            interpolate_environment("${cc.home}/server/license", &env),
            "/opt/cc/server/license"
        );
        assert_eq!(interpolate_environment("${unknown}/x", &env), "${unknown}/x");
        assert_eq!(interpolate_environment("no placeholders", &env), "no placeholders");
        // Substituted text is not expanded again.
        assert_eq!(interpolate_environment("${nested}", &env), "${cc.home}");
    }

    #[test]
    fn test_unterminated_placeholder_kept() {
        let env = Environment::empty().with_property("a", "1");
        assert_eq!(interpolate_environment("${a}${a", &env), "1${a");
    }
}
