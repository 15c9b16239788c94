//! Environment variable expansion for configuration strings.
//!
//! Supports:
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default

use crate::ConfigError;

/// Expand environment variable references in a string.
///
/// Returns the original string unchanged if no `${}` patterns are present.
/// Bare `$VAR` syntax is not expanded (only `${VAR}` with braces), so binary
/// paths containing a literal dollar sign survive untouched.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    shellexpand::env_with_context(value, |var| -> Result<Option<String>, LookupError> {
        match std::env::var(var) {
            Ok(val) => Ok(Some(val)),
            Err(_) => Err(LookupError {
                var_name: var.to_owned(),
            }),
        }
    })
    .map(std::borrow::Cow::into_owned)
    .map_err(|e| ConfigError::EnvVar {
        field: field.to_owned(),
        message: format!("${{{0}}} not set", e.cause.var_name),
    })
}

/// Expand an optional string field in place.
pub(crate) fn expand_opt(value: &mut Option<String>, field: &str) -> Result<(), ConfigError> {
    if let Some(raw) = value.as_deref() {
        *value = Some(expand_env(raw, field)?);
    }
    Ok(())
}

/// Error returned when environment variable lookup fails.
struct LookupError {
    var_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_simple_var() {
        // SAFETY: the variable name is unique to this test
        unsafe {
            std::env::set_var("DOCKET_TEST_DOT", "/opt/graphviz/bin/dot");
        }
        let result = expand_env("${DOCKET_TEST_DOT}", "processors.graphviz.binary").unwrap();
        assert_eq!(result, "/opt/graphviz/bin/dot");
        unsafe {
            std::env::remove_var("DOCKET_TEST_DOT");
        }
    }

    #[test]
    fn test_expand_with_default_uses_default() {
        // SAFETY: the variable name is unique to this test
        unsafe {
            std::env::remove_var("DOCKET_UNSET_PANDOC");
        }
        let result = expand_env("${DOCKET_UNSET_PANDOC:-pandoc}", "formatter.pandoc").unwrap();
        assert_eq!(result, "pandoc");
    }

    #[test]
    fn test_expand_embedded_var() {
        // SAFETY: the variable name is unique to this test
        unsafe {
            std::env::set_var("DOCKET_TEST_HOME", "/home/me");
        }
        let result = expand_env("${DOCKET_TEST_HOME}/collections", "project.collections_dir")
            .unwrap();
        assert_eq!(result, "/home/me/collections");
        unsafe {
            std::env::remove_var("DOCKET_TEST_HOME");
        }
    }

    #[test]
    fn test_expand_missing_var_error() {
        // SAFETY: the variable name is unique to this test
        unsafe {
            std::env::remove_var("DOCKET_MISSING_VAR");
        }
        let err = expand_env("${DOCKET_MISSING_VAR}", "project.templates_dir").unwrap_err();
        assert!(matches!(err, ConfigError::EnvVar { .. }));
        assert!(err.to_string().contains("DOCKET_MISSING_VAR"));
        assert!(err.to_string().contains("project.templates_dir"));
    }

    #[test]
    fn test_bare_dollar_not_expanded() {
        let result = expand_env("$HOME/bin/mmdc", "processors.mermaid.binary").unwrap();
        assert_eq!(result, "$HOME/bin/mmdc");
    }

    #[test]
    fn test_expand_opt_none_untouched() {
        let mut value = None;
        expand_opt(&mut value, "formatter.pandoc").unwrap();
        assert!(value.is_none());
    }
}
