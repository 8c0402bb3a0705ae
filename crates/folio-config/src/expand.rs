//! Environment variable expansion for configuration strings.
//!
//! Only the braced forms are recognized:
//! - `${VAR}` - value of VAR, error if unset
//! - `${VAR:-default}` - value of VAR, or `default` when unset

use crate::ConfigError;

/// Expand `${...}` references in a configuration value.
///
/// `field` names the configuration key and ends up in the error message.
/// Strings without `${` are returned unchanged, so bare `$VAR` and URLs
/// containing `$` pass through.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    shellexpand::env_with_context(value, lookup)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ConfigError::EnvVar {
            field: field.to_owned(),
            message: format!("${{{}}} not set", e.cause.0),
        })
}

/// Name of the variable that could not be resolved.
struct UnsetVar(String);

fn lookup(var: &str) -> Result<Option<String>, UnsetVar> {
    std::env::var(var)
        .map(Some)
        .map_err(|_| UnsetVar(var.to_owned()))
}
