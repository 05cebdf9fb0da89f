//! Typed validators, ported from `original_source/config/config.go`'s
//! `Validator` factories. Each returns `Err(reason)` describing why a raw
//! string value is malformed; the config loader wraps the reason in a
//! [`crate::error::ConfigError::Validation`] that names the offending
//! section/parameter.

/// Value must be one of a fixed set of options (case-sensitive), e.g.
/// `log_level` or `results_format`.
pub fn validate_options(value: &str, options: &[&str]) -> Result<(), String> {
    if options.contains(&value) {
        Ok(())
    } else {
        Err(format!(
            "value ({value}) is not one of allowed options: {options:?}"
        ))
    }
}

/// Value must parse as a bool (`true`/`false`, case-insensitive, plus the Go
/// `strconv.ParseBool` aliases `1`/`0`/`t`/`f`/`T`/`F`).
pub fn validate_bool(value: &str) -> Result<(), String> {
    parse_bool(value).map(|_| ()).ok_or_else(|| format!("not a boolean: {value}"))
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Value must parse as a signed integer.
pub fn validate_int(value: &str) -> Result<(), String> {
    value
        .trim()
        .parse::<i64>()
        .map(|_| ())
        .map_err(|e| format!("not an integer: {e}"))
}

/// Value must be a `separator`-joined list of integers. Unused by any
/// current key (spec.md §4.8) but kept so the validator set matches the
/// original's four factories one-for-one.
pub fn validate_multi_int(value: &str, separator: char) -> Result<(), String> {
    for item in value.split(separator) {
        validate_int(item)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_validator_rejects_unknown_values() {
        assert!(validate_options("DEBUG", &["DEBUG", "INFO"]).is_ok());
        assert!(validate_options("TRACE", &["DEBUG", "INFO"]).is_err());
    }

    #[test]
    fn bool_validator_accepts_canonical_forms() {
        assert!(validate_bool("true").is_ok());
        assert!(validate_bool("false").is_ok());
        assert!(validate_bool("no-way").is_err());
    }

    #[test]
    fn int_validator_rejects_non_numeric() {
        assert!(validate_int("666").is_ok());
        assert!(validate_int("abc").is_err());
    }

    #[test]
    fn multi_int_validator_rejects_any_bad_member() {
        assert!(validate_multi_int("1,2,3", ',').is_ok());
        assert!(validate_multi_int("1,2,whoops,4", ',').is_err());
    }
}
