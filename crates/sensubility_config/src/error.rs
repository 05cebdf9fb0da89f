use thiserror::Error;

/// Configuration errors are always fatal at startup (spec.md §7).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config file {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: config::ConfigError,
    },

    #[error("invalid value for [{section}] {parameter} = \"{value}\": {reason}")]
    Validation {
        section: &'static str,
        parameter: &'static str,
        value: String,
        reason: String,
    },
}
