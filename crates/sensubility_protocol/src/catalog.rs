//! Parsing of the `[sensu] checks` JSON blob into a named catalog
//! (spec.md §4.1).

use std::collections::HashMap;

use crate::error::ProtocolError;
use crate::types::CheckCatalogEntry;

/// Parse the catalog JSON object (`name -> entry`) held in configuration.
/// Parse failure is a fatal startup error per spec.md §4.1.
pub fn parse_catalog(json: &str) -> Result<HashMap<String, CheckCatalogEntry>, ProtocolError> {
    let catalog: HashMap<String, CheckCatalogEntry> = serde_json::from_str(json)?;
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_catalog() {
        let json = r#"{
            "ok": {"command": "exit 0", "subscribers": ["all"], "interval": 1}
        }"#;
        let catalog = parse_catalog(json).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog["ok"].command, "exit 0");
        assert_eq!(catalog["ok"].interval, 1);
    }

    #[test]
    fn empty_object_parses_to_empty_catalog() {
        let catalog = parse_catalog("{}").unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn malformed_json_is_a_fatal_error() {
        assert!(parse_catalog("not json").is_err());
    }
}
