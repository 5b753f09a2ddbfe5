//! Start-up validation of the loaded products.
//!
//! # Responsibilities
//! - Check that every product using a MySQL backed dictionary says where
//!   the dictionary database lives
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function over resolved products; runs once, before the first
//!   snapshot is accepted

use thiserror::Error;

use crate::product::ProductConfig;

/// Dictionaries whose name starts with this need `database_servers.mysql_dictionary`.
pub const MYSQL_DICTIONARY_PREFIX: &str = "multimysql";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("database_servers.mysql_dictionary section missing in textgenplugin configuration file '{product}'")]
    MissingMySqlDictionary { product: String },
}

pub fn validate_dictionaries<'a, I>(products: I) -> Result<(), Vec<ValidationError>>
where
    I: IntoIterator<Item = (&'a String, &'a ProductConfig)>,
{
    let errors: Vec<ValidationError> = products
        .into_iter()
        .filter(|(_, product)| {
            product.dictionary().starts_with(MYSQL_DICTIONARY_PREFIX) && product.mysql_dictionary().is_empty()
        })
        .map(|(name, _)| ValidationError::MissingMySqlDictionary { product: name.clone() })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::Document;
    use crate::product::ParsedProduct;
    use std::collections::BTreeMap;
    use std::path::Path;

    fn product(extra: &str) -> ProductConfig {
        let content = format!("[forecast_data]\nf = \"/data/x.sqd\"\n[mask]\nland = \"x\"\n{extra}");
        let doc = Document::parse(Path::new("/etc/textgen/p.toml"), &content).unwrap();
        ProductConfig::resolve("p", ParsedProduct::from_document(&doc, None).unwrap(), None).unwrap()
    }

    #[test]
    fn test_multimysql_without_section_fails() {
        let mut products = BTreeMap::new();
        products.insert("default".to_string(), product(""));
        products.insert(
            "files".to_string(),
            product("[misc]\ndictionary = \"file\"\n"),
        );
        products.insert(
            "geonames".to_string(),
            product("[misc]\ndictionary = \"multimysqlplusgeonames\"\n"),
        );

        let errors = validate_dictionaries(&products).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors[0].to_string(),
            "database_servers.mysql_dictionary section missing in textgenplugin configuration file 'default'"
        );
        assert_eq!(
            errors[1],
            ValidationError::MissingMySqlDictionary {
                product: "geonames".to_string()
            }
        );
    }

    #[test]
    fn test_mysql_section_satisfies_check() {
        let mut products = BTreeMap::new();
        products.insert(
            "default".to_string(),
            product("[database_servers.mysql_dictionary]\nhost = \"db\"\n"),
        );
        assert!(validate_dictionaries(&products).is_ok());
    }
}
