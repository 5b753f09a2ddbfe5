//! Geometry source identifiers.

use std::collections::BTreeMap;

use serde::Serialize;

/// A named source of polygon/point geometries (a PostGIS table column).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeometryIdentifier {
    pub source_name: String,
    /// Server alias the GIS engine knows the connection by.
    pub server: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub schema: String,
    pub table: String,
    pub field: String,
    pub client_encoding: String,
}

impl Default for GeometryIdentifier {
    fn default() -> Self {
        Self {
            source_name: String::new(),
            server: String::new(),
            host: String::new(),
            port: 5432,
            database: String::new(),
            username: String::new(),
            password: String::new(),
            schema: String::new(),
            table: String::new(),
            field: String::new(),
            client_encoding: "UTF8".to_string(),
        }
    }
}

impl GeometryIdentifier {
    /// Deduplication key.
    pub fn key(&self) -> String {
        [
            self.server.as_str(),
            self.schema.as_str(),
            self.table.as_str(),
            self.field.as_str(),
        ]
        .concat()
    }

    /// Names of the mandatory table fields that are empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.schema.is_empty() {
            missing.push("schema");
        }
        if self.table.is_empty() {
            missing.push("table");
        }
        if self.field.is_empty() {
            missing.push("field");
        }
        missing
    }
}

/// The geometry identifiers of one product, keyed by [`GeometryIdentifier::key`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GeometryTables {
    identifiers: BTreeMap<String, GeometryIdentifier>,
    default_key: Option<String>,
}

impl GeometryTables {
    /// Insert `identifier` unless its key is already present.
    ///
    /// The first identifier ever inserted becomes the default one.
    pub fn insert(&mut self, identifier: GeometryIdentifier) -> bool {
        let key = identifier.key();
        if self.default_key.is_none() {
            self.default_key = Some(key.clone());
        }
        if self.identifiers.contains_key(&key) {
            return false;
        }
        self.identifiers.insert(key, identifier);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn get(&self, key: &str) -> Option<&GeometryIdentifier> {
        self.identifiers.get(key)
    }

    pub fn default_identifier(&self) -> Option<&GeometryIdentifier> {
        self.default_key.as_deref().and_then(|key| self.identifiers.get(key))
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &GeometryIdentifier> {
        self.identifiers.values()
    }
}
