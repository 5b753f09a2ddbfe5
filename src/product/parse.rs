//! First pass: one product file into plain, unresolved data.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use toml::Value;

use crate::config::error::ConfigError;
use crate::config::include::resolve_includes;
use crate::config::loader::Document;
use crate::config::tree::{flatten, include_target, ConfigItemVector, ALLOW_ALL};
use crate::product::geometry::{GeometryIdentifier, GeometryTables};
use crate::product::{DEFAULT_TIMEZONE, TIMEZONE_DEFAULT_KEY, TIMEZONE_PREFIX};

/// Dictionary database connection, from `database_servers.mysql_dictionary`.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct MySqlDictionary {
    pub host: String,
    pub database: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl MySqlDictionary {
    pub fn is_empty(&self) -> bool {
        self.host.is_empty() && self.database.is_empty() && self.username.is_empty() && self.password.is_empty()
    }
}

/// Settings read from one product file, before inheritance.
///
/// `None` scalars and empty collections mean "not configured here".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedProduct {
    pub path: PathBuf,
    pub language: Option<String>,
    pub formatter: Option<String>,
    pub locale: Option<String>,
    pub time_format: Option<String>,
    pub dictionary: Option<String>,
    pub file_dictionaries: Option<String>,
    pub forest_fire_warning_directory: Option<String>,
    pub frost_season: bool,
    pub mysql: MySqlDictionary,
    pub parameter_mappings: BTreeMap<String, String>,
    pub geometry: GeometryTables,
    /// Default identifier of the parent the geometry tables were completed from.
    pub geometry_base: Option<GeometryIdentifier>,
    pub masks: ConfigItemVector,
    pub fire_warning_area_codes: ConfigItemVector,
    pub forecast_data: ConfigItemVector,
    pub unit_formats: ConfigItemVector,
    pub output_document: ConfigItemVector,
    pub area: ConfigItemVector,
    pub area_timezones: BTreeMap<String, String>,
}

impl ParsedProduct {
    /// Read `path`, completing unset geometry table fields from `base`.
    ///
    /// Every failure is wrapped in [`ConfigError::Product`] with a detail
    /// naming the file.
    pub fn from_file(path: &Path, base: Option<&GeometryIdentifier>) -> Result<Self, ConfigError> {
        if !path.exists() {
            let source = ConfigError::Io {
                path: path.to_path_buf(),
                source: io::Error::from(io::ErrorKind::NotFound),
            };
            return Err(ConfigError::product(
                path,
                format!(
                    "Product configuration file '{}' not found, please check the filename!",
                    path.display()
                ),
                source,
            ));
        }

        let doc = Document::load(path).map_err(|e| syntax_error(path, e))?;
        Self::from_document(&doc, base)
    }

    /// Parse an already loaded document.
    pub fn from_document(doc: &Document, base: Option<&GeometryIdentifier>) -> Result<Self, ConfigError> {
        let mut parsed = ParsedProduct {
            path: doc.path().to_path_buf(),
            geometry_base: base.cloned(),
            ..Default::default()
        };

        parsed.read_scalars(doc);
        parsed
            .read_sections(doc, base)
            .map_err(|e| match e {
                e @ ConfigError::Product { .. } => e,
                e => syntax_error(doc.path(), e),
            })?;
        Ok(parsed)
    }

    fn read_scalars(&mut self, doc: &Document) {
        let owned = |key: &str| doc.lookup_str(key).map(str::to_string);

        self.frost_season = doc.lookup_flag("misc.frostseason").unwrap_or(false);
        self.time_format = owned("misc.timeformat");
        self.language = owned("misc.language");
        self.locale = owned("misc.locale");
        self.dictionary = owned("misc.dictionary");
        self.file_dictionaries = owned("misc.filedictionaries");
        self.formatter = owned("misc.formatter");
        self.forest_fire_warning_directory = owned("forestfirewarning.directory");

        if doc.exists("database_servers.mysql_dictionary") {
            let field = |name: &str| {
                doc.lookup_str(&format!("database_servers.mysql_dictionary.{name}"))
                    .unwrap_or_default()
                    .to_string()
            };
            self.mysql = MySqlDictionary {
                host: field("host"),
                database: field("database"),
                username: field("username"),
                password: field("password"),
            };
        }
    }

    fn read_sections(&mut self, doc: &Document, base: Option<&GeometryIdentifier>) -> Result<(), ConfigError> {
        self.read_parameter_mappings(doc)?;
        self.read_geometry_tables(doc, base)?;
        self.read_masks(doc);
        self.read_fire_warning_area_codes(doc)?;

        if let Some(node) = doc.lookup("forecast_data") {
            collect_strings(doc, node, "forecast_data", &mut self.forecast_data)?;
        }
        if let Some(node) = doc.lookup("unit_format") {
            collect_strings(doc, node, "unit_format", &mut self.unit_formats)?;
        }

        self.read_output_document(doc)?;
        self.read_area(doc)?;

        self.area_timezones
            .entry(TIMEZONE_DEFAULT_KEY.to_string())
            .or_insert_with(|| DEFAULT_TIMEZONE.to_string());
        Ok(())
    }

    fn read_parameter_mappings(&mut self, doc: &Document) -> Result<(), ConfigError> {
        let mut items = ConfigItemVector::new();
        flatten(doc, "parameter_mapping", &[ALLOW_ALL.to_string()], &mut items)?;
        for (key, value) in items {
            let name = match key.strip_prefix("parameter_mapping.") {
                Some(rest) => format!("textgen::{rest}"),
                None => key,
            };
            self.parameter_mappings.insert(name, value);
        }
        Ok(())
    }

    fn read_geometry_tables(&mut self, doc: &Document, base: Option<&GeometryIdentifier>) -> Result<(), ConfigError> {
        if !doc.exists("geometry_tables") {
            return Ok(());
        }

        let get = |key: &str| {
            doc.lookup_str(&format!("geometry_tables.{key}"))
                .unwrap_or_default()
                .to_string()
        };
        let name = get("name");
        let server = get("server");
        let schema = get("schema");
        let table = get("table");
        let field = get("field");

        let mut default_id = base.cloned().unwrap_or_default();
        if !schema.is_empty() && !table.is_empty() && !field.is_empty() {
            default_id.source_name = name;
            default_id.server = server.clone();
            default_id.schema = schema.clone();
            default_id.table = table.clone();
            default_id.field = field.clone();
            self.geometry.insert(default_id.clone());
        }

        let Some(additional) = doc.lookup("geometry_tables.additional_tables") else {
            return Ok(());
        };
        let Some(entries) = additional.as_array() else {
            return Err(ConfigError::WrongType {
                key: "geometry_tables.additional_tables".to_string(),
                expected: "an array",
            });
        };

        let or_default = |own: &str, inherited: &str| {
            if own.is_empty() { inherited.to_string() } else { own.to_string() }
        };

        for entry in entries {
            let entry_str = |key: &str| entry.get(key).and_then(Value::as_str).map(str::to_string);

            let identifier = GeometryIdentifier {
                source_name: entry_str("name").unwrap_or_default(),
                server: entry_str("server").unwrap_or_else(|| or_default(&server, &default_id.server)),
                schema: entry_str("schema").unwrap_or_else(|| or_default(&schema, &default_id.schema)),
                table: entry_str("table").unwrap_or_else(|| or_default(&table, &default_id.table)),
                field: entry_str("field").unwrap_or_else(|| or_default(&field, &default_id.field)),
                ..default_id.clone()
            };

            let missing = identifier.missing_fields();
            if !missing.is_empty() {
                let reasons: Vec<String> = missing.iter().map(|f| format!("No '{f}' defined.")).collect();
                let message = reasons.join(" ");
                return Err(ConfigError::product(
                    doc.path(),
                    format!("Textgenplugin configuration error in geometry_tables section: {message}"),
                    ConfigError::section(message.clone()),
                ));
            }

            self.geometry.insert(identifier);
        }
        Ok(())
    }

    fn read_masks(&mut self, doc: &Document) {
        let Some(table) = doc.lookup("mask").and_then(Value::as_table) else {
            return;
        };
        for (name, value) in table {
            if let Some(value) = value.as_str() {
                self.masks.push((name.clone(), value.to_string()));
            }
        }
    }

    fn read_fire_warning_area_codes(&mut self, doc: &Document) -> Result<(), ConfigError> {
        let Some(table) = doc.lookup("forestfirewarning.areacodes").and_then(Value::as_table) else {
            return Ok(());
        };
        for (name, value) in table {
            let key = format!("forestfirewarning.areacodes.{name}");
            let code = value.as_integer().ok_or(ConfigError::WrongType {
                key,
                expected: "an integer",
            })?;
            self.fire_warning_area_codes
                .push((format!("qdtext::forestfirewarning::areacodes::{name}"), code.to_string()));
        }
        Ok(())
    }

    fn read_output_document(&mut self, doc: &Document) -> Result<(), ConfigError> {
        if !doc.exists("output_document") {
            return Ok(());
        }

        let sections = match doc.lookup("output_document.sections") {
            None => {
                return Err(ConfigError::MissingSetting {
                    key: "output_document.sections".to_string(),
                })
            }
            Some(Value::Array(sections)) => sections,
            Some(_) => {
                return Err(ConfigError::section(
                    "output_document.sections not an array in textgenplugin configuration file",
                ))
            }
        };

        let mut items = ConfigItemVector::new();
        let mut allowed: Vec<String> = Vec::new();
        let mut section_names: Vec<&str> = Vec::new();

        for (i, section) in sections.iter().enumerate() {
            let section = section.as_str().ok_or_else(|| ConfigError::WrongType {
                key: format!("output_document.sections[{i}]"),
                expected: "a string",
            })?;
            section_names.push(section);

            let prefix = format!("output_document.{section}");
            for part in ["period", "subperiod", "header"] {
                allowed.push(format!("{prefix}.{part}"));
            }

            match doc.lookup(&format!("{prefix}.content")) {
                Some(Value::String(story)) if story == "none" => allowed.push(prefix.clone()),
                Some(Value::String(story)) => {
                    for scope in ["", ".day1", ".day2"] {
                        allowed.push(format!("{prefix}{scope}.story.{story}"));
                    }
                }
                Some(Value::Array(stories)) => {
                    let mut names = Vec::with_capacity(stories.len());
                    for (k, story) in stories.iter().enumerate() {
                        let story = story.as_str().ok_or_else(|| ConfigError::WrongType {
                            key: format!("{prefix}.content[{k}]"),
                            expected: "a string",
                        })?;
                        names.push(story);
                        allowed.push(format!("{prefix}.story.{story}"));
                    }
                    items.push((format!("{prefix}.content"), names.join(",")));
                }
                _ => {}
            }

            flatten(doc, &prefix, &allowed, &mut items)?;
        }
        items.push(("output_document.sections".to_string(), section_names.join(",")));

        resolve_includes(doc, &mut items)?;

        for (key, value) in items {
            if include_target(&value).is_some() {
                continue;
            }
            let key = key.replace('.', "::");
            let key = match key.strip_prefix("output_document") {
                Some(rest) => format!("textgen{rest}"),
                None => key,
            };
            self.output_document.push((key, value));
        }
        Ok(())
    }

    fn read_area(&mut self, doc: &Document) -> Result<(), ConfigError> {
        let mut items = ConfigItemVector::new();
        flatten(doc, "area", &[ALLOW_ALL.to_string()], &mut items)?;

        for (key, value) in items {
            if include_target(&value).is_some() {
                continue;
            }
            let key = key.replace('.', "::");
            let key = match key.strip_prefix("area") {
                Some(rest) => format!("qdtext{rest}"),
                None => key,
            };
            if key.starts_with(TIMEZONE_PREFIX) {
                self.area_timezones.insert(key, value);
            } else {
                self.area.push((key, value));
            }
        }
        Ok(())
    }
}

fn syntax_error(path: &Path, source: ConfigError) -> ConfigError {
    ConfigError::product(
        path,
        format!(
            "Error reading product configuration file '{}', please check the syntax!",
            path.display()
        ),
        source,
    )
}

/// Collect the string settings below `node`, keyed by their own names.
///
/// A `use <key>` value is replaced by the string found at `<key>`.
fn collect_strings(doc: &Document, node: &Value, key: &str, out: &mut ConfigItemVector) -> Result<(), ConfigError> {
    match node {
        Value::Table(table) => {
            for (name, child) in table {
                match child {
                    Value::Table(_) => collect_strings(doc, child, &format!("{key}.{name}"), out)?,
                    Value::String(value) => {
                        let value = match include_target(value) {
                            Some(target) => doc.require_str(target)?.to_string(),
                            None => value.clone(),
                        };
                        out.push((name.clone(), value));
                    }
                    _ => {}
                }
            }
        }
        Value::String(value) => {
            let name = key.rsplit('.').next().unwrap_or(key);
            out.push((name.to_string(), value.clone()));
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<ParsedProduct, ConfigError> {
        let doc = Document::parse(Path::new("/etc/textgen/test.toml"), content)?;
        ParsedProduct::from_document(&doc, None)
    }

    #[test]
    fn test_scalars_and_mysql() {
        let p = parse(
            r#"
            [misc]
            frostseason = 1
            language = "sv"
            formatter = "plain"

            [database_servers.mysql_dictionary]
            host = "db"
            database = "textgen"
            "#,
        )
        .unwrap();

        assert!(p.frost_season);
        assert_eq!(p.language.as_deref(), Some("sv"));
        assert_eq!(p.formatter.as_deref(), Some("plain"));
        assert!(p.locale.is_none());
        assert_eq!(p.mysql.host, "db");
        assert_eq!(p.mysql.database, "textgen");
        assert!(p.mysql.username.is_empty());
    }

    #[test]
    fn test_parameter_mapping_prefix_rewrite() {
        let p = parse(
            r#"
            [parameter_mapping]
            temperature = "Temperature"
            [parameter_mapping.wind]
            speed = "WindSpeedMS"
            "#,
        )
        .unwrap();

        assert_eq!(p.parameter_mappings.get("textgen::temperature").unwrap(), "Temperature");
        assert_eq!(p.parameter_mappings.get("textgen::wind.speed").unwrap(), "WindSpeedMS");
    }

    #[test]
    fn test_geometry_tables_with_additional() {
        let p = parse(
            r#"
            [geometry_tables]
            server = "gis"
            schema = "fminames"
            table = "municipalities"
            field = "name"

            [[geometry_tables.additional_tables]]
            name = "regions"
            table = "regions"

            [[geometry_tables.additional_tables]]
            table = "municipalities"
            "#,
        )
        .unwrap();

        assert_eq!(p.geometry.len(), 2);
        let default = p.geometry.default_identifier().unwrap();
        assert_eq!(default.table, "municipalities");
        let regions = p.geometry.get("gisfminamesregionsname").unwrap();
        assert_eq!(regions.source_name, "regions");
        assert_eq!(regions.schema, "fminames");
    }

    #[test]
    fn test_additional_tables_inherit_parent_default() {
        let base = GeometryIdentifier {
            server: "gis".into(),
            schema: "public".into(),
            table: "base".into(),
            field: "name".into(),
            ..Default::default()
        };
        let doc = Document::parse(
            Path::new("/etc/textgen/child.toml"),
            r#"
            [geometry_tables]
            [[geometry_tables.additional_tables]]
            table = "lakes"
            "#,
        )
        .unwrap();

        let p = ParsedProduct::from_document(&doc, Some(&base)).unwrap();
        let lakes = p.geometry.default_identifier().unwrap();
        assert_eq!(lakes.schema, "public");
        assert_eq!(lakes.table, "lakes");
        assert_eq!(p.geometry_base.as_ref(), Some(&base));
    }

    #[test]
    fn test_geometry_tables_missing_fields_is_reported() {
        let err = parse(
            r#"
            [geometry_tables]
            [[geometry_tables.additional_tables]]
            table = "lakes"
            "#,
        )
        .unwrap_err();

        assert_eq!(
            err.details(),
            ["Textgenplugin configuration error in geometry_tables section: No 'schema' defined. No 'field' defined."]
        );
    }

    #[test]
    fn test_masks_and_fire_warning_codes() {
        let p = parse(
            r#"
            [mask]
            land = "/data/land.svg"
            coast = "coastline"
            ignored = 3

            [forestfirewarning]
            directory = "/data/fire"
            [forestfirewarning.areacodes]
            uusimaa = 1
            lappi = 14
            "#,
        )
        .unwrap();

        assert_eq!(
            p.masks,
            vec![
                ("land".to_string(), "/data/land.svg".to_string()),
                ("coast".to_string(), "coastline".to_string()),
            ]
        );
        assert_eq!(p.forest_fire_warning_directory.as_deref(), Some("/data/fire"));
        assert_eq!(
            p.fire_warning_area_codes,
            vec![
                ("qdtext::forestfirewarning::areacodes::uusimaa".to_string(), "1".to_string()),
                ("qdtext::forestfirewarning::areacodes::lappi".to_string(), "14".to_string()),
            ]
        );
    }

    #[test]
    fn test_forecast_data_follows_use_lookup() {
        let p = parse(
            r#"
            [shared]
            model = "/data/pal_skandinavia.sqd"

            [forecast_data]
            default_forecast = "use shared.model"
            [forecast_data.coastal]
            coastal_forecast = "/data/coast.sqd"

            [unit_format]
            celsius = "SI"
            "#,
        )
        .unwrap();

        assert_eq!(
            p.forecast_data,
            vec![
                ("default_forecast".to_string(), "/data/pal_skandinavia.sqd".to_string()),
                ("coastal_forecast".to_string(), "/data/coast.sqd".to_string()),
            ]
        );
        assert_eq!(p.unit_formats, vec![("celsius".to_string(), "SI".to_string())]);
    }

    #[test]
    fn test_forecast_data_dangling_use_fails() {
        let err = parse("[forecast_data]\ndefault_forecast = \"use nowhere.at_all\"\n").unwrap_err();
        assert!(err.summary().contains("please check the syntax"));
    }

    #[test]
    fn test_output_document_sections() {
        let p = parse(
            r#"
            [output_document]
            sections = ["part1", "part2"]

            [output_document.part1]
            content = "weather_overview"
            [output_document.part1.period]
            type = "day"
            [output_document.part1.story.weather_overview]
            var = "use output_document.common"
            [output_document.part1.story.temperature_max]
            var = "not wanted"

            [output_document.part2]
            content = ["wind_overview", "temperature_max"]
            [output_document.part2.header]
            type = "none"
            [output_document.part2.story.wind_overview]
            limit = 10

            [output_document.common]
            phrase = "sunny"
            "#,
        )
        .unwrap();

        let get = |k: &str| {
            p.output_document
                .iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("textgen::sections"), Some("part1,part2"));
        assert_eq!(get("textgen::part1::content"), Some("weather_overview"));
        assert_eq!(get("textgen::part1::period::type"), Some("day"));
        assert_eq!(get("textgen::part1::story::weather_overview::phrase"), Some("sunny"));
        assert_eq!(get("textgen::part1::story::weather_overview::var"), None);
        assert_eq!(get("textgen::part2::content"), Some("wind_overview,temperature_max"));
        assert_eq!(get("textgen::part2::header::type"), Some("none"));
        assert_eq!(get("textgen::part2::story::wind_overview::limit"), Some("10"));
        // temperature_max is only listed as part2 content
        assert_eq!(get("textgen::part1::story::temperature_max::var"), None);

        let mut sorted = p.output_document.clone();
        sorted.sort();
        assert_eq!(p.output_document, sorted);
    }

    #[test]
    fn test_output_document_without_sections_fails() {
        let err = parse("[output_document.part1]\ncontent = \"none\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Product { .. }));
    }

    #[test]
    fn test_area_and_timezones() {
        let p = parse(
            r#"
            [area]
            marine = false
            [area.timezone]
            default = "Europe/Stockholm"
            "my-area" = "Europe/Oslo"
            "#,
        )
        .unwrap();

        assert_eq!(p.area, vec![("qdtext::marine".to_string(), "false".to_string())]);
        assert_eq!(p.area_timezones.get("qdtext::timezone::default").unwrap(), "Europe/Stockholm");
        assert_eq!(p.area_timezones.get("qdtext::timezone::my-area").unwrap(), "Europe/Oslo");
    }

    #[test]
    fn test_default_timezone_always_present() {
        let p = parse("[misc]\nlanguage = \"fi\"\n").unwrap();
        assert_eq!(p.area_timezones.get(TIMEZONE_DEFAULT_KEY).unwrap(), DEFAULT_TIMEZONE);
    }

    #[test]
    fn test_missing_file() {
        let err = ParsedProduct::from_file(Path::new("/nonexistent/textgen/x.toml"), None).unwrap_err();
        assert_eq!(
            err.details(),
            ["Product configuration file '/nonexistent/textgen/x.toml' not found, please check the filename!"]
        );
        match err {
            ConfigError::Product { source, .. } => {
                assert!(matches!(*source, ConfigError::Io { ref source, .. } if source.kind() == io::ErrorKind::NotFound));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
